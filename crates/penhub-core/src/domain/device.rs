//! Device handle and device identity.
//!
//! A [`Device`] is created by the provider that first observes it and then
//! handed to the manager, which assigns the [`DeviceId`].  The id is written
//! exactly once; every other attribute is fixed at construction.
//!
//! # Ownership (for beginners)
//!
//! A device belongs to exactly one provider, and providers belong to the
//! manager.  Instead of pointing back at its provider (which would create a
//! reference cycle `Manager → Provider → Device → Provider`), a device records
//! the [`ConstructorId`] of the constructor that built its provider.  The
//! manager can always turn that id back into the provider through its own
//! table.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::level::{LevelRange, LevelRanges, LevelType};

/// Largest device id the manager hands out.  Ids live in `0..=MAX_DEVICE_ID`.
pub const MAX_DEVICE_ID: u8 = 127;

/// Small, stable identity of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Builds an id, returning `None` when `raw` exceeds [`MAX_DEVICE_ID`].
    pub fn new(raw: u8) -> Option<Self> {
        (raw <= MAX_DEVICE_ID).then_some(Self(raw))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a provider constructor registered with a manager.
///
/// Allocated by the manager in registration order; unique per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstructorId(pub u32);

impl fmt::Display for ConstructorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constructor#{}", self.0)
    }
}

/// What kind of physical (or synthetic) source a device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// An ordinary system pointer.  The first registered mouse becomes the
    /// manager's system-fallback device.
    Mouse,
    /// The writing tip of a pen.
    Stylus,
    /// The eraser end of a pen.
    Eraser,
    /// A tablet puck / lens cursor.
    Puck,
    /// The synthetic device of the emulation provider.
    Emulation,
}

/// One recognised input source.
#[derive(Debug)]
pub struct Device {
    id: OnceLock<DeviceId>,
    name: String,
    kind: DeviceKind,
    owner: ConstructorId,
    physical_id: String,
    level_ranges: LevelRanges,
}

impl Device {
    /// Creates an unregistered device.
    ///
    /// `physical_id` is the provider's own identifier for the source (for
    /// example `"wintab:cursor:7"`); it is informational and not required to be
    /// unique across providers.
    pub fn new(
        name: impl Into<String>,
        kind: DeviceKind,
        owner: ConstructorId,
        physical_id: impl Into<String>,
        level_ranges: LevelRanges,
    ) -> Self {
        Self {
            id: OnceLock::new(),
            name: name.into(),
            kind,
            owner,
            physical_id: physical_id.into(),
            level_ranges,
        }
    }

    /// The manager-assigned id, or `None` while the device was never registered.
    pub fn id(&self) -> Option<DeviceId> {
        self.id.get().copied()
    }

    /// Records the manager-assigned id.
    ///
    /// Only the manager calls this, once, while registering the device.
    ///
    /// # Errors
    ///
    /// Returns the already assigned id if the device was registered before.
    pub fn assign_id(&self, id: DeviceId) -> Result<(), DeviceId> {
        self.id.set(id).map_err(|_| self.id().unwrap_or(id))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// The constructor whose provider owns this device.
    pub fn owner(&self) -> ConstructorId {
        self.owner
    }

    pub fn physical_id(&self) -> &str {
        &self.physical_id
    }

    /// The fixed range this device reports for `level_type`.
    pub fn level_range(&self, level_type: LevelType) -> LevelRange {
        self.level_ranges.get(level_type)
    }

    pub fn level_ranges(&self) -> &LevelRanges {
        &self.level_ranges
    }

    /// Returns `true` for system pointer devices.
    pub fn is_mouse(&self) -> bool {
        self.kind == DeviceKind::Mouse
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{} (id {id}, {:?})", self.name, self.kind),
            None => write!(f, "{} (unregistered, {:?})", self.name, self.kind),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_device(kind: DeviceKind) -> Device {
        Device::new("Pen", kind, ConstructorId(0), "test:1", LevelRanges::default())
    }

    #[test]
    fn test_device_id_new_accepts_max() {
        assert_eq!(DeviceId::new(MAX_DEVICE_ID).map(DeviceId::get), Some(127));
    }

    #[test]
    fn test_device_id_new_rejects_values_above_max() {
        assert!(DeviceId::new(MAX_DEVICE_ID + 1).is_none());
        assert!(DeviceId::new(u8::MAX).is_none());
    }

    #[test]
    fn test_new_device_has_no_id() {
        let device = make_device(DeviceKind::Stylus);
        assert!(device.id().is_none());
    }

    #[test]
    fn test_assign_id_is_write_once() {
        // Arrange
        let device = make_device(DeviceKind::Stylus);
        let first = DeviceId::new(3).unwrap();
        let second = DeviceId::new(4).unwrap();

        // Act
        let ok = device.assign_id(first);
        let err = device.assign_id(second);

        // Assert
        assert!(ok.is_ok());
        assert_eq!(err, Err(first));
        assert_eq!(device.id(), Some(first));
    }

    #[test]
    fn test_is_mouse_only_for_mouse_kind() {
        assert!(make_device(DeviceKind::Mouse).is_mouse());
        assert!(!make_device(DeviceKind::Puck).is_mouse());
    }

    #[test]
    fn test_display_mentions_registration_state() {
        let device = make_device(DeviceKind::Eraser);
        assert!(device.to_string().contains("unregistered"));
        device.assign_id(DeviceId::new(9).unwrap()).unwrap();
        assert!(device.to_string().contains("id 9"));
    }
}
