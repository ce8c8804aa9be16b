//! Tracing-backed scheduler and listener for hosts without an event pipeline.
//!
//! [`LoggingScheduler`] accepts every sample, logs it at `trace` level and
//! counts it.  [`LoggingListener`] logs device arrivals and departures.  The
//! demo binary uses both; a GUI integration would plug in its own scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use penhub_core::{Button, ConstructorId, Device, Level, LevelType, Scroll};
use tracing::{info, trace};

use crate::application::listener::ManagerListener;
use crate::application::scheduler::EventScheduler;

/// Event totals seen by a [`LoggingScheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerCounts {
    pub buttons: u64,
    pub scrolls: u64,
    pub levels: u64,
}

#[derive(Debug, Default)]
pub struct LoggingScheduler {
    paused: AtomicBool,
    buttons: AtomicU64,
    scrolls: AtomicU64,
    levels: AtomicU64,
}

impl LoggingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> SchedulerCounts {
        SchedulerCounts {
            buttons: self.buttons.load(Ordering::Relaxed),
            scrolls: self.scrolls.load(Ordering::Relaxed),
            levels: self.levels.load(Ordering::Relaxed),
        }
    }

    /// Last pause state mirrored by the manager.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

impl EventScheduler for LoggingScheduler {
    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
        info!("scheduler {}", if paused { "paused" } else { "resumed" });
    }

    fn schedule_button_event(&self, device: &Device, device_time: u64, button: Button) {
        self.buttons.fetch_add(1, Ordering::Relaxed);
        trace!("{device} @{device_time}: {:?} pressed={}", button.kind, button.pressed);
    }

    fn schedule_scroll_event(&self, device: &Device, device_time: u64, scroll: Scroll) {
        self.scrolls.fetch_add(1, Ordering::Relaxed);
        trace!("{device} @{device_time}: scroll {:?} {}", scroll.direction, scroll.value);
    }

    fn schedule_level_event(
        &self,
        device: &Device,
        device_time: u64,
        levels: &[Level],
        levels_on_screen: bool,
    ) -> bool {
        self.levels.fetch_add(1, Ordering::Relaxed);
        trace!(
            "{device} @{device_time}: {:?}, on_screen={levels_on_screen}",
            normalized_levels(device, levels)
        );
        true
    }
}

/// Each level's value mapped into `0.0..=1.0` against the device's range.
pub fn normalized_levels(device: &Device, levels: &[Level]) -> Vec<(LevelType, f32)> {
    levels
        .iter()
        .map(|level| {
            let range = device.level_range(level.level_type);
            (level.level_type, range.ranged_value(level.value))
        })
        .collect()
}

/// Logs registry changes at `info` level.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl LoggingListener {
    pub fn shared() -> Arc<dyn ManagerListener> {
        Arc::new(Self)
    }
}

impl ManagerListener for LoggingListener {
    fn device_added(&self, constructor: ConstructorId, device: &Arc<Device>) {
        let id = device.id().map(|id| id.get());
        info!("+ {device} [{:?}] id={id:?} via {constructor}", device.kind());
    }

    fn device_removed(&self, constructor: ConstructorId, device: &Arc<Device>) {
        info!("- {device} via {constructor}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use penhub_core::{ButtonKind, DeviceKind, LevelRange, LevelRanges, ScrollDirection};

    #[test]
    fn test_scheduler_counts_each_event_kind() {
        // Arrange
        let scheduler = LoggingScheduler::new();
        let device = Device::new("pen", DeviceKind::Stylus, ConstructorId(0), "t", LevelRanges::default());

        // Act
        scheduler.schedule_button_event(&device, 1, Button::new(ButtonKind::Left, true));
        scheduler.schedule_scroll_event(&device, 2, Scroll::new(ScrollDirection::Up, 1));
        scheduler.schedule_level_event(&device, 3, &[Level::new(LevelType::X, 1.0)], false);
        scheduler.schedule_level_event(&device, 4, &[Level::new(LevelType::Y, 1.0)], false);

        // Assert
        assert_eq!(
            scheduler.counts(),
            SchedulerCounts {
                buttons: 1,
                scrolls: 1,
                levels: 2
            }
        );
    }

    #[test]
    fn test_levels_are_normalized_against_device_ranges() {
        // Arrange
        let ranges = LevelRanges::from_fn(|t| match t {
            LevelType::Pressure => LevelRange { min: 0.0, max: 1023.0 },
            LevelType::TiltX => LevelRange { min: -60.0, max: 60.0 },
            _ => LevelRange::default(),
        });
        let device = Device::new("pen", DeviceKind::Stylus, ConstructorId(0), "t", ranges);

        // Act
        let normalized = normalized_levels(
            &device,
            &[
                Level::new(LevelType::Pressure, 1023.0),
                Level::new(LevelType::TiltX, 0.0),
            ],
        );

        // Assert
        assert_eq!(normalized, vec![(LevelType::Pressure, 1.0), (LevelType::TiltX, 0.5)]);
    }

    #[test]
    fn test_scheduler_mirrors_pause_state() {
        let scheduler = LoggingScheduler::new();
        scheduler.set_paused(true);
        assert!(scheduler.is_paused());
        scheduler.set_paused(false);
        assert!(!scheduler.is_paused());
    }
}
