//! Level (axis) model.
//!
//! A *level* is one scalar axis of pen input.  Every device reports a fixed
//! [`LevelRange`] for each [`LevelType`]; the range is read once from the
//! native source when the provider is built and never changes afterwards.
//!
//! penhub does not interpret the units of a level.  Pressure might be
//! `0..=1023` on one tablet and `0..=8191` on another; callers that need a
//! normalised value use [`LevelRange::ranged_value`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when building level values.
#[derive(Debug, Error, PartialEq)]
pub enum LevelError {
    /// `min` was greater than `max`.
    #[error("invalid level range: min {min} is greater than max {max}")]
    InvertedRange { min: f32, max: f32 },

    /// One of the bounds was NaN or infinite.
    #[error("invalid level range: bounds must be finite")]
    NonFinite,
}

/// The axes a pen device can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelType {
    X,
    Y,
    Pressure,
    TiltX,
    TiltY,
    SidePressure,
    Rotation,
}

impl LevelType {
    /// Number of level types; the length of [`LevelType::ALL`].
    pub const COUNT: usize = 7;

    /// Every level type in declaration order.
    pub const ALL: [LevelType; Self::COUNT] = [
        LevelType::X,
        LevelType::Y,
        LevelType::Pressure,
        LevelType::TiltX,
        LevelType::TiltY,
        LevelType::SidePressure,
        LevelType::Rotation,
    ];

    /// Dense index of this level type, usable to index fixed-size tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The reportable value range of one level on one device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: f32,
    pub max: f32,
}

impl LevelRange {
    /// Builds a range, rejecting inverted or non-finite bounds.
    ///
    /// # Errors
    ///
    /// Returns [`LevelError::InvertedRange`] when `min > max` and
    /// [`LevelError::NonFinite`] when either bound is NaN or infinite.
    pub fn new(min: f32, max: f32) -> Result<Self, LevelError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(LevelError::NonFinite);
        }
        if min > max {
            return Err(LevelError::InvertedRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// The width of the range (`max - min`).
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// Maps `value` into `0.0..=1.0` relative to this range.
    ///
    /// A zero-width range maps every value to `0.0`.
    pub fn ranged_value(&self, value: f32) -> f32 {
        let span = self.span();
        if span == 0.0 {
            return 0.0;
        }
        (value - self.min) / span
    }
}

impl Default for LevelRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// One range per [`LevelType`], fixed at device construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelRanges([LevelRange; LevelType::COUNT]);

impl LevelRanges {
    /// Builds the table by asking `f` for the range of every level type.
    pub fn from_fn(mut f: impl FnMut(LevelType) -> LevelRange) -> Self {
        let mut ranges = [LevelRange::default(); LevelType::COUNT];
        for level_type in LevelType::ALL {
            ranges[level_type.index()] = f(level_type);
        }
        Self(ranges)
    }

    /// Returns the range of `level_type`.
    pub fn get(&self, level_type: LevelType) -> LevelRange {
        self.0[level_type.index()]
    }
}

/// One level sample.  Build a new value for every scheduled event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub level_type: LevelType,
    pub value: f32,
}

impl Level {
    pub fn new(level_type: LevelType, value: f32) -> Self {
        Self { level_type, value }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
