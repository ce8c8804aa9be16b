//! Native packet-source abstraction.
//!
//! A tablet driver (Wintab on Windows, for example) exposes a queue of
//! *packets*: one sample of every axis plus the button bitmask, tagged with the
//! cursor (pen tip, eraser, puck...) that produced it.  The polling provider
//! drains that queue through the [`PacketSource`] trait so that the driver
//! binding can be swapped for the [`simulated::SimulatedTablet`] in tests and
//! on hosts without a driver.
//!
//! # Threading
//!
//! A source is owned by exactly one provider.  The provider's acquisition
//! thread calls [`PacketSource::next_event`]; the thread that pauses the
//! manager calls [`PacketSource::set_enabled`].  Both go through the same
//! mutex, so implementations only need to be `Send`.

use penhub_core::{DeviceKind, Level, LevelRange, LevelType};
use thiserror::Error;

pub mod simulated;

/// Driver-specific cursor index.
pub type Cursor = u32;

/// One sample reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub cursor: Cursor,
    /// Driver timestamp in milliseconds.
    pub device_time: u64,
    /// Raw axis values in the driver's units (see [`PacketSource::level_range`]).
    pub levels: Vec<Level>,
    /// Bit `n` set means button `n` is held.
    pub buttons: u32,
}

/// Something the driver reported.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Packet(Packet),
    /// The cursor left proximity for good (device unplugged, tool removed).
    CursorRemoved(Cursor),
}

/// Static description of a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorInfo {
    pub name: String,
    pub kind: DeviceKind,
}

/// Failure inside the native driver binding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The driver context is gone (tablet service stopped, context closed).
    #[error("native context lost: {0}")]
    ContextLost(String),

    /// The driver returned an error code.
    #[error("driver call {call} failed with code {code}")]
    Driver { call: &'static str, code: i32 },
}

/// Non-blocking access to a native packet queue.
#[cfg_attr(test, mockall::automock)]
pub trait PacketSource: Send {
    /// Pops the next queued event, or `Ok(None)` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the driver fails; the caller stops polling.
    fn next_event(&mut self) -> Result<Option<NativeEvent>, SourceError>;

    /// Range of raw values the driver reports for `level_type`.
    fn level_range(&self, level_type: LevelType) -> LevelRange;

    /// Describes `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the driver cannot be queried.
    fn cursor_info(&self, cursor: Cursor) -> Result<CursorInfo, SourceError>;

    /// Enables or disables packet delivery.  Disabled sources queue nothing.
    fn set_enabled(&mut self, enabled: bool);
}
