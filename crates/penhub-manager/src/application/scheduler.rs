//! Contract of the external event scheduler.
//!
//! The scheduler turns raw per-axis samples into calibrated, filtered
//! application events.  It is not part of penhub; the manager only forwards
//! samples to it and mirrors the pause state.
//!
//! Every value passed here is moved in by value, so each call carries its own
//! fresh [`Button`], [`Scroll`] or level slice.

use penhub_core::{Button, Device, Level, Scroll};

/// Receives samples from providers (through the manager).
///
/// The manager never calls the `schedule_*` methods while it is paused.
#[cfg_attr(test, mockall::automock)]
pub trait EventScheduler: Send + Sync {
    /// Mirrors the manager's pause state.  Called before the manager's own
    /// flag flips.
    fn set_paused(&self, paused: bool);

    /// Schedules a button press or release.
    fn schedule_button_event(&self, device: &Device, device_time: u64, button: Button);

    /// Schedules a scroll step.
    fn schedule_scroll_event(&self, device: &Device, device_time: u64, scroll: Scroll);

    /// Schedules a set of level changes observed at the same instant.
    ///
    /// `levels_on_screen` is `true` when the movement levels are already in
    /// screen coordinates.  Returns `true` if an event was scheduled, `false`
    /// if the scheduler filtered it out.
    fn schedule_level_event(
        &self,
        device: &Device,
        device_time: u64,
        levels: &[Level],
        levels_on_screen: bool,
    ) -> bool;
}
