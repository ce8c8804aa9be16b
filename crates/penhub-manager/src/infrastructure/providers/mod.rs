//! Concrete providers and the helpers they share.
//!
//! - **`polling`** – native-driver-backed provider with its own acquisition
//!   thread.
//! - **`system_mouse`** – system pointer fallback fed by the GUI integration.
//! - **`emulation`** – synthetic device for programmatic input injection.
//!
//! Each constructor keeps a typed handle to the provider it built (see
//! `provider()` on each constructor), because the manager only hands out
//! `Arc<dyn Provider>`.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};
use penhub_core::{LevelRange, LevelRanges, LevelType};

pub mod emulation;
pub mod polling;
pub mod system_mouse;

/// A paused flag with a condition variable guarded by the same mutex.
///
/// Resuming flips the flag and signals the waiter inside one critical section,
/// so a waiter cannot miss the wake-up.  A paused waiter blocks without a
/// timeout until it is resumed or the gate is closed.
#[derive(Debug)]
pub struct PauseGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Debug)]
struct GateState {
    paused: bool,
    closed: bool,
}

impl PauseGate {
    pub fn new(paused: bool) -> Self {
        Self {
            state: Mutex::new(GateState {
                paused,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Sets the flag.  Returns `true` if it changed.
    pub fn set(&self, paused: bool) -> bool {
        let mut state = self.state.lock();
        if state.paused == paused {
            return false;
        }
        state.paused = paused;
        if !paused {
            self.changed.notify_one();
        }
        true
    }

    /// Releases every waiter for good.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Blocks while paused.  Returns `true` once running, `false` once closed.
    pub fn wait_until_running(&self) -> bool {
        let mut state = self.state.lock();
        while state.paused && !state.closed {
            self.changed.wait(&mut state);
        }
        !state.closed
    }
}

/// Ranges for levels already expressed in screen pixels.
pub fn screen_relative_ranges(width: u32, height: u32) -> LevelRanges {
    LevelRanges::from_fn(|t| match t {
        LevelType::X => LevelRange {
            min: 0.0,
            max: width as f32,
        },
        LevelType::Y => LevelRange {
            min: 0.0,
            max: height as f32,
        },
        _ => LevelRange::default(),
    })
}

/// Wall-clock time in milliseconds, used as device time by providers without
/// a driver clock.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
