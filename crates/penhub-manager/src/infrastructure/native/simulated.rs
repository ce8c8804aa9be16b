//! Scripted in-process tablet.
//!
//! [`SimulatedTablet`] implements [`PacketSource`] on top of a queue that a
//! [`SimulatedTabletFeed`] fills from any thread.  It behaves like a driver
//! context:
//!
//! - packets pushed while the context is disabled are discarded;
//! - a scripted failure is returned once, after everything queued before it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use penhub_core::{DeviceKind, Level, LevelRange, LevelRanges, LevelType};

use super::{Cursor, CursorInfo, NativeEvent, Packet, PacketSource, SourceError};

/// Raw ranges of the simulated tablet, modelled on a mid-size pen tablet.
pub fn simulated_level_ranges() -> LevelRanges {
    LevelRanges::from_fn(|t| match t {
        LevelType::X => LevelRange { min: 0.0, max: 15200.0 },
        LevelType::Y => LevelRange { min: 0.0, max: 9500.0 },
        LevelType::Pressure | LevelType::SidePressure => LevelRange { min: 0.0, max: 1023.0 },
        LevelType::TiltX | LevelType::TiltY => LevelRange { min: -60.0, max: 60.0 },
        LevelType::Rotation => LevelRange { min: 0.0, max: 359.0 },
    })
}

#[derive(Default)]
struct TabletState {
    enabled: bool,
    queue: VecDeque<Result<NativeEvent, SourceError>>,
    cursors: HashMap<Cursor, CursorInfo>,
    enable_history: Vec<bool>,
    discarded: usize,
}

/// The [`PacketSource`] half.  Hand it to the polling provider.
pub struct SimulatedTablet {
    state: Arc<Mutex<TabletState>>,
    ranges: LevelRanges,
}

/// The feeding half.  Cheap to clone.
#[derive(Clone)]
pub struct SimulatedTabletFeed {
    state: Arc<Mutex<TabletState>>,
}

impl SimulatedTablet {
    /// Creates a disabled tablet and its feed.
    pub fn new() -> (Self, SimulatedTabletFeed) {
        let state = Arc::new(Mutex::new(TabletState::default()));
        let tablet = Self {
            state: Arc::clone(&state),
            ranges: simulated_level_ranges(),
        };
        (tablet, SimulatedTabletFeed { state })
    }
}

impl PacketSource for SimulatedTablet {
    fn next_event(&mut self) -> Result<Option<NativeEvent>, SourceError> {
        let mut state = self.state.lock();
        if !state.enabled {
            return Ok(None);
        }
        state.queue.pop_front().transpose()
    }

    fn level_range(&self, level_type: LevelType) -> LevelRange {
        self.ranges.get(level_type)
    }

    fn cursor_info(&self, cursor: Cursor) -> Result<CursorInfo, SourceError> {
        let state = self.state.lock();
        Ok(state.cursors.get(&cursor).cloned().unwrap_or_else(|| CursorInfo {
            name: format!("Simulated pen {cursor}"),
            kind: DeviceKind::Stylus,
        }))
    }

    fn set_enabled(&mut self, enabled: bool) {
        let mut state = self.state.lock();
        state.enabled = enabled;
        state.enable_history.push(enabled);
    }
}

impl SimulatedTabletFeed {
    /// Names a cursor.  Unnamed cursors report as `"Simulated pen <n>"` styluses.
    pub fn define_cursor(&self, cursor: Cursor, name: impl Into<String>, kind: DeviceKind) {
        self.state.lock().cursors.insert(
            cursor,
            CursorInfo {
                name: name.into(),
                kind,
            },
        );
    }

    /// Queues a packet.  Returns `false` if the context is disabled and the
    /// packet was discarded.
    pub fn push_packet(&self, packet: Packet) -> bool {
        let mut state = self.state.lock();
        if !state.enabled {
            state.discarded += 1;
            return false;
        }
        state.queue.push_back(Ok(NativeEvent::Packet(packet)));
        true
    }

    /// Queues a pen sample at raw position (`x`, `y`) with `pressure`.
    pub fn push_sample(&self, cursor: Cursor, device_time: u64, x: f32, y: f32, pressure: f32, buttons: u32) -> bool {
        self.push_packet(Packet {
            cursor,
            device_time,
            levels: vec![
                Level::new(LevelType::X, x),
                Level::new(LevelType::Y, y),
                Level::new(LevelType::Pressure, pressure),
            ],
            buttons,
        })
    }

    /// Queues the removal of `cursor`.  Removals are queued even while disabled.
    pub fn remove_cursor(&self, cursor: Cursor) {
        self.state
            .lock()
            .queue
            .push_back(Ok(NativeEvent::CursorRemoved(cursor)));
    }

    /// Queues a driver failure.
    pub fn fail(&self, error: SourceError) {
        self.state.lock().queue.push_back(Err(error));
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Every `set_enabled` call made so far, in order.
    pub fn enable_history(&self) -> Vec<bool> {
        self.state.lock().enable_history.clone()
    }

    /// Events still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Packets dropped because the context was disabled.
    pub fn discarded(&self) -> usize {
        self.state.lock().discarded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
