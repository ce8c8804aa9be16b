//! Native-driver-backed polling provider.
//!
//! # Acquisition loop (for beginners)
//!
//! Tablet drivers queue packets; somebody has to pick them up.  Each polling
//! provider owns one named background thread that runs for as long as the
//! manager lives:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ while paused: block on the pause gate (no timeout)   │
//! │ drain every queued native event                      │
//! │   packet  → device(cursor) → level / button events   │
//! │   removal → fire "device removed"                    │
//! │ sleep one polling period (10 ms by default)          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Resuming clears the per-device "last levels" filter, enables the native
//! source and wakes the loop.  A source error logs, marks the provider faulted
//! and ends the thread; the manager and other providers keep working.
//!
//! The thread ends when the provider is dropped (which closes the pause gate)
//! or when it finds the manager gone at the start of a drain pass.
//!
//! # Locks
//!
//! | lock         | guards                              |
//! |--------------|-------------------------------------|
//! | `transition` | serialises pause/resume             |
//! | `source`     | the native source                   |
//! | `mint`       | creation of new devices             |
//! | `cursors`    | registered cursor → device map      |
//!
//! `source` and `cursors` are never held while calling into the manager, and
//! [`Provider::manager_paused`] never takes `mint`.  That keeps the lock order
//! *manager → provider* intact when the loop registers a device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use penhub_core::{
    Button, ButtonKind, ConstructorId, Device, Level, LevelRange, LevelRanges, LevelType,
};
use thiserror::Error;
use tracing::{debug, error, info};

use super::PauseGate;
use crate::application::manager::{Manager, ManagerError, ManagerHandle};
use crate::application::provider::{
    ConstructionError, Provider, ProviderConstructor, ProviderContext, ProviderKind,
};
use crate::infrastructure::native::{Cursor, NativeEvent, Packet, PacketSource, SourceError};

/// Default wait between two drain passes.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(10);

/// Where a polling provider can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformGate {
    /// Every host.
    Any,
    /// Hosts whose `std::env::consts::OS` equals the given name.
    Os(&'static str),
    /// No host; useful to register a provider that must stay absent.
    Never,
}

impl PlatformGate {
    pub fn allows_current_host(self) -> bool {
        match self {
            PlatformGate::Any => true,
            PlatformGate::Os(os) => std::env::consts::OS == os,
            PlatformGate::Never => false,
        }
    }
}

/// Opens the native source.  Called once, during construction.
pub type SourceOpener =
    Box<dyn Fn() -> Result<Box<dyn PacketSource>, ConstructionError> + Send + Sync>;

/// Builds a [`PollingProvider`] from a platform gate and a source opener.
pub struct PollingConstructor {
    name: String,
    gate: PlatformGate,
    period: Duration,
    opener: SourceOpener,
    provider: OnceLock<Arc<PollingProvider>>,
}

impl PollingConstructor {
    pub fn new(name: impl Into<String>, gate: PlatformGate, opener: SourceOpener) -> Self {
        Self {
            name: name.into(),
            gate,
            period: DEFAULT_POLL_PERIOD,
            opener,
            provider: OnceLock::new(),
        }
    }

    /// The Wintab tablet provider: Windows only.
    pub fn wintab(opener: SourceOpener) -> Self {
        Self::new("Wintab", PlatformGate::Os("windows"), opener)
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn provider(&self) -> Option<Arc<PollingProvider>> {
        self.provider.get().cloned()
    }
}

impl ProviderConstructor for PollingConstructor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::NativePolling
    }

    fn constructable(&self, _manager: &ManagerHandle) -> bool {
        self.gate.allows_current_host()
    }

    fn construct(&self, context: ProviderContext) -> Result<Arc<dyn Provider>, ConstructionError> {
        if let Some(provider) = self.provider.get() {
            return Ok(Arc::clone(provider) as Arc<dyn Provider>);
        }
        let source = (self.opener)()?;
        let provider = PollingProvider::start(&self.name, self.period, context, source)?;
        let provider = self.provider.get_or_init(|| provider);
        Ok(Arc::clone(provider) as Arc<dyn Provider>)
    }
}

/// Failure that ends the acquisition loop.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("device registration failed: {0}")]
    Registration(#[from] ManagerError),
}

/// Per-cursor state of the acquisition loop.
#[derive(Default)]
struct CursorTracker {
    last_levels: [Option<f32>; LevelType::COUNT],
    buttons: u32,
}

impl CursorTracker {
    /// Levels whose value differs from the last one seen.
    fn changed_levels(&mut self, levels: &[Level]) -> Vec<Level> {
        levels
            .iter()
            .filter(|level| {
                let slot = &mut self.last_levels[level.level_type.index()];
                let changed = *slot != Some(level.value);
                *slot = Some(level.value);
                changed
            })
            .copied()
            .collect()
    }

    /// Buttons whose bit flipped, in bit order.
    fn changed_buttons(&mut self, buttons: u32) -> Vec<Button> {
        let flipped = self.buttons ^ buttons;
        self.buttons = buttons;
        (0..u32::BITS as u8)
            .filter(|bit| flipped & (1u32 << bit) != 0)
            .map(|bit| Button::new(ButtonKind::from_tablet_bit(bit), buttons & (1u32 << bit) != 0))
            .collect()
    }
}

struct PollingShared {
    name: String,
    constructor: ConstructorId,
    manager: ManagerHandle,
    period: Duration,
    level_ranges: LevelRanges,
    source: Mutex<Box<dyn PacketSource>>,
    gate: PauseGate,
    transition: Mutex<()>,
    mint: Mutex<()>,
    cursors: Mutex<HashMap<Cursor, Arc<Device>>>,
    reset_requested: AtomicBool,
    faulted: AtomicBool,
    drain_cycles: AtomicU64,
}

/// Provider fed by a native [`PacketSource`] on its own thread.
pub struct PollingProvider {
    shared: Arc<PollingShared>,
}

impl PollingProvider {
    fn start(
        name: &str,
        period: Duration,
        context: ProviderContext,
        source: Box<dyn PacketSource>,
    ) -> Result<Arc<Self>, ConstructionError> {
        let level_ranges = LevelRanges::from_fn(|t| source.level_range(t));
        for level_type in LevelType::ALL {
            let reported = level_ranges.get(level_type);
            LevelRange::new(reported.min, reported.max).map_err(|source| {
                ConstructionError::InvalidLevelRange { level_type, source }
            })?;
        }
        let shared = Arc::new(PollingShared {
            name: name.to_string(),
            constructor: context.constructor,
            manager: context.manager,
            period,
            level_ranges,
            source: Mutex::new(source),
            gate: PauseGate::new(true),
            transition: Mutex::new(()),
            mint: Mutex::new(()),
            cursors: Mutex::new(HashMap::new()),
            reset_requested: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            drain_cycles: AtomicU64::new(0),
        });

        let thread_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("penhub-{}-poll", name.to_lowercase()))
            .spawn(move || run_acquisition(thread_shared))
            .map_err(ConstructionError::Thread)?;

        info!("{name} polling provider started ({period:?} period)");
        Ok(Arc::new(Self { shared }))
    }

    /// Pauses or resumes this provider only.
    pub fn set_paused(&self, paused: bool) {
        self.shared.set_paused(paused);
    }

    /// The device of `cursor`, created and registered on first use.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot describe the cursor or the manager refuses
    /// the registration.
    pub fn device(&self, cursor: Cursor) -> Result<Arc<Device>, AcquisitionError> {
        let manager = self
            .shared
            .manager
            .upgrade()
            .ok_or(ManagerError::ManagerDropped)?;
        self.shared.device(&manager, cursor)
    }

    /// Raw range the driver reports for `level_type`.
    pub fn level_range(&self, level_type: LevelType) -> LevelRange {
        self.shared.level_ranges.get(level_type)
    }

    /// `true` once the acquisition loop stopped on an error.
    pub fn is_faulted(&self) -> bool {
        self.shared.faulted.load(Ordering::Acquire)
    }

    /// Number of completed drain passes.
    pub fn drain_cycles(&self) -> u64 {
        self.shared.drain_cycles.load(Ordering::Acquire)
    }

    pub fn period(&self) -> Duration {
        self.shared.period
    }
}

impl Drop for PollingProvider {
    fn drop(&mut self) {
        self.shared.gate.close();
    }
}

impl Provider for PollingProvider {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::NativePolling
    }

    fn constructor_id(&self) -> ConstructorId {
        self.shared.constructor
    }

    fn devices(&self) -> Vec<Arc<Device>> {
        self.shared.cursors.lock().values().cloned().collect()
    }

    fn manager_paused(&self, paused: bool) {
        self.shared.set_paused(paused);
    }

    fn is_paused(&self) -> bool {
        self.shared.gate.is_paused()
    }

    /// Pointer movement means the user is active: make sure the native channel
    /// is not left suspended.
    fn pointer_activity(&self) {
        self.shared.set_paused(false);
    }
}

impl PollingShared {
    fn set_paused(&self, paused: bool) {
        let _transition = self.transition.lock();
        if self.gate.is_paused() == paused {
            return;
        }
        self.source.lock().set_enabled(!paused);
        if !paused {
            self.reset_requested.store(true, Ordering::Release);
        }
        self.gate.set(paused);
        debug!("{} {}", self.name, if paused { "paused" } else { "resumed" });
    }

    fn device(&self, manager: &Manager, cursor: Cursor) -> Result<Arc<Device>, AcquisitionError> {
        if let Some(device) = self.cursors.lock().get(&cursor) {
            return Ok(Arc::clone(device));
        }
        let _mint = self.mint.lock();
        if let Some(device) = self.cursors.lock().get(&cursor) {
            return Ok(Arc::clone(device));
        }

        let info = self.source.lock().cursor_info(cursor)?;
        let device = Arc::new(Device::new(
            info.name,
            info.kind,
            self.constructor,
            format!("{}:cursor:{cursor}", self.name.to_lowercase()),
            self.level_ranges,
        ));
        manager.fire_device_added(self.constructor, &device)?;
        self.cursors.lock().insert(cursor, Arc::clone(&device));
        Ok(device)
    }

    fn remove_cursor(&self, manager: &Manager, cursor: Cursor) -> Result<(), AcquisitionError> {
        let _mint = self.mint.lock();
        let Some(device) = self.cursors.lock().get(&cursor).cloned() else {
            debug!("{}: removal of unknown cursor {cursor}", self.name);
            return Ok(());
        };
        manager.fire_device_removed(self.constructor, &device)?;
        self.cursors.lock().remove(&cursor);
        Ok(())
    }

    /// Handles every queued event once.
    fn drain(
        &self,
        manager: &Manager,
        trackers: &mut HashMap<Cursor, CursorTracker>,
    ) -> Result<(), AcquisitionError> {
        if self.reset_requested.swap(false, Ordering::AcqRel) {
            for tracker in trackers.values_mut() {
                tracker.last_levels = Default::default();
            }
        }

        loop {
            // Keep the source lock scoped to the pop.
            let event = self.source.lock().next_event()?;
            match event {
                None => break,
                Some(NativeEvent::Packet(packet)) => {
                    let device = self.device(manager, packet.cursor)?;
                    let tracker = trackers.entry(packet.cursor).or_default();
                    self.schedule(manager, &device, tracker, packet);
                }
                Some(NativeEvent::CursorRemoved(cursor)) => {
                    trackers.remove(&cursor);
                    self.remove_cursor(manager, cursor)?;
                }
            }
        }
        Ok(())
    }

    fn schedule(&self, manager: &Manager, device: &Device, tracker: &mut CursorTracker, packet: Packet) {
        let levels = tracker.changed_levels(&packet.levels);
        if !levels.is_empty() {
            manager.schedule_level_event(device, packet.device_time, &levels, false);
        }
        for button in tracker.changed_buttons(packet.buttons) {
            manager.schedule_button_event(device, packet.device_time, button);
        }
    }
}

/// Body of the acquisition thread.
fn run_acquisition(shared: Arc<PollingShared>) {
    let mut trackers: HashMap<Cursor, CursorTracker> = HashMap::new();
    while shared.gate.wait_until_running() {
        // The manager is held only for one drain pass so it can be dropped.
        let Some(manager) = shared.manager.upgrade() else {
            break;
        };
        let result = shared.drain(&manager, &mut trackers);
        drop(manager);
        shared.drain_cycles.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(()) => {}
            Err(AcquisitionError::Registration(ManagerError::ManagerDropped)) => break,
            Err(e) => {
                error!("{} acquisition stopped: {e}", shared.name);
                shared.faulted.store(true, Ordering::Release);
                return;
            }
        }

        thread::sleep(shared.period);
    }
    debug!("{} acquisition ended", shared.name);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
