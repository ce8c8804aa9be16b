//! Shared fixtures for the penhub-manager integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use penhub_core::{Button, ConstructorId, Device, Level, Scroll};
use penhub_manager::application::listener::ManagerListener;
use penhub_manager::application::manager::{Manager, ManagerConfig};
use penhub_manager::application::provider::{ConstructionError, ProviderConstructor};
use penhub_manager::application::scheduler::EventScheduler;
use penhub_manager::infrastructure::native::simulated::{SimulatedTablet, SimulatedTabletFeed};
use penhub_manager::infrastructure::native::PacketSource;
use penhub_manager::infrastructure::providers::polling::{PlatformGate, PollingConstructor};

/// Something the scheduler received.
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled {
    Button { device: String, button: Button },
    Scroll { device: String, scroll: Scroll },
    Levels { device: String, levels: Vec<Level>, on_screen: bool },
}

/// Scheduler that records every call.
#[derive(Default)]
pub struct RecordingScheduler {
    events: Mutex<Vec<Scheduled>>,
    pause_calls: Mutex<Vec<bool>>,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Scheduled> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn level_events(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Scheduled::Levels { .. }))
            .count()
    }

    pub fn buttons(&self) -> Vec<Button> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Scheduled::Button { button, .. } => Some(*button),
                _ => None,
            })
            .collect()
    }

    pub fn pause_calls(&self) -> Vec<bool> {
        self.pause_calls.lock().clone()
    }
}

impl EventScheduler for RecordingScheduler {
    fn set_paused(&self, paused: bool) {
        self.pause_calls.lock().push(paused);
    }

    fn schedule_button_event(&self, device: &Device, _device_time: u64, button: Button) {
        self.events.lock().push(Scheduled::Button {
            device: device.name().to_string(),
            button,
        });
    }

    fn schedule_scroll_event(&self, device: &Device, _device_time: u64, scroll: Scroll) {
        self.events.lock().push(Scheduled::Scroll {
            device: device.name().to_string(),
            scroll,
        });
    }

    fn schedule_level_event(
        &self,
        device: &Device,
        _device_time: u64,
        levels: &[Level],
        levels_on_screen: bool,
    ) -> bool {
        self.events.lock().push(Scheduled::Levels {
            device: device.name().to_string(),
            levels: levels.to_vec(),
            on_screen: levels_on_screen,
        });
        true
    }
}

/// Registry change seen by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added { name: String, id: Option<u8> },
    Removed { name: String },
}

#[derive(Default)]
pub struct RecordingListener {
    changes: Mutex<Vec<(ConstructorId, Change)>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn changes(&self) -> Vec<Change> {
        self.changes.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn constructors(&self) -> Vec<ConstructorId> {
        self.changes.lock().iter().map(|(id, _)| *id).collect()
    }
}

impl ManagerListener for RecordingListener {
    fn device_added(&self, constructor: ConstructorId, device: &Arc<Device>) {
        self.changes.lock().push((
            constructor,
            Change::Added {
                name: device.name().to_string(),
                id: device.id().map(|id| id.get()),
            },
        ));
    }

    fn device_removed(&self, constructor: ConstructorId, device: &Arc<Device>) {
        self.changes.lock().push((
            constructor,
            Change::Removed {
                name: device.name().to_string(),
            },
        ));
    }
}

/// A manager with no initial constructors, discovery already finished.
pub fn empty_manager(scheduler: Arc<dyn EventScheduler>) -> Manager {
    manager_with(scheduler, Vec::new())
}

/// A manager whose discovery pass adds `constructors`, already finished.
pub fn manager_with(
    scheduler: Arc<dyn EventScheduler>,
    constructors: Vec<Arc<dyn ProviderConstructor>>,
) -> Manager {
    let manager = Manager::new(ManagerConfig::default(), scheduler, Box::new(constructors))
        .expect("manager");
    manager.wait_for_discovery();
    manager
}

/// Polling period used by the tests.
pub const TEST_PERIOD: Duration = Duration::from_millis(5);

/// A polling constructor over a fresh simulated tablet.
pub fn simulated_constructor(name: &str) -> (Arc<PollingConstructor>, SimulatedTabletFeed) {
    let (tablet, feed) = SimulatedTablet::new();
    let tablet = Mutex::new(Some(tablet));
    let constructor = PollingConstructor::new(
        name,
        PlatformGate::Any,
        Box::new(move || {
            tablet
                .lock()
                .take()
                .map(|t| Box::new(t) as Box<dyn PacketSource>)
                .ok_or_else(|| ConstructionError::Unavailable("tablet already opened".into()))
        }),
    )
    .with_period(TEST_PERIOD);
    (Arc::new(constructor), feed)
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
