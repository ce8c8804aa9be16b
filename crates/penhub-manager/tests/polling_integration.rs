//! Integration tests for the polling provider over a simulated tablet.
//!
//! Each test owns its manager, scheduler and tablet; timing-dependent checks
//! poll with generous deadlines instead of sleeping for fixed amounts.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{
    manager_with, simulated_constructor, wait_until, Change, RecordingListener, RecordingScheduler,
    Scheduled, TEST_PERIOD,
};
use penhub_core::{Button, ButtonKind, DeviceKind, LevelType};
use penhub_manager::application::manager::Manager;
use penhub_manager::application::provider::{Provider, ProviderConstructor};
use penhub_manager::infrastructure::native::simulated::SimulatedTabletFeed;
use penhub_manager::infrastructure::native::SourceError;
use penhub_manager::infrastructure::providers::polling::PollingProvider;
use penhub_manager::infrastructure::providers::system_mouse::SystemMouseConstructor;

const DEADLINE: Duration = Duration::from_secs(2);

struct Rig {
    manager: Manager,
    scheduler: Arc<RecordingScheduler>,
    provider: Arc<PollingProvider>,
    feed: SimulatedTabletFeed,
}

fn rig() -> Rig {
    let scheduler = RecordingScheduler::new();
    let (constructor, feed) = simulated_constructor("Simulated");
    let manager = manager_with(
        scheduler.clone(),
        vec![constructor.clone() as Arc<dyn ProviderConstructor>],
    );
    let provider = constructor.provider().expect("constructed during discovery");
    Rig {
        manager,
        scheduler,
        provider,
        feed,
    }
}

/// Waits until at least two drain passes started after this call.
fn settle(provider: &PollingProvider) {
    let start = provider.drain_cycles();
    assert!(wait_until(DEADLINE, || provider.drain_cycles() >= start + 2));
}

// ── Pause mirroring ───────────────────────────────────────────────────────────

#[test]
fn test_resume_unpauses_provider_and_restarts_its_loop() {
    // Arrange
    let rig = rig();
    assert!(rig.provider.is_paused());
    thread::sleep(TEST_PERIOD * 3);
    let idle_cycles = rig.provider.drain_cycles();

    // Act
    rig.manager.set_paused(false);

    // Assert
    assert!(!rig.provider.is_paused());
    assert!(rig.feed.is_enabled());
    assert_eq!(idle_cycles, 0);
    assert!(wait_until(DEADLINE, || rig.provider.drain_cycles() > idle_cycles));
}

#[test]
fn test_pause_disables_native_context() {
    // Arrange
    let rig = rig();
    rig.manager.set_paused(false);

    // Act
    rig.manager.set_paused(true);

    // Assert
    assert!(rig.provider.is_paused());
    assert!(!rig.feed.is_enabled());
    assert_eq!(rig.feed.enable_history(), vec![true, false]);
    assert!(!rig.feed.push_sample(0, 1, 1.0, 1.0, 0.0, 0));
    assert_eq!(rig.feed.discarded(), 1);
}

#[test]
fn test_nothing_is_scheduled_while_manager_is_paused() {
    // Arrange
    let rig = rig();
    rig.provider.set_paused(false);
    rig.manager.pointer_activity();

    // Act
    assert!(rig.feed.push_sample(0, 1, 10.0, 20.0, 0.5, 1));
    settle(&rig.provider);

    // Assert: the cursor is registered but no sample reached the scheduler
    assert!(rig.manager.paused());
    assert_eq!(rig.manager.devices().len(), 1);
    assert_eq!(rig.scheduler.len(), 0);
}

#[test]
fn test_pointer_activity_reactivates_paused_provider() {
    // Arrange
    let rig = rig();
    rig.manager.set_paused(false);
    rig.provider.set_paused(true);
    assert!(!rig.feed.is_enabled());

    // Act
    rig.manager.pointer_activity();

    // Assert
    assert!(!rig.provider.is_paused());
    assert!(rig.feed.push_sample(0, 1, 5.0, 5.0, 0.0, 0));
    assert!(wait_until(DEADLINE, || rig.scheduler.level_events() == 1));
}

#[test]
fn test_pause_cycles_under_continuous_input() {
    // Arrange: a pen that never stops moving
    let rig = rig();
    rig.manager.set_paused(false);
    let stop = Arc::new(AtomicBool::new(false));
    let feeder = {
        let feed = rig.feed.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut tick = 0u64;
            while !stop.load(Ordering::Relaxed) {
                feed.push_sample(0, tick, tick as f32, 100.0, 0.5, 0);
                tick += 1;
                thread::sleep(Duration::from_millis(1));
            }
        })
    };
    assert!(wait_until(DEADLINE, || rig.scheduler.len() > 0));

    for _ in 0..3 {
        // Act: pause
        rig.manager.set_paused(true);
        thread::sleep(TEST_PERIOD);
        let while_paused = rig.scheduler.len();
        thread::sleep(TEST_PERIOD * 4);

        // Assert: no scheduler calls while paused
        assert_eq!(rig.scheduler.len(), while_paused);

        // Act: resume
        rig.manager.set_paused(false);
        let resumed_at = Instant::now();
        while rig.scheduler.len() == while_paused && resumed_at.elapsed() < DEADLINE {
            thread::sleep(Duration::from_micros(100));
        }

        // Assert: samples flow again within one polling period
        let latency = resumed_at.elapsed();
        assert!(rig.scheduler.len() > while_paused);
        assert!(
            latency <= TEST_PERIOD + Duration::from_millis(20),
            "first sample after resume took {latency:?}"
        );
    }

    stop.store(true, Ordering::Relaxed);
    feeder.join().expect("feeder");
}

#[test]
fn test_pointer_movement_on_paused_manager_reactivates_tablet() {
    // Arrange
    let rig = rig();
    let mouse = Arc::new(SystemMouseConstructor::new(640, 480));
    rig.manager.add_provider(mouse.clone()).expect("add");
    let mouse = mouse.provider().expect("system mouse");
    assert!(rig.manager.paused());
    assert!(rig.provider.is_paused());

    // Act
    let scheduled = mouse.mouse_moved(1.0, 1.0);

    // Assert: the move itself is not reported, the tablet is awake again
    assert!(!scheduled);
    assert!(!rig.provider.is_paused());
    assert!(rig.feed.is_enabled());
    assert_eq!(rig.scheduler.len(), 0);
}

// ── Devices ───────────────────────────────────────────────────────────────────

#[test]
fn test_first_packet_registers_cursor_with_reported_name() {
    // Arrange
    let scheduler = RecordingScheduler::new();
    let (constructor, feed) = simulated_constructor("Simulated");
    let manager = manager_with(scheduler, Vec::new());
    let listener = RecordingListener::new();
    manager.add_listener(listener.clone());
    manager.add_provider(constructor.clone()).expect("add");
    manager.set_paused(false);
    feed.define_cursor(7, "Grip Pen", DeviceKind::Stylus);

    // Act
    assert!(feed.push_sample(7, 1, 100.0, 100.0, 0.2, 0));

    // Assert
    assert!(wait_until(DEADLINE, || !listener.changes().is_empty()));
    assert_eq!(
        listener.changes(),
        vec![Change::Added {
            name: "Grip Pen".into(),
            id: Some(0)
        }]
    );
    let device = manager.devices().pop().expect("registered");
    assert_eq!(device.kind(), DeviceKind::Stylus);
    assert_eq!(device.physical_id(), "simulated:cursor:7");
    assert_eq!(
        device.level_range(LevelType::X),
        constructor
            .provider()
            .expect("provider")
            .level_range(LevelType::X)
    );
}

#[test]
fn test_device_lookup_creates_each_cursor_once() {
    // Arrange
    let rig = rig();

    // Act
    let first = rig.provider.device(3).expect("device");
    let again = rig.provider.device(3).expect("device");
    let other = rig.provider.device(4).expect("device");

    // Assert
    assert!(Arc::ptr_eq(&first, &again));
    assert_ne!(first.id(), other.id());
    assert_eq!(rig.provider.devices().len(), 2);
    assert_eq!(rig.manager.devices().len(), 2);
}

#[test]
fn test_cursor_removal_unregisters_device() {
    // Arrange
    let rig = rig();
    let listener = RecordingListener::new();
    rig.manager.add_listener(listener.clone());
    rig.manager.set_paused(false);
    rig.feed.push_sample(1, 1, 1.0, 1.0, 0.0, 0);
    assert!(wait_until(DEADLINE, || rig.manager.devices().len() == 1));

    // Act
    rig.feed.remove_cursor(1);

    // Assert
    assert!(wait_until(DEADLINE, || rig.manager.devices().is_empty()));
    assert_eq!(
        listener.changes().last(),
        Some(&Change::Removed {
            name: "Simulated pen 1".into()
        })
    );
    assert!(rig.provider.devices().is_empty());
}

#[test]
fn test_failed_cursor_removal_keeps_device_tracked() {
    // Arrange: the device disappears from the registry behind the provider's back
    let rig = rig();
    rig.manager.set_paused(false);
    let device = rig.provider.device(3).expect("device");
    rig.manager
        .fire_device_removed(rig.provider.constructor_id(), &device)
        .expect("external removal");

    // Act
    rig.feed.remove_cursor(3);

    // Assert
    assert!(wait_until(DEADLINE, || rig.provider.is_faulted()));
    let tracked = rig.provider.devices();
    assert_eq!(tracked.len(), 1);
    assert!(Arc::ptr_eq(&tracked[0], &device));
}

// ── Sample filtering ──────────────────────────────────────────────────────────

#[test]
fn test_unchanged_levels_are_filtered_until_resume() {
    // Arrange
    let rig = rig();
    rig.manager.set_paused(false);
    rig.feed.push_sample(0, 1, 50.0, 60.0, 0.0, 0);
    assert!(wait_until(DEADLINE, || rig.scheduler.level_events() == 1));

    // Act: the same position again is filtered out
    rig.feed.push_sample(0, 2, 50.0, 60.0, 0.0, 0);
    settle(&rig.provider);
    assert_eq!(rig.scheduler.level_events(), 1);

    // Act: after a pause round trip it is reported again
    rig.manager.set_paused(true);
    rig.manager.set_paused(false);
    rig.feed.push_sample(0, 3, 50.0, 60.0, 0.0, 0);

    // Assert
    assert!(wait_until(DEADLINE, || rig.scheduler.level_events() == 2));
    match rig.scheduler.events().last() {
        Some(Scheduled::Levels { levels, on_screen, .. }) => {
            assert_eq!(levels.len(), 3);
            assert!(!on_screen);
        }
        other => panic!("expected a level event, got {other:?}"),
    }
}

#[test]
fn test_button_transitions_are_scheduled_once_each() {
    // Arrange
    let rig = rig();
    rig.manager.set_paused(false);

    // Act
    rig.feed.push_sample(0, 1, 1.0, 1.0, 0.4, 0b01);
    rig.feed.push_sample(0, 2, 1.0, 1.0, 0.4, 0b01);
    rig.feed.push_sample(0, 3, 1.0, 1.0, 0.0, 0b10);

    // Assert
    assert!(wait_until(DEADLINE, || rig.scheduler.buttons().len() == 3));
    settle(&rig.provider);
    assert_eq!(
        rig.scheduler.buttons(),
        vec![
            Button::new(ButtonKind::Left, true),
            Button::new(ButtonKind::Left, false),
            Button::new(ButtonKind::Center, true),
        ]
    );
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[test]
fn test_source_failure_stops_only_that_provider() {
    // Arrange
    let scheduler = RecordingScheduler::new();
    let (broken, broken_feed) = simulated_constructor("Broken");
    let (healthy, healthy_feed) = simulated_constructor("Healthy");
    let manager = manager_with(
        scheduler.clone(),
        vec![
            broken.clone() as Arc<dyn ProviderConstructor>,
            healthy.clone() as Arc<dyn ProviderConstructor>,
        ],
    );
    manager.set_paused(false);
    let broken = broken.provider().expect("broken provider");

    // Act
    broken_feed.fail(SourceError::ContextLost("unplugged".into()));

    // Assert
    assert!(wait_until(DEADLINE, || broken.is_faulted()));
    healthy_feed.define_cursor(0, "Healthy pen", DeviceKind::Stylus);
    healthy_feed.push_sample(0, 1, 2.0, 2.0, 0.1, 0);
    assert!(wait_until(DEADLINE, || scheduler.level_events() == 1));
    assert!(matches!(
        scheduler.events().first(),
        Some(Scheduled::Levels { device, .. }) if device == "Healthy pen"
    ));
    assert!(!manager.paused());
}

#[test]
fn test_provider_loop_ends_with_its_manager() {
    // Arrange
    let rig = rig();
    rig.manager.set_paused(false);
    let provider = Arc::clone(&rig.provider);
    settle(&provider);

    // Act
    drop(rig);

    // Assert: no further drain passes once the manager is gone
    thread::sleep(TEST_PERIOD * 4);
    let after_drop = provider.drain_cycles();
    thread::sleep(TEST_PERIOD * 4);
    assert_eq!(provider.drain_cycles(), after_drop);
}
