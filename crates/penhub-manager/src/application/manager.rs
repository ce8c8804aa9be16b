//! Manager: the single coordination point of penhub.
//!
//! The [`Manager`] owns
//!
//! - the registered provider constructors (one [`ConstructorSlot`] each),
//! - the live device registry, mapping small stable [`DeviceId`]s to devices,
//! - the global pause flag,
//! - the listener bus.
//!
//! It forwards samples from providers to the external [`EventScheduler`].
//!
//! # Locking (for beginners)
//!
//! All registry, pause and constructor mutations happen under one manager-wide
//! *re-entrant* lock.  Listeners are notified while that lock is held, which
//! gives every listener a total order of events; re-entrancy lets a listener
//! call straight back into the manager (for example to query
//! [`Manager::devices`]) from inside a notification without deadlocking.
//!
//! The state sits in a `RefCell` inside the lock.  A `RefCell` borrow is never
//! held across a call into a listener or a provider, so those calls may borrow
//! again on the same thread.
//!
//! Lock order is always *manager lock → provider lock*.  Providers must not call
//! into the manager while holding one of their own locks that
//! [`Provider::manager_paused`] or [`Provider::devices`] also takes.
//!
//! # Discovery
//!
//! [`Manager::new`] starts a short-lived thread that asks the
//! [`ProviderSource`] for the initial constructors and adds each one.  Calls to
//! [`Manager::provider_constructors`] block until that pass has finished.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, ReentrantMutex};
use penhub_core::{Button, ConstructorId, Device, DeviceId, Level, Scroll, MAX_DEVICE_ID};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::instance_policy::{InstanceGuard, InstancePolicy, InstanceRegistry};
use super::listener::{ListenerBus, ListenerId, ManagerListener};
use super::provider::{
    ConstructionError, ConstructorSlot, Provider, ProviderConstructor, ProviderContext,
    ProviderKind, ProviderSource,
};
use super::scheduler::EventScheduler;

/// Errors returned by [`Manager`] operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The same constructor instance was added twice.
    #[error("provider constructor {name:?} was already added")]
    ConstructorAlreadyAdded { name: String },

    /// The constructor failed to build its provider.  Stored in the slot; never
    /// retried.
    #[error("provider {name:?} could not be constructed")]
    Construction {
        name: String,
        #[source]
        source: Arc<ConstructionError>,
    },

    /// A removal named a device that is not registered.
    #[error("device {name:?} is not registered")]
    DeviceNotFound { name: String },

    /// The device already carries an id.
    #[error("device {name:?} is already registered as {id}")]
    DeviceAlreadyRegistered { name: String, id: DeviceId },

    /// All ids in `0..=127` are in use.
    #[error("all {} device ids are in use", MAX_DEVICE_ID as usize + 1)]
    DeviceIdsExhausted,

    /// A single-mode manager is alive; no further manager may be created.
    #[error("another manager runs in single-instance mode")]
    SingletonViolation,

    /// Single-instance mode was requested while other managers are alive.
    #[error("cannot enforce a single manager while {live} other manager(s) exist")]
    SingletonModeConflict { live: usize },

    /// The manager behind a [`ManagerHandle`] is gone.
    #[error("the manager has been dropped")]
    ManagerDropped,

    /// The discovery thread could not be started.
    #[error("failed to start provider discovery: {0}")]
    DiscoveryThread(#[source] std::io::Error),
}

/// Construction-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerConfig {
    pub instance_policy: InstancePolicy,
}

struct ManagerState {
    constructors: Vec<Arc<ConstructorSlot>>,
    devices: BTreeMap<DeviceId, Arc<Device>>,
    /// First registered mouse-kind device; pinned until it is removed.
    system_mouse: Option<Arc<Device>>,
    next_constructor_id: u32,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            constructors: Vec::new(),
            devices: BTreeMap::new(),
            system_mouse: None,
            next_constructor_id: 0,
        }
    }

    fn lowest_free_id(&self) -> Option<DeviceId> {
        (0..=MAX_DEVICE_ID)
            .filter_map(DeviceId::new)
            .find(|id| !self.devices.contains_key(id))
    }

    fn constructed_providers(&self) -> Vec<Arc<dyn Provider>> {
        self.constructors
            .iter()
            .filter_map(|slot| slot.constructed())
            .collect()
    }
}

struct ManagerInner {
    state: ReentrantMutex<RefCell<ManagerState>>,
    /// Written only under `state`; read lock-free on the scheduling fast path.
    paused: AtomicBool,
    listeners: ListenerBus,
    scheduler: Arc<dyn EventScheduler>,
    discovery: Arc<DiscoveryLatch>,
    _instance: InstanceGuard<'static>,
}

/// Shared, cloneable handle to the device manager.
///
/// Cloning is cheap; every clone talks to the same registry.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    /// Creates a paused manager registered in the process-wide
    /// [`InstanceRegistry`] and starts the discovery pass over `source`.
    ///
    /// # Errors
    ///
    /// Returns an instance-policy error if `config.instance_policy` conflicts
    /// with other live managers, or [`ManagerError::DiscoveryThread`] if the
    /// discovery thread cannot be spawned.
    pub fn new(
        config: ManagerConfig,
        scheduler: Arc<dyn EventScheduler>,
        source: Box<dyn ProviderSource>,
    ) -> Result<Self, ManagerError> {
        Self::with_registry(config, InstanceRegistry::global(), scheduler, source)
    }

    /// Like [`Manager::new`] but counts the manager in `registry`.
    pub fn with_registry(
        config: ManagerConfig,
        registry: &'static InstanceRegistry,
        scheduler: Arc<dyn EventScheduler>,
        source: Box<dyn ProviderSource>,
    ) -> Result<Self, ManagerError> {
        let instance = registry.acquire(config.instance_policy)?;
        let manager = Self {
            inner: Arc::new(ManagerInner {
                state: ReentrantMutex::new(RefCell::new(ManagerState::new())),
                paused: AtomicBool::new(true),
                listeners: ListenerBus::new(),
                scheduler,
                discovery: Arc::new(DiscoveryLatch::default()),
                _instance: instance,
            }),
        };

        let weak = Arc::downgrade(&manager.inner);
        let latch = Arc::clone(&manager.inner.discovery);
        thread::Builder::new()
            .name("penhub-provider-discovery".into())
            .spawn(move || run_discovery(weak, latch, source))
            .map_err(ManagerError::DiscoveryThread)?;

        Ok(manager)
    }

    /// A weak, non-owning handle for providers and listeners.
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ── Providers ────────────────────────────────────────────────────────────

    /// Registers and constructs a provider.
    ///
    /// Returns `Ok(None)` without registering anything when the constructor
    /// reports that it cannot run on this platform.  On success the provider is
    /// unpaused right away if the manager is running, and every device it
    /// already exposes is registered.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::ConstructorAlreadyAdded`] if this constructor instance
    ///   was added before.
    /// - [`ManagerError::Construction`] if building the provider failed.
    /// - Any error from registering the provider's initial devices.  The
    ///   provider stays constructed in its slot (constructors are built once),
    ///   devices this call already registered are removed again, and none of
    ///   them can be registered a second time.
    pub fn add_provider(
        &self,
        constructor: Arc<dyn ProviderConstructor>,
    ) -> Result<Option<Arc<dyn Provider>>, ManagerError> {
        let handle = self.handle();
        if !constructor.constructable(&handle) {
            debug!("provider {:?} is not constructable here", constructor.name());
            return Ok(None);
        }

        let slot = {
            let guard = self.inner.state.lock();
            let mut state = guard.borrow_mut();
            if state.constructors.iter().any(|s| s.holds(&constructor)) {
                return Err(ManagerError::ConstructorAlreadyAdded {
                    name: constructor.name().to_string(),
                });
            }
            let id = ConstructorId(state.next_constructor_id);
            state.next_constructor_id += 1;
            let slot = Arc::new(ConstructorSlot::new(id, Arc::clone(&constructor)));
            state.constructors.push(Arc::clone(&slot));
            slot
        };

        // Construction may open native resources; keep the manager lock free.
        let outcome = constructor.construct(ProviderContext {
            manager: handle,
            constructor: slot.id(),
        });

        let guard = self.inner.state.lock();
        let provider = slot
            .settle(outcome)
            .map_err(|source| ManagerError::Construction {
                name: slot.name().to_string(),
                source,
            })?;

        if !self.paused() {
            provider.manager_paused(false);
        }
        let mut registered = Vec::new();
        for device in provider.devices() {
            if device.id().is_some() {
                continue;
            }
            if let Err(error) = self.fire_device_added(slot.id(), &device) {
                for device in registered.iter().rev() {
                    if let Err(undo) = self.fire_device_removed(slot.id(), device) {
                        warn!("rolling back {device} failed: {undo}");
                    }
                }
                return Err(error);
            }
            registered.push(device);
        }
        drop(guard);

        info!(
            "provider {:?} constructed as {}",
            provider.name(),
            slot.id()
        );
        Ok(Some(provider))
    }

    /// Every registered constructor slot, in registration order.
    ///
    /// Blocks until the initial discovery pass has completed.  Must not be
    /// called from a listener during discovery.
    pub fn provider_constructors(&self) -> Vec<Arc<ConstructorSlot>> {
        self.wait_for_discovery();
        let guard = self.inner.state.lock();
        let constructors = guard.borrow().constructors.clone();
        constructors
    }

    /// Blocks until the initial discovery pass has completed.
    pub fn wait_for_discovery(&self) {
        let mut done = self.inner.discovery.done.lock();
        while !*done {
            self.inner.discovery.cv.wait(&mut done);
        }
    }

    /// Like [`Manager::wait_for_discovery`] with an upper bound.  Returns
    /// `true` if discovery completed in time.
    pub fn wait_for_discovery_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.inner.discovery.done.lock();
        if !*done {
            self.inner.discovery.cv.wait_for(&mut done, timeout);
        }
        *done
    }

    /// Every provider that was constructed successfully.
    pub fn constructed_providers(&self) -> Vec<Arc<dyn Provider>> {
        let guard = self.inner.state.lock();
        let providers = guard.borrow().constructed_providers();
        providers
    }

    /// The first constructed provider of `kind`.
    pub fn provider(&self, kind: ProviderKind) -> Option<Arc<dyn Provider>> {
        self.constructed_providers()
            .into_iter()
            .find(|p| p.kind() == kind)
    }

    /// The provider owning the system-fallback device.
    pub fn system_mouse_provider(&self) -> Option<Arc<dyn Provider>> {
        let owner = self.system_mouse_device()?.owner();
        self.constructed_providers()
            .into_iter()
            .find(|p| p.constructor_id() == owner)
    }

    /// Ordinary pointer movement was observed; lets providers re-activate.
    pub fn pointer_activity(&self) {
        for provider in self.constructed_providers() {
            provider.pointer_activity();
        }
    }

    // ── Device registry ──────────────────────────────────────────────────────

    /// Registers `device` under the lowest free id and notifies listeners.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::DeviceAlreadyRegistered`] if the device has an id.
    /// - [`ManagerError::DeviceIdsExhausted`] if all 128 ids are in use.
    pub fn fire_device_added(
        &self,
        constructor: ConstructorId,
        device: &Arc<Device>,
    ) -> Result<DeviceId, ManagerError> {
        let guard = self.inner.state.lock();
        let id = {
            let mut state = guard.borrow_mut();
            if let Some(id) = device.id() {
                return Err(ManagerError::DeviceAlreadyRegistered {
                    name: device.name().to_string(),
                    id,
                });
            }
            let Some(id) = state.lowest_free_id() else {
                error!("device id space exhausted; cannot register {:?}", device.name());
                return Err(ManagerError::DeviceIdsExhausted);
            };
            if let Err(existing) = device.assign_id(id) {
                return Err(ManagerError::DeviceAlreadyRegistered {
                    name: device.name().to_string(),
                    id: existing,
                });
            }
            state.devices.insert(id, Arc::clone(device));
            if device.is_mouse() && state.system_mouse.is_none() {
                state.system_mouse = Some(Arc::clone(device));
            }
            id
        };

        info!("device added: {device} (id {id}, {constructor})");
        self.inner.listeners.notify_added(constructor, device);
        drop(guard);
        Ok(id)
    }

    /// Removes `device` from the registry and notifies listeners.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::DeviceNotFound`] if `device` is not registered.
    pub fn fire_device_removed(
        &self,
        constructor: ConstructorId,
        device: &Arc<Device>,
    ) -> Result<(), ManagerError> {
        let guard = self.inner.state.lock();
        {
            let mut state = guard.borrow_mut();
            let registered = device
                .id()
                .and_then(|id| state.devices.get(&id))
                .is_some_and(|d| Arc::ptr_eq(d, device));
            if !registered {
                return Err(ManagerError::DeviceNotFound {
                    name: device.name().to_string(),
                });
            }
            if let Some(id) = device.id() {
                state.devices.remove(&id);
            }
            if state
                .system_mouse
                .as_ref()
                .is_some_and(|m| Arc::ptr_eq(m, device))
            {
                state.system_mouse = None;
            }
        }

        info!("device removed: {device} ({constructor})");
        self.inner.listeners.notify_removed(constructor, device);
        drop(guard);
        Ok(())
    }

    /// Registered devices, ordered by id.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        let guard = self.inner.state.lock();
        let devices = guard.borrow().devices.values().cloned().collect();
        devices
    }

    pub fn device(&self, id: DeviceId) -> Option<Arc<Device>> {
        let guard = self.inner.state.lock();
        let device = guard.borrow().devices.get(&id).cloned();
        device
    }

    /// The system-fallback device: the first mouse-kind device registered.
    pub fn system_mouse_device(&self) -> Option<Arc<Device>> {
        let guard = self.inner.state.lock();
        let device = guard.borrow().system_mouse.clone();
        device
    }

    pub fn is_system_mouse_device(&self, device: &Device) -> bool {
        self.system_mouse_device()
            .is_some_and(|m| std::ptr::eq(Arc::as_ptr(&m), device))
    }

    // ── Pause state ──────────────────────────────────────────────────────────

    /// `true` while the manager is paused.  Managers start paused.
    pub fn paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    /// Pauses or resumes every provider.
    ///
    /// Mirrors the state to the scheduler first, then flips the global flag,
    /// then fans it out to every constructed provider, all under the manager
    /// lock.  A call that does not change the state does nothing.
    pub fn set_paused(&self, paused: bool) {
        let guard = self.inner.state.lock();
        if self.paused() == paused {
            return;
        }
        self.inner.scheduler.set_paused(paused);
        self.inner.paused.store(paused, Ordering::Release);
        let providers = guard.borrow().constructed_providers();
        for provider in &providers {
            provider.manager_paused(paused);
        }
        drop(guard);
        info!(
            "manager {} ({} provider(s))",
            if paused { "paused" } else { "running" },
            providers.len()
        );
    }

    // ── Listeners ────────────────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn ManagerListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    // ── Scheduling pass-through ──────────────────────────────────────────────

    /// Forwards a button event unless the manager is paused.
    pub fn schedule_button_event(&self, device: &Device, device_time: u64, button: Button) {
        if !self.paused() {
            self.inner
                .scheduler
                .schedule_button_event(device, device_time, button);
        }
    }

    /// Forwards a scroll event unless the manager is paused.
    pub fn schedule_scroll_event(&self, device: &Device, device_time: u64, scroll: Scroll) {
        if !self.paused() {
            self.inner
                .scheduler
                .schedule_scroll_event(device, device_time, scroll);
        }
    }

    /// Forwards a level event unless the manager is paused.  Returns `false`
    /// when paused or when the scheduler dropped the event.
    pub fn schedule_level_event(
        &self,
        device: &Device,
        device_time: u64,
        levels: &[Level],
        levels_on_screen: bool,
    ) -> bool {
        if self.paused() {
            return false;
        }
        self.inner
            .scheduler
            .schedule_level_event(device, device_time, levels, levels_on_screen)
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("paused", &self.paused())
            .field("devices", &self.devices().len())
            .finish()
    }
}

/// One-shot "initial discovery finished" flag.
#[derive(Default)]
struct DiscoveryLatch {
    done: Mutex<bool>,
    cv: Condvar,
}

/// Body of the discovery thread.
///
/// Holds the manager strongly only while adding one constructor, so the
/// manager can be dropped while discovery is still running.
fn run_discovery(
    weak: Weak<ManagerInner>,
    latch: Arc<DiscoveryLatch>,
    source: Box<dyn ProviderSource>,
) {
    let _done = DiscoveryDone(latch);
    let constructors = source.provider_constructors();
    debug!("discovery found {} provider constructor(s)", constructors.len());

    for constructor in constructors {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let manager = Manager { inner };
        let name = constructor.name().to_string();
        match manager.add_provider(constructor) {
            Ok(Some(_)) => {}
            Ok(None) => debug!("skipping provider {name:?}"),
            Err(e) => warn!("provider {name:?} unavailable: {e}"),
        }
    }
}

/// Marks discovery complete when the discovery thread ends, even on panic.
struct DiscoveryDone(Arc<DiscoveryLatch>);

impl Drop for DiscoveryDone {
    fn drop(&mut self) {
        *self.0.done.lock() = true;
        self.0.cv.notify_all();
    }
}

// ── ManagerHandle ─────────────────────────────────────────────────────────────

/// Non-owning handle to a [`Manager`].
///
/// Providers keep one of these instead of a `Manager` so that the manager (which
/// owns the providers) can be dropped.  Every call on a handle whose manager is
/// gone is a no-op, reports "paused", or fails with
/// [`ManagerError::ManagerDropped`].
#[derive(Clone, Default)]
pub struct ManagerHandle {
    inner: Weak<ManagerInner>,
}

impl ManagerHandle {
    /// A handle that never had a manager.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn upgrade(&self) -> Option<Manager> {
        self.inner.upgrade().map(|inner| Manager { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Forwards pointer movement to the manager's providers, if any.
    pub fn pointer_activity(&self) {
        if let Some(manager) = self.upgrade() {
            manager.pointer_activity();
        }
    }

    /// The manager's pause state; `true` once the manager is gone.
    pub fn paused(&self) -> bool {
        self.upgrade().map_or(true, |m| m.paused())
    }

    pub fn fire_device_added(
        &self,
        constructor: ConstructorId,
        device: &Arc<Device>,
    ) -> Result<DeviceId, ManagerError> {
        self.upgrade()
            .ok_or(ManagerError::ManagerDropped)?
            .fire_device_added(constructor, device)
    }

    pub fn fire_device_removed(
        &self,
        constructor: ConstructorId,
        device: &Arc<Device>,
    ) -> Result<(), ManagerError> {
        self.upgrade()
            .ok_or(ManagerError::ManagerDropped)?
            .fire_device_removed(constructor, device)
    }

    pub fn schedule_button_event(&self, device: &Device, device_time: u64, button: Button) {
        if let Some(manager) = self.upgrade() {
            manager.schedule_button_event(device, device_time, button);
        }
    }

    pub fn schedule_scroll_event(&self, device: &Device, device_time: u64, scroll: Scroll) {
        if let Some(manager) = self.upgrade() {
            manager.schedule_scroll_event(device, device_time, scroll);
        }
    }

    pub fn schedule_level_event(
        &self,
        device: &Device,
        device_time: u64,
        levels: &[Level],
        levels_on_screen: bool,
    ) -> bool {
        self.upgrade().is_some_and(|m| {
            m.schedule_level_event(device, device_time, levels, levels_on_screen)
        })
    }
}

impl std::fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
