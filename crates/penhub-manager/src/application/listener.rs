//! Device-added / device-removed notification bus.
//!
//! Listeners are kept in registration order.  Dispatch never iterates the
//! live list: it takes a point-in-time snapshot (an `Arc<[..]>` that is rebuilt
//! lazily after every add/remove), so a listener may add or remove listeners
//! from inside a callback without disturbing the notification in flight.

use std::sync::Arc;

use parking_lot::Mutex;
use penhub_core::{ConstructorId, Device};

/// Observer of the manager's device registry.
pub trait ManagerListener: Send + Sync {
    /// A device was registered and received its id.
    fn device_added(&self, constructor: ConstructorId, device: &Arc<Device>);

    /// A device was removed from the registry.
    fn device_removed(&self, constructor: ConstructorId, device: &Arc<Device>);
}

/// Handle returned by [`ListenerBus::add`]; pass it back to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Snapshot = Arc<[Arc<dyn ManagerListener>]>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn ManagerListener>)>,
    /// Cached dispatch snapshot; `None` after a mutation.
    snapshot: Option<Snapshot>,
}

/// Thread-safe, ordered listener list.
#[derive(Default)]
pub struct ListenerBus {
    inner: Mutex<BusInner>,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener and returns its handle.
    pub fn add(&self, listener: Arc<dyn ManagerListener>) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        inner.snapshot = None;
        id
    }

    /// Removes a listener.  Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        let removed = inner.listeners.len() != before;
        if removed {
            inner.snapshot = None;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The listeners registered right now, in registration order.
    pub fn snapshot(&self) -> Snapshot {
        let mut inner = self.inner.lock();
        if let Some(snapshot) = &inner.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot: Snapshot = inner
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect::<Vec<_>>()
            .into();
        inner.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub(crate) fn notify_added(&self, constructor: ConstructorId, device: &Arc<Device>) {
        for listener in self.snapshot().iter() {
            listener.device_added(constructor, device);
        }
    }

    pub(crate) fn notify_removed(&self, constructor: ConstructorId, device: &Arc<Device>) {
        for listener in self.snapshot().iter() {
            listener.device_removed(constructor, device);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
