//! Optional "one manager per process" policy.
//!
//! Some GUI integrations install process-wide hooks and break if two managers
//! exist at the same time.  Such an integration builds its manager with
//! [`InstancePolicy::single`].  A process-wide [`InstanceRegistry`] counts the
//! live managers and enforces the rule:
//!
//! - a manager that enforces single mode can only be created when no other
//!   manager is alive;
//! - while a single-mode manager is alive, no further manager can be created.
//!
//! Dropping the [`InstanceGuard`] (which every manager owns) releases the slot.

use parking_lot::Mutex;

use super::manager::ManagerError;

/// How a manager treats other managers in the same process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstancePolicy {
    /// Refuse to coexist with any other manager.
    pub enforce_single: bool,
}

impl InstancePolicy {
    /// Allows any number of managers.
    pub fn shared() -> Self {
        Self { enforce_single: false }
    }

    /// Requires this manager to be the only one in the process.
    pub fn single() -> Self {
        Self { enforce_single: true }
    }
}

#[derive(Debug, Default)]
struct Counter {
    live: usize,
    single_mode: bool,
}

/// Counts live managers and remembers whether single mode is active.
#[derive(Debug)]
pub struct InstanceRegistry {
    counter: Mutex<Counter>,
}

static GLOBAL: InstanceRegistry = InstanceRegistry::new();

impl InstanceRegistry {
    pub const fn new() -> Self {
        Self {
            counter: parking_lot::const_mutex(Counter {
                live: 0,
                single_mode: false,
            }),
        }
    }

    /// The registry shared by every manager in this process.
    pub fn global() -> &'static InstanceRegistry {
        &GLOBAL
    }

    /// Registers one more manager under `policy`.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::SingletonModeConflict`] when `policy` enforces single
    ///   mode but other managers are alive.
    /// - [`ManagerError::SingletonViolation`] when a single-mode manager is
    ///   alive already.
    pub fn acquire(&self, policy: InstancePolicy) -> Result<InstanceGuard<'_>, ManagerError> {
        let mut counter = self.counter.lock();
        if counter.single_mode && counter.live != 0 {
            return Err(ManagerError::SingletonViolation);
        }
        if policy.enforce_single {
            if counter.live != 0 {
                return Err(ManagerError::SingletonModeConflict { live: counter.live });
            }
            counter.single_mode = true;
        }
        counter.live += 1;
        Ok(InstanceGuard { registry: self })
    }

    /// Number of managers currently alive.
    pub fn live(&self) -> usize {
        self.counter.lock().live
    }

    fn release(&self) {
        let mut counter = self.counter.lock();
        counter.live = counter.live.saturating_sub(1);
        if counter.live == 0 {
            counter.single_mode = false;
        }
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one manager slot reserved until dropped.
#[derive(Debug)]
pub struct InstanceGuard<'a> {
    registry: &'a InstanceRegistry,
}

impl Drop for InstanceGuard<'_> {
    fn drop(&mut self) {
        self.registry.release();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
