//! Provider and provider-constructor contracts.
//!
//! A *provider* discovers devices and produces their samples.  Every provider
//! kind comes with a *constructor*: a small factory object that can tell,
//! without touching any native resource, whether the provider can exist on
//! this platform, and that builds it.
//!
//! The manager wraps every registered constructor in a [`ConstructorSlot`].
//! The slot is a construct-once cell:
//!
//! ```text
//! Unconstructed ──► Constructed(provider)
//!       │
//!       └─────────► Failed(error)
//! ```
//!
//! There is no way back.  A constructor that failed once stays failed; the
//! manager never retries it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use penhub_core::{ConstructorId, Device, LevelError, LevelType};
use thiserror::Error;

use super::manager::ManagerHandle;

/// Provider kinds known to penhub.  Used for typed provider lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// A provider driven by a native polling source (tablet driver).
    NativePolling,
    /// The system pointer fallback fed by the GUI integration.
    SystemMouse,
    /// The synthetic emulation provider.
    Emulation,
}

/// Error returned when a constructor cannot build its provider.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// The native capability (library, driver context) is not available.
    #[error("native capability unavailable: {0}")]
    Unavailable(String),

    /// The native source reported an unusable range for one of its levels.
    #[error("native source reports an invalid {level_type:?} range: {source}")]
    InvalidLevelRange {
        level_type: LevelType,
        #[source]
        source: LevelError,
    },

    /// The provider's background thread could not be started.
    #[error("failed to start acquisition thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// An active input backend.
///
/// Providers are shared between the manager and their own background threads,
/// so every method takes `&self`.
pub trait Provider: Send + Sync {
    /// Display name; usually the constructor's name.
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// The constructor slot this provider was built from.
    fn constructor_id(&self) -> ConstructorId;

    /// Devices this provider exposes right now.
    ///
    /// Devices returned here that have no id yet are registered by the manager
    /// when the provider is added.
    fn devices(&self) -> Vec<Arc<Device>>;

    /// Mirrors the manager's pause state.  Must not call back into the manager.
    fn manager_paused(&self, paused: bool);

    /// The provider's current (mirrored) pause state.
    fn is_paused(&self) -> bool;

    /// Ordinary pointer movement was observed by the GUI integration.
    ///
    /// Providers whose native channel can get stuck in a suspended state use
    /// this to force themselves active again.  The default does nothing.
    fn pointer_activity(&self) {}
}

impl fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("constructor", &self.constructor_id())
            .field("paused", &self.is_paused())
            .finish()
    }
}

/// Everything a constructor needs to build its provider.
#[derive(Clone)]
pub struct ProviderContext {
    /// Weak handle back to the manager.
    pub manager: ManagerHandle,
    /// The slot id the manager assigned to this constructor.
    pub constructor: ConstructorId,
}

/// Factory for one provider kind.
pub trait ProviderConstructor: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Whether the provider can exist on this platform.
    ///
    /// Must be cheap and must not touch native resources.
    fn constructable(&self, manager: &ManagerHandle) -> bool;

    /// Builds the provider.  The manager calls this at most once per
    /// constructor instance.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError`] when the native capability is missing or
    /// the provider's resources cannot be acquired.
    fn construct(&self, context: ProviderContext) -> Result<Arc<dyn Provider>, ConstructionError>;
}

/// State of a [`ConstructorSlot`].
#[derive(Clone)]
pub enum SlotState {
    Unconstructed,
    Constructed(Arc<dyn Provider>),
    Failed(Arc<ConstructionError>),
}

impl fmt::Debug for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Unconstructed => f.write_str("Unconstructed"),
            SlotState::Constructed(p) => write!(f, "Constructed({})", p.name()),
            SlotState::Failed(e) => write!(f, "Failed({e})"),
        }
    }
}

/// A registered constructor and the outcome of its single construction.
pub struct ConstructorSlot {
    id: ConstructorId,
    constructor: Arc<dyn ProviderConstructor>,
    state: Mutex<SlotState>,
}

impl ConstructorSlot {
    pub(crate) fn new(id: ConstructorId, constructor: Arc<dyn ProviderConstructor>) -> Self {
        Self {
            id,
            constructor,
            state: Mutex::new(SlotState::Unconstructed),
        }
    }

    pub fn id(&self) -> ConstructorId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.constructor.name()
    }

    pub fn kind(&self) -> ProviderKind {
        self.constructor.kind()
    }

    pub fn constructor(&self) -> &Arc<dyn ProviderConstructor> {
        &self.constructor
    }

    pub fn state(&self) -> SlotState {
        self.state.lock().clone()
    }

    /// The provider, once construction succeeded.
    pub fn constructed(&self) -> Option<Arc<dyn Provider>> {
        match &*self.state.lock() {
            SlotState::Constructed(provider) => Some(Arc::clone(provider)),
            _ => None,
        }
    }

    /// The construction error, if construction failed.
    pub fn construction_error(&self) -> Option<Arc<ConstructionError>> {
        match &*self.state.lock() {
            SlotState::Failed(error) => Some(Arc::clone(error)),
            _ => None,
        }
    }

    /// Returns `true` if `constructor` is the instance held by this slot.
    pub fn holds(&self, constructor: &Arc<dyn ProviderConstructor>) -> bool {
        same_instance(&self.constructor, constructor)
    }

    /// Records the construction outcome.  Only the first call has an effect.
    pub(crate) fn settle(
        &self,
        outcome: Result<Arc<dyn Provider>, ConstructionError>,
    ) -> Result<Arc<dyn Provider>, Arc<ConstructionError>> {
        let mut state = self.state.lock();
        match &*state {
            SlotState::Constructed(provider) => return Ok(Arc::clone(provider)),
            SlotState::Failed(error) => return Err(Arc::clone(error)),
            SlotState::Unconstructed => {}
        }
        match outcome {
            Ok(provider) => {
                *state = SlotState::Constructed(Arc::clone(&provider));
                Ok(provider)
            }
            Err(error) => {
                let error = Arc::new(error);
                *state = SlotState::Failed(Arc::clone(&error));
                Err(error)
            }
        }
    }
}

impl fmt::Debug for ConstructorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorSlot")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Compares trait-object `Arc`s by data pointer only.
fn same_instance(a: &Arc<dyn ProviderConstructor>, b: &Arc<dyn ProviderConstructor>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Supplies the initial set of constructors (usually the GUI integration).
///
/// The manager calls [`ProviderSource::provider_constructors`] exactly once,
/// on its discovery thread.
pub trait ProviderSource: Send {
    fn provider_constructors(&self) -> Vec<Arc<dyn ProviderConstructor>>;
}

impl ProviderSource for Vec<Arc<dyn ProviderConstructor>> {
    fn provider_constructors(&self) -> Vec<Arc<dyn ProviderConstructor>> {
        self.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
