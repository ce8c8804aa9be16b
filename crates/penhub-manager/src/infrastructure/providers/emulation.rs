//! Emulation provider: one synthetic device driven by code.
//!
//! Useful for automation and tests that need pen input without hardware.  The
//! constructor is always constructable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use penhub_core::{
    Button, ButtonKind, ConstructorId, Device, DeviceKind, Level, LevelRanges, Scroll,
    ScrollDirection,
};

use super::current_time_millis;
use crate::application::manager::ManagerHandle;
use crate::application::provider::{
    ConstructionError, Provider, ProviderConstructor, ProviderContext, ProviderKind,
};

const NAME: &str = "Emulation";

/// Builds the [`EmulationProvider`] and keeps a typed handle to it.
#[derive(Default)]
pub struct EmulationConstructor {
    provider: OnceLock<Arc<EmulationProvider>>,
}

impl EmulationConstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider, once the manager has constructed it.
    pub fn provider(&self) -> Option<Arc<EmulationProvider>> {
        self.provider.get().cloned()
    }
}

impl ProviderConstructor for EmulationConstructor {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Emulation
    }

    fn constructable(&self, _manager: &ManagerHandle) -> bool {
        true
    }

    fn construct(&self, context: ProviderContext) -> Result<Arc<dyn Provider>, ConstructionError> {
        let provider = self
            .provider
            .get_or_init(|| Arc::new(EmulationProvider::new(context)));
        Ok(Arc::clone(provider) as Arc<dyn Provider>)
    }
}

/// Injects button, scroll and level events for its single device.
pub struct EmulationProvider {
    constructor: ConstructorId,
    manager: ManagerHandle,
    device: Arc<Device>,
    paused: AtomicBool,
}

impl EmulationProvider {
    fn new(context: ProviderContext) -> Self {
        let device = Arc::new(Device::new(
            NAME,
            DeviceKind::Emulation,
            context.constructor,
            "emulation:0",
            LevelRanges::default(),
        ));
        Self {
            constructor: context.constructor,
            manager: context.manager,
            device,
            paused: AtomicBool::new(true),
        }
    }

    /// The synthetic device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Presses or releases `kind`.  Dropped while paused.
    pub fn emulate_button(&self, kind: ButtonKind, pressed: bool) {
        if self.is_paused() {
            return;
        }
        self.manager.schedule_button_event(
            &self.device,
            current_time_millis(),
            Button::new(kind, pressed),
        );
    }

    /// Scrolls `value` units.  Dropped while paused.
    pub fn emulate_scroll(&self, direction: ScrollDirection, value: u32) {
        if self.is_paused() {
            return;
        }
        self.manager.schedule_scroll_event(
            &self.device,
            current_time_millis(),
            Scroll::new(direction, value),
        );
    }

    /// Sets levels (movement in screen coordinates).  Returns `false` when
    /// paused or when the scheduler dropped the event.
    pub fn emulate_levels(&self, levels: &[Level]) -> bool {
        if self.is_paused() || levels.is_empty() {
            return false;
        }
        self.manager
            .schedule_level_event(&self.device, current_time_millis(), levels, true)
    }
}

impl Provider for EmulationProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Emulation
    }

    fn constructor_id(&self) -> ConstructorId {
        self.constructor
    }

    fn devices(&self) -> Vec<Arc<Device>> {
        vec![Arc::clone(&self.device)]
    }

    fn manager_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
