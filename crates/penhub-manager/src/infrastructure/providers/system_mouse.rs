//! System mouse provider: the fallback when no tablet driver is available.
//!
//! The GUI integration forwards ordinary pointer events here.  Positions are
//! already in screen pixels, so level events are scheduled with
//! `levels_on_screen = true`.  The provider's single mouse-kind device is the
//! first mouse the manager sees and becomes its system-fallback device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use penhub_core::{Button, ButtonKind, ConstructorId, Device, DeviceKind, Level, LevelType, Scroll};
use tracing::trace;

use super::{current_time_millis, screen_relative_ranges};
use crate::application::manager::ManagerHandle;
use crate::application::provider::{
    ConstructionError, Provider, ProviderConstructor, ProviderContext, ProviderKind,
};

const NAME: &str = "System";

/// Builds the [`SystemMouseProvider`] for a screen of the given size.
pub struct SystemMouseConstructor {
    width: u32,
    height: u32,
    provider: OnceLock<Arc<SystemMouseProvider>>,
}

impl SystemMouseConstructor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            provider: OnceLock::new(),
        }
    }

    pub fn provider(&self) -> Option<Arc<SystemMouseProvider>> {
        self.provider.get().cloned()
    }
}

impl ProviderConstructor for SystemMouseConstructor {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::SystemMouse
    }

    fn constructable(&self, _manager: &ManagerHandle) -> bool {
        true
    }

    fn construct(&self, context: ProviderContext) -> Result<Arc<dyn Provider>, ConstructionError> {
        let (width, height) = (self.width, self.height);
        let provider = self
            .provider
            .get_or_init(|| Arc::new(SystemMouseProvider::new(context, width, height)));
        Ok(Arc::clone(provider) as Arc<dyn Provider>)
    }
}

pub struct SystemMouseProvider {
    constructor: ConstructorId,
    manager: ManagerHandle,
    device: Arc<Device>,
    paused: AtomicBool,
}

impl SystemMouseProvider {
    fn new(context: ProviderContext, width: u32, height: u32) -> Self {
        let device = Arc::new(Device::new(
            "Mouse",
            DeviceKind::Mouse,
            context.constructor,
            "system:mouse",
            screen_relative_ranges(width, height),
        ));
        Self {
            constructor: context.constructor,
            manager: context.manager,
            device,
            paused: AtomicBool::new(true),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The pointer moved to (`x`, `y`) in screen pixels.
    ///
    /// Every move counts as pointer activity for the other providers, even
    /// while this one is paused.  Returns whether a level event was scheduled.
    pub fn mouse_moved(&self, x: f32, y: f32) -> bool {
        self.manager.pointer_activity();
        if self.is_paused() {
            return false;
        }
        trace!("mouse moved to ({x}, {y})");
        self.manager.schedule_level_event(
            &self.device,
            current_time_millis(),
            &[Level::new(LevelType::X, x), Level::new(LevelType::Y, y)],
            true,
        )
    }

    pub fn mouse_button(&self, kind: ButtonKind, pressed: bool) {
        if self.is_paused() {
            return;
        }
        self.manager.schedule_button_event(
            &self.device,
            current_time_millis(),
            Button::new(kind, pressed),
        );
    }

    /// Wheel rotation; positive deltas scroll up.  A zero delta is ignored.
    pub fn mouse_wheel(&self, delta: i32) {
        if self.is_paused() {
            return;
        }
        if let Some(scroll) = Scroll::from_wheel_delta(delta) {
            self.manager
                .schedule_scroll_event(&self.device, current_time_millis(), scroll);
        }
    }
}

impl Provider for SystemMouseProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::SystemMouse
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
