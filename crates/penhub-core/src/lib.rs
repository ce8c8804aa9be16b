//! # penhub-core
//!
//! Shared domain types for penhub: the device handle, the per-axis level
//! model and the button/scroll values that providers hand to the event
//! scheduler.
//!
//! This crate has no OS dependencies and no threads.  Everything that runs
//! (the manager, the polling loops, the native packet sources) lives in
//! `penhub-manager`.
//!
//! # Architecture overview (for beginners)
//!
//! A pen tablet reports *packets*: one sample holding the pen position, the
//! tip pressure, the tilt and the state of the barrel buttons.  penhub splits
//! such a sample into:
//!
//! - **`domain::level`** – one scalar axis per [`LevelType`] (X, Y, pressure,
//!   tilt …) together with the fixed [`LevelRange`] the hardware reports for it.
//!
//! - **`domain::input`** – discrete values: [`Button`] presses/releases and
//!   [`Scroll`] steps.
//!
//! - **`domain::device`** – the [`Device`] a sample belongs to.  A device gets a
//!   small integer [`DeviceId`] from the manager the first time it is seen and
//!   keeps it for as long as it stays registered.

pub mod domain;

pub use domain::device::{ConstructorId, Device, DeviceId, DeviceKind, MAX_DEVICE_ID};
pub use domain::input::{Button, ButtonKind, Scroll, ScrollDirection};
pub use domain::level::{Level, LevelError, LevelRange, LevelRanges, LevelType};
