//! Application layer: device identity, provider lifecycle and pause state.
//!
//! # What lives here? (for beginners)
//!
//! The application layer coordinates domain objects ([`penhub_core::Device`])
//! and talks to the outside world only through traits.  Nothing in here opens
//! a native driver, reads a file or knows which GUI toolkit is in use.
//!
//! # Sub-modules
//!
//! - **`manager`** – the [`manager::Manager`]: the single coordination point
//!   that owns the device registry, the registered provider constructors and
//!   the global pause flag.
//!
//! - **`provider`** – the [`provider::Provider`] and
//!   [`provider::ProviderConstructor`] traits every input backend implements,
//!   plus the construct-once slot the manager keeps for each constructor.
//!
//! - **`listener`** – the device-added / device-removed notification bus.
//!
//! - **`scheduler`** – the narrow contract of the external event scheduler
//!   that turns raw samples into application events.
//!
//! - **`instance_policy`** – optional "only one manager per process" mode.

pub mod instance_policy;
pub mod listener;
pub mod manager;
pub mod provider;
pub mod scheduler;
