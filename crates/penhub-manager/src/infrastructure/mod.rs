//! Infrastructure layer: concrete providers and OS-facing adapters.
//!
//! Contains the native packet-source binding (with a simulated tablet), the
//! polling / system-mouse / emulation providers, TOML configuration storage
//! and the tracing-based scheduler used by the demo binary.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `penhub_core`, but MUST NOT be imported by the `application` layer.

pub mod logging;
pub mod native;
pub mod providers;
pub mod storage;
