//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the platform
//! config directory, falls back to defaults on first run and writes changes
//! back to disk.

pub mod config;
