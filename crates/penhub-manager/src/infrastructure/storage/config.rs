//! TOML configuration for penhub hosts.
//!
//! The file lives in the platform config directory:
//! - Windows:  `%APPDATA%\penhub\config.toml`
//! - Linux:    `~/.config/penhub/config.toml`
//! - macOS:    `~/Library/Application Support/penhub/config.toml`
//!
//! Example:
//!
//! ```toml
//! [manager]
//! enforce_single_manager = false
//! log_level = "info"
//! start_running = true
//!
//! [polling]
//! period_ms = 10
//!
//! [providers]
//! emulation = true
//! system_mouse = true
//! native = true
//!
//! [screen]
//! width = 1920
//! height = 1080
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section or a
//! missing key all fall back to the values above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::instance_policy::InstancePolicy;
use crate::application::manager::ManagerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub manager: ManagerSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub screen: ScreenSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManagerSection {
    /// Refuse to run alongside another manager in the same process.
    #[serde(default)]
    pub enforce_single_manager: bool,
    /// `tracing` filter directive, e.g. `"info"` or `"penhub_manager=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Unpause the manager as soon as discovery completes.
    #[serde(default = "default_true")]
    pub start_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingSection {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

/// Which providers the host offers to the manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvidersSection {
    #[serde(default = "default_true")]
    pub emulation: bool,
    #[serde(default = "default_true")]
    pub system_mouse: bool,
    #[serde(default = "default_true")]
    pub native: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenSection {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_period_ms() -> u64 {
    10
}
fn default_screen_width() -> u32 {
    1920
}
fn default_screen_height() -> u32 {
    1080
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            enforce_single_manager: false,
            log_level: default_log_level(),
            start_running: default_true(),
        }
    }
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
        }
    }
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            emulation: true,
            system_mouse: true,
            native: true,
        }
    }
}

impl Default for ScreenSection {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

impl AppConfig {
    /// The manager options this configuration asks for.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            instance_policy: InstancePolicy {
                enforce_single: self.manager.enforce_single_manager,
            },
        }
    }

    /// Polling period; zero is raised to one millisecond.
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.polling.period_ms.max(1))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Platform directory holding `config.toml`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory cannot
/// be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Full path of the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the default config file, or defaults if it does not exist yet.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `path`, returning `AppConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to the default config file.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, config)
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialisation fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("penhub"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("penhub"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("penhub")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
