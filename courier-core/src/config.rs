//! Courier configuration file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.courier/
//!   config.yaml   (mode 0600, written by `courier config init`)
//! ```
//!
//! # API pattern
//!
//! Every function that touches the file has two forms:
//! - `fn_at(home: &Path, …)`: explicit home, used by tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sibling files SQLite writes next to the database in WAL mode.
const DATABASE_SIDECARS: [&str; 2] = ["-wal", "-shm"];

// ---------------------------------------------------------------------------
// 1. Settings
// ---------------------------------------------------------------------------

/// Change-detector tuning. All durations are milliseconds on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerSettings {
    /// Quiescence window that collapses a burst of file events.
    pub debounce_ms: u64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Lookback = interval × overlap factor.
    pub overlap_factor: f64,
    /// Retries after the first failed attempt of a cycle.
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    /// Subtracted from the earliest file mtime to seed the watermark.
    pub startup_margin_ms: u64,
    /// Longest lookback a single cycle will query.
    pub max_lookback_ms: u64,
    /// How long an emitted event suppresses re-emission of the same row state.
    pub event_cache_ttl_ms: u64,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_interval_ms: 100,
            max_interval_ms: 5_000,
            overlap_factor: 1.5,
            max_retries: 3,
            initial_retry_delay_ms: 1_000,
            startup_margin_ms: 60_000,
            max_lookback_ms: 24 * 60 * 60 * 1_000,
            event_cache_ttl_ms: 30 * 60 * 1_000,
        }
    }
}

impl ListenerSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn startup_margin(&self) -> Duration {
        Duration::from_millis(self.startup_margin_ms)
    }

    pub fn max_lookback(&self) -> Duration {
        Duration::from_millis(self.max_lookback_ms)
    }

    pub fn event_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.event_cache_ttl_ms)
    }
}

/// Outgoing promise timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    pub text_timeout_ms: u64,
    pub attachment_timeout_ms: u64,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            text_timeout_ms: 30_000,
            attachment_timeout_ms: 180_000,
        }
    }
}

impl OutgoingSettings {
    pub fn text_timeout(&self) -> Duration {
        Duration::from_millis(self.text_timeout_ms)
    }

    pub fn attachment_timeout(&self) -> Duration {
        Duration::from_millis(self.attachment_timeout_ms)
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Path to `chat.db`; `None` means `~/Library/Messages/chat.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    pub listener: ListenerSettings,
    pub outgoing: OutgoingSettings,
}

impl CourierConfig {
    /// Configured database path, or the Messages default under `home`.
    pub fn database_path(&self, home: &Path) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| default_database_path(home))
    }
}

// ---------------------------------------------------------------------------
// 2. Paths
// ---------------------------------------------------------------------------

/// `<home>/.courier/config.yaml`, pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".courier").join("config.yaml")
}

/// `<home>/Library/Messages/chat.db`
pub fn default_database_path(home: &Path) -> PathBuf {
    home.join("Library").join("Messages").join("chat.db")
}

/// The database file plus whichever WAL sidecars exist next to it.
///
/// SQLite appends to `-wal` long before the main file changes, so watching
/// only the main file misses most writes.
pub fn watched_files(database: &Path) -> Vec<PathBuf> {
    let mut files = vec![database.to_path_buf()];
    for suffix in DATABASE_SIDECARS {
        let mut name = database.as_os_str().to_owned();
        name.push(suffix);
        let sidecar = PathBuf::from(name);
        if sidecar.exists() {
            files.push(sidecar);
        }
    }
    files
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// Load `<home>/.courier/config.yaml`; a missing file yields defaults.
///
/// Returns `ConfigError::Parse` (with path) if the YAML is malformed.
pub fn load_at(home: &Path) -> Result<CourierConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(CourierConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(CourierConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<CourierConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save `config` to `<home>/.courier/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &CourierConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path_at(home);
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &CourierConfig) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
