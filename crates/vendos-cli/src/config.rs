//! Configuration file handling – reads `~/.vendos/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted configuration stored in `~/.vendos/config.toml`.
///
/// Every field has a default, so a missing file or a partial file both work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port the queue API server listens on.
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// SQLite database path for the command store.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Queue base URL the agent polls.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Unit identity of the (simulated) machine.
    #[serde(default = "default_unit_id")]
    pub unit_id: String,

    /// Number of dispensing slots on the simulated cabinet.
    #[serde(default = "default_slots")]
    pub slots: u32,

    /// Stock seeded per slot when the server starts with a fresh inventory.
    #[serde(default = "default_seed_stock")]
    pub seed_stock: u32,

    /// Seconds an unpaid command may wait before it is expired.
    #[serde(default = "default_payment_timeout_secs")]
    pub payment_timeout_secs: u64,

    /// Controller tick period in milliseconds.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Controller poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request transport timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Switch debounce window in milliseconds.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,

    /// Optional forced-stop duration for a motor whose switch never
    /// releases, in milliseconds.  Absent means no fallback.
    #[serde(default)]
    pub max_run_ms: Option<u64>,
}

fn default_server_port() -> u16 {
    5000
}
fn default_db_path() -> String {
    vendos_dir().join("commands.db").display().to_string()
}
fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_unit_id() -> String {
    "v1".to_string()
}
fn default_slots() -> u32 {
    8
}
fn default_seed_stock() -> u32 {
    10
}
fn default_payment_timeout_secs() -> u64 {
    300
}
fn default_tick_period_ms() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_request_timeout_secs() -> u64 {
    5
}
fn default_debounce_window_ms() -> u64 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: default_server_port(),
            db_path: default_db_path(),
            server_url: default_server_url(),
            unit_id: default_unit_id(),
            slots: default_slots(),
            seed_stock: default_seed_stock(),
            payment_timeout_secs: default_payment_timeout_secs(),
            tick_period_ms: default_tick_period_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            debounce_window_ms: default_debounce_window_ms(),
            max_run_ms: None,
        }
    }
}

/// Return the `~/.vendos` directory.
fn vendos_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".vendos")
}

/// Return the path to `~/.vendos/config.toml`.
pub fn config_path() -> PathBuf {
    vendos_dir().join("config.toml")
}

/// Load the effective configuration: the config file when present,
/// defaults otherwise, with `VENDOS_*` environment overrides applied
/// either way.  A broken file falls back to defaults with a warning.
pub fn resolve() -> Config {
    let mut cfg = match load_from(&config_path()) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => Config::default(),
        Err(e) => {
            tracing::warn!(error = %e, "config unreadable; using defaults");
            Config::default()
        }
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `VENDOS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `VENDOS_SERVER_URL` | `server_url` |
/// | `VENDOS_UNIT_ID` | `unit_id` |
/// | `VENDOS_PORT` | `server_port` |
/// | `VENDOS_DB` | `db_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("VENDOS_SERVER_URL") {
        cfg.server_url = v;
    }
    if let Ok(v) = std::env::var("VENDOS_UNIT_ID") {
        cfg.unit_id = v;
    }
    if let Ok(v) = std::env::var("VENDOS_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.server_port = port;
    }
    if let Ok(v) = std::env::var("VENDOS_DB") {
        cfg.db_path = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = Config::default();
        assert_eq!(cfg.server_port, 5000);
        assert_eq!(cfg.unit_id, "v1");
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.debounce_window_ms, 50);
        assert_eq!(cfg.payment_timeout_secs, 300);
        assert!(cfg.max_run_ms.is_none());
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        assert!(load_from(&path).unwrap().is_none());
    }

    #[test]
    fn load_from_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "unit_id = \"kiosk-7\"\nserver_port = 8080\n").unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.unit_id, "kiosk-7");
        assert_eq!(cfg.server_port, 8080);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.slots, 8);
    }

    #[test]
    fn load_from_garbage_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not toml {{{{").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn max_run_parses_when_present() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_run_ms = 3000\n").unwrap();
        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.max_run_ms, Some(3000));
    }
}
