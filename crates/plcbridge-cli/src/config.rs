//! Bridge configuration – reads/writes `~/.plcbridge/config.toml`.

use plcbridge_core::TopicBinding;
use plcbridge_middleware::MqttSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// MQTT broker connection, the `[broker]` table.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Stored as plain text; the file is written owner-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl BrokerConfig {
    /// Connection settings for the MQTT link.
    pub fn settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
        }
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("keep_alive_secs", &self.keep_alive_secs)
            .finish()
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Persisted configuration stored in `~/.plcbridge/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Which broker topic feeds which record stream.
    #[serde(default = "TopicBinding::plant_defaults")]
    pub topics: TopicBinding,

    /// HTTP port for the query/command API.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_broker_host() -> String {
    "localhost".to_string()
}
fn default_broker_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "plcbridge".to_string()
}
fn default_keep_alive_secs() -> u64 {
    30
}
fn default_api_port() -> u16 {
    8080
}
fn default_database_path() -> String {
    data_dir_for_home(&home_dir())
        .join("records.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            topics: TopicBinding::plant_defaults(),
            api_port: default_api_port(),
            database_path: default_database_path(),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn data_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".plcbridge")
}

/// Return the path to `~/.plcbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    data_dir_for_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `PLCBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PLCBRIDGE_BROKER_HOST` | `broker.host` |
/// | `PLCBRIDGE_BROKER_PORT` | `broker.port` |
/// | `PLCBRIDGE_BROKER_USERNAME` | `broker.username` |
/// | `PLCBRIDGE_BROKER_PASSWORD` | `broker.password` |
/// | `PLCBRIDGE_API_PORT` | `api_port` |
/// | `PLCBRIDGE_DATABASE_PATH` | `database_path` |
///
/// Unparsable port values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("PLCBRIDGE_BROKER_HOST") {
        cfg.broker.host = v;
    }
    if let Some(v) = var("PLCBRIDGE_BROKER_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.broker.port = port;
    }
    if let Some(v) = var("PLCBRIDGE_BROKER_USERNAME") {
        cfg.broker.username = Some(v);
    }
    if let Some(v) = var("PLCBRIDGE_BROKER_PASSWORD") {
        cfg.broker.password = Some(v);
    }
    if let Some(v) = var("PLCBRIDGE_API_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.api_port = port;
    }
    if let Some(v) = var("PLCBRIDGE_DATABASE_PATH") {
        cfg.database_path = v;
    }
}

/// Save the config to disk, creating `~/.plcbridge/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

/// Create `dir` (and parents), restricted to the owner (rwx------) on Unix.
pub fn ensure_private_dir(dir: &Path) -> Result<(), String> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|e| format!("Failed to set permissions on {}: {}", dir.display(), e))?;
    }
    Ok(())
}
