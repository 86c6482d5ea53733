//! # camscan configuration
//!
//! Configuration is a YAML tree built from three layers, later ones
//! winning:
//!
//! 1. the default `camscan.yaml` embedded in the binary
//! 2. `config.yaml` from the configuration directory, when present
//! 3. environment variables `CAMSCAN_CONFIG__<SECTION>__<KEY>`
//!
//! Keys are case insensitive. Environment values are parsed as YAML
//! scalars, so `CAMSCAN_CONFIG__SCAN__PORT=8000` yields a number. Values of
//! the `camera` section are the exception and stay strings.
//!
//! The configuration is a plain value: load it once and pass it to whoever
//! needs it.
//!
//! ## Usage
//!
//! ```no_run
//! use camconfig::Config;
//!
//! let config = Config::load(None)?;
//! println!("scanning port {}", config.scan_port());
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

pub mod encryption;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("camscan.yaml");

const CONFIG_FILE: &str = "config.yaml";
const CONFIG_DIR_NAME: &str = ".camscan";

/// Environment variable naming the configuration directory
pub const ENV_CONFIG_DIR: &str = "CAMSCAN_CONFIG";

/// Prefix of the override variables
pub const ENV_PREFIX: &str = "CAMSCAN_CONFIG__";

/// Section whose overrides are kept as strings
const VERBATIM_SECTION: &str = "camera";

const DEFAULT_SCAN_PORT: u16 = 80;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_FFPROBE: &str = "ffprobe";

/// Generates a getter reading a number of milliseconds as a `Duration`
macro_rules! impl_duration_ms_config {
    ($getter:ident, $path:expr, $default_ms:expr) => {
        pub fn $getter(&self) -> Duration {
            Duration::from_millis(self.get_u64($path).unwrap_or($default_ms))
        }
    };
}

/// Generates a getter for a bool value with default
macro_rules! impl_bool_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                Ok(other) => {
                    warn!(path = %$path.join("."), value = ?other, "not a boolean, using default {}", $default);
                    $default
                }
                Err(_) => $default,
            }
        }
    };
}

/// Merged configuration tree
#[derive(Debug, Clone)]
pub struct Config {
    config_dir: Option<PathBuf>,
    data: Value,
}

impl Config {
    /// Finds the configuration directory.
    ///
    /// Search order: `directory`, the `CAMSCAN_CONFIG` variable, `.camscan`
    /// in the current directory, then `.camscan` in the home directory.
    /// Returns `None` when none applies.
    pub fn find_config_dir(directory: Option<&Path>) -> Option<PathBuf> {
        if let Some(dir) = directory {
            return Some(dir.to_path_buf());
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            if !env_path.is_empty() {
                debug!(env_var = ENV_CONFIG_DIR, path = %env_path, "config directory from env");
                return Some(PathBuf::from(env_path));
            }
        }

        let local = Path::new(CONFIG_DIR_NAME);
        if local.is_dir() {
            return Some(local.to_path_buf());
        }

        home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME))
            .filter(|p| p.is_dir())
    }

    /// Loads the defaults, the configuration file and the environment
    /// overrides.
    ///
    /// A missing directory or file is not an error. An unreadable or invalid
    /// file is.
    pub fn load(directory: Option<&Path>) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);

        let file = match &config_dir {
            Some(dir) => {
                let path = dir.join(CONFIG_FILE);
                if path.is_file() {
                    info!(config_file = %path.display(), "Loaded config file");
                    Some(
                        fs::read_to_string(&path)
                            .with_context(|| format!("unable to read {}", path.display()))?,
                    )
                } else {
                    info!(config_file = %path.display(), "Config file not found, using defaults");
                    None
                }
            }
            None => {
                debug!("no config directory, using defaults");
                None
            }
        };

        let mut config = match file {
            Some(yaml) => Self::from_yaml(&yaml)?,
            None => Self::defaults()?,
        };
        config.config_dir = config_dir;
        config.apply_overrides(env::vars());
        Ok(config)
    }

    /// Embedded defaults only
    pub fn defaults() -> Result<Self> {
        let data: Value =
            serde_yaml::from_str(DEFAULT_CONFIG).context("invalid embedded configuration")?;
        Ok(Self {
            config_dir: None,
            data: lower_keys_value(data),
        })
    }

    /// Defaults merged with a YAML document. No environment override is
    /// applied.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config = Self::defaults()?;
        let external: Value = serde_yaml::from_str(yaml).context("invalid configuration file")?;
        if !external.is_null() {
            merge_yaml(&mut config.data, &lower_keys_value(external));
        }
        Ok(config)
    }

    /// Directory the configuration was read from
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    /// Applies `PREFIX__SECTION__KEY=value` overrides from `vars`.
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path: Vec<&str> = rest.split("__").filter(|s| !s.is_empty()).collect();
            if path.is_empty() {
                continue;
            }

            debug!(key = %key, "configuration override from environment");
            // credentials are taken verbatim, a password is never a YAML scalar
            let value = if path[0].eq_ignore_ascii_case(VERBATIM_SECTION) {
                Value::String(value)
            } else {
                convert_env_value(&value)
            };
            if let Err(e) = self.set_value(&path, value) {
                warn!(key = %key, error = %e, "ignoring environment override");
            }
        }
    }

    /// Sets the value at `path`, creating the intermediate mappings.
    pub fn set_value(&mut self, path: &[&str], value: Value) -> Result<()> {
        set_value_internal(&mut self.data, path, value)
    }

    /// Gets the value at `path`, e.g. `&["scan", "port"]`.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let mut current = &self.data;
        for (i, key) in path.iter().enumerate() {
            let Value::Mapping(map) = current else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            };
            current = map
                .get(Value::String(key.to_lowercase()))
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=i].join(".")))?;
        }
        Ok(current.clone())
    }

    fn get_u64(&self, path: &[&str]) -> Option<u64> {
        match self.get_value(path) {
            Ok(Value::Number(n)) if n.as_u64().is_some() => n.as_u64(),
            Ok(Value::String(s)) => match s.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(path = %path.join("."), value = %s, "not a number, using default");
                    None
                }
            },
            Ok(other) => {
                warn!(path = %path.join("."), value = ?other, "not a number, using default");
                None
            }
            Err(_) => None,
        }
    }

    fn get_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) => Some(s),
            Ok(Value::Number(n)) => Some(n.to_string()),
            Ok(Value::Bool(b)) => Some(b.to_string()),
            Ok(Value::Null) | Err(_) => None,
            Ok(other) => {
                warn!(path = %path.join("."), value = ?other, "not a string, ignoring");
                None
            }
        }
    }

    /// TCP port tested on every candidate address
    pub fn scan_port(&self) -> u16 {
        match self.get_u64(&["scan", "port"]) {
            Some(p) if (1..=u64::from(u16::MAX)).contains(&p) => p as u16,
            Some(p) => {
                warn!(port = p, "invalid scan port, using default {}", DEFAULT_SCAN_PORT);
                DEFAULT_SCAN_PORT
            }
            None => DEFAULT_SCAN_PORT,
        }
    }

    impl_duration_ms_config!(connect_timeout, &["scan", "connect_timeout_ms"], 50);
    impl_duration_ms_config!(discovery_window, &["discovery", "window_ms"], 3000);

    /// Multicast hop limit of the discovery probe
    pub fn discovery_ttl(&self) -> u32 {
        self.get_u64(&["discovery", "ttl"])
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(3)
    }

    /// Camera username, empty when authentication is not configured
    pub fn camera_username(&self) -> String {
        self.get_string(&["camera", "username"]).unwrap_or_default()
    }

    /// Camera password in clear, `encrypted:` values being decrypted.
    ///
    /// # Errors
    ///
    /// Fails when an encrypted value cannot be decrypted on this machine.
    pub fn camera_password(&self) -> Result<String> {
        let raw = self.get_string(&["camera", "password"]).unwrap_or_default();
        encryption::reveal_password(&raw).context("unable to decrypt camera.password")
    }

    impl_duration_ms_config!(onvif_timeout, &["onvif", "timeout_ms"], 5000);
    impl_duration_ms_config!(onvif_retry_delay, &["onvif", "retry_delay_ms"], 1000);

    /// Total attempts per ONVIF request, at least 1
    pub fn onvif_attempts(&self) -> u32 {
        self.get_u64(&["onvif", "attempts"])
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(3)
            .max(1)
    }

    impl_bool_config!(inspect_enabled, &["inspect", "enabled"], true);
    impl_duration_ms_config!(inspect_timeout, &["inspect", "timeout_ms"], 15000);

    /// Media inspection executable
    pub fn ffprobe_path(&self) -> String {
        self.get_string(&["inspect", "ffprobe"])
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FFPROBE.to_string())
    }

    /// Minimum log level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`)
    pub fn log_min_level(&self) -> String {
        self.get_string(&["logger", "min_level"])
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string())
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a map"));
    };

    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        return Ok(());
    }

    let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
    set_value_internal(entry, rest, value)
}

fn convert_env_value(value: &str) -> Value {
    match serde_yaml::from_str::<Value>(value) {
        Ok(Value::Null) if !value.trim().is_empty() => Value::String(value.to_string()),
        Ok(parsed @ (Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Null)) => parsed,
        _ => Value::String(value.to_string()),
    }
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lower_keys_value(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        other => other,
    }
}

/// Merges `external` into `default`: mappings are merged key by key,
/// anything else is replaced.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
