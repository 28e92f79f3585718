//! # ShowDeck Configuration Module
//!
//! This module provides configuration management for ShowDeck, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use deckconfig::get_config;
//!
//! // Get the global configuration
//! let config = get_config();
//!
//! // Access configuration values
//! let host = config.get_player_host();
//! let port = config.get_player_port();
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("showdeck.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load ShowDeck configuration"));
}

const ENV_CONFIG_DIR: &str = "SHOWDECK_CONFIG";
const ENV_PREFIX: &str = "SHOWDECK_CONFIG__";

// Default values for configuration
const DEFAULT_PLAYER_HOST: &str = "localhost";
const DEFAULT_PLAYER_PORT: u16 = 8080;
const DEFAULT_NOW_PLAYING_FILE: &str = "NowPlaying.txt";
const DEFAULT_NEXT_UP_FILE: &str = "NextUp.txt";
const DEFAULT_TIME_NOW_PLAYING_FILE: &str = "TimeNowPlaying.txt";
const DEFAULT_TIME_NEXT_UP_FILE: &str = "TimeNextUp.txt";
const DEFAULT_CATALOG_FILE: &str = "catalog.yaml";

/// Macro to generate a getter for a status/catalog file path with default.
///
/// Relative paths are resolved against the configuration directory.
macro_rules! impl_file_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            let configured = match self.get_value($path) {
                Ok(Value::String(s)) if !s.trim().is_empty() => s,
                _ => $default.to_string(),
            };
            self.resolve_file(&configured)
        }

        pub fn $setter(&self, file: String) -> Result<()> {
            self.set_value($path, Value::String(file))
        }
    };
}

/// Configuration manager for ShowDeck
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".showdeck").exists() {
            return ".showdeck".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".showdeck");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        ".showdeck".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        // Create if doesn't exist
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        // Verify it's a directory
        if !path.is_dir() {
            return Err(anyhow!("Configured path is not a directory"));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `SHOWDECK_CONFIG` environment variable
    /// 3. `.showdeck` in the current directory
    /// 4. `.showdeck` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for
    /// write permissions.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created or validated
    pub fn config_dir(directory: &str) -> String {
        let dir_path = Self::find_config_dir(directory);
        let path = Path::new(&dir_path);

        Self::validate_config_dir(path).expect("Unable to validate the configuration directory");

        dir_path
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    ///
    /// # Arguments
    ///
    /// * `directory` - The directory containing the config.yaml file, or empty to use defaults
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // Merge external values over the embedded defaults
        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["player", "port"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = path[0].to_lowercase();
            let key_value = Value::String(key);
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["player", "host"]`)
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                let key_path = key
                    .trim_start_matches(ENV_PREFIX)
                    .split("__")
                    .collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        let new_key = Value::String(s.to_lowercase());
                        new_map.insert(new_key, Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Resolves a possibly relative file path against the config directory.
    fn resolve_file(&self, file_path: &str) -> String {
        let path = Path::new(file_path);
        if path.is_absolute() {
            file_path.to_string()
        } else {
            Path::new(&self.config_dir)
                .join(path)
                .to_string_lossy()
                .to_string()
        }
    }

    /// Gets the host of the media player's HTTP interface
    ///
    /// Returns the configured host, or `"localhost"` if not configured.
    pub fn get_player_host(&self) -> String {
        match self.get_value(&["player", "host"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            Ok(_) => {
                tracing::warn!("Player host not a string, using default {}", DEFAULT_PLAYER_HOST);
                DEFAULT_PLAYER_HOST.to_string()
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to get player host: {}, using default {}",
                    err,
                    DEFAULT_PLAYER_HOST
                );
                DEFAULT_PLAYER_HOST.to_string()
            }
        }
    }

    /// Sets the host of the media player's HTTP interface
    pub fn set_player_host(&self, host: String) -> Result<()> {
        self.set_value(&["player", "host"], Value::String(host))
    }

    /// Gets the port of the media player's HTTP interface
    ///
    /// Returns the configured port, or the default port (8080) if not
    /// configured or invalid.
    pub fn get_player_port(&self) -> u16 {
        match self.get_value(&["player", "port"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap() as u16,
            Ok(Value::String(s)) => match s.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    tracing::warn!(
                        "Invalid player port '{}', using default {}",
                        s,
                        DEFAULT_PLAYER_PORT
                    );
                    DEFAULT_PLAYER_PORT
                }
            },
            Ok(_) => {
                tracing::warn!(
                    "Player port not a number or string, using default {}",
                    DEFAULT_PLAYER_PORT
                );
                DEFAULT_PLAYER_PORT
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to get player port: {}, using default {}",
                    err,
                    DEFAULT_PLAYER_PORT
                );
                DEFAULT_PLAYER_PORT
            }
        }
    }

    /// Sets the port of the media player's HTTP interface
    pub fn set_player_port(&self, port: u16) -> Result<()> {
        let n = Number::from(port);
        self.set_value(&["player", "port"], Value::Number(n))
    }

    /// Gets the password for the media player's HTTP interface
    ///
    /// Returns `None` when no password is configured (authentication disabled).
    pub fn get_player_password(&self) -> Option<String> {
        match self.get_value(&["player", "password"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    /// Sets the password for the media player's HTTP interface
    pub fn set_player_password(&self, password: String) -> Result<()> {
        self.set_value(&["player", "password"], Value::String(password))
    }

    /// Checks whether the player connection settings are usable.
    ///
    /// The host must be non-empty and the port non-zero. Callers should
    /// abort player-facing feature initialization when this returns false.
    pub fn is_player_config_valid(&self) -> bool {
        !self.get_player_host().trim().is_empty() && self.get_player_port() > 0
    }

    impl_file_config!(
        get_now_playing_file,
        set_now_playing_file,
        &["status", "now_playing_file"],
        DEFAULT_NOW_PLAYING_FILE
    );

    impl_file_config!(
        get_next_up_file,
        set_next_up_file,
        &["status", "next_up_file"],
        DEFAULT_NEXT_UP_FILE
    );

    impl_file_config!(
        get_time_now_playing_file,
        set_time_now_playing_file,
        &["status", "time_now_playing_file"],
        DEFAULT_TIME_NOW_PLAYING_FILE
    );

    impl_file_config!(
        get_time_next_up_file,
        set_time_next_up_file,
        &["status", "time_next_up_file"],
        DEFAULT_TIME_NEXT_UP_FILE
    );

    impl_file_config!(
        get_catalog_file,
        set_catalog_file,
        &["catalog", "file"],
        DEFAULT_CATALOG_FILE
    );
}

/// Returns the global configuration instance
///
/// This function provides access to the singleton configuration instance,
/// which is lazily loaded on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

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
        // Scalars and sequences are replaced wholesale
        (d, e) => *d = e.clone(),
    }
}
