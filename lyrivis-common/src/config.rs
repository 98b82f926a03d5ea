//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = default_config_path() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Ensure the root folder directory exists, creating it if missing
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

/// Path of the shared SQLite database inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("lyrivis.db")
}

/// Get default configuration file path for the platform
fn default_config_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/lyrivis/config.toml first, then /etc/lyrivis/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("lyrivis").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/lyrivis/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("lyrivis").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("lyrivis"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lyrivis"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("lyrivis"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lyrivis"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("lyrivis"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lyrivis"))
    } else {
        PathBuf::from("./lyrivis_data")
    }
}

/// Service TOML configuration (`<root>/lyrivis-gen.toml`)
///
/// All fields have serde defaults so a missing or partial file still
/// produces a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Listen address for the HTTP server
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Base URL of the lyrics provider collaborator
    #[serde(default = "default_lyrics_base_url")]
    pub lyrics_base_url: String,

    /// Endpoint of the external image generation service
    #[serde(default = "default_generator_endpoint")]
    pub generator_endpoint: String,

    /// Optional bearer token for the image generation service
    #[serde(default)]
    pub generator_api_key: Option<String>,

    /// Seconds without a poll before an abandoned job is reclaimed
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,

    /// Newly discovered phrases allowed per throttle interval
    #[serde(default = "default_throttle_phrases_per_interval")]
    pub throttle_phrases_per_interval: usize,

    /// Throttle interval in seconds
    #[serde(default = "default_throttle_interval_secs")]
    pub throttle_interval_secs: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging section of the service TOML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        // serde defaults and Default must agree; route through the same fns
        Self {
            bind: default_bind(),
            lyrics_base_url: default_lyrics_base_url(),
            generator_endpoint: default_generator_endpoint(),
            generator_api_key: None,
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            throttle_phrases_per_interval: default_throttle_phrases_per_interval(),
            throttle_interval_secs: default_throttle_interval_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5731".to_string()
}

fn default_lyrics_base_url() -> String {
    "http://127.0.0.1:5732".to_string()
}

fn default_generator_endpoint() -> String {
    "http://127.0.0.1:5733/generate".to_string()
}

fn default_inactivity_timeout_secs() -> u64 {
    120
}

fn default_throttle_phrases_per_interval() -> usize {
    3
}

fn default_throttle_interval_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load the service TOML from the root folder, falling back to defaults
/// when the file does not exist
pub fn load_toml_config(root: &Path, service: &str) -> Result<TomlConfig> {
    let path = root.join(format!("{}.toml", service));
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No service TOML, using defaults");
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write the service TOML to the root folder
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
