//! Configuration management for vistream
//!
//! This module handles loading and managing application configuration
//! from various sources including config files and environment variables.

use crate::backend::BackendKind;
use crate::player::PlayerConfig;
use crate::stream::QualityProfiles;
use crate::utils::error::{Result, VistreamError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General application settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Backend instances, in priority order
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    /// Quality profiles
    #[serde(default)]
    pub quality: QualityProfiles,

    /// Playback engine and queue settings
    #[serde(default)]
    pub player: PlayerConfig,

    /// Segment skipping
    #[serde(default)]
    pub segments: SegmentsConfig,

    /// Persistent metadata cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP client settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// One configured backend instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Stable identifier, unique across instances
    pub id: String,

    /// Display name; the URL host is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// API flavour
    pub backend: BackendKind,

    /// Base URL
    pub url: String,

    /// Disabled instances are kept in the file but never queried
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Account token, if the instance is logged into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Segment skipping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsConfig {
    /// Load and skip segments at all
    pub enabled: bool,

    /// Base URL of the segment API
    pub api_url: String,

    /// Categories to skip
    pub categories: Vec<String>,
}

/// Persistent cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memoize hydrated video metadata
    pub enabled: bool,

    /// Cache directory; the platform cache dir is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

fn default_true() -> bool {
    true
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for SegmentsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://sponsor.ajay.app".to_string(),
            categories: vec!["sponsor".to_string(), "selfpromo".to_string()],
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: format!("vistream/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl InstanceConfig {
    /// Name shown to the user
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        let rest = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        rest.split('/').next().filter(|host| !host.is_empty()).unwrap_or(&self.id)
    }
}

impl CacheConfig {
    /// Directory the cache should live in
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| dirs::cache_dir().map(|p| p.join("vistream")))
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/vistream/config.toml on Linux)
    /// 3. User config file (~/.config/vistream/config.toml on Linux)
    /// 4. Environment variables (VISTREAM_* prefix)
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, with an explicit file taking precedence over the
    /// system and user files
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        let mut layered = toml::Table::new();

        for path in [Self::system_config_path(), Self::user_config_path()].into_iter().flatten() {
            if path.exists() {
                merge_tables(&mut layered, read_table(&path)?);
            }
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(VistreamError::Config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            merge_tables(&mut layered, read_table(path)?);
        }

        let mut config: Config = toml::Value::Table(layered)
            .try_into()
            .map_err(|e| VistreamError::Config(format!("Invalid configuration: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| VistreamError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VistreamError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| VistreamError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml)
            .map_err(|e| VistreamError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Instances that should be queried
    pub fn enabled_instances(&self) -> impl Iterator<Item = &InstanceConfig> {
        self.instances.iter().filter(|i| i.enabled)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(log_level) = lookup("VISTREAM_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        if let Some(enabled) = lookup("VISTREAM_SEGMENTS_ENABLED") {
            self.segments.enabled = enabled
                .parse()
                .map_err(|_| VistreamError::Config("Invalid VISTREAM_SEGMENTS_ENABLED".to_string()))?;
        }

        if let Some(interval) = lookup("VISTREAM_TIME_SYNC_INTERVAL_MS") {
            self.player.time_sync_interval_ms = interval
                .parse()
                .map_err(|_| VistreamError::Config("Invalid VISTREAM_TIME_SYNC_INTERVAL_MS".to_string()))?;
        }

        if let Some(dir) = lookup("VISTREAM_CACHE_DIR") {
            self.cache.directory = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(VistreamError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, valid_log_levels
            )));
        }

        let mut ids = HashSet::new();
        for instance in &self.instances {
            if !ids.insert(instance.id.as_str()) {
                return Err(VistreamError::Config(format!("Duplicate instance id '{}'", instance.id)));
            }
            if !is_http_url(&instance.url) {
                return Err(VistreamError::Config(format!(
                    "Instance '{}' has an invalid URL '{}'",
                    instance.id, instance.url
                )));
            }
        }

        for profile in &self.quality.profiles {
            if profile.formats.is_empty() {
                return Err(VistreamError::Config(format!(
                    "Quality profile '{}' lists no formats",
                    profile.name
                )));
            }
        }

        if self.player.time_sync_interval_ms == 0 {
            return Err(VistreamError::Config("Time sync interval must be non-zero".to_string()));
        }

        if self.segments.enabled && !is_http_url(&self.segments.api_url) {
            return Err(VistreamError::Config(format!(
                "Invalid segment API URL '{}'",
                self.segments.api_url
            )));
        }

        if self.network.timeout_secs == 0 {
            return Err(VistreamError::Config("Network timeout must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/vistream/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("vistream").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/vistream/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vistream").join("config.toml"))
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| VistreamError::Config(format!("Failed to read config file: {}", e)))?;

    contents
        .parse::<toml::Table>()
        .map_err(|e| VistreamError::Config(format!("Failed to parse config file {}: {}", path.display(), e)))
}

/// Overlay `upper` onto `base`; nested tables merge key by key, anything
/// else (arrays included) replaces the lower value.
fn merge_tables(base: &mut toml::Table, upper: toml::Table) {
    for (key, value) in upper {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(lower)), toml::Value::Table(upper)) => merge_tables(lower, upper),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
