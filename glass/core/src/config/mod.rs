//! TOML Configuration File Support
//!
//! Configuration for the emulator lives at `~/.config/glass/emulator.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [remote]
//! base_url = "http://localhost:8080"
//! access_token = "ya29.token"
//! request_timeout_secs = 10
//!
//! [sync]
//! mode = "poll"
//! poll_interval_secs = 30
//!
//! [location]
//! enabled = true
//! report_interval_secs = 600
//!
//! [demo]
//! enabled = false
//! ```
//!
//! # Environment
//!
//! `GLASS_BASE_URL`, `GLASS_ACCESS_TOKEN`, `GLASS_SYNC_MODE`,
//! `GLASS_POLL_INTERVAL` (seconds), `GLASS_DEMO` (`1`/`true`).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::{SyncMode, DEFAULT_POLL_INTERVAL};

/// Default remote request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between location reports
pub const DEFAULT_LOCATION_INTERVAL: Duration = Duration::from_secs(600);

const ENV_BASE_URL: &str = "GLASS_BASE_URL";
const ENV_ACCESS_TOKEN: &str = "GLASS_ACCESS_TOKEN";
const ENV_SYNC_MODE: &str = "GLASS_SYNC_MODE";
const ENV_POLL_INTERVAL: &str = "GLASS_POLL_INTERVAL";
const ENV_DEMO: &str = "GLASS_DEMO";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[remote]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteToml {
    /// Timeline service base URL
    pub base_url: Option<String>,

    /// OAuth bearer token
    pub access_token: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// `[sync]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncToml {
    /// `poll` or `push`
    pub mode: Option<SyncMode>,

    /// Seconds between polls
    pub poll_interval_secs: Option<u64>,
}

/// `[location]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationToml {
    /// Whether to report the device location
    pub enabled: Option<bool>,

    /// Seconds between reports
    pub report_interval_secs: Option<u64>,
}

/// `[demo]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoToml {
    /// Use the in-memory demo timeline
    pub enabled: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorToml {
    /// Remote service section
    pub remote: RemoteToml,

    /// Sync section
    pub sync: SyncToml,

    /// Location section
    pub location: LocationToml,

    /// Demo section
    pub demo: DemoToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Remote timeline service settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL; required unless demo mode is on
    pub base_url: Option<String>,
    /// Bearer token
    pub access_token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Timeline sync settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Poll or push
    pub mode: SyncMode,
    /// Interval between polls
    pub poll_interval: Duration,
}

/// Location reporting settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationConfig {
    /// Whether reports are sent
    pub enabled: bool,
    /// Interval between reports
    pub report_interval: Duration,
}

/// Emulator configuration assembled from every source
#[derive(Clone, Debug)]
pub struct EmulatorConfig {
    /// Remote service
    pub remote: RemoteConfig,

    /// Sync schedule
    pub sync: SyncConfig,

    /// Location reporting
    pub location: LocationConfig,

    /// Use the in-memory demo timeline instead of the remote service
    pub demo: bool,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig {
                base_url: None,
                access_token: None,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            sync: SyncConfig {
                mode: SyncMode::Poll,
                poll_interval: DEFAULT_POLL_INTERVAL,
            },
            location: LocationConfig {
                enabled: false,
                report_interval: DEFAULT_LOCATION_INTERVAL,
            },
            demo: false,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl EmulatorConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A demo-mode configuration (no remote service needed)
    #[must_use]
    pub fn demo() -> Self {
        Self {
            demo: true,
            ..Self::default()
        }
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check the assembled configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a poll interval under one
    /// second or a missing base URL outside demo mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.poll_interval < Duration::from_secs(1) {
            return Err(ConfigError::ValidationError(
                "sync.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.location.enabled && self.location.report_interval < Duration::from_secs(1) {
            return Err(ConfigError::ValidationError(
                "location.report_interval_secs must be at least 1".to_string(),
            ));
        }
        if !self.demo
            && self
                .remote
                .base_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "remote.base_url is required unless demo mode is enabled (set {ENV_BASE_URL} or --demo)"
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/glass/emulator.toml` or
/// `~/.config/glass/emulator.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("glass").join("emulator.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<EmulatorConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<EmulatorConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_config(&mut config);
    Ok(config)
}

fn load_file_config(path: Option<PathBuf>) -> Result<EmulatorConfig, ConfigError> {
    let mut config = EmulatorConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: EmulatorToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut EmulatorConfig, toml: &EmulatorToml) {
    if toml.remote.base_url.is_some() {
        config.remote.base_url.clone_from(&toml.remote.base_url);
    }
    if toml.remote.access_token.is_some() {
        config.remote.access_token.clone_from(&toml.remote.access_token);
    }
    if let Some(timeout) = toml.remote.request_timeout_secs {
        config.remote.request_timeout = Duration::from_secs(timeout);
    }

    if let Some(mode) = toml.sync.mode {
        config.sync.mode = mode;
    }
    if let Some(interval) = toml.sync.poll_interval_secs {
        config.sync.poll_interval = Duration::from_secs(interval);
    }

    if let Some(enabled) = toml.location.enabled {
        config.location.enabled = enabled;
    }
    if let Some(interval) = toml.location.report_interval_secs {
        config.location.report_interval = Duration::from_secs(interval);
    }

    if let Some(enabled) = toml.demo.enabled {
        config.demo = enabled;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut EmulatorConfig) {
    apply_env_with(config, |name| std::env::var(name).ok());
}

fn parse_flag(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Apply overrides read through `lookup`
fn apply_env_with(config: &mut EmulatorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_BASE_URL) {
        config.remote.base_url = Some(url);
        config.source = ConfigSource::Env;
    }
    if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
        config.remote.access_token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(mode) = lookup(ENV_SYNC_MODE) {
        match mode.parse::<SyncMode>() {
            Ok(mode) => {
                config.sync.mode = mode;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring {ENV_SYNC_MODE}"),
        }
    }
    if let Some(interval) = lookup(ENV_POLL_INTERVAL) {
        if let Ok(secs) = interval.parse::<u64>() {
            config.sync.poll_interval = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(demo) = lookup(ENV_DEMO) {
        config.demo = parse_flag(&demo);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Access token override
    pub access_token: Option<String>,

    /// Sync mode override
    pub sync_mode: Option<SyncMode>,

    /// Poll interval override (seconds)
    pub poll_interval_secs: Option<u64>,

    /// Demo mode override
    pub demo: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set access token override
    #[must_use]
    pub fn with_access_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }

    /// Set sync mode override
    #[must_use]
    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = Some(mode);
        self
    }

    /// Set poll interval override
    #[must_use]
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = Some(secs);
        self
    }

    /// Set demo mode override
    #[must_use]
    pub fn with_demo(mut self, demo: bool) -> Self {
        self.demo = Some(demo);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut EmulatorConfig) {
        if self.base_url.is_some()
            || self.access_token.is_some()
            || self.sync_mode.is_some()
            || self.poll_interval_secs.is_some()
            || self.demo.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.remote.base_url = Some(url.clone());
        }
        if let Some(ref token) = self.access_token {
            config.remote.access_token = Some(token.clone());
        }
        if let Some(mode) = self.sync_mode {
            config.sync.mode = mode;
        }
        if let Some(secs) = self.poll_interval_secs {
            config.sync.poll_interval = Duration::from_secs(secs);
        }
        if let Some(demo) = self.demo {
            config.demo = demo;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.sync.mode, SyncMode::Poll);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(30));
        assert_eq!(config.location.report_interval, Duration::from_secs(600));
        assert!(!config.location.enabled);
        assert!(!config.demo);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("glass"));
            assert!(p.to_string_lossy().ends_with("emulator.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let file = file_with(
            r#"
[remote]
base_url = "http://localhost:8080"
access_token = "secret"
request_timeout_secs = 3

[sync]
mode = "push"
poll_interval_secs = 45

[location]
enabled = true
report_interval_secs = 120

[demo]
enabled = true
"#,
        );

        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.remote.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.remote.access_token.as_deref(), Some("secret"));
        assert_eq!(config.remote.request_timeout, Duration::from_secs(3));
        assert_eq!(config.sync.mode, SyncMode::Push);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(45));
        assert!(config.location.enabled);
        assert_eq!(config.location.report_interval, Duration::from_secs(120));
        assert!(config.demo);
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_parse_partial_toml() {
        let file = file_with("[sync]\npoll_interval_secs = 5\n");
        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.sync.poll_interval, Duration::from_secs(5));
        assert_eq!(config.sync.mode, SyncMode::Poll);
        assert_eq!(config.remote.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_missing_file_graceful() {
        let path = PathBuf::from("/nonexistent/path/emulator.toml");
        let config = load_file_config(Some(path)).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = file_with("[sync\nmode = 3\n");
        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_unknown_sync_mode_is_parse_error() {
        let file = file_with("[sync]\nmode = \"carrier-pigeon\"\n");
        let result = load_file_config(Some(file.path().to_path_buf()));
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    // =========================================================================
    // Priority Ordering Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = file_with("[remote]\nbase_url = \"http://file\"\n[sync]\npoll_interval_secs = 45\n");
        let mut config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        apply_env_with(
            &mut config,
            env(&[("GLASS_BASE_URL", "http://env"), ("GLASS_SYNC_MODE", "push")]),
        );
        assert_eq!(config.remote.base_url.as_deref(), Some("http://env"));
        assert_eq!(config.sync.mode, SyncMode::Push);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(45));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_bad_env_values_are_ignored() {
        let mut config = EmulatorConfig::default();
        apply_env_with(
            &mut config,
            env(&[("GLASS_POLL_INTERVAL", "soon"), ("GLASS_SYNC_MODE", "smoke")]),
        );
        assert_eq!(config.sync.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_env_demo_flag() {
        let mut config = EmulatorConfig::default();
        apply_env_with(&mut config, env(&[("GLASS_DEMO", "true")]));
        assert!(config.demo);
        apply_env_with(&mut config, env(&[("GLASS_DEMO", "0")]));
        assert!(!config.demo);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = EmulatorConfig::default();
        apply_env_with(&mut config, env(&[("GLASS_BASE_URL", "http://env")]));

        ConfigOverrides::new()
            .with_base_url("http://cli".to_string())
            .with_poll_interval_secs(10)
            .apply(&mut config);
        assert_eq!(config.remote.base_url.as_deref(), Some("http://cli"));
        assert_eq!(config.sync.poll_interval, Duration::from_secs(10));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = EmulatorConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_validation() {
        let config = EmulatorConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        assert!(EmulatorConfig::demo().validate().is_ok());

        let mut config = EmulatorConfig::demo();
        config.sync.poll_interval = Duration::from_millis(500);
        assert!(config.validate().is_err());

        let mut config = EmulatorConfig::default();
        config.remote.base_url = Some("http://localhost:8080".to_string());
        assert!(config.validate().is_ok());
    }
}
