// Configuration File Support
//
// This module provides configuration file parsing for the idlewatch job.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory:
// ~/.config/idlewatch/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ThrottleError;
use crate::throttle::{Quota, RecoveryConfig};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Per-service throttle quotas
    pub throttle: ThrottleConfig,

    /// External service endpoints and credentials
    pub services: ServicesConfig,

    /// Failure shell recovery policy
    pub recovery: RecoverySettings,

    /// Reporting pass configuration
    pub report: ReportConfig,

    /// Metrics collection
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// One service's admission quota: `max_operations` per `window_secs`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuotaSettings {
    /// Maximum operations admitted per window
    pub max_operations: u32,

    /// Window length in seconds (fractional allowed)
    pub window_secs: f64,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            max_operations: 5,
            window_secs: 1.0,
        }
    }
}

impl QuotaSettings {
    /// Build a validated [`Quota`] for the named service.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Configuration`] on a zero `max_operations`
    /// or a non-positive/non-finite window.
    pub fn to_quota(&self, service: &str) -> Result<Quota, ThrottleError> {
        if !self.window_secs.is_finite() || self.window_secs <= 0.0 {
            return Err(ThrottleError::configuration(
                service,
                format!(
                    "window_secs must be a positive number, got {}",
                    self.window_secs
                ),
            ));
        }

        Quota::new(
            service,
            self.max_operations,
            Duration::from_secs_f64(self.window_secs),
        )
    }
}

/// Per-service throttle quotas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Worker record store quota (default: 5 ops / 1s)
    pub records: QuotaSettings,

    /// Time-tracking API quota
    pub timetrack: QuotaSettings,

    /// Chat API quota
    pub chat: QuotaSettings,
}

/// Worker record store endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordStoreConfig {
    /// Base URL of the record store API (up to the base/app segment)
    pub base_url: String,

    /// Table holding worker records
    pub table: String,

    /// View filtering to active workers
    pub view: String,

    /// API key; usually supplied via IDLEWATCH_RECORDS_API_KEY
    pub api_key: String,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.recordstore.example/v0/appWorkers".to_string(),
            table: "Workers".to_string(),
            view: "Active Workers".to_string(),
            api_key: String::new(),
        }
    }
}

/// Time-tracking API endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeTrackConfig {
    /// Base URL of the time-tracking API
    pub base_url: String,

    /// Company identifier scoping every query
    pub company: String,
}

impl Default for TimeTrackConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.timetrack.example".to_string(),
            company: String::new(),
        }
    }
}

/// Chat notification API endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the chat API
    pub base_url: String,

    /// Bot token; usually supplied via IDLEWATCH_CHAT_TOKEN
    pub token: String,

    /// Channel receiving the report summary
    pub channel: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chat.example.com/api".to_string(),
            token: String::new(),
            channel: String::new(),
        }
    }
}

/// External service endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ServicesConfig {
    /// Worker record store
    pub records: RecordStoreConfig,

    /// Time-tracking API
    pub timetrack: TimeTrackConfig,

    /// Chat notification API
    pub chat: ChatConfig,
}

/// Failure shell recovery policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecoverySettings {
    /// Attempts per call, including the first; 1 disables retries
    pub max_attempts: usize,

    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Backoff delay cap in milliseconds
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter: 0.1,
        }
    }
}

impl RecoverySettings {
    /// Build the runtime recovery policy.
    pub fn to_recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig::new()
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .jitter(self.jitter)
    }
}

/// Reporting pass configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Idle-time percentage above which a worker is flagged, unless their
    /// position title has an override in `role_thresholds`
    pub idle_threshold_percent: f64,

    /// Per-position-title idle threshold overrides, keyed by the title as
    /// it appears in the record store
    pub role_thresholds: HashMap<String, f64>,

    /// Days of history each pass looks back over. The period always ends
    /// yesterday and spans this many days, so a weekly Sunday cadence wants
    /// 6 and a biweekly payday pass wants 14.
    pub lookback_days: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            idle_threshold_percent: 15.0,
            role_thresholds: HashMap::new(),
            lookback_days: 7,
        }
    }
}

impl ReportConfig {
    /// Idle threshold for a worker with the given position title.
    pub fn threshold_for(&self, title: Option<&str>) -> f64 {
        title
            .and_then(|t| self.role_thresholds.get(t))
            .copied()
            .unwrap_or(self.idle_threshold_percent)
    }
}

/// Metrics collection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to collect and log Prometheus metrics for the pass
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            throttle: ThrottleConfig::default(),
            services: ServicesConfig::default(),
            recovery: RecoverySettings::default(),
            report: ReportConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation. If the config file does not exist, returns default
    /// configuration with environment overrides applied.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/idlewatch/config.toml` on Linux/Mac
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "idlewatch", "Idlewatch") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("idlewatch")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - IDLEWATCH_LOG_LEVEL / IDLEWATCH_LOG_FORMAT
    /// - IDLEWATCH_RECORDS_API_KEY / IDLEWATCH_CHAT_TOKEN
    /// - IDLEWATCH_TIMETRACK_COMPANY / IDLEWATCH_CHAT_CHANNEL
    /// - IDLEWATCH_RECORDS_MAX_OPS / IDLEWATCH_RECORDS_WINDOW_SECS
    /// - IDLEWATCH_MAX_ATTEMPTS
    fn apply_env_overrides(mut self) -> Self {
        // Logging overrides
        if let Ok(level) = std::env::var("IDLEWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("IDLEWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Credentials are environment-first so they stay out of the file
        if let Ok(key) = std::env::var("IDLEWATCH_RECORDS_API_KEY") {
            self.services.records.api_key = key;
        }
        if let Ok(token) = std::env::var("IDLEWATCH_CHAT_TOKEN") {
            self.services.chat.token = token;
        }
        if let Ok(company) = std::env::var("IDLEWATCH_TIMETRACK_COMPANY") {
            self.services.timetrack.company = company;
        }
        if let Ok(channel) = std::env::var("IDLEWATCH_CHAT_CHANNEL") {
            self.services.chat.channel = channel;
        }

        // Throttle overrides (records quota is the one tuned in practice)
        if let Ok(ops) = std::env::var("IDLEWATCH_RECORDS_MAX_OPS") {
            if let Ok(ops) = ops.parse::<u32>() {
                self.throttle.records.max_operations = ops;
            }
        }
        if let Ok(secs) = std::env::var("IDLEWATCH_RECORDS_WINDOW_SECS") {
            if let Ok(secs) = secs.parse::<f64>() {
                self.throttle.records.window_secs = secs;
            }
        }

        // Recovery overrides
        if let Ok(attempts) = std::env::var("IDLEWATCH_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse::<usize>() {
                if attempts > 0 {
                    self.recovery.max_attempts = attempts;
                }
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// Quota validation is fatal on purpose: an invalid quota must abort
    /// startup rather than silently run unthrottled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate every service quota
        self.throttle.records.to_quota("records")?;
        self.throttle.timetrack.to_quota("timetrack")?;
        self.throttle.chat.to_quota("chat")?;

        if !(0.0..=1.0).contains(&self.recovery.jitter) {
            anyhow::bail!(
                "Invalid recovery jitter: {}. Must be between 0.0 and 1.0",
                self.recovery.jitter
            );
        }

        if self.report.lookback_days == 0 {
            anyhow::bail!("report.lookback_days must be at least 1");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
