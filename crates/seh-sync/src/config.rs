//! Sync configuration.
//!
//! Loaded from TOML, then overridden by `SEH_*` environment variables and
//! finally by command-line flags. Once built the configuration is immutable
//! and passed explicitly to the client, the store and the orchestrator.
//!
//! ```toml
//! [api]
//! api_key = "..."
//! max_concurrent = 3
//! daily_limit = 300
//!
//! [storage]
//! path = "~/.local/share/seh/seh.db"
//!
//! [sync]
//! overlap_minutes = 15
//! error_handling = "lenient"
//! skip_data_types = ["optimizer_telemetry"]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use seh_core::{DEFAULT_BASE_URL, RateLimiter, RetryConfig};
use seh_types::{DataType, SiteId};

/// Sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from the default path, or defaults if there is no
    /// file there.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Apply `SEH_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `SEH_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("SEH_API_KEY") {
            self.api.api_key = key;
        }
        if let Some(url) = var("SEH_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(path) = var("SEH_DATABASE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(mode) = var("SEH_ERROR_HANDLING") {
            self.sync.error_handling = mode.parse().map_err(|message| ConfigError::Env {
                var: "SEH_ERROR_HANDLING",
                message,
            })?;
        }
        if let Some(list) = var("SEH_SKIP_DATA_TYPES") {
            self.sync.skip_data_types = parse_list::<DataType>(&list).map_err(|e| ConfigError::Env {
                var: "SEH_SKIP_DATA_TYPES",
                message: e.to_string(),
            })?;
        }
        if let Some(list) = var("SEH_SITE_IDS") {
            self.sync.site_ids = parse_list::<SiteId>(&list).map_err(|e| ConfigError::Env {
                var: "SEH_SITE_IDS",
                message: format!("invalid site id: {e}"),
            })?;
        }
        if let Some(minutes) = var("SEH_OVERLAP_MINUTES") {
            self.sync.overlap_minutes = minutes.trim().parse::<u32>().map_err(|e| ConfigError::Env {
                var: "SEH_OVERLAP_MINUTES",
                message: format!("{e}"),
            })?;
        }
        Ok(())
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use seh_sync::Config;
    ///
    /// let mut config = Config::default();
    /// assert!(config.validate().is_err()); // no API key yet
    ///
    /// config.api.api_key = "KEY".to_string();
    /// config.validate().expect("defaults are valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.api.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.sync.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn parse_list<T: FromStr>(list: &str) -> Result<Vec<T>, T::Err> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse)
        .collect()
}

/// Vendor API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    /// Requests allowed in any trailing 24 hours.
    pub daily_limit: u32,
    pub max_retries: u32,
    /// Delay before the first retry, in seconds. Doubles on each retry.
    pub retry_delay_secs: f64,
    pub max_retry_delay_secs: f64,
    /// How long to wait for daily quota to free up before failing.
    pub quota_wait_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            max_concurrent: 3,
            daily_limit: 300,
            max_retries: 3,
            retry_delay_secs: 2.0,
            max_retry_delay_secs: 60.0,
            quota_wait_secs: 0,
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_concurrent", &self.max_concurrent)
            .field("daily_limit", &self.daily_limit)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("max_retry_delay_secs", &self.max_retry_delay_secs)
            .field("quota_wait_secs", &self.quota_wait_secs)
            .finish()
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy for the client.
    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig::new(self.max_retries)
            .initial_delay(
                Duration::try_from_secs_f64(self.retry_delay_secs)
                    .unwrap_or(defaults.initial_delay),
            )
            .max_delay(
                Duration::try_from_secs_f64(self.max_retry_delay_secs)
                    .unwrap_or(defaults.max_delay),
            )
    }

    /// Rate limiter shared by every request of one run.
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.max_concurrent, self.daily_limit)
            .with_quota_wait(Duration::from_secs(self.quota_wait_secs))
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.api_key.trim().is_empty() {
            errors.push(ValidationError::new(
                "api.api_key",
                "API key is required (set it in the config file or SEH_API_KEY)",
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            errors.push(ValidationError::new(
                "api.base_url",
                format!("'{}' must start with http:// or https://", self.base_url),
            ));
        }
        if self.timeout_secs == 0 {
            errors.push(ValidationError::new("api.timeout_secs", "must be at least 1"));
        }
        if self.max_concurrent == 0 {
            errors.push(ValidationError::new("api.max_concurrent", "must be at least 1"));
        }
        if self.daily_limit == 0 {
            errors.push(ValidationError::new("api.daily_limit", "must be at least 1"));
        }
        if !(self.retry_delay_secs.is_finite() && self.retry_delay_secs > 0.0) {
            errors.push(ValidationError::new(
                "api.retry_delay_secs",
                format!("{} must be a positive number", self.retry_delay_secs),
            ));
        }
        if !(self.max_retry_delay_secs.is_finite()
            && self.max_retry_delay_secs >= self.retry_delay_secs)
        {
            errors.push(ValidationError::new(
                "api.max_retry_delay_secs",
                format!(
                    "{} must be at least retry_delay_secs ({})",
                    self.max_retry_delay_secs, self.retry_delay_secs
                ),
            ));
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: seh_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }
        errors
    }
}

/// What the orchestrator does when a strategy fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Abort the site's remaining strategies and fail the run.
    Strict,
    /// Record the failure on the cursor and continue.
    #[default]
    Lenient,
    /// Leave the cursor untouched and continue.
    Skip,
}

impl ErrorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorMode::Strict => "strict",
            ErrorMode::Lenient => "lenient",
            ErrorMode::Skip => "skip",
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ErrorMode::Strict),
            "lenient" => Ok(ErrorMode::Lenient),
            "skip" => Ok(ErrorMode::Skip),
            other => Err(format!(
                "unknown error handling mode '{other}' (expected strict, lenient or skip)"
            )),
        }
    }
}

/// Window and policy settings of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Lookback for energy when no cursor exists.
    pub energy_lookback_days: u32,
    /// Lookback for power, storage and meters when no cursor exists.
    pub power_lookback_days: u32,
    /// Lookback for inverter and optimizer telemetry.
    pub telemetry_lookback_days: u32,
    /// Subtracted from the cursor's high-water mark on incremental runs.
    pub overlap_minutes: u32,
    pub error_handling: ErrorMode,
    /// Data types left out of every run.
    pub skip_data_types: Vec<DataType>,
    /// Sites to sync when none are given on the command line. Empty means
    /// every site visible to the API key.
    pub site_ids: Vec<SiteId>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            energy_lookback_days: 365,
            power_lookback_days: 7,
            telemetry_lookback_days: 1,
            overlap_minutes: 15,
            error_handling: ErrorMode::Lenient,
            skip_data_types: Vec::new(),
            site_ids: Vec::new(),
        }
    }
}

impl SyncConfig {
    pub fn overlap(&self) -> time::Duration {
        time::Duration::minutes(i64::from(self.overlap_minutes))
    }

    pub fn is_skipped(&self, data_type: DataType) -> bool {
        self.skip_data_types.contains(&data_type)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, days) in [
            ("sync.energy_lookback_days", self.energy_lookback_days),
            ("sync.power_lookback_days", self.power_lookback_days),
            ("sync.telemetry_lookback_days", self.telemetry_lookback_days),
        ] {
            if days == 0 {
                errors.push(ValidationError::new(field, "must be at least 1 day"));
            }
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value in {var}: {message}")]
    Env { var: &'static str, message: String },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `api.daily_limit`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seh")
        .join("config.toml")
}
