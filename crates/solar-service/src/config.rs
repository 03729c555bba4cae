//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use solar_store::MissingDayPolicy;
use solar_types::{ParseError, TimeOfDay};
use time::UtcOffset;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Hot and cold storage locations.
    pub storage: StorageConfig,
    /// Upstream sample source.
    pub upstream: UpstreamConfig,
    /// Background task timing.
    pub schedule: ScheduleConfig,
    /// Local time settings.
    pub clock: ClockConfig,
    /// Window aggregation settings.
    pub aggregation: AggregationConfig,
}

impl Config {
    /// Load configuration from the default path.
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

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Storage paths are not empty, and S3 storage names a bucket
    /// - Upstream URL is http(s) and the poll interval is 10s - 1 hour
    /// - Archive time is `HH:MM`
    /// - UTC offset is between -12 and +14 hours
    ///
    /// # Example
    ///
    /// ```
    /// use solar_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.upstream.validate());
        errors.extend(self.schedule.validate());
        errors.extend(self.clock.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
            return errors;
        }

        match self.bind.rsplit_once(':') {
            None => errors.push(ValidationError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            )),
            Some((_, port)) => match port.parse::<u16>() {
                Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                Err(_) => errors.push(ValidationError::new(
                    "server.bind",
                    format!("invalid port '{}': must be a number 1-65535", port),
                )),
                Ok(_) => {}
            },
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Hot store database file path.
    pub hot_path: PathBuf,
    /// Cold partition storage.
    pub cold: ColdStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            hot_path: solar_store::default_hot_path(),
            cold: ColdStorageConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.hot_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.hot_path",
                "database path cannot be empty",
            ));
        }
        errors.extend(self.cold.validate());

        errors
    }
}

/// Backend for cold partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColdStoreKind {
    /// Files under a local directory.
    #[default]
    Local,
    /// Process memory; lost on restart.
    Memory,
    /// An S3 bucket.
    S3,
}

/// Cold storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColdStorageConfig {
    pub kind: ColdStoreKind,
    /// Root directory for `local`.
    pub path: PathBuf,
    /// Bucket name for `s3`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Bucket region for `s3`. Falls back to `AWS_REGION`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Default for ColdStorageConfig {
    fn default() -> Self {
        Self {
            kind: ColdStoreKind::Local,
            path: solar_store::default_cold_path(),
            bucket: None,
            region: None,
        }
    }
}

impl ColdStorageConfig {
    /// Validate cold storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match self.kind {
            ColdStoreKind::Local if self.path.as_os_str().is_empty() => {
                errors.push(ValidationError::new(
                    "storage.cold.path",
                    "cold storage path cannot be empty",
                ));
            }
            ColdStoreKind::S3 if self.bucket.as_deref().is_none_or(str::is_empty) => {
                errors.push(ValidationError::new(
                    "storage.cold.bucket",
                    "bucket is required when kind = \"s3\"",
                ));
            }
            _ => {}
        }

        errors
    }
}

/// Minimum poll interval in seconds (10 seconds).
pub const MIN_POLL_INTERVAL: u64 = 10;
/// Maximum poll interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL: u64 = 3600;

/// Upstream sample source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Scraper endpoint returning the latest sample as JSON.
    pub url: String,
    /// Poll interval in seconds.
    pub poll_interval: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000/sample".to_string(),
            poll_interval: 300,
            timeout_secs: 15,
        }
    }
}

impl UpstreamConfig {
    /// Validate upstream configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "upstream.url",
                format!("url '{}' must start with http:// or https://", self.url),
            ));
        }

        if self.poll_interval < MIN_POLL_INTERVAL {
            errors.push(ValidationError::new(
                "upstream.poll_interval",
                format!(
                    "poll interval {} is too short (minimum {} seconds)",
                    self.poll_interval, MIN_POLL_INTERVAL
                ),
            ));
        } else if self.poll_interval > MAX_POLL_INTERVAL {
            errors.push(ValidationError::new(
                "upstream.poll_interval",
                format!(
                    "poll interval {} is too long (maximum {} seconds / 1 hour)",
                    self.poll_interval, MAX_POLL_INTERVAL
                ),
            ));
        }

        if self.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "upstream.timeout_secs",
                "timeout must be at least 1 second",
            ));
        }

        errors
    }
}

/// Background task timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local time of the daily archive run, `HH:MM`.
    pub archive_at: String,
    /// Seconds between hot-store expiry sweeps.
    pub sweep_interval: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            archive_at: "23:55".to_string(),
            sweep_interval: 3600,
        }
    }
}

impl ScheduleConfig {
    /// Parsed archive time.
    pub fn archive_time(&self) -> Result<TimeOfDay, ParseError> {
        self.archive_at.parse()
    }

    /// Validate schedule configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.archive_time().is_err() {
            errors.push(ValidationError::new(
                "schedule.archive_at",
                format!("invalid time '{}': expected HH:MM", self.archive_at),
            ));
        }
        if self.sweep_interval < 60 {
            errors.push(ValidationError::new(
                "schedule.sweep_interval",
                format!(
                    "sweep interval {} is too short (minimum 60 seconds)",
                    self.sweep_interval
                ),
            ));
        }

        errors
    }
}

/// Local time settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Offset from UTC in whole hours used for "today" and the freshness gate.
    pub utc_offset_hours: i8,
}

impl ClockConfig {
    /// The configured offset.
    pub fn offset(&self) -> Result<UtcOffset, time::error::ComponentRange> {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0)
    }

    /// Validate clock configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(-12..=14).contains(&self.utc_offset_hours) {
            errors.push(ValidationError::new(
                "clock.utc_offset_hours",
                format!(
                    "offset {} is out of range (-12 to 14)",
                    self.utc_offset_hours
                ),
            ));
        }

        errors
    }
}

/// Window aggregation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// What a window query does when a day has no partition.
    pub missing_day: MissingDayPolicy,
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
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `storage.cold.bucket`).
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

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
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
        .join("solar-tier")
        .join("server.toml")
}
