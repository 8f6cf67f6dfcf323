use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration module
/// This module handles the relay configuration including loading,
/// validating and saving configuration settings, plus the subset of limits
/// that can be changed while jobs are running.
/// Represents the relay configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Global ceiling on outbound API calls per rolling window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Retry rounds allowed per batch before the job fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base in milliseconds, doubled on each retry round
    #[serde(default = "default_retry_delay_base_ms")]
    pub retry_delay_base_ms: u64,

    /// How many times every credential is tried before a retry round is spent
    #[serde(default = "default_rotation_passes")]
    pub rotation_passes: usize,

    /// Length of the rate limiter's rolling window in seconds
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// Margin added to every rate limiter wait
    #[serde(default = "default_rate_safety_margin_ms")]
    pub rate_safety_margin_ms: u64,

    /// Timeout for one generation request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for one callback delivery
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,

    /// Base URL of the generation API
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Batch size used when a request does not give one
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling parameter
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum number of tokens generated per batch
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Age after which finished jobs are swept by `cleanup_expired`
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_requests_per_minute() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_base_ms() -> u64 {
    2000 // 2 seconds base backoff time, doubled on each retry round
}

fn default_rotation_passes() -> usize {
    2
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_rate_safety_margin_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_callback_timeout_secs() -> u64 {
    30
}

fn default_api_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_batch_size() -> usize {
    30
}

fn default_temperature() -> f32 {
    0.3
}

fn default_top_p() -> f32 {
    0.95
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_job_ttl_secs() -> u64 {
    600
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            requests_per_minute: default_requests_per_minute(),
            max_retries: default_max_retries(),
            retry_delay_base_ms: default_retry_delay_base_ms(),
            rotation_passes: default_rotation_passes(),
            rate_window_secs: default_rate_window_secs(),
            rate_safety_margin_ms: default_rate_safety_margin_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            callback_timeout_secs: default_callback_timeout_secs(),
            api_endpoint: default_api_endpoint(),
            default_model: default_model(),
            default_batch_size: default_batch_size(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            job_ttl_secs: default_job_ttl_secs(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_minute == 0 {
            return Err(anyhow!("requestsPerMinute must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(anyhow!("maxRetries must be at least 1"));
        }
        if self.rotation_passes == 0 {
            return Err(anyhow!("rotationPasses must be at least 1"));
        }
        if self.rate_window_secs == 0 {
            return Err(anyhow!("rateWindowSecs must be at least 1"));
        }
        if self.default_batch_size == 0 {
            return Err(anyhow!("defaultBatchSize must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("temperature must be between 0.0 and 2.0, got {}", self.temperature));
        }
        url::Url::parse(&self.api_endpoint)
            .with_context(|| format!("apiEndpoint is not a valid URL: {}", self.api_endpoint))?;
        Ok(())
    }

    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate().context("Configuration validation failed")?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn rate_safety_margin(&self) -> Duration {
        Duration::from_millis(self.rate_safety_margin_ms)
    }

    pub fn retry_delay_base(&self) -> Duration {
        Duration::from_millis(self.retry_delay_base_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }
}

/// Limits that can be changed while jobs are running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub requests_per_minute: u32,
    pub max_retries: u32,
}

/// Partial update of the live limits; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default)]
    pub rpm: Option<u32>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Current live configuration as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub rpm: u32,
    pub max_retries: u32,
    /// Backoff base in seconds
    pub retry_delay_base: f64,
}

/// Result of applying a [`ConfigUpdate`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdateReport {
    pub success: bool,
    pub changes: Vec<String>,
    pub current_config: ConfigView,
}

/// Shared handle to the live limits.
///
/// Every clone observes the same values; readers always see the latest update.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    limits: Arc<RwLock<Limits>>,
    retry_delay_base: Duration,
}

impl RuntimeConfig {
    pub fn new(config: &Config) -> Self {
        Self {
            limits: Arc::new(RwLock::new(Limits {
                requests_per_minute: config.requests_per_minute.max(1),
                max_retries: config.max_retries.max(1),
            })),
            retry_delay_base: config.retry_delay_base(),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.limits.read().requests_per_minute
    }

    pub fn max_retries(&self) -> u32 {
        self.limits.read().max_retries
    }

    pub fn limits(&self) -> Limits {
        *self.limits.read()
    }

    /// Base delay of the retry backoff
    pub fn retry_delay_base(&self) -> Duration {
        self.retry_delay_base
    }

    /// Apply an update, clamping every provided value to at least 1
    pub fn apply(&self, update: &ConfigUpdate) -> ConfigUpdateReport {
        let mut changes = Vec::new();
        {
            let mut limits = self.limits.write();

            if let Some(rpm) = update.rpm {
                let old = limits.requests_per_minute;
                limits.requests_per_minute = rpm.max(1);
                changes.push(format!("RPM: {} -> {}", old, limits.requests_per_minute));
            }

            if let Some(max_retries) = update.max_retries {
                let old = limits.max_retries;
                limits.max_retries = max_retries.max(1);
                changes.push(format!("Max retries: {} -> {}", old, limits.max_retries));
            }
        }

        if !changes.is_empty() {
            info!("Config updated: {}", changes.join(", "));
        }

        ConfigUpdateReport {
            success: true,
            changes,
            current_config: self.view(),
        }
    }

    pub fn view(&self) -> ConfigView {
        let limits = self.limits();
        ConfigView {
            rpm: limits.requests_per_minute,
            max_retries: limits.max_retries,
            retry_delay_base: self.retry_delay_base.as_secs_f64(),
        }
    }
}
