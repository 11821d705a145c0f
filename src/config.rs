//! Configuration types for hn-pull

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Upstream API configuration (endpoint, timeouts)
///
/// Groups settings for the Hacker News Firebase API connection.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API (default: the official v0 endpoint)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Connection establishment timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Traversal behavior configuration (concurrency, batching, stop conditions)
///
/// Groups settings that control how the descending ID walk is performed.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullConfig {
    /// Maximum simultaneously in-flight API requests (default: 50)
    ///
    /// This admission ceiling is the system's only form of self-imposed rate
    /// limiting; the upstream API publishes no limit of its own.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Item IDs fetched per traversal step (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Hard cap on persisted items (None = unlimited)
    #[serde(default)]
    pub max_items: Option<u64>,

    /// Stop at items older than this many months from run start
    /// (None = no time limit)
    ///
    /// A month is a 30-day window. Fractional values are allowed.
    #[serde(default)]
    pub n_months: Option<f64>,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            batch_size: default_batch_size(),
            max_items: None,
            n_months: None,
        }
    }
}

/// Output stream configuration
///
/// Both streams are append-only JSONL files; they may be reopened and
/// resumed across runs. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Items stream path (default: "./data/items.jsonl")
    #[serde(default = "default_items_path")]
    pub items_path: PathBuf,

    /// Users stream path (default: "./data/users.jsonl")
    #[serde(default = "default_users_path")]
    pub users_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            items_path: default_items_path(),
            users_path: default_users_path(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for a pull run
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — upstream endpoint and timeouts
/// - [`pull`](PullConfig) — concurrency ceiling, batching, stop conditions
/// - [`output`](OutputConfig) — JSONL stream paths
/// - [`retry`](RetryConfig) — backoff for transient failures
///
/// The `api`/`pull`/`output` sub-configs are flattened for serialization,
/// so the JSON/TOML format stays a single flat options object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API settings
    #[serde(flatten)]
    pub api: ApiConfig,

    /// Traversal settings
    #[serde(flatten)]
    pub pull: PullConfig,

    /// Output stream settings
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found
    ///
    /// Checks that the counters controlling admission and batching are
    /// positive, that optional limits are meaningful, and that the base URL
    /// parses.
    pub fn validate(&self) -> Result<()> {
        if self.pull.max_concurrent == 0 {
            return Err(Error::Config {
                message: "max_concurrent must be positive".to_string(),
                key: Some("max_concurrent".to_string()),
            });
        }
        if self.pull.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be positive".to_string(),
                key: Some("batch_size".to_string()),
            });
        }
        if self.pull.max_items == Some(0) {
            return Err(Error::Config {
                message: "max_items must be positive when set".to_string(),
                key: Some("max_items".to_string()),
            });
        }
        if let Some(months) = self.pull.n_months {
            if !months.is_finite() || months <= 0.0 {
                return Err(Error::Config {
                    message: "n_months must be a positive number when set".to_string(),
                    key: Some("n_months".to_string()),
                });
            }
        }
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(Error::Config {
                message: format!("base_url is not a valid URL: {}", self.api.base_url),
                key: Some("base_url".to_string()),
            });
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://hacker-news.firebaseio.com/v0".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_concurrent() -> usize {
    50
}

fn default_batch_size() -> usize {
    100
}

fn default_items_path() -> PathBuf {
    PathBuf::from("./data/items.jsonl")
}

fn default_users_path() -> PathBuf {
    PathBuf::from("./data/users.jsonl")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (seconds as integers)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
