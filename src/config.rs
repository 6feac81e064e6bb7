//! Configuration types for photo-grab

use crate::error::{Error, Result};
use crate::types::Variant;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Search URL used when none is configured
///
/// `{query}` receives the form-encoded search phrase, `{page}` the 1-based page.
pub const DEFAULT_SEARCH_URL: &str = "http://www.flickr.com/search?data=1&mt=photos&cm=&m=&l=&w=&hd=&d=&append=0&s=&q={query}&page={page}";

/// Search endpoint settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search terms, joined with spaces to form the query
    #[serde(default)]
    pub terms: Vec<String>,

    /// Rendition to fetch (default: original)
    #[serde(default)]
    pub variant: Variant,

    /// Maximum number of result pages to walk (default: 3)
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Search URL template with `{query}` and `{page}` placeholders
    #[serde(default = "default_search_url")]
    pub url_template: String,

    /// Per-request timeout for search and download requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            variant: Variant::default(),
            max_pages: default_max_pages(),
            url_template: default_search_url(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl SearchConfig {
    /// The search phrase sent to the endpoint
    pub fn phrase(&self) -> String {
        self.terms.join(" ")
    }
}

/// What the crawler does when the queue has no room
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum FullQueuePolicy {
    /// Wait for room (bounded by `enqueue_timeout` and cancellation)
    #[default]
    Wait,
    /// Drop the descriptor immediately, logging and counting it
    Drop,
}

/// File collision handling strategy
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Truncate and rewrite the existing file (default)
    #[default]
    Overwrite,
    /// Append (1), (2), etc. to the filename
    Rename,
    /// Keep the existing file and skip the download
    Skip,
}

/// Download and worker pool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output directory (default: the platform temp directory)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of concurrent download workers (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Queue slots per worker (default: 100)
    #[serde(default = "default_queue_capacity_per_worker")]
    pub queue_capacity_per_worker: usize,

    /// Behavior when the queue is full
    #[serde(default)]
    pub full_queue: FullQueuePolicy,

    /// Longest wait for a queue slot under [`FullQueuePolicy::Wait`] (None = until cancelled)
    #[serde(
        default,
        with = "optional_duration_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub enqueue_timeout: Option<Duration>,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Create the output directory if it does not exist (default: true)
    #[serde(default = "default_true")]
    pub create_output_dir: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            queue_capacity_per_worker: default_queue_capacity_per_worker(),
            full_queue: FullQueuePolicy::default(),
            enqueue_timeout: None,
            file_collision: FileCollisionAction::default(),
            create_output_dir: true,
        }
    }
}

impl DownloadConfig {
    /// Total queue capacity
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity_per_worker
            .saturating_mul(self.concurrency)
            .max(1)
    }
}

/// Retry configuration for per-item downloads
///
/// Backoff is linear: after failed attempt `n` (0-based) the worker sleeps
/// `2 * (n + 1) * backoff_unit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per descriptor, including the first (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Length of one backoff time unit (default: 1 second)
    #[serde(default = "default_backoff_unit", with = "millis_serde")]
    pub backoff_unit: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit: default_backoff_unit(),
            jitter: false,
        }
    }
}

/// Main configuration for a grab run
///
/// Fields are organized into sub-configs:
/// - [`search`](SearchConfig): query, rendition, pagination, endpoint
/// - [`download`](DownloadConfig): output, worker pool, queue, collisions
/// - [`retry`](RetryConfig): per-item attempt budget and backoff
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search endpoint settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Download and worker pool settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Per-item retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from a TOML or JSON file (chosen by extension)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.search.phrase().trim().is_empty() {
            return Err(Error::config("no search terms given", "search.terms"));
        }
        if self.search.max_pages == 0 {
            return Err(Error::config(
                "must walk at least one page",
                "search.max_pages",
            ));
        }
        for placeholder in ["{query}", "{page}"] {
            if !self.search.url_template.contains(placeholder) {
                return Err(Error::config(
                    format!("search URL template is missing {placeholder}"),
                    "search.url_template",
                ));
            }
        }
        if self.download.concurrency == 0 {
            return Err(Error::config(
                "need at least one worker",
                "download.concurrency",
            ));
        }
        if self.download.queue_capacity_per_worker == 0 {
            return Err(Error::config(
                "queue needs at least one slot per worker",
                "download.queue_capacity_per_worker",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "need at least one attempt per item",
                "retry.max_attempts",
            ));
        }
        Ok(())
    }
}

fn default_max_pages() -> u32 {
    3
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("photo-grab/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity_per_worker() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_unit() -> Duration {
    Duration::from_secs(1)
}

// Duration serialization helper (as seconds)
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

// Duration serialization helper (as milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
