//! Core types for photo-grab

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of one download worker in the pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub usize);

impl WorkerId {
    /// Get the inner index
    pub fn get(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rendition of a photo to fetch
///
/// The search endpoint keys its size mapping by short codes (`o`, `sq`, ...);
/// the long names are what users type.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Original upload (`o`)
    #[default]
    #[serde(alias = "o")]
    #[value(alias = "o")]
    Original,
    /// 75x75 square crop (`sq`)
    #[serde(alias = "sq")]
    #[value(alias = "sq")]
    Square,
    /// 150x150 square crop (`q`)
    #[serde(alias = "q")]
    #[value(alias = "q")]
    LargeSquare,
    /// Thumbnail (`t`)
    #[serde(alias = "t")]
    #[value(alias = "t")]
    Thumbnail,
    /// Small (`s`)
    #[serde(alias = "s")]
    #[value(alias = "s")]
    Small,
    /// Medium (`m`)
    #[serde(alias = "m")]
    #[value(alias = "m")]
    Medium,
}

impl Variant {
    /// All variants, in the order the search endpoint documents them
    pub const ALL: [Variant; 6] = [
        Variant::Original,
        Variant::Square,
        Variant::LargeSquare,
        Variant::Thumbnail,
        Variant::Small,
        Variant::Medium,
    ];

    /// Key used in the search result size mapping
    pub fn key(&self) -> &'static str {
        match self {
            Variant::Original => "o",
            Variant::Square => "sq",
            Variant::LargeSquare => "q",
            Variant::Thumbnail => "t",
            Variant::Small => "s",
            Variant::Medium => "m",
        }
    }

    /// Look a variant up by its size mapping key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.key() == key)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Variant::Original => "original",
            Variant::Square => "square",
            Variant::LargeSquare => "large-square",
            Variant::Thumbnail => "thumbnail",
            Variant::Small => "small",
            Variant::Medium => "medium",
        };
        f.write_str(name)
    }
}

/// One fetchable asset: a single rendition of a single search result
///
/// Moved by value from the crawler into the queue and from the queue into
/// exactly one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Size label as reported by the endpoint (e.g. "Original")
    #[serde(default)]
    pub label: String,
    /// Destination base name
    #[serde(rename = "file", default)]
    pub filename: String,
    /// Absolute URL of the bytes
    #[serde(rename = "url", default)]
    pub source_url: String,
}

/// One search result item
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchItem {
    /// Photo title
    #[serde(default)]
    pub name: String,
    /// Photo description
    #[serde(default)]
    pub description: String,
    /// Available renditions keyed by size code
    #[serde(default)]
    pub sizes: HashMap<String, Descriptor>,
}

/// One decoded page of search results
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchPage {
    /// Result items in endpoint order
    #[serde(default)]
    pub photos: Vec<SearchItem>,
}

impl SearchPage {
    /// Consume the page, keeping the requested rendition of every item that has one
    pub fn into_descriptors(self, variant: Variant) -> Vec<Descriptor> {
        let key = variant.key();
        self.photos
            .into_iter()
            .filter_map(|mut item| item.sizes.remove(key))
            .collect()
    }
}

/// Lifecycle state of a pipeline run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Crawler producing, workers consuming
    Running,
    /// Cancellation fired, in-flight items finishing
    Draining,
    /// Every worker has exited
    Stopped,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What moved the pipeline into [`PipelineState::Draining`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    /// Crawler finished and the queue ran dry
    Completed,
    /// OS interrupt or termination request
    Signal,
    /// Crawler hit a fatal error
    CrawlerFailed,
}

/// Why a descriptor never reached the queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Queue was full and the policy is to drop
    QueueFull,
    /// Queue stayed full for the whole enqueue timeout
    EnqueueTimeout,
}

/// Event emitted while the pipeline runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A search page was fetched and decoded
    PageFetched {
        /// 1-based page number
        page: u32,
        /// Items on the page
        items: usize,
        /// Items carrying the requested rendition
        matches: usize,
    },

    /// The endpoint signalled there are no more results
    EndOfResults {
        /// Page that ended the listing
        page: u32,
        /// Human-readable cause
        reason: String,
    },

    /// A descriptor entered the queue
    Enqueued {
        /// Destination file name
        filename: String,
    },

    /// A descriptor was discarded before reaching the queue
    Dropped {
        /// Destination file name
        filename: String,
        /// Why it was discarded
        reason: DropReason,
    },

    /// The crawler stopped producing
    CrawlFinished {
        /// Pages fetched and decoded
        pages: u32,
        /// Descriptors enqueued
        enqueued: u64,
    },

    /// A worker is issuing a request for a descriptor
    FetchAttempt {
        /// Worker handling the item
        worker: WorkerId,
        /// Destination file name
        filename: String,
        /// 0-based attempt index
        attempt: u32,
    },

    /// A file was written
    Fetched {
        /// Worker handling the item
        worker: WorkerId,
        /// Destination file name
        filename: String,
        /// Bytes written
        bytes: u64,
    },

    /// A descriptor was skipped without any request
    Skipped {
        /// Worker handling the item
        worker: WorkerId,
        /// Destination file name
        filename: String,
        /// Human-readable cause
        reason: String,
    },

    /// A descriptor was given up on
    Abandoned {
        /// Worker handling the item
        worker: WorkerId,
        /// Destination file name
        filename: String,
        /// Number of attempts made
        attempts: u32,
        /// Last error message
        error: String,
    },

    /// Pipeline changed state
    StateChanged {
        /// The new state
        state: PipelineState,
    },

    /// Every worker has exited
    Shutdown,
}

/// Summary of a finished run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Pages fetched and decoded
    pub pages: u32,
    /// Descriptors enqueued
    pub enqueued: u64,
    /// Descriptors dropped before reaching the queue
    pub dropped: u64,
    /// Files written
    pub fetched: u64,
    /// Descriptors abandoned after failed attempts
    pub abandoned: u64,
    /// Descriptors skipped (unusable name, existing file)
    pub skipped: u64,
    /// Total bytes written
    pub bytes: u64,
    /// What started the drain
    pub reason: ShutdownReason,
    /// State at the end of the run
    pub state: PipelineState,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the last worker exited
    pub finished_at: DateTime<Utc>,
}
