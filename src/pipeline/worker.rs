//! Download worker: takes descriptors off the queue and stores their bytes.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::queue::BoundedQueue;
use crate::pipeline::shutdown::ShutdownSignal;
use crate::retry::download_with_retry;
use crate::types::{Descriptor, Event, WorkerId};
use crate::utils::{create_destination, sanitize_filename};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use url::Url;

/// Counters for one worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Files written
    pub fetched: u64,
    /// Descriptors given up on after an error
    pub abandoned: u64,
    /// Descriptors skipped without a successful request
    pub skipped: u64,
    /// Bytes written across all files
    pub bytes: u64,
}

impl std::ops::AddAssign for WorkerSummary {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.abandoned += other.abandoned;
        self.skipped += other.skipped;
        self.bytes += other.bytes;
    }
}

/// How one descriptor ended
#[derive(Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Stored at the path, with this many bytes
    Fetched {
        /// Where the body was written
        path: PathBuf,
        /// Body length
        bytes: u64,
    },
    /// Nothing fetched, by policy or because the descriptor was unusable
    Skipped(String),
    /// Every allowed attempt failed, or a permanent error occurred
    Abandoned {
        /// Attempts made
        attempts: u32,
        /// Last error
        error: String,
    },
}

/// One member of the worker pool
pub struct DownloadWorker {
    id: WorkerId,
    client: reqwest::Client,
    config: Arc<Config>,
    queue: Arc<BoundedQueue<Descriptor>>,
    signal: ShutdownSignal,
    event_tx: broadcast::Sender<Event>,
}

impl DownloadWorker {
    /// Create a worker bound to the shared queue and signal
    pub fn new(
        id: WorkerId,
        client: reqwest::Client,
        config: Arc<Config>,
        queue: Arc<BoundedQueue<Descriptor>>,
        signal: ShutdownSignal,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            id,
            client,
            config,
            queue,
            signal,
            event_tx,
        }
    }

    /// Process descriptors until the signal fires
    ///
    /// Download failures never end the loop. A descriptor already taken when
    /// the signal fires is still finished, retries included.
    pub async fn run(self) -> WorkerSummary {
        let mut summary = WorkerSummary::default();

        while let Some(descriptor) = self.queue.take(self.signal.token()).await {
            match self.process(&descriptor).await {
                ItemOutcome::Fetched { bytes, .. } => {
                    summary.fetched += 1;
                    summary.bytes += bytes;
                }
                ItemOutcome::Skipped(_) => summary.skipped += 1,
                ItemOutcome::Abandoned { .. } => summary.abandoned += 1,
            }
        }

        tracing::info!(
            worker_id = %self.id,
            fetched = summary.fetched,
            abandoned = summary.abandoned,
            skipped = summary.skipped,
            "Stopping picture grabber"
        );
        summary
    }

    /// Download one descriptor with retries and report how it ended
    pub async fn process(&self, descriptor: &Descriptor) -> ItemOutcome {
        let filename = match sanitize_filename(&descriptor.filename) {
            Ok(name) => name,
            Err(e) => return self.skip(&descriptor.filename, e.to_string()),
        };

        let url = match Url::parse(&descriptor.source_url) {
            Ok(url) => url,
            Err(e) => {
                let reason = format!("invalid source URL {}: {}", descriptor.source_url, e);
                return self.skip(&filename, reason);
            }
        };

        let target = self.config.download.output_dir.join(&filename);
        let attempts = AtomicU32::new(0);

        let result = download_with_retry(&self.config.retry, |attempt| {
            attempts.store(attempt + 1, Ordering::Relaxed);
            let _ = self.event_tx.send(Event::FetchAttempt {
                worker: self.id,
                filename: filename.clone(),
                attempt,
            });
            self.fetch_once(&url, &target, &filename, attempt)
        })
        .await;

        match result {
            Ok((path, bytes)) => {
                tracing::debug!(worker_id = %self.id, path = %path.display(), bytes, "Stored picture");
                let _ = self.event_tx.send(Event::Fetched {
                    worker: self.id,
                    filename,
                    bytes,
                });
                ItemOutcome::Fetched { path, bytes }
            }
            Err(Error::FileExists(path)) => {
                self.skip(&filename, format!("{} already exists", path.display()))
            }
            Err(e) => {
                let attempts = attempts.load(Ordering::Relaxed);
                tracing::error!(
                    worker_id = %self.id,
                    filename = %filename,
                    attempts,
                    error = %e,
                    "Could not fetch after {} attempts -> assuming hard error",
                    attempts
                );
                let _ = self.event_tx.send(Event::Abandoned {
                    worker: self.id,
                    filename,
                    attempts,
                    error: e.to_string(),
                });
                ItemOutcome::Abandoned {
                    attempts,
                    error: e.to_string(),
                }
            }
        }
    }

    /// One GET plus streaming the body to disk
    ///
    /// A partially written file is removed before the error is returned.
    async fn fetch_once(
        &self,
        url: &Url,
        target: &Path,
        filename: &str,
        attempt: u32,
    ) -> Result<(PathBuf, u64)> {
        // Bounds the body stream as well as the headers
        let mut response = self
            .client
            .get(url.clone())
            .timeout(self.config.search.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        tracing::info!(
            worker_id = %self.id,
            filename,
            bytes = response.content_length(),
            attempt,
            "Fetching: {} ({} bytes, try #{})",
            filename,
            response
                .content_length()
                .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            attempt
        );

        let (mut file, path) =
            create_destination(target, self.config.download.file_collision).await?;

        let written = async {
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<_, Error>(written)
        }
        .await;

        match written {
            Ok(bytes) => Ok((path, bytes)),
            Err(e) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %remove_err,
                        "Failed to remove partial file"
                    );
                }
                Err(e)
            }
        }
    }

    fn skip(&self, filename: &str, reason: String) -> ItemOutcome {
        tracing::warn!(worker_id = %self.id, filename, reason = %reason, "Skipping picture");
        let _ = self.event_tx.send(Event::Skipped {
            worker: self.id,
            filename: filename.to_string(),
            reason: reason.clone(),
        });
        ItemOutcome::Skipped(reason)
    }
}
