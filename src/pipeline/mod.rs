//! The fetch pipeline: crawler, bounded queue, worker pool and shutdown.

pub mod crawler;
pub mod queue;
pub mod shutdown;
pub mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use crawler::{CrawlSummary, PageOutcome, SearchCrawler};
pub use queue::{BoundedQueue, PutOutcome};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
pub use worker::{DownloadWorker, ItemOutcome, WorkerSummary};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Event, RunReport, ShutdownReason, WorkerId};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Runs one search-and-download job
///
/// Owns the configuration, the HTTP client and the event channel. Each call
/// to [`run`](Self::run) builds a fresh queue, worker pool and coordinator.
#[derive(Clone)]
pub struct Grabber {
    config: Arc<Config>,
    client: reqwest::Client,
    event_tx: broadcast::Sender<Event>,
}

impl Grabber {
    /// Validate the configuration and prepare the output directory
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings, or an I/O error if
    /// the output directory cannot be created.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let output_dir = &config.download.output_dir;
        if config.download.create_output_dir {
            tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        output_dir.display(),
                        e
                    ),
                ))
            })?;
        } else if !tokio::fs::try_exists(output_dir).await? {
            return Err(Error::config(
                format!("output directory '{}' does not exist", output_dir.display()),
                "download.output_dir",
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.search.request_timeout)
            .user_agent(config.search.user_agent.clone())
            .build()?;

        // Buffer of 1000 events per subscriber
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            config: Arc::new(config),
            client,
            event_tx,
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Events sent before subscribing are not replayed. A slow subscriber
    /// that falls more than 1000 events behind sees `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this grabber runs with
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Run until the work is done or SIGINT/SIGTERM arrives
    ///
    /// # Errors
    ///
    /// Returns the crawler's fatal error, after the workers have drained.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_until(crate::wait_for_signal()).await
    }

    /// Run until the work is done or `interrupt` resolves
    ///
    /// Resolution of `interrupt` plays the role of an OS signal: the pipeline
    /// drains and the report carries [`ShutdownReason::Signal`].
    ///
    /// # Errors
    ///
    /// Returns the crawler's fatal error, after the workers have drained.
    pub async fn run_until<F>(&self, interrupt: F) -> Result<RunReport>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let started_at = Utc::now();
        let search = &self.config.search;
        let download = &self.config.download;

        tracing::info!(
            query = %search.phrase(),
            variant = %search.variant,
            max_pages = search.max_pages,
            output_dir = %download.output_dir.display(),
            "Grabbing images for search clause"
        );

        let queue = Arc::new(BoundedQueue::new(download.queue_capacity()));
        let coordinator = ShutdownCoordinator::new(self.event_tx.clone());
        let signal = coordinator.signal().clone();

        let watcher = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = interrupt => {
                        tracing::info!("Caught kill signal ... sending stop signal");
                        coordinator.begin_drain(ShutdownReason::Signal);
                    }
                    _ = coordinator.signal().cancelled() => {}
                }
            })
        };

        tracing::info!(workers = download.concurrency, "Starting grabbing workers");
        let workers: Vec<_> = (0..download.concurrency)
            .map(|i| {
                let worker = DownloadWorker::new(
                    WorkerId(i),
                    self.client.clone(),
                    self.config(),
                    queue.clone(),
                    signal.clone(),
                    self.event_tx.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!("Start grabbing picture uris");
        let crawler =
            SearchCrawler::new(self.client.clone(), self.config(), self.event_tx.clone());
        let crawl = {
            let queue = queue.clone();
            let signal = signal.clone();
            tokio::spawn(async move { crawler.run(&queue, &signal).await })
        };

        let crawl_result = match crawl.await {
            Ok(result) => result,
            Err(e) => Err(Error::Other(format!("crawler task failed: {}", e))),
        };

        match &crawl_result {
            Ok(_) => {
                tokio::select! {
                    _ = queue.wait_until_empty() => {
                        coordinator.begin_drain(ShutdownReason::Completed);
                    }
                    _ = signal.cancelled() => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Search crawler failed");
                coordinator.begin_drain(ShutdownReason::CrawlerFailed);
            }
        }

        tracing::info!("Waiting for grabbers to be done");
        let mut totals = WorkerSummary::default();
        for (i, handle) in workers.into_iter().enumerate() {
            match handle.await {
                Ok(summary) => totals += summary,
                Err(e) => tracing::error!(worker_id = i, error = %e, "Worker task failed"),
            }
        }

        coordinator.mark_stopped();
        if let Err(e) = watcher.await {
            tracing::warn!(error = %e, "Signal watcher task failed");
        }

        let crawl = crawl_result?;
        let report = RunReport {
            pages: crawl.pages,
            enqueued: crawl.enqueued,
            dropped: crawl.dropped,
            fetched: totals.fetched,
            abandoned: totals.abandoned,
            skipped: totals.skipped,
            bytes: totals.bytes,
            reason: coordinator.reason().unwrap_or(ShutdownReason::Completed),
            state: coordinator.state(),
            started_at,
            finished_at: Utc::now(),
        };

        Ok(report)
    }
}
