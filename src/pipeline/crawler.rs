//! Search crawler: walks result pages and feeds descriptors into the queue.

use crate::config::{Config, FullQueuePolicy};
use crate::error::{Error, Result};
use crate::pipeline::queue::{BoundedQueue, PutOutcome};
use crate::pipeline::shutdown::ShutdownSignal;
use crate::types::{Descriptor, DropReason, Event, SearchPage};
use crate::utils::{is_json_content_type, search_url};
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::sync::Arc;
use tokio::sync::broadcast;

/// What one search page turned out to be
#[derive(Debug)]
pub enum PageOutcome {
    /// A decoded page of results
    Page(SearchPage),
    /// The endpoint has nothing more to give; carries the cause
    EndOfResults(String),
}

/// Counters for one crawl
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages fetched and decoded
    pub pages: u32,
    /// Descriptors that entered the queue
    pub enqueued: u64,
    /// Descriptors discarded because the queue had no room
    pub dropped: u64,
}

/// Single producer of the pipeline
#[derive(Clone)]
pub struct SearchCrawler {
    client: reqwest::Client,
    config: Arc<Config>,
    event_tx: broadcast::Sender<Event>,
}

impl SearchCrawler {
    /// Create a crawler sharing the pipeline's HTTP client and event channel
    pub fn new(
        client: reqwest::Client,
        config: Arc<Config>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            client,
            config,
            event_tx,
        }
    }

    /// Fetch and decode one 1-based result page
    ///
    /// # Errors
    ///
    /// Only transport failures are errors: the endpoint being unreachable or
    /// the body being unreadable. A non-success status, a non-JSON content
    /// type and an undecodable body all mean the listing is over.
    pub async fn fetch_page(&self, page: u32) -> Result<PageOutcome> {
        let url = search_url(
            &self.config.search.url_template,
            &self.config.search.phrase(),
            page,
        )?;

        tracing::debug!(page, url = %url, "Requesting search page");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(self.config.search.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                page,
                status = status.as_u16(),
                "Search endpoint returned an error status -> assuming end of list"
            );
            return Ok(PageOutcome::EndOfResults(format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !is_json_content_type(content_type.as_deref()) {
            tracing::info!(
                page,
                content_type = content_type.as_deref().unwrap_or("<none>"),
                "Result is not application/json -> assuming end of list"
            );
            return Ok(PageOutcome::EndOfResults(format!(
                "content type {} is not application/json",
                content_type.as_deref().unwrap_or("<none>")
            )));
        }

        let body = response.bytes().await?;

        match serde_json::from_slice::<SearchPage>(&body) {
            Ok(decoded) => Ok(PageOutcome::Page(decoded)),
            Err(e) => {
                tracing::error!(
                    page,
                    error = %e,
                    "Can't parse JSON structure -> assuming end of list"
                );
                Ok(PageOutcome::EndOfResults(format!("malformed JSON: {e}")))
            }
        }
    }

    /// Lazy sequence of decoded pages, `1..=max_pages`
    ///
    /// The stream ends at the page limit or at the first end-of-results page,
    /// and yields an error at most once, as its last item.
    pub fn pages(&self) -> impl Stream<Item = Result<(u32, SearchPage)>> + '_ {
        let max_pages = self.config.search.max_pages;

        futures::stream::try_unfold(1u32, move |page| async move {
            if page > max_pages {
                return Ok::<_, Error>(None);
            }

            match self.fetch_page(page).await? {
                PageOutcome::Page(decoded) => Ok(Some(((page, decoded), page + 1))),
                PageOutcome::EndOfResults(reason) => {
                    let _ = self.event_tx.send(Event::EndOfResults { page, reason });
                    Ok(None)
                }
            }
        })
    }

    /// Walk every page and enqueue each descriptor of the configured variant
    ///
    /// Stops early once `signal` fires; that is not an error.
    ///
    /// # Errors
    ///
    /// Fatal transport errors from [`fetch_page`](Self::fetch_page).
    pub async fn run(
        &self,
        queue: &BoundedQueue<Descriptor>,
        signal: &ShutdownSignal,
    ) -> Result<CrawlSummary> {
        let variant = self.config.search.variant;
        let mut summary = CrawlSummary::default();
        let mut pages = std::pin::pin!(self.pages());

        'pages: loop {
            if signal.is_triggered() {
                tracing::info!("Stopping search crawler");
                break;
            }

            let next = tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    tracing::info!("Stopping search crawler");
                    break;
                }
                next = pages.next() => next,
            };

            let Some(next) = next else {
                break;
            };
            let (page, decoded) = next?;
            summary.pages += 1;

            let items = decoded.photos.len();
            let descriptors = decoded.into_descriptors(variant);
            tracing::info!(page, items, matches = descriptors.len(), "Fetched search page");
            let _ = self.event_tx.send(Event::PageFetched {
                page,
                items,
                matches: descriptors.len(),
            });

            for descriptor in descriptors {
                if signal.is_triggered() {
                    tracing::info!("Stopping search crawler");
                    break 'pages;
                }
                if !self.offer(queue, descriptor, signal, &mut summary).await {
                    break 'pages;
                }
            }
        }

        tracing::info!(
            pages = summary.pages,
            enqueued = summary.enqueued,
            dropped = summary.dropped,
            "Search crawler finished"
        );
        let _ = self.event_tx.send(Event::CrawlFinished {
            pages: summary.pages,
            enqueued: summary.enqueued,
        });
        Ok(summary)
    }

    /// Offer one descriptor according to the full-queue policy
    ///
    /// Returns `false` when cancellation interrupted the offer.
    async fn offer(
        &self,
        queue: &BoundedQueue<Descriptor>,
        descriptor: Descriptor,
        signal: &ShutdownSignal,
        summary: &mut CrawlSummary,
    ) -> bool {
        let download = &self.config.download;
        let filename = descriptor.filename.clone();
        let outcome = match download.full_queue {
            FullQueuePolicy::Drop => queue.try_put(descriptor),
            FullQueuePolicy::Wait => {
                queue
                    .put(descriptor, signal.token(), download.enqueue_timeout)
                    .await
            }
        };

        match outcome {
            PutOutcome::Queued => {
                summary.enqueued += 1;
                tracing::info!(
                    filename = %filename,
                    queued = queue.approximate_size(),
                    "Pushed picture"
                );
                let _ = self.event_tx.send(Event::Enqueued { filename });
                true
            }
            PutOutcome::Full(descriptor) => {
                self.record_drop(descriptor, DropReason::QueueFull, summary);
                true
            }
            PutOutcome::TimedOut(descriptor) => {
                self.record_drop(descriptor, DropReason::EnqueueTimeout, summary);
                true
            }
            PutOutcome::Cancelled(_) => {
                tracing::info!("Stopping search crawler");
                false
            }
        }
    }

    fn record_drop(&self, descriptor: Descriptor, reason: DropReason, summary: &mut CrawlSummary) {
        summary.dropped += 1;
        tracing::warn!(
            filename = %descriptor.filename,
            ?reason,
            dropped = summary.dropped,
            "Queue full, dropping picture"
        );
        let _ = self.event_tx.send(Event::Dropped {
            filename: descriptor.filename,
            reason,
        });
    }
}
