//! # photo-grab
//!
//! Concurrent photo search crawler and downloader.
//!
//! A single crawler walks the pages of a search endpoint and pushes one
//! [`Descriptor`] per matching result into a bounded queue. A fixed pool of
//! workers takes descriptors off the queue and stores each asset, retrying
//! transient failures with linear backoff. A shutdown coordinator moves the
//! run from Running to Draining, either when the work is done or when the
//! process is interrupted, and waits for every worker before reporting.
//!
//! ## Quick Start
//!
//! ```no_run
//! use photo_grab::{Config, Grabber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.search.terms = vec!["red".into(), "panda".into()];
//!
//!     let grabber = Grabber::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = grabber.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Runs until done or until SIGINT/SIGTERM
//!     let report = grabber.run().await?;
//!     println!("fetched {} files", report.fetched);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Crawler, queue, workers and shutdown coordination
pub mod pipeline;
/// Retry logic with linear backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, FileCollisionAction, FullQueuePolicy};
pub use error::{Error, Result, ToExitCode};
pub use pipeline::Grabber;
pub use types::{Descriptor, Event, PipelineState, RunReport, ShutdownReason, Variant};

/// Wait for a termination signal
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// [`Grabber::run`] drains the pipeline once this resolves.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments such as containers
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
        }
        (Err(e), Ok(sigint)) => wait_for_one(sigint, "SIGINT", e).await,
        (Ok(sigterm), Err(e)) => wait_for_one(sigterm, "SIGTERM", e).await,
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "No signal handlers available, falling back to ctrl_c");
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received Ctrl+C"),
                // A broken handler must not look like an interrupt
                Err(_) => std::future::pending::<()>().await,
            }
        }
    }
}

/// Degraded mode when only one of SIGTERM/SIGINT could be registered
#[cfg(unix)]
async fn wait_for_one(
    mut stream: tokio::signal::unix::Signal,
    name: &'static str,
    missing: std::io::Error,
) {
    tracing::warn!(error = %missing, "Only {name} can stop the run");
    stream.recv().await;
    tracing::info!("Received {name}");
}

/// Wait for a termination signal
///
/// Listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            // Never resolve, so a broken handler does not look like an interrupt
            std::future::pending::<()>().await;
        }
    }
}
