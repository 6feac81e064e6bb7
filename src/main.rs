//! photo-grab - search for photos and download every match concurrently.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use photo_grab::{Grabber, ToExitCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity
    let default_filter = if cli.verbose {
        "photo_grab=debug"
    } else {
        "photo_grab=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "Invalid configuration");
            return ExitCode::from(e.exit_code());
        }
    };

    let grabber = match Grabber::new(config).await {
        Ok(grabber) => grabber,
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "Could not start");
            return ExitCode::from(e.exit_code());
        }
    };

    match grabber.run().await {
        Ok(report) => {
            tracing::info!(
                pages = report.pages,
                enqueued = report.enqueued,
                dropped = report.dropped,
                fetched = report.fetched,
                abandoned = report.abandoned,
                skipped = report.skipped,
                bytes = report.bytes,
                reason = ?report.reason,
                elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
                "Finished."
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "Grab failed");
            ExitCode::from(e.exit_code())
        }
    }
}
