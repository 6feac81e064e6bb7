//! Retry logic with linear backoff
//!
//! Each descriptor gets a fixed budget of attempts. After failed attempt `n`
//! (0-based) the caller sleeps `2 * (n + 1)` backoff units, so with the default
//! budget of five the delays are 2, 4, 6, 8 and 10 units. The delay after the
//! last attempt is still taken before the item is given up.
//!
//! # Example
//!
//! ```no_run
//! use photo_grab::retry::{IsRetryable, download_with_retry};
//! use photo_grab::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! download_with_retry(&config, |_attempt| async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection refused, timeout, server busy) return `true`.
/// Permanent failures (not found, permission denied, bad filename) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Anything that went wrong on the wire
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            // Request timeout, rate limited, or server side failure
            Error::HttpStatus { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Config { .. } | Error::ConfigFile(_) => false,
            Error::InvalidUrl { .. } => false,
            Error::InvalidFilename(_) => false,
            Error::FileExists(_) => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Delay taken after failed attempt `attempt` (0-based)
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let units = 2 * (attempt.saturating_add(1));
    let delay = config.backoff_unit.saturating_mul(units);
    if config.jitter { add_jitter(delay) } else { delay }
}

/// Execute an async operation with the linear backoff policy
///
/// The operation receives the 0-based attempt index. It is called at most
/// `config.max_attempts` times; a non-retryable error ends the loop at once.
///
/// # Returns
///
/// The first successful result, or the last error once the budget is spent.
pub async fn download_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() => {
                let delay = backoff_delay(config, attempt);

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "Attempt failed, backing off"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;

                if attempt >= max_attempts {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all attempts exhausted"
                    );
                    return Err(e);
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempt = attempt,
                    "Operation failed with non-retryable error"
                );
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
