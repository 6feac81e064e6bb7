//! Test configuration helpers for pointing a grabber at a mock endpoint

use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

use photo_grab::{Config, Grabber};

/// Search URL template served by `server`
pub fn search_template(server: &MockServer) -> String {
    format!("{}/search?q={{query}}&page={{page}}", server.uri())
}

/// Config for a run against `server` that writes into `output_dir`
///
/// Uses a 5 ms backoff unit so exhausted retries finish quickly.
pub fn create_test_config(server: &MockServer, output_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.search.terms = vec!["mountain".to_string(), "lake".to_string()];
    config.search.max_pages = 1;
    config.search.url_template = search_template(server);
    config.search.request_timeout = Duration::from_secs(5);
    config.download.output_dir = output_dir.to_path_buf();
    config.download.concurrency = 2;
    config.retry.backoff_unit = Duration::from_millis(5);
    config
}

/// Create a grabber with a fresh output directory
///
/// Returns the grabber and the tempdir (which must be kept alive).
pub async fn create_test_grabber(server: &MockServer) -> (Grabber, TempDir) {
    create_test_grabber_with(server, |_| {}).await
}

/// Like [`create_test_grabber`], with a hook to adjust the config first
pub async fn create_test_grabber_with<F>(server: &MockServer, adjust: F) -> (Grabber, TempDir)
where
    F: FnOnce(&mut Config),
{
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(server, temp_dir.path());
    adjust(&mut config);

    let grabber = Grabber::new(config)
        .await
        .expect("Failed to create grabber");
    (grabber, temp_dir)
}

/// A port on localhost that nothing listens on
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);
    port
}
