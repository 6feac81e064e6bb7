//! Shared test helpers for pipeline tests against a mock search endpoint.

use crate::config::Config;
use crate::types::{Descriptor, Event};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing at `server`, writing into `output_dir`, with a tiny backoff unit
pub(crate) fn test_config(server: &MockServer, output_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.search.terms = vec!["red".to_string(), "panda".to_string()];
    config.search.max_pages = 1;
    config.search.url_template = format!("{}/search?q={{query}}&page={{page}}", server.uri());
    config.search.request_timeout = Duration::from_secs(5);
    config.download.output_dir = output_dir.to_path_buf();
    config.download.concurrency = 2;
    config.retry.backoff_unit = Duration::from_millis(5);
    config
}

/// One search result item carrying the given size keys
pub(crate) fn photo(server: &MockServer, name: &str, keys: &[&str]) -> Value {
    let sizes: serde_json::Map<String, Value> = keys
        .iter()
        .map(|key| {
            let file = format!("{}_{}.jpg", name, key);
            (
                key.to_string(),
                json!({
                    "label": key,
                    "file": file,
                    "url": format!("{}/img/{}", server.uri(), file),
                }),
            )
        })
        .collect();

    json!({ "name": name, "description": "", "sizes": sizes })
}

/// Mount a JSON search page answering `page`
pub(crate) async fn mount_page(server: &MockServer, page: u32, photos: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "photos": photos })))
        .mount(server)
        .await;
}

/// Mount an image body at `/img/<file>`
pub(crate) async fn mount_image(server: &MockServer, file: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/img/{}", file)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// A descriptor served by the mock server
pub(crate) fn descriptor(server: &MockServer, file: &str) -> Descriptor {
    Descriptor {
        label: "o".to_string(),
        filename: file.to_string(),
        source_url: format!("{}/img/{}", server.uri(), file),
    }
}

/// Drain every event currently buffered
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// Wait until an event matching `pred` arrives, failing after five seconds
pub(crate) async fn wait_for_event<F>(rx: &mut broadcast::Receiver<Event>, pred: F) -> Event
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
