//! Search result fixtures and mock endpoint wiring

use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// File name the fixtures give the `key` rendition of photo `name`
pub fn asset_name(name: &str, key: &str) -> String {
    format!("{}_{}.jpg", name, key)
}

/// Body served for an asset; distinct per file so mix-ups are visible
pub fn asset_body(file: &str) -> Vec<u8> {
    format!("bytes of {}", file).into_bytes()
}

/// One search result item offering the given size keys
pub fn photo(server: &MockServer, name: &str, keys: &[&str]) -> Value {
    let sizes: serde_json::Map<String, Value> = keys
        .iter()
        .map(|key| {
            let file = asset_name(name, key);
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

    json!({ "name": name, "description": format!("photo {}", name), "sizes": sizes })
}

/// Serve a JSON search page
pub async fn mount_search_page(server: &MockServer, page: u32, photos: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "photos": photos })))
        .mount(server)
        .await;
}

/// Serve an HTML page where JSON is expected, which ends the listing
pub async fn mount_html_page(server: &MockServer, page: u32) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>no more results</html>", "text/html"),
        )
        .mount(server)
        .await;
}

/// Serve an asset, expecting exactly `expected` requests for it
pub async fn mount_asset(server: &MockServer, file: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/img/{}", file)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(asset_body(file)))
        .expect(expected)
        .mount(server)
        .await;
}

/// Serve an asset slowly
pub async fn mount_slow_asset(server: &MockServer, file: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/img/{}", file)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(asset_body(file))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Serve an asset that always fails with `status`
pub async fn mount_failing_asset(server: &MockServer, file: &str, status: u16, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/img/{}", file)))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected)
        .mount(server)
        .await;
}
