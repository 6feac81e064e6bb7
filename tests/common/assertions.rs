//! Custom test assertions for E2E tests

use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

use photo_grab::{Event, PipelineState};

/// Collect every event until `Shutdown` arrives or the timeout expires
pub async fn collect_until_shutdown(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, Event::Shutdown);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}

/// Wait for the first event matching `pred`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    pred: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// State transitions in the order they were announced
pub fn state_transitions(events: &[Event]) -> Vec<PipelineState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Sorted file names in `dir`
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", dir.display(), e))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

/// Assert that `dir/file` holds exactly `expected`
pub fn assert_file_contents(dir: &Path, file: &str, expected: &[u8]) {
    let path = dir.join(file);
    let actual = std::fs::read(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert_eq!(
        actual,
        expected,
        "{} does not hold the served body",
        path.display()
    );
}
