//! End-to-end tests over the full pipeline: HTTP source, file-backed store,
//! repository, presentation state and the alert checker

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use waitwatch::domain::{AttractionWaitTime, SortDirection, SortType, WaitTimeAlert};
use waitwatch::infra::Metrics;
use waitwatch::io::{FileStore, HttpWaitTimeSource, JsonlNotifier, KeyValueStore, SourceError, WaitTimeSource};
use waitwatch::services::{
    AlertChecker, AlertStore, CheckOutcome, DataSource, PresentationState, RefreshOutcome, WaitTimeCache,
    WaitTimeRepository,
};

/// Serve canned responses in order, one per connection
async fn serve_sequence(responses: Vec<(&'static str, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for (status_line, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
    });

    format!("http://{}/v1/waitingtimes", addr)
}

/// In-process source replaying a script; `None` is a failed fetch
struct ScriptedSource {
    responses: Mutex<VecDeque<Option<Vec<AttractionWaitTime>>>>,
}

impl ScriptedSource {
    fn new(responses: Vec<Option<Vec<AttractionWaitTime>>>) -> Arc<Self> {
        Arc::new(Self { responses: Mutex::new(responses.into()) })
    }
}

#[async_trait]
impl WaitTimeSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<AttractionWaitTime>, SourceError> {
        self.responses.lock().pop_front().flatten().ok_or(SourceError::Status(503))
    }
}

fn repository(source: Arc<dyn WaitTimeSource>, store: Arc<dyn KeyValueStore>) -> Arc<WaitTimeRepository> {
    Arc::new(WaitTimeRepository::new(source, WaitTimeCache::new(store), Arc::new(Metrics::new())))
}

fn file_store(path: &Path) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::new(path))
}

fn names(items: &[AttractionWaitTime]) -> Vec<&str> {
    items.iter().map(|i| i.name.as_str()).collect()
}

#[tokio::test]
async fn test_network_then_cache_fallback_over_http() {
    let url = serve_sequence(vec![
        (
            "200 OK",
            r#"[{"code":"1","name":"T","waitingtime":80,"status":"opened"},
                {"code":"2","name":"M","waitingtime":35,"status":"opened","extra":true}]"#,
        ),
        ("503 Service Unavailable", ""),
    ])
    .await;

    let dir = tempdir().unwrap();
    let store = file_store(&dir.path().join("store.json"));
    let source = HttpWaitTimeSource::new(&url, "phantasialand", "de", Duration::from_secs(5)).unwrap();
    let repository = repository(Arc::new(source), store);

    let first = repository.fetch().await.unwrap();
    assert_eq!(first.source, DataSource::Network);
    assert_eq!(names(&first.items), vec!["M", "T"]);

    let second = repository.fetch().await.unwrap();
    assert_eq!(second.source, DataSource::CacheFallback);
    assert!(second.from_cache());
    assert_eq!(second.items, first.items);
    assert_eq!(second.stored_at, first.stored_at);
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let items = vec![
        AttractionWaitTime::new("1", "Taron", 80, "opened"),
        AttractionWaitTime::new("2", "Black Mamba", 35, "opened"),
    ];

    let first_run = repository(ScriptedSource::new(vec![Some(items)]), file_store(&path));
    let fetched = first_run.fetch().await.unwrap();

    // New process: fresh store handle, network down
    let second_run = repository(ScriptedSource::new(vec![None]), file_store(&path));
    let fallback = second_run.fetch().await.unwrap();
    assert_eq!(fallback.source, DataSource::CacheFallback);
    assert_eq!(fallback.items, fetched.items);
    assert_eq!(fallback.stored_at.timestamp_millis(), fetched.stored_at.timestamp_millis());
}

#[tokio::test]
async fn test_no_network_no_cache_is_an_error() {
    let dir = tempdir().unwrap();
    let repository = repository(ScriptedSource::new(vec![None]), file_store(&dir.path().join("store.json")));
    assert!(matches!(repository.fetch().await, Err(SourceError::Status(503))));
}

#[tokio::test]
async fn test_checker_fires_one_shot_alert_into_jsonl() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir.path().join("store.json"));
    let notifications = dir.path().join("notifications.jsonl");

    let current = vec![
        AttractionWaitTime::new("34", "Taron", 25, "opened"),
        AttractionWaitTime::new("12", "Black Mamba", 50, "opened"),
    ];
    let alerts = Arc::new(AlertStore::new(store.clone()));
    alerts.upsert(WaitTimeAlert::new("34", "Taron", 30)).unwrap();
    alerts.upsert(WaitTimeAlert::new("99", "Gone", 30)).unwrap();

    let checker = AlertChecker::new(
        repository(ScriptedSource::new(vec![Some(current.clone()), Some(current)]), store.clone()),
        alerts.clone(),
        Arc::new(JsonlNotifier::new(&notifications)),
        Arc::new(Metrics::new()),
        Duration::from_secs(60),
    );

    let outcome = checker.run_once().await;
    assert_eq!(outcome.fired_count(), 1);

    // "34" fired and is gone; "99" is absent from the data and stays armed
    let remaining = AlertStore::new(file_store(&dir.path().join("store.json"))).get_all().unwrap();
    assert_eq!(remaining, vec![WaitTimeAlert::new("99", "Gone", 30)]);

    let content = std::fs::read_to_string(&notifications).unwrap();
    let lines: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["code"], "34");
    assert_eq!(lines[0]["body"], "Current wait time is 25 minutes (your target was 30 minutes or less).");

    // Nothing fires twice
    let again = checker.run_once().await;
    assert!(matches!(again, CheckOutcome::Evaluated { ref fired, .. } if fired.is_empty()));
    assert_eq!(std::fs::read_to_string(&notifications).unwrap().lines().count(), 1);
}

#[tokio::test]
async fn test_checker_uses_cached_data_when_offline() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir.path().join("store.json"));
    WaitTimeCache::new(store.clone())
        .store(&[AttractionWaitTime::new("34", "Taron", 10, "opened")])
        .unwrap();

    let alerts = Arc::new(AlertStore::new(store.clone()));
    alerts.upsert(WaitTimeAlert::new("34", "Taron", 15)).unwrap();

    let checker = AlertChecker::new(
        repository(ScriptedSource::new(vec![None]), store),
        alerts.clone(),
        Arc::new(JsonlNotifier::new(dir.path().join("n.jsonl"))),
        Arc::new(Metrics::new()),
        Duration::from_secs(60),
    );

    match checker.run_once().await {
        CheckOutcome::Evaluated { fired, source } => {
            assert_eq!(source, DataSource::CacheFallback);
            assert_eq!(fired.len(), 1);
        }
        other => panic!("expected evaluation, got {:?}", other),
    }
    assert!(alerts.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_presentation_filter_and_descending_name() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir.path().join("store.json"));
    let items = vec![
        AttractionWaitTime::new("1", "Alpha", 10, "opened"),
        AttractionWaitTime::new("2", "Zeta", 0, "closed"),
    ];
    let state = PresentationState::new(repository(ScriptedSource::new(vec![Some(items)]), store.clone()), store);

    assert_eq!(state.refresh(false).await, RefreshOutcome::Updated(DataSource::Network));

    state.change_sort_order(SortType::Name, SortDirection::Descending);
    assert_eq!(names(&state.state().wait_times), vec!["Zeta", "Alpha"]);

    state.set_filter_only_open(true);
    assert_eq!(names(&state.state().wait_times), vec!["Alpha"]);
    assert_eq!(state.raw_items().len(), 2);
}

#[tokio::test]
async fn test_favorites_persist_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let items = vec![
        AttractionWaitTime::new("1", "Alpha", 10, "opened"),
        AttractionWaitTime::new("2", "Zeta", 40, "opened"),
    ];

    {
        let store = file_store(&path);
        let state = PresentationState::new(repository(ScriptedSource::new(vec![]), store.clone()), store);
        assert!(state.toggle_favorite("2"));
    }

    let store = file_store(&path);
    let state = PresentationState::new(repository(ScriptedSource::new(vec![Some(items)]), store.clone()), store);
    state.refresh(false).await;
    state.change_sort_order(SortType::WaitTime, SortDirection::Ascending);

    let view = state.state();
    assert!(view.preferences.is_favorite("2"));
    assert_eq!(names(&view.wait_times), vec!["Zeta", "Alpha"]);

    // Sort and filter are session-only
    assert_eq!(view.preferences.sort_type, SortType::WaitTime);
    let reopened = PresentationState::new(repository(ScriptedSource::new(vec![]), file_store(&path)), file_store(&path));
    assert_eq!(reopened.state().preferences.sort_type, SortType::Name);
}
