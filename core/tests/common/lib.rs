#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

use summarizer_core::ByteStream;
use summarizer_core::HistoryStore;
use summarizer_core::SummarizerErr;
use summarizer_core::TransportReader;
use summarizer_core::config::Config;
use summarizer_core::config::ConfigOverrides;
use summarizer_core::config::ConfigToml;
use summarizer_core::protocol::SessionEvent;
use summarizer_core::protocol::SummaryRecord;

/// Config pointing at `server` with retries disabled.
pub fn config_for_server(server: &MockServer, summarizer_home: &TempDir) -> Config {
    Config::load_from_base_config_with_overrides(
        ConfigToml {
            request_max_retries: Some(0),
            ..Default::default()
        },
        ConfigOverrides {
            api_base: Some(server.uri()),
            ..Default::default()
        },
        summarizer_home.path().to_path_buf(),
    )
    .expect("test config should load")
}

/// One frame in the backend's wire shape (no space after the colon).
pub fn sse_frame(event: &str, data: &str) -> String {
    format!("event:{event}\ndata:{data}\n\n")
}

/// Builds a stream body from a JSON fixture of `{"event": .., "data": ..}`
/// objects.
pub fn load_sse_fixture(path: impl AsRef<std::path::Path>) -> String {
    let events: Vec<serde_json::Value> =
        serde_json::from_reader(std::fs::File::open(path).expect("read fixture"))
            .expect("parse JSON fixture");
    events
        .into_iter()
        .map(|e| {
            let event = e.get("event").and_then(|v| v.as_str()).unwrap_or_default();
            let data = e
                .get("data")
                .and_then(|v| v.as_str())
                .expect("fixture event missing data");
            sse_frame(event, data)
        })
        .collect()
}

/// Transport that yields exactly the given byte chunks, then closes.
pub fn chunked_reader(chunks: Vec<Vec<u8>>) -> TransportReader<ByteStream> {
    let stream = futures::stream::iter(
        chunks
            .into_iter()
            .map(|c| Ok::<_, SummarizerErr>(Bytes::from(c))),
    )
    .boxed();
    TransportReader::new(stream)
}

/// Transport that yields the given chunks and then never produces another.
pub fn stalled_reader(chunks: Vec<Vec<u8>>) -> TransportReader<ByteStream> {
    let stream = futures::stream::iter(
        chunks
            .into_iter()
            .map(|c| Ok::<_, SummarizerErr>(Bytes::from(c))),
    )
    .chain(futures::stream::pending())
    .boxed();
    TransportReader::new(stream)
}

pub async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/v1/summarize/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

pub async fn mount_history(server: &MockServer, records: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records))
        .mount(server)
        .await;
}

/// Collects every event until the sender side is dropped.
pub async fn drain_events(mut rx: mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    events
}

/// [`HistoryStore`] kept in memory, newest record first.
#[derive(Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<SummaryRecord>>,
}

impl InMemoryHistory {
    pub fn with_records(records: Vec<SummaryRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn list(
        &self,
        limit: usize,
        search: Option<&str>,
    ) -> summarizer_core::Result<Vec<SummaryRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| search.is_none_or(|q| r.summary.contains(q)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> summarizer_core::Result<bool> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}

/// [`HistoryStore`] whose requests never complete.
pub struct UnresponsiveHistory;

#[async_trait]
impl HistoryStore for UnresponsiveHistory {
    async fn list(
        &self,
        _limit: usize,
        _search: Option<&str>,
    ) -> summarizer_core::Result<Vec<SummaryRecord>> {
        futures::future::pending().await
    }

    async fn delete(&self, _id: i64) -> summarizer_core::Result<bool> {
        futures::future::pending().await
    }
}
