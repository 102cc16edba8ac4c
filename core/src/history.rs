//! Access to the persistence service and post-stream reconciliation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::create_client;
use crate::config::Config;
use crate::error::Result;
use crate::error::SummarizerErr;
use crate::protocol::SummaryRecord;
use crate::protocol::SummarySource;

const HISTORY_PATH: &str = "/api/v1/history";

/// Persistence collaborator holding completed summaries, newest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn list(&self, limit: usize, search: Option<&str>) -> Result<Vec<SummaryRecord>>;

    /// Returns `false` when no record with `id` exists.
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn fetch_latest(&self) -> Result<Option<SummaryRecord>> {
        Ok(self.list(1, None).await?.into_iter().next())
    }
}

/// [`HistoryStore`] backed by the backend's REST history endpoints.
#[derive(Debug, Clone)]
pub struct HttpHistoryStore {
    client: reqwest::Client,
    api_base: String,
    api_token: Option<String>,
}

impl HttpHistoryStore {
    pub fn new(config: &Config) -> Self {
        Self {
            client: create_client(),
            api_base: config.api_base.clone(),
            api_token: config.api_token.clone(),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn list(&self, limit: usize, search: Option<&str>) -> Result<Vec<SummaryRecord>> {
        let url = format!("{}{HISTORY_PATH}", self.api_base);
        let mut query = vec![("limit", limit.to_string())];
        if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            query.push(("search", search.to_string()));
        }
        debug!(%url, limit, "GET (history)");

        let resp = self
            .authorize(self.client.get(&url))
            .query(&query)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SummarizerErr::History(resp.status()));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let url = format!("{}{HISTORY_PATH}/{id}", self.api_base);
        debug!(%url, "DELETE (history)");

        let resp = self.authorize(self.client.delete(&url)).send().await?;
        match resp.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SummarizerErr::History(status)),
        }
    }
}

/// Text and provenance to display once a stream has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub text: String,
    pub source: SummarySource,
    /// Set when the stored record could not be loaded.
    pub warning: Option<String>,
}

/// Replaces `streamed_text` with the most recently stored record.
///
/// Never fails: when the store is unreachable the streamed text is kept and
/// the problem is reported through [`Reconciliation::warning`].
pub async fn reconcile(store: &dyn HistoryStore, streamed_text: &str) -> Reconciliation {
    reconciliation_from(store.fetch_latest().await, streamed_text)
}

/// [`reconcile`], giving up on the store after `limit`.
pub async fn reconcile_within(
    store: &dyn HistoryStore,
    streamed_text: &str,
    limit: Duration,
) -> Reconciliation {
    match tokio::time::timeout(limit, store.fetch_latest()).await {
        Ok(latest) => reconciliation_from(latest, streamed_text),
        Err(_) => {
            warn!(?limit, "stored summary did not arrive in time; keeping streamed text");
            kept(
                streamed_text,
                Some(format!(
                    "The summary finished but the saved copy could not be loaded: \
                     no response after {}s",
                    limit.as_secs_f32()
                )),
            )
        }
    }
}

fn reconciliation_from(
    latest: Result<Option<SummaryRecord>>,
    streamed_text: &str,
) -> Reconciliation {
    match latest {
        Ok(Some(record)) => {
            info!(id = record.id, "replaced streamed text with stored summary");
            Reconciliation {
                text: record.summary.clone(),
                source: SummarySource::Stored(record),
                warning: None,
            }
        }
        Ok(None) => {
            warn!("history is empty after a completed stream; keeping streamed text");
            kept(streamed_text, None)
        }
        Err(err) => {
            warn!(error = %err, "failed to load stored summary; keeping streamed text");
            kept(
                streamed_text,
                Some(format!(
                    "The summary finished but the saved copy could not be loaded: {err}"
                )),
            )
        }
    }
}

fn kept(streamed_text: &str, warning: Option<String>) -> Reconciliation {
    Reconciliation {
        text: streamed_text.to_string(),
        source: SummarySource::Streamed,
        warning,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::config::ConfigOverrides;
    use crate::config::ConfigToml;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;
    use tracing_test::traced_test;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::matchers::query_param;

    fn store_for(server: &MockServer, home: &TempDir) -> HttpHistoryStore {
        let config = Config::load_from_base_config_with_overrides(
            ConfigToml::default(),
            ConfigOverrides {
                api_base: Some(server.uri()),
                ..Default::default()
            },
            home.path().to_path_buf(),
        )
        .unwrap();
        HttpHistoryStore::new(&config)
    }

    #[tokio::test]
    async fn fetch_latest_takes_first_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 9, "summary": "Stored text.", "model": "ollama"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        let latest = store_for(&server, &home).fetch_latest().await.unwrap();
        let latest = latest.expect("one record");
        assert_eq!(latest.id, 9);
        assert_eq!(latest.summary, "Stored text.");
        assert_eq!(latest.model.as_deref(), Some("ollama"));
    }

    #[tokio::test]
    async fn list_forwards_search_term() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .and(query_param("limit", "5"))
            .and(query_param("search", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        let records = store_for(&server, &home)
            .list(5, Some("rust"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn delete_distinguishes_missing_records() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/history/3"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/history/4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        let store = store_for(&server, &home);
        assert!(store.delete(3).await.unwrap());
        assert!(!store.delete(4).await.unwrap());
    }

    #[traced_test]
    #[tokio::test]
    async fn reconcile_keeps_streamed_text_when_store_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        let store = store_for(&server, &home);
        let outcome = reconcile(&store, "Streamed text.").await;
        assert_eq!(outcome.text, "Streamed text.");
        assert_eq!(outcome.source, SummarySource::Streamed);
        assert!(outcome.warning.is_some());
        assert!(logs_contain("keeping streamed text"));
    }

    #[tokio::test]
    async fn reconcile_keeps_streamed_text_when_history_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        let store = store_for(&server, &home);
        let outcome = reconcile(&store, "Streamed text.").await;
        assert_eq!(
            outcome,
            Reconciliation {
                text: "Streamed text.".to_string(),
                source: SummarySource::Streamed,
                warning: None,
            }
        );
    }

    struct UnresponsiveStore;

    #[async_trait]
    impl HistoryStore for UnresponsiveStore {
        async fn list(&self, _limit: usize, _search: Option<&str>) -> Result<Vec<SummaryRecord>> {
            futures::future::pending().await
        }

        async fn delete(&self, _id: i64) -> Result<bool> {
            futures::future::pending().await
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn unresponsive_store_is_abandoned_after_limit() {
        let started = std::time::Instant::now();
        let outcome = reconcile_within(
            &UnresponsiveStore,
            "Streamed text.",
            Duration::from_millis(50),
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.text, "Streamed text.");
        assert_eq!(outcome.source, SummarySource::Streamed);
        let warning = outcome.warning.expect("timeout is reported");
        assert!(warning.contains("no response after 0.05s"), "{warning}");
        assert!(logs_contain("did not arrive in time"));
    }

    #[tokio::test]
    async fn reconcile_within_returns_stored_record_in_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 2, "summary": "Stored text."}
            ])))
            .mount(&server)
            .await;

        let home = TempDir::new().unwrap();
        let store = store_for(&server, &home);
        let outcome = reconcile_within(&store, "Streamed.", Duration::from_secs(5)).await;
        assert_eq!(outcome.text, "Stored text.");
        assert!(matches!(outcome.source, SummarySource::Stored(ref r) if r.id == 2));
        assert_eq!(outcome.warning, None);
    }
}
