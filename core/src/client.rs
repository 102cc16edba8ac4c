use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use futures::TryStreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::config::Config;
use crate::controller::OPEN_FAILED_MESSAGE;
use crate::error::Result;
use crate::error::SummarizerErr;
use crate::flags::SUMMARIZER_SSE_FIXTURE;
use crate::protocol::SummarizeRequest;
use crate::transport::ByteStream;
use crate::transport::TransportReader;
use crate::util::backoff;
use crate::util::truncate_for_log;

const STREAM_PATH: &str = "/api/v1/summarize/stream";

/// Error body the backend returns for rejected requests.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

pub(crate) fn create_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("summarizer/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Extracts the human-readable message from an error response body.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Opens summary streams against the backend.
#[derive(Debug, Clone)]
pub struct SummarizerClient {
    client: reqwest::Client,
    api_base: String,
    api_token: Option<String>,
    max_retries: u64,
}

impl SummarizerClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: create_client(),
            api_base: config.api_base.clone(),
            api_token: config.api_token.clone(),
            max_retries: config.request_max_retries,
        }
    }

    /// Submits `request` and returns a reader over the response body.
    ///
    /// 429 and 5xx responses are retried with backoff (honoring
    /// `Retry-After`); any other non-success status fails immediately with
    /// the message from the response body when one is present. No wait
    /// between attempts extends past `deadline`; callers still bound the
    /// whole call with it.
    pub async fn open_stream(
        &self,
        request: &SummarizeRequest,
        deadline: Instant,
    ) -> Result<TransportReader<ByteStream>> {
        if let Some(path) = *SUMMARIZER_SSE_FIXTURE {
            // short circuit for offline runs
            warn!(path, "Streaming from fixture");
            return stream_from_fixture(path);
        }

        let url = format!("{}{STREAM_PATH}", self.api_base);
        debug!(%url, "POST (summarize stream)");
        trace!("request payload: {}", serde_json::to_string(request)?);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut req_builder = self.client.post(&url);
            if let Some(token) = &self.api_token {
                req_builder = req_builder.bearer_auth(token);
            }
            let res = req_builder
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .json(request)
                .send()
                .await;

            match res {
                Ok(resp) if resp.status().is_success() => {
                    debug!(status = %resp.status(), attempt, "summary stream opened");
                    let stream = resp
                        .bytes_stream()
                        .map_err(SummarizerErr::Reqwest)
                        .boxed();
                    return Ok(TransportReader::new(stream));
                }
                Ok(res) => {
                    let status = res.status();
                    let retry_after_secs = res
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());
                    let body = res.text().await.unwrap_or_default();
                    debug!(
                        %status,
                        attempt,
                        body = truncate_for_log(&body, 600),
                        "summary stream rejected"
                    );

                    if !(status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()) {
                        let message = error_message_from_body(&body)
                            .unwrap_or_else(|| format!("{OPEN_FAILED_MESSAGE} (HTTP {status})"));
                        return Err(SummarizerErr::UnexpectedStatus(status, message));
                    }

                    if attempt > self.max_retries {
                        return Err(match error_message_from_body(&body) {
                            Some(message) => SummarizerErr::UnexpectedStatus(status, message),
                            None => SummarizerErr::RetryLimit(status),
                        });
                    }

                    let delay = retry_after_secs
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| backoff(attempt));
                    tokio::time::sleep(capped(delay, deadline)).await;
                }
                Err(e) => {
                    if attempt > self.max_retries {
                        return Err(e.into());
                    }
                    let delay = capped(backoff(attempt), deadline);
                    debug!(error = %e, ?delay, "network error opening stream, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn capped(delay: Duration, deadline: Instant) -> Duration {
    delay.min(deadline.saturating_duration_since(Instant::now()))
}

/// Streams a recorded response body from disk, byte for byte.
pub(crate) fn stream_from_fixture(path: impl AsRef<Path>) -> Result<TransportReader<ByteStream>> {
    let content = std::fs::read(path.as_ref())?;
    let stream = ReaderStream::new(std::io::Cursor::new(content))
        .map_err(SummarizerErr::Io)
        .boxed();
    Ok(TransportReader::new(stream))
}
