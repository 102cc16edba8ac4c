use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::controller::OPEN_FAILED_MESSAGE;

pub type Result<T> = std::result::Result<T, SummarizerErr>;

#[derive(Error, Debug)]
pub enum SummarizerErr {
    /// The backend rejected the request before a stream was opened. The
    /// second field is the human-readable message extracted from the body.
    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(StatusCode, String),

    /// Retryable statuses kept coming back until the retry budget ran out.
    #[error("exceeded retry limit, last status: {0}")]
    RetryLimit(StatusCode),

    /// The backend reported a failure in-band, either through an `error`
    /// event or a bare payload carrying a known failure prefix.
    #[error("{0}")]
    Stream(String),

    /// The connection closed before the completion sentinel arrived.
    #[error("{0}")]
    Unterminated(String),

    #[error("stream timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// A newer session was started while this one was still running.
    #[error("session superseded by a newer request")]
    Superseded,

    #[error("history request failed with status {0}")]
    History(StatusCode),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SummarizerErr {
    /// Message suitable for showing to the person who asked for the summary.
    pub fn user_message(&self) -> String {
        match self {
            SummarizerErr::UnexpectedStatus(_, message) => message.clone(),
            SummarizerErr::RetryLimit(status) => {
                format!("{OPEN_FAILED_MESSAGE} The service is busy (HTTP {status}).")
            }
            SummarizerErr::Reqwest(_) => {
                format!("{OPEN_FAILED_MESSAGE} Check that the service is reachable.")
            }
            SummarizerErr::Timeout(_) => TIMEOUT_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub(crate) const TIMEOUT_MESSAGE: &str =
    "Request timed out. The summary took too long to generate. Try a shorter article or summary length.";
