//! Types exchanged with the summarization backend and exposed to callers.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;

/// Requested summary length. Unknown or blank values fall back to
/// [`TargetLength::Medium`], mirroring the backend's own normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl TargetLength {
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "short" => TargetLength::Short,
            "long" => TargetLength::Long,
            _ => TargetLength::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetLength::Short => "short",
            TargetLength::Medium => "medium",
            TargetLength::Long => "long",
        }
    }
}

/// Body of a streaming summarization request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub target_length: TargetLength,
}

impl SummarizeRequest {
    pub fn from_text(content: impl Into<String>, target_length: TargetLength) -> Self {
        Self {
            content: Some(content.into()),
            url: None,
            target_length,
        }
    }

    pub fn from_url(url: impl Into<String>, target_length: TargetLength) -> Self {
        Self {
            content: None,
            url: Some(url.into()),
            target_length,
        }
    }
}

/// A persisted summary as returned by the history service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub article_title: Option<String>,
    #[serde(default)]
    pub target_length: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<i64>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// Metadata describing where the displayed summary came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarySource {
    /// Text reconstructed from the live stream only.
    Streamed,
    /// Text replaced by the authoritative stored record.
    Stored(SummaryRecord),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalSignal {
    Done,
    Error(String),
    Unterminated,
}

/// Live progress of a session, delivered in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { generation: u64 },
    /// The accumulated text changed. Carries the whole text so far, not the
    /// fragment that was just applied.
    TextUpdated { text: String },
    Completed,
    Failed { message: String },
    Reconciled { record: SummaryRecord },
}
