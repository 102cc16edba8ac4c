//! Session state machine.
//!
//! [`StreamController`] is fed one [`Frame`] at a time and is the only place
//! where the accumulated text and the session state change. It performs no
//! I/O; the async driver in [`crate::session`] owns the transport and feeds
//! it.

use std::time::Duration;

use tracing::debug;
use tracing::trace;

use crate::error::TIMEOUT_MESSAGE;
use crate::protocol::TerminalSignal;
use crate::reassemble::push_fragment;
use crate::sse::Frame;

/// Payload that marks successful completion, compared after trimming.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Event label the backend uses for in-band failures.
pub const ERROR_EVENT: &str = "error";

/// Leading text of the failure descriptions the backend produces. Payloads
/// starting with one of these are failures even when the `error` label is
/// missing.
pub const ERROR_PREFIXES: &[&str] = &[
    "Summarization failed.",
    "Failed to fetch content from URL.",
    "Cannot connect to Ollama.",
    "Request timed out.",
];

pub(crate) const UNTERMINATED_MESSAGE: &str =
    "The summary stream ended before it was complete. Please try again.";

pub(crate) const OPEN_FAILED_MESSAGE: &str = "Could not start the summary stream.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completing,
    Failed,
    EndedUnterminated,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completing | SessionState::Failed | SessionState::EndedUnterminated
        )
    }
}

/// What a single frame did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Appended,
    Ignored,
    Completed,
    Failed,
}

#[derive(Debug)]
pub struct StreamController {
    state: SessionState,
    text: String,
    error: Option<String>,
    timed_out_after: Option<Duration>,
}

impl Default for StreamController {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamController {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            text: String::new(),
            error: None,
            timed_out_after: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Deadline that failed the session, if it failed by timing out.
    pub fn timed_out_after(&self) -> Option<Duration> {
        self.timed_out_after
    }

    pub fn begin_request(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Requesting;
        }
    }

    pub fn transport_opened(&mut self) {
        if self.state == SessionState::Requesting {
            self.state = SessionState::Streaming;
        }
    }

    /// The backend refused to open a stream.
    pub fn transport_rejected(&mut self, message: Option<&str>) {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(OPEN_FAILED_MESSAGE);
        self.fail(message.to_string());
    }

    /// Remembers a transport failure. It becomes the session's error when the
    /// transport then ends without a completion sentinel.
    pub fn record_transport_error(&mut self, message: impl Into<String>) {
        if self.state == SessionState::Streaming && self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    pub fn handle_frame(&mut self, frame: &Frame) -> FrameDisposition {
        if self.state != SessionState::Streaming {
            trace!(state = ?self.state, "dropping frame outside of streaming state");
            return FrameDisposition::Ignored;
        }

        let trimmed = frame.data.trim();

        if frame.event_name == ERROR_EVENT && !trimmed.is_empty() {
            debug!("error event received");
            self.fail(trimmed.to_string());
            return FrameDisposition::Failed;
        }

        if frame.event_name.is_empty() && ERROR_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            debug!("unlabelled failure payload received");
            self.fail(trimmed.to_string());
            return FrameDisposition::Failed;
        }

        if trimmed == DONE_SENTINEL {
            debug!(len = self.text.len(), "completion sentinel received");
            self.state = SessionState::Completing;
            return FrameDisposition::Completed;
        }

        if frame.data.is_empty() {
            return FrameDisposition::Ignored;
        }

        push_fragment(&mut self.text, &frame.data);
        FrameDisposition::Appended
    }

    /// The transport produced no more chunks.
    pub fn transport_ended(&mut self) -> SessionState {
        if self.state == SessionState::Streaming {
            debug!(
                discarded = self.text.len(),
                "transport closed before completion sentinel"
            );
            self.state = SessionState::EndedUnterminated;
            self.text.clear();
            if self.error.is_none() {
                self.error = Some(UNTERMINATED_MESSAGE.to_string());
            }
        }
        self.state
    }

    /// The session ran past one of its deadlines.
    pub fn timed_out(&mut self, after: Duration) {
        if !self.state.is_terminal() {
            self.fail(TIMEOUT_MESSAGE.to_string());
            self.timed_out_after = Some(after);
        }
    }

    pub fn terminal_signal(&self) -> Option<TerminalSignal> {
        match self.state {
            SessionState::Completing => Some(TerminalSignal::Done),
            SessionState::Failed => Some(TerminalSignal::Error(
                self.error.clone().unwrap_or_default(),
            )),
            SessionState::EndedUnterminated => Some(TerminalSignal::Unterminated),
            _ => None,
        }
    }

    fn fail(&mut self, message: String) {
        self.state = SessionState::Failed;
        self.text.clear();
        self.error = Some(message);
    }
}
