//! Drives one summary session from request to displayed outcome.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio::time::error::Elapsed;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::client::SummarizerClient;
use crate::config::Config;
use crate::controller::FrameDisposition;
use crate::controller::SessionState;
use crate::controller::StreamController;
use crate::error::Result;
use crate::error::SummarizerErr;
use crate::history::HistoryStore;
use crate::history::HttpHistoryStore;
use crate::history::reconcile_within;
use crate::protocol::SessionEvent;
use crate::protocol::SummarizeRequest;
use crate::protocol::SummarySource;
use crate::protocol::TerminalSignal;
use crate::registry::SessionGuard;
use crate::registry::SessionRegistry;
use crate::sse::FrameBuffer;
use crate::sse::parse_frame;
use crate::transport::TransportReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTimeouts {
    /// Upper bound for the whole stream.
    pub total: Duration,
    /// Longest wait for the next chunk.
    pub idle: Duration,
}

impl From<&Config> for StreamTimeouts {
    fn from(config: &Config) -> Self {
        Self {
            total: config.stream_timeout,
            idle: config.stream_idle_timeout,
        }
    }
}

impl StreamTimeouts {
    /// Instant at which a session starting now runs out of time.
    pub fn deadline_from_now(self) -> Instant {
        Instant::now() + self.total
    }
}

/// Final result of a session as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub state: SessionState,
    /// Empty unless the session completed.
    pub text: String,
    pub source: SummarySource,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub timed_out_after: Option<Duration>,
    /// How the stream ended; `None` if it never reached a terminal state.
    pub terminal: Option<TerminalSignal>,
}

impl SessionOutcome {
    fn from_controller(controller: &StreamController) -> Self {
        Self {
            state: controller.state(),
            text: controller.text().to_string(),
            source: SummarySource::Streamed,
            error: controller.error().map(str::to_string),
            warning: None,
            timed_out_after: controller.timed_out_after(),
            terminal: controller.terminal_signal(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == SessionState::Completing
    }

    /// Converts a failed outcome into the matching [`SummarizerErr`].
    pub fn into_result(self) -> Result<Self> {
        let message = self.error.clone().unwrap_or_default();
        match self.state {
            SessionState::Failed => Err(match self.timed_out_after {
                Some(after) => SummarizerErr::Timeout(after),
                None => SummarizerErr::Stream(message),
            }),
            SessionState::EndedUnterminated => Err(SummarizerErr::Unterminated(message)),
            _ => Ok(self),
        }
    }
}

enum Step {
    Superseded,
    Deadline,
    Read(std::result::Result<Option<Result<String>>, Elapsed>),
}

/// Feeds every chunk of `reader` through framing, parsing and `controller`
/// until the session reaches a terminal state or `deadline` passes.
///
/// Returns [`SummarizerErr::Superseded`] as soon as `guard` is no longer the
/// current session; no chunk read after that point is applied.
pub async fn consume_stream<S>(
    mut reader: TransportReader<S>,
    controller: &mut StreamController,
    guard: &SessionGuard,
    timeouts: StreamTimeouts,
    deadline: Instant,
    tx_event: &mpsc::Sender<SessionEvent>,
) -> Result<SessionState>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut frames = FrameBuffer::new();

    while !controller.state().is_terminal() {
        let step = tokio::select! {
            biased;
            _ = guard.superseded() => Step::Superseded,
            _ = tokio::time::sleep_until(deadline) => Step::Deadline,
            res = tokio::time::timeout(timeouts.idle, reader.next_chunk()) => Step::Read(res),
        };

        match step {
            Step::Superseded => {
                debug!(generation = guard.generation(), "session superseded");
                return Err(SummarizerErr::Superseded);
            }
            Step::Deadline => {
                warn!(total = ?timeouts.total, "stream exceeded its total deadline");
                controller.timed_out(timeouts.total);
            }
            Step::Read(Err(_)) => {
                warn!(idle = ?timeouts.idle, "no data received before idle timeout");
                controller.timed_out(timeouts.idle);
            }
            Step::Read(Ok(Some(Err(e)))) => {
                debug!(error = %e, "transport read failed");
                controller.record_transport_error(e.user_message());
            }
            Step::Read(Ok(Some(Ok(chunk)))) => {
                if !guard.is_current() {
                    return Err(SummarizerErr::Superseded);
                }
                trace!(len = chunk.len(), "chunk received");
                let ready = frames.append(&chunk);
                apply_frames(controller, ready, tx_event).await;
            }
            Step::Read(Ok(None)) => {
                if let Some(tail) = frames.finish() {
                    apply_frames(controller, vec![tail], tx_event).await;
                }
                controller.transport_ended();
            }
        }
    }
    frames.clear();

    let event = match controller.state() {
        SessionState::Completing => SessionEvent::Completed,
        _ => SessionEvent::Failed {
            message: controller.error().unwrap_or_default().to_string(),
        },
    };
    tx_event.send(event).await.ok();
    Ok(controller.state())
}

async fn apply_frames(
    controller: &mut StreamController,
    raw_frames: Vec<String>,
    tx_event: &mpsc::Sender<SessionEvent>,
) {
    for raw in raw_frames {
        let Some(frame) = parse_frame(&raw) else {
            debug!(frame = %raw, "skipping frame without event or data lines");
            continue;
        };
        match controller.handle_frame(&frame) {
            FrameDisposition::Appended => {
                let text = controller.text().to_string();
                tx_event.send(SessionEvent::TextUpdated { text }).await.ok();
            }
            FrameDisposition::Completed | FrameDisposition::Failed => return,
            FrameDisposition::Ignored => {}
        }
    }
}

/// Entry point that owns the client, history store and session registry.
pub struct Summarizer {
    config: Arc<Config>,
    client: SummarizerClient,
    history: Arc<dyn HistoryStore>,
    registry: SessionRegistry,
}

impl Summarizer {
    pub fn new(config: Config) -> Self {
        let history = Arc::new(HttpHistoryStore::new(&config));
        Self::with_history(config, history)
    }

    pub fn with_history(config: Config, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            client: SummarizerClient::new(&config),
            config: Arc::new(config),
            history,
            registry: SessionRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.history)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Runs one session to completion. Starting another session while this
    /// one is in flight makes this call return [`SummarizerErr::Superseded`].
    ///
    /// Stream, timeout and unterminated failures are reported through the
    /// returned outcome rather than as `Err`.
    pub async fn summarize(
        &self,
        request: &SummarizeRequest,
        tx_event: mpsc::Sender<SessionEvent>,
    ) -> Result<SessionOutcome> {
        let guard = self.registry.begin();
        let mut controller = StreamController::new();
        controller.begin_request();
        tx_event
            .send(SessionEvent::Started {
                generation: guard.generation(),
            })
            .await
            .ok();

        let timeouts = StreamTimeouts::from(self.config.as_ref());
        let deadline = timeouts.deadline_from_now();
        let open = tokio::time::timeout_at(deadline, self.client.open_stream(request, deadline));
        let opened = tokio::select! {
            biased;
            _ = guard.superseded() => return Err(SummarizerErr::Superseded),
            res = open => res,
        };
        let reader = match opened {
            Ok(Ok(reader)) => reader,
            Ok(Err(err)) => {
                warn!(error = %err, "failed to open summary stream");
                controller.transport_rejected(Some(&err.user_message()));
                return Ok(failed_outcome(&controller, &tx_event).await);
            }
            Err(_) => {
                warn!(total = ?timeouts.total, "stream did not open before the deadline");
                controller.timed_out(timeouts.total);
                return Ok(failed_outcome(&controller, &tx_event).await);
            }
        };
        controller.transport_opened();

        let state = consume_stream(
            reader,
            &mut controller,
            &guard,
            timeouts,
            deadline,
            &tx_event,
        )
        .await?;
        let mut outcome = SessionOutcome::from_controller(&controller);
        if state != SessionState::Completing {
            info!(?state, "session ended without a summary");
            return Ok(outcome);
        }

        let reconciled = tokio::select! {
            biased;
            _ = guard.superseded() => return Err(SummarizerErr::Superseded),
            r = reconcile_within(
                self.history.as_ref(),
                controller.text(),
                self.config.history_timeout,
            ) => r,
        };
        if let SummarySource::Stored(record) = &reconciled.source {
            tx_event
                .send(SessionEvent::Reconciled {
                    record: record.clone(),
                })
                .await
                .ok();
        }
        outcome.text = reconciled.text;
        outcome.source = reconciled.source;
        outcome.warning = reconciled.warning;
        Ok(outcome)
    }
}

async fn failed_outcome(
    controller: &StreamController,
    tx_event: &mpsc::Sender<SessionEvent>,
) -> SessionOutcome {
    let outcome = SessionOutcome::from_controller(controller);
    tx_event
        .send(SessionEvent::Failed {
            message: outcome.error.clone().unwrap_or_default(),
        })
        .await
        .ok();
    outcome
}
