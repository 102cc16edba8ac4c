//! Tracks which summarization session is current.
//!
//! Starting a session bumps a generation counter and cancels the previous
//! session's token. A session whose generation is no longer current must not
//! touch shared state again.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
struct RegistryState {
    generation: u64,
    cancel: Option<CancellationToken>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session, superseding whichever one was active.
    pub fn begin(&self) -> SessionGuard {
        let token = CancellationToken::new();
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        if let Some(previous) = state.cancel.replace(token.clone()) {
            debug!(generation = state.generation, "superseding active session");
            previous.cancel();
        }
        SessionGuard {
            generation: state.generation,
            registry: self.clone(),
            token,
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Cancels the active session without starting a new one.
    pub fn cancel_active(&self) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
    }
}

/// Handle held by one running session.
#[derive(Debug)]
pub struct SessionGuard {
    generation: u64,
    registry: SessionRegistry,
    token: CancellationToken,
}

impl SessionGuard {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.registry.current_generation() == self.generation
    }

    /// Resolves once a newer session has started or the session was cancelled.
    pub async fn superseded(&self) {
        self.token.cancelled().await;
    }
}
