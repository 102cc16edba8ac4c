use std::time::Duration;

use env_flags::env_flags;

env_flags! {
    pub SUMMARIZER_API_BASE: &str = "http://localhost:8080";

    /// Bearer token issued by the authentication service, if any.
    pub SUMMARIZER_API_TOKEN: Option<&str> = None;

    // Matches the backend's emitter timeout so the client never gives up
    // before the server does.
    pub SUMMARIZER_STREAM_TIMEOUT_MS: Duration = Duration::from_millis(900_000), |value| {
        value.parse().map(Duration::from_millis)
    };
    pub SUMMARIZER_STREAM_IDLE_TIMEOUT_MS: Duration = Duration::from_millis(300_000), |value| {
        value.parse().map(Duration::from_millis)
    };
    pub SUMMARIZER_HISTORY_TIMEOUT_MS: Duration = Duration::from_millis(10_000), |value| {
        value.parse().map(Duration::from_millis)
    };
    pub SUMMARIZER_REQUEST_MAX_RETRIES: u64 = 2;

    /// Fixture path for offline runs (see client.rs).
    pub SUMMARIZER_SSE_FIXTURE: Option<&str> = None;
}
