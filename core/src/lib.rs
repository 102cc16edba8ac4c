//! Root of the `summarizer-core` library.

// Library code never writes to the terminal directly; progress goes through
// `SessionEvent`s and diagnostics through `tracing`.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod client;
pub mod config;
pub mod controller;
pub mod error;
mod flags;
pub mod history;
pub mod protocol;
mod reassemble;
pub mod registry;
pub mod session;
pub mod sse;
pub mod transport;
mod util;

pub use client::SummarizerClient;
pub use config::Config;
pub use config::ConfigOverrides;
pub use config::ConfigToml;
pub use controller::FrameDisposition;
pub use controller::SessionState;
pub use controller::StreamController;
pub use error::Result;
pub use error::SummarizerErr;
pub use history::HistoryStore;
pub use history::HttpHistoryStore;
pub use history::Reconciliation;
pub use history::reconcile;
pub use history::reconcile_within;
pub use reassemble::append_fragment;
pub use registry::SessionGuard;
pub use registry::SessionRegistry;
pub use session::SessionOutcome;
pub use session::StreamTimeouts;
pub use session::Summarizer;
pub use session::consume_stream;
pub use sse::Frame;
pub use sse::FrameBuffer;
pub use sse::parse_frame;
pub use transport::ByteStream;
pub use transport::TransportReader;
