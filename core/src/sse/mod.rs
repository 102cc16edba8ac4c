//! Incremental decoding of the summary stream's wire format.
//!
//! [`FrameBuffer`] turns arbitrarily chunked text into blank-line delimited
//! frames and [`parse_frame`] turns each frame into a [`Frame`].

mod event_parser;
mod frame_buffer;

pub use event_parser::Frame;
pub use event_parser::parse_frame;
pub use frame_buffer::FrameBuffer;
