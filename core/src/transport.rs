use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::Result;

/// Byte stream backing an open summary stream.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Pulls decoded text chunks from an open connection.
///
/// Network reads may end in the middle of a multi-byte UTF-8 sequence; the
/// incomplete tail is held back and prepended to the next read. Invalid
/// sequences are replaced with U+FFFD rather than failing the session.
pub struct TransportReader<S> {
    inner: S,
    pending: Vec<u8>,
    finished: bool,
}

impl<S> TransportReader<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            finished: false,
        }
    }

    /// Next chunk of decoded text, or `None` once the connection is closed.
    /// After an `Err` the reader is finished and yields `None`.
    pub async fn next_chunk(&mut self) -> Option<Result<String>> {
        loop {
            if self.finished {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(bytes)) => {
                    self.pending.extend_from_slice(&bytes);
                    let text = self.decode_ready();
                    if !text.is_empty() {
                        return Some(Ok(text));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    if self.pending.is_empty() {
                        return None;
                    }
                    let rest = std::mem::take(&mut self.pending);
                    return Some(Ok(String::from_utf8_lossy(&rest).into_owned()));
                }
            }
        }
    }

    fn decode_ready(&mut self) -> String {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}
