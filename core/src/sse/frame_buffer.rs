/// Accumulates decoded text and cuts it into blank-line delimited frames.
///
/// Line endings are normalized to `\n` before splitting. A `\r` that ends one
/// chunk is held back until the next chunk arrives so that a `\r\n` pair split
/// across two network reads is still recognized as a single line break.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: String,
    pending_cr: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame completed by it. The trailing
    /// incomplete fragment stays buffered.
    pub fn append(&mut self, chunk: &str) -> Vec<String> {
        let mut text = String::with_capacity(chunk.len() + 1);
        if std::mem::take(&mut self.pending_cr) {
            text.push('\r');
        }
        text.push_str(chunk);
        if text.ends_with('\r') {
            text.pop();
            self.pending_cr = true;
        }

        self.buf.push_str(&text.replace("\r\n", "\n"));
        self.drain_frames()
    }

    /// Flushes the buffer at end of input. A non-empty trailing fragment is
    /// returned as a final frame even though no blank line terminated it.
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.pending_cr) {
            self.buf.push('\n');
        }
        let rest = std::mem::take(&mut self.buf);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Text received but not yet part of a complete frame.
    pub fn remainder(&self) -> &str {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.pending_cr = false;
    }

    fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.find("\n\n") {
            let frame = self.buf[..pos].to_string();
            self.buf.drain(..pos + 2);
            if !frame.trim().is_empty() {
                frames.push(frame);
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_on_blank_line_and_keeps_remainder() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.append("data:one\n\ndata:two\n\ndata:thr");
        assert_eq!(frames, vec!["data:one", "data:two"]);
        assert_eq!(buffer.remainder(), "data:thr");

        let frames = buffer.append("ee\n\n");
        assert_eq!(frames, vec!["data:three"]);
        assert_eq!(buffer.remainder(), "");
    }

    #[test]
    fn delimiter_split_across_chunks() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.append("event:chunk\ndata:hi\n").is_empty());
        assert_eq!(buffer.append("\n"), vec!["event:chunk\ndata:hi"]);
    }

    #[test]
    fn crlf_normalized_even_when_pair_is_split() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.append("data:a\r").is_empty());
        assert!(buffer.append("\n\r").is_empty());
        assert_eq!(buffer.append("\ndata:b\r\n\r\n"), vec!["data:a", "data:b"]);
    }

    #[test]
    fn finish_returns_unterminated_tail() {
        let mut buffer = FrameBuffer::new();
        assert_eq!(
            buffer.append("data:x\n\nevent:error\ndata:boom"),
            vec!["data:x"]
        );
        assert_eq!(buffer.finish().as_deref(), Some("event:error\ndata:boom"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn finish_ignores_whitespace_tail() {
        let mut buffer = FrameBuffer::new();
        buffer.append("data:x\n\n\n");
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn extra_blank_lines_do_not_produce_empty_frames() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.append("\n\n\n\ndata:x\n\n\n\n");
        assert_eq!(frames, vec!["data:x"]);
    }
}
