const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// One parsed protocol unit. An empty `event_name` means the default data
/// event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub event_name: String,
    pub data: String,
}

impl Frame {
    pub fn new(event_name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            data: data.into(),
        }
    }
}

/// Parses the text of one frame.
///
/// The first `event:` line wins and its label is trimmed. Every `data:` line
/// contributes its remainder verbatim; generated tokens frequently begin with
/// the space that separates them from the previous word, so nothing after
/// the prefix is stripped. Multiple data lines are joined with `\n`.
///
/// Returns `None` when no line is recognized (comments, keep-alives, `id:` or
/// `retry:` only frames).
pub fn parse_frame(text: &str) -> Option<Frame> {
    let mut event_name: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if let Some(label) = line.strip_prefix(EVENT_PREFIX) {
            if event_name.is_none() {
                event_name = Some(label.trim());
            }
        } else if let Some(data) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(data);
        }
    }

    if event_name.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(Frame {
        event_name: event_name.unwrap_or_default().to_string(),
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn label_with_and_without_space() {
        assert_eq!(
            parse_frame("event:chunk\ndata:Hi"),
            Some(Frame::new("chunk", "Hi"))
        );
        assert_eq!(
            parse_frame("event: error \ndata:boom"),
            Some(Frame::new("error", "boom"))
        );
    }

    #[test]
    fn data_keeps_leading_whitespace() {
        assert_eq!(parse_frame("data: world"), Some(Frame::new("", " world")));
    }

    #[test]
    fn multiple_data_lines_join_with_newline() {
        assert_eq!(
            parse_frame("data:first line\ndata:\ndata:third"),
            Some(Frame::new("", "first line\n\nthird"))
        );
    }

    #[test]
    fn first_event_label_wins_regardless_of_order() {
        assert_eq!(
            parse_frame("data:x\nevent:done\nevent:chunk"),
            Some(Frame::new("done", "x"))
        );
    }

    #[test]
    fn prefixes_are_case_sensitive() {
        assert_eq!(parse_frame("Data:x\nEVENT:error"), None);
    }

    #[test]
    fn unrecognized_frames_are_dropped() {
        assert_eq!(parse_frame(": keep-alive"), None);
        assert_eq!(parse_frame("id:7\nretry:1000"), None);
    }

    #[test]
    fn label_only_frame_has_empty_data() {
        assert_eq!(parse_frame("event:ping"), Some(Frame::new("ping", "")));
    }
}
