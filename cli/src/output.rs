use std::io::Write;

use crossterm::cursor::MoveToColumn;
use crossterm::cursor::MoveUp;
use crossterm::queue;
use crossterm::terminal;
use crossterm::terminal::Clear;
use crossterm::terminal::ClearType;
use owo_colors::OwoColorize;
use owo_colors::Style;
use summarizer_core::SessionOutcome;
use summarizer_core::protocol::SummaryRecord;
use summarizer_core::protocol::SummarySource;

/// Terminal output. Summary text goes to stdout; everything else to stderr.
#[derive(Debug, Clone)]
pub(crate) struct Printer {
    stdout_with_ansi: bool,
    stderr_with_ansi: bool,
}

impl Printer {
    pub(crate) fn new(stdout_with_ansi: bool, stderr_with_ansi: bool) -> Self {
        Self {
            stdout_with_ansi,
            stderr_with_ansi,
        }
    }

    /// Prints whatever `current` adds on top of what was already shown and
    /// returns the text written.
    pub(crate) fn stream_update(&self, previous: &str, current: &str) -> String {
        let written = stream_suffix(previous, current);
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{written}");
        let _ = stdout.flush();
        written
    }

    pub(crate) fn end_stream(&self) {
        println!();
    }

    /// Clears `printed` from the terminal. Only valid while the cursor still
    /// sits at the end of it.
    pub(crate) fn erase_stream(&self, printed: &str) {
        let width = terminal::size().map(|(cols, _)| cols).unwrap_or(80);
        let rows = rows_used(printed, width);
        let mut stdout = std::io::stdout().lock();
        let _ = queue!(stdout, MoveToColumn(0));
        if rows > 1 {
            let _ = queue!(stdout, MoveUp(rows - 1));
        }
        let _ = queue!(stdout, Clear(ClearType::FromCursorDown));
        let _ = stdout.flush();
    }

    /// Prints the result of a successful session. `shown` is the live text
    /// already on stdout, empty when nothing was streamed there.
    pub(crate) fn final_summary(&self, outcome: &SessionOutcome, shown: &str) {
        if shown.is_empty() {
            println!("{}", outcome.text.trim_end());
        } else if outcome.text.trim_end() != shown.trim_end() {
            self.note("Saved summary differs from the live stream:");
            println!("{}", outcome.text.trim_end());
        }
        if let SummarySource::Stored(record) = &outcome.source {
            eprintln!("{}", self.paint_stderr(&describe(record), dimmed()));
        }
    }

    pub(crate) fn history_entry(&self, record: &SummaryRecord) {
        let heading = format!(
            "#{} {}",
            record.id,
            record
                .article_title
                .as_deref()
                .or(record.source_url.as_deref())
                .unwrap_or("(pasted text)")
        );
        println!("{}", self.paint_stdout(&heading, Style::new().bold()));
        let body = record.preview.as_deref().unwrap_or(&record.summary);
        println!("    {}", body.trim());
        println!("    {}", self.paint_stdout(&describe(record), dimmed()));
    }

    pub(crate) fn error(&self, message: &str) {
        eprintln!(
            "{} {message}",
            self.paint_stderr("error:", Style::new().red().bold())
        );
    }

    pub(crate) fn warning(&self, message: &str) {
        eprintln!(
            "{} {message}",
            self.paint_stderr("warning:", Style::new().yellow().bold())
        );
    }

    pub(crate) fn note(&self, message: &str) {
        eprintln!("{}", self.paint_stderr(message, dimmed()));
    }

    fn paint_stdout(&self, text: &str, style: Style) -> String {
        paint(text, style, self.stdout_with_ansi)
    }

    fn paint_stderr(&self, text: &str, style: Style) -> String {
        paint(text, style, self.stderr_with_ansi)
    }
}

fn stream_suffix(previous: &str, current: &str) -> String {
    match current.strip_prefix(previous) {
        Some(suffix) => suffix.to_string(),
        None => format!("\n{current}"),
    }
}

/// Terminal rows taken by `text` on a screen `width` columns wide, counting
/// the row the cursor ends on.
fn rows_used(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .split('\n')
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn dimmed() -> Style {
    Style::new().dimmed()
}

fn paint(text: &str, style: Style, with_ansi: bool) -> String {
    if with_ansi {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

/// One-line metadata summary of a stored record.
fn describe(record: &SummaryRecord) -> String {
    let mut parts = vec![format!("id {}", record.id)];
    if let Some(length) = &record.target_length {
        parts.push(length.clone());
    }
    if let Some(model) = &record.model {
        parts.push(model.clone());
    }
    if let Some(ms) = record.latency_ms {
        parts.push(format!("{:.1}s", ms as f64 / 1000.0));
    }
    if let Some(created_at) = record.created_at {
        parts.push(created_at.format("%Y-%m-%d %H:%M").to_string());
    }
    parts.join(" · ")
}
