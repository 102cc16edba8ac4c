mod cli;
mod output;

use std::io::IsTerminal;
use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

pub use cli::Cli;
pub use cli::Color;
pub use cli::Command;
use cli::HistoryAction;
use cli::HistoryArgs;
use cli::SummarizeArgs;
use summarizer_core::HistoryStore;
use summarizer_core::Summarizer;
use summarizer_core::SummarizerErr;
use summarizer_core::config::Config;
use summarizer_core::config::ConfigOverrides;
use summarizer_core::protocol::SessionEvent;
use summarizer_core::protocol::SummarizeRequest;
use summarizer_core::protocol::TargetLength;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::output::Printer;

pub async fn run_main(cli: Cli) -> anyhow::Result<ExitCode> {
    let Cli {
        api_base,
        token,
        timeout_secs,
        color,
        command,
    } = cli;

    let (stdout_with_ansi, stderr_with_ansi) = match color {
        Color::Always => (true, true),
        Color::Never => (false, false),
        Color::Auto => (
            std::io::stdout().is_terminal(),
            std::io::stderr().is_terminal(),
        ),
    };

    // stdout carries only the summary text.
    let default_level = "error";
    let _ = tracing_subscriber::fmt()
        // Fallback to the `default_level` log filter if the environment
        // variable is not set _or_ contains an invalid value
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(stderr_with_ansi)
        .with_writer(std::io::stderr)
        .try_init();

    let target_length = match &command {
        Command::Summarize(args) => args.length.as_deref().map(TargetLength::parse_lenient),
        Command::History(_) => None,
    };
    let overrides = ConfigOverrides {
        api_base,
        api_token: token,
        target_length,
        stream_timeout: timeout_secs.map(Duration::from_secs),
    };
    let config = Config::load_with_overrides(overrides)?;
    debug!(api_base = %config.api_base, "configuration loaded");

    let printer = Printer::new(stdout_with_ansi, stderr_with_ansi);
    match command {
        Command::Summarize(args) => {
            let live = LiveOutput::for_stdout(std::io::stdout().is_terminal());
            run_summarize(config, args, printer, live).await
        }
        Command::History(args) => run_history(config, args, printer).await,
    }
}

/// Where in-progress text goes while a session streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveOutput {
    /// Written to the terminal as it arrives and erased if the session fails.
    Terminal,
    /// Not shown; stdout only receives the final summary.
    Hidden,
}

impl LiveOutput {
    fn for_stdout(is_terminal: bool) -> Self {
        if is_terminal {
            LiveOutput::Terminal
        } else {
            LiveOutput::Hidden
        }
    }
}

/// What to do with live text already on screen once the session is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveCleanup {
    Nothing,
    EndLine,
    Erase,
}

fn live_cleanup(printed: &str, succeeded: bool) -> LiveCleanup {
    match (printed.is_empty(), succeeded) {
        (true, _) => LiveCleanup::Nothing,
        (false, true) => LiveCleanup::EndLine,
        (false, false) => LiveCleanup::Erase,
    }
}

async fn run_summarize(
    config: Config,
    args: SummarizeArgs,
    printer: Printer,
    live: LiveOutput,
) -> anyhow::Result<ExitCode> {
    let request = match build_request(&args, config.target_length) {
        Ok(request) => request,
        Err(message) => {
            printer.error(&message);
            return Ok(ExitCode::FAILURE);
        }
    };

    let summarizer = Arc::new(Summarizer::new(config));
    {
        let summarizer = Arc::clone(&summarizer);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received; cancelling session");
                summarizer.registry().cancel_active();
            }
        });
    }

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(64);
    let live_task = {
        let printer = printer.clone();
        tokio::spawn(async move {
            let mut shown = String::new();
            let mut printed = String::new();
            while let Some(event) = rx.recv().await {
                debug!("Received event: {event:?}");
                match event {
                    SessionEvent::TextUpdated { text } if live == LiveOutput::Terminal => {
                        printed.push_str(&printer.stream_update(&shown, &text));
                        shown = text;
                    }
                    _ => {}
                }
            }
            (shown, printed)
        })
    };

    let result = summarizer.summarize(&request, tx).await;
    let (shown, printed) = live_task.await.unwrap_or_default();
    let succeeded = matches!(&result, Ok(outcome) if outcome.is_success());
    let shown = match live_cleanup(&printed, succeeded) {
        LiveCleanup::Nothing => shown,
        LiveCleanup::EndLine => {
            printer.end_stream();
            shown
        }
        LiveCleanup::Erase => {
            printer.erase_stream(&printed);
            String::new()
        }
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(SummarizerErr::Superseded) => {
            printer.error("Interrupted.");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    if !outcome.is_success() {
        printer.error(outcome.error.as_deref().unwrap_or("Summarization failed."));
        return Ok(ExitCode::FAILURE);
    }
    if let Some(warning) = &outcome.warning {
        printer.warning(warning);
    }
    printer.final_summary(&outcome, &shown);
    Ok(ExitCode::SUCCESS)
}

fn build_request(
    args: &SummarizeArgs,
    target_length: TargetLength,
) -> Result<SummarizeRequest, String> {
    if let Some(url) = args.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(SummarizeRequest::from_url(url, target_length));
    }

    let text = match (&args.file, &args.text) {
        (Some(path), _) if path.as_os_str() == "-" => read_stdin()?,
        (Some(path), _) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        (None, Some(text)) if text != "-" => text.clone(),
        (None, _) => {
            if std::io::stdin().is_terminal() {
                return Err(
                    "No input provided. Pass --url, --file or TEXT, or pipe text into stdin."
                        .to_string(),
                );
            }
            read_stdin()?
        }
    };

    if text.trim().is_empty() {
        return Err("Either url or content must be provided.".to_string());
    }
    Ok(SummarizeRequest::from_text(text, target_length))
}

fn read_stdin() -> Result<String, String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| format!("Failed to read stdin: {e}"))?;
    Ok(buffer)
}

async fn run_history(
    config: Config,
    args: HistoryArgs,
    printer: Printer,
) -> anyhow::Result<ExitCode> {
    let summarizer = Summarizer::new(config);
    let history: Arc<dyn HistoryStore> = summarizer.history();

    if let Some(HistoryAction::Delete { id }) = args.action {
        return Ok(if history.delete(id).await? {
            printer.note(&format!("Deleted summary {id}."));
            ExitCode::SUCCESS
        } else {
            printer.error(&format!("No summary with id {id}."));
            ExitCode::FAILURE
        });
    }

    let records = history.list(args.limit, args.search.as_deref()).await?;
    if records.is_empty() {
        printer.note("No summaries yet.");
    }
    for record in &records {
        printer.history_entry(record);
    }
    Ok(ExitCode::SUCCESS)
}
