use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use std::path::PathBuf;

/// Command-line interface for the streaming summarizer.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Base URL of the summarization backend.
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Bearer token sent with every request.
    #[arg(long, global = true, env = "SUMMARIZER_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Give up on a stream after this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Specifies color settings for use in the output.
    #[arg(long = "color", value_enum, default_value_t = Color::Auto, global = true)]
    pub color: Color,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stream a summary of a URL, a file or inline text.
    Summarize(SummarizeArgs),

    /// List stored summaries, newest first.
    History(HistoryArgs),
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct SummarizeArgs {
    /// Article URL for the backend to fetch.
    #[arg(long, conflicts_with_all = ["file", "text"])]
    pub url: Option<String>,

    /// Read the text to summarize from a file (`-` for stdin).
    #[arg(long, short = 'f', value_name = "FILE", conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// short, medium or long. Unknown values fall back to medium.
    #[arg(long, short = 'l')]
    pub length: Option<String>,

    /// Text to summarize.
    pub text: Option<String>,
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Only show summaries containing this text.
    #[arg(long)]
    pub search: Option<String>,

    #[command(subcommand)]
    pub action: Option<HistoryAction>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    /// Delete one stored summary.
    Delete { id: i64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Color {
    Always,
    Never,
    #[default]
    Auto,
}
