//! Entry-point for the `summarizer` binary.
use std::process::ExitCode;

use clap::Parser;
use summarizer_cli::Cli;
use summarizer_cli::run_main;

fn main() -> anyhow::Result<ExitCode> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let cli = Cli::parse();
        run_main(cli).await
    })
}
