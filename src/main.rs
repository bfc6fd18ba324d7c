//! parity - rendering conformance harness
//!
//! Captures frames from a renderer, compares them against reference
//! baselines and turns the numbers into CI verdicts.

use clap::Parser;
use parity::cli::{self, Verdict};
use parity::commands::Commands;
use parity::common::{config::Config, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parity", about = "Rendering parity harness")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true, env = "PARITY_CONFIG")]
    config: Option<PathBuf>,

    /// Also write detailed logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Flushes the file log on drop
    let _guard = logging::init(cli.log_file.as_deref());

    let result = match Config::load(cli.config.as_deref()) {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(Verdict::Pass) => {}
        Ok(Verdict::Fail) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
