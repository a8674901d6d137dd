//! Replay a recorded document stream through the dichroism pipeline.
//!
//! Usage:
//!   dichro-replay --input run.jsonl --config dichro.toml
//!
//! Each input line is one serialized `Document`. Relayed events are printed
//! as JSON lines, followed by one summary line per plot group.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dichro_daq::replay::replay_stream;
use dichro_daq::{logging, DichroCallback, DichroConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines file of scan documents
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration file (DICHRO_* environment variables still apply)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let config = match &args.config {
        Some(path) => DichroConfig::load_from(path),
        None => DichroConfig::load(),
    }
    .context("loading dichro configuration")?;
    let mut callback = DichroCallback::new(Arc::new(config))?;

    let file = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let summary = replay_stream(BufReader::new(file), io::stdout().lock(), &mut callback)
        .with_context(|| format!("replaying {}", args.input.display()))?;

    info!(
        documents = summary.documents,
        events = summary.events_written,
        failed_windows = summary.failed_windows,
        stats = ?summary.stats,
        "Replay finished"
    );
    Ok(())
}
