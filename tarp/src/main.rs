mod commands;
mod logging;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::logging::init_logging;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[command(version, about)]
/// tarp, compressed columns which still behave like plain ones.
///
/// Encode value files into dictionary, run-length or bit-vector columns,
/// inspect stored columns and check every codec against the uncompressed
/// reference.
pub struct Args {
    #[arg(long, env = "TARP_LOG_LEVEL", default_value = "info")]
    /// The tracing filter directive for log output.
    ///
    /// Accepts a global level or per-target overrides, e.g.
    /// `warn,tarp_column=trace` to see every split, merge and new
    /// dictionary code while keeping the rest quiet.
    log_level: String,
    #[arg(long, env = "TARP_LOG_JSON")]
    /// Write one JSON object per log event.
    log_json: bool,
    #[arg(long, env = "TARP_LOG_NO_ANSI")]
    /// Write logs without terminal colours.
    ///
    /// Useful when stderr is redirected to a file or collected by a
    /// log shipper.
    log_no_ansi: bool,
    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args).context("Init logging")?;

    info!("tarp v{}", env!("CARGO_PKG_VERSION"));

    args.command.display_startup_message();
    args.command.execute()
}
