//! Command line tool downloading CACEM waste collection schedules and reporting
//! addresses with missing collection types.

mod analyse;
mod config;
mod get;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{Instrument, error, info_span};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Download CACEM waste collection schedules and find gaps in them.
#[derive(Debug, Parser)]
#[command(name = "dechets", version)]
struct Cli {
    /// Turn on debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download every schedule into one CSV table (one request per address).
    Get(get::GetArgs),
    /// Report addresses lacking a collection type present elsewhere.
    Analyse(analyse::AnalyseArgs),
}

/// Filter used when `RUST_LOG` is unset: our crates at info, dependencies at warn.
const DEFAULT_FILTER: &str = "dechets=info,warn";
/// Filter selected by `--debug`.
const DEBUG_FILTER: &str = "dechets=debug,info";

fn default_directives(debug: bool) -> &'static str {
    if debug { DEBUG_FILTER } else { DEFAULT_FILTER }
}

fn setup_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_err| EnvFilter::new(default_directives(debug)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    let result = match cli.command {
        Command::Get(args) => get::run(args).instrument(info_span!("get")).await,
        Command::Analyse(args) => {
            let _span = info_span!("analyse").entered();
            analyse::run(&args).map(|_summary| ())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
