//! `analyse`: report addresses lacking a collection type.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dechets_core::analysis::{AnalysisSummary, analyse_file};
use tracing::info;

use crate::config::{DEFAULT_ANALYSE_DIR, DEFAULT_SCHEDULE_PATH};

#[derive(Debug, Args)]
pub(crate) struct AnalyseArgs {
    /// Schedule CSV written by `get`.
    #[arg(long, default_value = DEFAULT_SCHEDULE_PATH)]
    pub(crate) input: PathBuf,

    /// Directory to write the analysis into.
    #[arg(long, default_value = DEFAULT_ANALYSE_DIR)]
    pub(crate) output_dir: PathBuf,
}

pub(crate) fn run(args: &AnalyseArgs) -> Result<AnalysisSummary> {
    let summary = analyse_file(&args.input, &args.output_dir)
        .with_context(|| format!("analysing {}", args.input.display()))?;

    info!(
        addresses = summary.addresses,
        collecte_types = summary.collecte_types,
        missing = summary.missing,
        report = %summary.report_path.display(),
        "analysis done"
    );
    Ok(summary)
}
