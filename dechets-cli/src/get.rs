//! `get`: download every schedule into one CSV table.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use dechets_core::{service::DechetsService, service::DetailPolicy, table::write_table};
use dechets_provider_cacem as cacem;
use tracing::{info, warn};

use crate::config::{DEFAULT_SCHEDULE_PATH, RemoteArgs};

#[derive(Debug, Args)]
pub(crate) struct GetArgs {
    /// Downloaded output CSV path.
    #[arg(long, default_value = DEFAULT_SCHEDULE_PATH)]
    pub(crate) output: PathBuf,

    /// Keep going when the schedule of an address cannot be fetched.
    #[arg(long)]
    pub(crate) skip_failed: bool,

    #[command(flatten)]
    pub(crate) remote: RemoteArgs,
}

impl GetArgs {
    pub(crate) fn policy(&self) -> DetailPolicy {
        if self.skip_failed {
            DetailPolicy::SkipAndReport
        } else {
            DetailPolicy::FailFast
        }
    }
}

pub(crate) async fn run(args: GetArgs) -> Result<()> {
    info!("retrieving data started, one request per address so please be patient");

    let config = args.remote.to_config()?;
    let client = cacem::build_client(&config)?;
    let plugin = Arc::new(cacem::plugin(client, &config));
    let service = DechetsService::new(plugin).with_policy(args.policy());

    let schedule = service
        .schedule()
        .await
        .with_context(|| format!("downloading schedules from {}", config.base_url))?;

    write_table(&args.output, &schedule.rows)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        rows = schedule.rows.len(),
        output = %args.output.display(),
        "csv written"
    );

    for skipped in &schedule.skipped {
        warn!(
            adresse_id = %skipped.adresse_id,
            reason = %skipped.reason,
            "address missing from the table"
        );
    }
    Ok(())
}
