//! Command line settings shared by the commands.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use dechets_provider_cacem::{BASE_URL, CacemConfig, RetryPolicy};

/// Default location of the downloaded schedule table.
pub(crate) const DEFAULT_SCHEDULE_PATH: &str = "data/cacem-dechets.csv";
/// Default directory of the analysis reports.
pub(crate) const DEFAULT_ANALYSE_DIR: &str = "data/analyse";

/// How to reach the CACEM API.
#[derive(Debug, Clone, Args)]
pub(crate) struct RemoteArgs {
    /// Root URL of the CACEM API.
    #[arg(long, env = "DECHETS_BASE_URL", default_value = BASE_URL)]
    pub(crate) base_url: String,

    /// Retries after a failed request (connection errors, HTTP 500/502/504).
    #[arg(long, env = "DECHETS_RETRIES", default_value_t = 10)]
    pub(crate) retries: u32,

    /// Seconds to wait before the first retry, doubled on every following one.
    #[arg(long, env = "DECHETS_BACKOFF", default_value_t = 0.5)]
    pub(crate) backoff: f64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DECHETS_TIMEOUT", default_value_t = 30)]
    pub(crate) timeout: u64,
}

impl RemoteArgs {
    /// Provider settings matching these arguments.
    pub(crate) fn to_config(&self) -> Result<CacemConfig> {
        let backoff = Duration::try_from_secs_f64(self.backoff)
            .with_context(|| format!("invalid backoff: {}", self.backoff))?;

        Ok(CacemConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout),
            retry: RetryPolicy::new(self.retries).with_backoff_factor(backoff),
            ..CacemConfig::default()
        })
    }
}
