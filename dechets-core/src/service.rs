//! High-level service facade driving the fetch pipeline.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::join::{join_collectes, join_reference};
use crate::model::{AdresseId, CollecteRecord, JoinedRow, ReferenceCollections};
use crate::plugin::SourcePlugin;
use crate::ports::PortError;

/// Addresses between two progress messages.
const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// What to do when the schedule of one address cannot be fetched.
pub enum DetailPolicy {
    /// Abort the whole run on the first failure.
    #[default]
    FailFast,
    /// Log the failure, remember the address, and keep going.
    SkipAndReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Address whose schedule could not be fetched.
pub struct SkippedAdresse {
    /// Address identifier.
    pub adresse_id: AdresseId,
    /// Rendered error.
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
/// Collection records gathered for a list of addresses.
pub struct DetailReport {
    /// One record per (address, collection type, day).
    pub records: Vec<CollecteRecord>,
    /// Addresses dropped under [`DetailPolicy::SkipAndReport`].
    pub skipped: Vec<SkippedAdresse>,
}

#[derive(Debug, Clone, Default)]
/// Joined schedule table of a full run.
pub struct Schedule {
    /// Flat schedule rows.
    pub rows: Vec<JoinedRow>,
    /// Addresses dropped under [`DetailPolicy::SkipAndReport`].
    pub skipped: Vec<SkippedAdresse>,
}

/// Public entry point for downloading schedules.
pub struct DechetsService {
    plugin: Arc<SourcePlugin>,
    policy: DetailPolicy,
}

impl DechetsService {
    /// Create a new service bound to the provided source.
    #[must_use]
    pub fn new(plugin: Arc<SourcePlugin>) -> Self {
        Self {
            plugin,
            policy: DetailPolicy::default(),
        }
    }

    /// Select how per-address failures are handled.
    #[must_use]
    pub fn with_policy(mut self, policy: DetailPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch communes, quartiers, and addresses, one request each.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if any of the three requests fails or returns
    /// an unexpected payload.
    pub async fn fetch_reference_collections(&self) -> Result<ReferenceCollections, PortError> {
        let port = &self.plugin.reference_port;
        let communes = port.communes().await?;
        let quartiers = port.quartiers().await?;
        let adresses = port.adresses().await?;

        info!(
            source = %port.source().id,
            name = %port.source().name,
            communes = communes.len(),
            quartiers = quartiers.len(),
            adresses = adresses.len(),
            "reference collections retrieved"
        );

        Ok(ReferenceCollections {
            communes,
            quartiers,
            adresses,
        })
    }

    /// Fetch the schedule of every address, one request at a time, in order.
    ///
    /// # Errors
    ///
    /// Under [`DetailPolicy::FailFast`], returns the [`PortError`] of the
    /// first address that fails. Never fails under
    /// [`DetailPolicy::SkipAndReport`].
    pub async fn fetch_collection_details(
        &self,
        adresse_ids: &[AdresseId],
    ) -> Result<DetailReport, PortError> {
        let port = &self.plugin.collecte_port;
        let total = adresse_ids.len();
        let mut report = DetailReport::default();
        debug!(source = %port.source().base_url, total, "fetching schedules");

        for (done, adresse_id) in adresse_ids.iter().copied().enumerate() {
            match port.collectes(adresse_id).await {
                Ok(records) => {
                    debug!(%adresse_id, records = records.len(), "schedule retrieved");
                    report.records.extend(records);
                }
                Err(err) => match self.policy {
                    DetailPolicy::FailFast => return Err(err),
                    DetailPolicy::SkipAndReport => {
                        warn!(%adresse_id, error = %err, "skipping address");
                        report.skipped.push(SkippedAdresse {
                            adresse_id,
                            reason: err.to_string(),
                        });
                    }
                },
            }

            if (done + 1) % PROGRESS_EVERY == 0 {
                info!(done = done + 1, total, "schedules retrieved");
            }
        }

        info!(
            records = report.records.len(),
            skipped = report.skipped.len(),
            total,
            "all schedules retrieved"
        );
        Ok(report)
    }

    /// Download and join the whole schedule table.
    ///
    /// Schedules are only requested for addresses that resolve to a quartier
    /// and a commune.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if a reference request fails, or a schedule
    /// request fails under [`DetailPolicy::FailFast`].
    pub async fn schedule(&self) -> Result<Schedule, PortError> {
        let reference = self.fetch_reference_collections().await?;
        let adresses = join_reference(
            &reference.communes,
            &reference.quartiers,
            &reference.adresses,
        );
        info!(
            adresses = adresses.len(),
            "fetching schedules one address at a time, this takes a while"
        );

        let ids: Vec<AdresseId> = adresses.iter().map(|row| row.adresse_id).collect();
        let details = self.fetch_collection_details(&ids).await?;

        Ok(Schedule {
            rows: join_collectes(&adresses, &details.records),
            skipped: details.skipped,
        })
    }
}
