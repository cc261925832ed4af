//! Provider implementation for the CACEM waste collection API.

/// GET requests with bounded retry and exponential backoff.
pub mod retry;

#[cfg(test)]
mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use dechets_core::{
    model::{
        Adresse, AdresseId, CollecteRecord, Commune, CommuneId, Quartier, QuartierId, SourceMeta,
    },
    plugin::SourcePlugin,
    ports::{CollectePort, PortError, ReferencePort},
};

pub use retry::{HttpTransport, RetryPolicy, RetryingClient, Transport};

/// Public endpoint of the CACEM collection service.
pub const BASE_URL: &str = "https://collecte-dechets.cacem.fr";

/// Commune as returned by /get/communes
#[derive(Debug, Deserialize)]
struct CommuneEntry {
    id: i64,
    name: String,
}

/// Quartier as returned by /get/quartiers
#[derive(Debug, Deserialize)]
struct QuartierEntry {
    id: i64,
    name: String,
    commune_id: i64,
}

/// Address as returned by /get/adresses
#[derive(Debug, Deserialize)]
struct AdresseEntry {
    id: i64,
    name: String,
    quartier_id: i64,
}

/// Response from /get/collectes/{id}
#[derive(Debug, Deserialize)]
struct CollectesResponse {
    adresse: AdresseRef,
    collectes: Vec<CollecteEntry>,
}

/// Nested address object, only the id matters.
#[derive(Debug, Deserialize)]
struct AdresseRef {
    id: i64,
}

/// One collection type with its days.
#[derive(Debug, Deserialize)]
struct CollecteEntry {
    title: String,
    week_type: Option<String>, // "A", "B", or null for every week
    days: Vec<String>,
}

impl CollectesResponse {
    /// One record per (collection type, day).
    fn into_records(self) -> Vec<CollecteRecord> {
        let adresse_id = AdresseId(self.adresse.id);
        self.collectes
            .into_iter()
            .flat_map(|collecte| {
                let CollecteEntry {
                    title,
                    week_type,
                    days,
                } = collecte;
                days.into_iter().map(move |jour| CollecteRecord {
                    adresse_id,
                    type_collecte: title.clone(),
                    jour,
                    type_semaine: week_type.clone(),
                })
            })
            .collect()
    }
}

/// Settings of the CACEM provider.
#[derive(Debug, Clone)]
pub struct CacemConfig {
    /// Root URL of the API, without trailing slash.
    pub base_url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry behaviour for every request.
    pub retry: RetryPolicy,
}

impl Default for CacemConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_owned(),
            user_agent: concat!("dechets/", env!("CARGO_PKG_VERSION")).to_owned(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Reference and schedule ports for CACEM, sharing one retrying client.
pub struct CacemSource<T = HttpTransport> {
    client: RetryingClient<T>,
    meta: SourceMeta,
}

impl<T: Transport> CacemSource<T> {
    /// Create a source sending requests through `transport`.
    #[must_use]
    pub fn new(transport: T, config: &CacemConfig) -> Self {
        Self {
            client: RetryingClient::new(transport, config.retry.clone()),
            meta: source_meta(&config.base_url),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/get/{path}", self.meta.base_url)
    }
}

#[async_trait]
impl<T: Transport> ReferencePort for CacemSource<T> {
    fn source(&self) -> &SourceMeta {
        &self.meta
    }

    async fn communes(&self) -> Result<Vec<Commune>, PortError> {
        let entries: Vec<CommuneEntry> = self.client.get_json(&self.url("communes")).await?;
        Ok(entries
            .into_iter()
            .map(|entry| Commune {
                commune_id: CommuneId(entry.id),
                commune_name: entry.name,
            })
            .collect())
    }

    async fn quartiers(&self) -> Result<Vec<Quartier>, PortError> {
        let entries: Vec<QuartierEntry> = self.client.get_json(&self.url("quartiers")).await?;
        Ok(entries
            .into_iter()
            .map(|entry| Quartier {
                quartier_id: QuartierId(entry.id),
                quartier_name: entry.name,
                commune_id: CommuneId(entry.commune_id),
            })
            .collect())
    }

    async fn adresses(&self) -> Result<Vec<Adresse>, PortError> {
        let entries: Vec<AdresseEntry> = self.client.get_json(&self.url("adresses")).await?;
        Ok(entries
            .into_iter()
            .map(|entry| Adresse {
                adresse_id: AdresseId(entry.id),
                adresse_name: entry.name,
                quartier_id: QuartierId(entry.quartier_id),
            })
            .collect())
    }
}

#[async_trait]
impl<T: Transport> CollectePort for CacemSource<T> {
    fn source(&self) -> &SourceMeta {
        &self.meta
    }

    async fn collectes(&self, adresse_id: AdresseId) -> Result<Vec<CollecteRecord>, PortError> {
        let response: CollectesResponse = self
            .client
            .get_json(&self.url(&format!("collectes/{adresse_id}")))
            .await?;
        Ok(response.into_records())
    }
}

/// Build the pooled HTTP client shared by every request of a run.
///
/// # Errors
///
/// Returns [`PortError::Network`] when the TLS backend cannot be initialised.
pub fn build_client(config: &CacemConfig) -> Result<Client, PortError> {
    Ok(Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .build()?)
}

/// Build the plugin bundle for the CACEM provider.
#[must_use]
pub fn plugin(client: Client, config: &CacemConfig) -> SourcePlugin {
    SourcePlugin::from_source(Arc::new(CacemSource::new(HttpTransport::new(client), config)))
}

fn source_meta(base_url: &str) -> SourceMeta {
    SourceMeta {
        id: String::from("cacem"),
        name: String::from("CACEM Martinique"),
        base_url: base_url.trim_end_matches('/').to_owned(),
    }
}
