//! Traits describing provider capabilities and shared error types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;

use crate::model::{Adresse, AdresseId, CollecteRecord, Commune, Quartier, SourceMeta};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the remote API.
pub enum PortError {
    /// HTTP client could not be built.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Transient failures kept happening until the retry ceiling was reached.
    #[error("Giving up on {url} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        /// Requested URL.
        url: String,
        /// Number of requests sent.
        attempts: u32,
        /// Last failure seen.
        reason: String,
    },
    /// Server answered with a status that is not retried.
    #[error("HTTP status {status} from {url}")]
    Http {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
    /// Request failed for a reason that is not retried.
    #[error("Transport error for {url}: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Failure description.
        reason: String,
    },
    /// Response body does not have the expected shape.
    #[error("Unexpected response from {url}: {source}")]
    Schema {
        /// Requested URL.
        url: String,
        /// Decoding failure.
        source: JsonError,
    },
}

#[async_trait]
/// Trait for backends serving the reference collections.
pub trait ReferencePort: Send + Sync {
    /// Metadata describing the source handled by this port.
    fn source(&self) -> &SourceMeta;

    /// Fetch every commune.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the payload is malformed.
    async fn communes(&self) -> Result<Vec<Commune>, PortError>;

    /// Fetch every quartier.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the payload is malformed.
    async fn quartiers(&self) -> Result<Vec<Quartier>, PortError>;

    /// Fetch every address.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the payload is malformed.
    async fn adresses(&self) -> Result<Vec<Adresse>, PortError>;
}

#[async_trait]
/// Trait for backends serving per-address collection schedules.
pub trait CollectePort: Send + Sync {
    /// Metadata describing the source handled by this port.
    fn source(&self) -> &SourceMeta;

    /// Fetch the collection records of one address, one record per collection day.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the payload is malformed.
    async fn collectes(&self, adresse_id: AdresseId) -> Result<Vec<CollecteRecord>, PortError>;
}
