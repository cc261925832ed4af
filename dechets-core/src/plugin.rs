//! Bundle of ports making up a schedule source.

use std::sync::Arc;

use crate::ports::{CollectePort, ReferencePort};

/// Collection of ports implementing a provider for a single source.
pub struct SourcePlugin {
    /// Implementation for the reference collections.
    pub reference_port: Arc<dyn ReferencePort>,
    /// Implementation for per-address schedules.
    pub collecte_port: Arc<dyn CollectePort>,
}

impl SourcePlugin {
    /// Bundle a single value implementing both ports.
    #[must_use]
    pub fn from_source<S>(source: Arc<S>) -> Self
    where
        S: ReferencePort + CollectePort + 'static,
    {
        let reference_port: Arc<dyn ReferencePort> = Arc::<S>::clone(&source);
        Self {
            reference_port,
            collecte_port: source,
        }
    }
}
