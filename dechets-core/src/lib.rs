//! Core types and service wiring for the dechets schedule downloader.

/// Gap analysis over a downloaded schedule table.
pub mod analysis;
/// Inner joins between reference collections and schedules.
pub mod join;
/// Domain models and identifiers.
pub mod model;
/// Bundle of ports making up a schedule source.
pub mod plugin;
/// Traits describing the provider interfaces.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;
/// CSV persistence of tables.
pub mod table;

pub use analysis::*;
pub use join::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
pub use table::*;
