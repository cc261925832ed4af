//! Domain data structures for communes, quartiers, addresses, and collection schedules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Frequency weight of a collection happening every week.
pub const WEEKLY_WEIGHT: f64 = 1.0;
/// Frequency weight of a collection happening every other week.
pub const BIWEEKLY_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier for a commune.
pub struct CommuneId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier for a quartier.
pub struct QuartierId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier for a street address.
pub struct AdresseId(pub i64);

impl fmt::Display for AdresseId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Top-level municipal area.
pub struct Commune {
    /// Unique identifier.
    pub commune_id: CommuneId,
    /// Display name.
    pub commune_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Neighbourhood inside a commune.
pub struct Quartier {
    /// Unique identifier.
    pub quartier_id: QuartierId,
    /// Display name.
    pub quartier_name: String,
    /// Commune the quartier belongs to.
    pub commune_id: CommuneId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Street address, the unit collection schedules are defined against.
pub struct Adresse {
    /// Unique identifier used when requesting schedules.
    pub adresse_id: AdresseId,
    /// Display name.
    pub adresse_name: String,
    /// Quartier the address belongs to.
    pub quartier_id: QuartierId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One collection day for an address.
pub struct CollecteRecord {
    /// Address the collection applies to.
    pub adresse_id: AdresseId,
    /// Label of the collected waste type.
    pub type_collecte: String,
    /// Day of the week.
    pub jour: String,
    /// Alternating week (`A`/`B`), or `None` when collected every week.
    pub type_semaine: Option<String>,
}

/// Weight of a collection given its week cadence.
#[must_use]
pub fn frequency_weight(type_semaine: Option<&str>) -> f64 {
    if type_semaine.is_some() {
        BIWEEKLY_WEIGHT
    } else {
        WEEKLY_WEIGHT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Address resolved to its quartier and commune.
pub struct AdresseRow {
    /// Commune identifier.
    pub commune_id: CommuneId,
    /// Commune name.
    pub commune_name: String,
    /// Quartier identifier.
    pub quartier_id: QuartierId,
    /// Quartier name.
    pub quartier_name: String,
    /// Address identifier.
    pub adresse_id: AdresseId,
    /// Address name.
    pub adresse_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Flat schedule row, one per (address, collection type, day).
///
/// Field order is the column order of the schedule CSV.
pub struct JoinedRow {
    /// Commune identifier.
    pub commune_id: CommuneId,
    /// Commune name.
    pub commune_name: String,
    /// Quartier identifier.
    pub quartier_id: QuartierId,
    /// Quartier name.
    pub quartier_name: String,
    /// Address identifier.
    pub adresse_id: AdresseId,
    /// Address name.
    pub adresse_name: String,
    /// Label of the collected waste type.
    pub type_collecte: String,
    /// Day of the week.
    pub jour: String,
    /// Alternating week, empty when collected every week.
    pub type_semaine: Option<String>,
}

impl JoinedRow {
    /// Combine a resolved address with one of its collection records.
    #[must_use]
    pub fn new(adresse: &AdresseRow, record: &CollecteRecord) -> Self {
        Self {
            commune_id: adresse.commune_id,
            commune_name: adresse.commune_name.clone(),
            quartier_id: adresse.quartier_id,
            quartier_name: adresse.quartier_name.clone(),
            adresse_id: adresse.adresse_id,
            adresse_name: adresse.adresse_name.clone(),
            type_collecte: record.type_collecte.clone(),
            jour: record.jour.clone(),
            type_semaine: record.type_semaine.clone(),
        }
    }

    /// Frequency weight of this row.
    #[must_use]
    pub fn weight(&self) -> f64 {
        frequency_weight(self.type_semaine.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// The three reference collections served by the API.
pub struct ReferenceCollections {
    /// All communes.
    pub communes: Vec<Commune>,
    /// All quartiers.
    pub quartiers: Vec<Quartier>,
    /// All addresses.
    pub adresses: Vec<Adresse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a schedule source.
pub struct SourceMeta {
    /// Short identifier, used in logs.
    pub id: String,
    /// Human-friendly name.
    pub name: String,
    /// Root URL of the remote API.
    pub base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternating_weeks_weigh_half() {
        let mut row = JoinedRow {
            commune_id: CommuneId(1),
            commune_name: "Schoelcher".to_owned(),
            quartier_id: QuartierId(2),
            quartier_name: "Terreville".to_owned(),
            adresse_id: AdresseId(3),
            adresse_name: "Rue des Flamboyants".to_owned(),
            type_collecte: "Ordures".to_owned(),
            jour: "Lundi".to_owned(),
            type_semaine: None,
        };
        assert!((row.weight() - WEEKLY_WEIGHT).abs() < f64::EPSILON);

        row.type_semaine = Some("B".to_owned());
        assert!((row.weight() - BIWEEKLY_WEIGHT).abs() < f64::EPSILON);
        assert!((frequency_weight(Some("A")) - BIWEEKLY_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn identifiers_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&AdresseId(42)).unwrap();

        assert_eq!(json, "42");
        assert_eq!(AdresseId(42).to_string(), "42");
    }
}
