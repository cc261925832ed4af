//! Inner joins between the reference collections and the collection records.
//!
//! Rows keep left-input order: communes, then quartiers within a commune, then
//! addresses within a quartier, then records within an address. Rows whose
//! foreign key has no match are dropped, and duplicate keys multiply rows.

use std::collections::HashMap;
use std::hash::Hash;

use crate::model::{Adresse, AdresseRow, CollecteRecord, Commune, JoinedRow, Quartier};

/// Group `items` by key, keeping input order inside each group.
fn index_by<T, K, F>(items: &[T], key: F) -> HashMap<K, Vec<&T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, Vec<&T>> = HashMap::new();
    for item in items {
        index.entry(key(item)).or_default().push(item);
    }
    index
}

/// Resolve every address to its quartier and commune.
#[must_use]
pub fn join_reference(
    communes: &[Commune],
    quartiers: &[Quartier],
    adresses: &[Adresse],
) -> Vec<AdresseRow> {
    let quartiers_by_commune = index_by(quartiers, |quartier| quartier.commune_id);
    let adresses_by_quartier = index_by(adresses, |adresse| adresse.quartier_id);

    let mut rows = Vec::new();
    for commune in communes {
        let Some(commune_quartiers) = quartiers_by_commune.get(&commune.commune_id) else {
            continue;
        };
        for quartier in commune_quartiers {
            let Some(quartier_adresses) = adresses_by_quartier.get(&quartier.quartier_id) else {
                continue;
            };
            rows.extend(quartier_adresses.iter().map(|adresse| AdresseRow {
                commune_id: commune.commune_id,
                commune_name: commune.commune_name.clone(),
                quartier_id: quartier.quartier_id,
                quartier_name: quartier.quartier_name.clone(),
                adresse_id: adresse.adresse_id,
                adresse_name: adresse.adresse_name.clone(),
            }));
        }
    }
    rows
}

/// Attach collection records to resolved addresses.
#[must_use]
pub fn join_collectes(adresses: &[AdresseRow], records: &[CollecteRecord]) -> Vec<JoinedRow> {
    let records_by_adresse = index_by(records, |record| record.adresse_id);

    adresses
        .iter()
        .flat_map(|adresse| {
            records_by_adresse
                .get(&adresse.adresse_id)
                .into_iter()
                .flatten()
                .map(move |record| JoinedRow::new(adresse, record))
        })
        .collect()
}

/// Full join of the reference collections with the collection records.
#[must_use]
pub fn join(
    communes: &[Commune],
    quartiers: &[Quartier],
    adresses: &[Adresse],
    records: &[CollecteRecord],
) -> Vec<JoinedRow> {
    join_collectes(&join_reference(communes, quartiers, adresses), records)
}
