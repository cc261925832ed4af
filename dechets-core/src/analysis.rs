//! Gap analysis: which addresses lack a collection type seen elsewhere.
//!
//! Each schedule row weighs 1 when collected every week and 0.5 on
//! alternating weeks. Weights are summed per (address, type) into a coverage
//! score, and an address is missing a type when its score is 0.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{AdresseId, CommuneId, JoinedRow, QuartierId};
use crate::table::{TableError, read_table, write_csv};

/// File name of the gap report inside the output directory.
pub const REPORT_FILE_NAME: &str = "collectes-manquantes.csv";

/// Column order of the gap report.
pub const REPORT_HEADER: [&str; 5] = [
    "commune_name",
    "quartier_name",
    "adresse_name",
    "adresse_id",
    "collecte_manquante",
];

#[derive(Debug, Clone, PartialEq)]
/// Descriptive columns and per-type scores for one address.
pub struct AddressCoverage {
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
    /// Score per collection type, aligned with [`CoverageTable::types`].
    pub scores: Vec<f64>,
}

impl AddressCoverage {
    /// Score of the collection type in `column`, 0 when absent.
    #[must_use]
    pub fn score(&self, column: usize) -> f64 {
        self.scores.get(column).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Dense address × collection type score table.
pub struct CoverageTable {
    /// Collection types in order of first appearance.
    pub types: Vec<String>,
    /// One entry per address, sorted by identifier.
    pub addresses: Vec<AddressCoverage>,
}

impl CoverageTable {
    /// Build the table from schedule rows.
    #[must_use]
    pub fn from_rows(rows: &[JoinedRow]) -> Self {
        let mut types: Vec<String> = Vec::new();
        let mut type_index: HashMap<&str, usize> = HashMap::new();
        let mut sparse: HashMap<(AdresseId, usize), f64> = HashMap::new();
        let mut firsts: BTreeMap<AdresseId, &JoinedRow> = BTreeMap::new();

        for row in rows {
            let column = *type_index.entry(row.type_collecte.as_str()).or_insert_with(|| {
                types.push(row.type_collecte.clone());
                types.len() - 1
            });
            *sparse.entry((row.adresse_id, column)).or_insert(0.0) += row.weight();
            firsts.entry(row.adresse_id).or_insert(row);
        }

        let addresses = firsts
            .into_values()
            .map(|first| AddressCoverage {
                commune_id: first.commune_id,
                commune_name: first.commune_name.clone(),
                quartier_id: first.quartier_id,
                quartier_name: first.quartier_name.clone(),
                adresse_id: first.adresse_id,
                adresse_name: first.adresse_name.clone(),
                scores: (0..types.len())
                    .map(|column| {
                        sparse
                            .get(&(first.adresse_id, column))
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect(),
            })
            .collect();

        Self { types, addresses }
    }

    /// Addresses missing each observed type, grouped by type then address.
    #[must_use]
    pub fn missing(&self) -> Vec<MissingCollecte> {
        let mut report = Vec::new();
        for (column, type_collecte) in self.types.iter().enumerate() {
            report.extend(
                self.addresses
                    .iter()
                    .filter(|address| address.score(column) <= 0.0)
                    .map(|address| MissingCollecte {
                        commune_name: address.commune_name.clone(),
                        quartier_name: address.quartier_name.clone(),
                        adresse_name: address.adresse_name.clone(),
                        adresse_id: address.adresse_id,
                        collecte_manquante: type_collecte.clone(),
                    }),
            );
        }
        report
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One row of the gap report.
pub struct MissingCollecte {
    /// Commune name.
    pub commune_name: String,
    /// Quartier name.
    pub quartier_name: String,
    /// Address name.
    pub adresse_name: String,
    /// Address identifier.
    pub adresse_id: AdresseId,
    /// Collection type absent for the address.
    pub collecte_manquante: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of an analysis run.
pub struct AnalysisSummary {
    /// Distinct addresses in the input.
    pub addresses: usize,
    /// Distinct collection types in the input.
    pub collecte_types: usize,
    /// Rows written to the report.
    pub missing: usize,
    /// Location of the report.
    pub report_path: PathBuf,
}

/// Analyse the schedule table at `input` and write the gap report into `output_dir`.
///
/// # Errors
///
/// Returns [`TableError::MissingInput`] when `input` does not exist, or
/// another [`TableError`] when reading or writing fails.
pub fn analyse_file(input: &Path, output_dir: &Path) -> Result<AnalysisSummary, TableError> {
    let rows = read_table(input)?;
    let coverage = CoverageTable::from_rows(&rows);
    debug!(
        addresses = coverage.addresses.len(),
        types = ?coverage.types,
        "coverage computed"
    );

    let missing = coverage.missing();
    let report_path = output_dir.join(REPORT_FILE_NAME);
    write_csv(&report_path, &REPORT_HEADER, &missing)?;

    info!(
        rows = rows.len(),
        missing = missing.len(),
        report = %report_path.display(),
        "gap report written"
    );

    Ok(AnalysisSummary {
        addresses: coverage.addresses.len(),
        collecte_types: coverage.types.len(),
        missing: missing.len(),
        report_path,
    })
}
