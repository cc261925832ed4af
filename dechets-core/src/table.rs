//! CSV persistence of schedule tables and reports.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::model::JoinedRow;

#[derive(thiserror::Error, Debug)]
/// Errors raised while reading or writing CSV tables.
pub enum TableError {
    /// Input table does not exist.
    #[error("{} not found, run `get` first", .0.display())]
    MissingInput(PathBuf),
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed CSV content.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Write `rows` as a headed CSV file, replacing any existing file.
///
/// Missing parent directories are created. A header is written even when
/// `rows` is empty. Rows go to a temporary file next to `path` that is
/// renamed over it once complete, so a failed write leaves any previous
/// file untouched.
///
/// # Errors
///
/// Returns a [`TableError`] when the directory or file cannot be written.
pub fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), TableError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir)?;
            dir
        }
        _ => Path::new("."),
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(NamedTempFile::new_in(parent)?);
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.persist(path).map_err(|err| err.error)?;

    debug!(path = %path.display(), rows = rows.len(), "csv written");
    Ok(())
}

/// Read every row of a headed CSV file.
///
/// # Errors
///
/// Returns [`TableError::MissingInput`] when `path` does not exist, or
/// another [`TableError`] when a row cannot be decoded.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, TableError> {
    if !path.exists() {
        return Err(TableError::MissingInput(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;

    debug!(path = %path.display(), rows = rows.len(), "csv read");
    Ok(rows)
}

/// Column order of the schedule table.
pub const SCHEDULE_HEADER: [&str; 9] = [
    "commune_id",
    "commune_name",
    "quartier_id",
    "quartier_name",
    "adresse_id",
    "adresse_name",
    "type_collecte",
    "jour",
    "type_semaine",
];

/// Write the joined schedule table.
///
/// # Errors
///
/// Returns a [`TableError`] when the file cannot be written.
pub fn write_table(path: &Path, rows: &[JoinedRow]) -> Result<(), TableError> {
    write_csv(path, &SCHEDULE_HEADER, rows)
}

/// Read a schedule table written by [`write_table`].
///
/// # Errors
///
/// Returns a [`TableError`] when the file is missing or malformed.
pub fn read_table(path: &Path) -> Result<Vec<JoinedRow>, TableError> {
    read_csv(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tempfile::TempDir;

    use super::*;
    use crate::model::{AdresseId, CommuneId, QuartierId};

    fn row(adresse: i64, kind: &str, semaine: Option<&str>) -> JoinedRow {
        JoinedRow {
            commune_id: CommuneId(1),
            commune_name: "Le Lamentin".to_owned(),
            quartier_id: QuartierId(7),
            quartier_name: "Place d'Armes, \"bourg\"".to_owned(),
            adresse_id: AdresseId(adresse),
            adresse_name: format!("Rue {adresse}"),
            type_collecte: kind.to_owned(),
            jour: "Lundi".to_owned(),
            type_semaine: semaine.map(str::to_owned),
        }
    }

    #[test]
    fn writes_header_in_fixed_column_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("schedule.csv");

        write_table(&path, &[row(1, "Ordures", None), row(2, "Recyclable", Some("A"))]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some(
                "commune_id,commune_name,quartier_id,quartier_name,adresse_id,adresse_name,type_collecte,jour,type_semaine"
            )
        );
        assert_eq!(lines.next(), Some("1,Le Lamentin,7,\"Place d'Armes, \"\"bourg\"\"\",1,Rue 1,Ordures,Lundi,"));
        assert_eq!(lines.next(), Some("1,Le Lamentin,7,\"Place d'Armes, \"\"bourg\"\"\",2,Rue 2,Recyclable,Lundi,A"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn round_trip_preserves_row_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schedule.csv");
        let rows = vec![
            row(1, "Ordures", None),
            row(1, "Recyclable", Some("B")),
            row(2, "Encombrants", Some("A")),
        ];

        write_table(&path, &rows).unwrap();
        let read_back = read_table(&path).unwrap();

        let expected: HashSet<_> = rows.into_iter().collect();
        let actual: HashSet<_> = read_back.into_iter().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schedule.csv");

        write_table(&path, &[row(1, "Ordures", None), row(2, "Ordures", None)]).unwrap();
        write_table(&path, &[row(3, "Ordures", None)]).unwrap();

        let read_back = read_table(&path).unwrap();
        assert_eq!(read_back, vec![row(3, "Ordures", None)]);
    }

    struct Exploding(bool);

    impl Serialize for Exploding {
        fn serialize<Ser: serde::Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
            if self.0 {
                return Err(serde::ser::Error::custom("row cannot be encoded"));
            }
            serializer.serialize_str("fine")
        }
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schedule.csv");
        write_table(&path, &[row(1, "Ordures", None)]).unwrap();
        let before = fs::read(&path).unwrap();

        let result = write_csv(
            &path,
            &["value"],
            &[Exploding(false), Exploding(false), Exploding(true)],
        );

        assert!(matches!(result, Err(TableError::Csv(_))));
        assert_eq!(fs::read(&path).unwrap(), before);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn empty_table_keeps_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schedule.csv");

        write_table(&path, &[]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
        assert!(read_table(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");

        let err = read_table(&path).unwrap_err();

        assert!(matches!(err, TableError::MissingInput(ref missing) if *missing == path));
        assert!(err.to_string().contains("run `get` first"));
    }
}
