//! Bulk loader for historical lab results.
//!
//! Seeds a fresh database from a CSV export with one row per patient:
//!
//! ```text
//! mrn,creatinine_date_0,creatinine_result_0,creatinine_date_1,creatinine_result_1,...
//! 822825,2024-01-01 06:12:00,68.58,2024-01-02 08:43:00,70.58
//! ```
//!
//! Rows have varying length; empty trailing cells are ignored. The whole
//! file is imported in a single transaction.

use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::store::{PatientStore, DB_TIMESTAMP_FORMAT};

/// Counts of what a load wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Patient rows created.
    pub patients: usize,
    /// Measurement rows created (duplicates excluded).
    pub measurements: usize,
}

/// Load a history CSV file into `store`.
pub fn load_history(store: &mut PatientStore, path: impl AsRef<Path>) -> Result<LoadReport> {
    let path = path.as_ref();
    info!("Loading historical data from {}", path.display());

    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let report = load_history_from(store, reader)?;

    info!(
        "Loaded {} patients and {} measurements",
        report.patients, report.measurements
    );
    Ok(report)
}

/// Open the database at `database`, seeding it from `history` if the file
/// does not exist yet.
///
/// A failed seed removes the new database file so the next start loads again.
pub fn open_seeded(database: &Path, history: &Path) -> Result<PatientStore> {
    let is_new = !database.exists();
    let mut store = PatientStore::open(database)?;

    if !is_new {
        info!("Using existing database {}", database.display());
        return Ok(store);
    }

    if let Err(e) = load_history(&mut store, history) {
        drop(store);
        if let Err(remove) = std::fs::remove_file(database) {
            warn!(
                "Could not remove {} after failed history load: {}",
                database.display(),
                remove
            );
        }
        return Err(e);
    }

    Ok(store)
}

/// Load history from any CSV reader.
pub fn load_history_from<R: std::io::Read>(
    store: &mut PatientStore,
    mut reader: csv::Reader<R>,
) -> Result<LoadReport> {
    let tx = store.transaction()?;
    let mut report = LoadReport::default();

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        // +2: one for the header, one for 1-based numbering
        let line = line + 2;

        let Some(mrn) = record.get(0).map(str::trim).filter(|m| !m.is_empty()) else {
            continue;
        };
        if PatientStore::ensure_patient_tx(&tx, mrn)? {
            report.patients += 1;
        }

        let cells: Vec<&str> = record.iter().skip(1).map(str::trim).collect();
        for pair in cells.chunks(2) {
            let (date, value) = match pair {
                [date, value] if !date.is_empty() && !value.is_empty() => (*date, *value),
                [date, value] if date.is_empty() && value.is_empty() => continue,
                [date] if date.is_empty() => continue,
                _ => {
                    return Err(ClientError::History(format!(
                        "history line {}: incomplete date/value pair for {}",
                        line, mrn
                    )))
                }
            };

            let at = NaiveDateTime::parse_from_str(date, DB_TIMESTAMP_FORMAT).map_err(|e| {
                ClientError::History(format!("history line {}: bad date '{}': {}", line, date, e))
            })?;
            let value: f64 = value.parse().map_err(|_| {
                ClientError::History(format!("history line {}: bad value '{}'", line, value))
            })?;

            if PatientStore::append_measurement_tx(&tx, mrn, at, value)? {
                report.measurements += 1;
            }
        }
    }

    tx.commit()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
mrn,creatinine_date_0,creatinine_result_0,creatinine_date_1,creatinine_result_1
822825,2024-01-01 06:12:00,68.58,2024-01-02 08:43:00,70.58
1,2024-01-05 10:00:00,101.2,,
2,2024-01-05 10:00:00,88.0
";

    fn reader(text: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes())
    }

    #[test]
    fn test_load_sample() {
        let mut store = PatientStore::in_memory().unwrap();
        let report = load_history_from(&mut store, reader(SAMPLE)).unwrap();

        assert_eq!(
            report,
            LoadReport {
                patients: 3,
                measurements: 4
            }
        );
        assert_eq!(
            store.snapshot("822825").unwrap().latest_measurement,
            Some(70.58)
        );
        assert!(store.patient("1").unwrap().unwrap().dob.is_none());
    }

    #[test]
    fn test_reload_is_idempotent() {
        let mut store = PatientStore::in_memory().unwrap();
        load_history_from(&mut store, reader(SAMPLE)).unwrap();
        let second = load_history_from(&mut store, reader(SAMPLE)).unwrap();

        assert_eq!(second, LoadReport::default());
        assert_eq!(store.measurement_count().unwrap(), 4);
    }

    #[test]
    fn test_bad_row_rolls_back_everything() {
        let mut store = PatientStore::in_memory().unwrap();
        let text = "mrn,d0,r0\n1,2024-01-01 00:00:00,5.0\n2,yesterday,6.0\n";

        let err = load_history_from(&mut store, reader(text)).unwrap_err();

        assert!(err.to_string().contains("line 3"));
        assert_eq!(store.patient_count().unwrap(), 0);
        assert_eq!(store.measurement_count().unwrap(), 0);
    }

    #[test]
    fn test_open_seeded_loads_new_database_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("patients.db");
        let csv = dir.path().join("history.csv");
        std::fs::write(&csv, SAMPLE).unwrap();

        let store = open_seeded(&db, &csv).unwrap();
        assert_eq!(store.patient_count().unwrap(), 3);
        drop(store);

        // existing database: history is not read again
        std::fs::write(&csv, "mrn,d0,r0\n9,2024-01-01 00:00:00,1.0\n").unwrap();
        let store = open_seeded(&db, &csv).unwrap();
        assert_eq!(store.patient_count().unwrap(), 3);
    }

    #[test]
    fn test_open_seeded_failure_removes_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("patients.db");
        let csv = dir.path().join("history.csv");
        std::fs::write(&csv, "mrn,d0,r0\n1,yesterday,5.0\n").unwrap();

        let err = open_seeded(&db, &csv).unwrap_err();
        assert!(matches!(err, ClientError::History(_)));
        assert!(!db.exists());

        let err = open_seeded(&db, &dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, ClientError::Csv(_)));
        assert!(!db.exists());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let mut store = PatientStore::in_memory().unwrap();
        let report = load_history(&mut store, file.path()).unwrap();
        assert_eq!(report.patients, 3);
    }
}
