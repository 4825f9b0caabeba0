//! Persistent patient store.
//!
//! SQLite-backed demographics and measurement history keyed by MRN:
//!
//! ```text
//! patients(mrn TEXT PRIMARY KEY, dob TEXT NULL, sex TEXT NULL)
//! measurements(mrn TEXT REFERENCES patients, date TEXT, value REAL,
//!              UNIQUE(mrn, date, value))
//! ```
//!
//! Every public operation runs in its own transaction and commits before
//! returning, so a failure part-way leaves nothing behind. Timestamps are
//! stored as `YYYY-MM-DD HH:MM:SS` text, which sorts chronologically.
//!
//! # Example
//!
//! ```
//! use aki_client::store::PatientStore;
//! use chrono::NaiveDate;
//!
//! let mut store = PatientStore::in_memory().unwrap();
//! let at = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(9, 0, 0).unwrap();
//!
//! store.upsert_demographics("123", None, Some("F")).unwrap();
//! store.append_measurement("123", at, 7.5).unwrap();
//!
//! let snapshot = store.snapshot("123").unwrap();
//! assert_eq!(snapshot.latest_measurement, Some(7.5));
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::debug;

use crate::error::{ClientError, Result};

/// Storage format for timestamps.
pub const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How long a write waits for another session's transaction to finish.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS patients (
        mrn TEXT PRIMARY KEY NOT NULL,
        dob TEXT,
        sex TEXT
    );
    CREATE TABLE IF NOT EXISTS measurements (
        mrn TEXT NOT NULL REFERENCES patients(mrn),
        date TEXT NOT NULL,
        value REAL NOT NULL,
        UNIQUE(mrn, date, value)
    );
    CREATE INDEX IF NOT EXISTS idx_measurements_mrn_date ON measurements(mrn, date);
";

/// Stored demographics for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub mrn: String,
    pub dob: Option<NaiveDateTime>,
    pub sex: Option<String>,
}

/// Demographics plus the most recent measurement, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSnapshot {
    pub mrn: String,
    pub dob: Option<NaiveDateTime>,
    pub sex: Option<String>,
    /// Value of the measurement with the latest timestamp; `None` if the
    /// patient has no history yet.
    pub latest_measurement: Option<f64>,
}

/// Handle to the patients database.
///
/// Owned by exactly one session; concurrent sessions open their own handle.
#[derive(Debug)]
pub struct PatientStore {
    conn: Connection,
}

impl PatientStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Self::bootstrap(conn)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a patient, or overwrite dob and sex if the MRN already exists.
    pub fn upsert_demographics(
        &mut self,
        mrn: &str,
        dob: Option<NaiveDateTime>,
        sex: Option<&str>,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO patients (mrn, dob, sex) VALUES (?1, ?2, ?3)
             ON CONFLICT(mrn) DO UPDATE SET dob = excluded.dob, sex = excluded.sex",
            params![mrn, dob.map(format_timestamp), sex],
        )?;
        tx.commit()?;
        debug!(mrn, "Upserted demographics");
        Ok(())
    }

    /// Demographics and latest measurement for `mrn`.
    ///
    /// # Errors
    ///
    /// `ClientError::NotFound` if the patient was never admitted.
    pub fn snapshot(&mut self, mrn: &str) -> Result<PatientSnapshot> {
        let tx = self.conn.transaction()?;

        let patient = Self::patient_tx(&tx, mrn)?
            .ok_or_else(|| ClientError::NotFound(mrn.to_string()))?;
        let latest_measurement: Option<f64> = tx
            .query_row(
                "SELECT value FROM measurements WHERE mrn = ?1
                 ORDER BY date DESC, rowid DESC LIMIT 1",
                params![mrn],
                |row| row.get(0),
            )
            .optional()?;

        tx.commit()?;

        Ok(PatientSnapshot {
            mrn: patient.mrn,
            dob: patient.dob,
            sex: patient.sex,
            latest_measurement,
        })
    }

    /// Record a measurement.
    ///
    /// Returns `false` when the exact (mrn, timestamp, value) row already
    /// existed and nothing was written.
    pub fn append_measurement(
        &mut self,
        mrn: &str,
        at: NaiveDateTime,
        value: f64,
    ) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let inserted = Self::append_measurement_tx(&tx, mrn, at, value)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Create a patient with unknown demographics unless one exists.
    ///
    /// Returns `true` if a row was created.
    pub fn ensure_patient(&mut self, mrn: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let created = Self::ensure_patient_tx(&tx, mrn)?;
        tx.commit()?;
        Ok(created)
    }

    /// Stored demographics for `mrn`.
    pub fn patient(&self, mrn: &str) -> Result<Option<Patient>> {
        let tx = self.conn.unchecked_transaction()?;
        let patient = Self::patient_tx(&tx, mrn)?;
        tx.commit()?;
        Ok(patient)
    }

    /// All measurements for `mrn`, oldest first.
    pub fn measurements(&self, mrn: &str) -> Result<Vec<(NaiveDateTime, f64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, value FROM measurements WHERE mrn = ?1 ORDER BY date ASC")?;
        let rows = stmt.query_map(params![mrn], |row| {
            let date: String = row.get(0)?;
            let value: f64 = row.get(1)?;
            Ok((date, value))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (date, value) = row?;
            result.push((parse_timestamp(&date)?, value));
        }
        Ok(result)
    }

    /// Number of patient rows.
    pub fn patient_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of measurement rows.
    pub fn measurement_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM measurements", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Start a transaction spanning several writes (bulk import).
    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    pub(crate) fn ensure_patient_tx(tx: &Transaction<'_>, mrn: &str) -> Result<bool> {
        let changed = tx.execute(
            "INSERT INTO patients (mrn, dob, sex) VALUES (?1, NULL, NULL)
             ON CONFLICT(mrn) DO NOTHING",
            params![mrn],
        )?;
        Ok(changed > 0)
    }

    pub(crate) fn append_measurement_tx(
        tx: &Transaction<'_>,
        mrn: &str,
        at: NaiveDateTime,
        value: f64,
    ) -> Result<bool> {
        let changed = tx.execute(
            "INSERT INTO measurements (mrn, date, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(mrn, date, value) DO NOTHING",
            params![mrn, format_timestamp(at), value],
        )?;
        Ok(changed > 0)
    }

    fn patient_tx(tx: &Transaction<'_>, mrn: &str) -> Result<Option<Patient>> {
        let row: Option<(String, Option<String>, Option<String>)> = tx
            .query_row(
                "SELECT mrn, dob, sex FROM patients WHERE mrn = ?1",
                params![mrn],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((mrn, dob, sex)) = row else {
            return Ok(None);
        };
        let dob = match dob {
            Some(raw) => Some(parse_timestamp(&raw)?),
            None => None,
        };
        Ok(Some(Patient { mrn, dob, sex }))
    }
}

fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(DB_TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DB_TIMESTAMP_FORMAT).map_err(|e| {
        ClientError::Store(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        ))
    })
}
