//! SQLite-backed [`RecordStore`].
//!
//! # Storage layout
//!
//! `temperature_readings`
//!
//! | column      | type | description                                 |
//! |-------------|------|---------------------------------------------|
//! | id          | TEXT | UUID v4 primary key                         |
//! | kind        | TEXT | `IST`, `SOLL` or `DIFFERENZ`                |
//! | value       | REAL | temperature                                 |
//! | created_at  | TEXT | RFC-3339, nanosecond precision, `Z` suffix  |
//!
//! `device_status`
//!
//! | column      | type    | description                              |
//! |-------------|---------|------------------------------------------|
//! | id          | TEXT    | UUID v4 primary key                      |
//! | status      | INTEGER | status code                              |
//! | status_binary | BLOB  | two-byte big-endian encoding of `status` |
//! | created_at  | TEXT    | as above                                 |
//!
//! Timestamps are written with a fixed width so that text ordering is time
//! ordering.  Ties fall back to insertion order, newest first.
//!
//! # Example
//!
//! ```rust
//! use plcbridge_store::{RecordStore, SqliteRecordStore};
//! use plcbridge_types::{TemperatureKind, TemperatureReading};
//!
//! let store = SqliteRecordStore::open_in_memory().unwrap();
//! let saved = store
//!     .save_reading(TemperatureReading::new(21.5, TemperatureKind::Actual))
//!     .unwrap();
//!
//! let latest = store.latest_by_kind(TemperatureKind::Actual).unwrap().unwrap();
//! assert_eq!(latest.id, saved.id);
//! ```

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use plcbridge_types::{DeviceStatus, Stored, TemperatureKind, TemperatureReading};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use uuid::Uuid;

use crate::record_store::{RecordStore, StoreError};

const READINGS: &str = "temperature_readings";
const STATUS: &str = "device_status";

/// SQLite-backed record store.
///
/// The connection sits behind a [`Mutex`], so one store can be shared across
/// dispatch tasks; every operation is a single statement.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS temperature_readings (
                id         TEXT NOT NULL PRIMARY KEY,
                kind       TEXT NOT NULL,
                value      REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_readings_kind_time
                ON temperature_readings (kind, created_at);
            CREATE TABLE IF NOT EXISTS device_status (
                id         TEXT NOT NULL PRIMARY KEY,
                status     INTEGER NOT NULL,
                status_binary BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_status_time
                ON device_status (created_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn timestamp_to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn text_to_timestamp(table: &'static str, text: &str) -> Result<DateTime<Utc>, StoreError> {
    text.parse::<DateTime<Utc>>().map_err(|e| StoreError::Corrupt {
        table,
        details: format!("created_at {text:?}: {e}"),
    })
}

fn text_to_id(table: &'static str, text: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(text).map_err(|e| StoreError::Corrupt {
        table,
        details: format!("id {text:?}: {e}"),
    })
}

type ReadingRow = (String, String, f64, String);
type StatusRow = (String, i32, String);

fn reading_row(row: &Row<'_>) -> rusqlite::Result<ReadingRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn status_row(row: &Row<'_>) -> rusqlite::Result<StatusRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn reading_from_row(
    (id, kind, value, created_at): ReadingRow,
) -> Result<Stored<TemperatureReading>, StoreError> {
    let kind = TemperatureKind::from_str(&kind).map_err(|e| StoreError::Corrupt {
        table: READINGS,
        details: e.to_string(),
    })?;
    Ok(Stored::new(
        text_to_id(READINGS, &id)?,
        TemperatureReading::restore(value, kind, text_to_timestamp(READINGS, &created_at)?),
    ))
}

fn status_from_row((id, status, created_at): StatusRow) -> Result<Stored<DeviceStatus>, StoreError> {
    Ok(Stored::new(
        text_to_id(STATUS, &id)?,
        DeviceStatus::restore(status, text_to_timestamp(STATUS, &created_at)?),
    ))
}

impl RecordStore for SqliteRecordStore {
    fn save_reading(
        &self,
        reading: TemperatureReading,
    ) -> Result<Stored<TemperatureReading>, StoreError> {
        let id = Uuid::new_v4();
        self.conn()?.execute(
            "INSERT INTO temperature_readings (id, kind, value, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id.to_string(),
                reading.kind().as_str(),
                reading.value(),
                timestamp_to_text(reading.created_at()),
            ],
        )?;
        debug!(%id, kind = %reading.kind(), "reading stored");
        Ok(Stored::new(id, reading))
    }

    fn save_status(&self, status: DeviceStatus) -> Result<Stored<DeviceStatus>, StoreError> {
        let id = Uuid::new_v4();
        self.conn()?.execute(
            "INSERT INTO device_status (id, status, status_binary, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id.to_string(),
                status.status_code(),
                status.binary().to_vec(),
                timestamp_to_text(status.created_at()),
            ],
        )?;
        debug!(%id, status = status.status_code(), "status stored");
        Ok(Stored::new(id, status))
    }

    fn latest_by_kind(
        &self,
        kind: TemperatureKind,
    ) -> Result<Option<Stored<TemperatureReading>>, StoreError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, kind, value, created_at
                 FROM temperature_readings
                 WHERE kind = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![kind.as_str()],
                reading_row,
            )
            .optional()?;
        row.map(reading_from_row).transpose()
    }

    fn all_by_kind(
        &self,
        kind: TemperatureKind,
    ) -> Result<Vec<Stored<TemperatureReading>>, StoreError> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT id, kind, value, created_at
                 FROM temperature_readings
                 WHERE kind = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map(params![kind.as_str()], reading_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(reading_from_row).collect()
    }

    fn latest_status(&self) -> Result<Option<Stored<DeviceStatus>>, StoreError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, status, created_at
                 FROM device_status
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                [],
                status_row,
            )
            .optional()?;
        row.map(status_from_row).transpose()
    }

    fn count_readings(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM temperature_readings", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    fn count_statuses(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM device_status", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
