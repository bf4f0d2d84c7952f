//! The record store contract.
//!
//! Writes are append-only: a record is saved once and never updated.  Reads
//! are newest-first by `created_at`; ordering between records with the same
//! timestamp is whatever the backend does natively.
//!
//! Each call is individually atomic and must be safe to issue from several
//! threads at once, hence the `Send + Sync` bound.

use plcbridge_types::{BridgeError, DeviceStatus, Stored, TemperatureKind, TemperatureReading};
use thiserror::Error;

/// Errors that can arise from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt row in {table}: {details}")]
    Corrupt { table: &'static str, details: String },
    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for BridgeError {
    fn from(err: StoreError) -> Self {
        BridgeError::Store(err.to_string())
    }
}

/// Durable, keyed storage for temperature readings and device status.
pub trait RecordStore: Send + Sync {
    /// Persist `reading` and return it together with its generated id.
    fn save_reading(
        &self,
        reading: TemperatureReading,
    ) -> Result<Stored<TemperatureReading>, StoreError>;

    /// Persist `status` and return it together with its generated id.
    fn save_status(&self, status: DeviceStatus) -> Result<Stored<DeviceStatus>, StoreError>;

    /// Newest reading of `kind`, if any.
    fn latest_by_kind(
        &self,
        kind: TemperatureKind,
    ) -> Result<Option<Stored<TemperatureReading>>, StoreError>;

    /// Every reading of `kind`, newest first.
    fn all_by_kind(
        &self,
        kind: TemperatureKind,
    ) -> Result<Vec<Stored<TemperatureReading>>, StoreError>;

    /// Newest device status across the single status stream, if any.
    fn latest_status(&self) -> Result<Option<Stored<DeviceStatus>>, StoreError>;

    /// Number of stored temperature readings (all kinds).
    fn count_readings(&self) -> Result<u64, StoreError>;

    /// Number of stored device status records.
    fn count_statuses(&self) -> Result<u64, StoreError>;
}
