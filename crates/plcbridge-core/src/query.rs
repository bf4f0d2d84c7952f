//! Read-side façade over the record store.
//!
//! A straight pass-through: no caching, no reshaping.  An empty store answers
//! `Ok(None)` / `Ok(vec![])`, never an error.

use std::sync::Arc;

use plcbridge_store::{RecordStore, StoreError};
use plcbridge_types::{DeviceStatus, Stored, TemperatureKind, TemperatureReading};

pub struct QueryService {
    store: Arc<dyn RecordStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Newest reading of `kind`.
    pub fn get_latest(
        &self,
        kind: TemperatureKind,
    ) -> Result<Option<Stored<TemperatureReading>>, StoreError> {
        self.store.latest_by_kind(kind)
    }

    /// All readings of `kind`, newest first.
    pub fn get_all(
        &self,
        kind: TemperatureKind,
    ) -> Result<Vec<Stored<TemperatureReading>>, StoreError> {
        self.store.all_by_kind(kind)
    }

    /// Newest device status.
    pub fn get_latest_status(&self) -> Result<Option<Stored<DeviceStatus>>, StoreError> {
        self.store.latest_status()
    }
}
