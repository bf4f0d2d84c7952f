//! Health snapshot: is the store reachable, how much is in it, how much has
//! been received.

use std::sync::Arc;

use plcbridge_store::{RecordStore, StoreError};
use serde::Serialize;
use tracing::{error, info};

use crate::counter::TopicCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatabaseState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub service: String,
    pub database: DatabaseState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_record_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_record_count: Option<u64>,
    pub messages_received: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct HealthService {
    service: String,
    store: Arc<dyn RecordStore>,
    counter: Arc<TopicCounter>,
}

impl HealthService {
    pub fn new(
        service: impl Into<String>,
        store: Arc<dyn RecordStore>,
        counter: Arc<TopicCounter>,
    ) -> Self {
        Self {
            service: service.into(),
            store,
            counter,
        }
    }

    /// Take a snapshot.  A failing store is reported as
    /// [`DatabaseState::Disconnected`] rather than as an error.
    pub fn snapshot(&self) -> HealthSnapshot {
        let mut snapshot = HealthSnapshot {
            status: "UP",
            service: self.service.clone(),
            database: DatabaseState::Connected,
            temperature_record_count: None,
            status_record_count: None,
            messages_received: self.counter.total(),
            error: None,
        };
        match self.counts() {
            Ok((readings, statuses)) => {
                info!(readings, statuses, "health check: database connected");
                snapshot.temperature_record_count = Some(readings);
                snapshot.status_record_count = Some(statuses);
            }
            Err(e) => {
                error!(error = %e, "health check: database disconnected");
                snapshot.database = DatabaseState::Disconnected;
                snapshot.error = Some(e.to_string());
            }
        }
        snapshot
    }

    fn counts(&self) -> Result<(u64, u64), StoreError> {
        Ok((self.store.count_readings()?, self.store.count_statuses()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::IngestionCounter;
    use plcbridge_store::SqliteRecordStore;
    use plcbridge_types::{DeviceStatus, Stored, TemperatureKind, TemperatureReading};

    #[test]
    fn reports_counts_when_connected() {
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        store.save_status(DeviceStatus::new(1)).unwrap();
        store
            .save_reading(TemperatureReading::new(20.0, TemperatureKind::Actual))
            .unwrap();
        let counter = Arc::new(TopicCounter::new());
        counter.increment("Wago750/Status");

        let snapshot = HealthService::new("plcbridge", store, counter).snapshot();
        assert_eq!(snapshot.database, DatabaseState::Connected);
        assert_eq!(snapshot.temperature_record_count, Some(1));
        assert_eq!(snapshot.status_record_count, Some(1));
        assert_eq!(snapshot.messages_received, 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "UP");
        assert_eq!(json["database"], "CONNECTED");
        assert_eq!(json["temperatureRecordCount"], 1);
        assert!(json.get("error").is_none());
    }

    struct Unreachable;

    impl RecordStore for Unreachable {
        fn save_reading(
            &self,
            _: TemperatureReading,
        ) -> Result<Stored<TemperatureReading>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn save_status(&self, _: DeviceStatus) -> Result<Stored<DeviceStatus>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn latest_by_kind(
            &self,
            _: TemperatureKind,
        ) -> Result<Option<Stored<TemperatureReading>>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn all_by_kind(
            &self,
            _: TemperatureKind,
        ) -> Result<Vec<Stored<TemperatureReading>>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn latest_status(&self) -> Result<Option<Stored<DeviceStatus>>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn count_readings(&self) -> Result<u64, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn count_statuses(&self) -> Result<u64, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    #[test]
    fn failing_store_reads_as_disconnected() {
        let snapshot =
            HealthService::new("plcbridge", Arc::new(Unreachable), Arc::new(TopicCounter::new()))
                .snapshot();
        assert_eq!(snapshot.status, "UP");
        assert_eq!(snapshot.database, DatabaseState::Disconnected);
        assert_eq!(snapshot.temperature_record_count, None);
        assert_eq!(snapshot.error.as_deref(), Some("Store lock poisoned"));
    }
}
