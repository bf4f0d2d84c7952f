//! [`Dispatcher`] – maps one inbound `(topic, payload)` pair to zero or more
//! decode-and-persist steps.
//!
//! Per message, in order:
//!
//! 1. The [`IngestionCounter`] is incremented for the topic, whatever happens
//!    next.
//! 2. The topic is resolved through the [`TopicTable`].  An unknown topic is
//!    logged and nothing is stored.
//! 3. The payload is decoded and the resulting record(s) saved.
//!
//! Failures never escape [`Dispatcher::dispatch`]; they are logged and listed
//! in the returned [`DispatchReport`].
//!
//! # Synthetic test topic
//!
//! A message on the synthetic topic stores one [`DeviceStatus`] from the
//! payload and then three temperature readings derived from
//! `d = status / 10.0`:
//!
//! | kind | value |
//! |---|---|
//! | Actual | `d + 20` |
//! | Target | `25.0` |
//! | Deviation | `d - 5` |
//!
//! The readings depend on the status parse: if the payload is not a valid
//! status, *nothing* is stored.  A bracketed payload such as `[50]` decodes
//! as a status, so it stores all four records.  Store failures on individual steps do not
//! stop the remaining steps.

use std::sync::Arc;

use plcbridge_store::RecordStore;
use plcbridge_types::{BridgeError, DeviceStatus, Stored, TemperatureKind, TemperatureReading};
use tracing::{error, info, warn};

use crate::counter::IngestionCounter;
use crate::decoder::{decode_status, decode_temperature};
use crate::topics::{TopicKind, TopicTable};

const SYNTHETIC_SCALE: f64 = 10.0;
const SYNTHETIC_ACTUAL_OFFSET: f64 = 20.0;
const SYNTHETIC_TARGET: f64 = 25.0;
const SYNTHETIC_DEVIATION_OFFSET: f64 = 5.0;

/// What one dispatch did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// How the topic was classified; `None` for unknown topics.
    pub route: Option<TopicKind>,
    /// Status records that were saved.
    pub statuses: Vec<Stored<DeviceStatus>>,
    /// Temperature records that were saved.
    pub readings: Vec<Stored<TemperatureReading>>,
    /// Everything that went wrong, in order.
    pub errors: Vec<BridgeError>,
}

impl DispatchReport {
    /// Number of records saved by this dispatch.
    pub fn persisted(&self) -> usize {
        self.statuses.len() + self.readings.len()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Stateless per-call router from inbound messages to the record store.
///
/// Safe to share across tasks: the only state is the immutable
/// [`TopicTable`] plus the shared store and counter.
pub struct Dispatcher {
    table: TopicTable,
    store: Arc<dyn RecordStore>,
    counter: Arc<dyn IngestionCounter>,
}

impl Dispatcher {
    pub fn new(
        table: TopicTable,
        store: Arc<dyn RecordStore>,
        counter: Arc<dyn IngestionCounter>,
    ) -> Self {
        Self {
            table,
            store,
            counter,
        }
    }

    /// Handle one inbound message.
    pub fn dispatch(&self, topic: &str, payload: &str) -> DispatchReport {
        self.counter.increment(topic);
        info!(topic, payload, "message received");

        let mut report = DispatchReport::default();
        let Some(route) = self.table.resolve(topic) else {
            warn!(topic, "unknown topic");
            report.errors.push(BridgeError::UnknownTopic(topic.to_string()));
            return report;
        };
        report.route = Some(route);

        match route {
            TopicKind::DeviceStatus => {
                self.ingest_status(payload, &mut report);
            }
            TopicKind::Temperature(kind) => match decode_temperature(payload, kind) {
                Ok(reading) => self.persist_reading(reading, &mut report),
                Err(e) => fail("temperature", e, &mut report),
            },
            TopicKind::SyntheticTest => {
                info!(topic, "using synthetic test data");
                self.ingest_synthetic(topic, payload, &mut report);
            }
        }
        report
    }

    /// Decode and save a status.  Returns the decoded code even when saving
    /// failed, so callers can keep deriving from it.
    fn ingest_status(&self, payload: &str, report: &mut DispatchReport) -> Option<i32> {
        let status = match decode_status(payload) {
            Ok(status) => status,
            Err(e) => {
                fail("status", e, report);
                return None;
            }
        };
        let code = status.status_code();
        match self.store.save_status(status) {
            Ok(saved) => {
                info!(
                    id = %saved.id,
                    status = code,
                    binary = %format!("{code:b}"),
                    created_at = %saved.record.created_at(),
                    "status saved"
                );
                report.statuses.push(saved);
            }
            Err(e) => fail("status", e.into(), report),
        }
        Some(code)
    }

    fn ingest_synthetic(&self, topic: &str, payload: &str, report: &mut DispatchReport) {
        let Some(code) = self.ingest_status(payload, report) else {
            warn!(topic, payload, "synthetic payload is not a status; nothing stored");
            return;
        };
        let derived = f64::from(code) / SYNTHETIC_SCALE;
        let readings = [
            (derived + SYNTHETIC_ACTUAL_OFFSET, TemperatureKind::Actual),
            (SYNTHETIC_TARGET, TemperatureKind::Target),
            (derived - SYNTHETIC_DEVIATION_OFFSET, TemperatureKind::Deviation),
        ];
        for (value, kind) in readings {
            self.persist_reading(TemperatureReading::new(value, kind), report);
        }
    }

    fn persist_reading(&self, reading: TemperatureReading, report: &mut DispatchReport) {
        let kind = reading.kind();
        match self.store.save_reading(reading) {
            Ok(saved) => {
                info!(
                    id = %saved.id,
                    %kind,
                    temperature = saved.record.value(),
                    created_at = %saved.record.created_at(),
                    "temperature saved"
                );
                report.readings.push(saved);
            }
            Err(e) => fail("temperature", e.into(), report),
        }
    }
}

fn fail(step: &str, err: BridgeError, report: &mut DispatchReport) {
    error!(step, error = %err, "dispatch step failed");
    report.errors.push(err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::TopicCounter;
    use crate::topics::TopicBinding;
    use plcbridge_store::{SqliteRecordStore, StoreError};
    use plcbridge_types::PayloadKind;

    fn binding() -> TopicBinding {
        TopicBinding {
            device_status: Some("T/status".to_string()),
            temperature_actual: Some("T/ist".to_string()),
            temperature_target: Some("T/soll".to_string()),
            temperature_deviation: Some("T/diff".to_string()),
            ..TopicBinding::default()
        }
    }

    fn fixture() -> (Dispatcher, Arc<SqliteRecordStore>, Arc<TopicCounter>) {
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let counter = Arc::new(TopicCounter::new());
        let table = TopicTable::from_binding(&binding()).unwrap();
        let dispatcher = Dispatcher::new(table, store.clone(), counter.clone());
        (dispatcher, store, counter)
    }

    fn total_records(store: &SqliteRecordStore) -> u64 {
        store.count_readings().unwrap() + store.count_statuses().unwrap()
    }

    #[test]
    fn actual_topic_stores_one_actual_reading() {
        let (dispatcher, store, counter) = fixture();
        let report = dispatcher.dispatch("T/ist", "23.5");

        assert!(report.is_clean());
        assert_eq!(report.route, Some(TopicKind::Temperature(TemperatureKind::Actual)));
        assert_eq!(report.readings.len(), 1);
        assert!(report.statuses.is_empty());

        let stored = store.latest_by_kind(TemperatureKind::Actual).unwrap().unwrap();
        assert_eq!(stored.record.actual(), Some(23.5));
        assert_eq!(stored.record.target(), None);
        assert_eq!(stored.record.deviation(), None);
        assert_eq!(store.count_statuses().unwrap(), 0);
        assert_eq!(counter.get("T/ist"), 1);
    }

    #[test]
    fn status_topic_stores_one_status() {
        let (dispatcher, store, _) = fixture();
        let report = dispatcher.dispatch("T/status", "42");

        assert_eq!(report.persisted(), 1);
        let stored = store.latest_status().unwrap().unwrap();
        assert_eq!(stored.record.status_code(), 42);
        assert_eq!(stored.record.binary(), [0, 42]);
        assert_eq!(store.count_readings().unwrap(), 0);
    }

    #[test]
    fn target_and_deviation_topics_store_their_kind() {
        let (dispatcher, store, _) = fixture();
        dispatcher.dispatch("T/soll", "25");
        dispatcher.dispatch("T/diff", "-1.5");

        let target = store.latest_by_kind(TemperatureKind::Target).unwrap().unwrap();
        assert_eq!(target.record.target(), Some(25.0));
        let deviation = store.latest_by_kind(TemperatureKind::Deviation).unwrap().unwrap();
        assert_eq!(deviation.record.deviation(), Some(-1.5));
    }

    #[test]
    fn synthetic_topic_expands_into_status_and_three_readings() {
        let (dispatcher, store, counter) = fixture();
        let report = dispatcher.dispatch("Random/Integer", "100");

        assert!(report.is_clean());
        assert_eq!(report.statuses.len(), 1);
        assert_eq!(report.statuses[0].record.status_code(), 100);

        let values: Vec<(TemperatureKind, f64)> = report
            .readings
            .iter()
            .map(|s| (s.record.kind(), s.record.value()))
            .collect();
        assert_eq!(
            values,
            vec![
                (TemperatureKind::Actual, 30.0),
                (TemperatureKind::Target, 25.0),
                (TemperatureKind::Deviation, 5.0),
            ]
        );
        assert_eq!(store.count_statuses().unwrap(), 1);
        assert_eq!(store.count_readings().unwrap(), 3);
        assert_eq!(counter.get("Random/Integer"), 1);
    }

    #[test]
    fn synthetic_topic_accepts_bracketed_status() {
        let (dispatcher, store, _) = fixture();
        let report = dispatcher.dispatch("Random/Integer", "[50]");

        assert_eq!(report.persisted(), 4);
        let actual = store.latest_by_kind(TemperatureKind::Actual).unwrap().unwrap();
        assert_eq!(actual.record.value(), 25.0);
        let deviation = store.latest_by_kind(TemperatureKind::Deviation).unwrap().unwrap();
        assert_eq!(deviation.record.value(), 0.0);
    }

    #[test]
    fn malformed_synthetic_payload_stores_nothing() {
        let (dispatcher, store, counter) = fixture();
        for payload in ["abc", "12.5", ""] {
            let report = dispatcher.dispatch("Random/Integer", payload);
            assert_eq!(report.persisted(), 0, "payload {payload:?}");
            assert_eq!(report.errors.len(), 1);
        }
        assert_eq!(total_records(&store), 0);
        assert_eq!(counter.get("Random/Integer"), 3);
    }

    #[test]
    fn unknown_topic_stores_nothing_but_is_counted() {
        let (dispatcher, store, counter) = fixture();
        let report = dispatcher.dispatch("Unknown/Topic", "test");

        assert_eq!(report.route, None);
        assert_eq!(report.errors, vec![BridgeError::UnknownTopic("Unknown/Topic".into())]);
        assert_eq!(total_records(&store), 0);
        assert_eq!(counter.get("Unknown/Topic"), 1);
        assert_eq!(counter.total(), 1);
    }

    #[test]
    fn malformed_payload_is_counted_and_dropped() {
        let (dispatcher, store, counter) = fixture();
        let report = dispatcher.dispatch("T/status", "on");
        assert_eq!(
            report.errors,
            vec![BridgeError::Format {
                kind: PayloadKind::Status,
                raw: "on".to_string()
            }]
        );

        let report = dispatcher.dispatch("T/ist", "warm");
        assert_eq!(report.persisted(), 0);

        assert_eq!(total_records(&store), 0);
        assert_eq!(counter.get("T/status"), 1);
        assert_eq!(counter.get("T/ist"), 1);
    }

    #[test]
    fn non_finite_temperature_is_a_format_error() {
        let (dispatcher, store, counter) = fixture();
        for payload in ["NaN", "inf", "-infinity"] {
            let report = dispatcher.dispatch("T/ist", payload);
            assert_eq!(
                report.errors,
                vec![BridgeError::Format {
                    kind: PayloadKind::Temperature,
                    raw: payload.to_string()
                }],
                "payload {payload:?}"
            );
            assert_eq!(report.persisted(), 0);
        }
        assert_eq!(total_records(&store), 0);
        assert_eq!(counter.get("T/ist"), 3);
    }

    #[test]
    fn unbound_slots_do_not_match() {
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let counter = Arc::new(TopicCounter::new());
        let binding = TopicBinding {
            synthetic_test: None,
            ..TopicBinding::default()
        };
        let dispatcher = Dispatcher::new(
            TopicTable::from_binding(&binding).unwrap(),
            store.clone(),
            counter.clone(),
        );

        let report = dispatcher.dispatch("Random/Integer", "100");
        assert_eq!(report.route, None);
        assert_eq!(total_records(&store), 0);
    }

    /// Rejects status writes, accepts readings.
    struct StatusOutage {
        inner: SqliteRecordStore,
    }

    impl RecordStore for StatusOutage {
        fn save_reading(
            &self,
            reading: TemperatureReading,
        ) -> Result<Stored<TemperatureReading>, StoreError> {
            self.inner.save_reading(reading)
        }
        fn save_status(&self, _: DeviceStatus) -> Result<Stored<DeviceStatus>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn latest_by_kind(
            &self,
            kind: TemperatureKind,
        ) -> Result<Option<Stored<TemperatureReading>>, StoreError> {
            self.inner.latest_by_kind(kind)
        }
        fn all_by_kind(
            &self,
            kind: TemperatureKind,
        ) -> Result<Vec<Stored<TemperatureReading>>, StoreError> {
            self.inner.all_by_kind(kind)
        }
        fn latest_status(&self) -> Result<Option<Stored<DeviceStatus>>, StoreError> {
            self.inner.latest_status()
        }
        fn count_readings(&self) -> Result<u64, StoreError> {
            self.inner.count_readings()
        }
        fn count_statuses(&self) -> Result<u64, StoreError> {
            self.inner.count_statuses()
        }
    }

    #[test]
    fn store_failure_is_reported_not_fabricated() {
        let store = Arc::new(StatusOutage {
            inner: SqliteRecordStore::open_in_memory().unwrap(),
        });
        let counter = Arc::new(TopicCounter::new());
        let dispatcher = Dispatcher::new(
            TopicTable::from_binding(&binding()).unwrap(),
            store.clone(),
            counter.clone(),
        );

        let report = dispatcher.dispatch("T/status", "1");
        assert!(report.statuses.is_empty());
        assert!(matches!(report.errors.as_slice(), [BridgeError::Store(_)]));
        assert_eq!(counter.get("T/status"), 1);
    }

    #[test]
    fn synthetic_readings_survive_a_failed_status_write() {
        let store = Arc::new(StatusOutage {
            inner: SqliteRecordStore::open_in_memory().unwrap(),
        });
        let dispatcher = Dispatcher::new(
            TopicTable::from_binding(&binding()).unwrap(),
            store.clone(),
            Arc::new(TopicCounter::new()),
        );

        let report = dispatcher.dispatch("Random/Integer", "100");
        assert!(report.statuses.is_empty());
        assert_eq!(report.readings.len(), 3);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn concurrent_dispatches_share_store_and_counter() {
        let (dispatcher, store, counter) = fixture();
        let dispatcher = Arc::new(dispatcher);
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || dispatcher.dispatch("T/ist", &format!("{i}.5")))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_clean());
        }
        assert_eq!(store.all_by_kind(TemperatureKind::Actual).unwrap().len(), 10);
        assert_eq!(counter.get("T/ist"), 10);
    }
}
