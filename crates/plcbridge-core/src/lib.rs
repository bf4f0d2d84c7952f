//! `plcbridge-core` – the behaviour of the bridge.
//!
//! Turns inbound `(topic, payload)` pairs into stored records, answers
//! queries over those records, and turns validated control requests back into
//! bus messages.
//!
//! # Modules
//!
//! - [`topics`] – [`TopicBinding`] (configuration) and the immutable
//!   [`TopicTable`] resolved from it once at startup.
//! - [`decoder`] – strict text → record decoding for status and temperature
//!   payloads.
//! - [`counter`] – the [`IngestionCounter`] seam and the in-process
//!   [`TopicCounter`].
//! - [`dispatcher`] – [`Dispatcher`]: classify, decode, persist, count.
//!   Owns the synthetic test-topic expansion.
//! - [`ingest`] – [`run_ingest`], the bounded loop feeding the inbound queue
//!   to the dispatcher.
//! - [`query`] – [`QueryService`], read-side pass-through over the store.
//! - [`command`] – [`CommandPublisher`], range-checked control commands to
//!   [`CONTROL_TOPIC`].
//! - [`health`] – [`HealthService`], store connectivity and counts.

pub mod command;
pub mod counter;
pub mod decoder;
pub mod dispatcher;
pub mod health;
pub mod ingest;
pub mod query;
pub mod topics;

pub use command::{CONTROL_TOPIC, CommandPublisher};
pub use counter::{IngestionCounter, TopicCounter};
pub use decoder::{decode_status, decode_temperature};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use health::{DatabaseState, HealthService, HealthSnapshot};
pub use ingest::{DEFAULT_MAX_IN_FLIGHT, run_ingest};
pub use query::QueryService;
pub use topics::{DEFAULT_SYNTHETIC_TOPIC, TopicBinding, TopicKind, TopicTable, TopicTableError};
