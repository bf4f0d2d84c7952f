//! `plcbridge-store` – persistence for decoded records.
//!
//! # Modules
//!
//! - [`record_store`] – the [`RecordStore`] contract every backend
//!   satisfies, and [`StoreError`].
//! - [`sqlite`] – [`SqliteRecordStore`], the local SQLite backend.

pub mod record_store;
pub mod sqlite;

pub use record_store::{RecordStore, StoreError};
pub use sqlite::SqliteRecordStore;
