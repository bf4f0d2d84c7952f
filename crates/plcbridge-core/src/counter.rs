//! Per-topic ingestion counting.
//!
//! The dispatcher counts every inbound message exactly once, tagged by its
//! topic, before it knows whether the message is usable.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Sink for the per-message counter.  Must tolerate concurrent increments.
pub trait IngestionCounter: Send + Sync {
    fn increment(&self, topic: &str);
}

/// In-process [`IngestionCounter`] keyed by topic.
#[derive(Debug, Default)]
pub struct TopicCounter {
    counts: Mutex<HashMap<String, u64>>,
}

impl TopicCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages counted for `topic` so far.
    pub fn get(&self, topic: &str) -> u64 {
        self.counts().get(topic).copied().unwrap_or(0)
    }

    /// Messages counted across all topics.
    pub fn total(&self) -> u64 {
        self.counts().values().sum()
    }

    // A panic while holding the lock cannot leave a count half-written.
    fn counts(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IngestionCounter for TopicCounter {
    fn increment(&self, topic: &str) {
        *self.counts().entry(topic.to_string()).or_insert(0) += 1;
    }
}
