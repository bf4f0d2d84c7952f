//! Topic binding and the resolved routing table.
//!
//! [`TopicBinding`] is what configuration supplies: one optional topic string
//! per semantic slot.  [`TopicTable`] is built from it once and then only
//! read, so dispatch is a single hash lookup followed by a `match` on
//! [`TopicKind`].

use std::collections::HashMap;
use std::fmt;

use plcbridge_types::TemperatureKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Topic that triggers synthetic test data when nothing else is configured.
pub const DEFAULT_SYNTHETIC_TOPIC: &str = "Random/Integer";

/// What an inbound topic means to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Controller status word.
    DeviceStatus,
    /// One of the three temperature streams.
    Temperature(TemperatureKind),
    /// Test feed that fabricates status and temperature records.
    SyntheticTest,
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicKind::DeviceStatus => f.write_str("device-status"),
            TopicKind::Temperature(TemperatureKind::Actual) => f.write_str("temperature-actual"),
            TopicKind::Temperature(TemperatureKind::Target) => f.write_str("temperature-target"),
            TopicKind::Temperature(TemperatureKind::Deviation) => {
                f.write_str("temperature-deviation")
            }
            TopicKind::SyntheticTest => f.write_str("synthetic-test"),
        }
    }
}

/// Configuration-time mapping from semantic slot to transport topic.
///
/// A slot left as `None` (or set to an empty string) never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBinding {
    #[serde(default)]
    pub device_status: Option<String>,
    #[serde(default)]
    pub temperature_actual: Option<String>,
    #[serde(default)]
    pub temperature_target: Option<String>,
    #[serde(default)]
    pub temperature_deviation: Option<String>,
    #[serde(default = "default_synthetic_test")]
    pub synthetic_test: Option<String>,
}

fn default_synthetic_test() -> Option<String> {
    Some(DEFAULT_SYNTHETIC_TOPIC.to_string())
}

impl Default for TopicBinding {
    fn default() -> Self {
        Self {
            device_status: None,
            temperature_actual: None,
            temperature_target: None,
            temperature_deviation: None,
            synthetic_test: default_synthetic_test(),
        }
    }
}

impl TopicBinding {
    /// The topic names used by the plant's WAGO 750 and S7-1500 programs.
    pub fn plant_defaults() -> Self {
        Self {
            device_status: Some("Wago750/Status".to_string()),
            temperature_actual: Some("S7_1500/Temperatur/Ist".to_string()),
            temperature_target: Some("S7_1500/Temperatur/Soll".to_string()),
            temperature_deviation: Some("S7_1500/Temperatur/Differenz".to_string()),
            synthetic_test: default_synthetic_test(),
        }
    }

    fn slots(&self) -> [(&Option<String>, TopicKind); 5] {
        [
            (&self.device_status, TopicKind::DeviceStatus),
            (
                &self.temperature_actual,
                TopicKind::Temperature(TemperatureKind::Actual),
            ),
            (
                &self.temperature_target,
                TopicKind::Temperature(TemperatureKind::Target),
            ),
            (
                &self.temperature_deviation,
                TopicKind::Temperature(TemperatureKind::Deviation),
            ),
            (&self.synthetic_test, TopicKind::SyntheticTest),
        ]
    }
}

/// Raised when a binding cannot be turned into an unambiguous table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicTableError {
    #[error("topic {topic:?} is bound to both {first} and {second}")]
    DuplicateTopic {
        topic: String,
        first: TopicKind,
        second: TopicKind,
    },
}

/// Immutable exact-match routing table.
#[derive(Debug, Clone, Default)]
pub struct TopicTable {
    routes: HashMap<String, TopicKind>,
}

impl TopicTable {
    /// Resolve `binding` into a table.
    ///
    /// # Errors
    ///
    /// [`TopicTableError::DuplicateTopic`] when two slots name the same
    /// topic, since a message on it could not be routed unambiguously.
    pub fn from_binding(binding: &TopicBinding) -> Result<Self, TopicTableError> {
        let mut routes = HashMap::new();
        for (topic, kind) in binding.slots() {
            let Some(topic) = topic.as_deref().filter(|t| !t.is_empty()) else {
                continue;
            };
            if let Some(first) = routes.insert(topic.to_string(), kind) {
                return Err(TopicTableError::DuplicateTopic {
                    topic: topic.to_string(),
                    first,
                    second: kind,
                });
            }
        }
        Ok(Self { routes })
    }

    /// The [`TopicKind`] bound to `topic`, if any.  Matching is exact and
    /// case-sensitive.
    pub fn resolve(&self, topic: &str) -> Option<TopicKind> {
        self.routes.get(topic).copied()
    }

    /// Every bound topic, sorted, e.g. for building a subscription list.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.routes.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
