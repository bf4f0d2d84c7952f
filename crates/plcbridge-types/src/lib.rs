//! `plcbridge-types` – the shared record model.
//!
//! Every other crate in the workspace speaks in these types: the decoder
//! produces them, the store persists them, the API serializes them.
//!
//! # Modules
//!
//! - [`codec`] – integer ⇄ two-byte big-endian status encoding.

pub mod codec;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// TemperatureKind
// ─────────────────────────────────────────────────────────────────────────────

/// Which of the three temperature slots a reading fills.
///
/// The serialized names (`IST`, `SOLL`, `DIFFERENZ`) are the ones the
/// controller programs and the existing dashboards use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemperatureKind {
    /// Measured temperature.
    #[serde(rename = "IST")]
    Actual,
    /// Set point.
    #[serde(rename = "SOLL")]
    Target,
    /// Difference between set point and measurement.
    #[serde(rename = "DIFFERENZ")]
    Deviation,
}

impl TemperatureKind {
    /// All kinds, in slot order.
    pub const ALL: [TemperatureKind; 3] = [Self::Actual, Self::Target, Self::Deviation];

    /// Stable storage/wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureKind::Actual => "IST",
            TemperatureKind::Target => "SOLL",
            TemperatureKind::Deviation => "DIFFERENZ",
        }
    }
}

impl fmt::Display for TemperatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemperatureKind {
    type Err = BridgeError;

    /// Case-insensitive; accepts the wire codes and the English names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ist" | "actual" => Ok(TemperatureKind::Actual),
            "soll" | "target" => Ok(TemperatureKind::Target),
            "differenz" | "deviation" => Ok(TemperatureKind::Deviation),
            _ => Err(BridgeError::UnknownKind(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TemperatureReading
// ─────────────────────────────────────────────────────────────────────────────

/// One temperature value of one [`TemperatureKind`].
///
/// Logically a tagged union over the actual/target/deviation slots: exactly
/// one slot is populated and [`kind`](Self::kind) says which.  The fields are
/// private so a reading cannot change after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ReadingSlots", try_from = "ReadingSlots")]
pub struct TemperatureReading {
    value: f64,
    kind: TemperatureKind,
    created_at: DateTime<Utc>,
}

impl TemperatureReading {
    /// Construct a reading stamped with the current UTC time.
    pub fn new(value: f64, kind: TemperatureKind) -> Self {
        Self::restore(value, kind, Utc::now())
    }

    /// Rebuild a reading with a known creation time (used when loading from
    /// a store).
    pub fn restore(value: f64, kind: TemperatureKind, created_at: DateTime<Utc>) -> Self {
        Self {
            value,
            kind,
            created_at,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn kind(&self) -> TemperatureKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The value if this is an [`TemperatureKind::Actual`] reading.
    pub fn actual(&self) -> Option<f64> {
        self.slot(TemperatureKind::Actual)
    }

    /// The value if this is a [`TemperatureKind::Target`] reading.
    pub fn target(&self) -> Option<f64> {
        self.slot(TemperatureKind::Target)
    }

    /// The value if this is a [`TemperatureKind::Deviation`] reading.
    pub fn deviation(&self) -> Option<f64> {
        self.slot(TemperatureKind::Deviation)
    }

    fn slot(&self, kind: TemperatureKind) -> Option<f64> {
        (self.kind == kind).then_some(self.value)
    }
}

/// Wire shape of a reading: all three slots present, inactive ones `null`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingSlots {
    actual_temperature: Option<f64>,
    target_temperature: Option<f64>,
    deviation_temperature: Option<f64>,
    kind: TemperatureKind,
    created_at: DateTime<Utc>,
}

impl From<TemperatureReading> for ReadingSlots {
    fn from(reading: TemperatureReading) -> Self {
        Self {
            actual_temperature: reading.actual(),
            target_temperature: reading.target(),
            deviation_temperature: reading.deviation(),
            kind: reading.kind,
            created_at: reading.created_at,
        }
    }
}

impl TryFrom<ReadingSlots> for TemperatureReading {
    type Error = String;

    fn try_from(slots: ReadingSlots) -> Result<Self, Self::Error> {
        let (active, others) = match slots.kind {
            TemperatureKind::Actual => (
                slots.actual_temperature,
                [slots.target_temperature, slots.deviation_temperature],
            ),
            TemperatureKind::Target => (
                slots.target_temperature,
                [slots.actual_temperature, slots.deviation_temperature],
            ),
            TemperatureKind::Deviation => (
                slots.deviation_temperature,
                [slots.actual_temperature, slots.target_temperature],
            ),
        };
        if others.iter().any(Option::is_some) {
            return Err(format!("{} reading has more than one slot set", slots.kind));
        }
        let value = active.ok_or_else(|| format!("{} reading has no value", slots.kind))?;
        Ok(Self::restore(value, slots.kind, slots.created_at))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DeviceStatus
// ─────────────────────────────────────────────────────────────────────────────

/// Status word reported by the controller.
///
/// `binary` is derived from `status_code` at construction via
/// [`codec::encode_status`] and is never set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StatusWire", from = "StatusWire")]
pub struct DeviceStatus {
    status_code: i32,
    binary: [u8; 2],
    created_at: DateTime<Utc>,
}

impl DeviceStatus {
    /// Construct a status stamped with the current UTC time.
    pub fn new(status_code: i32) -> Self {
        Self::restore(status_code, Utc::now())
    }

    /// Rebuild a status with a known creation time.
    pub fn restore(status_code: i32, created_at: DateTime<Utc>) -> Self {
        Self {
            status_code,
            binary: codec::encode_status(status_code),
            created_at,
        }
    }

    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    /// Big-endian two-byte encoding of the status code.
    pub fn binary(&self) -> [u8; 2] {
        self.binary
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusWire {
    status: i32,
    #[serde(default)]
    status_binary: [u8; 2],
    created_at: DateTime<Utc>,
}

impl From<DeviceStatus> for StatusWire {
    fn from(status: DeviceStatus) -> Self {
        Self {
            status: status.status_code,
            status_binary: status.binary,
            created_at: status.created_at,
        }
    }
}

impl From<StatusWire> for DeviceStatus {
    // The binary form is always re-derived; a stale `statusBinary` on the
    // wire is ignored.
    fn from(wire: StatusWire) -> Self {
        DeviceStatus::restore(wire.status, wire.created_at)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stored<T>
// ─────────────────────────────────────────────────────────────────────────────

/// A record together with the id the store assigned to it on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: T,
}

impl<T> Stored<T> {
    pub fn new(id: Uuid, record: T) -> Self {
        Self { id, record }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlCommand
// ─────────────────────────────────────────────────────────────────────────────

/// Smallest accepted control code.
pub const MIN_COMMAND: i64 = 0;
/// Largest accepted control code.
pub const MAX_COMMAND: i64 = 3;

/// A validated control code in `[0, 3]`.
///
/// Only constructible through [`ControlCommand::new`], so holding one proves
/// the range check already happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ControlCommand {
    code: u8,
}

impl ControlCommand {
    /// Validate `code`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::CommandOutOfRange`] when `code` is outside `[0, 3]`.
    pub fn new(code: i64) -> Result<Self, BridgeError> {
        if !(MIN_COMMAND..=MAX_COMMAND).contains(&code) {
            return Err(BridgeError::CommandOutOfRange { code });
        }
        Ok(Self { code: code as u8 })
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// Decimal string sent as the bus payload.
    pub fn payload(&self) -> String {
        self.code.to_string()
    }
}

impl TryFrom<i64> for ControlCommand {
    type Error = BridgeError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// What a payload was expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Status,
    Temperature,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Status => f.write_str("status"),
            PayloadKind::Temperature => f.write_str("temperature"),
        }
    }
}

/// Errors shared across the bridge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Invalid {kind} format: {raw}")]
    Format { kind: PayloadKind, raw: String },

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Unknown temperature kind: {0}")]
    UnknownKind(String),

    #[error("Command must be between 0 and 3")]
    CommandOutOfRange { code: i64 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_populates_only_its_own_slot() {
        let actual = TemperatureReading::new(23.5, TemperatureKind::Actual);
        assert_eq!(actual.actual(), Some(23.5));
        assert_eq!(actual.target(), None);
        assert_eq!(actual.deviation(), None);

        let target = TemperatureReading::new(25.0, TemperatureKind::Target);
        assert_eq!(target.actual(), None);
        assert_eq!(target.target(), Some(25.0));
        assert_eq!(target.deviation(), None);

        let deviation = TemperatureReading::new(-1.5, TemperatureKind::Deviation);
        assert_eq!(deviation.actual(), None);
        assert_eq!(deviation.target(), None);
        assert_eq!(deviation.deviation(), Some(-1.5));
    }

    #[test]
    fn reading_serializes_inactive_slots_as_null() {
        let reading = TemperatureReading::new(23.5, TemperatureKind::Actual);
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["actualTemperature"], 23.5);
        assert!(json["targetTemperature"].is_null());
        assert!(json["deviationTemperature"].is_null());
        assert_eq!(json["kind"], "IST");
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn reading_json_roundtrip_preserves_kind_and_time() {
        let reading = TemperatureReading::new(-4.0, TemperatureKind::Deviation);
        let json = serde_json::to_string(&reading).unwrap();
        let back: TemperatureReading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn reading_with_two_slots_is_rejected() {
        let json = r#"{
            "actualTemperature": 1.0,
            "targetTemperature": 2.0,
            "deviationTemperature": null,
            "kind": "IST",
            "createdAt": "2024-01-01T00:00:00Z"
        }"#;
        assert!(serde_json::from_str::<TemperatureReading>(json).is_err());
    }

    #[test]
    fn status_derives_binary_on_construction() {
        let status = DeviceStatus::new(42);
        assert_eq!(status.status_code(), 42);
        assert_eq!(status.binary(), [0, 42]);

        let status = DeviceStatus::new(0x0102);
        assert_eq!(status.binary(), [1, 2]);
    }

    #[test]
    fn status_ignores_stale_binary_on_the_wire() {
        let json = r#"{"status": 7, "statusBinary": [9, 9], "createdAt": "2024-01-01T00:00:00Z"}"#;
        let status: DeviceStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.binary(), [0, 7]);
    }

    #[test]
    fn stored_flattens_record_fields() {
        let id = Uuid::new_v4();
        let stored = Stored::new(id, DeviceStatus::new(5));
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["status"], 5);
        assert_eq!(json["statusBinary"], serde_json::json!([0, 5]));
    }

    #[test]
    fn control_command_accepts_zero_through_three() {
        for code in 0..=3 {
            let cmd = ControlCommand::new(code).unwrap();
            assert_eq!(i64::from(cmd.code()), code);
            assert_eq!(cmd.payload(), code.to_string());
        }
    }

    #[test]
    fn control_command_rejects_out_of_range() {
        for code in [-1, 4, i64::MIN, i64::MAX] {
            let err = ControlCommand::new(code).unwrap_err();
            assert_eq!(err.to_string(), "Command must be between 0 and 3");
        }
    }

    #[test]
    fn kind_parses_wire_and_english_names() {
        assert_eq!("ist".parse::<TemperatureKind>().unwrap(), TemperatureKind::Actual);
        assert_eq!("SOLL".parse::<TemperatureKind>().unwrap(), TemperatureKind::Target);
        assert_eq!(
            "deviation".parse::<TemperatureKind>().unwrap(),
            TemperatureKind::Deviation
        );
        assert!("lukewarm".parse::<TemperatureKind>().is_err());
    }

    #[test]
    fn format_error_names_the_payload() {
        let err = BridgeError::Format {
            kind: PayloadKind::Status,
            raw: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid status format: abc");
    }
}
