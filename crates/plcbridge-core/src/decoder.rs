//! Payload decoding.
//!
//! Payloads arrive as text.  Status payloads are base-10 integers that some
//! controller programs wrap in `[` `]`; temperature payloads are plain
//! finite floating-point literals.  Decoding either succeeds and yields a freshly
//! stamped record, or returns [`BridgeError::Format`] naming the raw payload.

use plcbridge_types::{BridgeError, DeviceStatus, PayloadKind, TemperatureKind, TemperatureReading};

/// Decode a status payload.
///
/// Surrounding whitespace is trimmed and every `[` / `]` in the remainder is
/// removed before parsing, so `"42"`, `" 42 "` and `"[42]"` are equivalent.
///
/// ```
/// use plcbridge_core::decode_status;
///
/// assert_eq!(decode_status("[42]").unwrap().status_code(), 42);
/// assert!(decode_status("forty-two").is_err());
/// ```
pub fn decode_status(raw: &str) -> Result<DeviceStatus, BridgeError> {
    let cleaned: String = raw.trim().chars().filter(|c| !matches!(c, '[' | ']')).collect();
    let code = cleaned
        .parse::<i32>()
        .map_err(|_| format_error(PayloadKind::Status, raw))?;
    Ok(DeviceStatus::new(code))
}

/// Decode a temperature payload as a reading of `kind`.
///
/// `inf`, `infinity` and `NaN` parse as `f64` but are not temperatures; they
/// are rejected like any other malformed payload.
pub fn decode_temperature(
    raw: &str,
    kind: TemperatureKind,
) -> Result<TemperatureReading, BridgeError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| format_error(PayloadKind::Temperature, raw))?;
    if !value.is_finite() {
        return Err(format_error(PayloadKind::Temperature, raw));
    }
    Ok(TemperatureReading::new(value, kind))
}

fn format_error(kind: PayloadKind, raw: &str) -> BridgeError {
    BridgeError::Format {
        kind,
        raw: raw.to_string(),
    }
}
