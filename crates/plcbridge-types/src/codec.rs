//! Binary Status Codec.
//!
//! Controllers report their state as a plain integer; consumers that render
//! lamp panels want the same value as a two-byte, big-endian word.  The
//! encoding keeps only the low 16 bits, exactly like the bit shifts the
//! controller firmware uses, so out-of-range codes truncate instead of
//! failing.

/// Encode `code` as a big-endian two-byte word (`[high, low]`).
///
/// Bits above the low 16 are discarded.
///
/// ```
/// use plcbridge_types::codec::encode_status;
///
/// assert_eq!(encode_status(42), [0x00, 0x2A]);
/// assert_eq!(encode_status(0x1234), [0x12, 0x34]);
/// ```
pub fn encode_status(code: i32) -> [u8; 2] {
    [((code >> 8) & 0xFF) as u8, (code & 0xFF) as u8]
}

/// Inverse of [`encode_status`] for codes in `[0, 65535]`.
pub fn decode_status(bytes: [u8; 2]) -> i32 {
    i32::from(u16::from_be_bytes(bytes))
}
