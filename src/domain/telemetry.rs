//! Telemetry Decoder
//!
//! Maps raw notification payloads to [`TelemetrySample`]s. Every decoder is
//! total: a payload that is too short or carries the wrong tag yields `None`.

use crate::domain::models::TelemetrySample;

/// Vendor opcode prefix of a grade-lock message.
pub const GRADE_LOCK_OPCODE: [u8; 2] = [0xFD, 0x33];

/// Which decoder a characteristic's payloads go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Gears,
    Power,
    GradeLock,
}

/// Decode a payload according to its kind.
pub fn decode(kind: PayloadKind, data: &[u8]) -> Option<TelemetrySample> {
    match kind {
        PayloadKind::Gears => decode_gears(data),
        PayloadKind::Power => decode_power(data),
        PayloadKind::GradeLock => decode_grade_lock(data),
    }
}

/// Gear position payload
///
/// ```text
/// [0-1] : Flags (unused)
/// [2]   : Front gear index, 0-based
/// [3]   : Rear gear index, 0-based
/// [4]   : Front gear count
/// [5]   : Rear gear count
/// ```
pub fn decode_gears(data: &[u8]) -> Option<TelemetrySample> {
    if data.len() <= 5 {
        return None;
    }

    Some(TelemetrySample::GearPosition {
        front: u16::from(data[2]) + 1,
        rear: u16::from(data[3]) + 1,
        front_gear_count: data[4],
        rear_gear_count: data[5],
    })
}

/// Cycling Power Measurement: 16-bit flags, then instantaneous power (u16 LE).
pub fn decode_power(data: &[u8]) -> Option<TelemetrySample> {
    if data.len() < 4 {
        return None;
    }

    Some(TelemetrySample::PowerWatts {
        watts: u16::from_le_bytes([data[2], data[3]]),
    })
}

/// Grade-lock message: exactly `FD 33 <state>`, state `01` meaning locked.
pub fn decode_grade_lock(data: &[u8]) -> Option<TelemetrySample> {
    match data {
        [op0, op1, state] if [*op0, *op1] == GRADE_LOCK_OPCODE => {
            Some(TelemetrySample::GradeLock {
                locked: *state == 0x01,
            })
        }
        _ => None,
    }
}
