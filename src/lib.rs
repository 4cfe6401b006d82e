//! KICKR Bike gear display
//!
//! Scans for a KICKR Bike over BLE, subscribes to its gear, grade and
//! (optionally) power characteristics and decodes the notifications into
//! [`TelemetrySample`](domain::models::TelemetrySample)s.

pub mod domain;
pub mod infrastructure;
