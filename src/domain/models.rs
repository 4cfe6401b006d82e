use serde::{Deserialize, Serialize};
use std::fmt;

/// 48-bit Bluetooth hardware address, as reported by the advertisement watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress(u64);

impl DeviceAddress {
    const MASK: u64 = 0xFFFF_FFFF_FFFF;

    pub fn new(raw: u64) -> Self {
        Self(raw & Self::MASK)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeviceAddress {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// One received advertisement. Consumed once by the discovery controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementEvent {
    pub address: DeviceAddress,
    /// Empty when the advertisement carried no local name.
    pub local_name: String,
}

impl AdvertisementEvent {
    pub fn new(address: impl Into<DeviceAddress>, local_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            local_name: local_name.into(),
        }
    }
}

/// A decoded telemetry value, forwarded straight to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetrySample {
    GearPosition {
        /// 1-based front chainring index
        front: u16,
        /// 1-based rear cog index
        rear: u16,
        front_gear_count: u8,
        rear_gear_count: u8,
    },
    PowerWatts {
        watts: u16,
    },
    GradeLock {
        locked: bool,
    },
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GearPosition { front, rear, .. } => write!(f, "{} - {}", front, rear),
            Self::PowerWatts { watts } => write!(f, "{}", watts),
            Self::GradeLock { locked: true } => f.write_str("Locked"),
            Self::GradeLock { locked: false } => f.write_str("Unlocked"),
        }
    }
}

/// Events delivered from the bluetooth side to whoever presents them.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Status(StatusMessage),
    Sample(TelemetrySample),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Warning,
}

/// How a scan session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Found,
    TimedOut,
    /// The closing latch was set before either of the above.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_mask() {
        let address = DeviceAddress::new(0xFFFF_E3A1_0B2C_4D5E);
        assert_eq!(address.as_u64(), 0xE3A1_0B2C_4D5E);
        assert_eq!(address.to_string(), "E3:A1:0B:2C:4D:5E");
    }

    #[test]
    fn test_sample_display() {
        let gears = TelemetrySample::GearPosition {
            front: 2,
            rear: 7,
            front_gear_count: 2,
            rear_gear_count: 12,
        };
        assert_eq!(gears.to_string(), "2 - 7");
        assert_eq!(TelemetrySample::PowerWatts { watts: 250 }.to_string(), "250");
        assert_eq!(
            TelemetrySample::GradeLock { locked: true }.to_string(),
            "Locked"
        );
    }
}
