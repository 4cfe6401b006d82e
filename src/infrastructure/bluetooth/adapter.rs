//! BLE Adapter
//!
//! The platform transport as seen by the scanner and resolver. Advertisements
//! and notifications are pushed into channels handed to the adapter, so every
//! event crosses into our tasks through a queue.

use crate::domain::models::{AdvertisementEvent, DeviceAddress};
use crate::domain::settings::ScanMode;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("bluetooth adapter unavailable: {0}")]
    Unavailable(String),
    #[error("{operation} failed with status {status}")]
    Communication {
        operation: &'static str,
        status: String,
    },
    #[error("device {0} not reachable")]
    DeviceNotFound(DeviceAddress),
    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

impl AdapterError {
    pub fn communication(operation: &'static str, status: impl std::fmt::Debug) -> Self {
        Self::Communication {
            operation,
            status: format!("{:?}", status),
        }
    }
}

/// Sharing mode requested when opening a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    SharedReadOnly,
    /// Other applications may keep using the peripheral.
    SharedReadAndWrite,
}

/// GATT characteristic property bits (same values as the ATT declaration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicProperties(u32);

impl CharacteristicProperties {
    pub const NONE: Self = Self(0);
    pub const BROADCAST: Self = Self(0x01);
    pub const READ: Self = Self(0x02);
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for CharacteristicProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub trait GattService: Send + Sync {
    fn uuid(&self) -> Uuid;
}

pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Uuid;
    fn properties(&self) -> CharacteristicProperties;
}

/// Platform BLE capability consumed by discovery and resolution.
#[async_trait]
pub trait BleAdapter: Send + Sync + 'static {
    type Watcher: Send + 'static;
    type Device: Send + Sync + 'static;
    type Service: GattService + 'static;
    type Characteristic: GattCharacteristic + 'static;

    /// Start the advertisement watcher; every advertisement is sent to `events`.
    fn start_scan(
        &self,
        mode: ScanMode,
        events: mpsc::UnboundedSender<AdvertisementEvent>,
    ) -> Result<Self::Watcher, AdapterError>;

    fn stop_scan(&self, watcher: Self::Watcher) -> Result<(), AdapterError>;

    async fn connect(&self, address: DeviceAddress) -> Result<Self::Device, AdapterError>;

    async fn list_services(
        &self,
        device: &Self::Device,
    ) -> Result<Vec<Self::Service>, AdapterError>;

    async fn open_service(
        &self,
        service: &Self::Service,
        mode: SharingMode,
    ) -> Result<(), AdapterError>;

    async fn list_characteristics(
        &self,
        service: &Self::Service,
        uuid: Uuid,
    ) -> Result<Vec<Self::Characteristic>, AdapterError>;

    async fn read_value(
        &self,
        characteristic: &Self::Characteristic,
    ) -> Result<Vec<u8>, AdapterError>;

    /// Register `values` for the characteristic's notifications, then write
    /// the client characteristic configuration descriptor.
    async fn enable_notifications(
        &self,
        characteristic: &Self::Characteristic,
        values: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<(), AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_mask() {
        let props = CharacteristicProperties::READ | CharacteristicProperties::NOTIFY;
        assert!(props.contains(CharacteristicProperties::READ));
        assert!(props.contains(CharacteristicProperties::NOTIFY));
        assert!(!props.contains(CharacteristicProperties::WRITE));
        assert_eq!(props.bits(), 0x12);
    }
}
