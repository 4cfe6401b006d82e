//! KICKR Bike Protocol
//!
//! GATT identifiers exposed by the bike and the services this crate reads.

use crate::domain::settings::ScanSettings;
use crate::domain::telemetry::PayloadKind;
use uuid::Uuid;

/// Bluetooth base UUID, `00000000-0000-1000-8000-00805F9B34FB`.
pub const BLUETOOTH_BASE_UUID: Uuid = Uuid::from_u128(0x00000000_0000_1000_8000_00805F9B34FB);

/// BikeInfo service (vendor)
pub const BIKE_INFO_SERVICE_UUID: Uuid = Uuid::from_u128(0xA026EE0D_0A7D_4AB3_97FA_F1500F9FEB8B);
/// Gear position characteristic, inside BikeInfo
pub const GEARS_CHAR_UUID: Uuid = Uuid::from_u128(0xA026E03A_0A7D_4AB3_97FA_F1500F9FEB8B);
/// Handlebar button status characteristic, inside BikeInfo. Not subscribed.
pub const BUTTON_STATUS_CHAR_UUID: Uuid = Uuid::from_u128(0xA026E03C_0A7D_4AB3_97FA_F1500F9FEB8B);

/// Grade service (vendor)
pub const GRADE_SERVICE_UUID: Uuid = Uuid::from_u128(0xA026EE0B_0A7D_4AB3_97FA_F1500F9FEB8B);
/// Grade / lock characteristic, inside the Grade service
pub const GRADE_CHAR_UUID: Uuid = Uuid::from_u128(0xA026E037_0A7D_4AB3_97FA_F1500F9FEB8B);

/// SIG assigned 16-bit service numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SigService {
    DeviceInformation = 0x180A,
    HeartRate = 0x180D,
    UserData = 0x181C,
    CyclingPower = 0x1818,
    FitnessMachine = 0x1826,
}

impl SigService {
    pub fn uuid(self) -> Uuid {
        sig_uuid(self as u16)
    }
}

/// Cycling Power Measurement characteristic number
pub const CYCLING_POWER_MEASUREMENT: u16 = 0x2A63;

/// Embed a 16-bit SIG number into the base UUID.
///
/// Works on the GUID byte layout: byte 0 takes the low byte, byte 1 the high byte.
pub fn sig_uuid(number: u16) -> Uuid {
    let mut bytes = BLUETOOTH_BASE_UUID.to_bytes_le();
    bytes[0] = (number & 0xFF) as u8;
    bytes[1] = (number >> 8) as u8;
    Uuid::from_bytes_le(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceRole {
    BikeInfo,
    Grade,
    /// Deprecated; only resolved when explicitly enabled.
    CyclingPower,
}

/// A service of interest and the one characteristic read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub role: ServiceRole,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub payload: PayloadKind,
}

impl ServiceDescriptor {
    pub fn bike_info() -> Self {
        Self {
            role: ServiceRole::BikeInfo,
            service_uuid: BIKE_INFO_SERVICE_UUID,
            characteristic_uuid: GEARS_CHAR_UUID,
            payload: PayloadKind::Gears,
        }
    }

    pub fn grade() -> Self {
        Self {
            role: ServiceRole::Grade,
            service_uuid: GRADE_SERVICE_UUID,
            characteristic_uuid: GRADE_CHAR_UUID,
            payload: PayloadKind::GradeLock,
        }
    }

    pub fn cycling_power() -> Self {
        Self {
            role: ServiceRole::CyclingPower,
            service_uuid: SigService::CyclingPower.uuid(),
            characteristic_uuid: sig_uuid(CYCLING_POWER_MEASUREMENT),
            payload: PayloadKind::Power,
        }
    }

    /// The descriptors a session resolves, in resolution order.
    pub fn for_settings(settings: &ScanSettings) -> Vec<Self> {
        let mut services = vec![Self::bike_info()];
        if settings.grade_enabled {
            services.push(Self::grade());
        }
        if settings.cycling_power_enabled {
            services.push(Self::cycling_power());
        }
        services
    }
}
