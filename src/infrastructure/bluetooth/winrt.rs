//! Windows Runtime BLE Adapter
//!
//! [`BleAdapter`] on top of `Windows.Devices.Bluetooth`.

use crate::domain::models::{AdvertisementEvent, DeviceAddress};
use crate::domain::settings::ScanMode;
use crate::infrastructure::bluetooth::adapter::{
    self, AdapterError, BleAdapter, CharacteristicProperties, SharingMode,
};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::BluetoothLEDevice;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattDeviceService, GattOpenStatus, GattSharingMode,
    GattValueChangedEventArgs,
};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, IBuffer};

pub struct WinRtWatcher {
    watcher: BluetoothLEAdvertisementWatcher,
    token: i64,
}

pub struct WinRtDevice {
    device: BluetoothLEDevice,
}

impl Drop for WinRtDevice {
    fn drop(&mut self) {
        let _ = self.device.Close();
    }
}

pub struct WinRtService {
    service: GattDeviceService,
    uuid: Uuid,
}

impl adapter::GattService for WinRtService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

pub struct WinRtCharacteristic {
    characteristic: GattCharacteristic,
    uuid: Uuid,
    properties: CharacteristicProperties,
    /// `ValueChanged` registration, present while notifications are armed.
    value_changed: Mutex<Option<i64>>,
}

impl WinRtCharacteristic {
    fn detach_handler(&self) {
        let token = self
            .value_changed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(token) = token {
            let _ = self.characteristic.RemoveValueChanged(token);
        }
    }
}

impl Drop for WinRtCharacteristic {
    fn drop(&mut self) {
        self.detach_handler();
    }
}

impl adapter::GattCharacteristic for WinRtCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn properties(&self) -> CharacteristicProperties {
        self.properties
    }
}

#[derive(Debug, Default)]
pub struct WinRtAdapter;

impl WinRtAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn to_guid(uuid: Uuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

fn from_guid(guid: GUID) -> Uuid {
    Uuid::from_u128(guid.to_u128())
}

fn read_buffer(buffer: &IBuffer) -> windows::core::Result<Vec<u8>> {
    let reader = DataReader::FromBuffer(buffer)?;
    let length = reader.UnconsumedBufferLength()? as usize;
    let mut bytes = vec![0u8; length];
    reader.ReadBytes(&mut bytes)?;
    Ok(bytes)
}

fn check(operation: &'static str, status: GattCommunicationStatus) -> Result<(), AdapterError> {
    if status == GattCommunicationStatus::Success {
        Ok(())
    } else {
        Err(AdapterError::communication(operation, status))
    }
}

#[async_trait]
impl BleAdapter for WinRtAdapter {
    type Watcher = WinRtWatcher;
    type Device = WinRtDevice;
    type Service = WinRtService;
    type Characteristic = WinRtCharacteristic;

    fn start_scan(
        &self,
        mode: ScanMode,
        events: mpsc::UnboundedSender<AdvertisementEvent>,
    ) -> Result<Self::Watcher, AdapterError> {
        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(match mode {
            ScanMode::Passive => BluetoothLEScanningMode::Passive,
            ScanMode::Active => BluetoothLEScanningMode::Active,
        })?;

        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let local_name = args.Advertisement()?.LocalName()?.to_string();
                    let address = DeviceAddress::new(args.BluetoothAddress()?);
                    let _ = events.send(AdvertisementEvent {
                        address,
                        local_name,
                    });
                }
                Ok(())
            },
        );

        let token = watcher.Received(&handler)?;
        watcher.Start()?;
        info!("Advertisement watcher started");

        Ok(WinRtWatcher { watcher, token })
    }

    fn stop_scan(&self, watcher: Self::Watcher) -> Result<(), AdapterError> {
        watcher.watcher.Stop()?;
        watcher.watcher.RemoveReceived(watcher.token)?;
        Ok(())
    }

    async fn connect(&self, address: DeviceAddress) -> Result<Self::Device, AdapterError> {
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address.as_u64())?
            .await
            .map_err(|e| {
                debug!(%address, "FromBluetoothAddressAsync failed: {}", e);
                AdapterError::DeviceNotFound(address)
            })?;
        debug!(%address, "Device connected: {:?}", device.Name()?);
        Ok(WinRtDevice { device })
    }

    async fn list_services(
        &self,
        device: &Self::Device,
    ) -> Result<Vec<Self::Service>, AdapterError> {
        let result = device.device.GetGattServicesAsync()?.await?;
        check("GetGattServicesAsync", result.Status()?)?;

        let services = result.Services()?;
        let mut out = Vec::with_capacity(services.Size()? as usize);
        for i in 0..services.Size()? {
            let service = services.GetAt(i)?;
            let uuid = from_guid(service.Uuid()?);
            out.push(WinRtService { service, uuid });
        }
        Ok(out)
    }

    async fn open_service(
        &self,
        service: &Self::Service,
        mode: SharingMode,
    ) -> Result<(), AdapterError> {
        let sharing = match mode {
            SharingMode::Exclusive => GattSharingMode::Exclusive,
            SharingMode::SharedReadOnly => GattSharingMode::SharedReadOnly,
            SharingMode::SharedReadAndWrite => GattSharingMode::SharedReadAndWrite,
        };
        match service.service.OpenAsync(sharing)?.await? {
            GattOpenStatus::Success | GattOpenStatus::AlreadyOpened => Ok(()),
            other => Err(AdapterError::communication("OpenAsync", other)),
        }
    }

    async fn list_characteristics(
        &self,
        service: &Self::Service,
        uuid: Uuid,
    ) -> Result<Vec<Self::Characteristic>, AdapterError> {
        let result = service
            .service
            .GetCharacteristicsForUuidAsync(to_guid(uuid))?
            .await?;
        check("GetCharacteristicsForUuidAsync", result.Status()?)?;

        let characteristics = result.Characteristics()?;
        let mut out = Vec::with_capacity(characteristics.Size()? as usize);
        for i in 0..characteristics.Size()? {
            let characteristic = characteristics.GetAt(i)?;
            let properties =
                CharacteristicProperties::from_bits(characteristic.CharacteristicProperties()?.0);
            out.push(WinRtCharacteristic {
                uuid: from_guid(characteristic.Uuid()?),
                characteristic,
                properties,
                value_changed: Mutex::new(None),
            });
        }
        Ok(out)
    }

    async fn read_value(
        &self,
        characteristic: &Self::Characteristic,
    ) -> Result<Vec<u8>, AdapterError> {
        let result = characteristic.characteristic.ReadValueAsync()?.await?;
        check("ReadValueAsync", result.Status()?)?;
        Ok(read_buffer(&result.Value()?)?)
    }

    async fn enable_notifications(
        &self,
        characteristic: &Self::Characteristic,
        values: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<(), AdapterError> {
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    if let Ok(bytes) = read_buffer(&args.CharacteristicValue()?) {
                        trace!("ValueChanged: {} bytes", bytes.len());
                        let _ = values.send(bytes);
                    }
                }
                Ok(())
            },
        );
        characteristic.detach_handler();
        let token = characteristic.characteristic.ValueChanged(&handler)?;
        *characteristic
            .value_changed
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(token);

        let armed: Result<(), AdapterError> = async {
            let status = characteristic
                .characteristic
                .WriteClientCharacteristicConfigurationDescriptorAsync(
                    GattClientCharacteristicConfigurationDescriptorValue::Notify,
                )?
                .await?;
            check("WriteClientCharacteristicConfigurationDescriptorAsync", status)
        }
        .await;

        if armed.is_err() {
            characteristic.detach_handler();
        }
        armed
    }
}
