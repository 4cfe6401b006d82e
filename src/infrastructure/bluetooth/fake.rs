//! Scripted in-memory adapter for tests.

use crate::domain::models::{AdvertisementEvent, DeviceAddress};
use crate::domain::settings::ScanMode;
use crate::infrastructure::bluetooth::adapter::{
    AdapterError, BleAdapter, CharacteristicProperties, GattCharacteristic, GattService,
    SharingMode,
};
use crate::infrastructure::bluetooth::protocol::{
    SigService, BIKE_INFO_SERVICE_UUID, BUTTON_STATUS_CHAR_UUID, GEARS_CHAR_UUID,
    GRADE_CHAR_UUID, GRADE_SERVICE_UUID,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct FakeCharacteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub value: Vec<u8>,
    pub read_fails: bool,
    pub cccd_write_fails: bool,
}

impl GattCharacteristic for FakeCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn properties(&self) -> CharacteristicProperties {
        self.properties
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeService {
    pub uuid: Uuid,
    pub characteristics: Vec<FakeCharacteristic>,
    pub open_fails: bool,
    pub lookup_fails: bool,
}

impl GattService for FakeService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    pub services: Vec<FakeService>,
    pub enumeration_fails: bool,
}

impl FakeDevice {
    /// BikeInfo (gears + buttons), Grade and Device Information.
    pub fn kickr_bike() -> Self {
        let read_notify = CharacteristicProperties::READ | CharacteristicProperties::NOTIFY;
        Self {
            services: vec![
                FakeService {
                    uuid: SigService::DeviceInformation.uuid(),
                    ..FakeService::default()
                },
                FakeService {
                    uuid: BIKE_INFO_SERVICE_UUID,
                    characteristics: vec![
                        FakeCharacteristic {
                            uuid: GEARS_CHAR_UUID,
                            properties: read_notify,
                            value: vec![0x00, 0x00, 1, 5, 2, 12],
                            ..FakeCharacteristic::default()
                        },
                        FakeCharacteristic {
                            uuid: BUTTON_STATUS_CHAR_UUID,
                            properties: CharacteristicProperties::NOTIFY,
                            ..FakeCharacteristic::default()
                        },
                    ],
                    ..FakeService::default()
                },
                FakeService {
                    uuid: GRADE_SERVICE_UUID,
                    characteristics: vec![FakeCharacteristic {
                        uuid: GRADE_CHAR_UUID,
                        properties: read_notify,
                        value: vec![0xFD, 0x33, 0x00],
                        ..FakeCharacteristic::default()
                    }],
                    ..FakeService::default()
                },
            ],
            enumeration_fails: false,
        }
    }

    pub fn with_service(mut self, service: FakeService) -> Self {
        self.services.push(service);
        self
    }

    pub fn without_characteristic(mut self, uuid: Uuid) -> Self {
        for service in &mut self.services {
            service.characteristics.retain(|c| c.uuid != uuid);
        }
        self
    }

    pub fn read_only(mut self, uuid: Uuid) -> Self {
        self.characteristics_mut(uuid)
            .for_each(|c| c.properties = CharacteristicProperties::READ);
        self
    }

    pub fn failing_open(mut self, service_uuid: Uuid) -> Self {
        self.services_mut(service_uuid).for_each(|s| s.open_fails = true);
        self
    }

    /// Service discovery on the device returns an error.
    pub fn failing_enumeration(mut self) -> Self {
        self.enumeration_fails = true;
        self
    }

    pub fn failing_lookup(mut self, service_uuid: Uuid) -> Self {
        self.services_mut(service_uuid).for_each(|s| s.lookup_fails = true);
        self
    }

    pub fn failing_read(mut self, uuid: Uuid) -> Self {
        self.characteristics_mut(uuid).for_each(|c| c.read_fails = true);
        self
    }

    /// The CCCD write that arms notifications is rejected.
    pub fn failing_subscribe(mut self, uuid: Uuid) -> Self {
        self.characteristics_mut(uuid)
            .for_each(|c| c.cccd_write_fails = true);
        self
    }

    fn services_mut(&mut self, uuid: Uuid) -> impl Iterator<Item = &mut FakeService> {
        self.services.iter_mut().filter(move |s| s.uuid == uuid)
    }

    fn characteristics_mut(&mut self, uuid: Uuid) -> impl Iterator<Item = &mut FakeCharacteristic> {
        self.services
            .iter_mut()
            .flat_map(|s| s.characteristics.iter_mut())
            .filter(move |c| c.uuid == uuid)
    }
}

/// Adapter that replays a scan script and serves canned GATT tables.
#[derive(Debug, Default)]
pub struct FakeAdapter {
    devices: HashMap<DeviceAddress, FakeDevice>,
    script: Vec<(Duration, AdvertisementEvent)>,
    connect_delay: Duration,
    connects: Mutex<HashMap<DeviceAddress, usize>>,
    stops: AtomicUsize,
    subscribers: Mutex<HashMap<Uuid, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, address: u64, device: FakeDevice) -> Self {
        self.devices.insert(DeviceAddress::new(address), device);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Emit an advertisement `offset` after the scan starts.
    pub fn advertise_after(mut self, offset: Duration, address: u64, name: &str) -> Self {
        self.script
            .push((offset, AdvertisementEvent::new(address, name)));
        self
    }

    pub fn connect_calls(&self, address: DeviceAddress) -> usize {
        let connects = self.connects.lock().unwrap();
        connects.get(&address).copied().unwrap_or(0)
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Push a notification value; `false` when nothing is subscribed to `uuid`.
    pub fn notify(&self, uuid: Uuid, value: Vec<u8>) -> bool {
        let subscribers = self.subscribers.lock().unwrap();
        subscribers
            .get(&uuid)
            .map(|tx| tx.send(value).is_ok())
            .unwrap_or(false)
    }
}

#[async_trait]
impl BleAdapter for FakeAdapter {
    type Watcher = JoinHandle<()>;
    type Device = FakeDevice;
    type Service = FakeService;
    type Characteristic = FakeCharacteristic;

    fn start_scan(
        &self,
        _mode: ScanMode,
        events: mpsc::UnboundedSender<AdvertisementEvent>,
    ) -> Result<Self::Watcher, AdapterError> {
        let mut script = self.script.clone();
        script.sort_by_key(|(offset, _)| *offset);
        let started = tokio::time::Instant::now();

        Ok(tokio::spawn(async move {
            for (offset, event) in script {
                tokio::time::sleep_until(started + offset).await;
                let _ = events.send(event);
            }
        }))
    }

    fn stop_scan(&self, watcher: Self::Watcher) -> Result<(), AdapterError> {
        watcher.abort();
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, address: DeviceAddress) -> Result<Self::Device, AdapterError> {
        *self.connects.lock().unwrap().entry(address).or_insert(0) += 1;
        tokio::time::sleep(self.connect_delay).await;
        self.devices
            .get(&address)
            .cloned()
            .ok_or(AdapterError::DeviceNotFound(address))
    }

    async fn list_services(
        &self,
        device: &Self::Device,
    ) -> Result<Vec<Self::Service>, AdapterError> {
        if device.enumeration_fails {
            return Err(AdapterError::communication("get GATT services", "Unreachable"));
        }
        Ok(device.services.clone())
    }

    async fn open_service(
        &self,
        service: &Self::Service,
        _mode: SharingMode,
    ) -> Result<(), AdapterError> {
        if service.open_fails {
            return Err(AdapterError::communication("open service", "AccessDenied"));
        }
        Ok(())
    }

    async fn list_characteristics(
        &self,
        service: &Self::Service,
        uuid: Uuid,
    ) -> Result<Vec<Self::Characteristic>, AdapterError> {
        if service.lookup_fails {
            return Err(AdapterError::communication("get characteristics", "ProtocolError"));
        }
        Ok(service
            .characteristics
            .iter()
            .filter(|c| c.uuid == uuid)
            .cloned()
            .collect())
    }

    async fn read_value(
        &self,
        characteristic: &Self::Characteristic,
    ) -> Result<Vec<u8>, AdapterError> {
        if characteristic.read_fails {
            return Err(AdapterError::communication("read value", "Unreachable"));
        }
        Ok(characteristic.value.clone())
    }

    async fn enable_notifications(
        &self,
        characteristic: &Self::Characteristic,
        values: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<(), AdapterError> {
        if !characteristic
            .properties
            .contains(CharacteristicProperties::NOTIFY)
        {
            return Err(AdapterError::communication("write CCCD", "NotSupported"));
        }
        if characteristic.cccd_write_fails {
            return Err(AdapterError::communication("write CCCD", "AccessDenied"));
        }
        self.subscribers
            .lock()
            .unwrap()
            .insert(characteristic.uuid, values);
        Ok(())
    }
}
