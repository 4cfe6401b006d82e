//! Service/Characteristic Resolver
//!
//! Connects to one candidate, opens the services of interest, performs the
//! initial reads and arms notifications. Failures are per service: a missing
//! or inaccessible service never stops the others from being tried.

use crate::domain::models::{DeviceAddress, MessageSeverity, TelemetrySample};
use crate::domain::session::SessionState;
use crate::domain::settings::SuccessTrigger;
use crate::domain::sink::{GatedSink, STATUS_NO_ACCESS};
use crate::domain::telemetry;
use crate::infrastructure::bluetooth::adapter::{
    AdapterError, BleAdapter, CharacteristicProperties, GattCharacteristic, GattService,
    SharingMode,
};
use crate::infrastructure::bluetooth::protocol::{ServiceDescriptor, ServiceRole};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Reasons a whole candidate is abandoned.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("connection to {address} failed: {source}")]
    Connect {
        address: DeviceAddress,
        #[source]
        source: AdapterError,
    },
    #[error("service enumeration on {address} failed: {source}")]
    Services {
        address: DeviceAddress,
        #[source]
        source: AdapterError,
    },
    #[error("{0} exposes no GATT services")]
    NoServices(DeviceAddress),
}

/// What one candidate's resolution achieved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub opened: Vec<ServiceRole>,
    pub subscribed: Vec<ServiceRole>,
    pub initial_samples: Vec<TelemetrySample>,
}

/// Handles kept alive so notifications keep flowing.
struct HeldDevice<A: BleAdapter> {
    address: DeviceAddress,
    _device: A::Device,
    characteristics: Vec<A::Characteristic>,
}

/// Per-session resolver. Owns every device and characteristic handle it resolves.
pub struct Resolver<A: BleAdapter> {
    adapter: Arc<A>,
    state: Arc<SessionState>,
    sink: GatedSink,
    services: Vec<ServiceDescriptor>,
    success_trigger: SuccessTrigger,
    held: Mutex<Vec<HeldDevice<A>>>,
}

impl<A: BleAdapter> Resolver<A> {
    pub fn new(
        adapter: Arc<A>,
        state: Arc<SessionState>,
        sink: GatedSink,
        services: Vec<ServiceDescriptor>,
        success_trigger: SuccessTrigger,
    ) -> Self {
        Self {
            adapter,
            state,
            sink,
            services,
            success_trigger,
            held: Mutex::new(Vec::new()),
        }
    }

    /// Resolve the services of interest on `address`.
    pub async fn resolve(&self, address: DeviceAddress) -> Result<Resolution, ResolveError> {
        debug!(%address, "Connecting to candidate");

        let device = self
            .adapter
            .connect(address)
            .await
            .map_err(|source| ResolveError::Connect { address, source })?;

        let services = self
            .adapter
            .list_services(&device)
            .await
            .map_err(|source| ResolveError::Services { address, source })?;

        if services.is_empty() {
            return Err(ResolveError::NoServices(address));
        }
        info!(%address, "Found {} GATT services", services.len());

        let mut resolution = Resolution::default();
        let mut characteristics = Vec::new();

        for descriptor in &self.services {
            let Some(service) = services
                .iter()
                .find(|s| s.uuid() == descriptor.service_uuid)
            else {
                debug!(%address, role = ?descriptor.role, "Service not exposed");
                continue;
            };

            if let Some(characteristic) = self
                .resolve_service(address, descriptor, service, &mut resolution)
                .await
            {
                characteristics.push(characteristic);
            }
        }

        if !resolution.opened.is_empty() {
            let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
            held.push(HeldDevice {
                address,
                _device: device,
                characteristics,
            });
        }

        Ok(resolution)
    }

    async fn resolve_service(
        &self,
        address: DeviceAddress,
        descriptor: &ServiceDescriptor,
        service: &A::Service,
        resolution: &mut Resolution,
    ) -> Option<A::Characteristic> {
        let role = descriptor.role;

        if let Err(e) = self
            .adapter
            .open_service(service, SharingMode::SharedReadAndWrite)
            .await
        {
            warn!(%address, ?role, "Could not open service: {}", e);
            self.sink.status(STATUS_NO_ACCESS, MessageSeverity::Warning);
            return None;
        }
        resolution.opened.push(role);

        if role == ServiceRole::BikeInfo && self.success_trigger == SuccessTrigger::ServiceOpened {
            self.confirm(address);
        }

        let characteristic = match self
            .adapter
            .list_characteristics(service, descriptor.characteristic_uuid)
            .await
        {
            Ok(characteristics) => characteristics.into_iter().next(),
            Err(e) => {
                warn!(%address, ?role, "Characteristic lookup failed: {}", e);
                None
            }
        };

        let Some(characteristic) = characteristic else {
            warn!(%address, ?role, "No access to characteristic");
            self.sink.status(STATUS_NO_ACCESS, MessageSeverity::Warning);
            return None;
        };

        let properties = characteristic.properties();

        if properties.contains(CharacteristicProperties::READ) {
            match self.adapter.read_value(&characteristic).await {
                Ok(value) => {
                    trace!(?role, "Initial value: {:02X?}", value);
                    if let Some(sample) = telemetry::decode(descriptor.payload, &value) {
                        self.sink.sample(sample);
                        resolution.initial_samples.push(sample);
                    }
                }
                Err(e) => debug!(%address, ?role, "Initial read failed: {}", e),
            }
        }

        if properties.contains(CharacteristicProperties::NOTIFY) {
            match self.subscribe(descriptor, &characteristic).await {
                Ok(()) => {
                    info!(%address, ?role, "Notifications enabled");
                    resolution.subscribed.push(role);
                    if role == ServiceRole::BikeInfo
                        && self.success_trigger == SuccessTrigger::NotificationArmed
                    {
                        self.confirm(address);
                    }
                }
                Err(e) => warn!(%address, ?role, "Could not enable notifications: {}", e),
            }
        }

        Some(characteristic)
    }

    /// Arm notifications and pump every payload through the decoder, in arrival order.
    async fn subscribe(
        &self,
        descriptor: &ServiceDescriptor,
        characteristic: &A::Characteristic,
    ) -> Result<(), AdapterError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.adapter.enable_notifications(characteristic, tx).await?;

        let sink = self.sink.clone();
        let kind = descriptor.payload;
        let role = descriptor.role;
        tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                trace!(?role, "Notification: {:02X?}", value);
                if let Some(sample) = telemetry::decode(kind, &value) {
                    sink.sample(sample);
                }
            }
            debug!(?role, "Notification stream ended");
        });

        Ok(())
    }

    fn confirm(&self, address: DeviceAddress) {
        if self.state.mark_bike_found() {
            info!(%address, "Bike found");
        }
    }

    /// Number of characteristic handles currently held for the session.
    pub fn held_characteristics(&self) -> usize {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.iter().map(|d| d.characteristics.len()).sum()
    }

    /// Addresses of devices with at least one opened service.
    pub fn resolved_addresses(&self) -> Vec<DeviceAddress> {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.iter().map(|d| d.address).collect()
    }
}
