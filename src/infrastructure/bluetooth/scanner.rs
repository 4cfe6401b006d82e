//! BLE Scanner Module
//!
//! Owns the advertisement watcher, filters advertisements by local name and
//! hands each newly seen address to the resolver exactly once.

use crate::domain::models::AdvertisementEvent;
use crate::domain::registry::DeviceRegistry;
use crate::domain::settings::{NameFilter, ScanMode};
use crate::infrastructure::bluetooth::adapter::BleAdapter;
use crate::infrastructure::bluetooth::resolver::Resolver;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Discovery controller for one scan session.
pub struct DiscoveryController<A: BleAdapter> {
    adapter: Arc<A>,
    registry: Arc<DeviceRegistry>,
    resolver: Arc<Resolver<A>>,
    scan_mode: ScanMode,
    watcher: Option<A::Watcher>,
    dispatcher: Option<JoinHandle<()>>,
}

impl<A: BleAdapter> DiscoveryController<A> {
    pub fn new(
        adapter: Arc<A>,
        registry: Arc<DeviceRegistry>,
        resolver: Arc<Resolver<A>>,
        scan_mode: ScanMode,
    ) -> Self {
        Self {
            adapter,
            registry,
            resolver,
            scan_mode,
            watcher: None,
            dispatcher: None,
        }
    }

    /// Start the watcher. Advertisements are handled until [`stop`](Self::stop).
    pub fn start(&mut self, name_filter: NameFilter) -> Result<()> {
        // Stop any existing scan
        self.stop()?;

        info!("Starting BLE scan ({:?}, filter {:?})", self.scan_mode, name_filter);

        let (tx, mut rx) = mpsc::unbounded_channel::<AdvertisementEvent>();
        let watcher = self.adapter.start_scan(self.scan_mode, tx)?;
        self.watcher = Some(watcher);

        let registry = self.registry.clone();
        let resolver = self.resolver.clone();
        self.dispatcher = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                Self::handle_advertisement(&registry, &resolver, &name_filter, event);
            }
        }));

        Ok(())
    }

    fn handle_advertisement(
        registry: &DeviceRegistry,
        resolver: &Arc<Resolver<A>>,
        name_filter: &NameFilter,
        event: AdvertisementEvent,
    ) {
        if !name_filter.matches(&event.local_name) {
            return;
        }
        if !registry.try_admit(event.address) {
            return;
        }

        info!(address = %event.address, "Found {}", event.local_name);

        // Each candidate resolves in its own task; its failures stay there.
        let resolver = resolver.clone();
        let address = event.address;
        tokio::spawn(async move {
            match resolver.resolve(address).await {
                Ok(resolution) => debug!(%address, ?resolution, "Candidate resolved"),
                Err(e) => debug!(%address, "Candidate abandoned: {}", e),
            }
        });
    }

    /// Stop scanning. Only the first call after `start` reaches the adapter.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        if let Some(watcher) = self.watcher.take() {
            info!("Stopping BLE scan...");
            self.adapter.stop_scan(watcher)?;
        }
        Ok(())
    }
}

impl<A: BleAdapter> Drop for DiscoveryController<A> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop BLE scan: {}", e);
        }
    }
}
