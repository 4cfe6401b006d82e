//! Scan Session
//!
//! Wires one session's registry, state, resolver and discovery controller,
//! and runs the bounded countdown that ends in `Found`, `TimedOut` or
//! `Cancelled`.

use crate::domain::models::{MessageSeverity, SessionOutcome};
use crate::domain::registry::DeviceRegistry;
use crate::domain::session::SessionState;
use crate::domain::settings::ScanSettings;
use crate::domain::sink::{GatedSink, TelemetrySink, STATUS_NO_BIKE, STATUS_SCANNING};
use crate::infrastructure::bluetooth::adapter::BleAdapter;
use crate::infrastructure::bluetooth::protocol::ServiceDescriptor;
use crate::infrastructure::bluetooth::resolver::Resolver;
use crate::infrastructure::bluetooth::scanner::DiscoveryController;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ScanSession<A: BleAdapter> {
    adapter: Arc<A>,
    settings: ScanSettings,
    state: Arc<SessionState>,
    registry: Arc<DeviceRegistry>,
    resolver: Arc<Resolver<A>>,
    sink: GatedSink,
}

impl<A: BleAdapter> ScanSession<A> {
    pub fn new(adapter: Arc<A>, sink: Arc<dyn TelemetrySink>, settings: ScanSettings) -> Self {
        let state = Arc::new(SessionState::new());
        let sink = GatedSink::new(sink, state.clone());
        let resolver = Arc::new(Resolver::new(
            adapter.clone(),
            state.clone(),
            sink.clone(),
            ServiceDescriptor::for_settings(&settings),
            settings.success_trigger,
        ));

        Self {
            adapter,
            settings,
            state,
            registry: Arc::new(DeviceRegistry::new()),
            resolver,
            sink,
        }
    }

    /// Shared flags; `close()` on it cancels the countdown and silences the sink.
    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.registry.clone()
    }

    /// Holds the resolved device handles; keep it alive for notifications to keep flowing.
    pub fn resolver(&self) -> Arc<Resolver<A>> {
        self.resolver.clone()
    }

    /// Scan until the bike is found, the countdown runs out or the session closes.
    ///
    /// Consumes the session: a new scan gets a fresh registry and state.
    /// The watcher is stopped on every exit path, including this future being dropped.
    pub async fn run(self) -> Result<SessionOutcome> {
        let mut discovery = DiscoveryController::new(
            self.adapter.clone(),
            self.registry.clone(),
            self.resolver.clone(),
            self.settings.scanning_mode,
        );

        self.sink.status(STATUS_SCANNING, MessageSeverity::Info);
        discovery.start(self.settings.name_filter.clone())?;

        let outcome = self.countdown().await;

        if let Err(e) = discovery.stop() {
            warn!("Failed to stop BLE scan: {}", e);
        }

        match outcome {
            SessionOutcome::TimedOut => {
                if self.registry.is_empty() {
                    debug!("No advertisement matched {:?}", self.settings.name_filter);
                }
                info!(candidates = self.registry.len(), "No bike found");
                self.sink.status(STATUS_NO_BIKE, MessageSeverity::Warning);
            }
            SessionOutcome::Found => info!("Scan finished, bike found"),
            SessionOutcome::Cancelled => info!("Scan cancelled"),
        }

        Ok(outcome)
    }

    async fn countdown(&self) -> SessionOutcome {
        let tick = self.settings.tick();
        let mut remaining = self.settings.timeout_ticks;

        loop {
            if self.state.is_closing() {
                return SessionOutcome::Cancelled;
            }
            if self.state.bike_found() {
                return SessionOutcome::Found;
            }
            if remaining == 0 {
                return SessionOutcome::TimedOut;
            }

            tokio::time::sleep(tick).await;
            remaining -= 1;

            if self.settings.countdown_feedback {
                self.sink
                    .status(format!("Scan {}", remaining), MessageSeverity::Info);
            }
        }
    }
}
