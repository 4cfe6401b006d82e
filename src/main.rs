use anyhow::Result;
use kickr_gears::domain::models::{AppEvent, SessionOutcome, TelemetrySample};
use kickr_gears::domain::settings::{ScanSettings, SettingsService};
use kickr_gears::domain::sink::{ChannelSink, TelemetrySink};
use kickr_gears::infrastructure::bluetooth::{BleAdapter, ScanSession};
use kickr_gears::infrastructure::logging;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Upper bound on waiting for in-flight candidates to release the sink.
const DISPLAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting KICKR gears ({})", settings_service.path().display());

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn TelemetrySink> = Arc::new(ChannelSink::new(event_tx));
    let display = tokio::spawn(display(event_rx));

    let result = run_platform(sink, settings.scan).await;
    match &result {
        // Notification pumps still hold the sink; nothing more is printed after Ctrl-C.
        Ok(SessionOutcome::Found) => display.abort(),
        _ => {
            // The session is gone, so the channel closes once the last sender drops.
            if tokio::time::timeout(DISPLAY_DRAIN_TIMEOUT, display).await.is_err() {
                warn!("Display did not drain in time");
            }
        }
    }

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result.map(|_| ())
}

#[cfg(windows)]
async fn run_platform(
    sink: Arc<dyn TelemetrySink>,
    settings: ScanSettings,
) -> Result<SessionOutcome> {
    use kickr_gears::infrastructure::bluetooth::winrt::WinRtAdapter;

    run(Arc::new(WinRtAdapter::new()), sink, settings).await
}

#[cfg(not(windows))]
async fn run_platform(
    _sink: Arc<dyn TelemetrySink>,
    _settings: ScanSettings,
) -> Result<SessionOutcome> {
    use kickr_gears::infrastructure::bluetooth::AdapterError;

    Err(AdapterError::Unavailable("no BLE backend for this platform".into()).into())
}

/// One scan session; when the bike is found telemetry keeps flowing until Ctrl-C.
#[cfg_attr(not(windows), allow(dead_code))]
async fn run<A: BleAdapter>(
    adapter: Arc<A>,
    sink: Arc<dyn TelemetrySink>,
    settings: ScanSettings,
) -> Result<SessionOutcome> {
    let session = ScanSession::new(adapter, sink, settings);

    let state = session.state();
    let resolver = session.resolver();
    let shutdown = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            state.close();
        }
    });

    let outcome = session.run().await?;
    if outcome == SessionOutcome::Found {
        info!("Streaming from {:?}", resolver.resolved_addresses());
        let _ = shutdown.await;
    } else {
        shutdown.abort();
    }

    Ok(outcome)
}

/// Renders sink output the way the gear window did: one line per update.
async fn display(mut events: mpsc::UnboundedReceiver<AppEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            AppEvent::Status(status) => println!("{}", status.message),
            AppEvent::Sample(sample) => println!("{}: {}", kind(&sample), sample),
        }
    }
}

fn kind(sample: &TelemetrySample) -> &'static str {
    match sample {
        TelemetrySample::GearPosition { .. } => "Gears",
        TelemetrySample::PowerWatts { .. } => "Power",
        TelemetrySample::GradeLock { .. } => "Grade",
    }
}
