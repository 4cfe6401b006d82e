//! Telemetry Sink
//!
//! The boundary between the bluetooth side and presentation. Implementations
//! are called from adapter tasks and must do their own thread marshaling.

use crate::domain::models::{AppEvent, MessageSeverity, StatusMessage, TelemetrySample};
use crate::domain::session::SessionState;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const STATUS_SCANNING: &str = "Scanning";
pub const STATUS_NO_BIKE: &str = "No Bike";
pub const STATUS_NO_ACCESS: &str = "No Access";

pub trait TelemetrySink: Send + Sync {
    fn publish_status(&self, status: StatusMessage);
    fn publish_sample(&self, sample: TelemetrySample);
}

/// Forwards everything as [`AppEvent`]s over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelSink {
    pub fn new(event_sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { event_sender }
    }
}

impl TelemetrySink for ChannelSink {
    fn publish_status(&self, status: StatusMessage) {
        let _ = self.event_sender.send(AppEvent::Status(status));
    }

    fn publish_sample(&self, sample: TelemetrySample) {
        let _ = self.event_sender.send(AppEvent::Sample(sample));
    }
}

/// Sink wrapper that goes silent once the session starts closing.
#[derive(Clone)]
pub struct GatedSink {
    inner: Arc<dyn TelemetrySink>,
    state: Arc<SessionState>,
}

impl GatedSink {
    pub fn new(inner: Arc<dyn TelemetrySink>, state: Arc<SessionState>) -> Self {
        Self { inner, state }
    }

    pub fn status(&self, message: impl Into<String>, severity: MessageSeverity) {
        if self.state.is_closing() {
            return;
        }
        self.inner.publish_status(StatusMessage {
            message: message.into(),
            severity,
        });
    }

    pub fn sample(&self, sample: TelemetrySample) {
        if self.state.is_closing() {
            return;
        }
        self.inner.publish_sample(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gated_sink_drops_after_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = Arc::new(SessionState::new());
        let sink = GatedSink::new(Arc::new(ChannelSink::new(tx)), state.clone());

        sink.sample(TelemetrySample::PowerWatts { watts: 120 });
        state.close();
        sink.sample(TelemetrySample::PowerWatts { watts: 130 });
        sink.status(STATUS_NO_BIKE, MessageSeverity::Warning);

        assert_eq!(
            rx.try_recv().ok(),
            Some(AppEvent::Sample(TelemetrySample::PowerWatts { watts: 120 }))
        );
        assert!(rx.try_recv().is_err());
    }
}
