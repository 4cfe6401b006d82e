use std::sync::atomic::{AtomicBool, Ordering};

/// Flags shared between the countdown loop and the resolution tasks of one session.
///
/// Both flags are one-way latches.
#[derive(Debug, Default)]
pub struct SessionState {
    bike_found: AtomicBool,
    closing: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch `bike_found`. Returns `true` only for the call that flipped it.
    pub fn mark_bike_found(&self) -> bool {
        !self.bike_found.swap(true, Ordering::AcqRel)
    }

    pub fn bike_found(&self) -> bool {
        self.bike_found.load(Ordering::Acquire)
    }

    /// Latch `closing`. Sink delivery stops from here on.
    pub fn close(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}
