use crate::domain::models::DeviceAddress;
use std::collections::HashSet;
use std::sync::Mutex;

/// Addresses already handed to the resolver during one scan session.
///
/// Recreated per session; entries are never removed.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    seen: Mutex<HashSet<DeviceAddress>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller with `address`, `false` for every later one.
    pub fn try_admit(&self, address: DeviceAddress) -> bool {
        // Check and insert under the same lock.
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(address)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
