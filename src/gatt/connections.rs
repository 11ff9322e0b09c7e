use std::collections::HashSet;

use tracing::{debug, info};

use crate::common::DeviceId;

/// The set of currently connected centrals. Membership is driven entirely by
/// driver connection events; there is no per-device metadata.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    devices: HashSet<DeviceId>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a connection-state event. A failed status is treated as a
    /// disconnection no matter what state the driver reports.
    pub fn on_connection_result(&mut self, device: DeviceId, success: bool, connected: bool) {
        if success && connected {
            info!(%device, "central connected");
            self.devices.insert(device);
        } else if success {
            info!(%device, "central disconnected");
            self.devices.remove(&device);
        } else {
            info!(%device, "connection failed, dropping central");
            self.devices.remove(&device);
        }
        debug!(connected = self.devices.len(), "connection set updated");
    }

    /// The connected set at this instant, in a stable order for fan-out.
    pub fn snapshot(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.devices.iter().copied().collect();
        devices.sort_by_key(|d| u64::from(*d));
        devices
    }

    pub fn contains(&self, device: DeviceId) -> bool {
        self.devices.contains(&device)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Drops every tracked central. The GATT server hands out a fresh
    /// connection set on every start.
    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_A: DeviceId = DeviceId::new(0xA1);
    const DEV_B: DeviceId = DeviceId::new(0xB2);

    #[test]
    fn connect_then_disconnect_removes_device() {
        let mut tracker = ConnectionTracker::new();
        tracker.on_connection_result(DEV_A, true, true);
        assert!(tracker.contains(DEV_A));

        tracker.on_connection_result(DEV_A, true, false);
        assert!(!tracker.contains(DEV_A));
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn failed_status_removes_unconditionally() {
        let mut tracker = ConnectionTracker::new();
        tracker.on_connection_result(DEV_A, true, true);

        // Driver reports "connected" but with a failed status.
        tracker.on_connection_result(DEV_A, false, true);
        assert!(!tracker.contains(DEV_A));
    }

    #[test]
    fn snapshot_is_ordered() {
        let mut tracker = ConnectionTracker::new();
        tracker.on_connection_result(DEV_B, true, true);
        tracker.on_connection_result(DEV_A, true, true);

        assert_eq!(tracker.snapshot(), vec![DEV_A, DEV_B]);
    }

    #[test]
    fn clear_empties_the_set() {
        let mut tracker = ConnectionTracker::new();
        tracker.on_connection_result(DEV_A, true, true);
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
