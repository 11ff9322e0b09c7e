use tracing::{debug, warn};
use uuid::Uuid;

use crate::common::DeviceId;
use crate::radio_provider::RadioDriver;

/// Pushes characteristic-value changes to connected centrals.
///
/// Delivery is best-effort: each per-device send is independent, a failure
/// affects only that device, and no per-device results are aggregated. The
/// driver's notification-sent events are not waited on.
#[derive(Debug, Default)]
pub struct NotificationBroadcaster;

impl NotificationBroadcaster {
    pub fn new() -> Self {
        Self
    }

    /// Issues one notify/indicate call per device in `devices`. Returns the
    /// number of sends the driver accepted.
    pub async fn broadcast(
        &self,
        driver: &mut (dyn RadioDriver + '_),
        devices: &[DeviceId],
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        indicate: bool,
    ) -> usize {
        let mut accepted = 0;
        for device in devices {
            match driver.notify(*device, service, characteristic, value, indicate).await {
                Ok(()) => accepted += 1,
                Err(e) => {
                    warn!(device = %device, %characteristic, error = %e, "notification send failed");
                }
            }
        }
        debug!(
            %characteristic,
            accepted,
            total = devices.len(),
            indicate,
            "notification fan-out complete"
        );
        accepted
    }
}
