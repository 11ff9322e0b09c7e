use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::advertising::Advertisement;
use crate::common::{DeviceId, PeripheralError};
use crate::engine::ProviderEvent;
use crate::gatt::Service;

/// Status returned to the radio driver for a central's read or write
/// request, mirroring the ATT status codes platform stacks expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattResponseStatus {
    Success,
    InvalidOffset,
    Failure,
}

/// The abstract radio capability the engine drives.
///
/// Implementations wrap a platform Bluetooth stack. Every method is a
/// submission: it returns once the request has been handed to the stack.
/// Completions that the stack reports asynchronously (advertising start
/// results, connections, incoming requests) are delivered back through
/// [`RadioEventCallback`] from whatever execution context the stack uses.
#[async_trait]
pub trait RadioDriver: Send {
    /// Opens the GATT server and registers the given services with it.
    async fn register_gatt(&mut self, services: &[Service]) -> Result<(), PeripheralError>;

    /// Closes the GATT server. Closing while no server is open must be a
    /// no-op, not an error.
    async fn unregister_gatt(&mut self) -> Result<(), PeripheralError>;

    /// Submits an advertising start. The outcome arrives later through
    /// [`RadioEventCallback::on_advertising_start_result`].
    async fn start_advertising(
        &mut self,
        advertisement: &Advertisement,
    ) -> Result<(), PeripheralError>;

    /// Stops advertising. Stopping while not advertising must be a no-op,
    /// not an error.
    async fn stop_advertising(&mut self) -> Result<(), PeripheralError>;

    /// Pushes a characteristic value to one central; `indicate` selects
    /// acknowledged delivery.
    async fn notify(
        &mut self,
        device: DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        indicate: bool,
    ) -> Result<(), PeripheralError>;

    /// Answers a read request previously delivered with `request_id`.
    async fn send_read_response(
        &mut self,
        device: DeviceId,
        request_id: u32,
        status: GattResponseStatus,
        offset: u32,
        value: Option<&[u8]>,
    ) -> Result<(), PeripheralError>;

    /// Answers a write request previously delivered with `request_id`.
    async fn send_write_response(
        &mut self,
        device: DeviceId,
        request_id: u32,
        status: GattResponseStatus,
        offset: u32,
        value: &[u8],
    ) -> Result<(), PeripheralError>;
}

/// Events a radio driver delivers into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEventMsg {
    ConnectionStateChanged {
        device: DeviceId,
        status_ok: bool,
        connected: bool,
    },
    ReadRequest {
        device: DeviceId,
        request_id: u32,
        service: Uuid,
        characteristic: Uuid,
        offset: u32,
    },
    WriteRequest {
        device: DeviceId,
        request_id: u32,
        service: Uuid,
        characteristic: Uuid,
        offset: u32,
        value: Vec<u8>,
        response_needed: bool,
    },
    AdvertisingStartResult {
        ok: bool,
        error_code: i32,
    },
    NotificationSent {
        device: DeviceId,
        ok: bool,
    },
}

/// Handle a radio driver implementation uses to feed its asynchronous
/// events into the engine queue. Clonable; safe to call from any task.
#[derive(Clone)]
pub struct RadioEventCallback {
    provider_event_tx: mpsc::Sender<ProviderEvent>,
}

impl RadioEventCallback {
    pub(crate) fn new(provider_event_tx: mpsc::Sender<ProviderEvent>) -> Self {
        Self { provider_event_tx }
    }

    pub async fn on_connection_state_changed(
        &self,
        device: DeviceId,
        status_ok: bool,
        connected: bool,
    ) {
        self.send(RadioEventMsg::ConnectionStateChanged {
            device,
            status_ok,
            connected,
        })
        .await;
    }

    pub async fn on_read_request(
        &self,
        device: DeviceId,
        request_id: u32,
        service: Uuid,
        characteristic: Uuid,
        offset: u32,
    ) {
        self.send(RadioEventMsg::ReadRequest {
            device,
            request_id,
            service,
            characteristic,
            offset,
        })
        .await;
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn on_write_request(
        &self,
        device: DeviceId,
        request_id: u32,
        service: Uuid,
        characteristic: Uuid,
        offset: u32,
        value: Vec<u8>,
        response_needed: bool,
    ) {
        self.send(RadioEventMsg::WriteRequest {
            device,
            request_id,
            service,
            characteristic,
            offset,
            value,
            response_needed,
        })
        .await;
    }

    pub async fn on_advertising_start_result(&self, ok: bool, error_code: i32) {
        self.send(RadioEventMsg::AdvertisingStartResult { ok, error_code })
            .await;
    }

    pub async fn on_notification_sent(&self, device: DeviceId, ok: bool) {
        self.send(RadioEventMsg::NotificationSent { device, ok }).await;
    }

    async fn send(&self, msg: RadioEventMsg) {
        if let Err(e) = self.provider_event_tx.send(ProviderEvent::Radio(msg)).await {
            error!("radio event dropped, engine queue closed: {}", e);
        } else {
            debug!("radio event queued");
        }
    }
}
