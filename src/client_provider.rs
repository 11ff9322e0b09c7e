use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use crate::advertising::StartResponder;
use crate::common::PeripheralError;
use crate::engine::ProviderEvent;
use crate::gatt::Characteristic;

pub(crate) type Responder<T> = oneshot::Sender<Result<T, PeripheralError>>;

/// Commands sent from the client API to the engine.
pub enum ClientControlMsg {
    SetName(String),
    SetManufacturerData {
        company_id: u16,
        payload: Vec<u8>,
    },
    AddService {
        uuid: Uuid,
        primary: bool,
    },
    AddCharacteristic {
        service: Uuid,
        characteristic: Characteristic,
        responder: Responder<()>,
    },
    Start {
        responder: StartResponder,
    },
    Stop,
    SendNotification {
        service: Uuid,
        characteristic: Uuid,
        payload: Vec<u8>,
        responder: Responder<()>,
    },
    IsAdvertising {
        responder: oneshot::Sender<bool>,
    },
    UpdateManufacturerData {
        company_id: u16,
        payload: Vec<u8>,
        responder: StartResponder,
    },
}

/// The application-facing API. Every call is forwarded to the engine task
/// through the shared event queue; calls with results await a oneshot
/// answer. Cheap to clone.
#[derive(Clone)]
pub struct ClientProvider {
    provider_event_tx: mpsc::Sender<ProviderEvent>,
}

impl ClientProvider {
    pub(crate) fn new(provider_event_tx: mpsc::Sender<ProviderEvent>) -> Self {
        Self { provider_event_tx }
    }

    /// Sets the local device name used in the advertisement. Takes effect
    /// on the next advertising start.
    pub async fn set_name(&self, name: &str) -> Result<(), PeripheralError> {
        self.send(ClientControlMsg::SetName(name.to_string())).await
    }

    /// Sets the manufacturer id and payload carried in the advertisement.
    /// An empty payload clears both. Takes effect on the next start; use
    /// [`Self::update_manufacturer_data`] to re-advertise immediately.
    pub async fn set_manufacturer_data(
        &self,
        company_id: u16,
        payload: Vec<u8>,
    ) -> Result<(), PeripheralError> {
        self.send(ClientControlMsg::SetManufacturerData { company_id, payload })
            .await
    }

    /// Registers a service. Registering a uuid twice is a no-op.
    pub async fn add_service(&self, uuid: Uuid, primary: bool) -> Result<(), PeripheralError> {
        self.send(ClientControlMsg::AddService { uuid, primary }).await
    }

    /// Adds a characteristic to a previously registered service.
    pub async fn add_characteristic(
        &self,
        service: Uuid,
        uuid: Uuid,
        permissions: u16,
        properties: u16,
    ) -> Result<(), PeripheralError> {
        let (responder, rx) = oneshot::channel();
        self.send(ClientControlMsg::AddCharacteristic {
            service,
            characteristic: Characteristic::new(uuid, properties, permissions),
            responder,
        })
        .await?;
        rx.await.map_err(|_| PeripheralError::EngineStopped)?
    }

    /// Registers the configured services with the radio and starts
    /// advertising. Resolves once the driver reports the start outcome.
    pub async fn start(&self) -> Result<String, PeripheralError> {
        let (responder, rx) = oneshot::channel();
        self.send(ClientControlMsg::Start { responder }).await?;
        rx.await.map_err(|_| PeripheralError::EngineStopped)?
    }

    /// Stops advertising and closes the GATT server, best-effort.
    pub async fn stop(&self) -> Result<(), PeripheralError> {
        self.send(ClientControlMsg::Stop).await
    }

    /// Stores a new characteristic value and pushes it to every connected
    /// central, as an indication when the characteristic has the indicate
    /// property and as a notification otherwise.
    pub async fn send_notification(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: Vec<u8>,
    ) -> Result<(), PeripheralError> {
        let (responder, rx) = oneshot::channel();
        self.send(ClientControlMsg::SendNotification {
            service,
            characteristic,
            payload,
            responder,
        })
        .await?;
        rx.await.map_err(|_| PeripheralError::EngineStopped)?
    }

    pub async fn is_advertising(&self) -> Result<bool, PeripheralError> {
        let (responder, rx) = oneshot::channel();
        self.send(ClientControlMsg::IsAdvertising { responder }).await?;
        rx.await.map_err(|_| PeripheralError::EngineStopped)
    }

    /// Updates the manufacturer data and, when currently advertising,
    /// restarts the advertiser after the settle delay so the broadcast
    /// carries the new payload. Resolves on the restart's outcome.
    pub async fn update_manufacturer_data(
        &self,
        company_id: u16,
        payload: Vec<u8>,
    ) -> Result<String, PeripheralError> {
        let (responder, rx) = oneshot::channel();
        self.send(ClientControlMsg::UpdateManufacturerData {
            company_id,
            payload,
            responder,
        })
        .await?;
        rx.await.map_err(|_| PeripheralError::EngineStopped)?
    }

    /// Stops the engine task. Outstanding and subsequent calls fail with
    /// [`PeripheralError::EngineStopped`].
    pub async fn shutdown(&self) {
        debug!("client requested engine shutdown");
        let _ = self.provider_event_tx.send(ProviderEvent::Stop).await;
    }

    async fn send(&self, msg: ClientControlMsg) -> Result<(), PeripheralError> {
        self.provider_event_tx
            .send(ProviderEvent::Client(msg))
            .await
            .map_err(|_| PeripheralError::EngineStopped)
    }
}
