use std::future::Future;
use std::pin::Pin;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::advertising::{AdvertisingConfig, AdvertisingController, StartResponder};
use crate::client_provider::ClientControlMsg;
use crate::common::{DeviceId, PeripheralError};
use crate::gatt::{
    ConnectionTracker, GattRequestHandler, NotificationBroadcaster, ServiceKind, ServiceRegistry,
    WriteEventCallback,
};
use crate::radio_provider::{GattResponseStatus, RadioDriver, RadioEventMsg};

/// Events consumed by the engine: client commands, radio driver events, and
/// the stop request.
pub enum ProviderEvent {
    Client(ClientControlMsg),
    Radio(RadioEventMsg),
    Stop,
}

/// The engine owns every shared mutable resource (service registry,
/// connection set, advertising state, the radio driver) and is the only
/// task that touches them. Providers on the rim feed one queue; the settle
/// delay between an advertising stop and restart is a timer polled
/// alongside that queue, so the loop stays responsive while it runs down.
pub struct Engine {
    provider_rx: mpsc::Receiver<ProviderEvent>,
    driver: Box<dyn RadioDriver>,
    registry: ServiceRegistry,
    connections: ConnectionTracker,
    requests: GattRequestHandler,
    broadcaster: NotificationBroadcaster,
    advertiser: AdvertisingController,
    settle_timers: FuturesUnordered<Pin<Box<dyn Future<Output = ()> + Send>>>,
    gatt_registered: bool,
}

impl Engine {
    pub(crate) fn new(
        provider_rx: mpsc::Receiver<ProviderEvent>,
        driver: Box<dyn RadioDriver>,
        write_callback: Box<dyn WriteEventCallback>,
        config: AdvertisingConfig,
    ) -> Self {
        Self {
            provider_rx,
            driver,
            registry: ServiceRegistry::new(),
            connections: ConnectionTracker::new(),
            requests: GattRequestHandler::new(write_callback),
            broadcaster: NotificationBroadcaster::new(),
            advertiser: AdvertisingController::new(config),
            settle_timers: FuturesUnordered::new(),
            gatt_registered: false,
        }
    }

    /// Runs the event loop until a stop request arrives or every provider
    /// handle is dropped.
    pub async fn run(&mut self) {
        info!("peripheral engine running");
        loop {
            select! {
                maybe_event = self.provider_rx.recv() => {
                    match maybe_event {
                        Some(ProviderEvent::Client(msg)) => self.process_client_command(msg).await,
                        Some(ProviderEvent::Radio(msg)) => self.process_radio_event(msg).await,
                        Some(ProviderEvent::Stop) => {
                            info!("peripheral engine stopped");
                            break;
                        }
                        None => {
                            info!("all providers gone, engine exiting");
                            break;
                        }
                    }
                }
                Some(()) = self.settle_timers.next() => {
                    self.advertiser
                        .complete_restart(self.driver.as_mut(), &self.registry)
                        .await;
                }
            }
        }
    }

    async fn process_client_command(&mut self, msg: ClientControlMsg) {
        match msg {
            ClientControlMsg::SetName(name) => self.advertiser.set_local_name(name),
            ClientControlMsg::SetManufacturerData { company_id, payload } => {
                self.advertiser.set_manufacturer_data(company_id, payload);
            }
            ClientControlMsg::AddService { uuid, primary } => {
                let kind = if primary { ServiceKind::Primary } else { ServiceKind::Secondary };
                self.registry.add_service(uuid, kind);
            }
            ClientControlMsg::AddCharacteristic { service, characteristic, responder } => {
                let result = self.registry.add_characteristic(service, characteristic);
                let _ = responder.send(result);
            }
            ClientControlMsg::Start { responder } => self.start(responder).await,
            ClientControlMsg::Stop => self.stop().await,
            ClientControlMsg::SendNotification { service, characteristic, payload, responder } => {
                let result = self.send_notification(service, characteristic, payload).await;
                let _ = responder.send(result);
            }
            ClientControlMsg::IsAdvertising { responder } => {
                let _ = responder.send(self.advertiser.is_advertising());
            }
            ClientControlMsg::UpdateManufacturerData { company_id, payload, responder } => {
                let settle = self
                    .advertiser
                    .begin_manufacturer_update(self.driver.as_mut(), company_id, payload, responder)
                    .await;
                if let Some(delay) = settle {
                    debug!(?delay, "settle timer armed for advertising restart");
                    self.settle_timers.push(Box::pin(sleep(delay)));
                }
            }
        }
    }

    async fn process_radio_event(&mut self, msg: RadioEventMsg) {
        match msg {
            RadioEventMsg::ConnectionStateChanged { device, status_ok, connected } => {
                self.connections.on_connection_result(device, status_ok, connected);
            }
            RadioEventMsg::ReadRequest { device, request_id, service, characteristic, offset } => {
                self.handle_read(device, request_id, service, characteristic, offset).await;
            }
            RadioEventMsg::WriteRequest {
                device,
                request_id,
                service,
                characteristic,
                offset,
                value,
                response_needed,
            } => {
                self.handle_write(
                    device,
                    request_id,
                    service,
                    characteristic,
                    offset,
                    value,
                    response_needed,
                )
                .await;
            }
            RadioEventMsg::AdvertisingStartResult { ok, error_code } => {
                self.advertiser.on_start_result(ok, error_code);
            }
            RadioEventMsg::NotificationSent { device, ok } => {
                debug!(%device, ok, "notification sent");
            }
        }
    }

    /// Full start: fresh connection set, GATT registration, then the
    /// advertising submission. Registration failures reject the caller and
    /// leave the advertiser idle.
    async fn start(&mut self, responder: StartResponder) {
        if let Err(e) = self.advertiser.check_start_allowed() {
            if responder.send(Err(e)).is_err() {
                debug!("start caller went away");
            }
            return;
        }
        self.connections.clear();
        if !self.gatt_registered {
            if let Err(e) = self.driver.register_gatt(self.registry.services()).await {
                warn!(error = %e, "gatt registration failed");
                let _ = responder.send(Err(e));
                return;
            }
            self.gatt_registered = true;
        }
        self.advertiser
            .begin_start(self.driver.as_mut(), &self.registry, responder)
            .await;
    }

    /// Full stop: tears down the GATT server and the advertiser. A restart
    /// already waiting out its settle delay is not cancelled.
    async fn stop(&mut self) {
        if self.gatt_registered {
            if let Err(e) = self.driver.unregister_gatt().await {
                warn!(error = %e, "gatt unregister reported an error, ignoring");
            }
            self.gatt_registered = false;
        }
        self.advertiser.stop(self.driver.as_mut()).await;
    }

    async fn send_notification(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        payload: Vec<u8>,
    ) -> Result<(), PeripheralError> {
        // Unknown uuids fail here, before the driver is contacted.
        let indicate = {
            let ch = self.registry.characteristic_mut(service, characteristic)?;
            ch.set_value(payload.clone());
            ch.supports_indicate()
        };
        let devices = self.connections.snapshot();
        self.broadcaster
            .broadcast(
                self.driver.as_mut(),
                &devices,
                service,
                characteristic,
                &payload,
                indicate,
            )
            .await;
        Ok(())
    }

    async fn handle_read(
        &mut self,
        device: DeviceId,
        request_id: u32,
        service: Uuid,
        characteristic: Uuid,
        offset: u32,
    ) {
        let response = self
            .requests
            .on_read_request(&self.registry, device, service, characteristic, offset);
        let result = match response {
            Ok(value) => {
                self.driver
                    .send_read_response(
                        device,
                        request_id,
                        GattResponseStatus::Success,
                        offset,
                        Some(&value),
                    )
                    .await
            }
            Err(e) => {
                let status = match e {
                    PeripheralError::InvalidOffset(_) => GattResponseStatus::InvalidOffset,
                    _ => GattResponseStatus::Failure,
                };
                self.driver
                    .send_read_response(device, request_id, status, offset, None)
                    .await
            }
        };
        if let Err(e) = result {
            warn!(%device, request_id, error = %e, "read response submission failed");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_write(
        &mut self,
        device: DeviceId,
        request_id: u32,
        service: Uuid,
        characteristic: Uuid,
        offset: u32,
        value: Vec<u8>,
        response_needed: bool,
    ) {
        let status = match self.requests.on_write_request(
            &mut self.registry,
            device,
            service,
            characteristic,
            &value,
        ) {
            Ok(()) => GattResponseStatus::Success,
            Err(_) => GattResponseStatus::Failure,
        };
        if !response_needed {
            return;
        }
        if let Err(e) = self
            .driver
            .send_write_response(device, request_id, status, offset, &value)
            .await
        {
            warn!(%device, request_id, error = %e, "write response submission failed");
        }
    }
}
