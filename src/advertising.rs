use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::PeripheralError;
use crate::gatt::ServiceRegistry;
use crate::radio_provider::RadioDriver;

/// Local name advertised until the application overrides it.
pub const DEFAULT_LOCAL_NAME: &str = "BLE_PERIPHERAL";

/// Minimum interval between stopping and restarting advertising. Radio
/// stacks reject a restart that follows a stop too closely.
pub const RESTART_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Company id plus payload. Advertisements carry both or neither; the
/// pairing is enforced by keeping them in one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerData {
    pub company_id: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPowerLevel {
    UltraLow,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseMode {
    LowPower,
    Balanced,
    LowLatency,
}

/// Advertising configuration, mutated in place by the client API and read
/// on every (re)start to assemble the broadcast payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingConfig {
    pub local_name: String,
    pub manufacturer: Option<ManufacturerData>,
    pub tx_power: TxPowerLevel,
    pub mode: AdvertiseMode,
    pub connectable: bool,
    pub settle_delay: Duration,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            manufacturer: None,
            tx_power: TxPowerLevel::High,
            mode: AdvertiseMode::LowLatency,
            connectable: true,
            settle_delay: RESTART_SETTLE_DELAY,
        }
    }
}

impl AdvertisingConfig {
    /// Sets the manufacturer id and payload together; an empty payload
    /// clears both.
    pub fn set_manufacturer_data(&mut self, company_id: u16, payload: Vec<u8>) {
        if payload.is_empty() {
            info!("manufacturer data cleared");
            self.manufacturer = None;
        } else {
            info!(company_id, len = payload.len(), "manufacturer data set");
            self.manufacturer = Some(ManufacturerData { company_id, payload });
        }
    }

    /// Assembles the broadcast payload from this config and the registered
    /// service uuids.
    pub fn build_advertisement(&self, registry: &ServiceRegistry) -> Advertisement {
        Advertisement {
            local_name: self.local_name.clone(),
            service_uuids: registry.service_uuids(),
            manufacturer: self.manufacturer.clone(),
            tx_power: self.tx_power,
            mode: self.mode,
            connectable: self.connectable,
        }
    }
}

/// The assembled payload handed to the radio driver on every start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub local_name: String,
    pub service_uuids: Vec<Uuid>,
    pub manufacturer: Option<ManufacturerData>,
    pub tx_power: TxPowerLevel,
    pub mode: AdvertiseMode,
    pub connectable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingState {
    Idle,
    Starting,
    Advertising,
    Stopping,
    Failed(i32),
}

/// Resolves the caller whose `start` or `update_manufacturer_data` is
/// waiting on an advertising start outcome.
pub(crate) type StartResponder = oneshot::Sender<Result<String, PeripheralError>>;

fn respond(responder: StartResponder, result: Result<String, PeripheralError>) {
    if responder.send(result).is_err() {
        debug!("start caller went away before the advertising result");
    }
}

/// The advertising state machine. Owns the configuration and the pending
/// start/restart responders; every driver interaction for the advertising
/// lifecycle goes through here, on the engine task.
pub struct AdvertisingController {
    config: AdvertisingConfig,
    state: AdvertisingState,
    pending_start: Option<StartResponder>,
    pending_restart: Option<StartResponder>,
}

impl AdvertisingController {
    pub fn new(config: AdvertisingConfig) -> Self {
        Self {
            config,
            state: AdvertisingState::Idle,
            pending_start: None,
            pending_restart: None,
        }
    }

    pub fn state(&self) -> AdvertisingState {
        self.state
    }

    pub fn is_advertising(&self) -> bool {
        self.state == AdvertisingState::Advertising
    }

    pub fn set_local_name(&mut self, name: String) {
        info!(name = %name, "local name set");
        self.config.local_name = name;
    }

    pub fn set_manufacturer_data(&mut self, company_id: u16, payload: Vec<u8>) {
        self.config.set_manufacturer_data(company_id, payload);
    }

    /// `start` is accepted only from `Idle`, and never while a
    /// manufacturer-data restart is waiting out its settle delay.
    pub fn check_start_allowed(&self) -> Result<(), PeripheralError> {
        if self.pending_restart.is_some() {
            return Err(PeripheralError::RestartInProgress);
        }
        match self.state {
            AdvertisingState::Idle => Ok(()),
            _ => Err(PeripheralError::NotIdle),
        }
    }

    /// Builds the payload and submits an advertising start. The responder
    /// is parked until the driver reports the outcome.
    pub async fn begin_start(
        &mut self,
        driver: &mut (dyn RadioDriver + '_),
        registry: &ServiceRegistry,
        responder: StartResponder,
    ) {
        if let Err(e) = self.check_start_allowed() {
            respond(responder, Err(e));
            return;
        }
        let advertisement = self.config.build_advertisement(registry);
        info!(
            name = %advertisement.local_name,
            services = advertisement.service_uuids.len(),
            manufacturer = advertisement.manufacturer.is_some(),
            "starting advertising"
        );
        self.transition(AdvertisingState::Starting);
        match driver.start_advertising(&advertisement).await {
            Ok(()) => self.pending_start = Some(responder),
            Err(e) => {
                warn!(error = %e, "advertising start submission failed");
                self.transition(AdvertisingState::Idle);
                respond(responder, Err(e));
            }
        }
    }

    /// Stops advertising, best-effort. Aborts a pending start; a pending
    /// restart is left alone and will still run after its settle delay.
    pub async fn stop(&mut self, driver: &mut (dyn RadioDriver + '_)) {
        if self.state == AdvertisingState::Idle && self.pending_restart.is_none() {
            debug!("stop while idle, nothing to do");
            return;
        }
        if let Some(responder) = self.pending_start.take() {
            respond(responder, Err(PeripheralError::StartAborted));
        }
        self.transition(AdvertisingState::Stopping);
        if let Err(e) = driver.stop_advertising().await {
            warn!(error = %e, "stop advertising reported an error, ignoring");
        }
        self.transition(AdvertisingState::Idle);
    }

    /// Applies a manufacturer-data update. While advertising this stops the
    /// advertiser and returns the settle delay the engine must wait out
    /// before calling [`Self::complete_restart`]; otherwise the update is
    /// config-only and resolves immediately.
    pub async fn begin_manufacturer_update(
        &mut self,
        driver: &mut (dyn RadioDriver + '_),
        company_id: u16,
        payload: Vec<u8>,
        responder: StartResponder,
    ) -> Option<Duration> {
        if self.pending_restart.is_some() {
            respond(responder, Err(PeripheralError::RestartInProgress));
            return None;
        }
        self.config.set_manufacturer_data(company_id, payload);
        if self.state != AdvertisingState::Advertising {
            respond(responder, Ok("manufacturer data updated".to_string()));
            return None;
        }
        info!("stopping advertising to apply manufacturer data");
        self.transition(AdvertisingState::Stopping);
        if let Err(e) = driver.stop_advertising().await {
            warn!(error = %e, "stop before restart reported an error, ignoring");
        }
        self.transition(AdvertisingState::Idle);
        self.pending_restart = Some(responder);
        Some(self.config.settle_delay)
    }

    /// Resumes the restart sequence once the settle delay has elapsed:
    /// rebuilds the payload from the updated config and submits the start.
    pub async fn complete_restart(
        &mut self,
        driver: &mut (dyn RadioDriver + '_),
        registry: &ServiceRegistry,
    ) {
        let Some(responder) = self.pending_restart.take() else {
            debug!("settle delay elapsed with no restart pending");
            return;
        };
        let advertisement = self.config.build_advertisement(registry);
        info!(
            manufacturer = advertisement.manufacturer.is_some(),
            "restarting advertising with updated payload"
        );
        self.transition(AdvertisingState::Starting);
        match driver.start_advertising(&advertisement).await {
            Ok(()) => self.pending_restart = Some(responder),
            Err(e) => {
                warn!(error = %e, "advertising restart submission failed");
                self.transition(AdvertisingState::Idle);
                respond(responder, Err(e));
            }
        }
    }

    /// Applies the driver's asynchronous start outcome and resolves
    /// whichever caller is waiting on it. A result with no start pending is
    /// stale (the start was aborted by a stop) and is dropped.
    pub fn on_start_result(&mut self, ok: bool, error_code: i32) {
        let (responder, restarted) = match (self.pending_start.take(), self.pending_restart.take()) {
            (Some(r), _) => (r, false),
            (None, Some(r)) => (r, true),
            (None, None) => {
                warn!(ok, error_code, "advertising start result with no start pending");
                return;
            }
        };
        if ok {
            self.transition(AdvertisingState::Advertising);
            let message = if restarted {
                "manufacturer data updated, advertising restarted"
            } else {
                "advertising started"
            };
            respond(responder, Ok(message.to_string()));
        } else {
            warn!(error_code, "advertising start failed");
            self.transition(AdvertisingState::Failed(error_code));
            respond(responder, Err(PeripheralError::AdvertisingStart(error_code)));
        }
    }

    fn transition(&mut self, next: AdvertisingState) {
        debug!(from = ?self.state, to = ?next, "advertising state");
        self.state = next;
    }
}
