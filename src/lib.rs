//! Peripheral-role BLE GATT and advertising engine.
//!
//! The engine coordinates a GATT service registry, the set of connected
//! centrals, and an advertising lifecycle (including the stop/settle/restart
//! sequence that payload changes require) on a single task fed by one event
//! queue. The platform Bluetooth stack sits behind the [`RadioDriver`]
//! trait; an application talks to the engine through [`ClientProvider`] and
//! receives characteristic writes through [`WriteEventCallback`].

pub mod advertising;
pub mod client_provider;
pub mod common;
pub mod engine;
pub mod gatt;
pub mod radio_provider;

use tokio::sync::mpsc;
use tracing::info;

pub use advertising::{
    Advertisement, AdvertiseMode, AdvertisingConfig, AdvertisingState, ManufacturerData,
    TxPowerLevel, DEFAULT_LOCAL_NAME, RESTART_SETTLE_DELAY,
};
pub use client_provider::ClientProvider;
pub use common::{DeviceId, PeripheralError};
pub use engine::{Engine, ProviderEvent};
pub use gatt::{
    permissions, properties, Characteristic, Service, ServiceKind, WriteEvent, WriteEventCallback,
};
pub use radio_provider::{GattResponseStatus, RadioDriver, RadioEventCallback, RadioEventMsg};

const PROVIDER_EVENT_CHANNEL_BUF_SIZE: usize = 100;

/// The assembled peripheral: the engine plus the two provider handles that
/// feed it. Run [`Engine::run`] on its own task; hand
/// [`RadioEventCallback`] to the driver side and use [`ClientProvider`]
/// from the application.
pub struct PeripheralEngine {
    pub engine: Engine,
    pub client_provider: ClientProvider,
    pub radio_event_callback: RadioEventCallback,
}

impl PeripheralEngine {
    pub fn new(driver: Box<dyn RadioDriver>, write_callback: Box<dyn WriteEventCallback>) -> Self {
        Self::with_config(driver, write_callback, AdvertisingConfig::default())
    }

    /// Assembles an engine with an explicit advertising configuration
    /// (name, tx power, mode, settle delay). Each call builds a fully
    /// independent instance.
    pub fn with_config(
        driver: Box<dyn RadioDriver>,
        write_callback: Box<dyn WriteEventCallback>,
        config: AdvertisingConfig,
    ) -> Self {
        info!("create peripheral engine");
        let (provider_tx, provider_rx) =
            mpsc::channel::<ProviderEvent>(PROVIDER_EVENT_CHANNEL_BUF_SIZE);
        Self {
            engine: Engine::new(provider_rx, driver, write_callback, config),
            client_provider: ClientProvider::new(provider_tx.clone()),
            radio_event_callback: RadioEventCallback::new(provider_tx),
        }
    }
}
