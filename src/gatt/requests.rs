use tracing::{debug, warn};
use uuid::Uuid;

use crate::common::{DeviceId, PeripheralError};
use crate::gatt::registry::ServiceRegistry;

/// A write received from a connected central, surfaced to the embedding
/// application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    pub device: DeviceId,
    pub data: Vec<u8>,
}

/// Application-side sink for write events. Invoked on every write request,
/// whether or not the central asked for a response.
pub trait WriteEventCallback: Send {
    fn on_write(&self, event: WriteEvent);
}

/// Answers characteristic read/write requests against the registry.
pub struct GattRequestHandler {
    write_callback: Box<dyn WriteEventCallback>,
}

impl GattRequestHandler {
    pub fn new(write_callback: Box<dyn WriteEventCallback>) -> Self {
        Self { write_callback }
    }

    /// Serves a read request. Partial reads are not supported: any non-zero
    /// offset is rejected before the value is looked at. No side effects.
    pub fn on_read_request(
        &self,
        registry: &ServiceRegistry,
        device: DeviceId,
        service: Uuid,
        characteristic: Uuid,
        offset: u32,
    ) -> Result<Vec<u8>, PeripheralError> {
        if offset != 0 {
            debug!(%device, %characteristic, offset, "read at non-zero offset rejected");
            return Err(PeripheralError::InvalidOffset(offset));
        }
        let value = registry.characteristic(service, characteristic)?.value().to_vec();
        debug!(%device, %characteristic, len = value.len(), "read request served");
        Ok(value)
    }

    /// Applies a write request: the value is stored unconditionally
    /// (property and permission bits are the radio driver's concern) and the
    /// application is told about the write.
    pub fn on_write_request(
        &self,
        registry: &mut ServiceRegistry,
        device: DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), PeripheralError> {
        match registry.characteristic_mut(service, characteristic) {
            Ok(ch) => ch.set_value(value.to_vec()),
            Err(e) => {
                warn!(%device, %characteristic, error = %e, "write request for unknown attribute");
                return Err(e);
            }
        }
        debug!(%device, %characteristic, len = value.len(), "write request applied");
        self.write_callback.on_write(WriteEvent {
            device,
            data: value.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::gatt::registry::{permissions, properties, Characteristic, ServiceKind};

    const DEV: DeviceId = DeviceId::new(0xC0FFEE);

    struct RecordingCallback {
        tx: mpsc::Sender<WriteEvent>,
    }

    impl WriteEventCallback for RecordingCallback {
        fn on_write(&self, event: WriteEvent) {
            self.tx.send(event).unwrap();
        }
    }

    fn registry_with_char(service: Uuid, characteristic: Uuid) -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry.add_service(service, ServiceKind::Primary);
        registry
            .add_characteristic(
                service,
                Characteristic::new(
                    characteristic,
                    properties::READ | properties::WRITE,
                    permissions::READ | permissions::WRITE,
                ),
            )
            .unwrap();
        registry
    }

    fn handler() -> (GattRequestHandler, mpsc::Receiver<WriteEvent>) {
        let (tx, rx) = mpsc::channel();
        (GattRequestHandler::new(Box::new(RecordingCallback { tx })), rx)
    }

    #[test]
    fn read_at_offset_zero_returns_stored_value() {
        let service = Uuid::from_u128(1);
        let ch = Uuid::from_u128(10);
        let mut registry = registry_with_char(service, ch);
        registry.characteristic_mut(service, ch).unwrap().set_value(vec![1, 2, 3]);
        let (handler, _rx) = handler();

        let value = handler.on_read_request(&registry, DEV, service, ch, 0).unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[test]
    fn read_at_nonzero_offset_is_invalid_regardless_of_length() {
        let service = Uuid::from_u128(1);
        let ch = Uuid::from_u128(10);
        let mut registry = registry_with_char(service, ch);
        registry
            .characteristic_mut(service, ch)
            .unwrap()
            .set_value(vec![0; 32]);
        let (handler, _rx) = handler();

        let result = handler.on_read_request(&registry, DEV, service, ch, 5);
        assert_eq!(result, Err(PeripheralError::InvalidOffset(5)));
    }

    #[test]
    fn write_stores_value_and_emits_event() {
        let service = Uuid::from_u128(1);
        let ch = Uuid::from_u128(10);
        let mut registry = registry_with_char(service, ch);
        let (handler, rx) = handler();

        handler
            .on_write_request(&mut registry, DEV, service, ch, &[9, 8, 7])
            .unwrap();

        assert_eq!(registry.characteristic(service, ch).unwrap().value(), &[9, 8, 7]);
        let event = rx.try_recv().unwrap();
        assert_eq!(event, WriteEvent { device: DEV, data: vec![9, 8, 7] });
    }

    #[test]
    fn write_to_unknown_characteristic_emits_no_event() {
        let service = Uuid::from_u128(1);
        let mut registry = registry_with_char(service, Uuid::from_u128(10));
        let (handler, rx) = handler();

        let result =
            handler.on_write_request(&mut registry, DEV, service, Uuid::from_u128(99), &[1]);

        assert_eq!(
            result,
            Err(PeripheralError::CharacteristicNotFound(Uuid::from_u128(99)))
        );
        assert!(rx.try_recv().is_err());
    }
}
