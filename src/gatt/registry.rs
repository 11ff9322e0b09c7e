use tracing::debug;
use uuid::Uuid;

use crate::common::PeripheralError;

/// GATT characteristic property bits (Bluetooth Core Spec Vol 3, Part G,
/// §3.3.1.1). These are the values the platform GATT stacks expose.
pub mod properties {
    pub const BROADCAST: u16 = 0x0001;
    pub const READ: u16 = 0x0002;
    pub const WRITE_WITHOUT_RESPONSE: u16 = 0x0004;
    pub const WRITE: u16 = 0x0008;
    pub const NOTIFY: u16 = 0x0010;
    pub const INDICATE: u16 = 0x0020;
    pub const SIGNED_WRITE: u16 = 0x0040;
    pub const EXTENDED_PROPS: u16 = 0x0080;
}

/// Attribute permission bits, matching the platform GATT server encoding.
pub mod permissions {
    pub const READ: u16 = 0x0001;
    pub const READ_ENCRYPTED: u16 = 0x0002;
    pub const READ_ENCRYPTED_MITM: u16 = 0x0004;
    pub const WRITE: u16 = 0x0010;
    pub const WRITE_ENCRYPTED: u16 = 0x0020;
    pub const WRITE_ENCRYPTED_MITM: u16 = 0x0040;
    pub const WRITE_SIGNED: u16 = 0x0080;
    pub const WRITE_SIGNED_MITM: u16 = 0x0100;
}

/// A single GATT characteristic and its current value. Owned exclusively by
/// its service; the value starts empty and is replaced whole by writes and
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    uuid: Uuid,
    properties: u16,
    permissions: u16,
    value: Vec<u8>,
}

impl Characteristic {
    pub fn new(uuid: Uuid, properties: u16, permissions: u16) -> Self {
        Characteristic {
            uuid,
            properties,
            permissions,
            value: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn properties(&self) -> u16 {
        self.properties
    }

    pub fn permissions(&self) -> u16 {
        self.permissions
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn set_value(&mut self, value: Vec<u8>) {
        self.value = value;
    }

    /// Whether change pushes to this characteristic use acknowledged
    /// delivery (indication) rather than plain notification.
    pub fn supports_indicate(&self) -> bool {
        self.properties & properties::INDICATE != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Primary,
    Secondary,
}

/// A GATT service: a uuid, a kind, and its characteristics in insertion
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    uuid: Uuid,
    kind: ServiceKind,
    characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn new(uuid: Uuid, kind: ServiceKind) -> Self {
        Service {
            uuid,
            kind,
            characteristics: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    pub fn characteristic(&self, uuid: Uuid) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }

    fn characteristic_mut(&mut self, uuid: Uuid) -> Option<&mut Characteristic> {
        self.characteristics.iter_mut().find(|c| c.uuid == uuid)
    }
}

/// The set of services configured on this peripheral, in insertion order.
/// Uuid uniqueness across services is enforced here; uniqueness of
/// characteristic uuids within a service is the caller's responsibility.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service. Re-registering an existing uuid is ignored; the
    /// skip is logged, not reported.
    pub fn add_service(&mut self, uuid: Uuid, kind: ServiceKind) {
        if self.service(uuid).is_some() {
            debug!(%uuid, "service already registered, ignoring");
            return;
        }
        debug!(%uuid, ?kind, "service registered");
        self.services.push(Service::new(uuid, kind));
    }

    /// Appends a characteristic to an existing service.
    pub fn add_characteristic(
        &mut self,
        service_uuid: Uuid,
        characteristic: Characteristic,
    ) -> Result<(), PeripheralError> {
        let service = self
            .service_mut(service_uuid)
            .ok_or(PeripheralError::ServiceNotFound(service_uuid))?;
        debug!(service = %service_uuid, characteristic = %characteristic.uuid(), "characteristic added");
        service.characteristics.push(characteristic);
        Ok(())
    }

    pub fn service(&self, uuid: Uuid) -> Option<&Service> {
        self.services.iter().find(|s| s.uuid == uuid)
    }

    fn service_mut(&mut self, uuid: Uuid) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.uuid == uuid)
    }

    pub fn characteristic(
        &self,
        service_uuid: Uuid,
        char_uuid: Uuid,
    ) -> Result<&Characteristic, PeripheralError> {
        self.service(service_uuid)
            .ok_or(PeripheralError::ServiceNotFound(service_uuid))?
            .characteristic(char_uuid)
            .ok_or(PeripheralError::CharacteristicNotFound(char_uuid))
    }

    pub fn characteristic_mut(
        &mut self,
        service_uuid: Uuid,
        char_uuid: Uuid,
    ) -> Result<&mut Characteristic, PeripheralError> {
        self.service_mut(service_uuid)
            .ok_or(PeripheralError::ServiceNotFound(service_uuid))?
            .characteristic_mut(char_uuid)
            .ok_or(PeripheralError::CharacteristicNotFound(char_uuid))
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Service uuids in registration order, for advertisement assembly.
    pub fn service_uuids(&self) -> Vec<Uuid> {
        self.services.iter().map(|s| s.uuid).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn duplicate_service_is_ignored() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(uuid(1), ServiceKind::Primary);
        registry.add_service(uuid(1), ServiceKind::Secondary);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.service(uuid(1)).unwrap().kind(), ServiceKind::Primary);
    }

    #[test]
    fn add_characteristic_to_unknown_service_fails_without_mutation() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(uuid(1), ServiceKind::Primary);

        let result = registry.add_characteristic(
            uuid(2),
            Characteristic::new(uuid(10), properties::READ, permissions::READ),
        );

        assert_eq!(result, Err(PeripheralError::ServiceNotFound(uuid(2))));
        assert!(registry.service(uuid(1)).unwrap().characteristics().is_empty());
    }

    #[test]
    fn service_uuids_preserve_insertion_order() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(uuid(3), ServiceKind::Primary);
        registry.add_service(uuid(1), ServiceKind::Primary);
        registry.add_service(uuid(2), ServiceKind::Secondary);

        assert_eq!(registry.service_uuids(), vec![uuid(3), uuid(1), uuid(2)]);
    }

    #[test]
    fn characteristic_value_starts_empty_and_is_replaced_whole() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(uuid(1), ServiceKind::Primary);
        registry
            .add_characteristic(
                uuid(1),
                Characteristic::new(uuid(10), properties::READ | properties::NOTIFY, permissions::READ),
            )
            .unwrap();

        assert!(registry.characteristic(uuid(1), uuid(10)).unwrap().value().is_empty());

        registry
            .characteristic_mut(uuid(1), uuid(10))
            .unwrap()
            .set_value(vec![0xAA, 0xBB]);
        assert_eq!(registry.characteristic(uuid(1), uuid(10)).unwrap().value(), &[0xAA, 0xBB]);
    }

    #[test]
    fn indicate_bit_selects_acknowledged_delivery() {
        let ch = Characteristic::new(uuid(10), properties::NOTIFY, 0);
        assert!(!ch.supports_indicate());

        let ch = Characteristic::new(uuid(10), properties::NOTIFY | properties::INDICATE, 0);
        assert!(ch.supports_indicate());
    }
}
