use std::fmt;

/// Opaque identifier for a connected central, as reported by the radio
/// driver. BLE public/random addresses are 48-bit, so the six LSB of the
/// inner value carry the address on address-based platforms; drivers that
/// hand out connection handles instead may use the full width.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct DeviceId(u64);

impl DeviceId {
    pub const fn new(raw: u64) -> Self {
        DeviceId(raw)
    }
}

impl From<u64> for DeviceId {
    fn from(raw: u64) -> Self {
        DeviceId(raw)
    }
}

impl From<DeviceId> for u64 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_round_trips_through_u64() {
        let id = DeviceId::new(0x112233445566);
        assert_eq!(u64::from(id), 0x112233445566);
    }

    #[test]
    fn device_id_displays_as_mac() {
        let id = DeviceId::new(0x112233445566);
        assert_eq!(id.to_string(), "11:22:33:44:55:66");
    }
}
