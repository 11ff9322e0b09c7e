mod device;
mod error;

pub use device::DeviceId;
pub use error::PeripheralError;
