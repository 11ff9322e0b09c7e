pub mod connections;
pub mod notify;
pub mod registry;
pub mod requests;

pub use connections::ConnectionTracker;
pub use notify::NotificationBroadcaster;
pub use registry::{permissions, properties, Characteristic, Service, ServiceKind, ServiceRegistry};
pub use requests::{GattRequestHandler, WriteEvent, WriteEventCallback};
