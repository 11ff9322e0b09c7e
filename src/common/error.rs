use thiserror::Error;
use uuid::Uuid;

/// Library error type.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeripheralError {
    /// Reported when an operation names a service uuid that was never
    /// registered.
    #[error("service not found: {0}")]
    ServiceNotFound(Uuid),
    /// Reported when an operation names a characteristic uuid that is not
    /// part of the given service.
    #[error("characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),
    /// A central issued a read at a non-zero offset; partial reads are not
    /// supported.
    #[error("invalid read offset: {0}")]
    InvalidOffset(u32),
    /// `start` was called while the advertiser is not idle. There is exactly
    /// one start in flight at a time; callers must not queue behind it.
    #[error("advertising is not idle")]
    NotIdle,
    /// A manufacturer-data update triggered a stop/settle/restart sequence
    /// that has not completed yet. Concurrent updates are rejected, not
    /// queued.
    #[error("advertising restart already in progress")]
    RestartInProgress,
    /// The radio driver rejected an advertising start, asynchronously, with
    /// a platform error code.
    #[error("advertising start failed with driver code {0}")]
    AdvertisingStart(i32),
    /// `stop` was issued while an advertising start was still pending; the
    /// start cannot complete and its caller is released with this error.
    #[error("advertising start aborted by stop")]
    StartAborted,
    /// The radio driver is not usable (adapter off, missing, or claimed by
    /// another process).
    #[error("bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),
    /// The engine task is no longer running, so the call can never be
    /// answered.
    #[error("peripheral engine stopped")]
    EngineStopped,
    /// A condition that should be impossible. Returned instead of panicking
    /// when an internal invariant does not hold.
    #[error("internal error: {0}")]
    Internal(String),
}
