use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Edid(#[from] crate::edid::Error),
    #[error(transparent)]
    Hardware(#[from] HardwareError),
    #[error("Receiver driver has shut down")]
    DriverClosed,
}

/// Failures reported by the hardware collaborator.
///
/// None of these are fatal to the engine. A failed read is treated as
/// "nothing changed this tick" and a failed write is retried on the next
/// opportunity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("Register access timed out")]
    Timeout,
    #[error("Capability block {0} could not be read")]
    BlockUnavailable(u8),
    #[error("Register access failed: {0}")]
    Access(String),
}
