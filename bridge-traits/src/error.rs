use thiserror::Error;

/// Failures reported by host capability implementations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host has torn down the sink (page closed, view destroyed).
    #[error("Host sink closed: {0}")]
    SinkClosed(String),

    #[error("Host rejected the call: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
