//! Error types for the wire protocol crate.

use std::io;

/// Errors that can occur while framing, parsing, or passing fds over the
/// hexa control socket.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON.
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The frame was valid JSON but missing its `type` discriminator.
    #[error("missing type field")]
    MissingType,

    /// A required field was absent from an otherwise well-formed message.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A uuid-shaped field did not parse as 32 lowercase hex characters.
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    /// A message documented to carry a file descriptor arrived without one.
    #[error("no file descriptor received")]
    NoFdReceived,

    /// Sending or receiving ancillary data failed at the syscall layer.
    #[error("fd passing failed: {0}")]
    FdPassing(String),

    /// The peer closed the connection (EOF mid-frame or otherwise).
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for protocol-layer results.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
