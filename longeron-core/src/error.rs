//! Error taxonomy for all longeron operations.

use std::io;
use thiserror::Error;

/// Main error type for longeron operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LongeronError {
    // --- Configuration ---
    /// The endpoint string could not be parsed (`tcp://host:port` expected).
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The operation is not defined for this socket type.
    #[error("operation not valid for {0} socket")]
    InvalidSocketType(&'static str),

    /// The socket has no listener (`bind` was never called).
    #[error("socket is not bound")]
    NotBound,

    /// The socket has no live connection.
    #[error("socket is not connected")]
    NotConnected,

    // --- Protocol ---
    /// Malformed frame on the wire (illegal flag byte, bad length field).
    #[error("malformed frame: {0}")]
    BadFrame(&'static str),

    /// Malformed or unknown ZMTP command.
    #[error("malformed command: {0}")]
    BadCommand(String),

    /// The peer advertised a security mechanism we do not speak.
    #[error("unsupported security mechanism: {0}")]
    MechanismUnsupported(String),

    // --- Transport ---
    /// The peer closed the stream.
    #[error("stream ended")]
    StreamEnded,

    /// No data immediately available on a non-blocking read.
    ///
    /// Internal to the subscription harvester; never surfaced to callers.
    #[error("operation would block")]
    WouldBlock,

    /// OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // --- Usage ---
    /// The caller-provided receive buffer is smaller than the message.
    #[error("receive buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// The operation is never legal in this situation.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

/// Result type alias for longeron operations.
pub type Result<T> = std::result::Result<T, LongeronError>;

impl LongeronError {
    /// True if this error means the connection it occurred on is dead and
    /// must be removed from its socket.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::StreamEnded
                | Self::Io(_)
                | Self::BadFrame(_)
                | Self::BadCommand(_)
                | Self::MechanismUnsupported(_)
        )
    }
}
