//! Error types for framewire.

use thiserror::Error;

/// Main error type for all framewire operations.
#[derive(Debug, Error)]
pub enum FramewireError {
    /// I/O error on the underlying connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (bad varint, oversized frame, ...).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Peer closed the connection at a frame boundary.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The remote handler failed; carries the response `Error` string.
    #[error("{0}")]
    Remote(String),

    /// The connection went away while a call was still pending.
    #[error("connection is shut down")]
    Shutdown,
}

impl FramewireError {
    /// Whether this error leaves the connection unusable.
    ///
    /// Only application errors are scoped to a single call.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FramewireError::Remote(_))
    }
}

/// Result type alias using FramewireError.
pub type Result<T> = std::result::Result<T, FramewireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_is_not_fatal() {
        assert!(!FramewireError::Remote("not found".into()).is_fatal());
        assert!(FramewireError::ConnectionClosed.is_fatal());
        assert!(FramewireError::Protocol("bad".into()).is_fatal());
    }

    #[test]
    fn test_remote_error_displays_message_verbatim() {
        let err = FramewireError::Remote("not found".into());
        assert_eq!(err.to_string(), "not found");
    }
}
