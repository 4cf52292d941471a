//! Transport error types and their conversion into [`ConnError::Endpoint`].

use linkmesh_core::error::{ConnError, TransportContext, TransportErrorKind};
use thiserror::Error;

/// Errors that can occur in the in-memory reference transport. A real L1
/// transport would define its own `TransportError`-shaped type; this one
/// only needs to cover what [`crate::memory::MemoryTransport`] can fail
/// with.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer's channel was dropped or the peer already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// `connect` was attempted on a transport with no dial target
    /// configured for the given descriptor.
    #[error("no dial target for descriptor: {descriptor}")]
    NoDialTarget {
        /// The descriptor's canonical JSON.
        descriptor: String,
    },

    /// A protocol-level framing error (malformed message).
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },
}

impl TransportError {
    /// Classify this error for [`ConnError::Endpoint`].
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::ConnectionClosed => TransportErrorKind::ConnectionClosed,
            Self::NoDialTarget { .. } => TransportErrorKind::ConnectionFailed,
            Self::Protocol { .. } => TransportErrorKind::ProtocolViolation,
        }
    }
}

impl From<TransportError> for ConnError {
    fn from(err: TransportError) -> Self {
        let kind = err.kind();
        Self::Endpoint {
            kind,
            message: err.to_string(),
            transport_context: TransportContext::new("memory"),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_closed_maps_to_connection_closed_kind() {
        assert_eq!(
            TransportError::ConnectionClosed.kind(),
            TransportErrorKind::ConnectionClosed
        );
    }

    #[test]
    fn converts_into_endpoint_conn_error() {
        let err: ConnError = TransportError::ConnectionClosed.into();
        assert!(err.is_endpoint());
    }
}
