//! The primary error type surfaced by linkmesh.
//!
//! Every fallible operation across `linkmesh-conn` and `linkmesh-transport`
//! resolves to one of five kinds. Large variants are boxed to keep
//! `Result<T, ConnError>` small.

use miette::Diagnostic;
use thiserror::Error;

use super::codes;
use super::transport::{TransportContext, TransportErrorKind};

/// An error record attached to a [`ConnError`] variant: a free-form
/// human-readable note plus whatever connection/descriptor the failure was
/// about.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The connection this error concerns, if any.
    pub connection_id: Option<String>,
    /// The descriptor key this error concerns, if any (dial/resolve path).
    pub descriptor_key: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
}

impl ErrorContext {
    /// An empty context.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach a connection id.
    #[must_use]
    pub fn with_connection(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// Attach a descriptor key.
    #[must_use]
    pub fn with_descriptor(mut self, key: impl Into<String>) -> Self {
        self.descriptor_key = Some(key.into());
        self
    }
}

/// The primary error type for linkmesh's connection/routing core.
#[derive(Error, Diagnostic, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ConnError {
    /// The passive side's `verify` hook returned `false` (§4.1 step 3).
    #[error("handshake rejected: {message}")]
    #[diagnostic(code(linkmesh::handshake::rejected))]
    HandshakeRejected {
        /// Human-readable detail.
        message: String,
        /// Context (connection id, etc).
        context: ErrorContext,
    },

    /// The dial failed, or the remote closed before verification (§7).
    #[error("handshake failed: {message}")]
    #[diagnostic(code(linkmesh::handshake::failed))]
    HandshakeFailed {
        /// Human-readable detail.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<ConnError>>,
        /// Context.
        context: ErrorContext,
    },

    /// An operation was called in a forbidden state (not initialized, a
    /// second `initiate_handshake`, etc).
    #[error("invalid usage: {message}")]
    #[diagnostic(code(linkmesh::usage::invalid))]
    UsageInvalid {
        /// Human-readable detail.
        message: String,
        /// Context.
        context: ErrorContext,
    },

    /// A malformed wire message was received; the connection is closed.
    #[error("protocol error: {message}")]
    #[diagnostic(code(linkmesh::protocol::error))]
    ProtocolError {
        /// Human-readable detail.
        message: String,
        /// Context.
        context: ErrorContext,
    },

    /// A transport-layer (L1) failure, bubbled unchanged.
    #[error("endpoint error ({kind}): {message}")]
    #[diagnostic(code(linkmesh::endpoint::error))]
    Endpoint {
        /// Classification of the transport failure.
        kind: TransportErrorKind,
        /// Human-readable detail.
        message: String,
        /// Transport-supplied context.
        transport_context: TransportContext,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Context wrapper used by [`super::context::ConnResultExt`].
    #[error("{context}")]
    #[diagnostic(code(linkmesh::context))]
    WithContext {
        /// The context note.
        context: String,
        /// The wrapped error.
        #[source]
        source: Box<ConnError>,
    },
}

impl ConnError {
    /// The machine-readable code for this error, per §7.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::HandshakeRejected { .. } => codes::HANDSHAKE_REJECTED,
            Self::HandshakeFailed { .. } => codes::HANDSHAKE_FAILED,
            Self::UsageInvalid { .. } => codes::USAGE_INVALID,
            Self::ProtocolError { .. } => codes::PROTOCOL_ERROR,
            Self::Endpoint { .. } => codes::ENDPOINT,
            Self::WithContext { source, .. } => source.code(),
        }
    }

    /// Build a [`Self::HandshakeRejected`].
    pub fn handshake_rejected(message: impl Into<String>) -> Self {
        Self::HandshakeRejected {
            message: message.into(),
            context: ErrorContext::empty(),
        }
    }

    /// Build a [`Self::HandshakeFailed`] with no further cause.
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            message: message.into(),
            source: None,
            context: ErrorContext::empty(),
        }
    }

    /// Build a [`Self::HandshakeFailed`] wrapping an underlying cause.
    pub fn handshake_failed_from(message: impl Into<String>, cause: Self) -> Self {
        Self::HandshakeFailed {
            message: message.into(),
            source: Some(Box::new(cause)),
            context: ErrorContext::empty(),
        }
    }

    /// Build a [`Self::UsageInvalid`].
    pub fn usage_invalid(message: impl Into<String>) -> Self {
        Self::UsageInvalid {
            message: message.into(),
            context: ErrorContext::empty(),
        }
    }

    /// Build a [`Self::ProtocolError`].
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
            context: ErrorContext::empty(),
        }
    }

    /// Attach/replace the [`ErrorContext`] on variants that carry one.
    #[must_use]
    pub fn with_error_context(mut self, ctx: ErrorContext) -> Self {
        match &mut self {
            Self::HandshakeRejected { context, .. }
            | Self::HandshakeFailed { context, .. }
            | Self::UsageInvalid { context, .. }
            | Self::ProtocolError { context, .. } => *context = ctx,
            Self::Endpoint { .. } | Self::WithContext { .. } => {}
        }
        self
    }

    /// `true` iff this is an [`Self::Endpoint`] variant.
    #[must_use]
    pub fn is_endpoint(&self) -> bool {
        matches!(self, Self::Endpoint { .. })
    }
}
