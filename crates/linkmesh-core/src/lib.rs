//! # linkmesh-core
//!
//! Metadata, wire message, and error types shared across linkmesh's
//! transport and connection-manager crates.
//!
//! This crate is runtime-agnostic and does not depend on any async runtime
//! or on a concrete transport. It provides:
//!
//! - [`metadata::Metadata`]: the opaque `UserMetadata`/`PlatformMetadata`
//!   record, with deep-partial-match, shallow merge, and canonical-JSON
//!   support.
//! - [`ids`]: monotonic `ConnectionId`/`MessageId` allocation.
//! - [`message::WireMessage`]: the handshake/identity-update wire protocol.
//! - [`error::ConnError`]: the unified error type.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod message;
pub mod metadata;

pub use error::{ConnError, ConnResultExt};
pub use ids::{ConnectionId, IdAllocator, MessageId};
pub use message::{SerializedError, WireMessage};
pub use metadata::{Matcher, Metadata};

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::error::{ConnError, ConnResultExt, ErrorContext};
    pub use crate::ids::{ConnectionId, IdAllocator, MessageId};
    pub use crate::message::{SerializedError, WireMessage};
    pub use crate::metadata::{Matcher, Metadata};
}
