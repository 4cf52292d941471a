//! # linkmesh
//!
//! The L2 logical-connection and routing layer of a multi-layer RPC
//! framework. linkmesh turns point-to-point transport channels into named,
//! authenticated, reusable logical connections, and routes application
//! messages across them by identity, service group, or predicate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use linkmesh::prelude::*;
//! use linkmesh::transport::MemoryTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), ConnError> {
//! let transport = MemoryTransport::pair().0;
//! let verify: VerifyFn = Arc::new(|_metadata, _ctx| Box::pin(async { Ok(true) }));
//! let manager = ConnectionManager::new(
//!     Box::new(transport),
//!     Arc::new(NoopHandlers),
//!     verify,
//!     Metadata::empty(),
//!     ManagerConfig::new(),
//! );
//! manager.initialize().await?;
//! # Ok(())
//! # }
//!
//! struct NoopHandlers;
//! impl ManagerHandlers for NoopHandlers {
//!     fn on_message(&self, _msg: WireMessage, _connection_id: ConnectionId) {}
//!     fn on_disconnect(&self, _connection_id: ConnectionId, _identity: Option<Metadata>) {}
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`mod@core`] / [`linkmesh_core`] — metadata, wire messages, errors.
//!   Runtime-agnostic.
//! - [`transport`] / [`linkmesh_transport`] — the L1 `Transport` boundary
//!   plus the in-memory reference transport.
//! - [`conn`] / [`linkmesh_conn`] — `LogicalConnection` and
//!   `ConnectionManager`, the core of this crate.
//!
//! linkmesh does not ship a real L1 transport or an RPC engine (L3); both
//! are out of scope, specified only at their interface boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

// Re-export the connection layer's public surface at the crate root —
// it's what most callers reach for first.
pub use linkmesh_conn::{
    ConnectionContext, ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionStatus,
    LogicalConnection, ManagerConfig, ManagerHandlers, ResolveOptions, SendTarget, VerifyFn,
};
pub use linkmesh_core::error::ConnError;
pub use linkmesh_core::ids::{ConnectionId, IdAllocator, MessageId};
pub use linkmesh_core::message::{SerializedError, WireMessage};
pub use linkmesh_core::metadata::{Matcher, Metadata};

/// Metadata/descriptor types, the wire message enum, and the error
/// taxonomy (runtime-agnostic).
pub mod core {
    pub use linkmesh_core::*;
}

/// The L1 transport boundary: `Transport`/`PortProcessor`/`PortHandlers`
/// plus the in-memory reference transport.
pub mod transport {
    pub use linkmesh_transport::*;
}

/// `LogicalConnection` and `ConnectionManager`.
pub mod conn {
    pub use linkmesh_conn::*;
}

pub mod prelude;

#[cfg(test)]
mod tests {
    #[test]
    fn prelude_imports_compile() {
        use crate::prelude::*;
        let _ = std::any::type_name::<ConnectionManager>();
    }
}
