//! Prelude module for convenient imports.
//!
//! ```rust
//! use linkmesh::prelude::*;
//!
//! let descriptor = Metadata::new(serde_json::json!({"service": "billing"}));
//! let options = ResolveOptions::find_or_create(descriptor);
//! assert!(options.descriptor.is_some());
//! ```

pub use linkmesh_conn::{
    ConnectionContext, ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionStatus,
    LogicalConnection, ManagerConfig, ManagerHandlers, ResolveOptions, SendTarget, VerifyFn,
};
pub use linkmesh_core::error::{ConnError, ConnResultExt};
pub use linkmesh_core::ids::{ConnectionId, IdAllocator, MessageId};
pub use linkmesh_core::message::{SerializedError, WireMessage};
pub use linkmesh_core::metadata::{Matcher, Metadata};
