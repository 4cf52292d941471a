//! # linkmesh-conn
//!
//! The L2 logical-connection and routing layer: the
//! [`connection::LogicalConnection`] handshake state machine and the
//! [`manager::ConnectionManager`] facade that pools, resolves, and routes
//! over them.
//!
//! `linkmesh-conn` never touches bytes on a wire — that's
//! `linkmesh-transport`'s [`linkmesh_transport::traits::Transport`] boundary
//! one layer down — and never interprets application payloads, leaving
//! that to whatever RPC engine owns a [`handlers::ManagerHandlers`] (L3).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod connection;
pub mod descriptor;
pub mod handlers;
pub mod manager;
pub mod status;

pub use config::ManagerConfig;
pub use connection::{ConnectionContext, ConnectionEvent, LogicalConnection, VerifyFn};
pub use descriptor::{ResolveOptions, SendTarget};
pub use handlers::ManagerHandlers;
pub use manager::{ConnectionHandle, ConnectionManager};
pub use status::ConnectionStatus;

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::config::ManagerConfig;
    pub use crate::connection::{ConnectionContext, ConnectionEvent, LogicalConnection, VerifyFn};
    pub use crate::descriptor::{ResolveOptions, SendTarget};
    pub use crate::handlers::ManagerHandlers;
    pub use crate::manager::{ConnectionHandle, ConnectionManager};
    pub use crate::status::ConnectionStatus;
}
