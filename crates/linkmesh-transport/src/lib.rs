//! # linkmesh-transport
//!
//! The L1 transport boundary: the [`traits::Transport`] /
//! [`traits::PortProcessor`] / [`traits::PortHandlers`] trait trio a
//! concrete transport must implement, plus [`memory::MemoryTransport`], the
//! in-memory reference implementation used to exercise `linkmesh-conn`.
//!
//! linkmesh does not ship a stdio, WebSocket, or gRPC transport — those are
//! out of scope here. Anyone embedding linkmesh over a real wire implements
//! [`traits::Transport`] for their own I/O and gets handshake/routing
//! semantics for free from `linkmesh-conn`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod runtime;
pub mod traits;

pub use error::TransportError;
pub use memory::{MemoryHub, MemoryTransport};
pub use traits::{CreateProcessor, OnAccept, PortHandlers, PortProcessor, Transport};

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::error::TransportError;
    pub use crate::memory::{MemoryHub, MemoryTransport};
    pub use crate::traits::{CreateProcessor, OnAccept, PortHandlers, PortProcessor, Transport};
}
