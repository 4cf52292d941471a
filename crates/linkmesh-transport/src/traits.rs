//! The L1 transport boundary.
//!
//! linkmesh does not implement any concrete transport (stdio, websocket,
//! gRPC, ...) — that's out of scope here. What lives here is the trait
//! surface an L1 implementation must satisfy, plus one concrete
//! [`crate::memory::MemoryTransport`] used to exercise `linkmesh-conn`
//! end-to-end in tests.
//!
//! `listen` is push-based (a callback fires per accepted channel) and
//! `connect` is a single async call that returns an already-wired
//! [`PortProcessor`]. This mirrors a listener/acceptor split the way a
//! transport listener trait normally would, but inverted to a callback
//! because the connection manager must install handlers atomically with
//! channel acceptance (the pre-install buffer).

use std::sync::Arc;

use async_trait::async_trait;
use linkmesh_core::error::ConnError;
use linkmesh_core::message::WireMessage;
use linkmesh_core::metadata::Metadata;

/// Callbacks a logical connection installs on its `PortProcessor` at
/// construction time.
///
/// Implementations MUST deliver `on_logical_message` calls for a single
/// port in FIFO arrival order (§5, "Ordering guarantees").
pub trait PortHandlers: Send + Sync {
    /// A message arrived on the port.
    fn on_logical_message(&self, msg: WireMessage);

    /// The port was disconnected (remote close, I/O error, etc).
    fn on_disconnect(&self);

    /// The port detected a malformed frame before it could be decoded
    /// into a [`WireMessage`].
    fn on_protocol_error(&self, err: ConnError);
}

/// A single bidirectional channel, already wired to a set of
/// [`PortHandlers`] (§6).
#[async_trait]
pub trait PortProcessor: Send + Sync {
    /// Send a message on this port.
    async fn send(&self, msg: WireMessage) -> Result<(), ConnError>;

    /// Close the port. Idempotent.
    async fn close(&self) -> Result<(), ConnError>;
}

/// A factory that installs handlers on a not-yet-constructed port and
/// returns the resulting processor — the `create_processor` argument to
/// `on_accept` in §6.
pub type CreateProcessor =
    Box<dyn FnOnce(Arc<dyn PortHandlers>) -> Box<dyn PortProcessor> + Send>;

/// Invoked once per accepted incoming channel (§6).
pub type OnAccept = Arc<dyn Fn(CreateProcessor, Metadata) + Send + Sync>;

/// The L1 transport contract (§6).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start listening for incoming channels. `on_accept` is invoked once
    /// per accepted channel with a processor factory and the
    /// transport-discovered platform metadata for that channel.
    async fn listen(&self, on_accept: OnAccept) -> Result<(), ConnError>;

    /// Dial `descriptor`, returning the resulting port (already wired to
    /// `handlers`) and the platform metadata the transport discovered for
    /// it.
    async fn connect(
        &self,
        descriptor: &Metadata,
        handlers: Arc<dyn PortHandlers>,
    ) -> Result<(Box<dyn PortProcessor>, Metadata), ConnError>;
}
