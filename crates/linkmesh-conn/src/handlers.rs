//! The L3 handler contract.

use linkmesh_core::message::WireMessage;
use linkmesh_core::metadata::Metadata;
use linkmesh_core::ConnectionId;

/// Callbacks the `ConnectionManager` invokes on its owner (the RPC engine,
/// "L3"). Notifications only; no return value crosses back into the
/// manager from here, matching [`linkmesh_transport::PortHandlers`]'s
/// synchronous-notification shape one layer down.
pub trait ManagerHandlers: Send + Sync {
    /// An application payload arrived on `connection_id` (handshake and
    /// identity-update traffic is never forwarded here — only
    /// `WireMessage::Application`).
    fn on_message(&self, msg: WireMessage, connection_id: ConnectionId);

    /// `connection_id` was removed from the manager. `identity` is `Some`
    /// iff the connection ever reached Connected (§3 invariant 4).
    fn on_disconnect(&self, connection_id: ConnectionId, identity: Option<Metadata>);
}
