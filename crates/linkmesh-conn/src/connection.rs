//! The `LogicalConnection` state machine: per-connection handshake,
//! identity, and message routing.

use std::sync::Arc;

use futures::future::BoxFuture;
use linkmesh_core::error::{ConnError, ErrorContext};
use linkmesh_core::ids::{IdAllocator, MessageId};
use linkmesh_core::message::{SerializedError, WireMessage};
use linkmesh_core::metadata::Metadata;
use linkmesh_core::ConnectionId;
use linkmesh_transport::PortProcessor;

use crate::status::ConnectionStatus;

/// The immutable side-channel context of a connection: its id and the
/// transport-discovered platform metadata. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Unique within the owning manager.
    pub connection_id: ConnectionId,
    /// Transport-discovered, never forgeable by the remote (§3).
    pub platform_metadata: Metadata,
}

/// The passive side's admission policy hook, supplied by the caller.
/// May be asynchronous. An `Err` is treated as a verifier failure distinct
/// from a deliberate rejection (`Ok(false)`): the connection still closes,
/// but the error propagates out of `handle_message` instead of being
/// swallowed into a `HANDSHAKE_REJECT`.
pub type VerifyFn = Arc<dyn Fn(&Metadata, &ConnectionContext) -> BoxFuture<'static, Result<bool, ConnError>> + Send + Sync>;

/// A fact about a connection's state transition that the owning
/// `ConnectionManager` must react to (group index maintenance, resolving a
/// pending creation, forwarding to L3). Emitted by [`LogicalConnection::handle_message`]
/// and [`LogicalConnection::handle_disconnect`] rather than invoked as manager
/// callbacks directly, since a `LogicalConnection` holds no back-reference to
/// its manager — only its own id, to avoid an ownership cycle.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Handshake completed successfully; carries the now-set remote
    /// identity.
    Verified {
        /// The verified remote identity.
        remote_identity: Metadata,
    },
    /// `IDENTITY_UPDATE` applied while Connected.
    IdentityUpdated {
        /// The identity before the merge.
        old: Metadata,
        /// The identity after the merge.
        new: Metadata,
    },
    /// An application payload arrived while Connected; forward verbatim to
    /// L3's `on_message`.
    Application(WireMessage),
    /// The connection reached Closed; carries the identity iff the
    /// connection was ever verified (§3 invariant 4).
    Closed {
        /// `Some` iff `was_established`.
        identity: Option<Metadata>,
    },
}

/// A single point-to-point channel: drives the handshake, guards the
/// status machine, and shuttles application messages between its
/// [`PortProcessor`] and the owning `ConnectionManager` (§4.1).
pub struct LogicalConnection {
    context: ConnectionContext,
    status: ConnectionStatus,
    local_user_metadata: Metadata,
    remote_identity: Option<Metadata>,
    was_established: bool,
    port: Box<dyn PortProcessor>,
    verify: VerifyFn,
    ids: Arc<IdAllocator>,
}

impl LogicalConnection {
    /// Construct a connection in `Initializing`. Used for both incoming
    /// (accepted) and outgoing (dialed) channels; the only difference is
    /// which side calls [`Self::initiate_handshake`] afterwards.
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        platform_metadata: Metadata,
        local_user_metadata: Metadata,
        port: Box<dyn PortProcessor>,
        verify: VerifyFn,
        ids: Arc<IdAllocator>,
    ) -> Self {
        Self {
            context: ConnectionContext {
                connection_id,
                platform_metadata,
            },
            status: ConnectionStatus::Initializing,
            local_user_metadata,
            remote_identity: None,
            was_established: false,
            port,
            verify,
            ids,
        }
    }

    /// The connection's id.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.context.connection_id
    }

    /// The immutable side-channel context.
    #[must_use]
    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// `true` iff status = Connected (§4.1, `is_ready`).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// The remote's identity, if the handshake has progressed far enough
    /// to know it.
    #[must_use]
    pub fn remote_identity(&self) -> Option<&Metadata> {
        self.remote_identity.as_ref()
    }

    /// This side's own identity (possibly christened by the remote).
    #[must_use]
    pub fn local_user_metadata(&self) -> &Metadata {
        &self.local_user_metadata
    }

    /// Latched `true` once Connected is first reached (§3).
    #[must_use]
    pub fn was_established(&self) -> bool {
        self.was_established
    }

    fn transition(&mut self, next: ConnectionStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal connection transition {:?} -> {next:?}",
            self.status
        );
        self.status = next;
    }

    fn next_message_id(&self) -> MessageId {
        self.ids.next_message_id()
    }

    fn context_with_id(&self) -> ErrorContext {
        ErrorContext::empty().with_connection(self.context.connection_id.to_string())
    }

    /// Active side: send `HANDSHAKE_REQ` and transition to Handshaking
    /// (§4.1 step 1). `assign` optionally christens the passive peer with
    /// a new identity.
    pub async fn initiate_handshake(&mut self, assign: Option<Metadata>) -> Result<(), ConnError> {
        if self.status != ConnectionStatus::Initializing {
            return Err(
                ConnError::usage_invalid("initiate_handshake called outside Initializing")
                    .with_error_context(self.context_with_id()),
            );
        }
        let msg = WireMessage::HandshakeReq {
            id: self.next_message_id(),
            metadata: self.local_user_metadata.clone(),
            assigns: assign,
        };
        self.transition(ConnectionStatus::Handshaking);
        self.send(msg).await
    }

    /// Forward `msg` to the port. On send failure, closes self and
    /// propagates the error (§4.1, `send`). This signature has no event
    /// sink, so the `Closed` event the close produces is dropped here; a
    /// caller that needs it (`ConnectionManager`'s external send path)
    /// re-derives it from [`Self::was_established`]/[`Self::remote_identity`]
    /// after the fact instead.
    pub async fn send(&mut self, msg: WireMessage) -> Result<(), ConnError> {
        match self.port.send(msg).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = self.close().await;
                Err(err)
            }
        }
    }

    /// Transition to Closed and close the port. Idempotent. Infallible: a
    /// port close failure is logged, not propagated, since the connection
    /// is considered closed either way.
    pub async fn close(&mut self) -> Vec<ConnectionEvent> {
        if matches!(
            self.status,
            ConnectionStatus::Closing | ConnectionStatus::Closed
        ) {
            return Vec::new();
        }
        self.transition(ConnectionStatus::Closing);
        if let Err(err) = self.port.close().await {
            tracing::warn!(connection_id = %self.context.connection_id, error = %err, "port close failed");
        }
        let identity = self.was_established.then(|| self.remote_identity.clone()).flatten();
        self.transition(ConnectionStatus::Closed);
        vec![ConnectionEvent::Closed { identity }]
    }

    /// Drive the state machine on an inbound message (§4.1). Returns the
    /// facts the owning manager must react to.
    pub async fn handle_message(
        &mut self,
        msg: WireMessage,
    ) -> Result<Vec<ConnectionEvent>, ConnError> {
        match msg {
            WireMessage::HandshakeReq { metadata, assigns, .. } => {
                self.handle_handshake_req(metadata, assigns).await
            }
            WireMessage::HandshakeAck { metadata, .. } => self.handle_handshake_ack(metadata),
            WireMessage::HandshakeReject { .. } => self.handle_handshake_reject().await,
            WireMessage::IdentityUpdate { updates } => Ok(self.handle_identity_update(updates)),
            WireMessage::Application(value) => Ok(self.handle_application(value)),
        }
    }

    async fn handle_handshake_req(
        &mut self,
        metadata: Metadata,
        assigns: Option<Metadata>,
    ) -> Result<Vec<ConnectionEvent>, ConnError> {
        if self.status != ConnectionStatus::Initializing {
            tracing::debug!(connection_id = %self.context.connection_id, "ignoring HANDSHAKE_REQ outside Initializing");
            return Ok(Vec::new());
        }
        self.remote_identity = Some(metadata.clone());
        if let Some(assigned) = assigns {
            self.local_user_metadata = assigned;
        }
        self.transition(ConnectionStatus::Handshaking);

        match (self.verify)(&metadata, &self.context).await {
            Ok(true) => {
                let ack = WireMessage::HandshakeAck {
                    id: self.next_message_id(),
                    metadata: self.local_user_metadata.clone(),
                };
                self.send(ack).await?;
                self.transition(ConnectionStatus::Connected);
                self.was_established = true;
                Ok(vec![ConnectionEvent::Verified {
                    remote_identity: metadata,
                }])
            }
            Ok(false) => {
                let rejection = ConnError::handshake_rejected("verifier declined the remote identity");
                let reject = WireMessage::HandshakeReject {
                    id: self.next_message_id(),
                    error: SerializedError::from(&rejection),
                };
                let _ = self.send(reject).await;
                Ok(self.close().await)
            }
            Err(err) => {
                let _ = self.close().await;
                Err(err.with_error_context(self.context_with_id()))
            }
        }
    }

    fn handle_handshake_ack(&mut self, metadata: Metadata) -> Result<Vec<ConnectionEvent>, ConnError> {
        if self.status != ConnectionStatus::Handshaking {
            tracing::debug!(connection_id = %self.context.connection_id, "ignoring HANDSHAKE_ACK outside Handshaking");
            return Ok(Vec::new());
        }
        self.remote_identity = Some(metadata.clone());
        self.transition(ConnectionStatus::Connected);
        self.was_established = true;
        Ok(vec![ConnectionEvent::Verified {
            remote_identity: metadata,
        }])
    }

    async fn handle_handshake_reject(&mut self) -> Result<Vec<ConnectionEvent>, ConnError> {
        if self.status != ConnectionStatus::Handshaking {
            return Ok(Vec::new());
        }
        Ok(self.close().await)
    }

    fn handle_identity_update(&mut self, updates: Metadata) -> Vec<ConnectionEvent> {
        let Some(old) = (self.status == ConnectionStatus::Connected)
            .then(|| self.remote_identity.clone())
            .flatten()
        else {
            tracing::debug!(connection_id = %self.context.connection_id, "dropping IDENTITY_UPDATE outside Connected");
            return Vec::new();
        };
        let new = old.merge(&updates);
        self.remote_identity = Some(new.clone());
        vec![ConnectionEvent::IdentityUpdated { old, new }]
    }

    fn handle_application(&mut self, value: serde_json::Value) -> Vec<ConnectionEvent> {
        if self.status != ConnectionStatus::Connected {
            tracing::debug!(connection_id = %self.context.connection_id, status = %self.status, "dropping application message outside Connected");
            return Vec::new();
        }
        vec![ConnectionEvent::Application(WireMessage::Application(value))]
    }

    /// React to the port disconnecting. Idempotent; returns at most one
    /// `Closed` event (§4.1, disconnect semantics; §8 P1).
    pub fn handle_disconnect(&mut self) -> Vec<ConnectionEvent> {
        if self.status == ConnectionStatus::Closed {
            return Vec::new();
        }
        self.transition(ConnectionStatus::Closed);
        let identity = self.was_established.then(|| self.remote_identity.clone()).flatten();
        vec![ConnectionEvent::Closed { identity }]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Clone)]
    struct RecordedPort {
        sent: Arc<Mutex<Vec<WireMessage>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl RecordedPort {
        fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    #[async_trait]
    impl PortProcessor for RecordedPort {
        async fn send(&self, msg: WireMessage) -> Result<(), ConnError> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }

        async fn close(&self) -> Result<(), ConnError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn always(verdict: bool) -> VerifyFn {
        Arc::new(move |_metadata, _context| Box::pin(async move { Ok(verdict) }))
    }

    fn new_connection(port: Box<dyn PortProcessor>, verify: VerifyFn) -> LogicalConnection {
        LogicalConnection::new(
            ConnectionId::new(1),
            Metadata::empty(),
            Metadata::new(json!({"context": "host"})),
            port,
            verify,
            Arc::new(IdAllocator::new()),
        )
    }

    #[tokio::test]
    async fn passive_side_accepts_and_acks() {
        let port = RecordedPort::new();
        let mut connection = new_connection(Box::new(port.clone()), always(true));

        let events = connection
            .handle_message(WireMessage::HandshakeReq {
                id: linkmesh_core::ids::MessageId::new(1),
                metadata: Metadata::new(json!({"context": "worker"})),
                assigns: None,
            })
            .await
            .unwrap();

        assert_eq!(connection.status(), ConnectionStatus::Connected);
        assert!(connection.was_established());
        assert!(matches!(events.as_slice(), [ConnectionEvent::Verified { .. }]));
        assert!(matches!(
            port.sent.lock().unwrap().as_slice(),
            [WireMessage::HandshakeAck { .. }]
        ));
    }

    #[tokio::test]
    async fn passive_side_rejects_and_closes() {
        let port = RecordedPort::new();
        let mut connection = new_connection(Box::new(port.clone()), always(false));

        let events = connection
            .handle_message(WireMessage::HandshakeReq {
                id: linkmesh_core::ids::MessageId::new(1),
                metadata: Metadata::new(json!({"context": "worker"})),
                assigns: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            events.as_slice(),
            [ConnectionEvent::Closed { identity: None }]
        ));
        assert_eq!(connection.status(), ConnectionStatus::Closed);
        assert!(*port.closed.lock().unwrap());
        assert!(matches!(
            port.sent.lock().unwrap().as_slice(),
            [WireMessage::HandshakeReject { .. }]
        ));
    }

    #[tokio::test]
    async fn verifier_error_closes_and_propagates() {
        let port = RecordedPort::new();
        let verify: VerifyFn = Arc::new(|_metadata, _context| {
            Box::pin(async move { Err(ConnError::usage_invalid("verifier blew up")) })
        });
        let mut connection = new_connection(Box::new(port.clone()), verify);

        let err = connection
            .handle_message(WireMessage::HandshakeReq {
                id: linkmesh_core::ids::MessageId::new(1),
                metadata: Metadata::new(json!({"context": "worker"})),
                assigns: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ConnError::UsageInvalid { .. }));
        assert_eq!(connection.status(), ConnectionStatus::Closed);
        assert!(*port.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn active_side_completes_on_ack() {
        let port = RecordedPort::new();
        let mut connection = new_connection(Box::new(port.clone()), always(true));

        connection.initiate_handshake(None).await.unwrap();
        assert_eq!(connection.status(), ConnectionStatus::Handshaking);

        let events = connection
            .handle_message(WireMessage::HandshakeAck {
                id: linkmesh_core::ids::MessageId::new(1),
                metadata: Metadata::new(json!({"context": "worker"})),
            })
            .await
            .unwrap();

        assert_eq!(connection.status(), ConnectionStatus::Connected);
        assert!(matches!(events.as_slice(), [ConnectionEvent::Verified { .. }]));
    }

    #[tokio::test]
    async fn active_side_receives_reject_and_closes() {
        let port = RecordedPort::new();
        let mut connection = new_connection(Box::new(port.clone()), always(true));

        connection.initiate_handshake(None).await.unwrap();
        let events = connection
            .handle_message(WireMessage::HandshakeReject {
                id: linkmesh_core::ids::MessageId::new(1),
                error: SerializedError::from(&ConnError::handshake_rejected("nope")),
            })
            .await
            .unwrap();

        assert!(matches!(
            events.as_slice(),
            [ConnectionEvent::Closed { identity: None }]
        ));
        assert_eq!(connection.status(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn identity_update_merges_while_connected() {
        let port = RecordedPort::new();
        let mut connection = new_connection(Box::new(port.clone()), always(true));
        connection
            .handle_message(WireMessage::HandshakeReq {
                id: linkmesh_core::ids::MessageId::new(1),
                metadata: Metadata::new(json!({"context": "worker", "tag": "a"})),
                assigns: None,
            })
            .await
            .unwrap();

        let events = connection
            .handle_message(WireMessage::IdentityUpdate {
                updates: Metadata::new(json!({"tag": "b"})),
            })
            .await
            .unwrap();

        match events.as_slice() {
            [ConnectionEvent::IdentityUpdated { old, new }] => {
                assert_eq!(old.get("tag").unwrap(), "a");
                assert_eq!(new.get("tag").unwrap(), "b");
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert_eq!(
            connection.remote_identity().unwrap().get("tag").unwrap(),
            "b"
        );
    }

    #[tokio::test]
    async fn disconnect_before_verification_carries_no_identity() {
        let port = RecordedPort::new();
        let mut connection = new_connection(Box::new(port.clone()), always(true));

        let events = connection.handle_disconnect();
        assert!(matches!(
            events.as_slice(),
            [ConnectionEvent::Closed { identity: None }]
        ));
        assert_eq!(connection.status(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let port = RecordedPort::new();
        let mut connection = new_connection(Box::new(port.clone()), always(true));

        assert!(!connection.handle_disconnect().is_empty());
        assert!(connection.handle_disconnect().is_empty());
    }
}
