//! A recording peer for testing `ConnectionManager`s.
//!
//! `TestPeer` pairs a [`ConnectionManager`] with a [`RecordingHandlers`]
//! that stashes every inbound application message and disconnect it sees,
//! so tests can assert on what L3 would have observed without writing a
//! bespoke [`ManagerHandlers`] impl each time.

use std::sync::Mutex as StdMutex;

use linkmesh_conn::{ConnectionHandle, ConnectionManager, ManagerConfig, ManagerHandlers, ResolveOptions, VerifyFn};
use linkmesh_core::error::ConnError;
use linkmesh_core::message::WireMessage;
use linkmesh_core::metadata::Metadata;
use linkmesh_core::ConnectionId;
use linkmesh_transport::Transport;

/// Records everything a [`ConnectionManager`] reports to its owner.
#[derive(Default)]
pub struct RecordingHandlers {
    messages: StdMutex<Vec<(ConnectionId, WireMessage)>>,
    disconnects: StdMutex<Vec<(ConnectionId, Option<Metadata>)>>,
}

impl RecordingHandlers {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All application messages received so far, in arrival order.
    #[must_use]
    pub fn messages(&self) -> Vec<(ConnectionId, WireMessage)> {
        self.messages.lock().unwrap().clone()
    }

    /// All disconnects observed so far, in arrival order.
    #[must_use]
    pub fn disconnects(&self) -> Vec<(ConnectionId, Option<Metadata>)> {
        self.disconnects.lock().unwrap().clone()
    }

    /// Number of application messages recorded.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    /// Number of disconnects recorded.
    #[must_use]
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.lock().unwrap().len()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
        self.disconnects.lock().unwrap().clear();
    }
}

impl ManagerHandlers for RecordingHandlers {
    fn on_message(&self, msg: WireMessage, connection_id: ConnectionId) {
        self.messages.lock().unwrap().push((connection_id, msg));
    }

    fn on_disconnect(&self, connection_id: ConnectionId, identity: Option<Metadata>) {
        self.disconnects.lock().unwrap().push((connection_id, identity));
    }
}

/// A `ConnectionManager` plus its `RecordingHandlers`, for tests that want
/// to drive a manager and inspect what reached L3 without wiring the
/// plumbing by hand each time.
pub struct TestPeer {
    manager: ConnectionManager,
    handlers: std::sync::Arc<RecordingHandlers>,
}

impl TestPeer {
    /// Build a peer over `transport`, verifying every incoming handshake
    /// with `verify` and announcing `local_identity` as its own metadata.
    #[must_use]
    pub fn new(transport: impl Transport + 'static, verify: VerifyFn, local_identity: Metadata) -> Self {
        Self::with_config(transport, verify, local_identity, ManagerConfig::new())
    }

    /// As [`Self::new`], with an explicit [`ManagerConfig`] (e.g. pre-warm
    /// targets).
    #[must_use]
    pub fn with_config(
        transport: impl Transport + 'static,
        verify: VerifyFn,
        local_identity: Metadata,
        config: ManagerConfig,
    ) -> Self {
        let handlers = std::sync::Arc::new(RecordingHandlers::new());
        let manager = ConnectionManager::new(
            Box::new(transport),
            std::sync::Arc::clone(&handlers) as std::sync::Arc<dyn ManagerHandlers>,
            verify,
            local_identity,
            config,
        );
        Self { manager, handlers }
    }

    /// The underlying manager.
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Everything this peer's manager has reported to L3.
    #[must_use]
    pub fn handlers(&self) -> &RecordingHandlers {
        &self.handlers
    }

    /// Start listening / dial pre-warm targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to bind a listener.
    pub async fn initialize(&self) -> Result<(), ConnError> {
        self.manager.initialize().await
    }

    /// `resolve` against `descriptor`, creating a connection if none
    /// already matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the dial or handshake fails.
    pub async fn connect_to(&self, descriptor: Metadata) -> Result<ConnectionHandle, ConnError> {
        self.manager
            .resolve(ResolveOptions::find_or_create(descriptor))
            .await?
            .ok_or_else(|| ConnError::usage_invalid("resolve returned no handle for a create request"))
    }
}
