//! The `ConnectionManager` facade: pooling, find-or-create resolution,
//! group routing, and identity broadcast over logical connections.
//!
//! Concurrency: one `AsyncMutex` guards the registry
//! (`connections`, `service_groups`, `pending_creations`). Each connection
//! additionally gets its own `AsyncMutex` so a handshake's
//! indefinite suspension points (`transport.connect`, `verify`) never hold
//! the registry lock — only the one connection being driven.
//!
//! `PortHandlers::on_logical_message` (and its disconnect/protocol-error
//! siblings) are synchronous callbacks fired from inside the transport, so
//! they cannot themselves await the registry lock. They instead push onto
//! an unbounded channel drained by a background task spawned in
//! [`ConnectionManager::new`]; that task is where messages actually reach
//! a `LogicalConnection`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use linkmesh_core::error::ConnError;
use linkmesh_core::message::WireMessage;
use linkmesh_core::metadata::{Matcher, Metadata};
use linkmesh_core::{ConnectionId, IdAllocator};
use linkmesh_transport::runtime::{AsyncMutex, Notify};
use linkmesh_transport::{PortHandlers, PortProcessor, Transport};
use tokio::sync::mpsc;

use crate::config::ManagerConfig;
use crate::connection::{ConnectionEvent, LogicalConnection, VerifyFn};
use crate::descriptor::{ResolveOptions, SendTarget};
use crate::handlers::ManagerHandlers;
use crate::status::ConnectionStatus;

type SharedConnection = Arc<AsyncMutex<LogicalConnection>>;

/// A buffered notification for a connection_id the background loop has
/// not yet installed into the registry (§9, "Pre-install message
/// buffer").
enum PortEvent {
    Message(WireMessage),
    Disconnect,
    ProtocolError(ConnError),
}

enum ManagerEvent {
    Accepted {
        connection_id: ConnectionId,
        processor: Box<dyn PortProcessor>,
        platform_metadata: Metadata,
    },
    Message {
        connection_id: ConnectionId,
        msg: WireMessage,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    ProtocolError {
        connection_id: ConnectionId,
        err: ConnError,
    },
}

/// The outcome of an in-flight outgoing creation, shared by every
/// `resolve()` caller coalesced on the same descriptor key (§4.2 step 4,
/// §8 P4).
struct PendingCreation {
    result: AsyncMutex<Option<Result<ConnectionId, String>>>,
    ready: Notify,
}

impl PendingCreation {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            result: AsyncMutex::new(None),
            ready: Notify::new(),
        })
    }

    async fn settle(&self, outcome: Result<ConnectionId, String>) {
        *self.result.lock().await = Some(outcome);
        self.ready.notify(usize::MAX);
    }

    async fn wait(&self) -> Result<ConnectionId, String> {
        loop {
            if let Some(outcome) = self.result.lock().await.clone() {
                return outcome;
            }
            let listener = self.ready.listen();
            if let Some(outcome) = self.result.lock().await.clone() {
                return outcome;
            }
            listener.await;
        }
    }
}

struct ManagerState {
    connections: HashMap<ConnectionId, SharedConnection>,
    insertion_order: Vec<ConnectionId>,
    service_groups: HashMap<String, HashSet<ConnectionId>>,
    pending_creations: HashMap<String, Arc<PendingCreation>>,
    pending_creation_by_connection: HashMap<ConnectionId, String>,
    pending_install_buffers: HashMap<ConnectionId, VecDeque<PortEvent>>,
    local_user_metadata: Metadata,
    initialized: bool,
    /// Set when `transport.listen()` fails during `initialize()`. Once
    /// poisoned, later calls fail fast rather than re-attempting `listen`
    /// on a manager whose state may already have observed partial setup.
    listen_failed: bool,
}

struct ManagerInner {
    state: AsyncMutex<ManagerState>,
    transport: Box<dyn Transport>,
    handlers: Arc<dyn ManagerHandlers>,
    verify: VerifyFn,
    ids: Arc<IdAllocator>,
    config: ManagerConfig,
    events_tx: mpsc::UnboundedSender<ManagerEvent>,
}

impl ManagerInner {
    async fn ensure_initialized(&self) -> Result<(), ConnError> {
        if self.state.lock().await.initialized {
            Ok(())
        } else {
            Err(ConnError::usage_invalid(
                "ConnectionManager::initialize() has not completed",
            ))
        }
    }

    async fn run_event_loop(inner: Arc<Self>, mut events_rx: mpsc::UnboundedReceiver<ManagerEvent>) {
        while let Some(event) = events_rx.recv().await {
            match event {
                ManagerEvent::Accepted {
                    connection_id,
                    processor,
                    platform_metadata,
                } => {
                    inner
                        .install_connection(connection_id, processor, platform_metadata, None)
                        .await;
                }
                ManagerEvent::Message { connection_id, msg } => {
                    inner.deliver(connection_id, PortEvent::Message(msg)).await;
                }
                ManagerEvent::Disconnect { connection_id } => {
                    inner.deliver(connection_id, PortEvent::Disconnect).await;
                }
                ManagerEvent::ProtocolError { connection_id, err } => {
                    inner
                        .deliver(connection_id, PortEvent::ProtocolError(err))
                        .await;
                }
            }
        }
    }

    /// Deliver an event for an already-installed connection, or buffer it
    /// if the connection hasn't been installed yet (§9).
    async fn deliver(self: &Arc<Self>, connection_id: ConnectionId, event: PortEvent) {
        let shared = {
            let state = self.state.lock().await;
            state.connections.get(&connection_id).cloned()
        };
        let Some(shared) = shared else {
            let mut state = self.state.lock().await;
            state
                .pending_install_buffers
                .entry(connection_id)
                .or_default()
                .push_back(event);
            return;
        };

        let events = {
            let mut connection = shared.lock().await;
            Self::apply_port_event(&mut connection, event).await
        };
        self.apply_events(connection_id, events).await;
    }

    async fn apply_port_event(
        connection: &mut LogicalConnection,
        event: PortEvent,
    ) -> Vec<ConnectionEvent> {
        match event {
            PortEvent::Message(msg) => connection.handle_message(msg).await.unwrap_or_else(|err| {
                tracing::warn!(error = %err, "error handling message, ignoring");
                Vec::new()
            }),
            PortEvent::Disconnect => connection.handle_disconnect(),
            PortEvent::ProtocolError(err) => {
                tracing::warn!(error = %err, "protocol error, closing connection");
                connection.close().await
            }
        }
    }

    /// Construct, drain the pre-install buffer into, and register a new
    /// connection. `active_assign` is `Some(assign)` for the outgoing
    /// (dial) role: `initiate_handshake(assign)` is called afterward
    /// unless a buffered `HANDSHAKE_REQ` already flipped this side to
    /// passive (§4.2 step 4, §9).
    async fn install_connection(
        self: &Arc<Self>,
        connection_id: ConnectionId,
        processor: Box<dyn PortProcessor>,
        platform_metadata: Metadata,
        active_assign: Option<Option<Metadata>>,
    ) {
        let (local_identity, buffered) = {
            let mut state = self.state.lock().await;
            let buffered = state
                .pending_install_buffers
                .remove(&connection_id)
                .unwrap_or_default();
            (state.local_user_metadata.clone(), buffered)
        };

        let mut connection = LogicalConnection::new(
            connection_id,
            platform_metadata,
            local_identity,
            processor,
            Arc::clone(&self.verify),
            Arc::clone(&self.ids),
        );

        let mut saw_handshake_req = false;
        let mut events = Vec::new();
        for buffered_event in buffered {
            if let PortEvent::Message(WireMessage::HandshakeReq { .. }) = &buffered_event {
                saw_handshake_req = true;
            }
            events.extend(Self::apply_port_event(&mut connection, buffered_event).await);
        }

        if let Some(assign) = active_assign {
            if !saw_handshake_req && connection.status() == ConnectionStatus::Initializing {
                if let Err(err) = connection.initiate_handshake(assign).await {
                    tracing::warn!(error = %err, "failed to initiate handshake");
                }
            }
        }

        {
            let mut state = self.state.lock().await;
            state
                .connections
                .insert(connection_id, Arc::new(AsyncMutex::new(connection)));
            state.insertion_order.push(connection_id);
        }

        self.apply_events(connection_id, events).await;
    }

    /// Apply the manager-level side effects of a batch of connection
    /// events: group index maintenance (§4.2, "Group indexing"), pending
    /// creation settlement, and L3 notification.
    async fn apply_events(self: &Arc<Self>, connection_id: ConnectionId, events: Vec<ConnectionEvent>) {
        for event in events {
            match event {
                ConnectionEvent::Verified { remote_identity } => {
                    {
                        let mut state = self.state.lock().await;
                        for group in remote_identity.groups() {
                            state
                                .service_groups
                                .entry(group)
                                .or_default()
                                .insert(connection_id);
                        }
                    }
                    self.settle_pending(connection_id, Ok(connection_id)).await;
                }
                ConnectionEvent::IdentityUpdated { old, new } => {
                    let mut state = self.state.lock().await;
                    let old_groups = old.groups();
                    let new_groups = new.groups();
                    for group in &old_groups {
                        if !new_groups.contains(group) {
                            if let Some(set) = state.service_groups.get_mut(group) {
                                set.remove(&connection_id);
                            }
                        }
                    }
                    for group in &new_groups {
                        if !old_groups.contains(group) {
                            state
                                .service_groups
                                .entry(group.clone())
                                .or_default()
                                .insert(connection_id);
                        }
                    }
                }
                ConnectionEvent::Application(msg) => {
                    self.handlers.on_message(msg, connection_id);
                }
                ConnectionEvent::Closed { identity } => {
                    {
                        let mut state = self.state.lock().await;
                        if let Some(identity) = &identity {
                            for group in identity.groups() {
                                if let Some(set) = state.service_groups.get_mut(&group) {
                                    set.remove(&connection_id);
                                }
                            }
                        }
                        state.connections.remove(&connection_id);
                        state.pending_install_buffers.remove(&connection_id);
                        state.insertion_order.retain(|cid| *cid != connection_id);
                    }
                    self.settle_pending(
                        connection_id,
                        Err("connection closed before verification".to_string()),
                    )
                    .await;
                    self.handlers.on_disconnect(connection_id, identity);
                }
            }
        }
    }

    async fn settle_pending(self: &Arc<Self>, connection_id: ConnectionId, outcome: Result<ConnectionId, String>) {
        let pending = {
            let mut state = self.state.lock().await;
            let Some(key) = state.pending_creation_by_connection.remove(&connection_id) else {
                return;
            };
            state.pending_creations.remove(&key)
        };
        if let Some(pending) = pending {
            pending.settle(outcome).await;
        }
    }

    /// Dial `descriptor` and drive the connection to installation. Returns
    /// `Err` only if a connection_id could never be tracked (dial itself
    /// failed); success (even eventual handshake failure) settles via
    /// [`Self::apply_events`] instead.
    async fn create_outgoing(
        self: &Arc<Self>,
        descriptor: Metadata,
        assignment: Option<Metadata>,
        key: String,
    ) -> Result<(), String> {
        let connection_id = self.ids.next_connection_id();
        {
            let mut state = self.state.lock().await;
            state
                .pending_creation_by_connection
                .insert(connection_id, key);
        }

        let port_handlers: Arc<dyn PortHandlers> = Arc::new(ManagerPortHandlers {
            connection_id,
            events_tx: self.events_tx.clone(),
        });

        let (processor, platform_metadata) = match self.transport.connect(&descriptor, port_handlers).await {
            Ok(pair) => pair,
            Err(err) => {
                let mut state = self.state.lock().await;
                state.pending_creation_by_connection.remove(&connection_id);
                return Err(format!("dial failed: {err}"));
            }
        };

        self.install_connection(connection_id, processor, platform_metadata, Some(assignment))
            .await;
        Ok(())
    }

    /// §4.2 step 1: find an existing Ready connection matching `options`.
    async fn find(&self, options: &ResolveOptions) -> Option<ConnectionId> {
        let state = self.state.lock().await;
        for connection_id in &state.insertion_order {
            let Some(shared) = state.connections.get(connection_id) else {
                continue;
            };
            let connection = shared.lock().await;
            if !connection.is_ready() {
                continue;
            }
            let Some(remote) = connection.remote_identity() else {
                continue;
            };
            if let Some(matcher) = &options.matcher {
                if matcher(remote) {
                    return Some(*connection_id);
                }
            } else if let Some(descriptor) = &options.descriptor {
                if descriptor.deep_partial_match(remote) {
                    return Some(*connection_id);
                }
            }
        }
        None
    }

    async fn send_to_one(self: &Arc<Self>, connection_id: ConnectionId, msg: WireMessage) -> Result<bool, ConnError> {
        let shared = {
            let state = self.state.lock().await;
            state.connections.get(&connection_id).cloned()
        };
        let Some(shared) = shared else {
            return Ok(false);
        };
        let mut connection = shared.lock().await;
        if !connection.is_ready() {
            return Ok(false);
        }
        if let Err(err) = connection.send(msg).await {
            // `LogicalConnection::send` already closed itself internally;
            // re-derive the `Closed` event it couldn't return on this
            // signature so the registry still reaps the connection.
            let identity = connection
                .was_established()
                .then(|| connection.remote_identity().cloned())
                .flatten();
            drop(connection);
            self.apply_events(connection_id, vec![ConnectionEvent::Closed { identity }])
                .await;
            return Err(err);
        }
        Ok(true)
    }

    async fn send_to_many(self: &Arc<Self>, connection_ids: Vec<ConnectionId>, msg: WireMessage) -> Result<Vec<ConnectionId>, ConnError> {
        let mut sent = Vec::new();
        for connection_id in connection_ids {
            if self.send_to_one(connection_id, msg.clone()).await? {
                sent.push(connection_id);
            }
        }
        Ok(sent)
    }

    async fn send_to_group(self: &Arc<Self>, group: &str, msg: WireMessage) -> Result<Vec<ConnectionId>, ConnError> {
        let members: Vec<ConnectionId> = {
            let state = self.state.lock().await;
            state
                .service_groups
                .get(group)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };
        self.send_to_many(members, msg).await
    }

    async fn send_to_matcher(self: &Arc<Self>, matcher: &Matcher, msg: WireMessage) -> Result<Vec<ConnectionId>, ConnError> {
        let candidates: Vec<(ConnectionId, SharedConnection)> = {
            let state = self.state.lock().await;
            state
                .insertion_order
                .iter()
                .filter_map(|cid| state.connections.get(cid).map(|shared| (*cid, Arc::clone(shared))))
                .collect()
        };

        let mut matched = Vec::new();
        for (connection_id, shared) in candidates {
            let qualifies = {
                let connection = shared.lock().await;
                connection.is_ready()
                    && connection
                        .remote_identity()
                        .is_some_and(|identity| matcher(identity))
            };
            if qualifies {
                matched.push(connection_id);
            }
        }
        self.send_to_many(matched, msg).await
    }
}

/// A connection_id's back-reference into the manager, carried on its
/// `PortProcessor` handlers (§9, ownership-cycle design note: a weak
/// reference, not a strong handle onto the `LogicalConnection`).
struct ManagerPortHandlers {
    connection_id: ConnectionId,
    events_tx: mpsc::UnboundedSender<ManagerEvent>,
}

impl PortHandlers for ManagerPortHandlers {
    fn on_logical_message(&self, msg: WireMessage) {
        let _ = self.events_tx.send(ManagerEvent::Message {
            connection_id: self.connection_id,
            msg,
        });
    }

    fn on_disconnect(&self) {
        let _ = self.events_tx.send(ManagerEvent::Disconnect {
            connection_id: self.connection_id,
        });
    }

    fn on_protocol_error(&self, err: ConnError) {
        let _ = self.events_tx.send(ManagerEvent::ProtocolError {
            connection_id: self.connection_id,
            err,
        });
    }
}

/// Pool of `LogicalConnection`s, resolver with concurrent coalescing,
/// router, and identity broadcaster.
///
/// Cheap to clone: internally an `Arc`, handed around by value across tasks.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Construct a manager over `transport`, notifying `handlers` (L3) and
    /// using `verify` as the passive-side admission policy. Does not start
    /// listening or dialing — call [`Self::initialize`] for that.
    #[must_use]
    pub fn new(
        transport: Box<dyn Transport>,
        handlers: Arc<dyn ManagerHandlers>,
        verify: VerifyFn,
        local_user_metadata: Metadata,
        config: ManagerConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ManagerInner {
            state: AsyncMutex::new(ManagerState {
                connections: HashMap::new(),
                insertion_order: Vec::new(),
                service_groups: HashMap::new(),
                pending_creations: HashMap::new(),
                pending_creation_by_connection: HashMap::new(),
                pending_install_buffers: HashMap::new(),
                local_user_metadata,
                initialized: false,
                listen_failed: false,
            }),
            transport,
            handlers,
            verify,
            ids: Arc::new(IdAllocator::new()),
            config,
            events_tx,
        });

        let loop_inner = Arc::clone(&inner);
        tokio::spawn(ManagerInner::run_event_loop(loop_inner, events_rx));

        Self { inner }
    }

    /// Idempotent: start listening and eagerly dial `config.pre_warm_targets`
    /// (§4.2).
    pub async fn initialize(&self) -> Result<(), ConnError> {
        {
            let state = self.inner.state.lock().await;
            if state.initialized {
                return Ok(());
            }
            if state.listen_failed {
                return Err(ConnError::usage_invalid(
                    "initialize() already failed once (transport.listen() errored); this manager cannot be initialized",
                ));
            }
        }

        let events_tx = self.inner.events_tx.clone();
        let ids = Arc::clone(&self.inner.ids);
        let on_accept = Arc::new(move |create_processor: linkmesh_transport::CreateProcessor, platform_metadata: Metadata| {
            let connection_id = ids.next_connection_id();
            let port_handlers: Arc<dyn PortHandlers> = Arc::new(ManagerPortHandlers {
                connection_id,
                events_tx: events_tx.clone(),
            });
            let processor = create_processor(port_handlers);
            let _ = events_tx.send(ManagerEvent::Accepted {
                connection_id,
                processor,
                platform_metadata,
            });
        });

        if let Err(err) = self.inner.transport.listen(on_accept).await {
            let mut state = self.inner.state.lock().await;
            state.listen_failed = true;
            return Err(err);
        }

        {
            let mut state = self.inner.state.lock().await;
            state.initialized = true;
        }

        let pre_warm_targets = self.inner.config.pre_warm_targets.clone();
        for descriptor in pre_warm_targets {
            if let Err(err) = self.resolve(ResolveOptions::find_or_create(descriptor)).await {
                tracing::warn!(error = %err, "pre-warm dial failed");
            }
        }

        Ok(())
    }

    /// Find-or-create resolution with concurrent coalescing (§4.2).
    pub async fn resolve(&self, options: ResolveOptions) -> Result<Option<ConnectionHandle>, ConnError> {
        self.inner.ensure_initialized().await?;

        if let Some(found) = self.inner.find(&options).await {
            return Ok(Some(self.handle_for(found)));
        }

        let Some(descriptor) = options.descriptor.clone() else {
            return Ok(None);
        };
        let key = descriptor.canonical_json();

        let pending = {
            let mut state = self.inner.state.lock().await;
            if let Some(existing) = state.pending_creations.get(&key) {
                Arc::clone(existing)
            } else {
                let pending = PendingCreation::new();
                state.pending_creations.insert(key.clone(), Arc::clone(&pending));
                let inner = Arc::clone(&self.inner);
                let descriptor_for_task = descriptor.clone();
                let key_for_task = key.clone();
                let assignment = options.assignment_metadata.clone();
                let pending_for_task = Arc::clone(&pending);
                tokio::spawn(async move {
                    if let Err(message) = inner
                        .create_outgoing(descriptor_for_task, assignment, key_for_task.clone())
                        .await
                    {
                        let mut state = inner.state.lock().await;
                        state.pending_creations.remove(&key_for_task);
                        drop(state);
                        pending_for_task.settle(Err(message)).await;
                    }
                });
                pending
            }
        };

        match pending.wait().await {
            Ok(connection_id) => Ok(Some(self.handle_for(connection_id))),
            Err(message) => Err(ConnError::handshake_failed(message)),
        }
    }

    /// Route a message to the addressed target(s) (§4.2, "Routing").
    /// Returns the connection_ids actually sent to; aborts on the first
    /// send failure.
    pub async fn send(&self, target: SendTarget, msg: WireMessage) -> Result<Vec<ConnectionId>, ConnError> {
        self.inner.ensure_initialized().await?;
        match target {
            SendTarget::Connection(connection_id) => Ok(if self.inner.send_to_one(connection_id, msg).await? {
                vec![connection_id]
            } else {
                Vec::new()
            }),
            SendTarget::Group(group) => self.inner.send_to_group(&group, msg).await,
            SendTarget::Matcher(matcher) => self.inner.send_to_matcher(&matcher, msg).await,
        }
    }

    /// Merge `updates` into the local identity, then broadcast an
    /// `IDENTITY_UPDATE` to every Ready peer (§4.2, "Identity broadcast").
    pub async fn update_local_identity(&self, updates: Metadata) -> Result<(), ConnError> {
        self.inner.ensure_initialized().await?;
        {
            let mut state = self.inner.state.lock().await;
            state.local_user_metadata = state.local_user_metadata.merge(&updates);
        }
        let broadcast_all: Matcher = Arc::new(|_: &Metadata| true);
        self.send(
            SendTarget::Matcher(broadcast_all),
            WireMessage::IdentityUpdate { updates },
        )
        .await?;
        Ok(())
    }

    /// The manager's current local identity.
    pub async fn local_user_metadata(&self) -> Metadata {
        self.inner.state.lock().await.local_user_metadata.clone()
    }

    async fn get_shared(&self, connection_id: ConnectionId) -> Option<SharedConnection> {
        self.inner.state.lock().await.connections.get(&connection_id).cloned()
    }

    fn handle_for(&self, connection_id: ConnectionId) -> ConnectionHandle {
        ConnectionHandle {
            connection_id,
            manager: self.clone(),
        }
    }
}

/// A lightweight reference to a `LogicalConnection` the manager still
/// exclusively owns. Unlike a checkout guard, there's no release-on-drop
/// behavior: logical connections aren't checked out and returned, only
/// addressed by id.
#[derive(Clone)]
pub struct ConnectionHandle {
    connection_id: ConnectionId,
    manager: ConnectionManager,
}

impl ConnectionHandle {
    /// The underlying connection_id.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// `true` iff the connection is currently Connected.
    pub async fn is_ready(&self) -> bool {
        match self.manager.get_shared(self.connection_id).await {
            Some(shared) => shared.lock().await.is_ready(),
            None => false,
        }
    }

    /// The connection's remote identity, if known.
    pub async fn remote_identity(&self) -> Option<Metadata> {
        let shared = self.manager.get_shared(self.connection_id).await?;
        shared.lock().await.remote_identity().cloned()
    }

    /// Send `msg` on this connection alone.
    pub async fn send(&self, msg: WireMessage) -> Result<Vec<ConnectionId>, ConnError> {
        self.manager
            .send(SendTarget::Connection(self.connection_id), msg)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use linkmesh_transport::MemoryTransport;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingHandlers {
        messages: StdMutex<Vec<(ConnectionId, WireMessage)>>,
        disconnects: StdMutex<Vec<ConnectionId>>,
    }

    impl ManagerHandlers for RecordingHandlers {
        fn on_message(&self, msg: WireMessage, connection_id: ConnectionId) {
            self.messages.lock().unwrap().push((connection_id, msg));
        }

        fn on_disconnect(&self, connection_id: ConnectionId, _identity: Option<Metadata>) {
            self.disconnects.lock().unwrap().push(connection_id);
        }
    }

    fn always(verdict: bool) -> VerifyFn {
        Arc::new(move |_metadata, _context| Box::pin(async move { Ok(verdict) }))
    }

    fn new_manager(
        transport: MemoryTransport,
        verify: VerifyFn,
        local_identity: Metadata,
    ) -> (ConnectionManager, Arc<RecordingHandlers>) {
        let handlers = Arc::new(RecordingHandlers::default());
        let manager = ConnectionManager::new(
            Box::new(transport),
            Arc::clone(&handlers) as Arc<dyn ManagerHandlers>,
            verify,
            local_identity,
            ManagerConfig::new(),
        );
        (manager, handlers)
    }

    #[tokio::test]
    async fn resolve_dials_completes_handshake_and_coalesces() {
        let (client_transport, server_transport) = MemoryTransport::pair();
        let (server, _server_handlers) = new_manager(
            server_transport,
            always(true),
            Metadata::new(json!({"context": "server"})),
        );
        let (client, _client_handlers) = new_manager(
            client_transport,
            always(true),
            Metadata::new(json!({"context": "client"})),
        );
        server.initialize().await.unwrap();
        client.initialize().await.unwrap();

        let descriptor = Metadata::new(json!({"context": "server"}));
        let (first, second) = tokio::join!(
            client.resolve(ResolveOptions::find_or_create(descriptor.clone())),
            client.resolve(ResolveOptions::find_or_create(descriptor)),
        );

        let first = first.unwrap().expect("connection");
        let second = second.unwrap().expect("connection");
        assert_eq!(first.connection_id(), second.connection_id());
        assert!(first.is_ready().await);
        assert_eq!(
            first.remote_identity().await.unwrap().get("context").unwrap(),
            "server"
        );
    }

    #[tokio::test]
    async fn application_messages_are_forwarded_to_handlers() {
        let (client_transport, server_transport) = MemoryTransport::pair();
        let (server, server_handlers) = new_manager(
            server_transport,
            always(true),
            Metadata::new(json!({"context": "server"})),
        );
        let (client, _client_handlers) = new_manager(
            client_transport,
            always(true),
            Metadata::new(json!({"context": "client"})),
        );
        server.initialize().await.unwrap();
        client.initialize().await.unwrap();

        let handle = client
            .resolve(ResolveOptions::find_or_create(Metadata::new(
                json!({"context": "server"}),
            )))
            .await
            .unwrap()
            .unwrap();

        handle
            .send(WireMessage::Application(json!({"hello": "world"})))
            .await
            .unwrap();

        // The server's event loop drains the application message on its own
        // task; give it a tick to run.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let messages = server_handlers.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0].1, WireMessage::Application(_)));
    }

    #[tokio::test]
    async fn handshake_rejection_surfaces_as_error_and_notifies_l3() {
        let (client_transport, server_transport) = MemoryTransport::pair();
        let (server, _server_handlers) = new_manager(
            server_transport,
            always(false),
            Metadata::new(json!({"context": "server"})),
        );
        let (client, client_handlers) = new_manager(
            client_transport,
            always(true),
            Metadata::new(json!({"context": "client"})),
        );
        server.initialize().await.unwrap();
        client.initialize().await.unwrap();

        let err = client
            .resolve(ResolveOptions::find_or_create(Metadata::new(
                json!({"context": "server"}),
            )))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnError::HandshakeFailed { .. }));

        // The rejection also closes the client's own half of the
        // connection, which still reaches L3 as a disconnect notification.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client_handlers.disconnects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_without_match_or_descriptor_returns_none() {
        let (client_transport, server_transport) = MemoryTransport::pair();
        let (server, _server_handlers) = new_manager(
            server_transport,
            always(true),
            Metadata::new(json!({"context": "server"})),
        );
        let (client, _client_handlers) = new_manager(
            client_transport,
            always(true),
            Metadata::new(json!({"context": "client"})),
        );
        server.initialize().await.unwrap();
        client.initialize().await.unwrap();

        let found = client
            .resolve(ResolveOptions::find_by_matcher(Arc::new(|_: &Metadata| {
                true
            })))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn group_broadcast_reaches_only_matching_members() {
        // Group membership comes from the *remote* identity a connection
        // observed during handshake, so the side whose registry should
        // route by "workers" is the one the server announces itself into:
        // the client's view of the server.
        let (client_transport, server_transport) = MemoryTransport::pair();
        let (server, _server_handlers) = new_manager(
            server_transport,
            always(true),
            Metadata::new(json!({"context": "server", "groups": ["workers"]})),
        );
        let (client, _client_handlers) = new_manager(
            client_transport,
            always(true),
            Metadata::new(json!({"context": "client"})),
        );
        server.initialize().await.unwrap();
        client.initialize().await.unwrap();

        client
            .resolve(ResolveOptions::find_or_create(Metadata::new(
                json!({"context": "server"}),
            )))
            .await
            .unwrap()
            .unwrap();

        let sent = client
            .send(
                SendTarget::Group("workers".to_string()),
                WireMessage::Application(json!({"ping": true})),
            )
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);

        let missed = client
            .send(
                SendTarget::Group("other".to_string()),
                WireMessage::Application(json!({"ping": true})),
            )
            .await
            .unwrap();
        assert!(missed.is_empty());
    }
}
