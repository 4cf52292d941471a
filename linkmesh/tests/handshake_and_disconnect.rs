//! End-to-end handshake and disconnect scenarios, driven over a paired
//! in-memory transport with two `ConnectionManager`s standing in for the
//! two sides of a connection.

use linkmesh_conn::{ResolveOptions, SendTarget};
use linkmesh_core::error::ConnError;
use linkmesh_core::message::WireMessage;
use linkmesh_testing::async_helpers::wait_for_async;
use linkmesh_testing::fixtures::{always, connected_pair, sample_descriptor, sample_identity};
use linkmesh_testing::TestPeer;
use linkmesh_transport::MemoryTransport;
use serde_json::json;
use std::time::Duration;

/// Scenario 1: successful handshake, both sides end up Connected with
/// each other's announced identity.
#[tokio::test]
async fn successful_handshake_exchanges_identities() {
    let (server, client) = connected_pair(sample_descriptor("host"), sample_descriptor("client")).await;

    let handle = client.connect_to(sample_descriptor("host")).await.unwrap();
    assert!(handle.is_ready().await);
    assert_eq!(
        handle.remote_identity().await.unwrap().get("service").unwrap(),
        "host"
    );

    wait_for_async(Duration::from_secs(1), Duration::from_millis(5), || {
        let server = &server;
        async move { server.handlers().disconnect_count() == 0 && server.handlers().message_count() == 0 }
    })
    .await;
}

/// Scenario 2: the passive side's verifier rejects the handshake. The
/// dialer's `resolve` rejects with `HandshakeFailed`, and the rejection
/// also tears down the dialer's own half of the connection, which still
/// reaches L3 as a disconnect with no identity.
#[tokio::test]
async fn rejected_handshake_surfaces_error_and_disconnect() {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let server = TestPeer::new(server_transport, always(false), sample_descriptor("host"));
    let client = TestPeer::new(client_transport, always(true), sample_descriptor("client"));
    server.initialize().await.unwrap();
    client.initialize().await.unwrap();

    let err = client
        .manager()
        .resolve(ResolveOptions::find_or_create(sample_descriptor("host")))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnError::HandshakeFailed { .. }));

    wait_for_async(Duration::from_secs(1), Duration::from_millis(5), || {
        let client = &client;
        async move { client.handlers().disconnect_count() >= 1 }
    })
    .await;
    for (_, identity) in client.handlers().disconnects() {
        assert!(identity.is_none());
    }
}

/// Scenario 3: christening. The active side assigns the passive side's
/// identity via the handshake payload; the passive side adopts it and
/// ACKs with it, so the dialer's view of the remote identity is exactly
/// what it assigned.
#[tokio::test]
async fn christening_assigns_passive_side_identity() {
    let (_server, client) = connected_pair(sample_descriptor("host"), sample_descriptor("anonymous")).await;

    let assigned = sample_identity("worker", &["pool-a"]);
    let handle = client
        .manager()
        .resolve(ResolveOptions::find_or_create(sample_descriptor("host")).with_assignment(assigned.clone()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(handle.remote_identity().await.unwrap(), assigned);
}

/// Scenario 6 (P1): when one side's connection manager is torn down
/// entirely, the surviving side observes exactly one disconnect and its
/// registry stops routing to the closed connection.
#[tokio::test]
async fn disconnect_cleans_up_the_surviving_sides_registry() {
    let (server, client) = connected_pair(sample_descriptor("host"), sample_descriptor("client")).await;
    let handle = client.connect_to(sample_descriptor("host")).await.unwrap();
    assert!(handle.is_ready().await);

    drop(client);

    wait_for_async(Duration::from_secs(1), Duration::from_millis(5), || {
        let server = &server;
        async move { server.handlers().disconnect_count() == 1 }
    })
    .await;
    assert_eq!(server.handlers().disconnect_count(), 1, "P1: at most one disconnect per connection");

    let sent = server
        .manager()
        .send(
            SendTarget::Connection(handle.connection_id()),
            WireMessage::Application(json!({"ping": true})),
        )
        .await
        .unwrap();
    assert!(sent.is_empty(), "closed connection must not receive further sends");
}
