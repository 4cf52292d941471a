//! Test fixtures for linkmesh testing.
//!
//! Pre-built [`Metadata`] and [`VerifyFn`] values for common scenarios, and
//! a helper for standing up a connected pair of `ConnectionManager`s
//! without repeating the `MemoryTransport::pair()` boilerplate.

use std::sync::Arc;

use linkmesh_conn::VerifyFn;
use linkmesh_core::metadata::Metadata;
use linkmesh_transport::MemoryTransport;
use serde_json::json;

use crate::client::TestPeer;

/// A `VerifyFn` that always accepts or always rejects, regardless of the
/// handshake metadata offered.
#[must_use]
pub fn always(verdict: bool) -> VerifyFn {
    Arc::new(move |_metadata, _context| Box::pin(async move { Ok(verdict) }))
}

/// A `VerifyFn` that accepts iff the handshake metadata's `role` key
/// equals `expected`.
#[must_use]
pub fn verify_role(expected: &'static str) -> VerifyFn {
    Arc::new(move |metadata, _context| {
        let matches = metadata
            .get("role")
            .and_then(|v| v.as_str())
            .is_some_and(|role| role == expected);
        Box::pin(async move { Ok(matches) })
    })
}

/// A sample descriptor identifying a named service, e.g.
/// `sample_descriptor("billing")` => `{"service": "billing"}`.
#[must_use]
pub fn sample_descriptor(service: &str) -> Metadata {
    Metadata::new(json!({ "service": service }))
}

/// A sample identity with both a service name and group memberships.
#[must_use]
pub fn sample_identity(service: &str, groups: &[&str]) -> Metadata {
    Metadata::new(json!({ "service": service, "groups": groups }))
}

/// Two [`TestPeer`]s sharing a [`MemoryTransport::pair`], both already
/// `initialize`d, both verifying unconditionally. `server` listens, `client`
/// is free to dial it.
///
/// # Panics
///
/// Panics if either peer fails to initialize (binding an in-memory
/// listener never fails in practice).
pub async fn connected_pair(server_identity: Metadata, client_identity: Metadata) -> (TestPeer, TestPeer) {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let server = TestPeer::new(server_transport, always(true), server_identity);
    let client = TestPeer::new(client_transport, always(true), client_identity);
    server.initialize().await.expect("server initialize");
    client.initialize().await.expect("client initialize");
    (server, client)
}
