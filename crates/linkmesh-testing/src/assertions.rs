//! Custom assertions for linkmesh testing.
//!
//! Helpers that make test failures about connection lifecycle and routing
//! legible without hand-rolling `matches!` + `panic!` at every call site.

use linkmesh_conn::{ConnectionEvent, ConnectionHandle};
use linkmesh_core::message::WireMessage;

/// Assert that a handle is Connected right now.
///
/// # Panics
///
/// Panics if the connection is not ready.
pub async fn assert_ready(handle: &ConnectionHandle) {
    assert!(
        handle.is_ready().await,
        "expected connection {:?} to be ready",
        handle.connection_id()
    );
}

/// Assert that a handle's remote identity matches `expected` exactly.
///
/// # Panics
///
/// Panics if there is no remote identity, or it doesn't match.
pub async fn assert_remote_identity(handle: &ConnectionHandle, expected: &linkmesh_core::metadata::Metadata) {
    let identity = handle
        .remote_identity()
        .await
        .unwrap_or_else(|| panic!("connection {:?} has no remote identity", handle.connection_id()));
    assert_eq!(&identity, expected, "remote identity mismatch");
}

/// Assert that `events` contains exactly one `Closed` event, with the
/// expected identity presence.
///
/// # Panics
///
/// Panics if `events` doesn't match the expected shape.
pub fn assert_closed(events: &[ConnectionEvent], expect_identity: bool) {
    match events {
        [ConnectionEvent::Closed { identity }] => {
            assert_eq!(
                identity.is_some(),
                expect_identity,
                "Closed event identity presence mismatch: {identity:?}"
            );
        }
        other => panic!("expected a single Closed event, got {other:?}"),
    }
}

/// Assert that `events` contains exactly one `Verified` event.
///
/// # Panics
///
/// Panics if `events` doesn't match the expected shape.
pub fn assert_verified(events: &[ConnectionEvent]) -> linkmesh_core::metadata::Metadata {
    match events {
        [ConnectionEvent::Verified { remote_identity }] => remote_identity.clone(),
        other => panic!("expected a single Verified event, got {other:?}"),
    }
}

/// Assert that `msg` is an `Application` payload equal to `expected`.
///
/// # Panics
///
/// Panics if `msg` isn't an `Application` message, or its payload differs.
pub fn assert_application(msg: &WireMessage, expected: &serde_json::Value) {
    match msg {
        WireMessage::Application(payload) => {
            assert_eq!(payload, expected, "application payload mismatch");
        }
        other => panic!("expected an Application message, got {other:?}"),
    }
}
