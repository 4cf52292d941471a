//! Concurrent `resolve` coalescing and connection reuse (P4, P5).

use linkmesh_conn::ResolveOptions;
use linkmesh_testing::fixtures::{connected_pair, sample_descriptor};

/// P4: two concurrent `resolve` calls for the same descriptor both
/// resolve to the same connection_id, dialing only once.
#[tokio::test]
async fn concurrent_resolves_coalesce_onto_one_connection() {
    let (_host, client) = connected_pair(sample_descriptor("host"), sample_descriptor("client")).await;

    let first = client.manager().resolve(ResolveOptions::find_or_create(sample_descriptor("host")));
    let second = client.manager().resolve(ResolveOptions::find_or_create(sample_descriptor("host")));
    let (first, second) = tokio::join!(first, second);
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    assert_eq!(first.connection_id(), second.connection_id());
}

/// P5: `resolve` called after a matching connection already exists reuses
/// it rather than dialing again.
#[tokio::test]
async fn resolve_after_established_connection_reuses_it() {
    let (_host, client) = connected_pair(sample_descriptor("host"), sample_descriptor("client")).await;

    let first = client.connect_to(sample_descriptor("host")).await.unwrap();
    let second = client
        .manager()
        .resolve(ResolveOptions::find_or_create(sample_descriptor("host")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.connection_id(), second.connection_id());
}
