//! Testing harness for linkmesh.
//!
//! This crate provides the infrastructure used to exercise
//! [`linkmesh_conn`] end-to-end without a real transport:
//!
//! - **[`client::TestPeer`]** pairs a `ConnectionManager` with a recording
//!   `ManagerHandlers` so tests can assert on what reached L3.
//! - **[`fixtures`]** gives pre-built descriptors, verifiers, and a
//!   connected pair of peers over `MemoryTransport`.
//! - **[`assertions`]** checks connection lifecycle/routing outcomes.
//! - **[`scenario`]** runs named, multi-step connection scenarios.
//! - **[`session`]** records and validates a message sequence on one side
//!   of a connection.
//! - **[`async_helpers`]** provides timeout wrappers and latches for
//!   coordinating with the manager's background event loop.
//!
//! # Overview
//!
//! ```no_run
//! use linkmesh_testing::fixtures::{connected_pair, sample_descriptor};
//!
//! # async fn example() {
//! let (server, client) = connected_pair(
//!     sample_descriptor("billing"),
//!     sample_descriptor("caller"),
//! ).await;
//! let handle = client.connect_to(sample_descriptor("billing")).await.unwrap();
//! assert!(handle.is_ready().await);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod assertions;
pub mod async_helpers;
pub mod client;
pub mod fixtures;
pub mod scenario;
pub mod session;

pub use client::{RecordingHandlers, TestPeer};
pub use scenario::{MessageMatcher, ScenarioResult, TestScenario};
pub use session::{TestSession, TestSessionResult};

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::assertions::{assert_application, assert_closed, assert_ready, assert_remote_identity, assert_verified};
    pub use crate::async_helpers::{TestLatch, retry, wait_for, wait_for_async, with_default_timeout, with_timeout};
    pub use crate::client::{RecordingHandlers, TestPeer};
    pub use crate::fixtures::{always, connected_pair, sample_descriptor, sample_identity, verify_role};
    pub use crate::scenario::{MessageMatcher, ScenarioResult, TestScenario, TestStep};
    pub use crate::session::{TestSession, TestSessionResult};
}
