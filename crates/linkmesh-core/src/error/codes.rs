//! Machine-readable error codes surfaced to callers.
//!
//! These are the `Code` strings carried on [`super::ConnError`]; they are
//! stable across releases so callers can match on them without depending
//! on `Debug` formatting.

/// The passive side's `verify` hook rejected the remote identity.
pub const HANDSHAKE_REJECTED: &str = "E_HANDSHAKE_REJECTED";

/// The dial failed, or the remote closed before verification completed.
pub const HANDSHAKE_FAILED: &str = "E_HANDSHAKE_FAILED";

/// An operation was called in a forbidden state (not initialized, double
/// handshake, etc).
pub const USAGE_INVALID: &str = "E_USAGE_INVALID";

/// A malformed wire message was received.
pub const PROTOCOL_ERROR: &str = "E_PROTOCOL_ERROR";

/// A transport-layer failure bubbled up unchanged.
pub const ENDPOINT: &str = "E_ENDPOINT";
