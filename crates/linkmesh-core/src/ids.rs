//! Identifiers allocated by a `ConnectionManager` (§3).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A connection identifier, unique within a single manager and allocated
/// monotonically (§3, invariant: "generated monotonically").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id (used by tests and by `ConnectionIdAllocator`).
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A wire message identifier (§6): "monotonically increasing integer
/// allocated per Manager"; `IdentityUpdate` messages use `null` instead,
/// represented at the call site rather than here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw id.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monotonic allocator shared by a `ConnectionManager` for both
/// connection ids and message ids (§3: "monotonic counters for
/// connection_id and message_id").
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_connection: AtomicU64,
    next_message: AtomicU64,
}

impl IdAllocator {
    /// A fresh allocator with both counters starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_connection: AtomicU64::new(1),
            next_message: AtomicU64::new(1),
        }
    }

    /// Allocate the next connection id.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate the next message id. A distinct counter from connection
    /// ids, since the two id spaces are unrelated (§3).
    pub fn next_message_id(&self) -> MessageId {
        MessageId(self.next_message.fetch_add(1, Ordering::Relaxed))
    }
}
