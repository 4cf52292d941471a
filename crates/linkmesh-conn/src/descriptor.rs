//! Resolution options and routing targets.

use linkmesh_core::metadata::{Matcher, Metadata};
use linkmesh_core::ConnectionId;

/// Arguments to [`crate::manager::ConnectionManager::resolve`].
#[derive(Clone, Default)]
pub struct ResolveOptions {
    /// Find an existing connection whose remote identity satisfies this
    /// predicate.
    pub matcher: Option<Matcher>,
    /// Find-or-create target. Required for the create path; without it,
    /// a non-matching `matcher` search returns `None` rather than dialing
    /// (§4.2 steps 2-3).
    pub descriptor: Option<Metadata>,
    /// Christening payload passed to `initiate_handshake` if a new
    /// connection is created.
    pub assignment_metadata: Option<Metadata>,
}

impl ResolveOptions {
    /// Find-only: locate a connection matching `matcher`, never dial.
    #[must_use]
    pub fn find_by_matcher(matcher: Matcher) -> Self {
        Self {
            matcher: Some(matcher),
            descriptor: None,
            assignment_metadata: None,
        }
    }

    /// Find-or-create: locate a connection whose remote identity
    /// deep-partial-matches `descriptor`, dialing one if none exists.
    #[must_use]
    pub fn find_or_create(descriptor: Metadata) -> Self {
        Self {
            matcher: None,
            descriptor: Some(descriptor),
            assignment_metadata: None,
        }
    }

    /// Attach a christening payload for the create path.
    #[must_use]
    pub fn with_assignment(mut self, assignment: Metadata) -> Self {
        self.assignment_metadata = Some(assignment);
        self
    }
}

/// The destination of [`crate::manager::ConnectionManager::send`] (§4.2,
/// "Routing").
#[derive(Clone)]
pub enum SendTarget {
    /// A single connection, addressed by id.
    Connection(ConnectionId),
    /// Every Ready member of a service group.
    Group(String),
    /// Every Ready connection with a known remote identity satisfying the
    /// predicate.
    Matcher(Matcher),
}
