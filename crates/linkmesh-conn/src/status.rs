//! Connection lifecycle status.

use std::fmt;

/// Where a [`crate::connection::LogicalConnection`] sits in its handshake
/// lifecycle. Transitions only move forward; there is no way back to an
/// earlier status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Freshly constructed; no handshake message sent or received yet.
    Initializing,
    /// A `HANDSHAKE_REQ` has been sent or received; awaiting the other
    /// side's response.
    Handshaking,
    /// Handshake verified; application messages may flow.
    Connected,
    /// `close()` was called or the port failed; waiting for the port to
    /// finish tearing down.
    Closing,
    /// Terminal. The port is closed and `onClosed` has fired exactly once.
    Closed,
}

impl ConnectionStatus {
    /// `true` iff `self -> next` is a legal forward transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionStatus::{Closed, Closing, Connected, Handshaking, Initializing};
        matches!(
            (self, next),
            (Initializing, Handshaking)
                | (Initializing, Closing)
                | (Handshaking, Connected)
                | (Handshaking, Closing)
                | (Connected, Closing)
                | (Closing, Closed)
                // A port disconnect jumps straight to Closed from any
                // non-Closed status, bypassing Closing (§4.1 disconnect
                // semantics: "if status != Closed, transition to Closed").
                | (Initializing, Closed)
                | (Handshaking, Closed)
                | (Connected, Closed)
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Handshaking => "handshaking",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_legal() {
        assert!(ConnectionStatus::Initializing.can_transition_to(ConnectionStatus::Handshaking));
        assert!(ConnectionStatus::Handshaking.can_transition_to(ConnectionStatus::Connected));
        assert!(ConnectionStatus::Connected.can_transition_to(ConnectionStatus::Closing));
        assert!(ConnectionStatus::Closing.can_transition_to(ConnectionStatus::Closed));
    }

    #[test]
    fn backward_transitions_are_illegal() {
        assert!(!ConnectionStatus::Connected.can_transition_to(ConnectionStatus::Handshaking));
        assert!(!ConnectionStatus::Closed.can_transition_to(ConnectionStatus::Initializing));
    }
}
