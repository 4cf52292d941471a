//! Session recording for connection testing.
//!
//! A [`TestSession`] records every `WireMessage` sent and received on one
//! side of a connection, plus any errors surfaced, and validates simple
//! structural invariants (e.g. no `HandshakeAck`/`HandshakeReject` without
//! a prior `HandshakeReq`) once the session is finalized.

use std::sync::RwLock;

use linkmesh_core::message::WireMessage;

/// One recorded message, tagged by direction.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// `true` if this side sent the message, `false` if it received it.
    pub outbound: bool,
    /// The message itself.
    pub message: WireMessage,
}

/// Records every message and error seen on one side of a connection.
pub struct TestSession {
    name: String,
    records: RwLock<Vec<MessageRecord>>,
    errors: RwLock<Vec<String>>,
}

impl std::fmt::Debug for TestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession").field("name", &self.name).finish_non_exhaustive()
    }
}

impl TestSession {
    /// A fresh, empty session.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), records: RwLock::new(Vec::new()), errors: RwLock::new(Vec::new()) }
    }

    /// The session name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a message this side sent.
    pub fn record_outbound(&self, message: WireMessage) {
        self.records.write().unwrap().push(MessageRecord { outbound: true, message });
    }

    /// Record a message this side received.
    pub fn record_inbound(&self, message: WireMessage) {
        self.records.write().unwrap().push(MessageRecord { outbound: false, message });
    }

    /// Record an error.
    pub fn record_error(&self, error: impl Into<String>) {
        self.errors.write().unwrap().push(error.into());
    }

    /// All recorded messages, in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<MessageRecord> {
        self.records.read().unwrap().clone()
    }

    /// Finalize the session, running the structural validator.
    #[must_use]
    pub fn finalize(self) -> TestSessionResult {
        let records = self.records.into_inner().unwrap();
        let errors = self.errors.into_inner().unwrap();
        let validation = validate(&records);
        TestSessionResult { name: self.name, records, errors, validation }
    }
}

/// Checks a recorded message sequence for handshake-protocol violations
/// (§4.1): an ack/reject with no preceding request, or more than one
/// request on the same side.
fn validate(records: &[MessageRecord]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut req_sent = false;
    let mut req_received = false;

    for record in records {
        match (&record.message, record.outbound) {
            (WireMessage::HandshakeReq { .. }, true) => req_sent = true,
            (WireMessage::HandshakeReq { .. }, false) => req_received = true,
            (WireMessage::HandshakeAck { .. } | WireMessage::HandshakeReject { .. }, true) if !req_received => {
                errors.push("sent a handshake ack/reject with no prior inbound request".to_string());
            }
            (WireMessage::HandshakeAck { .. } | WireMessage::HandshakeReject { .. }, false) if !req_sent => {
                errors.push("received a handshake ack/reject with no prior outbound request".to_string());
            }
            _ => {}
        }
    }

    ValidationResult { valid: errors.is_empty(), errors }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Whether the recorded sequence was structurally sound.
    pub valid: bool,
    /// Each violation found.
    pub errors: Vec<String>,
}

/// Result of a completed [`TestSession`].
#[derive(Debug)]
pub struct TestSessionResult {
    /// Session name.
    pub name: String,
    /// All recorded messages.
    pub records: Vec<MessageRecord>,
    /// All recorded errors.
    pub errors: Vec<String>,
    /// Structural validation result.
    pub validation: ValidationResult,
}

impl TestSessionResult {
    /// Whether the session's message sequence was structurally valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation.valid
    }

    /// Total message count.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.records.len()
    }

    /// Assert the session validated cleanly.
    ///
    /// # Panics
    ///
    /// Panics if validation found any errors.
    pub fn assert_valid(&self) {
        assert!(
            self.is_valid(),
            "session '{}' validation failed:\n{}",
            self.name,
            self.validation.errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n")
        );
    }

    /// Assert an exact message count.
    ///
    /// # Panics
    ///
    /// Panics if the count doesn't match.
    pub fn assert_message_count(&self, expected: usize) {
        assert_eq!(self.message_count(), expected, "expected {} messages, got {}", expected, self.message_count());
    }

    /// Assert no errors were recorded.
    ///
    /// # Panics
    ///
    /// Panics if any errors were recorded.
    pub fn assert_no_errors(&self) {
        assert!(self.errors.is_empty(), "expected no errors, got {:?}", self.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmesh_core::ids::MessageId;
    use linkmesh_core::metadata::Metadata;

    #[test]
    fn well_formed_handshake_validates() {
        let session = TestSession::new("client-side");
        session.record_outbound(WireMessage::HandshakeReq {
            id: MessageId::new(1),
            metadata: Metadata::empty(),
            assigns: None,
        });
        session.record_inbound(WireMessage::HandshakeAck { id: MessageId::new(1), metadata: Metadata::empty() });

        let result = session.finalize();
        result.assert_valid();
        result.assert_message_count(2);
    }

    #[test]
    fn ack_without_request_fails_validation() {
        let session = TestSession::new("client-side");
        session.record_inbound(WireMessage::HandshakeAck { id: MessageId::new(1), metadata: Metadata::empty() });

        let result = session.finalize();
        assert!(!result.is_valid());
        assert!(!result.validation.errors.is_empty());
    }
}
