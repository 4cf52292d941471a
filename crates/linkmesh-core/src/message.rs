//! Wire message types.
//!
//! Four handshake/identity variants are defined here; everything else is
//! opaque application payload that linkmesh forwards without interpreting.
//! `id` is allocated per [`crate::ids::MessageId`] except for
//! `IdentityUpdate`, which is fire-and-forget (`id: null`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnError;
use crate::ids::MessageId;
use crate::metadata::Metadata;

/// A serialized error, as carried on `HANDSHAKE_REJECT` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedError {
    /// Machine-readable code, e.g. `E_HANDSHAKE_REJECTED`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&ConnError> for SerializedError {
    fn from(err: &ConnError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// A message exchanged on the wire between two [`crate::ids::ConnectionId`]
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Active side's handshake request (§4.1 step 1).
    #[serde(rename = "HANDSHAKE_REQ")]
    HandshakeReq {
        /// Message id.
        id: MessageId,
        /// The active side's local identity.
        metadata: Metadata,
        /// Optional christening payload: an identity the passive side
        /// should adopt as its own.
        #[serde(skip_serializing_if = "Option::is_none")]
        assigns: Option<Metadata>,
    },
    /// Passive side's handshake acknowledgement (§4.1 step 3).
    #[serde(rename = "HANDSHAKE_ACK")]
    HandshakeAck {
        /// Message id.
        id: MessageId,
        /// The passive side's (possibly christened) local identity.
        metadata: Metadata,
    },
    /// Passive side's handshake rejection (§4.1 step 3).
    #[serde(rename = "HANDSHAKE_REJECT")]
    HandshakeReject {
        /// Message id.
        id: MessageId,
        /// The rejection reason.
        error: SerializedError,
    },
    /// Identity mutation, valid only while Connected (§4.1, "Identity
    /// updates"). Fire-and-forget: no response is expected.
    #[serde(rename = "IDENTITY_UPDATE")]
    IdentityUpdate {
        /// Shallow-merge patch applied to the receiver's view of the
        /// sender's identity.
        updates: Metadata,
    },
    /// Opaque, L3-defined application payload.
    #[serde(rename = "APPLICATION")]
    Application(Value),
}

impl WireMessage {
    /// `true` iff this variant is part of the handshake protocol (REQ,
    /// ACK, or REJECT) rather than `IdentityUpdate`/`Application`.
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::HandshakeReq { .. } | Self::HandshakeAck { .. } | Self::HandshakeReject { .. }
        )
    }
}
