//! Unified error handling for linkmesh.
//!
//! All errors flow through [`ConnError`], a single context-rich type
//! covering five kinds: handshake rejection, handshake failure, invalid
//! usage, protocol violation, and bubbled-up endpoint (transport) failures.

pub mod codes;
mod context;
mod transport;
mod types;

pub use context::ConnResultExt;
pub use transport::{TransportContext, TransportErrorKind};
pub use types::{ConnError, ErrorContext};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_per_variant() {
        assert_eq!(
            ConnError::handshake_rejected("no").code(),
            codes::HANDSHAKE_REJECTED
        );
        assert_eq!(
            ConnError::handshake_failed("dial failed").code(),
            codes::HANDSHAKE_FAILED
        );
        assert_eq!(
            ConnError::usage_invalid("not initialized").code(),
            codes::USAGE_INVALID
        );
        assert_eq!(
            ConnError::protocol_error("bad frame").code(),
            codes::PROTOCOL_ERROR
        );
    }

    #[test]
    fn context_wrapper_preserves_inner_code() {
        let err: Result<(), ConnError> = Err(ConnError::usage_invalid("double init"));
        let wrapped = err.context("while resolving").unwrap_err();
        assert_eq!(wrapped.code(), codes::USAGE_INVALID);
        assert!(wrapped.to_string().contains("while resolving"));
    }

    #[test]
    fn handshake_failed_from_chains_cause() {
        let cause = ConnError::handshake_rejected("policy denied");
        let err = ConnError::handshake_failed_from("dial aborted", cause);
        assert_eq!(err.code(), codes::HANDSHAKE_FAILED);
        assert!(err.to_string().contains("dial aborted"));
    }
}
