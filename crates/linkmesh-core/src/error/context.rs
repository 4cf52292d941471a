//! Context extension trait for error handling.
//!
//! `anyhow`-style context methods while preserving the typed error system.

use super::types::ConnError;

/// Extension trait for adding context to `Result` types.
///
/// # Example
///
/// ```rust
/// use linkmesh_core::error::{ConnError, ConnResultExt};
///
/// fn process() -> Result<(), ConnError> {
///     let result: Result<(), ConnError> = Err(ConnError::usage_invalid("not initialized"));
///     result.context("while resolving a connection")?;
///     Ok(())
/// }
/// ```
pub trait ConnResultExt<T> {
    /// Add context to an error.
    fn context<C: Into<String>>(self, context: C) -> Result<T, ConnError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<C, F>(self, f: F) -> Result<T, ConnError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ConnResultExt<T> for Result<T, ConnError> {
    fn context<C: Into<String>>(self, context: C) -> Self {
        self.map_err(|e| ConnError::WithContext {
            context: context.into(),
            source: Box::new(e),
        })
    }

    fn with_context<C, F>(self, f: F) -> Self
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| ConnError::WithContext {
            context: f().into(),
            source: Box::new(e),
        })
    }
}
