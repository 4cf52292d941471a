//! Manager configuration.
//!
//! linkmesh-conn does not read files or environment variables itself —
//! that's L3's job — the caller builds this config explicitly and hands
//! it to `ConnectionManager::new`.

use linkmesh_core::metadata::Metadata;

/// Configuration for a [`crate::manager::ConnectionManager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Descriptors to eagerly dial during `initialize()` (§4.2,
    /// "eagerly dials any pre-configured targets").
    pub pre_warm_targets: Vec<Metadata>,
}

impl ManagerConfig {
    /// An empty config: listen-only, no pre-warmed dials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor to dial during `initialize()`.
    #[must_use]
    pub fn with_pre_warm_target(mut self, descriptor: Metadata) -> Self {
        self.pre_warm_targets.push(descriptor);
        self
    }
}
