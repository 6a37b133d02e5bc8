//! Registry configuration

/// How the registry treats a subscriber reference that is already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Add another entry for the same reference (live relay behavior)
    ///
    /// Each entry receives its own copy of every broadcast.
    #[default]
    Allow,
    /// Ignore the registration and report the existing id (demo server behavior)
    Reject,
}

/// Configuration for a [`BroadcastRegistry`](super::BroadcastRegistry)
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Duplicate registration contract
    pub duplicates: DuplicatePolicy,
}

impl RegistryConfig {
    /// Set the duplicate registration policy
    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }
}
