//! Scheduler instance identity, used as the claim owner in the data store.

use std::sync::atomic::{AtomicU32, Ordering};

static INSTANCE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Names one running scheduler process for the purposes of the claim
/// protocol in [`crate::domain::ports::data_store::DataStore`]. Two
/// schedulers sharing a store must never collide on identity, or they
/// will believe they own each other's claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `{host}-{pid}-{instance}`, matching the "host name, process id, and
    /// an in-process discriminator" default from the spec.
    pub fn generate() -> Self {
        let host = nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        let pid = std::process::id();
        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{host}-{pid}-{instance}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identities_are_distinct() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert_ne!(a, b);
    }
}
