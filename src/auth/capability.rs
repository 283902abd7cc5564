use anyhow::Result;
use async_trait::async_trait;

/// Privilege check for an authenticated subject, backed by external storage.
#[async_trait]
pub trait CapabilityLookup: Send + Sync {
    async fn is_admin(&self, subject: &str) -> Result<bool>;
}

/// Resolved privileges. `degraded` is set when the lookup failed or timed out
/// and the safe default was used instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub is_admin: bool,
    pub degraded: bool,
}
