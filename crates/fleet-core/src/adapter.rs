use serde_json::Value;
use tokio::time::Instant;

use crate::error::AdapterError;
use crate::scope::Level;

/// Deadline and cancellation context handed to an [`Adapter`] for a single
/// host call. Adapters are expected to honor `deadline`; the runner also
/// races the call against `tokio::time::timeout` independently, so a
/// non-cooperative adapter is still classified as [`AdapterError::Timeout`].
#[derive(Debug, Clone, Copy)]
pub struct CollectContext {
    pub deadline: Instant,
}

impl CollectContext {
    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Normalized records returned by a successful adapter call, scope-tagged
/// so the runner knows how to fold the result into `SnapshotData` without
/// otherwise interpreting the payload.
#[derive(Debug, Clone)]
pub enum CollectedRecords {
    /// One host's VM inventory (scope = `Vms`).
    Vms(Vec<Value>),
    /// One host's summary record (scope = `Hosts`).
    Host(Value),
}

/// Pluggable per-provider collection contract. Implemented externally (one
/// impl per upstream hypervisor/cloud platform); the engine only ever calls
/// through this trait.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    async fn collect(
        &self,
        host: &str,
        level: Level,
        ctx: &CollectContext,
    ) -> Result<CollectedRecords, AdapterError>;
}
