//! Process-wide per-host mutual exclusion, shared across every `Core`
//! regardless of provider — two providers polling the same hostname never
//! run their adapter calls concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Lazily-populated registry of per-host locks. Construct once at process
/// start and share the `Arc` across every `Core` instance.
#[derive(Debug, Default)]
pub struct HostLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl HostLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `host` (case-insensitive), creating it on first
    /// use. Cloning the returned `Arc` is cheap; hold the guard only across
    /// the adapter call, never across store access.
    pub fn lock_for(&self, host: &str) -> Arc<Mutex<()>> {
        let key = host.to_lowercase();
        self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_host_different_case_shares_one_lock() {
        let registry = HostLockRegistry::new();
        assert!(Arc::ptr_eq(&registry.lock_for("VC1"), &registry.lock_for("vc1")));
    }

    #[test]
    fn distinct_hosts_get_distinct_locks() {
        let registry = HostLockRegistry::new();
        assert!(!Arc::ptr_eq(&registry.lock_for("vc1"), &registry.lock_for("vc2")));
    }
}
