//! Periodic background loop that keeps a scope's snapshot from going stale
//! without requiring an HTTP-triggered refresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleet_core::{Level, Scope};

use crate::scheduler::Scheduler;
use crate::store::{JobStore, SnapshotStore};

/// Supplies the host list a warmup tick should refresh for a given scope.
/// Every provider but Hyper-V's `Hosts` scope just returns its configured
/// list; Hyper-V couples `Hosts` warmup to the host list of its own last
/// `Vms` job so the two scopes never drift apart.
pub trait HostListResolver: Send + Sync {
    fn resolve(&self, scope: Scope) -> Vec<String>;
}

/// The common case: the configured host list never changes per scope.
pub struct StaticHostList {
    pub hosts: Vec<String>,
}

impl HostListResolver for StaticHostList {
    fn resolve(&self, _scope: Scope) -> Vec<String> {
        self.hosts.clone()
    }
}

/// Returns `None` if a provider is not currently configured/reachable; a
/// warmup tick is skipped entirely in that case rather than spinning up a
/// job doomed to fail on every host.
pub trait ConfiguredCheck: Send + Sync {
    fn is_configured(&self) -> bool;
}

/// Always considers the provider configured. Used where readiness is
/// assumed (tests, or providers without a separate config probe).
pub struct AlwaysConfigured;

impl ConfiguredCheck for AlwaysConfigured {
    fn is_configured(&self) -> bool {
        true
    }
}

pub struct WarmupLoop {
    job_store: Arc<JobStore>,
    snapshot_store: Arc<SnapshotStore>,
    scheduler: Arc<Scheduler>,
    host_list: Arc<dyn HostListResolver>,
    configured: Arc<dyn ConfiguredCheck>,
    scope: Scope,
    level: Level,
    refresh_interval_minutes: u32,
    stop: Arc<tokio::sync::Notify>,
}

impl WarmupLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_store: Arc<JobStore>,
        snapshot_store: Arc<SnapshotStore>,
        scheduler: Arc<Scheduler>,
        host_list: Arc<dyn HostListResolver>,
        configured: Arc<dyn ConfiguredCheck>,
        scope: Scope,
        level: Level,
        refresh_interval_minutes: u32,
    ) -> Self {
        Self {
            job_store,
            snapshot_store,
            scheduler,
            host_list,
            configured,
            scope,
            level,
            refresh_interval_minutes,
            stop: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// A cloned handle to this loop's stop signal, usable after `self` has
    /// been moved into a spawned task.
    pub fn stop_handle(&self) -> Arc<tokio::sync::Notify> {
        self.stop.clone()
    }

    fn scope_key(&self) -> fleet_core::ScopeKey {
        fleet_core::ScopeKey::new(self.scope, self.host_list.resolve(self.scope), self.level)
    }

    async fn should_warm(&self) -> bool {
        if !self.configured.is_configured() {
            return false;
        }
        let scope_key = self.scope_key();
        let now = Utc::now();
        if let Some(snap) = self.snapshot_store.get_snapshot(&scope_key).await {
            let interval = chrono::Duration::minutes(self.refresh_interval_minutes as i64);
            if now - snap.generated_at < interval {
                return false;
            }
        }
        self.job_store.get_active_for_scope(&scope_key).is_none()
    }

    /// Runs until [`WarmupLoop::stop`] is called. Tick interval is
    /// `max(refresh_interval_minutes, 10)` minutes, matching the upstream
    /// warmup cadence.
    pub async fn run(self) {
        let interval_minutes = self.refresh_interval_minutes.max(10);
        let interval = Duration::from_secs(interval_minutes as u64 * 60);
        loop {
            if self.should_warm().await {
                let scope_key = self.scope_key();
                tracing::info!(scope = %scope_key, "warmup: creating job");
                self.job_store.create_job(scope_key);
                self.scheduler.kick();
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.stop.notified() => return,
            }
        }
    }
}
