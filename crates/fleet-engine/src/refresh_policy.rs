//! `TriggerRefresh`: dedupe against an already-active job, synthesize a
//! friendly terminal job while the refresh interval's cooldown is still
//! active, or create a new pending job and kick the scheduler.

use chrono::{Duration, Utc};
use fleet_core::{HostJobState, HostJobStatus, Job, JobProgress, JobState, ScopeKey};

use crate::scheduler::Scheduler;
use crate::store::{JobStore, SnapshotStore};

/// Decides what `TriggerRefresh(scope_key, force)` should return without
/// necessarily starting any work.
pub async fn trigger_refresh(
    job_store: &JobStore,
    snapshot_store: &SnapshotStore,
    scheduler: &Scheduler,
    scope_key: &ScopeKey,
    force: bool,
    refresh_interval_minutes: u32,
) -> Job {
    if let Some(active) = job_store.get_active_for_scope(scope_key) {
        return active;
    }

    let now = Utc::now();
    if !force {
        if let Some(snapshot) = snapshot_store.get_snapshot(scope_key).await {
            let interval = Duration::minutes(refresh_interval_minutes as i64);
            if now - snapshot.generated_at < interval {
                return synthesize_cooldown_job(scope_key, snapshot.generated_at, interval);
            }
        }
    }

    let job = job_store.create_job(scope_key.clone());
    scheduler.kick();
    job
}

/// A `Succeeded("cooldown_active")` job covering the whole scope without
/// spawning any work, standing in for "the data is fresh enough already".
fn synthesize_cooldown_job(scope_key: &ScopeKey, generated_at: chrono::DateTime<Utc>, interval: Duration) -> Job {
    let now = Utc::now();
    let cooldown_until = generated_at + interval;
    let hosts_status = scope_key
        .hosts
        .iter()
        .map(|h| {
            (
                h.clone(),
                HostJobStatus {
                    state: Some(HostJobState::Ok),
                    last_finished_at: Some(generated_at),
                    ..Default::default()
                },
            )
        })
        .collect();
    let progress = JobProgress::recompute(&hosts_status);
    // Derived from (scope_key, generated_at) rather than randomized: repeated
    // TriggerRefresh calls during the same cooldown window must return the
    // same job_id (Testable Property #6 / scenario S2).
    let seed = format!("cooldown:{scope_key}:{}", generated_at.to_rfc3339());
    Job {
        job_id: fleet_core::JobId::from_seed(&seed),
        scope_key: scope_key.clone(),
        status: JobState::Succeeded,
        created_at: now,
        started_at: Some(generated_at),
        finished_at: Some(generated_at),
        last_heartbeat_at: now,
        message: Some("cooldown_active".to_string()),
        cooldown_until: Some(cooldown_until),
        hosts_status,
        progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fleet_core::{Adapter, AdapterError, CollectContext, CollectedRecords, Level, Provider, ProviderSettings, Scope};

    use crate::host_lock::HostLockRegistry;
    use crate::persistence::NullPersistence;
    use crate::runner::JobRunner;
    use crate::store::HostHealthStore;

    struct NoopAdapter;

    #[async_trait::async_trait]
    impl Adapter for NoopAdapter {
        async fn collect(&self, _host: &str, _level: Level, _ctx: &CollectContext) -> Result<CollectedRecords, AdapterError> {
            Ok(CollectedRecords::Vms(vec![]))
        }
    }

    fn key() -> ScopeKey {
        ScopeKey::new(Scope::Vms, ["vc1"], Level::Summary)
    }

    fn harness() -> (Arc<JobStore>, Arc<SnapshotStore>, Scheduler) {
        let job_store = Arc::new(JobStore::new());
        let snapshot_store = Arc::new(SnapshotStore::new(Provider::Vmware, Arc::new(NullPersistence)));
        let runner = JobRunner {
            adapter: Arc::new(NoopAdapter),
            job_store: job_store.clone(),
            snapshot_store: snapshot_store.clone(),
            health_store: Arc::new(HostHealthStore::new()),
            host_locks: Arc::new(HostLockRegistry::new()),
            settings: ProviderSettings::defaults_configured(),
        };
        let scheduler = Scheduler::new(job_store.clone(), runner, 4, Arc::new(tokio::sync::Notify::new()));
        (job_store, snapshot_store, scheduler)
    }

    #[tokio::test]
    async fn dedupe_returns_existing_active_job_without_creating_a_second_one() {
        let (job_store, snapshot_store, scheduler) = harness();
        let active = job_store.create_job(key());

        let returned = trigger_refresh(&job_store, &snapshot_store, &scheduler, &key(), false, 60).await;

        assert_eq!(returned.job_id, active.job_id);
        assert_eq!(job_store.list_jobs_by_status(&[JobState::Pending, JobState::Running]).len(), 1);
    }

    #[tokio::test]
    async fn fresh_snapshot_synthesizes_cooldown_job_without_touching_job_store() {
        let (job_store, snapshot_store, scheduler) = harness();
        snapshot_store.init_snapshot(&key()).await;

        let returned = trigger_refresh(&job_store, &snapshot_store, &scheduler, &key(), false, 60).await;

        assert_eq!(returned.message.as_deref(), Some("cooldown_active"));
        assert!(job_store.get_active_for_scope(&key()).is_none());
    }

    #[tokio::test]
    async fn repeated_calls_during_cooldown_return_the_same_job_id() {
        let (job_store, snapshot_store, scheduler) = harness();
        snapshot_store.init_snapshot(&key()).await;

        let first = trigger_refresh(&job_store, &snapshot_store, &scheduler, &key(), false, 60).await;
        let second = trigger_refresh(&job_store, &snapshot_store, &scheduler, &key(), false, 60).await;

        assert_eq!(first.job_id, second.job_id);
    }

    #[tokio::test]
    async fn force_bypasses_cooldown_and_creates_a_real_job() {
        let (job_store, snapshot_store, scheduler) = harness();
        snapshot_store.init_snapshot(&key()).await;

        let returned = trigger_refresh(&job_store, &snapshot_store, &scheduler, &key(), true, 60).await;

        assert_ne!(returned.message.as_deref(), Some("cooldown_active"));
        assert_eq!(job_store.get_active_for_scope(&key()).map(|j| j.job_id), Some(returned.job_id));
    }
}
