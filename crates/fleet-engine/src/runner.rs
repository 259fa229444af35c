//! Per-host state machine executed once per pending job: deadline check,
//! cooldown check, host-locked adapter call, health bookkeeping, snapshot
//! upsert, job status update.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fleet_core::{
    Adapter, CollectContext, CollectedRecords, HostJobState, HostJobStatus, Job, ProviderSettings,
    Scope, ScopeKey, SnapshotHostState, SnapshotHostStatus,
};
use futures::stream::{self, StreamExt};

use crate::host_lock::HostLockRegistry;
use crate::store::snapshot_store::UpsertHostFields;
use crate::store::{HostHealthStore, JobStore, SnapshotStore};

/// Executes one job end to end. Constructed per `Core`; cheap to clone
/// (everything inside is an `Arc`).
#[derive(Clone)]
pub struct JobRunner {
    pub adapter: Arc<dyn Adapter>,
    pub job_store: Arc<JobStore>,
    pub snapshot_store: Arc<SnapshotStore>,
    pub health_store: Arc<HostHealthStore>,
    pub host_locks: Arc<HostLockRegistry>,
    pub settings: ProviderSettings,
}

impl JobRunner {
    /// Runs `job` to completion, updating the job/snapshot/health stores
    /// along the way. The caller is responsible for holding the global
    /// concurrency permit for the duration of this call.
    pub async fn run(&self, job: Job, scope_key: ScopeKey) {
        let start_ts = Utc::now();
        let deadline = start_ts + Duration::from_std(self.settings.job_max_duration).unwrap_or(Duration::seconds(900));
        let tokio_deadline = tokio::time::Instant::now() + self.settings.job_max_duration;

        self.job_store.update_job(job.job_id, |j| {
            j.status = fleet_core::JobState::Running;
            j.started_at = Some(start_ts);
            j.last_heartbeat_at = Utc::now();
        });

        if self.snapshot_store.get_snapshot(&scope_key).await.is_none() {
            self.snapshot_store.init_snapshot(&scope_key).await;
        }

        let ok_count = AtomicUsize::new(0);
        let error_count = AtomicUsize::new(0);
        let max_workers = self.settings.job_max_per_scope.max(1).min(scope_key.hosts.len().max(1));

        stream::iter(scope_key.hosts.clone())
            .for_each_concurrent(max_workers, |host| {
                let job = &job;
                let scope_key = &scope_key;
                let ok_count = &ok_count;
                let error_count = &error_count;
                async move {
                    self.run_host(job, scope_key, &host, deadline, tokio_deadline, ok_count, error_count).await;
                }
            })
            .await;

        self.finalize(job, &scope_key, start_ts, deadline, ok_count.load(Ordering::Relaxed), error_count.load(Ordering::Relaxed)).await;
    }

    async fn run_host(
        &self,
        job: &Job,
        scope_key: &ScopeKey,
        host: &str,
        deadline: DateTime<Utc>,
        tokio_deadline: tokio::time::Instant,
        ok_count: &AtomicUsize,
        error_count: &AtomicUsize,
    ) {
        let now = Utc::now();
        if now >= deadline {
            return;
        }

        let health = self.health_store.get(host);
        let existing_data = self.snapshot_store.get_snapshot(scope_key).await.and_then(|s| s.data.get(host).cloned());

        if health.is_in_cooldown(now) {
            let recently_succeeded = health
                .last_success_at
                .is_some_and(|t| now - t <= Duration::minutes(self.settings.refresh_interval_minutes as i64));
            let state = if recently_succeeded { SnapshotHostState::SkippedCooldown } else { SnapshotHostState::Stale };

            let status = SnapshotHostStatus {
                state: Some(state),
                last_success_at: health.last_success_at,
                last_error_at: health.last_error_at,
                cooldown_until: health.cooldown_until,
                last_job_id: Some(job.job_id),
                ..Default::default()
            };
            // A host that has never had a successful collection still needs
            // a slot in the snapshot so it shows up as stale rather than
            // being silently absent.
            let placeholder_data = existing_data
                .clone()
                .or_else(|| (state == SnapshotHostState::Stale).then(|| serde_json::json!({"host": host})));
            self.snapshot_store
                .upsert_host(scope_key, host, placeholder_data, status, UpsertHostFields { generated_at: Some(Utc::now()), ..Default::default() })
                .await;

            self.job_store.update_job(job.job_id, |j| {
                let hj = j.hosts_status.entry(host.to_string()).or_default();
                hj.state = Some(if state == SnapshotHostState::SkippedCooldown {
                    HostJobState::SkippedCooldown
                } else {
                    HostJobState::Error
                });
                hj.last_started_at = Some(now);
                hj.last_finished_at = Some(now);
                hj.attempt += 1;
                hj.last_error = Some("cooldown_active".to_string());
                hj.cooldown_until = health.cooldown_until;
                j.last_heartbeat_at = Utc::now();
            });
            return;
        }

        let lock = self.host_locks.lock_for(host);
        let started = Utc::now();

        let (state, data, error_msg, error_type) = {
            let _guard = lock.lock().await;
            let ctx = CollectContext { deadline: tokio_deadline };
            let remaining = ctx.remaining().min(self.settings.job_host_timeout);
            match tokio::time::timeout(remaining, self.adapter.collect(host, scope_key.level, &ctx)).await {
                Ok(Ok(records)) => match collected_to_value(scope_key.scope, records) {
                    Some(value) => {
                        self.health_store.record_success(host, Utc::now());
                        ok_count.fetch_add(1, Ordering::Relaxed);
                        (SnapshotHostState::Ok, Some(value), None, None)
                    }
                    None => {
                        let msg = "adapter returned records for the wrong scope".to_string();
                        self.health_store.record_failure(host, Utc::now(), "parse_error", &msg);
                        error_count.fetch_add(1, Ordering::Relaxed);
                        (SnapshotHostState::Error, None, Some(msg.clone()), Some("parse_error".to_string()))
                    }
                },
                Ok(Err(adapter_err)) => {
                    let msg = adapter_err.error_message();
                    let error_type = adapter_err.error_type().to_string();
                    self.health_store.record_failure(host, Utc::now(), &error_type, &msg);
                    error_count.fetch_add(1, Ordering::Relaxed);
                    let state = if matches!(adapter_err, fleet_core::AdapterError::Timeout) {
                        SnapshotHostState::Timeout
                    } else {
                        SnapshotHostState::Error
                    };
                    (state, None, Some(msg), Some(error_type))
                }
                Err(_elapsed) => {
                    let msg = "host_timeout_exceeded".to_string();
                    self.health_store.record_failure(host, Utc::now(), "timeout", &msg);
                    error_count.fetch_add(1, Ordering::Relaxed);
                    (SnapshotHostState::Timeout, None, Some(msg), Some("timeout".to_string()))
                }
            }
        };
        let finished = Utc::now();

        let health_after = self.health_store.get(host);
        let state = if state == SnapshotHostState::Error
            && health_after.last_success_at.is_some_and(|t| Utc::now() - t > Duration::minutes(self.settings.refresh_interval_minutes as i64))
        {
            SnapshotHostState::Stale
        } else {
            state
        };

        let data = data.or(existing_data);
        let status = SnapshotHostStatus {
            state: Some(state),
            last_success_at: health_after.last_success_at,
            last_error_at: health_after.last_error_at,
            cooldown_until: health_after.cooldown_until,
            last_job_id: Some(job.job_id),
            last_error_type: error_type.clone(),
            last_error_message: error_msg.clone(),
        };
        self.snapshot_store
            .upsert_host(scope_key, host, data, status, UpsertHostFields { generated_at: Some(Utc::now()), ..Default::default() })
            .await;

        let job_state = match state {
            SnapshotHostState::Ok => HostJobState::Ok,
            SnapshotHostState::Error | SnapshotHostState::Stale => HostJobState::Error,
            SnapshotHostState::Timeout => HostJobState::Timeout,
            SnapshotHostState::SkippedCooldown => HostJobState::SkippedCooldown,
            SnapshotHostState::Pending => HostJobState::Pending,
        };
        self.job_store.update_job(job.job_id, |j| {
            let hj = j.hosts_status.entry(host.to_string()).or_default();
            hj.state = Some(job_state);
            hj.last_started_at = Some(started);
            hj.last_finished_at = Some(finished);
            hj.attempt += 1;
            hj.last_error = error_msg;
            hj.cooldown_until = health_after.cooldown_until;
            j.last_heartbeat_at = Utc::now();
        });
    }

    async fn finalize(&self, job: &Job, scope_key: &ScopeKey, start_ts: DateTime<Utc>, deadline: DateTime<Utc>, ok_count: usize, error_count: usize) {
        let finished_ts = Utc::now();
        let (final_status, message) = if finished_ts >= deadline {
            (fleet_core::JobState::Expired, Some("job_max_duration_reached".to_string()))
        } else if ok_count == 0 {
            let has_data = self.snapshot_store.get_snapshot(scope_key).await.is_some_and(|s| s.data.has_any_data());
            if has_data {
                (fleet_core::JobState::Succeeded, Some("partial".to_string()))
            } else {
                (fleet_core::JobState::Failed, None)
            }
        } else if error_count > 0 {
            (fleet_core::JobState::Succeeded, Some("partial".to_string()))
        } else {
            (fleet_core::JobState::Succeeded, None)
        };

        let updated = self.job_store.update_job(job.job_id, |j| {
            j.status = final_status;
            j.finished_at = Some(finished_ts);
            j.last_heartbeat_at = Utc::now();
            if j.started_at.is_none() {
                j.started_at = Some(start_ts);
            }
            j.message = message.clone();
        });

        if let Some(updated) = updated {
            self.job_store.mark_scope_finished(scope_key, updated);
        }
    }
}

/// Folds an adapter's result into the JSON value stored on the snapshot,
/// returning `None` if the adapter answered with the wrong scope's variant.
fn collected_to_value(scope: Scope, records: CollectedRecords) -> Option<serde_json::Value> {
    match (scope, records) {
        (Scope::Vms, CollectedRecords::Vms(records)) => Some(serde_json::Value::Array(records)),
        (Scope::Hosts, CollectedRecords::Host(value)) => Some(value),
        _ => None,
    }
}
