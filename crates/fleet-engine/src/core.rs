//! `Core`: the per-(provider, scope) facade external callers talk to.
//! One instance exists per (provider, scope) pair; the host lock registry
//! is the only piece shared across every `Core` in the process.

use std::sync::Arc;

use fleet_core::{Adapter, EngineError, Job, JobId, Level, Provider, ProviderSettings, Scope, ScopeKey, SnapshotPayload};
use tokio::sync::Notify;

use crate::host_lock::HostLockRegistry;
use crate::persistence::SnapshotPersistence;
use crate::refresh_policy;
use crate::runner::JobRunner;
use crate::scheduler::Scheduler;
use crate::store::{HostHealthStore, JobStore, SnapshotStore};
use crate::warmup::{HostListResolver, WarmupLoop};

/// Owns the scheduler task handle and exposes the facade's four
/// operations: `trigger_refresh`, `get_job`, `get_snapshot`, `shutdown`.
pub struct Core {
    provider: Provider,
    scope: Scope,
    level: Level,
    settings: ProviderSettings,
    job_store: Arc<JobStore>,
    snapshot_store: Arc<SnapshotStore>,
    scheduler: Arc<Scheduler>,
    scheduler_notify: Arc<Notify>,
    host_list: Arc<dyn HostListResolver>,
}

impl Core {
    /// Wires a fresh `Core` for one (provider, scope) pair. `host_locks`
    /// must be the single process-wide registry shared by every `Core`.
    pub fn new(
        provider: Provider,
        scope: Scope,
        level: Level,
        settings: ProviderSettings,
        adapter: Arc<dyn Adapter>,
        persistence: Arc<dyn SnapshotPersistence>,
        host_locks: Arc<HostLockRegistry>,
        host_list: Arc<dyn HostListResolver>,
    ) -> Self {
        let job_store = Arc::new(JobStore::new());
        let snapshot_store = Arc::new(SnapshotStore::new(provider, persistence));
        let health_store = Arc::new(HostHealthStore::new());
        let scheduler_notify = Arc::new(Notify::new());

        let runner = JobRunner {
            adapter,
            job_store: job_store.clone(),
            snapshot_store: snapshot_store.clone(),
            health_store,
            host_locks,
            settings: settings.clone(),
        };
        let scheduler = Arc::new(Scheduler::new(job_store.clone(), runner, settings.job_max_global, scheduler_notify.clone()));

        Self { provider, scope, level, settings, job_store, snapshot_store, scheduler, scheduler_notify, host_list }
    }

    /// Spawns the scheduler loop. Call once; the returned handle should be
    /// kept (or detached) for the life of the process.
    pub fn spawn_scheduler(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Builds and spawns this `Core`'s warmup loop. Returns a stop signal
    /// and join handle the caller uses on shutdown.
    pub fn spawn_warmup(&self, configured: Arc<dyn crate::warmup::ConfiguredCheck>) -> (Arc<Notify>, tokio::task::JoinHandle<()>) {
        let warmup = WarmupLoop::new(
            self.job_store.clone(),
            self.snapshot_store.clone(),
            self.scheduler.clone(),
            self.host_list.clone(),
            configured,
            self.scope,
            self.level,
            self.settings.refresh_interval_minutes,
        );
        let stop = warmup.stop_handle();
        let handle = tokio::spawn(async move { warmup.run().await });
        (stop, handle)
    }

    fn current_scope_key(&self) -> ScopeKey {
        ScopeKey::new(self.scope, self.host_list.resolve(self.scope), self.level)
    }

    /// `TriggerRefresh(scope_key, force)`. Returns `ProviderNotReady` if the
    /// provider is disabled or unconfigured — callers should check this
    /// before even reaching the HTTP/auth layer, but the facade enforces it
    /// too.
    pub async fn trigger_refresh(&self, force: bool) -> Result<Job, EngineError> {
        if !self.settings.enabled || !self.settings.configured {
            return Err(EngineError::ProviderNotReady);
        }
        let scope_key = self.current_scope_key();
        Ok(refresh_policy::trigger_refresh(
            &self.job_store,
            &self.snapshot_store,
            &self.scheduler,
            &scope_key,
            force,
            self.settings.refresh_interval_minutes,
        )
        .await)
    }

    pub fn get_job(&self, job_id: JobId) -> Option<Job> {
        self.job_store.get(job_id)
    }

    pub async fn get_snapshot(&self) -> Option<SnapshotPayload> {
        let scope_key = self.current_scope_key();
        self.snapshot_store.get_snapshot(&scope_key).await
    }

    /// Wakes the scheduler without creating a job; used after direct
    /// `JobStore::create_job` calls from outside the facade (e.g. tests).
    pub fn kick_scheduler(&self) {
        self.scheduler_notify.notify_one();
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

/// Join handles for a running `Core`'s background tasks, returned so the
/// owner can shut them down cleanly.
pub struct CoreHandle {
    pub scheduler: tokio::task::JoinHandle<()>,
    pub warmup: Option<(Arc<Notify>, tokio::task::JoinHandle<()>)>,
}

impl CoreHandle {
    /// Stops the warmup loop (if any) and aborts the scheduler task.
    pub fn shutdown(self) {
        if let Some((stop, handle)) = self.warmup {
            stop.notify_one();
            handle.abort();
        }
        self.scheduler.abort();
    }
}
