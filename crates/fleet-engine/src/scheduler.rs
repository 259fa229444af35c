//! Polls [`JobStore`] for pending jobs and starts one [`JobRunner`] task per
//! job as long as the global concurrency semaphore has a free permit.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::{Job, JobState, ScopeKey};
use tokio::sync::{Notify, Semaphore};

use crate::runner::JobRunner;
use crate::store::JobStore;

/// One per `Core`. `notify` wakes the loop immediately on `create_job`
/// instead of waiting for the poll tick; `concurrency` is the provider-wide
/// cap on simultaneously running jobs.
pub struct Scheduler {
    job_store: Arc<JobStore>,
    runner: JobRunner,
    concurrency: Arc<Semaphore>,
    notify: Arc<Notify>,
    stop: Arc<tokio::sync::Notify>,
}

impl Scheduler {
    pub fn new(job_store: Arc<JobStore>, runner: JobRunner, job_max_global: usize, notify: Arc<Notify>) -> Self {
        Self {
            job_store,
            runner,
            concurrency: Arc::new(Semaphore::new(job_max_global)),
            notify,
            stop: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Wakes the loop to re-check `JobStore` for newly pending jobs. Safe to
    /// call from any task.
    pub fn kick(&self) {
        self.notify.notify_one();
    }

    /// Signals the loop to exit after its current tick.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Drives the scheduler until [`Scheduler::stop`] is called. Intended to
    /// be spawned once per `Core` and left running for the process
    /// lifetime.
    pub async fn run(self: Arc<Self>) {
        loop {
            let pending: Vec<Job> = self.job_store.list_jobs_by_status(&[JobState::Pending]);
            if pending.is_empty() {
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    _ = self.stop.notified() => return,
                }
                continue;
            }

            for job in pending {
                let Ok(permit) = self.concurrency.clone().try_acquire_owned() else {
                    break;
                };
                let runner = self.runner.clone();
                let scope_key: ScopeKey = job.scope_key.clone();
                tracing::debug!(job_id = %job.job_id, scope = %scope_key, "starting job runner");
                tokio::spawn(async move {
                    runner.run(job, scope_key).await;
                    drop(permit);
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                _ = self.stop.notified() => return,
            }
        }
    }
}
