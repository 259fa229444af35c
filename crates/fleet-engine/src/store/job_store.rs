//! In-memory job store with dedupe-by-[`ScopeKey`] and basic eviction.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use fleet_core::{Job, JobId, JobState, ScopeKey};

/// Evict once the store holds more than this many jobs.
const MAX_ITEMS: usize = 128;
/// Retention window for terminal/old jobs once `MAX_ITEMS` is exceeded.
const MAX_AGE_MINUTES: i64 = 24 * 60;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    scope_index: HashMap<ScopeKey, JobId>,
}

/// Keeps the latest job per [`ScopeKey`] plus recent history, bounded by
/// [`MAX_ITEMS`]/[`MAX_AGE_MINUTES`].
pub struct JobStore {
    inner: Mutex<Inner>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    fn prune_locked(inner: &mut Inner) {
        if inner.jobs.len() <= MAX_ITEMS {
            return;
        }
        let cutoff = Utc::now() - Duration::minutes(MAX_AGE_MINUTES);
        let to_delete: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|job| job.created_at < cutoff || job.status.is_terminal())
            .map(|job| job.job_id)
            .collect();
        for job_id in to_delete {
            inner.jobs.remove(&job_id);
        }
        inner.scope_index.retain(|_, job_id| inner.jobs.contains_key(job_id));
    }

    pub fn get(&self, job_id: JobId) -> Option<Job> {
        let mut inner = self.inner.lock().expect("job store lock poisoned");
        let job = inner.jobs.get_mut(&job_id)?;
        job.recompute_progress();
        Some(job.clone())
    }

    /// The active (`Pending`/`Running`) job for `scope_key`, if one exists.
    /// Stale index entries (job evicted or finished) are cleaned up lazily.
    pub fn get_active_for_scope(&self, scope_key: &ScopeKey) -> Option<Job> {
        let mut inner = self.inner.lock().expect("job store lock poisoned");
        let job_id = *inner.scope_index.get(scope_key)?;
        match inner.jobs.get(&job_id) {
            Some(job) if job.status.is_active() => {
                let mut job = job.clone();
                job.recompute_progress();
                Some(job)
            }
            _ => {
                inner.scope_index.remove(scope_key);
                None
            }
        }
    }

    /// Atomically returns the scope's existing active job if one exists, or
    /// creates a fresh `Pending` job and indexes it as the scope's active
    /// job otherwise. The active-check and the insert happen under a single
    /// lock acquisition so two concurrent callers (an HTTP trigger racing
    /// the warmup loop, say) can never both observe "no active job" and
    /// both insert one — the second caller always gets back the job the
    /// first one created.
    pub fn create_job(&self, scope_key: ScopeKey) -> Job {
        let mut inner = self.inner.lock().expect("job store lock poisoned");
        Self::prune_locked(&mut inner);

        if let Some(&job_id) = inner.scope_index.get(&scope_key) {
            match inner.jobs.get(&job_id) {
                Some(existing) if existing.status.is_active() => {
                    let mut job = existing.clone();
                    job.recompute_progress();
                    return job;
                }
                _ => {
                    inner.scope_index.remove(&scope_key);
                }
            }
        }

        let job = Job::new(scope_key.clone(), Utc::now());
        inner.jobs.insert(job.job_id, job.clone());
        inner.scope_index.insert(scope_key, job.job_id);
        job
    }

    /// Applies `mutator` to the stored job in place and returns the updated
    /// copy, recomputing progress afterward. Returns `None` if the job is
    /// unknown (e.g. already evicted).
    pub fn update_job(&self, job_id: JobId, mutator: impl FnOnce(&mut Job)) -> Option<Job> {
        let mut inner = self.inner.lock().expect("job store lock poisoned");
        let job = inner.jobs.get_mut(&job_id)?;
        mutator(job);
        job.recompute_progress();
        Some(job.clone())
    }

    pub fn list_jobs_by_status(&self, statuses: &[JobState]) -> Vec<Job> {
        let mut inner = self.inner.lock().expect("job store lock poisoned");
        let mut results: Vec<Job> = inner
            .jobs
            .values()
            .filter(|job| statuses.contains(&job.status))
            .cloned()
            .collect();
        for job in &mut results {
            job.recompute_progress();
        }
        results
    }

    /// Records the finished `job` and releases the scope index entry if it
    /// still points at this job (a newer job may have already claimed the
    /// scope).
    pub fn mark_scope_finished(&self, scope_key: &ScopeKey, job: Job) {
        let mut inner = self.inner.lock().expect("job store lock poisoned");
        if let Some(stored) = inner.jobs.get(&job.job_id) {
            if stored.status.is_active() {
                inner.jobs.insert(job.job_id, job.clone());
            }
        }
        if inner.scope_index.get(scope_key) == Some(&job.job_id) {
            inner.scope_index.remove(scope_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{Level, Scope};

    fn key() -> ScopeKey {
        ScopeKey::new(Scope::Vms, ["vc1"], Level::Summary)
    }

    #[test]
    fn single_active_job_per_scope() {
        let store = JobStore::new();
        let job1 = store.create_job(key());
        assert!(store.get_active_for_scope(&key()).is_some());

        // Racing a second create_job against a still-active job must return
        // the same job, never orphan job1 with a second pending job.
        let job2 = store.create_job(key());
        assert_eq!(job1.job_id, job2.job_id);
        let active = store.get_active_for_scope(&key()).unwrap();
        assert_eq!(active.job_id, job1.job_id);

        // Once job1 finishes, a fresh create_job is free to start a new one.
        let mut finished = job1.clone();
        finished.status = JobState::Succeeded;
        store.mark_scope_finished(&key(), finished);
        let job3 = store.create_job(key());
        assert_ne!(job1.job_id, job3.job_id);
    }

    #[test]
    fn finishing_a_job_clears_the_scope_index() {
        let store = JobStore::new();
        let mut job = store.create_job(key());
        job.status = JobState::Succeeded;
        store.mark_scope_finished(&key(), job);
        assert!(store.get_active_for_scope(&key()).is_none());
    }

    #[test]
    fn update_job_recomputes_progress() {
        let store = JobStore::new();
        let job = store.create_job(key());
        let updated = store
            .update_job(job.job_id, |j| {
                j.hosts_status.get_mut("vc1").unwrap().state = Some(fleet_core::HostJobState::Ok);
            })
            .unwrap();
        assert_eq!(updated.progress.done, 1);
        assert_eq!(updated.progress.pending, 0);
    }
}
