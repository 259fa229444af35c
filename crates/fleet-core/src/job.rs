use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::ScopeKey;

/// Opaque unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id derived from `seed`: the same seed always produces
    /// the same id. Used for synthesized informational jobs (e.g. the
    /// cooldown-active placeholder) that must compare equal across repeated
    /// calls instead of randomizing a fresh id every time.
    pub fn from_seed(seed: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal/non-terminal status of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Expired,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Expired)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Running)
    }
}

/// Per-host state within a single job run. Terminal within that job; a host
/// can re-enter `Pending` only in a subsequent job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostJobState {
    Pending,
    Running,
    Ok,
    Error,
    Timeout,
    SkippedCooldown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostJobStatus {
    pub state: Option<HostJobState>,
    pub attempt: u32,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl HostJobStatus {
    pub fn pending() -> Self {
        Self { state: Some(HostJobState::Pending), ..Default::default() }
    }
}

/// Counters derivable from `hosts_status`; the store recomputes this on
/// every read rather than trusting incremental updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub total_hosts: usize,
    pub pending: usize,
    pub done: usize,
    pub error: usize,
    pub skipped: usize,
}

impl JobProgress {
    pub fn recompute(hosts_status: &BTreeMap<String, HostJobStatus>) -> Self {
        let mut progress = JobProgress { total_hosts: hosts_status.len(), ..Default::default() };
        for status in hosts_status.values() {
            match status.state {
                Some(HostJobState::Ok) => progress.done += 1,
                Some(HostJobState::Error) | Some(HostJobState::Timeout) => progress.error += 1,
                Some(HostJobState::SkippedCooldown) => progress.skipped += 1,
                Some(HostJobState::Pending) | Some(HostJobState::Running) | None => {
                    progress.pending += 1
                }
            }
        }
        progress
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub scope_key: ScopeKey,
    pub status: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub message: Option<String>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub hosts_status: BTreeMap<String, HostJobStatus>,
    pub progress: JobProgress,
}

impl Job {
    /// Constructs a fresh `Pending` job with every host in `scope_key`
    /// initialized to `Pending`.
    pub fn new(scope_key: ScopeKey, now: DateTime<Utc>) -> Self {
        let hosts_status: BTreeMap<String, HostJobStatus> = scope_key
            .hosts
            .iter()
            .map(|h| (h.clone(), HostJobStatus::pending()))
            .collect();
        let progress = JobProgress::recompute(&hosts_status);
        Self {
            job_id: JobId::new(),
            scope_key,
            status: JobState::Pending,
            created_at: now,
            started_at: None,
            finished_at: None,
            last_heartbeat_at: now,
            message: None,
            cooldown_until: None,
            hosts_status,
            progress,
        }
    }

    pub fn recompute_progress(&mut self) {
        self.progress = JobProgress::recompute(&self.hosts_status);
    }
}
