use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::JobId;
use crate::scope::{Level, Scope};

/// Per-host status as surfaced on a [`SnapshotPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotHostState {
    Pending,
    Ok,
    Error,
    Timeout,
    SkippedCooldown,
    Stale,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotHostStatus {
    pub state: Option<SnapshotHostState>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_job_id: Option<JobId>,
    pub last_error_type: Option<String>,
    pub last_error_message: Option<String>,
}

impl SnapshotHostStatus {
    pub fn pending() -> Self {
        Self { state: Some(SnapshotHostState::Pending), ..Default::default() }
    }
}

/// Where a returned [`SnapshotPayload`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    Memory,
    Db,
}

/// The scope/provider-dependent payload container.
///
/// `Vms` is addressable by host for per-host upsert; `Hosts` is a flat list
/// whose entries are matched by a `"host"` or `"name"` key on replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotData {
    Vms(BTreeMap<String, Value>),
    Hosts(Vec<Value>),
}

impl SnapshotData {
    pub fn empty_for(scope: Scope) -> Self {
        match scope {
            Scope::Vms => SnapshotData::Vms(BTreeMap::new()),
            Scope::Hosts => SnapshotData::Hosts(Vec::new()),
        }
    }

    /// Locates the current value stored for `host`, regardless of shape.
    pub fn get(&self, host: &str) -> Option<&Value> {
        match self {
            SnapshotData::Vms(map) => map.get(host),
            SnapshotData::Hosts(list) => list.iter().find(|item| record_host_name(item).as_deref() == Some(host)),
        }
    }

    /// Replaces (or appends, for the list shape) the entry for `host`.
    pub fn upsert(&mut self, host: &str, value: Value) {
        match self {
            SnapshotData::Vms(map) => {
                map.insert(host.to_string(), value);
            }
            SnapshotData::Hosts(list) => {
                if let Some(existing) = list
                    .iter_mut()
                    .find(|item| record_host_name(item).as_deref() == Some(host))
                {
                    *existing = value;
                } else {
                    list.push(value);
                }
            }
        }
    }

    /// True if any entry has ever been populated (used by the
    /// all-hosts-failed finalization check).
    pub fn has_any_data(&self) -> bool {
        match self {
            SnapshotData::Vms(map) => !map.is_empty(),
            SnapshotData::Hosts(list) => !list.is_empty(),
        }
    }
}

fn record_host_name(value: &Value) -> Option<String> {
    value
        .get("host")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .map(|s| s.to_lowercase())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub scope: Scope,
    pub hosts: Vec<String>,
    pub level: Level,
    pub generated_at: DateTime<Utc>,
    pub total_hosts: usize,
    pub hosts_status: BTreeMap<String, SnapshotHostStatus>,
    pub data: SnapshotData,
    pub summary: BTreeMap<String, i64>,
    pub stale: Option<bool>,
    pub stale_reason: Option<String>,
    pub source: SnapshotSource,
}

impl SnapshotPayload {
    pub fn empty(scope: Scope, hosts: Vec<String>, level: Level, now: DateTime<Utc>) -> Self {
        let hosts_status = hosts.iter().map(|h| (h.clone(), SnapshotHostStatus::pending())).collect();
        Self {
            total_hosts: hosts.len(),
            data: SnapshotData::empty_for(scope),
            scope,
            level,
            generated_at: now,
            hosts_status,
            hosts,
            summary: BTreeMap::new(),
            stale: None,
            stale_reason: None,
            source: SnapshotSource::Memory,
        }
    }
}
