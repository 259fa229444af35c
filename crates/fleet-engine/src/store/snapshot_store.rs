//! In-memory snapshot store with upsert-by-host and a persistence bridge
//! for durability/rehydration across restarts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use fleet_core::{Provider, Scope, ScopeKey, SnapshotHostStatus, SnapshotPayload, SnapshotSource};

use crate::persistence::SnapshotPersistence;

const MAX_ITEMS: usize = 128;
const MAX_AGE_MINUTES: i64 = 24 * 60;

/// Fields an `upsert_host` call may update on top of the per-host data/
/// status. All optional: `None` leaves the existing value untouched.
#[derive(Debug, Default)]
pub struct UpsertHostFields {
    pub generated_at: Option<DateTime<Utc>>,
    pub summary: Option<std::collections::BTreeMap<String, i64>>,
    pub stale: Option<bool>,
    pub stale_reason: Option<String>,
}

/// Holds the latest snapshot per [`ScopeKey`] in memory, persisting through
/// an injected [`SnapshotPersistence`] bridge. Persistence failures are
/// logged and never surface to callers.
pub struct SnapshotStore {
    provider: Provider,
    snapshots: Mutex<HashMap<ScopeKey, SnapshotPayload>>,
    persistence: Arc<dyn SnapshotPersistence>,
}

impl SnapshotStore {
    pub fn new(provider: Provider, persistence: Arc<dyn SnapshotPersistence>) -> Self {
        Self { provider, snapshots: Mutex::new(HashMap::new()), persistence }
    }

    fn prune_locked(snapshots: &mut HashMap<ScopeKey, SnapshotPayload>) {
        if snapshots.len() <= MAX_ITEMS {
            return;
        }
        let cutoff = Utc::now() - Duration::minutes(MAX_AGE_MINUTES);
        snapshots.retain(|_, snap| snap.generated_at >= cutoff);
    }

    pub async fn init_snapshot(&self, scope_key: &ScopeKey) -> SnapshotPayload {
        let snap = SnapshotPayload::empty(scope_key.scope, scope_key.hosts.clone(), scope_key.level, Utc::now());
        {
            let mut snapshots = self.snapshots.lock().expect("snapshot store lock poisoned");
            Self::prune_locked(&mut snapshots);
            snapshots.insert(scope_key.clone(), snap.clone());
        }
        self.persist(scope_key, &snap).await;
        snap
    }

    async fn persist(&self, scope_key: &ScopeKey, payload: &SnapshotPayload) {
        let result = self
            .persistence
            .upsert_snapshot(self.provider, scope_key.scope, &scope_key.hosts_key(), scope_key.level, payload)
            .await;
        if let Err(err) = result {
            tracing::error!(
                provider = %self.provider,
                scope = %scope_key.scope,
                hosts_key = %scope_key.hosts_key(),
                level = %scope_key.level,
                error = %err,
                "failed to persist snapshot"
            );
        }
    }

    /// Folds one host's result into the scope's snapshot: replaces the
    /// host's data entry (map insert for `Vms`, list replace-or-append for
    /// `Hosts`) and status, never touching other hosts' last-known-good
    /// data.
    pub async fn upsert_host(
        &self,
        scope_key: &ScopeKey,
        host: &str,
        data: Option<serde_json::Value>,
        status: SnapshotHostStatus,
        fields: UpsertHostFields,
    ) -> SnapshotPayload {
        let result = {
            let mut snapshots = self.snapshots.lock().expect("snapshot store lock poisoned");
            Self::prune_locked(&mut snapshots);
            let snap = snapshots
                .entry(scope_key.clone())
                .or_insert_with(|| SnapshotPayload::empty(scope_key.scope, scope_key.hosts.clone(), scope_key.level, Utc::now()));

            snap.generated_at = fields.generated_at.unwrap_or_else(Utc::now);
            if let Some(data) = data {
                snap.data.upsert(host, data);
            }
            snap.hosts_status.insert(host.to_string(), status);
            snap.total_hosts = scope_key.hosts.len();
            if let Some(summary) = fields.summary {
                snap.summary = summary;
            }
            if let Some(stale) = fields.stale {
                snap.stale = Some(stale);
            }
            if let Some(reason) = fields.stale_reason {
                snap.stale_reason = Some(reason);
            }
            snap.clone()
        };
        self.persist(scope_key, &result).await;
        result
    }

    /// Returns the in-memory snapshot if present; otherwise rehydrates from
    /// the persistence bridge and caches the result. Returns `None` if
    /// neither has it.
    pub async fn get_snapshot(&self, scope_key: &ScopeKey) -> Option<SnapshotPayload> {
        {
            let snapshots = self.snapshots.lock().expect("snapshot store lock poisoned");
            if let Some(snap) = snapshots.get(scope_key) {
                let mut result = snap.clone();
                result.source = SnapshotSource::Memory;
                return Some(result);
            }
        }

        let loaded = self
            .persistence
            .get_snapshot(self.provider, scope_key.scope, &scope_key.hosts_key(), scope_key.level)
            .await;
        let payload = match loaded {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(
                    provider = %self.provider,
                    scope = %scope_key.scope,
                    hosts_key = %scope_key.hosts_key(),
                    level = %scope_key.level,
                    error = %err,
                    "failed to load snapshot from persistence"
                );
                return None;
            }
        };

        let mut snapshots = self.snapshots.lock().expect("snapshot store lock poisoned");
        Self::prune_locked(&mut snapshots);
        snapshots.insert(scope_key.clone(), payload.clone());
        let mut result = payload;
        result.source = SnapshotSource::Db;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::NullPersistence;
    use fleet_core::{Level, SnapshotHostState};
    use serde_json::json;

    fn key() -> ScopeKey {
        ScopeKey::new(Scope::Vms, ["vc1", "vc2"], Level::Summary)
    }

    fn store() -> SnapshotStore {
        SnapshotStore::new(Provider::Vmware, Arc::new(NullPersistence))
    }

    #[tokio::test]
    async fn generated_at_is_monotonic_across_upserts() {
        let store = store();
        let key = key();
        store.init_snapshot(&key).await;
        let first = store
            .upsert_host(&key, "vc1", Some(json!({"host": "vc1"})), SnapshotHostStatus { state: Some(SnapshotHostState::Ok), ..Default::default() }, UpsertHostFields::default())
            .await;
        let second = store
            .upsert_host(&key, "vc2", Some(json!({"host": "vc2"})), SnapshotHostStatus { state: Some(SnapshotHostState::Ok), ..Default::default() }, UpsertHostFields::default())
            .await;
        assert!(second.generated_at >= first.generated_at);
    }

    #[tokio::test]
    async fn failure_preserves_previous_host_data() {
        let store = store();
        let key = key();
        store.init_snapshot(&key).await;
        store
            .upsert_host(&key, "vc1", Some(json!({"host": "vc1", "vms": 10})), SnapshotHostStatus { state: Some(SnapshotHostState::Ok), ..Default::default() }, UpsertHostFields::default())
            .await;

        // A subsequent failed attempt passes data = None; prior data for
        // vc1 must survive untouched.
        let after_failure = store
            .upsert_host(&key, "vc1", None, SnapshotHostStatus { state: Some(SnapshotHostState::Error), ..Default::default() }, UpsertHostFields::default())
            .await;
        assert_eq!(after_failure.data.get("vc1"), Some(&json!({"host": "vc1", "vms": 10})));
        assert_eq!(after_failure.hosts_status.get("vc1").unwrap().state, Some(SnapshotHostState::Error));
    }

    #[tokio::test]
    async fn get_snapshot_returns_memory_source() {
        let store = store();
        let key = key();
        store.init_snapshot(&key).await;
        let snap = store.get_snapshot(&key).await.unwrap();
        assert_eq!(snap.source, SnapshotSource::Memory);
    }

    #[tokio::test]
    async fn unknown_scope_returns_none() {
        let store = store();
        assert!(store.get_snapshot(&key()).await.is_none());
    }
}
