//! Per-host health tracking: consecutive failures, cooldown, last
//! success/error. Shared across jobs for a given (provider, host).

use dashmap::DashMap;
use chrono::{DateTime, Utc};
use fleet_core::HostHealthRecord;

/// Keyed by lowercased host string. One instance per provider — health for
/// "vc1" under `vmware` is independent of "vc1" under `ovirt`.
#[derive(Debug, Default)]
pub struct HostHealthStore {
    records: DashMap<String, HostHealthRecord>,
}

impl HostHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, host: &str) -> HostHealthRecord {
        self.records.entry(host.to_lowercase()).or_default().clone()
    }

    pub fn record_success(&self, host: &str, when: DateTime<Utc>) -> HostHealthRecord {
        let mut entry = self.records.entry(host.to_lowercase()).or_default();
        entry.record_success(when);
        entry.clone()
    }

    pub fn record_failure(
        &self,
        host: &str,
        when: DateTime<Utc>,
        error_type: &str,
        error_message: &str,
    ) -> HostHealthRecord {
        let mut entry = self.records.entry(host.to_lowercase()).or_default();
        entry.record_failure(when, error_type, error_message);
        entry.clone()
    }

    pub fn set_cooldown(&self, host: &str, until: Option<DateTime<Utc>>) -> HostHealthRecord {
        let mut entry = self.records.entry(host.to_lowercase()).or_default();
        entry.set_cooldown(until);
        entry.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_host_returns_default_record() {
        let store = HostHealthStore::new();
        let rec = store.get("vc1");
        assert_eq!(rec.consecutive_failures, 0);
        assert!(rec.cooldown_until.is_none());
    }

    #[test]
    fn repeated_failures_extend_cooldown() {
        let store = HostHealthStore::new();
        let now = Utc::now();
        let first = store.record_failure("vc1", now, "timeout", "t1");
        let second = store.record_failure("vc1", now, "timeout", "t2");
        assert_eq!(first.consecutive_failures, 1);
        assert_eq!(second.consecutive_failures, 2);
        assert!(second.cooldown_until.unwrap() > first.cooldown_until.unwrap());
    }

    #[test]
    fn host_keys_are_case_insensitive() {
        let store = HostHealthStore::new();
        store.record_failure("VC1", Utc::now(), "timeout", "t");
        assert_eq!(store.get("vc1").consecutive_failures, 1);
    }
}
