use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-host health: consecutive failures, last success/error timestamps,
/// active cooldown.
///
/// Invariant: `consecutive_failures == 0` implies `cooldown_until` is
/// `None`. A recorded success clears failures, error type/message and
/// cooldown but preserves `last_error_at` (it's a historical fact, not a
/// live condition).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostHealthRecord {
    pub consecutive_failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error_type: Option<String>,
    pub last_error_message: Option<String>,
}

/// `min(10 * 2^(n-1), 120)` minutes, for failure count `n >= 1`.
pub fn cooldown_duration(consecutive_failures: u32) -> Duration {
    debug_assert!(consecutive_failures >= 1);
    let shift = consecutive_failures.saturating_sub(1).min(63);
    let minutes = 10u64.saturating_mul(1u64 << shift).min(120);
    Duration::minutes(minutes as i64)
}

impl HostHealthRecord {
    pub fn record_success(&mut self, when: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.cooldown_until = None;
        self.last_success_at = Some(when);
        self.last_error_type = None;
        self.last_error_message = None;
    }

    pub fn record_failure(&mut self, when: DateTime<Utc>, error_type: &str, error_message: &str) {
        self.consecutive_failures += 1;
        self.last_error_at = Some(when);
        self.last_error_type = Some(error_type.to_string());
        self.last_error_message = Some(truncate_for_audit(error_message));
        self.cooldown_until = Some(when + cooldown_duration(self.consecutive_failures));
    }

    pub fn set_cooldown(&mut self, until: Option<DateTime<Utc>>) {
        self.cooldown_until = until;
    }

    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

/// Caps unclassified adapter error messages at 200 chars before they reach
/// audit surfaces (job/host status, health records).
pub fn truncate_for_audit(message: &str) -> String {
    const MAX: usize = 200;
    if message.chars().count() <= MAX {
        message.to_string()
    } else {
        message.chars().take(MAX).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_doubles_and_caps() {
        assert_eq!(cooldown_duration(1), Duration::minutes(10));
        assert_eq!(cooldown_duration(2), Duration::minutes(20));
        assert_eq!(cooldown_duration(3), Duration::minutes(40));
        assert_eq!(cooldown_duration(4), Duration::minutes(80));
        assert_eq!(cooldown_duration(5), Duration::minutes(120));
        assert_eq!(cooldown_duration(10), Duration::minutes(120));
    }

    #[test]
    fn success_clears_failure_state_but_keeps_last_error_at() {
        let now = Utc::now();
        let mut rec = HostHealthRecord::default();
        rec.record_failure(now, "timeout", "host_timeout_exceeded");
        assert_eq!(rec.consecutive_failures, 1);
        assert!(rec.cooldown_until.is_some());

        let later = now + Duration::minutes(1);
        rec.record_success(later);
        assert_eq!(rec.consecutive_failures, 0);
        assert!(rec.cooldown_until.is_none());
        assert!(rec.last_error_type.is_none());
        assert_eq!(rec.last_error_at, Some(now));
    }

    #[test]
    fn truncates_long_messages() {
        let long = "x".repeat(500);
        assert_eq!(truncate_for_audit(&long).chars().count(), 200);
    }
}
