use std::time::Duration;

use crate::provider::Provider;

/// Per-(provider) knobs consumed by the engine. Carries already-resolved
/// environment values into typed fields — it is not a config file loader
/// or a CLI; full configuration discovery remains an external concern.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub configured: bool,
    pub refresh_interval_minutes: u32,
    pub job_max_global: usize,
    pub job_max_per_scope: usize,
    pub job_host_timeout: Duration,
    pub job_max_duration: Duration,
}

impl ProviderSettings {
    pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u32 = 60;
    pub const MIN_REFRESH_INTERVAL_MINUTES: u32 = 10;
    pub const DEFAULT_JOB_MAX_GLOBAL: usize = 4;
    pub const DEFAULT_JOB_MAX_PER_SCOPE: usize = 2;
    pub const DEFAULT_JOB_HOST_TIMEOUT_SECS: u64 = 150;
    pub const DEFAULT_JOB_MAX_DURATION_SECS: u64 = 15 * 60;

    /// Reads `<PROVIDER>_*` environment variables (falling back to
    /// documented defaults), matching the naming convention used by the
    /// upstream settings module (`VMWARE_JOB_MAX_GLOBAL`,
    /// `VMWARE_REFRESH_INTERVAL_MINUTES`, ...).
    pub fn from_env(provider: Provider) -> Self {
        let prefix = provider.as_str().to_uppercase();
        let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();
        let as_u32 = |suffix: &str, default: u32| {
            var(suffix).and_then(|v| v.parse().ok()).unwrap_or(default)
        };
        let as_usize = |suffix: &str, default: usize| {
            var(suffix).and_then(|v| v.parse().ok()).unwrap_or(default)
        };
        let as_secs = |suffix: &str, default: u64| {
            Duration::from_secs(var(suffix).and_then(|v| v.parse().ok()).unwrap_or(default))
        };

        let refresh_interval_minutes = as_u32(
            "REFRESH_INTERVAL_MINUTES",
            Self::DEFAULT_REFRESH_INTERVAL_MINUTES,
        )
        .max(Self::MIN_REFRESH_INTERVAL_MINUTES);

        Self {
            enabled: var("ENABLED").map(|v| v != "false" && v != "0").unwrap_or(true),
            configured: var("CONFIGURED").map(|v| v == "true" || v == "1").unwrap_or(false),
            refresh_interval_minutes,
            job_max_global: as_usize("JOB_MAX_GLOBAL", Self::DEFAULT_JOB_MAX_GLOBAL),
            job_max_per_scope: as_usize("JOB_MAX_PER_SCOPE", Self::DEFAULT_JOB_MAX_PER_SCOPE),
            job_host_timeout: as_secs("JOB_HOST_TIMEOUT", Self::DEFAULT_JOB_HOST_TIMEOUT_SECS),
            job_max_duration: as_secs("JOB_MAX_DURATION", Self::DEFAULT_JOB_MAX_DURATION_SECS),
        }
    }

    /// Defaults with `configured = true`, for tests and for providers wired
    /// up programmatically rather than from the environment.
    pub fn defaults_configured() -> Self {
        Self {
            enabled: true,
            configured: true,
            refresh_interval_minutes: Self::DEFAULT_REFRESH_INTERVAL_MINUTES,
            job_max_global: Self::DEFAULT_JOB_MAX_GLOBAL,
            job_max_per_scope: Self::DEFAULT_JOB_MAX_PER_SCOPE,
            job_host_timeout: Duration::from_secs(Self::DEFAULT_JOB_HOST_TIMEOUT_SECS),
            job_max_duration: Duration::from_secs(Self::DEFAULT_JOB_MAX_DURATION_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_interval_floor_is_enforced() {
        // SAFETY: test-only env mutation, single-threaded test binary default.
        unsafe { std::env::set_var("VMWARE_REFRESH_INTERVAL_MINUTES", "1") };
        let settings = ProviderSettings::from_env(Provider::Vmware);
        assert_eq!(settings.refresh_interval_minutes, ProviderSettings::MIN_REFRESH_INTERVAL_MINUTES);
        unsafe { std::env::remove_var("VMWARE_REFRESH_INTERVAL_MINUTES") };
    }
}
