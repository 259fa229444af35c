use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimension of inventory collected for a given provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Vms,
    Hosts,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Vms => "vms",
            Scope::Hosts => "hosts",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cheap (`Summary`) vs heavier (`Detail`) per-host adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Summary,
    Detail,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Summary => "summary",
            Level::Detail => "detail",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an inventory slice: scope + canonical host list + level.
///
/// Two `ScopeKey`s are equal iff all three components match element-wise.
/// Construction canonicalizes the host list (dedup + lowercase); whether the
/// remaining order is sorted or insertion-preserved is a per-provider
/// decision left to the caller of [`ScopeKey::new`] — the key itself does
/// not re-sort what it's given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub scope: Scope,
    pub hosts: Vec<String>,
    pub level: Level,
}

impl ScopeKey {
    /// Builds a `ScopeKey`, canonicalizing `hosts` to lowercase with
    /// duplicates removed (first occurrence wins, preserving caller order).
    pub fn new(scope: Scope, hosts: impl IntoIterator<Item = impl Into<String>>, level: Level) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut canonical = Vec::new();
        for host in hosts {
            let lower = host.into().to_lowercase();
            if seen.insert(lower.clone()) {
                canonical.push(lower);
            }
        }
        Self { scope, hosts: canonical, level }
    }

    /// Canonical string key used to address the persistence table, e.g.
    /// `"vc1,vc2"`.
    pub fn hosts_key(&self) -> String {
        self.hosts.join(",")
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scope, self.hosts_key(), self.level)
    }
}
