use serde::{Deserialize, Serialize};
use std::fmt;

/// A hypervisor/cloud platform family harvested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Vmware,
    Ovirt,
    Hyperv,
    Azure,
    Cedia,
}

impl Provider {
    /// All providers, in a stable order — used by wiring code that needs to
    /// construct one `Core` per (provider, scope).
    pub const ALL: [Provider; 5] = [
        Provider::Vmware,
        Provider::Ovirt,
        Provider::Hyperv,
        Provider::Azure,
        Provider::Cedia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Vmware => "vmware",
            Provider::Ovirt => "ovirt",
            Provider::Hyperv => "hyperv",
            Provider::Azure => "azure",
            Provider::Cedia => "cedia",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
