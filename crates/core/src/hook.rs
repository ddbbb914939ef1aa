//! Hook descriptors
//!
//! A hook is a lifecycle-triggered unit of work. The agent only needs to
//! know which hook to run; what the hook does is up to the workload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Lifecycle hooks the agent knows how to queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookKind {
    Install,
    Start,
    ConfigChanged,
    UpgradeCharm,
    UpdateStatus,
    LeaderElected,
    Stop,
    Remove,
}

impl HookKind {
    /// Get the canonical hook name, which is also the executable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::ConfigChanged => "config-changed",
            Self::UpgradeCharm => "upgrade-charm",
            Self::UpdateStatus => "update-status",
            Self::LeaderElected => "leader-elected",
            Self::Stop => "stop",
            Self::Remove => "remove",
        }
    }
}

impl FromStr for HookKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "start" => Ok(Self::Start),
            "config-changed" => Ok(Self::ConfigChanged),
            "upgrade-charm" => Ok(Self::UpgradeCharm),
            "update-status" => Ok(Self::UpdateStatus),
            "leader-elected" => Ok(Self::LeaderElected),
            "stop" => Ok(Self::Stop),
            "remove" => Ok(Self::Remove),
            _ => Err(Error::UnknownHook(s.to_string())),
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    pub kind: HookKind,
}

impl HookInfo {
    pub fn new(kind: HookKind) -> Self {
        Self { kind }
    }
}

impl From<HookKind> for HookInfo {
    fn from(kind: HookKind) -> Self {
        Self::new(kind)
    }
}
