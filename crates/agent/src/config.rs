//! Agent configuration read from the environment

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Holds the state record and the action queue
    pub data_dir: PathBuf,
    /// Workload directory with `actions/` and `hooks/` executables
    pub charm_dir: PathBuf,
    /// How often the action queue is checked for changes
    pub poll_interval: Duration,
    /// Answer unit start/stop/status requests with "not supported"
    pub units_manager: bool,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("UNITER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".uniter-data"));
        let charm_dir = std::env::var("UNITER_CHARM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("charm"));
        let poll_interval = std::env::var("UNITER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        Self {
            data_dir,
            charm_dir,
            poll_interval: Duration::from_millis(poll_interval),
            units_manager: env_flag("UNITER_UNITS_MANAGER", true),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn actions_path(&self) -> PathBuf {
        self.data_dir.join("actions.json")
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => parse_flag(&raw).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
