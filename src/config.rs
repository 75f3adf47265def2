//! Configuration: a YAML file folded with `FORMPILOT_*` environment
//! overrides. Missing files fall back to defaults; a present but
//! unparsable file is an error.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `{host}.json` step files.
    pub playbook_dir: PathBuf,

    /// JSON document runs persist their state into.
    pub state_file: PathBuf,

    /// Gap between steps, in milliseconds.
    pub step_gap_ms: u64,

    /// How long a step waits for its element, in milliseconds.
    pub wait_timeout_ms: u64,

    /// Poll interval inside element waits, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playbook_dir: PathBuf::from("playbooks"),
            state_file: default_state_file(),
            step_gap_ms: 300,
            wait_timeout_ms: 5_000,
            poll_interval_ms: 100,
        }
    }
}

fn default_state_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("formpilot")
        .join("state.json")
}

impl Config {
    /// Fold `FORMPILOT_*` variables over the file-loaded values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_path("FORMPILOT_PLAYBOOK_DIR") {
            self.playbook_dir = dir;
        }
        if let Some(file) = env_path("FORMPILOT_STATE_FILE") {
            self.state_file = file;
        }
        if let Some(ms) = env_u64("FORMPILOT_STEP_GAP_MS") {
            self.step_gap_ms = ms;
        }
        if let Some(ms) = env_u64("FORMPILOT_WAIT_TIMEOUT_MS") {
            self.wait_timeout_ms = ms;
        }
        if let Some(ms) = env_u64("FORMPILOT_POLL_INTERVAL_MS") {
            self.poll_interval_ms = ms;
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_parse_from_empty_yaml() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.step_gap_ms, 300);
        assert_eq!(config.wait_timeout_ms, 5_000);
        assert_eq!(config.playbook_dir, PathBuf::from("playbooks"));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config: Config =
            serde_yaml::from_str("playbook_dir: steps\nstep_gap_ms: 50\n").unwrap();
        assert_eq!(config.playbook_dir, PathBuf::from("steps"));
        assert_eq!(config.step_gap_ms, 50);
        assert_eq!(config.wait_timeout_ms, 5_000);
    }

    #[test]
    #[serial]
    fn env_overrides_win_over_file_values() {
        env::set_var("FORMPILOT_PLAYBOOK_DIR", "/tmp/steps");
        env::set_var("FORMPILOT_STEP_GAP_MS", "25");
        let mut config = Config::default();
        config.apply_env_overrides();
        env::remove_var("FORMPILOT_PLAYBOOK_DIR");
        env::remove_var("FORMPILOT_STEP_GAP_MS");

        assert_eq!(config.playbook_dir, PathBuf::from("/tmp/steps"));
        assert_eq!(config.step_gap_ms, 25);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    #[serial]
    fn malformed_env_numbers_are_ignored() {
        env::set_var("FORMPILOT_STEP_GAP_MS", "soon");
        let mut config = Config::default();
        config.apply_env_overrides();
        env::remove_var("FORMPILOT_STEP_GAP_MS");

        assert_eq!(config.step_gap_ms, 300);
    }
}
