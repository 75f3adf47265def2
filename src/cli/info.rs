use std::path::Path;

use anyhow::Result;
use serde_json::json;

use super::output::OutputFormat;
use crate::config::Config;

pub fn cmd_info(config: &Config, config_path: &Path, output: OutputFormat) -> Result<()> {
    if !output.is_human() {
        return output.emit(&json!({
            "version": env!("CARGO_PKG_VERSION"),
            "buildDate": env!("BUILD_DATE"),
            "gitCommit": env!("GIT_HASH"),
            "configPath": config_path.display().to_string(),
            "playbookDir": config.playbook_dir.display().to_string(),
            "stateFile": config.state_file.display().to_string(),
            "stepGapMs": config.step_gap_ms,
            "waitTimeoutMs": config.wait_timeout_ms,
            "pollIntervalMs": config.poll_interval_ms,
        }));
    }

    println!("formpilot");
    println!("=========");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("BUILD_DATE"));
    println!("Git Commit: {}", env!("GIT_HASH"));
    println!();
    println!("Configuration ({}):", config_path.display());
    println!("- Playbook Directory: {}", config.playbook_dir.display());
    println!("- State File: {}", config.state_file.display());
    println!("- Step Gap: {} ms", config.step_gap_ms);
    println!("- Wait Timeout: {} ms", config.wait_timeout_ms);
    println!("- Poll Interval: {} ms", config.poll_interval_ms);
    Ok(())
}
