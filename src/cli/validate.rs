use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs;

use formpilot_playbooks::{IssueSeverity, Playbook, Step, ValidationIssue};

use super::output::OutputFormat;
use crate::config::Config;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Playbook directory override
    #[arg(long, value_name = "DIR")]
    pub playbooks: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FileFindings {
    file: String,
    steps: usize,
    issues: Vec<ValidationIssue>,
}

pub async fn cmd_validate(args: ValidateArgs, config: &Config, output: OutputFormat) -> Result<()> {
    let dir = args
        .playbooks
        .unwrap_or_else(|| config.playbook_dir.clone());

    let mut entries = fs::read_dir(&dir)
        .await
        .with_context(|| format!("Failed to read playbook directory: {}", dir.display()))?;

    let mut findings: Vec<FileFindings> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(file) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };

        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_str::<Vec<Step>>(&raw) {
            Ok(steps) => {
                let playbook = Playbook::new(file.clone(), steps);
                findings.push(FileFindings {
                    file,
                    steps: playbook.len(),
                    issues: playbook.validate(),
                });
            }
            Err(e) => findings.push(FileFindings {
                file,
                steps: 0,
                issues: vec![ValidationIssue {
                    step: None,
                    severity: IssueSeverity::Error,
                    message: format!("unparsable playbook: {e}"),
                }],
            }),
        }
    }
    findings.sort_by(|a, b| a.file.cmp(&b.file));

    let errors: usize = count_severity(&findings, IssueSeverity::Error);
    let warnings: usize = count_severity(&findings, IssueSeverity::Warning);

    if output.is_human() {
        for finding in &findings {
            println!("{} ({} steps)", finding.file, finding.steps);
            for issue in &finding.issues {
                let severity = match issue.severity {
                    IssueSeverity::Error => "error",
                    IssueSeverity::Warning => "warning",
                };
                match issue.step {
                    Some(step) => println!("  [{severity}] step {step}: {}", issue.message),
                    None => println!("  [{severity}] {}", issue.message),
                }
            }
        }
        println!();
        println!(
            "{} playbooks, {} errors, {} warnings",
            findings.len(),
            errors,
            warnings
        );
    } else {
        output.emit(&findings)?;
    }

    if errors > 0 {
        bail!("{errors} validation errors");
    }
    Ok(())
}

fn count_severity(findings: &[FileFindings], severity: IssueSeverity) -> usize {
    findings
        .iter()
        .flat_map(|f| f.issues.iter())
        .filter(|issue| issue.severity == severity)
        .count()
}
