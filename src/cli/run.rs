use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::fs;
use tracing::info;
use url::Url;

use formpilot_control_bus::to_mpsc;
use formpilot_core_types::DomainKey;
use formpilot_page_driver::{PageDriver, SimPage};
use formpilot_playbooks::{DirSource, PlaybookStore};
use formpilot_run_engine::{
    DomWaiter, PauseReason, RunEngine, RunEvent, RunPhase, RunReport,
};
use formpilot_state_store::{
    save_cursor, FileStateStore, MemoryStateStore, StateStore, CAMPAIGN_DATA_KEY,
};

use super::output::OutputFormat;
use crate::config::Config;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Page URL the playbook is keyed by
    #[arg(long)]
    pub url: Url,

    /// Page fixture file (JSON element list)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Campaign data file (JSON), stored before the run
    #[arg(long, value_name = "FILE")]
    pub campaign: Option<PathBuf>,

    /// Playbook directory override
    #[arg(long, value_name = "DIR")]
    pub playbooks: Option<PathBuf>,

    /// State file override
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Clear the stored cursor and start at step 0
    #[arg(long)]
    pub fresh: bool,

    /// Start from this step index, overriding the stored cursor
    #[arg(long, value_name = "N", conflicts_with = "fresh")]
    pub from: Option<usize>,

    /// Keep state in memory only; nothing is persisted
    #[arg(long, conflicts_with = "state_file")]
    pub ephemeral: bool,
}

pub async fn cmd_run(args: RunArgs, config: &Config, output: OutputFormat) -> Result<()> {
    let page = SimPage::from_fixture_file(&args.page)
        .with_context(|| format!("Failed to load page fixture: {}", args.page.display()))?;

    let store: Arc<dyn StateStore> = if args.ephemeral {
        Arc::new(MemoryStateStore::new())
    } else {
        let path = args
            .state_file
            .clone()
            .unwrap_or_else(|| config.state_file.clone());
        Arc::new(FileStateStore::open(&path)?)
    };

    if let Some(path) = &args.campaign {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read campaign file: {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse campaign file: {}", path.display()))?;
        store.put(CAMPAIGN_DATA_KEY, value).await?;
    }

    if let Some(index) = args.from {
        let host = args.url.host_str().context("run URL has no host")?;
        save_cursor(store.as_ref(), &DomainKey::from_host(host), index).await?;
        info!(index, "cursor overridden from the command line");
    }

    let playbook_dir = args
        .playbooks
        .clone()
        .unwrap_or_else(|| config.playbook_dir.clone());
    let playbooks = Arc::new(PlaybookStore::new(Arc::new(DirSource::new(&playbook_dir))));

    let driver: Arc<dyn PageDriver> = Arc::new(page);
    let waiter = DomWaiter::new()
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
        .with_default_timeout(Duration::from_millis(config.wait_timeout_ms));
    let engine = Arc::new(
        RunEngine::new(driver, store, playbooks)
            .with_waiter(waiter)
            .with_step_gap(Duration::from_millis(config.step_gap_ms)),
    );

    // A fixture page never recovers a missing element or late popup, so
    // a hold would wait forever. End the run instead; the cursor keeps
    // the spot for the next invocation.
    let supervisor = {
        let controller = engine.controller();
        let mut events = to_mpsc(engine.reporter().bus(), 64);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if matches!(
                    event,
                    RunEvent::Paused {
                        reason: PauseReason::MissingElement { .. }
                            | PauseReason::PopupTimeout { .. },
                        ..
                    }
                ) {
                    controller.abort();
                }
                if run_over(&event) {
                    break;
                }
            }
        })
    };

    let printer = if output.is_human() {
        let mut events = to_mpsc(engine.reporter().bus(), 64);
        Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                print_event(&event);
                if run_over(&event) {
                    break;
                }
            }
        }))
    } else {
        None
    };

    let result = engine.run(&args.url, args.fresh).await;
    let _ = supervisor.await;
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    let report = result?;
    match output {
        OutputFormat::Human => print_summary(&report),
        other => other.emit(&report)?,
    }

    if !matches!(report.phase, RunPhase::Completed | RunPhase::Paused) {
        bail!("run ended in the {} state", phase_label(report.phase));
    }
    Ok(())
}

/// True once no further events can follow in this invocation.
fn run_over(event: &RunEvent) -> bool {
    event.is_terminal()
        || matches!(
            event,
            RunEvent::Paused {
                reason: PauseReason::Navigation,
                ..
            }
        )
}

fn phase_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Completed => "completed",
        RunPhase::Paused => "paused",
        RunPhase::Aborted => "aborted",
        RunPhase::Failed => "failed",
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::Started {
            domain,
            total_steps,
            start_index,
            ..
        } => println!("Running {total_steps} steps for {domain} (from step {start_index})"),
        RunEvent::StepFinished { outcome, .. } => {
            let mark = if outcome.ok { " " } else { "!" };
            let selector = outcome.selector.as_deref().unwrap_or("-");
            let mut line = format!(
                "{mark} step {:>3}  {:<20} {:<28} {} ({} ms)",
                outcome.index, outcome.action, selector, outcome.status, outcome.latency_ms
            );
            if let Some(error) = &outcome.error {
                line.push_str(&format!("  {error}"));
            }
            println!("{line}");
        }
        RunEvent::Paused { index, reason, .. } => {
            println!("Paused at step {index}: {}", reason.describe());
        }
        RunEvent::Resumed { index, .. } => println!("Resumed at step {index}"),
        RunEvent::Aborted { index, .. } => println!("Aborted at step {index}"),
        RunEvent::Completed { steps_run, .. } => println!("Completed {steps_run} steps"),
        RunEvent::Failed { error, .. } => println!("Failed: {error}"),
        RunEvent::StepStarted { .. } => {}
    }
}

fn print_summary(report: &RunReport) {
    let elapsed = (report.finished_at - report.started_at)
        .num_milliseconds()
        .max(0) as u64;
    println!();
    println!(
        "Run {} {} ({} of {} steps executed)",
        report.run_id,
        phase_label(report.phase),
        report.outcomes.len(),
        report.steps_total
    );
    println!("- Playbook: {}", report.playbook);
    println!(
        "- Elapsed: {}",
        humantime::format_duration(Duration::from_millis(elapsed))
    );
    println!("- Faults: {}", report.fault_count());
    if let Some(next) = report.next_index {
        println!("- Next run resumes at step {next}");
    }
}
