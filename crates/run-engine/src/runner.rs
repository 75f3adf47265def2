//! The resumable run loop.
//!
//! Walks a playbook's steps in order with the per-step sequence: honor
//! abort, hold while paused, pre-step delay, resolve the element,
//! dispatch, apply flow control, inter-step gap. The loop is the only
//! publisher of run events; commands flip controller latches and the
//! loop observes them at these boundaries.
//!
//! Cursor writes happen here and nowhere else in the loop: forward on a
//! click or successful upload, pinned to the current index on a missing
//! element, cleared on completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use formpilot_core_types::{DomainKey, RunId};
use formpilot_page_driver::PageDriver;
use formpilot_playbooks::{CampaignData, Playbook, PlaybookStore};
use formpilot_state_store::{
    clear_cursor, load_cursor, save_cursor, StateStore, CAMPAIGN_DATA_KEY,
};

use crate::controller::RunController;
use crate::dispatch::{dispatch_step, StepCtx};
use crate::errors::EngineError;
use crate::events::{PauseReason, RunEvent};
use crate::report::{RunPhase, RunReport, StepOutcome, StepStatus};
use crate::reporter::StatusReporter;
use crate::waiter::{DomWaiter, WaitVerdict};

pub const DEFAULT_STEP_GAP: Duration = Duration::from_millis(300);

/// Executes playbooks against a page driver with persisted resume state.
pub struct RunEngine {
    driver: Arc<dyn PageDriver>,
    store: Arc<dyn StateStore>,
    playbooks: Arc<PlaybookStore>,
    controller: Arc<RunController>,
    reporter: Arc<StatusReporter>,
    waiter: DomWaiter,
    step_gap: Duration,
}

impl RunEngine {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        store: Arc<dyn StateStore>,
        playbooks: Arc<PlaybookStore>,
    ) -> Self {
        Self {
            driver,
            store,
            playbooks,
            controller: RunController::new(),
            reporter: StatusReporter::new(),
            waiter: DomWaiter::new(),
            step_gap: DEFAULT_STEP_GAP,
        }
    }

    pub fn with_waiter(mut self, waiter: DomWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_step_gap(mut self, gap: Duration) -> Self {
        self.step_gap = gap;
        self
    }

    pub fn controller(&self) -> Arc<RunController> {
        Arc::clone(&self.controller)
    }

    pub fn reporter(&self) -> Arc<StatusReporter> {
        Arc::clone(&self.reporter)
    }

    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    /// Run the playbook for `target` to one of its terminal states.
    ///
    /// `fresh` removes the persisted cursor before reading it, so the
    /// run starts at step 0.
    pub async fn run(&self, target: &Url, fresh: bool) -> Result<RunReport, EngineError> {
        let guard = self.controller.try_begin()?;
        let run_id = RunId::new();

        let result = self.execute(&run_id, target, fresh).await;
        drop(guard);

        match result {
            Ok(report) => Ok(report),
            Err(e) => {
                self.reporter.emit(RunEvent::Failed {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Fire-and-forget run for command handling; failures are logged.
    pub fn spawn(self: &Arc<Self>, target: Url, fresh: bool) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.run(&target, fresh).await {
                warn!(target = %target, error = %e, "run ended with error");
            }
        });
    }

    async fn execute(
        &self,
        run_id: &RunId,
        target: &Url,
        fresh: bool,
    ) -> Result<RunReport, EngineError> {
        let started_at = Utc::now();
        let host = target
            .host_str()
            .ok_or_else(|| EngineError::InvalidTarget(target.to_string()))?;
        let domain = DomainKey::from_host(host);

        // Fresh starts drop the cursor before it is read.
        if fresh {
            clear_cursor(self.store.as_ref(), &domain).await?;
        }

        let playbook = self.playbooks.resolve(target).await?;
        let campaign = self.load_campaign().await?;
        let cursor = load_cursor(self.store.as_ref(), &domain).await?.unwrap_or(0);
        let start_index = if fresh { 0 } else { cursor };

        info!(
            run_id = %run_id,
            domain = %domain,
            playbook = %playbook.name,
            start_index,
            steps = playbook.len(),
            fresh,
            "run starting"
        );
        self.reporter.emit(RunEvent::Started {
            run_id: run_id.clone(),
            domain: domain.to_string(),
            total_steps: playbook.len(),
            start_index,
        });

        if start_index >= playbook.len() {
            clear_cursor(self.store.as_ref(), &domain).await?;
            self.reporter.emit(RunEvent::Completed {
                run_id: run_id.clone(),
                steps_run: 0,
            });
            return Ok(self.report(
                run_id,
                &domain,
                playbook.as_ref(),
                RunPhase::Completed,
                started_at,
                start_index,
                None,
                Vec::new(),
            ));
        }

        let cancel = self.controller.cancel_token();
        let ctx = StepCtx {
            driver: self.driver.as_ref(),
            store: self.store.as_ref(),
            campaign: &campaign,
            domain: &domain,
            cancel: &cancel,
            waiter: &self.waiter,
        };

        let mut outcomes: Vec<StepOutcome> = Vec::new();
        let mut phase = RunPhase::Completed;
        let mut i = start_index;

        'steps: while i < playbook.len() {
            if cancel.is_cancelled() {
                phase = RunPhase::Aborted;
                break;
            }

            if self.controller.is_paused() {
                self.reporter.emit(RunEvent::Paused {
                    run_id: run_id.clone(),
                    index: i,
                    reason: PauseReason::Command,
                });
                if self.controller.wait_while_paused(&cancel).await.is_err() {
                    phase = RunPhase::Aborted;
                    break;
                }
                self.reporter.emit(RunEvent::Resumed {
                    run_id: run_id.clone(),
                    index: i,
                });
            }
            if cancel.is_cancelled() {
                phase = RunPhase::Aborted;
                break;
            }

            let step = &playbook.steps[i];
            let action = step.action.name().to_string();

            if let Some(delay) = step.delay.filter(|d| *d > 0) {
                debug!(index = i, delay_ms = delay, "pre-step delay");
                tokio::select! {
                    _ = cancel.cancelled() => { phase = RunPhase::Aborted; break; }
                    _ = sleep(Duration::from_millis(delay)) => {}
                }
            }

            self.reporter.emit(RunEvent::StepStarted {
                run_id: run_id.clone(),
                index: i,
                action: action.clone(),
            });
            let step_start = Utc::now();
            let timer = Instant::now();

            // Resolve the element for actions that target one.
            if step.action.needs_element() {
                if let Some(selector) = step.selector.as_deref() {
                    match self
                        .waiter
                        .wait_for(self.driver.as_ref(), selector, None, &cancel)
                        .await
                    {
                        Ok(WaitVerdict::Found) => {}
                        Ok(WaitVerdict::TimedOut) => {
                            warn!(index = i, selector, "element missing, pausing run");
                            let outcome = StepOutcome::new(
                                i,
                                &action,
                                Some(selector),
                                StepStatus::NotFound,
                                step_start,
                                timer.elapsed().as_millis() as u64,
                            )
                            .with_error(format!("element not found: {selector}"));
                            self.reporter.emit(RunEvent::StepFinished {
                                run_id: run_id.clone(),
                                outcome: outcome.clone(),
                            });
                            outcomes.push(outcome);

                            // Pin the cursor so a later page load retries
                            // this step, then hold for resume or abort.
                            save_cursor(self.store.as_ref(), &domain, i).await?;
                            if !self
                                .hold(run_id, i, PauseReason::MissingElement {
                                    selector: selector.to_string(),
                                }, &cancel)
                                .await
                            {
                                phase = RunPhase::Aborted;
                                break;
                            }
                            self.reporter.emit(RunEvent::Resumed {
                                run_id: run_id.clone(),
                                index: i + 1,
                            });
                            // In-session resume moves on; the persisted
                            // cursor still points at the missing step.
                            i += 1;
                            continue 'steps;
                        }
                        Ok(WaitVerdict::Cancelled) => {
                            phase = RunPhase::Aborted;
                            break;
                        }
                        Err(e) => {
                            let outcome = StepOutcome::new(
                                i,
                                &action,
                                Some(selector),
                                StepStatus::Error,
                                step_start,
                                timer.elapsed().as_millis() as u64,
                            )
                            .with_error(e.to_string());
                            self.reporter.emit(RunEvent::StepFinished {
                                run_id: run_id.clone(),
                                outcome: outcome.clone(),
                            });
                            outcomes.push(outcome);
                            if !self.step_gap_wait(&cancel).await {
                                phase = RunPhase::Aborted;
                                break;
                            }
                            i += 1;
                            continue 'steps;
                        }
                    }
                }
            }

            let handled = match dispatch_step(&ctx, step).await {
                Ok(handled) => handled,
                Err(EngineError::Aborted) => {
                    phase = RunPhase::Aborted;
                    break;
                }
                Err(e) => return Err(e),
            };

            let mut outcome = StepOutcome::new(
                i,
                &action,
                step.selector.as_deref(),
                handled.status,
                step_start,
                timer.elapsed().as_millis() as u64,
            );
            outcome.count = handled.count;
            outcome.detail = handled.detail;
            outcome.error = handled.error;
            debug!(index = i, status = %outcome.status, ok = outcome.ok, "step finished");
            self.reporter.emit(RunEvent::StepFinished {
                run_id: run_id.clone(),
                outcome: outcome.clone(),
            });
            let status = outcome.status;
            outcomes.push(outcome);

            // Flow control.
            match status {
                StepStatus::Clicked if step.ends_page() => {
                    save_cursor(self.store.as_ref(), &domain, i + 1).await?;
                    info!(index = i, "navigation click, run pauses until the next page");
                    self.reporter.emit(RunEvent::Paused {
                        run_id: run_id.clone(),
                        index: i,
                        reason: PauseReason::Navigation,
                    });
                    phase = RunPhase::Paused;
                    break 'steps;
                }
                StepStatus::Clicked | StepStatus::Uploaded => {
                    save_cursor(self.store.as_ref(), &domain, i + 1).await?;
                }
                StepStatus::PopupTimeout => {
                    // Hold without touching the cursor.
                    if cancel.is_cancelled()
                        || !self
                            .hold(run_id, i, PauseReason::PopupTimeout {
                                selector: step.selector.clone().unwrap_or_default(),
                            }, &cancel)
                            .await
                    {
                        phase = RunPhase::Aborted;
                        break;
                    }
                    self.reporter.emit(RunEvent::Resumed {
                        run_id: run_id.clone(),
                        index: i + 1,
                    });
                }
                _ => {}
            }

            if !self.step_gap_wait(&cancel).await {
                phase = RunPhase::Aborted;
                break;
            }
            i += 1;
        }

        match phase {
            RunPhase::Completed => {
                clear_cursor(self.store.as_ref(), &domain).await?;
                info!(run_id = %run_id, steps_run = outcomes.len(), "run completed");
                self.reporter.emit(RunEvent::Completed {
                    run_id: run_id.clone(),
                    steps_run: outcomes.len(),
                });
            }
            RunPhase::Aborted => {
                info!(run_id = %run_id, index = i, "run aborted");
                self.reporter.emit(RunEvent::Aborted {
                    run_id: run_id.clone(),
                    index: i,
                });
            }
            RunPhase::Paused | RunPhase::Failed => {}
        }

        let next_index = if phase == RunPhase::Completed {
            None
        } else {
            load_cursor(self.store.as_ref(), &domain).await?
        };
        Ok(self.report(
            run_id,
            &domain,
            playbook.as_ref(),
            phase,
            started_at,
            start_index,
            next_index,
            outcomes,
        ))
    }

    async fn load_campaign(&self) -> Result<CampaignData, EngineError> {
        let campaign = match self.store.get(CAMPAIGN_DATA_KEY).await? {
            Some(value) => CampaignData::from_stored(value).unwrap_or_default(),
            None => CampaignData::default(),
        };
        if campaign.is_empty() {
            debug!("no campaign record in the store");
        }
        Ok(campaign)
    }

    /// Latch the pause and wait it out. False means aborted.
    async fn hold(
        &self,
        run_id: &RunId,
        index: usize,
        reason: PauseReason,
        cancel: &CancellationToken,
    ) -> bool {
        self.controller.pause();
        self.reporter.emit(RunEvent::Paused {
            run_id: run_id.clone(),
            index,
            reason,
        });
        self.controller.wait_while_paused(cancel).await.is_ok()
    }

    /// Inter-step gap. False means cancelled mid-gap.
    async fn step_gap_wait(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(self.step_gap) => true,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        run_id: &RunId,
        domain: &DomainKey,
        playbook: &Playbook,
        phase: RunPhase,
        started_at: chrono::DateTime<Utc>,
        start_index: usize,
        next_index: Option<usize>,
        outcomes: Vec<StepOutcome>,
    ) -> RunReport {
        RunReport {
            run_id: run_id.clone(),
            domain: domain.to_string(),
            playbook: playbook.name.clone(),
            phase,
            started_at,
            finished_at: Utc::now(),
            steps_total: playbook.len(),
            start_index,
            next_index,
            outcomes,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_page_driver::{ControlKind, SimElement, SimPage};
    use formpilot_playbooks::{DirSource, Step};
    use formpilot_state_store::{MemoryStateStore, BASE64_DATA_KEY, CAMPAIGN_DATA_KEY};
    use serde_json::json;
    use tokio::sync::broadcast;

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn step(fields: serde_json::Value) -> Step {
        serde_json::from_value(fields).unwrap()
    }

    fn target() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    struct Harness {
        engine: Arc<RunEngine>,
        page: Arc<SimPage>,
        store: Arc<MemoryStateStore>,
        domain: DomainKey,
        _dir: tempfile::TempDir,
    }

    fn harness(steps: Vec<Step>) -> Harness {
        harness_with_gap(steps, Duration::from_millis(1))
    }

    fn harness_with_gap(steps: Vec<Step>, gap: Duration) -> Harness {
        let page = Arc::new(SimPage::new());
        let store = Arc::new(MemoryStateStore::new());
        let dir = tempfile::tempdir().unwrap();
        let playbooks = Arc::new(PlaybookStore::new(Arc::new(DirSource::new(dir.path()))));
        playbooks.insert(Playbook::new("example.com.json", steps));

        let driver: Arc<dyn PageDriver> = page.clone();
        let state: Arc<dyn StateStore> = store.clone();
        let waiter = DomWaiter::new()
            .with_poll_interval(Duration::from_millis(2))
            .with_default_timeout(Duration::from_millis(40));
        let engine = Arc::new(
            RunEngine::new(driver, state, playbooks)
                .with_waiter(waiter)
                .with_step_gap(gap),
        );
        Harness {
            engine,
            page,
            store,
            domain: DomainKey::from_host("example.com"),
            _dir: dir,
        }
    }

    async fn seed_campaign(store: &MemoryStateStore, value: serde_json::Value) {
        store.put(CAMPAIGN_DATA_KEY, value).await.unwrap();
    }

    async fn cursor(h: &Harness) -> Option<usize> {
        load_cursor(h.store.as_ref(), &h.domain).await.unwrap()
    }

    async fn next_matching(
        rx: &mut broadcast::Receiver<RunEvent>,
        mut pred: impl FnMut(&RunEvent) -> bool,
    ) -> RunEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("event stream stalled")
                .expect("event bus closed");
            if pred(&event) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn run_fills_completes_and_clears_cursor() {
        let h = harness(vec![step(json!({
            "action": "fill", "selector": "#name", "valueKey": "name"
        }))]);
        h.page.add_element(SimElement::new("#name", ControlKind::Text));
        seed_campaign(&h.store, json!({"name": "Acme Co"})).await;

        let report = h.engine.run(&target(), false).await.unwrap();

        assert_eq!(report.phase, RunPhase::Completed);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].status, StepStatus::Filled);
        assert!(report.outcomes[0].ok);
        assert_eq!(report.next_index, None);
        assert_eq!(h.page.value_of("#name").as_deref(), Some("Acme Co"));
        assert_eq!(cursor(&h).await, None);

        let snap = h.engine.reporter().snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.status, "completed");
    }

    #[tokio::test]
    async fn run_resumes_from_persisted_cursor() {
        let h = harness(vec![
            step(json!({"action": "fill", "selector": "#a", "value": "first"})),
            step(json!({"action": "fill", "selector": "#b", "value": "second"})),
        ]);
        h.page.add_element(SimElement::new("#a", ControlKind::Text));
        h.page.add_element(SimElement::new("#b", ControlKind::Text));
        save_cursor(h.store.as_ref(), &h.domain, 1).await.unwrap();

        let report = h.engine.run(&target(), false).await.unwrap();

        assert_eq!(report.phase, RunPhase::Completed);
        assert_eq!(report.start_index, 1);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].index, 1);
        assert_eq!(h.page.value_of("#a").as_deref(), Some(""));
        assert_eq!(h.page.value_of("#b").as_deref(), Some("second"));
        assert_eq!(cursor(&h).await, None);
    }

    #[tokio::test]
    async fn fresh_run_starts_at_zero_despite_cursor() {
        let h = harness(vec![
            step(json!({"action": "fill", "selector": "#a", "value": "first"})),
            step(json!({"action": "fill", "selector": "#b", "value": "second"})),
        ]);
        h.page.add_element(SimElement::new("#a", ControlKind::Text));
        h.page.add_element(SimElement::new("#b", ControlKind::Text));
        save_cursor(h.store.as_ref(), &h.domain, 1).await.unwrap();

        let report = h.engine.run(&target(), true).await.unwrap();

        assert_eq!(report.start_index, 0);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(h.page.value_of("#a").as_deref(), Some("first"));
        assert_eq!(h.page.value_of("#b").as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn out_of_range_cursor_completes_without_steps() {
        let h = harness(vec![step(json!({
            "action": "fill", "selector": "#a", "value": "x"
        }))]);
        h.page.add_element(SimElement::new("#a", ControlKind::Text));
        save_cursor(h.store.as_ref(), &h.domain, 5).await.unwrap();

        let report = h.engine.run(&target(), false).await.unwrap();

        assert_eq!(report.phase, RunPhase::Completed);
        assert_eq!(report.start_index, 5);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.next_index, None);
        assert_eq!(cursor(&h).await, None);
    }

    #[tokio::test]
    async fn missing_element_pauses_pins_cursor_and_resumes_past_it() {
        let h = harness(vec![
            step(json!({"action": "fill", "selector": "#ghost", "value": "x"})),
            step(json!({"action": "fill", "selector": "#b", "value": "second"})),
        ]);
        h.page.add_element(SimElement::new("#b", ControlKind::Text));

        let mut rx = h.engine.reporter().subscribe();
        let engine = h.engine.clone();
        let handle = tokio::spawn(async move { engine.run(&target(), false).await });

        next_matching(&mut rx, |e| {
            matches!(
                e,
                RunEvent::Paused {
                    reason: PauseReason::MissingElement { .. },
                    ..
                }
            )
        })
        .await;

        assert_eq!(cursor(&h).await, Some(0));
        let snap = h.engine.reporter().snapshot();
        assert!(snap.is_running);
        assert_eq!(snap.status, "paused");
        assert!(snap.last_error.as_deref().unwrap().contains("#ghost"));

        h.engine.controller().resume();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.phase, RunPhase::Completed);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, StepStatus::NotFound);
        assert!(!report.outcomes[0].ok);
        assert_eq!(report.outcomes[1].index, 1);
        assert_eq!(report.outcomes[1].status, StepStatus::Filled);
        assert_eq!(h.page.value_of("#b").as_deref(), Some("second"));
        assert_eq!(cursor(&h).await, None);
    }

    #[tokio::test]
    async fn abort_during_pause_keeps_cursor() {
        let h = harness(vec![
            step(json!({"action": "fill", "selector": "#a", "value": "x"})),
            step(json!({"action": "fill", "selector": "#ghost", "value": "y"})),
        ]);
        h.page.add_element(SimElement::new("#a", ControlKind::Text));

        let mut rx = h.engine.reporter().subscribe();
        let engine = h.engine.clone();
        let handle = tokio::spawn(async move { engine.run(&target(), false).await });

        next_matching(&mut rx, |e| {
            matches!(
                e,
                RunEvent::Paused {
                    reason: PauseReason::MissingElement { .. },
                    index: 1,
                    ..
                }
            )
        })
        .await;
        assert_eq!(cursor(&h).await, Some(1));

        h.engine.controller().abort();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.phase, RunPhase::Aborted);
        assert_eq!(report.next_index, Some(1));
        assert_eq!(cursor(&h).await, Some(1));
        let snap = h.engine.reporter().snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.status, "aborted");
    }

    #[tokio::test]
    async fn upload_advances_cursor_before_popup_wait() {
        let h = harness(vec![
            step(json!({
                "action": "uploadImages", "selector": "#file", "valueKey": "MainImage"
            })),
            step(json!({
                "action": "waitForPopup", "selector": "#popup", "value": "60000"
            })),
        ]);
        h.page.add_element(SimElement::new("#file", ControlKind::File));
        h.store
            .put(BASE64_DATA_KEY, json!({"MainImage": PNG_DATA_URL}))
            .await
            .unwrap();

        let mut rx = h.engine.reporter().subscribe();
        let engine = h.engine.clone();
        let handle = tokio::spawn(async move { engine.run(&target(), false).await });

        next_matching(
            &mut rx,
            |e| matches!(e, RunEvent::StepStarted { index: 1, .. }),
        )
        .await;
        assert_eq!(cursor(&h).await, Some(1));
        assert_eq!(
            h.page.uploads(),
            vec![("#file".to_string(), "MainImage.png".to_string())]
        );

        h.engine.controller().abort();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.phase, RunPhase::Aborted);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].status, StepStatus::Uploaded);
        assert_eq!(report.next_index, Some(1));
    }

    #[tokio::test]
    async fn navigation_click_ends_run_with_cursor_past_it() {
        let h = harness(vec![
            step(json!({"action": "fill", "selector": "#a", "value": "x"})),
            step(json!({
                "action": "click", "selector": "#save", "valueKey": "NextButtonSave"
            })),
            step(json!({"action": "fill", "selector": "#b", "value": "never"})),
        ]);
        h.page.add_element(SimElement::new("#a", ControlKind::Text));
        h.page.add_element(SimElement::new("#save", ControlKind::Button));
        h.page.add_element(SimElement::new("#b", ControlKind::Text));

        let report = h.engine.run(&target(), false).await.unwrap();

        assert_eq!(report.phase, RunPhase::Paused);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[1].status, StepStatus::Clicked);
        assert_eq!(report.next_index, Some(2));
        assert_eq!(cursor(&h).await, Some(2));
        assert_eq!(h.page.clicks(), vec!["#save".to_string()]);
        assert_eq!(h.page.value_of("#b").as_deref(), Some(""));

        let snap = h.engine.reporter().snapshot();
        assert_eq!(snap.status, "paused");
        assert_eq!(snap.last_error, None);
    }

    #[tokio::test]
    async fn pause_command_holds_between_steps() {
        let h = harness_with_gap(
            vec![
                step(json!({"action": "fill", "selector": "#a", "value": "x"})),
                step(json!({"action": "fill", "selector": "#b", "value": "y"})),
            ],
            Duration::from_millis(40),
        );
        h.page.add_element(SimElement::new("#a", ControlKind::Text));
        h.page.add_element(SimElement::new("#b", ControlKind::Text));

        let mut rx = h.engine.reporter().subscribe();
        let engine = h.engine.clone();
        let handle = tokio::spawn(async move { engine.run(&target(), false).await });

        next_matching(&mut rx, |e| {
            matches!(
                e,
                RunEvent::StepFinished {
                    outcome: StepOutcome { index: 0, .. },
                    ..
                }
            )
        })
        .await;
        h.engine.controller().pause();

        next_matching(&mut rx, |e| {
            matches!(
                e,
                RunEvent::Paused {
                    reason: PauseReason::Command,
                    index: 1,
                    ..
                }
            )
        })
        .await;
        assert!(h.engine.controller().is_paused());
        assert_eq!(h.engine.reporter().snapshot().status, "paused");

        h.engine.controller().resume();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.phase, RunPhase::Completed);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(h.page.value_of("#b").as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn handler_error_moves_to_next_step() {
        let h = harness(vec![
            step(json!({"action": "fill", "selector": "#check", "value": "x"})),
            step(json!({"action": "fill", "selector": "#b", "value": "y"})),
        ]);
        h.page
            .add_element(SimElement::new("#check", ControlKind::Checkbox));
        h.page.add_element(SimElement::new("#b", ControlKind::Text));

        let report = h.engine.run(&target(), false).await.unwrap();

        assert_eq!(report.phase, RunPhase::Completed);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, StepStatus::Error);
        assert!(!report.outcomes[0].ok);
        assert_eq!(report.outcomes[1].status, StepStatus::Filled);
        assert_eq!(report.fault_count(), 1);
        assert_eq!(h.engine.reporter().recent_faults().len(), 1);
    }

    #[tokio::test]
    async fn second_run_is_rejected_while_active() {
        let h = harness(vec![step(json!({"action": "delay", "value": "5000"}))]);

        let mut rx = h.engine.reporter().subscribe();
        let engine = h.engine.clone();
        let handle = tokio::spawn(async move { engine.run(&target(), false).await });

        next_matching(
            &mut rx,
            |e| matches!(e, RunEvent::StepStarted { index: 0, .. }),
        )
        .await;

        let err = h.engine.run(&target(), false).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning));

        h.engine.controller().abort();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.phase, RunPhase::Aborted);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_target_fails_the_run() {
        let h = harness(vec![step(json!({"action": "delay", "value": "1"}))]);

        let url = Url::parse("https://nowhere.test/").unwrap();
        let err = h.engine.run(&url, false).await.unwrap_err();

        assert!(matches!(err, EngineError::Playbook(_)));
        let snap = h.engine.reporter().snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.status, "failed");
        assert!(!h.engine.controller().is_running());
    }

    #[tokio::test]
    async fn empty_playbook_completes_immediately() {
        let h = harness(Vec::new());

        let report = h.engine.run(&target(), false).await.unwrap();

        assert_eq!(report.phase, RunPhase::Completed);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.steps_total, 0);
        assert_eq!(cursor(&h).await, None);
    }
}
