//! Status reporting: a merge-style snapshot plus a bounded fault ring,
//! fed from run events and republished on the status bus.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use formpilot_control_bus::StatusBus;

use crate::events::{PauseReason, RunEvent};
use crate::report::StepOutcome;

const DEFAULT_FAULT_CAPACITY: usize = 32;

/// Last-known automation state, merged event by event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    /// One of `idle`, `running`, `paused`, `aborted`, `completed`, `failed`.
    pub status: String,
    /// 1-based step counter; 0 before the first step.
    pub current_step: usize,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            is_running: false,
            status: "idle".to_string(),
            current_step: 0,
            total_steps: 0,
            last_error: None,
            last_updated: Utc::now(),
        }
    }
}

/// Fixed-capacity ring that evicts its oldest entry on overflow.
#[derive(Debug)]
pub struct BoundedRing<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone> BoundedRing<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Merges run events into a [`StatusSnapshot`], keeps recent step
/// faults, and republishes every event on the status bus.
pub struct StatusReporter {
    snapshot: RwLock<StatusSnapshot>,
    faults: Mutex<BoundedRing<StepOutcome>>,
    bus: Arc<StatusBus<RunEvent>>,
}

impl StatusReporter {
    pub fn new() -> Arc<Self> {
        Self::with_fault_capacity(DEFAULT_FAULT_CAPACITY)
    }

    pub fn with_fault_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            snapshot: RwLock::new(StatusSnapshot::default()),
            faults: Mutex::new(BoundedRing::new(capacity)),
            bus: StatusBus::new(64),
        })
    }

    /// Fold one event into the snapshot and publish it.
    pub fn emit(&self, event: RunEvent) {
        self.merge(&event);
        self.bus.publish(event);
    }

    fn merge(&self, event: &RunEvent) {
        let mut snap = self.snapshot.write();
        match event {
            RunEvent::Started {
                total_steps,
                start_index,
                ..
            } => {
                snap.is_running = true;
                snap.status = "running".to_string();
                snap.current_step = start_index + 1;
                snap.total_steps = *total_steps;
                snap.last_error = None;
            }
            RunEvent::StepStarted { index, .. } => {
                snap.current_step = index + 1;
            }
            RunEvent::StepFinished { outcome, .. } => {
                if !outcome.ok {
                    snap.last_error = Some(
                        outcome
                            .error
                            .clone()
                            .unwrap_or_else(|| outcome.status.as_str().to_string()),
                    );
                    debug!(
                        index = outcome.index,
                        status = %outcome.status,
                        "recording step fault"
                    );
                    self.faults.lock().push(outcome.clone());
                }
            }
            RunEvent::Paused { reason, .. } => {
                snap.status = "paused".to_string();
                // Command and navigation pauses are ordinary states, not faults.
                if matches!(
                    reason,
                    PauseReason::MissingElement { .. } | PauseReason::PopupTimeout { .. }
                ) {
                    snap.last_error = Some(reason.describe());
                }
            }
            RunEvent::Resumed { index, .. } => {
                snap.status = "running".to_string();
                snap.current_step = index + 1;
            }
            RunEvent::Aborted { .. } => {
                snap.is_running = false;
                snap.status = "aborted".to_string();
            }
            RunEvent::Completed { .. } => {
                snap.is_running = false;
                snap.status = "completed".to_string();
            }
            RunEvent::Failed { error, .. } => {
                snap.is_running = false;
                snap.status = "failed".to_string();
                snap.last_error = Some(error.clone());
            }
        }
        snap.last_updated = Utc::now();
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().clone()
    }

    pub fn recent_faults(&self) -> Vec<StepOutcome> {
        self.faults.lock().to_vec()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> Arc<StatusBus<RunEvent>> {
        Arc::clone(&self.bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::StepStatus;
    use formpilot_core_types::RunId;

    fn outcome(index: usize, status: StepStatus) -> StepOutcome {
        StepOutcome::new(index, "fill", Some("#f"), status, Utc::now(), 1)
    }

    #[test]
    fn ring_evicts_oldest() {
        let mut ring = BoundedRing::new(2);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.to_vec(), vec![2, 3]);
    }

    #[test]
    fn started_and_steps_track_one_based_counter() {
        let reporter = StatusReporter::new();
        let id = RunId::new();
        reporter.emit(RunEvent::Started {
            run_id: id.clone(),
            domain: "example.com".to_string(),
            total_steps: 5,
            start_index: 2,
        });
        reporter.emit(RunEvent::StepStarted {
            run_id: id,
            index: 3,
            action: "click".to_string(),
        });

        let snap = reporter.snapshot();
        assert!(snap.is_running);
        assert_eq!(snap.status, "running");
        assert_eq!(snap.current_step, 4);
        assert_eq!(snap.total_steps, 5);
    }

    #[test]
    fn failed_steps_land_in_fault_ring_and_last_error() {
        let reporter = StatusReporter::new();
        let id = RunId::new();
        reporter.emit(RunEvent::StepFinished {
            run_id: id.clone(),
            outcome: outcome(1, StepStatus::Filled),
        });
        reporter.emit(RunEvent::StepFinished {
            run_id: id,
            outcome: outcome(2, StepStatus::NotFound).with_error("element not found: #f"),
        });

        let faults = reporter.recent_faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].index, 2);
        assert_eq!(
            reporter.snapshot().last_error.as_deref(),
            Some("element not found: #f")
        );
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let reporter = StatusReporter::new();
        let value = serde_json::to_value(reporter.snapshot()).unwrap();
        assert_eq!(value["isRunning"], false);
        assert_eq!(value["status"], "idle");
        assert_eq!(value["currentStep"], 0);
        assert!(value["lastUpdated"].is_i64());
    }

    #[tokio::test]
    async fn events_reach_bus_subscribers_and_latest() {
        let reporter = StatusReporter::new();
        let mut rx = reporter.subscribe();
        let id = RunId::new();
        reporter.emit(RunEvent::Completed {
            run_id: id,
            steps_run: 7,
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, RunEvent::Completed { steps_run: 7, .. }));
        assert!(reporter.bus().latest().is_some());
    }
}
