//! Run lifecycle events published on the status bus.

use serde::{Deserialize, Serialize};

use formpilot_core_types::RunId;

use crate::report::StepOutcome;

/// Why a run went into the paused state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum PauseReason {
    /// An operator command requested the pause.
    Command,
    /// The DOM waiter gave up on a step's selector.
    MissingElement { selector: String },
    /// A popup never appeared within its deadline.
    PopupTimeout { selector: String },
    /// A navigation click ended the page; the run resumes on the next one.
    Navigation,
}

impl PauseReason {
    pub fn describe(&self) -> String {
        match self {
            Self::Command => "paused by command".to_string(),
            Self::MissingElement { selector } => format!("element not found: {selector}"),
            Self::PopupTimeout { selector } => format!("popup timed out: {selector}"),
            Self::Navigation => "page navigation".to_string(),
        }
    }
}

/// Events emitted by the run loop while it executes a playbook.
///
/// The loop is the only publisher; command handling flips latches and
/// lets the loop observe them, so every state change shows up here in
/// order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RunEvent {
    Started {
        run_id: RunId,
        domain: String,
        total_steps: usize,
        start_index: usize,
    },
    StepStarted {
        run_id: RunId,
        index: usize,
        action: String,
    },
    StepFinished {
        run_id: RunId,
        outcome: StepOutcome,
    },
    Paused {
        run_id: RunId,
        index: usize,
        reason: PauseReason,
    },
    Resumed {
        run_id: RunId,
        index: usize,
    },
    Aborted {
        run_id: RunId,
        index: usize,
    },
    Completed {
        run_id: RunId,
        steps_run: usize,
    },
    Failed {
        run_id: RunId,
        error: String,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            Self::Started { run_id, .. }
            | Self::StepStarted { run_id, .. }
            | Self::StepFinished { run_id, .. }
            | Self::Paused { run_id, .. }
            | Self::Resumed { run_id, .. }
            | Self::Aborted { run_id, .. }
            | Self::Completed { run_id, .. }
            | Self::Failed { run_id, .. } => run_id,
        }
    }

    /// True for events that end the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Aborted { .. } | Self::Completed { .. } | Self::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_with_kebab_names() {
        let event = RunEvent::Paused {
            run_id: RunId::new(),
            index: 4,
            reason: PauseReason::MissingElement {
                selector: "#submit".to_string(),
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "paused");
        assert_eq!(value["reason"]["reason"], "missing-element");
        assert_eq!(value["reason"]["selector"], "#submit");
    }

    #[test]
    fn terminal_events_are_flagged() {
        let id = RunId::new();
        assert!(RunEvent::Completed {
            run_id: id.clone(),
            steps_run: 3
        }
        .is_terminal());
        assert!(!RunEvent::Resumed { run_id: id, index: 1 }.is_terminal());
    }
}
