//! Step outcomes and run reports.
//!
//! Every dispatched step yields a [`StepOutcome`]; a finished run rolls
//! them up into a [`RunReport`]. Status words are the ones the step
//! results have always carried on the wire (`filled`, `not-found`,
//! `payment-methods-ticked`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use formpilot_core_types::RunId;

/// Outcome status of one dispatched step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Filled,
    NoValue,
    Clicked,
    Uploaded,
    NoImage,
    CheckboxesCleared,
    PaymentMethodsTicked,
    SubcategoryTicked,
    CategorySkipped,
    SkipCategoryFailed,
    DataConsolidated,
    ConsolidationFailed,
    Injected,
    InjectionFailed,
    PopupFound,
    PopupTimeout,
    Delayed,
    Unknown,
    NotFound,
    Error,
}

impl StepStatus {
    /// Soft skips (`no-value`, `no-image`, `unknown`) count as ok; only
    /// genuine faults flip a step to not-ok.
    pub fn is_ok(&self) -> bool {
        !matches!(
            self,
            Self::NotFound
                | Self::Error
                | Self::SkipCategoryFailed
                | Self::ConsolidationFailed
                | Self::InjectionFailed
                | Self::PopupTimeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::NoValue => "no-value",
            Self::Clicked => "clicked",
            Self::Uploaded => "uploaded",
            Self::NoImage => "no-image",
            Self::CheckboxesCleared => "checkboxes-cleared",
            Self::PaymentMethodsTicked => "payment-methods-ticked",
            Self::SubcategoryTicked => "subcategory-ticked",
            Self::CategorySkipped => "category-skipped",
            Self::SkipCategoryFailed => "skip-category-failed",
            Self::DataConsolidated => "data-consolidated",
            Self::ConsolidationFailed => "consolidation-failed",
            Self::Injected => "injected",
            Self::InjectionFailed => "injection-failed",
            Self::PopupFound => "popup-found",
            Self::PopupTimeout => "popup-timeout",
            Self::Delayed => "delayed",
            Self::Unknown => "unknown",
            Self::NotFound => "not-found",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report for one executed step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Zero-based step index in the playbook
    pub index: usize,

    /// Wire name of the action
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    pub status: StepStatus,

    /// Whether the step succeeded (soft skips included)
    pub ok: bool,

    /// When the step started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the step finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// How many controls a bulk action touched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Error details (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn new(
        index: usize,
        action: &str,
        selector: Option<&str>,
        status: StepStatus,
        started_at: DateTime<Utc>,
        latency_ms: u64,
    ) -> Self {
        Self {
            index,
            action: action.to_string(),
            selector: selector.map(String::from),
            status,
            ok: status.is_ok(),
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            count: None,
            detail: None,
            error: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// Every step executed; the resume cursor was cleared.
    Completed,
    /// Stopped with state kept: navigation click, missing element, or
    /// an unresolved pause.
    Paused,
    Aborted,
    Failed,
}

/// Roll-up of one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub domain: String,
    pub playbook: String,
    pub phase: RunPhase,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    pub steps_total: usize,
    /// Index the run began at (the restored cursor).
    pub start_index: usize,
    /// Persisted cursor when the run ended; `None` after completion.
    pub next_index: Option<usize>,

    pub outcomes: Vec<StepOutcome>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn ok(&self) -> bool {
        self.phase == RunPhase::Completed
    }

    pub fn fault_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.ok).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_to_wire_words() {
        assert_eq!(
            serde_json::to_value(StepStatus::PaymentMethodsTicked).unwrap(),
            "payment-methods-ticked"
        );
        assert_eq!(serde_json::to_value(StepStatus::NotFound).unwrap(), "not-found");
        assert_eq!(StepStatus::SkipCategoryFailed.as_str(), "skip-category-failed");
    }

    #[test]
    fn soft_skips_are_ok_faults_are_not() {
        assert!(StepStatus::NoImage.is_ok());
        assert!(StepStatus::Unknown.is_ok());
        assert!(!StepStatus::PopupTimeout.is_ok());
        assert!(!StepStatus::Error.is_ok());
    }

    #[test]
    fn outcome_timestamps_serialize_as_millis() {
        let outcome = StepOutcome::new(
            2,
            "fill",
            Some("#name"),
            StepStatus::Filled,
            Utc::now(),
            42,
        )
        .with_detail("Acme");
        let value = serde_json::to_value(&outcome).unwrap();
        assert!(value["started_at"].is_i64());
        assert_eq!(value["status"], "filled");
        assert_eq!(value["ok"], true);
        assert_eq!(value["detail"], "Acme");
        assert!(value.get("count").is_none());
    }
}
