//! Wire commands and replies.
//!
//! The JSON shapes match what earlier builds spoke: commands tagged by
//! a `command` field, replies always carrying `success` plus whichever
//! of `status` / `message` / `error` applies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload carried by `triggerAutomation`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerData {
    #[serde(default, rename = "forceStart")]
    pub force_start: bool,
}

/// A control command, as received over any transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum EngineCommand {
    #[serde(rename = "pause")]
    Pause,
    #[serde(rename = "resume")]
    Resume,
    #[serde(rename = "abort")]
    Abort,
    #[serde(rename = "startFresh")]
    StartFresh,
    #[serde(rename = "triggerAutomation")]
    TriggerAutomation {
        #[serde(default)]
        data: TriggerData,
    },
    #[serde(rename = "manualSetResumeIndex")]
    ManualSetResumeIndex {
        #[serde(default, rename = "resumeIndex")]
        resume_index: usize,
    },
    #[serde(rename = "getAutomationStatus")]
    GetStatus,
    /// Anything unrecognized; routed to the standard rejection.
    #[serde(other)]
    Unknown,
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Abort => "abort",
            Self::StartFresh => "startFresh",
            Self::TriggerAutomation { .. } => "triggerAutomation",
            Self::ManualSetResumeIndex { .. } => "manualSetResumeIndex",
            Self::GetStatus => "getAutomationStatus",
            Self::Unknown => "unknown",
        }
    }
}

/// Reply envelope. `status` holds either a short state word
/// (`"paused"`) or the full status snapshot for `getAutomationStatus`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, rename = "resumeIndex", skip_serializing_if = "Option::is_none")]
    pub resume_index: Option<usize>,
    #[serde(default, rename = "isRunning", skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(default, rename = "isPaused", skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
    #[serde(default, rename = "isAborted", skip_serializing_if = "Option::is_none")]
    pub is_aborted: Option<bool>,
}

impl CommandReply {
    pub fn ok_status(status: &str) -> Self {
        Self {
            success: true,
            status: Some(Value::String(status.to_string())),
            ..Default::default()
        }
    }

    pub fn ok_message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn ok_resume_index(index: usize) -> Self {
        Self {
            success: true,
            resume_index: Some(index),
            ..Default::default()
        }
    }

    pub fn rejected(error: &str) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn snapshot(status: Value, is_running: bool, is_paused: bool, is_aborted: bool) -> Self {
        Self {
            success: true,
            status: Some(status),
            is_running: Some(is_running),
            is_paused: Some(is_paused),
            is_aborted: Some(is_aborted),
            ..Default::default()
        }
    }
}
