//! Step and playbook wire model. Field names match the JSON the step
//! files have always used (`valueKey`, `limitvalue`, `address-mode`).

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `valueKey` marking a click that commits a navigation. The run stops
/// after it with the cursor already pointing at the next step.
pub const NAV_SAVE_KEY: &str = "NextButtonSave";

/// Default rich-text editor target when an injection step has no selector.
pub const RICH_EDITOR_SELECTOR: &str = ".fr-element[contenteditable='true']";

/// Synthetic option used to skip category selects without a match.
pub const SKIP_CATEGORY_VALUE: &str = "0000";
pub const SKIP_CATEGORY_LABEL: &str = "Skip Category";

/// Step kind. Unrecognized wire names parse into [`ActionKind::Unknown`]
/// so a playbook never fails to load over a single odd step.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Fill,
    Click,
    UploadImages,
    InitClearCheckbox,
    TickPaymentMethods,
    TickSubcategory,
    SkipCategory,
    ConsolidateData,
    InjectToFroala,
    RichFill,
    WaitForPopup,
    Delay,
    Unknown(String),
}

impl ActionKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "fill" => Self::Fill,
            "click" => Self::Click,
            "uploadImages" => Self::UploadImages,
            "initClearCheckbox" => Self::InitClearCheckbox,
            "tickPaymentMethods" => Self::TickPaymentMethods,
            "tickSubcategory" => Self::TickSubcategory,
            "skipCategory" => Self::SkipCategory,
            "consolidateData" => Self::ConsolidateData,
            "injectToFroala" => Self::InjectToFroala,
            "richFill" => Self::RichFill,
            "waitForPopup" => Self::WaitForPopup,
            "delay" => Self::Delay,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Fill => "fill",
            Self::Click => "click",
            Self::UploadImages => "uploadImages",
            Self::InitClearCheckbox => "initClearCheckbox",
            Self::TickPaymentMethods => "tickPaymentMethods",
            Self::TickSubcategory => "tickSubcategory",
            Self::SkipCategory => "skipCategory",
            Self::ConsolidateData => "consolidateData",
            Self::InjectToFroala => "injectToFroala",
            Self::RichFill => "richFill",
            Self::WaitForPopup => "waitForPopup",
            Self::Delay => "delay",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether the run loop must resolve `selector` through the waiter
    /// before dispatching this step.
    pub fn needs_element(&self) -> bool {
        !matches!(
            self,
            Self::TickSubcategory
                | Self::ConsolidateData
                | Self::InjectToFroala
                | Self::WaitForPopup
                | Self::Delay
                | Self::Unknown(_)
        )
    }
}

impl Default for ActionKind {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_name(&raw))
    }
}

/// How a fill value is shaped before it lands on the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillMode {
    Required,
    Limit,
    LimitBySentence,
    Address,
    SkipCategory1,
}

/// Address display variants, matched case-insensitively on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    ShowAddress,
    FullHide,
    AddressLine1,
}

impl AddressMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "show address" => Some(Self::ShowAddress),
            "full hide" => Some(Self::FullHide),
            "address line 1" => Some(Self::AddressLine1),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ShowAddress => "show address",
            Self::FullHide => "full hide",
            Self::AddressLine1 => "address line 1",
        }
    }
}

impl Serialize for AddressMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AddressMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| D::Error::custom(format!("unknown address mode: {raw}")))
    }
}

/// One playbook step.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Step {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(rename = "valueKey", default, skip_serializing_if = "Option::is_none")]
    pub value_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Milliseconds to wait before performing the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FillMode>,
    /// Fallback campaign key when the primary value is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
    /// Character budget for the limit modes, as a decimal string.
    #[serde(rename = "limitvalue", default, skip_serializing_if = "Option::is_none")]
    pub limit_value: Option<String>,
    #[serde(rename = "address-mode", default, skip_serializing_if = "Option::is_none")]
    pub address_mode: Option<AddressMode>,
    // Older step files carry "true"/"false" strings here.
    #[serde(default, deserialize_with = "bool_or_string", skip_serializing_if = "is_false")]
    pub required: bool,
}

impl Step {
    /// Effective shaping mode: explicit `mode` wins, otherwise the
    /// presence of the dedicated fields implies it.
    pub fn fill_mode(&self) -> Option<FillMode> {
        if let Some(mode) = &self.mode {
            return Some(mode.clone());
        }
        if self.alternative.is_some() {
            return Some(FillMode::Required);
        }
        if self.address_mode.is_some() {
            return Some(FillMode::Address);
        }
        if self.limit_value.is_some() {
            return Some(FillMode::Limit);
        }
        None
    }

    /// Parsed positive character budget, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit_value
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
    }

    /// True for the save click that commits a navigation.
    pub fn ends_page(&self) -> bool {
        self.action == ActionKind::Click && self.value_key.as_deref() == Some(NAV_SAVE_KEY)
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::String(s) => Ok(s.eq_ignore_ascii_case("true")),
        serde_json::Value::Null => Ok(false),
        other => Err(D::Error::custom(format!(
            "expected bool or string for required flag, got {other}"
        ))),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub step: Option<usize>,
    pub severity: IssueSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn error(step: usize, message: impl Into<String>) -> Self {
        Self {
            step: Some(step),
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }

    fn warning(step: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            step,
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }
}

/// A named, ordered list of steps for one page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Playbook {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Structural checks. Errors make a playbook unusable for the step
    /// they name; warnings flag steps that will degrade at runtime.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.steps.is_empty() {
            issues.push(ValidationIssue::warning(None, "playbook has no steps"));
        }
        for (i, step) in self.steps.iter().enumerate() {
            let action = step.action.name().to_string();
            if step.action.needs_element()
                && step.selector.as_deref().map_or(true, |s| s.trim().is_empty())
            {
                issues.push(ValidationIssue::error(
                    i,
                    format!("{action} requires a selector"),
                ));
            }
            match step.fill_mode() {
                Some(FillMode::Limit) | Some(FillMode::LimitBySentence) if step.limit().is_none() => {
                    issues.push(ValidationIssue::error(
                        i,
                        format!("{action} has a limit mode without a usable limitvalue"),
                    ));
                }
                Some(FillMode::Address) if step.address_mode.is_none() => {
                    issues.push(ValidationIssue::error(
                        i,
                        format!("{action} uses address mode without an address-mode value"),
                    ));
                }
                Some(FillMode::Required) if step.alternative.is_none() => {
                    issues.push(ValidationIssue::warning(
                        Some(i),
                        format!("{action} is required but names no alternative key"),
                    ));
                }
                _ => {}
            }
            if step.action == ActionKind::Fill
                && step.value.is_none()
                && step.value_key.is_none()
            {
                issues.push(ValidationIssue::warning(
                    Some(i),
                    "fill step has neither value nor valueKey",
                ));
            }
            if let ActionKind::Unknown(raw) = &step.action {
                issues.push(ValidationIssue::warning(
                    Some(i),
                    format!("unknown action '{raw}' will be skipped"),
                ));
            }
        }
        issues
    }
}
