//! Checkbox matchers
//!
//! Two matchers in use:
//! 1. PaymentMethod - keyword and section matching across the page
//! 2. Subcategory - exact label matching inside the subcategory list

use formpilot_page_driver::LabeledControl;
use tracing::debug;

/// Selector of the list subcategory ticks are confined to.
pub const SUBCATEGORY_CONTAINER: &str = "ul.list-of-sub-categories";

/// Label fragments that mark a checkbox as a payment method.
pub const PAYMENT_KEYWORDS: &[&str] = &[
    "credit card",
    "debit card",
    "credit/debit",
    "credit and debit",
    "cash",
    "cash payment",
    "digital wallet",
    "digital wallets",
    "e-wallet",
    "ewallet",
    "bank transfer",
    "bank transfers",
    "wire transfer",
    "bank deposit",
    "paypal",
    "pay pal",
    "stripe",
    "square",
    "apple pay",
    "google pay",
    "samsung pay",
    "venmo",
    "zelle",
    "cash app",
    "bitcoin",
    "crypto",
    "cryptocurrency",
    "check",
    "cheque",
    "money order",
];

/// Matcher kind, for reports and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatcherKind {
    PaymentMethod,
    Subcategory,
}

impl MatcherKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PaymentMethod => "payment-method",
            Self::Subcategory => "subcategory",
        }
    }
}

/// Decides which checkboxes a bulk tick step touches. Matchers never
/// see the page; they judge the labeled controls the driver returned.
pub trait CheckboxMatcher: Send + Sync {
    fn matcher_type(&self) -> MatcherKind;

    fn name(&self) -> &'static str {
        self.matcher_type().name()
    }

    /// Container selector to scope the checkbox query to, if any.
    fn scope(&self) -> Option<&str> {
        None
    }

    /// Whether this control should be ticked. Already-checked controls
    /// are filtered before this is asked.
    fn matches(&self, control: &LabeledControl) -> bool;
}

/// The unticked controls the matcher claims, in page order.
pub fn controls_to_tick<'a>(
    matcher: &dyn CheckboxMatcher,
    controls: &'a [LabeledControl],
) -> Vec<&'a LabeledControl> {
    controls
        .iter()
        .filter(|c| !c.checked && matcher.matches(c))
        .inspect(|c| debug!(matcher = matcher.name(), label = %c.label, "checkbox claimed"))
        .collect()
}

/// Ticks anything that looks like a payment method: a label carrying a
/// known keyword, or any checkbox inside a payment-labeled section.
pub struct PaymentMethodMatcher;

impl PaymentMethodMatcher {
    fn in_payment_section(control: &LabeledControl) -> bool {
        control
            .section
            .as_deref()
            .map(|s| s.to_lowercase().contains("payment"))
            .unwrap_or(false)
    }

    fn label_is_payment(control: &LabeledControl) -> bool {
        let label = control.label.to_lowercase();
        PAYMENT_KEYWORDS.iter().any(|kw| label.contains(kw))
    }
}

impl CheckboxMatcher for PaymentMethodMatcher {
    fn matcher_type(&self) -> MatcherKind {
        MatcherKind::PaymentMethod
    }

    fn matches(&self, control: &LabeledControl) -> bool {
        Self::in_payment_section(control) || Self::label_is_payment(control)
    }
}

/// Ticks the one subcategory whose label (or `data-name`) equals the
/// citation's subcategory, scoped to [`SUBCATEGORY_CONTAINER`].
pub struct SubcategoryMatcher {
    target: String,
}

impl SubcategoryMatcher {
    pub fn new(target: impl AsRef<str>) -> Self {
        Self {
            target: normalize_label(target.as_ref()),
        }
    }
}

impl CheckboxMatcher for SubcategoryMatcher {
    fn matcher_type(&self) -> MatcherKind {
        MatcherKind::Subcategory
    }

    fn scope(&self) -> Option<&str> {
        Some(SUBCATEGORY_CONTAINER)
    }

    fn matches(&self, control: &LabeledControl) -> bool {
        if self.target.is_empty() {
            return false;
        }
        let label = normalize_label(&control.label);
        if !label.is_empty() && label == self.target {
            return true;
        }
        control
            .data_name
            .as_deref()
            .map(|name| normalize_label(name) == self.target)
            .unwrap_or(false)
    }
}

/// Lowercased, whitespace-collapsed label text. DOM labels arrive with
/// newline padding; both sides of a comparison go through this.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
