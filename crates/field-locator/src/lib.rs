//! Which checkboxes a bulk tick step should touch.
//!
//! The engine pulls labeled controls through the page seam and asks a
//! [`CheckboxMatcher`] to claim them. Matching is pure: no DOM access,
//! no waiting, just label and section text.

mod matchers;

pub use matchers::{
    controls_to_tick, normalize_label, CheckboxMatcher, MatcherKind, PaymentMethodMatcher,
    SubcategoryMatcher, PAYMENT_KEYWORDS, SUBCATEGORY_CONTAINER,
};
