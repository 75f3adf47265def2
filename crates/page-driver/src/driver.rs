use async_trait::async_trait;

use crate::errors::DriverError;
use crate::types::{ControlKind, FilePayload, LabeledControl, OptionItem};

/// The DOM operations the run engine needs, behind one object-safe
/// seam. A driver owns a single page; selectors are CSS.
///
/// `query` is the only presence check and never waits. Waiting is the
/// engine's business, built by polling `query`.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Whether the selector currently matches a visible element.
    async fn query(&self, selector: &str) -> Result<bool, DriverError>;

    /// Write a value into a text-like control, replacing its content.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), DriverError>;

    /// Labeled checkboxes, scoped to `container` when given, otherwise
    /// page-wide.
    async fn checkboxes(&self, container: Option<&str>)
        -> Result<Vec<LabeledControl>, DriverError>;

    /// Untick every checked checkbox on the page; returns how many.
    async fn clear_checkboxes(&self) -> Result<usize, DriverError>;

    async fn kind_of(&self, selector: &str) -> Result<ControlKind, DriverError>;

    async fn options_of(&self, selector: &str) -> Result<Vec<OptionItem>, DriverError>;

    /// Select the option with the given value.
    async fn select_value(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    /// Prepend a new option to a select without selecting it.
    async fn insert_option(
        &self,
        selector: &str,
        value: &str,
        label: &str,
    ) -> Result<(), DriverError>;

    async fn upload(&self, selector: &str, file: &FilePayload) -> Result<(), DriverError>;

    /// Replace the HTML content of a rich-text editor.
    async fn set_rich_text(&self, selector: &str, html: &str) -> Result<(), DriverError>;
}
