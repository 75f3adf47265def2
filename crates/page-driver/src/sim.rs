//! In-memory page simulator.
//!
//! `SimPage` drives the same seam a real browser adapter would, over an
//! element table loaded from a JSON fixture. Elements can be declared
//! late-appearing (visible after N presence checks) to exercise the
//! waiter, and every click and upload is recorded for assertions.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::PageDriver;
use crate::errors::DriverError;
use crate::types::{ControlKind, FilePayload, LabeledControl, OptionItem};

/// One simulated element, as written in page fixtures.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimElement {
    pub selector: String,
    #[serde(default = "text_kind")]
    pub kind: ControlKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data_name: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    /// Selector of the list this element belongs to, for scoped
    /// checkbox queries (`ul.list-of-sub-categories` and friends).
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionItem>,
}

fn text_kind() -> ControlKind {
    ControlKind::Text
}

impl SimElement {
    pub fn new(selector: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            selector: selector.into(),
            kind,
            value: String::new(),
            checked: false,
            label: String::new(),
            data_name: None,
            section: None,
            container: None,
            options: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_options(mut self, options: Vec<OptionItem>) -> Self {
        self.options = options;
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }
}

#[derive(Deserialize)]
struct SimFixture {
    #[serde(default)]
    elements: Vec<SimElement>,
    #[serde(default)]
    appear_after_polls: HashMap<String, u32>,
}

#[derive(Default)]
struct SimState {
    elements: Vec<SimElement>,
    appear_after: HashMap<String, u32>,
    clicks: Vec<String>,
    uploads: Vec<(String, String)>,
}

impl SimState {
    fn position(&self, selector: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.selector == selector)
    }

    fn locate(&mut self, selector: &str) -> Result<&mut SimElement, DriverError> {
        if self.appear_after.get(selector).copied().unwrap_or(0) > 0 {
            return Err(DriverError::NotFound(selector.to_string()));
        }
        let idx = self
            .position(selector)
            .ok_or_else(|| DriverError::NotFound(selector.to_string()))?;
        Ok(&mut self.elements[idx])
    }
}

/// See the module docs. Cheap to share: all state sits behind one lock.
#[derive(Default)]
pub struct SimPage {
    state: Mutex<SimState>,
}

impl SimPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elements(elements: Vec<SimElement>) -> Self {
        let page = Self::new();
        page.state.lock().elements = elements;
        page
    }

    pub fn from_fixture_value(value: serde_json::Value) -> Result<Self, DriverError> {
        let fixture: SimFixture = serde_json::from_value(value)
            .map_err(|e| DriverError::BadPayload(format!("page fixture: {e}")))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn from_fixture_file(path: &Path) -> Result<Self, DriverError> {
        let file = File::open(path).map_err(|e| DriverError::PageIo(e.to_string()))?;
        let reader = BufReader::new(file);
        let fixture: SimFixture = serde_json::from_reader(reader)
            .map_err(|e| DriverError::BadPayload(format!("page fixture: {e}")))?;
        debug!(path = %path.display(), elements = fixture.elements.len(), "page fixture loaded");
        Ok(Self::from_fixture(fixture))
    }

    fn from_fixture(fixture: SimFixture) -> Self {
        let page = Self::new();
        {
            let mut state = page.state.lock();
            state.elements = fixture.elements;
            state.appear_after = fixture.appear_after_polls;
        }
        page
    }

    pub fn add_element(&self, element: SimElement) {
        self.state.lock().elements.push(element);
    }

    /// Hide the element until `polls` presence checks have gone by.
    pub fn appear_after(&self, selector: impl Into<String>, polls: u32) {
        self.state.lock().appear_after.insert(selector.into(), polls);
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.state.lock().uploads.clone()
    }

    pub fn value_of(&self, selector: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .elements
            .iter()
            .find(|e| e.selector == selector)
            .map(|e| e.value.clone())
    }

    pub fn is_checked(&self, selector: &str) -> Option<bool> {
        let state = self.state.lock();
        state
            .elements
            .iter()
            .find(|e| e.selector == selector)
            .map(|e| e.checked)
    }

    pub fn options_snapshot(&self, selector: &str) -> Vec<OptionItem> {
        let state = self.state.lock();
        state
            .elements
            .iter()
            .find(|e| e.selector == selector)
            .map(|e| e.options.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageDriver for SimPage {
    async fn query(&self, selector: &str) -> Result<bool, DriverError> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.appear_after.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(false);
            }
        }
        Ok(state.position(selector).is_some())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        match element.kind {
            ControlKind::Checkbox | ControlKind::Radio | ControlKind::File => {
                Err(DriverError::WrongKind(selector.to_string()))
            }
            _ => {
                element.value = value.to_string();
                Ok(())
            }
        }
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        if element.kind == ControlKind::Checkbox {
            element.checked = !element.checked;
        }
        state.clicks.push(selector.to_string());
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        match element.kind {
            ControlKind::Checkbox | ControlKind::Radio => {
                element.checked = checked;
                Ok(())
            }
            _ => Err(DriverError::WrongKind(selector.to_string())),
        }
    }

    async fn checkboxes(
        &self,
        container: Option<&str>,
    ) -> Result<Vec<LabeledControl>, DriverError> {
        let state = self.state.lock();
        Ok(state
            .elements
            .iter()
            .filter(|e| e.kind == ControlKind::Checkbox)
            .filter(|e| match container {
                Some(scope) => e.container.as_deref() == Some(scope),
                None => true,
            })
            .map(|e| LabeledControl {
                handle: e.selector.clone(),
                label: e.label.clone(),
                data_name: e.data_name.clone(),
                section: e.section.clone(),
                checked: e.checked,
            })
            .collect())
    }

    async fn clear_checkboxes(&self) -> Result<usize, DriverError> {
        let mut state = self.state.lock();
        let mut cleared = 0;
        for element in &mut state.elements {
            if element.kind == ControlKind::Checkbox && element.checked {
                element.checked = false;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn kind_of(&self, selector: &str) -> Result<ControlKind, DriverError> {
        let mut state = self.state.lock();
        Ok(state.locate(selector)?.kind)
    }

    async fn options_of(&self, selector: &str) -> Result<Vec<OptionItem>, DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        if element.kind != ControlKind::Select {
            return Err(DriverError::WrongKind(selector.to_string()));
        }
        Ok(element.options.clone())
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        if element.kind != ControlKind::Select {
            return Err(DriverError::WrongKind(selector.to_string()));
        }
        if !element.options.iter().any(|o| o.value == value) {
            return Err(DriverError::OptionNotFound(format!("{selector} value={value}")));
        }
        element.value = value.to_string();
        Ok(())
    }

    async fn insert_option(
        &self,
        selector: &str,
        value: &str,
        label: &str,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        if element.kind != ControlKind::Select {
            return Err(DriverError::WrongKind(selector.to_string()));
        }
        element.options.insert(0, OptionItem::new(value, label));
        Ok(())
    }

    async fn upload(&self, selector: &str, file: &FilePayload) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        if element.kind != ControlKind::File {
            return Err(DriverError::WrongKind(selector.to_string()));
        }
        element.value = file.name.clone();
        let record = (selector.to_string(), file.name.clone());
        state.uploads.push(record);
        Ok(())
    }

    async fn set_rich_text(&self, selector: &str, html: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let element = state.locate(selector)?;
        if element.kind != ControlKind::RichText {
            return Err(DriverError::WrongKind(selector.to_string()));
        }
        element.value = html.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_with_form() -> SimPage {
        SimPage::with_elements(vec![
            SimElement::new("#name", ControlKind::Text),
            SimElement::new("#cb-cash", ControlKind::Checkbox).with_label("Cash"),
            SimElement::new("#cat", ControlKind::Select).with_options(vec![
                OptionItem::new("1", "Plumber"),
                OptionItem::new("2", "Electrician"),
            ]),
            SimElement::new("#logo", ControlKind::File),
        ])
    }

    #[tokio::test]
    async fn appear_after_counts_presence_checks() {
        let page = page_with_form();
        page.appear_after("#name", 2);
        assert!(!page.query("#name").await.unwrap());
        assert!(!page.query("#name").await.unwrap());
        assert!(page.query("#name").await.unwrap());
        // Actions fail while the element is still pending.
        page.appear_after("#name", 1);
        assert!(page.fill("#name", "x").await.is_err());
    }

    #[tokio::test]
    async fn fill_click_and_checkbox_semantics() {
        let page = page_with_form();
        page.fill("#name", "Acme").await.unwrap();
        assert_eq!(page.value_of("#name").as_deref(), Some("Acme"));

        page.click("#cb-cash").await.unwrap();
        assert_eq!(page.is_checked("#cb-cash"), Some(true));
        assert_eq!(page.clicks(), vec!["#cb-cash".to_string()]);

        page.set_checked("#cb-cash", false).await.unwrap();
        assert_eq!(page.is_checked("#cb-cash"), Some(false));
        assert!(page.set_checked("#name", true).await.is_err());
    }

    #[tokio::test]
    async fn select_and_insert_option() {
        let page = page_with_form();
        page.select_value("#cat", "2").await.unwrap();
        assert_eq!(page.value_of("#cat").as_deref(), Some("2"));
        assert!(page.select_value("#cat", "9").await.is_err());

        page.insert_option("#cat", "0000", "Skip Category").await.unwrap();
        let options = page.options_of("#cat").await.unwrap();
        assert_eq!(options[0].value, "0000");
        page.select_value("#cat", "0000").await.unwrap();
    }

    #[tokio::test]
    async fn upload_requires_file_control() {
        let page = page_with_form();
        let payload = FilePayload::from_data_url("logo.png", "data:image/png;base64,aGVsbG8=").unwrap();
        page.upload("#logo", &payload).await.unwrap();
        assert_eq!(page.uploads(), vec![("#logo".to_string(), "logo.png".to_string())]);
        assert!(page.upload("#name", &payload).await.is_err());
    }

    #[tokio::test]
    async fn fixture_round_trip() {
        let fixture = json!({
            "elements": [
                {"selector": "#desc", "kind": "text-area", "label": "Description"},
                {"selector": "#cb-visa", "kind": "checkbox", "label": "Credit Card",
                 "section": "Payment Methods Accepted"}
            ],
            "appear_after_polls": {"#desc": 1}
        });
        let page = SimPage::from_fixture_value(fixture).unwrap();
        assert!(!page.query("#desc").await.unwrap());
        assert!(page.query("#desc").await.unwrap());

        let boxes = page.checkboxes(None).await.unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].section.as_deref(), Some("Payment Methods Accepted"));
    }

    #[tokio::test]
    async fn scoped_checkbox_query() {
        let page = SimPage::with_elements(vec![
            SimElement::new("#sub-1", ControlKind::Checkbox)
                .with_label("Drain Cleaning")
                .with_container("ul.list-of-sub-categories"),
            SimElement::new("#other", ControlKind::Checkbox).with_label("Unrelated"),
        ]);
        let scoped = page.checkboxes(Some("ul.list-of-sub-categories")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].label, "Drain Cleaning");
    }
}
