//! Control descriptions shared between drivers and the engine.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::DriverError;

/// What a selector resolved to, as far as driving it is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    Text,
    TextArea,
    Checkbox,
    Radio,
    Select,
    File,
    RichText,
    Button,
    Other,
}

impl ControlKind {
    pub fn is_text_like(&self) -> bool {
        matches!(self, Self::Text | Self::TextArea | Self::RichText)
    }
}

/// A checkbox (or similar) with the page context matchers need: its
/// visible label, optional `data-name`, and the text of the nearest
/// labeled section it sits in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabeledControl {
    pub handle: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data_name: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub checked: bool,
}

/// One `<option>` of a select.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: String,
    pub label: String,
}

impl OptionItem {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Decoded file ready for an upload control.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    /// Decode a `data:` URL (`data:image/png;base64,...`). Payloads
    /// without the base64 marker are taken as raw text.
    pub fn from_data_url(name: impl Into<String>, data_url: &str) -> Result<Self, DriverError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| DriverError::BadPayload("missing data: scheme".into()))?;
        let (header, body) = rest
            .split_once(',')
            .ok_or_else(|| DriverError::BadPayload("missing payload separator".into()))?;

        let (mime, is_base64) = match header.strip_suffix(";base64") {
            Some(mime) => (mime, true),
            None => (header, false),
        };
        let bytes = if is_base64 {
            STANDARD
                .decode(body)
                .map_err(|e| DriverError::BadPayload(format!("base64: {e}")))?
        } else {
            body.as_bytes().to_vec()
        };

        Ok(Self {
            name: name.into(),
            mime: if mime.is_empty() {
                "application/octet-stream".to_string()
            } else {
                mime.to_string()
            },
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePayload")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
