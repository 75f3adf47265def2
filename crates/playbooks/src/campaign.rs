//! Campaign data: the field bag a playbook pulls values from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use formpilot_core_types::DomainKey;

/// One listing-site citation entry. Category steps look the current
/// domain up here to pick the real option instead of the skip marker.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub main_category: String,
    #[serde(default)]
    pub sub_category: String,
}

/// Flat field map plus citations, as persisted under the `campaignData`
/// state key. Some exports wrap the payload in an outer `campaignData`
/// object; [`CampaignData::from_value`] accepts both shapes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CampaignData {
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
    /// Image assets bundled with the campaign, field name to data URL.
    #[serde(default)]
    pub images: HashMap<String, String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl CampaignData {
    pub fn from_value(value: Value) -> Option<Self> {
        let inner = match value {
            Value::Object(mut map) => match map.remove("campaignData") {
                Some(Value::Object(mut nested)) => {
                    // citations and images may sit beside the nested payload
                    for sibling in ["citations", "images"] {
                        if !nested.contains_key(sibling) {
                            if let Some(value) = map.remove(sibling) {
                                nested.insert(sibling.to_string(), value);
                            }
                        }
                    }
                    Value::Object(nested)
                }
                Some(other) => {
                    map.insert("campaignData".into(), other);
                    Value::Object(map)
                }
                None => Value::Object(map),
            },
            _ => return None,
        };
        serde_json::from_value(inner).ok()
    }

    /// Like [`Self::from_value`], but also unwraps the id-keyed
    /// envelope persisted stores use (`{"<campaign id>": {...}}`).
    pub fn from_stored(value: Value) -> Option<Self> {
        if let Value::Object(map) = &value {
            let looks_wrapped = map.len() == 1
                && !map.contains_key("campaignData")
                && !map.contains_key("citations");
            if looks_wrapped {
                if let Some(inner) = map.values().next().filter(|v| v.is_object()) {
                    return Self::from_value(inner.clone());
                }
            }
        }
        Self::from_value(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String form of a field. Numbers and booleans are stringified;
    /// null and missing read as absent.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn image(&self, key: &str) -> Option<&str> {
        self.images.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.images.is_empty() && self.citations.is_empty()
    }

    pub fn citation_for(&self, domain: &DomainKey) -> Option<&Citation> {
        self.citations
            .iter()
            .find(|c| DomainKey::from_host(&c.site) == *domain)
    }
}

/// Keys tried, in order, when an upload step's `valueKey` has no stored
/// image under its own name. `LogoBox` falls through `logobox`, `Logo`,
/// `LogoImage`, then the generic logo/image names.
pub fn image_key_variants(value_key: &str) -> SmallVec<[String; 8]> {
    let mut keys: SmallVec<[String; 8]> = SmallVec::new();
    let mut push = |key: String| {
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    };
    push(value_key.to_string());
    push(value_key.to_lowercase());
    push(value_key.replace("Box", ""));
    push(value_key.replace("Box", "Image"));
    push("logo".to_string());
    push("logoImage".to_string());
    push("image".to_string());
    push("image1".to_string());
    keys
}
