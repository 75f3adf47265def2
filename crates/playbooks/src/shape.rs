//! Value shaping: how a step's logical field becomes the text that is
//! actually written into a control.

use crate::campaign::CampaignData;
use crate::model::{AddressMode, FillMode, Step};

/// Raw field lookup with the `alternative` fallback: an empty or missing
/// primary value falls through to the alternative key when one is named.
pub fn resolve_raw(step: &Step, campaign: &CampaignData) -> Option<String> {
    let primary = step
        .value_key
        .as_deref()
        .and_then(|key| campaign.get_str(key))
        .filter(|v| !v.is_empty());
    if primary.is_some() {
        return primary;
    }
    step.alternative
        .as_deref()
        .and_then(|alt| campaign.get_str(alt))
        .filter(|v| !v.is_empty())
}

/// Full shaping pipeline for a fill step. `None` means there is nothing
/// to write and the step should report `no-value`.
pub fn shape_value(step: &Step, campaign: &CampaignData) -> Option<String> {
    // An inline literal bypasses the campaign entirely.
    if let Some(literal) = &step.value {
        return Some(literal.clone());
    }
    match step.fill_mode() {
        None | Some(FillMode::Required) => resolve_raw(step, campaign),
        Some(FillMode::Limit) => {
            let value = resolve_raw(step, campaign)?;
            Some(match step.limit() {
                Some(limit) => clip_to_limit(&value, limit),
                None => value,
            })
        }
        Some(FillMode::LimitBySentence) => {
            let value = resolve_raw(step, campaign)?;
            Some(match step.limit() {
                Some(limit) => clip_by_sentence(&value, limit),
                None => value,
            })
        }
        Some(FillMode::Address) => {
            let mode = step.address_mode.unwrap_or(AddressMode::ShowAddress);
            Some(address_value(mode, step.required, campaign))
        }
        // Select handling, not text shaping.
        Some(FillMode::SkipCategory1) => None,
    }
}

/// Hard clip at `limit` characters.
pub fn clip_to_limit(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Clip at the last sentence boundary inside the first `limit`
/// characters; hard clip when no period falls in range.
pub fn clip_by_sentence(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    match head.rfind('.') {
        Some(idx) => head[..=idx].to_string(),
        None => head,
    }
}

/// The address string for each disclosure mode. `required` only matters
/// for [`AddressMode::AddressLine1`], which otherwise hides the field.
pub fn address_value(mode: AddressMode, required: bool, campaign: &CampaignData) -> String {
    let part = |key: &str| campaign.get_str(key).filter(|v| !v.is_empty());
    match mode {
        AddressMode::ShowAddress => {
            let parts: Vec<String> = ["addressLine1", "addressLine2", "city", "state", "zipcode", "country"]
                .iter()
                .filter_map(|key| part(key))
                .collect();
            parts.join(", ")
        }
        AddressMode::FullHide => String::new(),
        AddressMode::AddressLine1 => {
            if required {
                part("serviceArea")
                    .or_else(|| part("addressLine1"))
                    .unwrap_or_default()
            } else {
                String::new()
            }
        }
    }
}
