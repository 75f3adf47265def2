//! Action dispatch: map one playbook step onto page operations.
//!
//! Handlers never pause or persist; they return a [`Handled`] outcome
//! and the run loop decides cursor movement and flow control. Driver
//! failures fold into the outcome so a bad element never kills the
//! whole run. Only cancellation and state-store failures escape as
//! errors.

use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use formpilot_core_types::DomainKey;
use formpilot_field_locator::{
    controls_to_tick, CheckboxMatcher, PaymentMethodMatcher, SubcategoryMatcher,
};
use formpilot_page_driver::{ControlKind, FilePayload, PageDriver};
use formpilot_playbooks::{
    image_key_variants, shape, ActionKind, CampaignData, FillMode, Step, RICH_EDITOR_SELECTOR,
    SKIP_CATEGORY_LABEL, SKIP_CATEGORY_VALUE,
};
use formpilot_state_store::{StateStore, BASE64_DATA_KEY};

use crate::errors::EngineError;
use crate::report::StepStatus;
use crate::waiter::{DomWaiter, WaitVerdict};

pub const DEFAULT_POPUP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DELAY_MS: u64 = 1_000;

/// Campaign field carrying the consolidated listing HTML.
pub const CONSOLIDATED_DATA_KEY: &str = "consolidatedData";

/// Everything a handler may touch while executing one step.
pub struct StepCtx<'a> {
    pub driver: &'a dyn PageDriver,
    pub store: &'a dyn StateStore,
    pub campaign: &'a CampaignData,
    pub domain: &'a DomainKey,
    pub cancel: &'a CancellationToken,
    pub waiter: &'a DomWaiter,
}

/// What a handler decided about its step.
#[derive(Clone, Debug)]
pub struct Handled {
    pub status: StepStatus,
    pub count: Option<usize>,
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl Handled {
    pub fn status(status: StepStatus) -> Self {
        Self {
            status,
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

/// Execute one step against the page.
///
/// Errors are reserved for cancellation and store failures; anything
/// the page did wrong comes back as a not-ok [`Handled`].
pub async fn dispatch_step(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    match &step.action {
        ActionKind::Fill => handle_fill(ctx, step).await,
        ActionKind::Click => handle_click(ctx, step).await,
        ActionKind::UploadImages => handle_upload_images(ctx, step).await,
        ActionKind::InitClearCheckbox => handle_clear_checkboxes(ctx).await,
        ActionKind::TickPaymentMethods => handle_tick_payment_methods(ctx).await,
        ActionKind::TickSubcategory => handle_tick_subcategory(ctx).await,
        ActionKind::SkipCategory => handle_skip_category(ctx, step).await,
        ActionKind::ConsolidateData => Ok(handle_consolidate_data(ctx)),
        ActionKind::InjectToFroala => handle_inject_consolidated(ctx, step).await,
        ActionKind::RichFill => handle_rich_fill(ctx, step).await,
        ActionKind::WaitForPopup => handle_wait_for_popup(ctx, step).await,
        ActionKind::Delay => handle_delay(ctx, step).await,
        ActionKind::Unknown(name) => {
            warn!(action = %name, "unknown action, skipping");
            Ok(Handled::status(StepStatus::Unknown))
        }
    }
}

fn missing_selector(action: &ActionKind) -> Handled {
    Handled::status(StepStatus::Error)
        .with_error(format!("{} step has no selector", action.name()))
}

async fn handle_fill(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    let Some(selector) = step.selector.as_deref() else {
        return Ok(missing_selector(&step.action));
    };

    let kind = match ctx.driver.kind_of(selector).await {
        Ok(kind) => kind,
        Err(e) => return Ok(Handled::status(StepStatus::Error).with_error(e.to_string())),
    };

    if step.fill_mode() == Some(FillMode::SkipCategory1) && kind == ControlKind::Select {
        return fill_category_select(ctx, selector).await;
    }

    let Some(value) = shape::shape_value(step, ctx.campaign) else {
        debug!(selector, value_key = ?step.value_key, "no value to fill");
        return Ok(Handled::status(StepStatus::NoValue));
    };

    let result = match kind {
        ControlKind::Select => ctx.driver.select_value(selector, &value).await,
        _ => ctx.driver.fill(selector, &value).await,
    };
    Ok(match result {
        Ok(()) => Handled::status(StepStatus::Filled).with_detail(value),
        Err(e) => Handled::status(StepStatus::Error).with_error(e.to_string()),
    })
}

/// Category select: match the citation's main category by exact option
/// label, otherwise fall back to the Skip Category option.
async fn fill_category_select(ctx: &StepCtx<'_>, selector: &str) -> Result<Handled, EngineError> {
    let category = ctx
        .campaign
        .citation_for(ctx.domain)
        .map(|c| c.main_category.trim().to_string())
        .filter(|c| !c.is_empty());

    if let Some(category) = category {
        let options = match ctx.driver.options_of(selector).await {
            Ok(options) => options,
            Err(e) => return Ok(Handled::status(StepStatus::Error).with_error(e.to_string())),
        };
        if let Some(hit) = options.iter().find(|o| o.label.trim() == category) {
            return Ok(match ctx.driver.select_value(selector, &hit.value).await {
                Ok(()) => Handled::status(StepStatus::Filled).with_detail(category),
                Err(e) => Handled::status(StepStatus::Error).with_error(e.to_string()),
            });
        }
        debug!(selector, %category, "no option for category, skipping");
    }

    Ok(match select_skip_option(ctx.driver, selector).await {
        Ok(()) => Handled::status(StepStatus::Filled).with_detail(SKIP_CATEGORY_LABEL),
        Err(e) => Handled::status(StepStatus::Error).with_error(e),
    })
}

async fn select_skip_option(driver: &dyn PageDriver, selector: &str) -> Result<(), String> {
    let options = driver
        .options_of(selector)
        .await
        .map_err(|e| e.to_string())?;
    if !options.iter().any(|o| o.value == SKIP_CATEGORY_VALUE) {
        driver
            .insert_option(selector, SKIP_CATEGORY_VALUE, SKIP_CATEGORY_LABEL)
            .await
            .map_err(|e| e.to_string())?;
    }
    driver
        .select_value(selector, SKIP_CATEGORY_VALUE)
        .await
        .map_err(|e| e.to_string())
}

async fn handle_click(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    let Some(selector) = step.selector.as_deref() else {
        return Ok(missing_selector(&step.action));
    };
    Ok(match ctx.driver.click(selector).await {
        Ok(()) => Handled::status(StepStatus::Clicked),
        Err(e) => Handled::status(StepStatus::Error).with_error(e.to_string()),
    })
}

/// Resolve the image payload for `value_key`: stored assets first, then
/// campaign images, then the variant key list over stored assets.
fn resolve_image_data(
    assets: &serde_json::Map<String, Value>,
    campaign: &CampaignData,
    value_key: &str,
) -> Option<String> {
    if let Some(data) = assets.get(value_key).and_then(Value::as_str) {
        return Some(data.to_string());
    }
    if let Some(data) = campaign.image(value_key) {
        debug!(value_key, "image found in campaign assets");
        return Some(data.to_string());
    }
    for key in image_key_variants(value_key) {
        if let Some(data) = assets.get(key.as_str()).and_then(Value::as_str) {
            debug!(value_key, variant = %key, "image found under variant key");
            return Some(data.to_string());
        }
    }
    None
}

async fn handle_upload_images(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    let Some(selector) = step.selector.as_deref() else {
        return Ok(missing_selector(&step.action));
    };
    let Some(value_key) = step.value_key.as_deref() else {
        return Ok(Handled::status(StepStatus::NoImage).with_detail("step has no valueKey"));
    };

    let assets = match ctx.store.get(BASE64_DATA_KEY).await? {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    let Some(data_url) = resolve_image_data(&assets, ctx.campaign, value_key) else {
        warn!(value_key, "no image payload found");
        return Ok(Handled::status(StepStatus::NoImage).with_detail(value_key));
    };

    let payload = match FilePayload::from_data_url(format!("{value_key}.png"), &data_url) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(value_key, error = %e, "image payload is not a usable data URL");
            return Ok(Handled::status(StepStatus::Error).with_error(e.to_string()));
        }
    };

    Ok(match ctx.driver.upload(selector, &payload).await {
        Ok(()) => Handled::status(StepStatus::Uploaded).with_detail(payload.name),
        Err(e) => Handled::status(StepStatus::Error).with_error(e.to_string()),
    })
}

async fn handle_clear_checkboxes(ctx: &StepCtx<'_>) -> Result<Handled, EngineError> {
    Ok(match ctx.driver.clear_checkboxes().await {
        Ok(count) => Handled::status(StepStatus::CheckboxesCleared).with_count(count),
        Err(e) => Handled::status(StepStatus::Error).with_error(e.to_string()),
    })
}

async fn tick_matching(
    ctx: &StepCtx<'_>,
    matcher: &dyn CheckboxMatcher,
) -> Result<usize, String> {
    let controls = ctx
        .driver
        .checkboxes(matcher.scope())
        .await
        .map_err(|e| e.to_string())?;
    let claimed = controls_to_tick(matcher, &controls);
    let mut ticked = 0;
    for control in claimed {
        ctx.driver
            .set_checked(&control.handle, true)
            .await
            .map_err(|e| e.to_string())?;
        ticked += 1;
    }
    Ok(ticked)
}

async fn handle_tick_payment_methods(ctx: &StepCtx<'_>) -> Result<Handled, EngineError> {
    Ok(match tick_matching(ctx, &PaymentMethodMatcher).await {
        Ok(count) => Handled::status(StepStatus::PaymentMethodsTicked).with_count(count),
        Err(e) => Handled::status(StepStatus::Error).with_error(e),
    })
}

async fn handle_tick_subcategory(ctx: &StepCtx<'_>) -> Result<Handled, EngineError> {
    let subcategory = ctx
        .campaign
        .citation_for(ctx.domain)
        .map(|c| c.sub_category.trim().to_string())
        .filter(|s| !s.is_empty());

    let Some(subcategory) = subcategory else {
        debug!(domain = %ctx.domain, "no subcategory for domain");
        return Ok(Handled::status(StepStatus::SubcategoryTicked).with_count(0));
    };

    let matcher = SubcategoryMatcher::new(&subcategory);
    Ok(match tick_matching(ctx, &matcher).await {
        Ok(count) => Handled::status(StepStatus::SubcategoryTicked)
            .with_count(count)
            .with_detail(subcategory),
        Err(e) => Handled::status(StepStatus::Error).with_error(e),
    })
}

async fn handle_skip_category(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    let Some(selector) = step.selector.as_deref() else {
        return Ok(missing_selector(&step.action));
    };
    match ctx.driver.kind_of(selector).await {
        Ok(ControlKind::Select) => {}
        Ok(kind) => {
            return Ok(Handled::status(StepStatus::SkipCategoryFailed)
                .with_error(format!("{selector} is {kind:?}, not a select")));
        }
        Err(e) => {
            return Ok(Handled::status(StepStatus::SkipCategoryFailed).with_error(e.to_string()))
        }
    }
    Ok(match select_skip_option(ctx.driver, selector).await {
        Ok(()) => Handled::status(StepStatus::CategorySkipped),
        Err(e) => Handled::status(StepStatus::SkipCategoryFailed).with_error(e),
    })
}

/// The consolidation engine runs outside; the step only checks the
/// campaign already carries its output.
fn handle_consolidate_data(ctx: &StepCtx<'_>) -> Handled {
    match ctx
        .campaign
        .get_str(CONSOLIDATED_DATA_KEY)
        .filter(|html| !html.is_empty())
    {
        Some(html) => Handled::status(StepStatus::DataConsolidated)
            .with_detail(format!("{} chars", html.chars().count())),
        None => Handled::status(StepStatus::ConsolidationFailed)
            .with_error("campaign has no consolidated data"),
    }
}

async fn inject_html(
    ctx: &StepCtx<'_>,
    step: &Step,
    html: &str,
) -> Result<Handled, EngineError> {
    let selector = step.selector.as_deref().unwrap_or(RICH_EDITOR_SELECTOR);
    Ok(match ctx.driver.set_rich_text(selector, html).await {
        Ok(()) => Handled::status(StepStatus::Injected),
        Err(e) => Handled::status(StepStatus::InjectionFailed).with_error(e.to_string()),
    })
}

async fn handle_inject_consolidated(
    ctx: &StepCtx<'_>,
    step: &Step,
) -> Result<Handled, EngineError> {
    let Some(html) = ctx
        .campaign
        .get_str(CONSOLIDATED_DATA_KEY)
        .filter(|html| !html.is_empty())
    else {
        return Ok(Handled::status(StepStatus::InjectionFailed)
            .with_error("campaign has no consolidated data"));
    };
    inject_html(ctx, step, &html).await
}

async fn handle_rich_fill(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    let Some(key) = step.value_key.as_deref().or(step.value.as_deref()) else {
        return Ok(
            Handled::status(StepStatus::InjectionFailed).with_error("step names no html source")
        );
    };
    let Some(html) = ctx.campaign.get_str(key).filter(|html| !html.is_empty()) else {
        return Ok(Handled::status(StepStatus::InjectionFailed)
            .with_error(format!("campaign has no '{key}'")));
    };
    inject_html(ctx, step, &html).await
}

fn step_millis(step: &Step, default: u64) -> u64 {
    step.value
        .as_deref()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

async fn handle_wait_for_popup(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    let Some(selector) = step.selector.as_deref() else {
        return Ok(missing_selector(&step.action));
    };
    let deadline = Duration::from_millis(step_millis(step, DEFAULT_POPUP_TIMEOUT_MS));

    let verdict = match ctx
        .waiter
        .wait_for(ctx.driver, selector, Some(deadline), ctx.cancel)
        .await
    {
        Ok(verdict) => verdict,
        Err(e) => return Ok(Handled::status(StepStatus::Error).with_error(e.to_string())),
    };
    match verdict {
        WaitVerdict::Found => Ok(Handled::status(StepStatus::PopupFound)),
        WaitVerdict::TimedOut => Ok(Handled::status(StepStatus::PopupTimeout)
            .with_error(format!("popup did not appear: {selector}"))),
        WaitVerdict::Cancelled => Err(EngineError::Aborted),
    }
}

async fn handle_delay(ctx: &StepCtx<'_>, step: &Step) -> Result<Handled, EngineError> {
    let ms = step_millis(step, DEFAULT_DELAY_MS);
    tokio::select! {
        _ = ctx.cancel.cancelled() => Err(EngineError::Aborted),
        _ = sleep(Duration::from_millis(ms)) => {
            Ok(Handled::status(StepStatus::Delayed).with_detail(format!("{ms}ms")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_page_driver::{OptionItem, SimElement, SimPage};
    use formpilot_state_store::MemoryStateStore;
    use serde_json::json;

    fn step(action: &str, selector: Option<&str>) -> Step {
        serde_json::from_value(json!({
            "action": action,
            "selector": selector,
        }))
        .unwrap()
    }

    fn step_with(fields: Value) -> Step {
        serde_json::from_value(fields).unwrap()
    }

    struct Fixture {
        page: SimPage,
        store: MemoryStateStore,
        campaign: CampaignData,
        domain: DomainKey,
        cancel: CancellationToken,
        waiter: DomWaiter,
    }

    impl Fixture {
        fn new(page: SimPage) -> Self {
            Self {
                page,
                store: MemoryStateStore::new(),
                campaign: CampaignData::default(),
                domain: DomainKey::from_host("example.com"),
                cancel: CancellationToken::new(),
                waiter: DomWaiter::new(),
            }
        }

        fn ctx(&self) -> StepCtx<'_> {
            StepCtx {
                driver: &self.page,
                store: &self.store,
                campaign: &self.campaign,
                domain: &self.domain,
                cancel: &self.cancel,
                waiter: &self.waiter,
            }
        }
    }

    fn campaign(fields: Value) -> CampaignData {
        CampaignData::from_value(fields).unwrap()
    }

    #[tokio::test]
    async fn fill_sets_shaped_campaign_value() {
        let mut fx = Fixture::new(SimPage::with_elements(vec![SimElement::new(
            "#name",
            ControlKind::Text,
        )]));
        fx.campaign = campaign(json!({"businessName": "Acme Plumbing"}));

        let step = step_with(json!({
            "action": "fill",
            "selector": "#name",
            "valueKey": "businessName"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();

        assert_eq!(handled.status, StepStatus::Filled);
        assert_eq!(fx.page.value_of("#name").as_deref(), Some("Acme Plumbing"));
    }

    #[tokio::test]
    async fn fill_without_value_reports_no_value() {
        let fx = Fixture::new(SimPage::with_elements(vec![SimElement::new(
            "#name",
            ControlKind::Text,
        )]));
        let step = step_with(json!({
            "action": "fill",
            "selector": "#name",
            "valueKey": "missing"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::NoValue);
        assert_eq!(fx.page.value_of("#name").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn fill_on_select_uses_option_selection() {
        let page = SimPage::with_elements(vec![SimElement::new("#state", ControlKind::Select)
            .with_options(vec![
                OptionItem::new("TX", "Texas"),
                OptionItem::new("AZ", "Arizona"),
            ])]);
        let mut fx = Fixture::new(page);
        fx.campaign = campaign(json!({"state": "TX"}));

        let step = step_with(json!({
            "action": "fill",
            "selector": "#state",
            "valueKey": "state"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::Filled);
        assert_eq!(fx.page.value_of("#state").as_deref(), Some("TX"));
    }

    #[tokio::test]
    async fn category_select_matches_citation_label() {
        let page = SimPage::with_elements(vec![SimElement::new("#category", ControlKind::Select)
            .with_options(vec![
                OptionItem::new("1", "Electrician"),
                OptionItem::new("2", "Plumber"),
            ])]);
        let mut fx = Fixture::new(page);
        fx.campaign = campaign(json!({
            "citations": [{"site": "www.Example.com", "mainCategory": "Plumber"}]
        }));

        let step = step_with(json!({
            "action": "fill",
            "selector": "#category",
            "mode": "skipCategory1"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::Filled);
        assert_eq!(fx.page.value_of("#category").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn category_select_falls_back_to_skip_option() {
        let page = SimPage::with_elements(vec![SimElement::new("#category", ControlKind::Select)
            .with_options(vec![OptionItem::new("1", "Electrician")])]);
        let mut fx = Fixture::new(page);
        fx.campaign = campaign(json!({
            "citations": [{"site": "other-site.com", "mainCategory": "Plumber"}]
        }));

        let step = step_with(json!({
            "action": "fill",
            "selector": "#category",
            "mode": "skipCategory1"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();

        assert_eq!(handled.status, StepStatus::Filled);
        assert_eq!(fx.page.value_of("#category").as_deref(), Some(SKIP_CATEGORY_VALUE));
        let options = fx.page.options_snapshot("#category");
        assert_eq!(options[0].label, SKIP_CATEGORY_LABEL);
    }

    #[tokio::test]
    async fn click_reports_clicked() {
        let fx = Fixture::new(SimPage::with_elements(vec![SimElement::new(
            "#go",
            ControlKind::Button,
        )]));
        let handled = dispatch_step(&fx.ctx(), &step("click", Some("#go")))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::Clicked);
        assert_eq!(fx.page.clicks(), vec!["#go".to_string()]);
    }

    #[tokio::test]
    async fn upload_resolves_stored_asset_by_value_key() {
        let page =
            SimPage::with_elements(vec![SimElement::new("#logo-input", ControlKind::File)]);
        let fx = Fixture::new(page);
        fx.store
            .put(
                BASE64_DATA_KEY,
                json!({"logoBox": "data:image/png;base64,aGVsbG8="}),
            )
            .await
            .unwrap();

        let step = step_with(json!({
            "action": "uploadImages",
            "selector": "#logo-input",
            "valueKey": "logoBox"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();

        assert_eq!(handled.status, StepStatus::Uploaded);
        assert_eq!(
            fx.page.uploads(),
            vec![("#logo-input".to_string(), "logoBox.png".to_string())]
        );
    }

    #[tokio::test]
    async fn upload_falls_back_to_variant_keys() {
        let page =
            SimPage::with_elements(vec![SimElement::new("#logo-input", ControlKind::File)]);
        let fx = Fixture::new(page);
        fx.store
            .put(BASE64_DATA_KEY, json!({"logo": "data:image/png;base64,aGVsbG8="}))
            .await
            .unwrap();

        let step = step_with(json!({
            "action": "uploadImages",
            "selector": "#logo-input",
            "valueKey": "logoBox"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::Uploaded);
    }

    #[tokio::test]
    async fn upload_without_payload_is_no_image() {
        let page =
            SimPage::with_elements(vec![SimElement::new("#logo-input", ControlKind::File)]);
        let fx = Fixture::new(page);
        let step = step_with(json!({
            "action": "uploadImages",
            "selector": "#logo-input",
            "valueKey": "logoBox"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::NoImage);
        assert!(handled.status.is_ok());
    }

    #[tokio::test]
    async fn upload_with_malformed_data_url_is_an_error_outcome() {
        let page =
            SimPage::with_elements(vec![SimElement::new("#logo-input", ControlKind::File)]);
        let fx = Fixture::new(page);
        fx.store
            .put(BASE64_DATA_KEY, json!({"logoBox": "not-a-data-url"}))
            .await
            .unwrap();

        let step = step_with(json!({
            "action": "uploadImages",
            "selector": "#logo-input",
            "valueKey": "logoBox"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::Error);
        assert!(handled.error.is_some());
        assert!(fx.page.uploads().is_empty());
    }

    #[tokio::test]
    async fn tick_payment_methods_counts_claimed_boxes() {
        let page = SimPage::with_elements(vec![
            SimElement::new("#pay-1", ControlKind::Checkbox).with_label("Credit Card"),
            SimElement::new("#pay-2", ControlKind::Checkbox)
                .with_label("PayPal")
                .checked(),
            SimElement::new("#other", ControlKind::Checkbox).with_label("Newsletter"),
        ]);
        let fx = Fixture::new(page);
        let handled = dispatch_step(&fx.ctx(), &step("tickPaymentMethods", None))
            .await
            .unwrap();

        assert_eq!(handled.status, StepStatus::PaymentMethodsTicked);
        assert_eq!(handled.count, Some(1));
        assert!(fx.page.is_checked("#pay-1").unwrap());
        assert!(!fx.page.is_checked("#other").unwrap());
    }

    #[tokio::test]
    async fn tick_subcategory_without_citation_counts_zero() {
        let fx = Fixture::new(SimPage::with_elements(vec![]));
        let handled = dispatch_step(&fx.ctx(), &step("tickSubcategory", None))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::SubcategoryTicked);
        assert_eq!(handled.count, Some(0));
    }

    #[tokio::test]
    async fn tick_subcategory_scopes_to_container() {
        let page = SimPage::with_elements(vec![
            SimElement::new("#sub-1", ControlKind::Checkbox)
                .with_label("Drain Cleaning")
                .with_container("ul.list-of-sub-categories"),
            SimElement::new("#stray", ControlKind::Checkbox).with_label("Drain Cleaning"),
        ]);
        let mut fx = Fixture::new(page);
        fx.campaign = campaign(json!({
            "citations": [{"site": "example.com", "subCategory": "Drain Cleaning"}]
        }));

        let handled = dispatch_step(&fx.ctx(), &step("tickSubcategory", None))
            .await
            .unwrap();
        assert_eq!(handled.count, Some(1));
        assert!(fx.page.is_checked("#sub-1").unwrap());
        assert!(!fx.page.is_checked("#stray").unwrap());
    }

    #[tokio::test]
    async fn skip_category_rejects_non_select() {
        let fx = Fixture::new(SimPage::with_elements(vec![SimElement::new(
            "#cat",
            ControlKind::Text,
        )]));
        let handled = dispatch_step(&fx.ctx(), &step("skipCategory", Some("#cat")))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::SkipCategoryFailed);
        assert!(!handled.status.is_ok());
    }

    #[tokio::test]
    async fn skip_category_inserts_and_selects_sentinel() {
        let page = SimPage::with_elements(vec![SimElement::new("#cat", ControlKind::Select)
            .with_options(vec![OptionItem::new("1", "Electrician")])]);
        let fx = Fixture::new(page);
        let handled = dispatch_step(&fx.ctx(), &step("skipCategory", Some("#cat")))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::CategorySkipped);
        assert_eq!(fx.page.value_of("#cat").as_deref(), Some(SKIP_CATEGORY_VALUE));
    }

    #[tokio::test]
    async fn consolidate_data_reflects_campaign_payload() {
        let mut fx = Fixture::new(SimPage::with_elements(vec![]));
        fx.campaign = campaign(json!({"consolidatedData": "<p>About us</p>"}));
        let handled = dispatch_step(&fx.ctx(), &step("consolidateData", None))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::DataConsolidated);

        fx.campaign = CampaignData::default();
        let handled = dispatch_step(&fx.ctx(), &step("consolidateData", None))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::ConsolidationFailed);
    }

    #[tokio::test]
    async fn inject_uses_default_rich_editor_selector() {
        let page = SimPage::with_elements(vec![SimElement::new(
            RICH_EDITOR_SELECTOR,
            ControlKind::RichText,
        )]);
        let mut fx = Fixture::new(page);
        fx.campaign = campaign(json!({"consolidatedData": "<p>About us</p>"}));

        let handled = dispatch_step(&fx.ctx(), &step("injectToFroala", None))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::Injected);
        assert_eq!(
            fx.page.value_of(RICH_EDITOR_SELECTOR).as_deref(),
            Some("<p>About us</p>")
        );
    }

    #[tokio::test]
    async fn rich_fill_follows_value_key_source() {
        let page =
            SimPage::with_elements(vec![SimElement::new("#editor", ControlKind::RichText)]);
        let mut fx = Fixture::new(page);
        fx.campaign = campaign(json!({"aboutHtml": "<b>Hi</b>"}));

        let step = step_with(json!({
            "action": "richFill",
            "selector": "#editor",
            "valueKey": "aboutHtml"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::Injected);
        assert_eq!(fx.page.value_of("#editor").as_deref(), Some("<b>Hi</b>"));
    }

    #[tokio::test]
    async fn rich_fill_without_source_fails_injection() {
        let fx = Fixture::new(SimPage::with_elements(vec![]));
        let handled = dispatch_step(&fx.ctx(), &step("richFill", Some("#editor")))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::InjectionFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn popup_wait_times_out_with_popup_timeout() {
        let fx = Fixture::new(SimPage::with_elements(vec![]));
        let step = step_with(json!({
            "action": "waitForPopup",
            "selector": "#popup",
            "value": "250"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::PopupTimeout);
        assert!(!handled.status.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn popup_wait_finds_late_popup() {
        let page = SimPage::with_elements(vec![SimElement::new("#popup", ControlKind::Other)]);
        page.appear_after("#popup", 2);
        let fx = Fixture::new(page);
        let step = step_with(json!({
            "action": "waitForPopup",
            "selector": "#popup"
        }));
        let handled = dispatch_step(&fx.ctx(), &step).await.unwrap();
        assert_eq!(handled.status, StepStatus::PopupFound);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_honors_cancellation() {
        let fx = Fixture::new(SimPage::with_elements(vec![]));
        fx.cancel.cancel();
        let step = step_with(json!({"action": "delay", "value": "5000"}));
        let result = dispatch_step(&fx.ctx(), &step).await;
        assert!(matches!(result, Err(EngineError::Aborted)));
    }

    #[tokio::test]
    async fn unknown_action_is_reported_and_soft() {
        let fx = Fixture::new(SimPage::with_elements(vec![]));
        let handled = dispatch_step(&fx.ctx(), &step("fillAllTheThings", None))
            .await
            .unwrap();
        assert_eq!(handled.status, StepStatus::Unknown);
        assert!(handled.status.is_ok());
    }
}
