//! Page extraction pipeline
//!
//! Runs the ordered extraction steps against one live page. Navigation is the
//! only step whose failure aborts the attempt; every later step produces a
//! `StepOutcome`, falling back to a documented default when it fails.

use crate::browser::{RequestLog, ScrapePage};
use crate::normalize::{default_palette, expect_object, merge_assets, normalize_css, normalize_palette};
use crate::result::{AssetCatalog, CssInfo, RawExtraction};
use crate::sanitize::sanitize_or_raw;
use crate::scripts::{Capability, ScriptBundle};
use crate::{
    DiagnosticSink, ExtractionStep, LogLevel, ScrapeError, ScraperConfig, SCREENSHOT_VIEWPORTS,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::sleep;

/// Result of one extraction step: the extracted value, or the step's default
/// together with the error that forced it.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Extracted(T),
    Defaulted { value: T, error: ScrapeError },
}

impl<T> StepOutcome<T> {
    pub fn from_result(result: Result<T, ScrapeError>, default: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => StepOutcome::Extracted(value),
            Err(error) => StepOutcome::Defaulted {
                value: default(),
                error,
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StepOutcome::Defaulted { .. })
    }

    pub fn error(&self) -> Option<&ScrapeError> {
        match self {
            StepOutcome::Extracted(_) => None,
            StepOutcome::Defaulted { error, .. } => Some(error),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StepOutcome::Extracted(value) => value,
            StepOutcome::Defaulted { value, .. } => value,
        }
    }
}

pub fn default_typography() -> Map<String, Value> {
    json_object(json!({ "fonts": [], "headings": {}, "body_text": {} }))
}

pub fn default_layout() -> Map<String, Value> {
    json_object(json!({ "structure": [], "grid_info": {} }))
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct PageExtractor {
    config: ScraperConfig,
    scripts: ScriptBundle,
    sink: Arc<dyn DiagnosticSink>,
}

impl PageExtractor {
    pub fn new(config: ScraperConfig, scripts: ScriptBundle, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            scripts,
            sink,
        }
    }

    /// Runs every step against `page` and closes it afterwards, whatever the outcome.
    pub async fn extract(&self, page: &dyn ScrapePage, url: &str) -> Result<RawExtraction, ScrapeError> {
        let outcome = self.run_steps(page, url).await;

        if let Err(e) = page.close().await {
            self.sink
                .log(LogLevel::Warn, &format!("Failed to close page: {}", e));
        }

        outcome
    }

    async fn run_steps(&self, page: &dyn ScrapePage, url: &str) -> Result<RawExtraction, ScrapeError> {
        let requests = RequestLog::new();
        if let Err(e) = page.observe_requests(requests.clone()).await {
            self.sink.log(
                LogLevel::Warn,
                &format!("Request observation unavailable, assets limited to DOM: {}", e),
            );
        }

        page.goto(url, self.config.navigation_timeout).await?;

        self.inject_scripts(page).await;
        sleep(self.config.settle_delay).await;

        let screenshots = StepOutcome::from_result(self.capture_screenshots(page).await, BTreeMap::new);
        let dom = StepOutcome::from_result(self.snapshot_dom(page).await, String::new);
        let css = StepOutcome::from_result(self.extract_css(page).await, CssInfo::default);
        let colors = StepOutcome::from_result(self.extract_colors(page).await, default_palette);
        let typography = StepOutcome::from_result(
            self.extract_object(page, Capability::Typography, ExtractionStep::Typography)
                .await,
            default_typography,
        );
        let layout = StepOutcome::from_result(
            self.extract_object(page, Capability::LayoutInfo, ExtractionStep::Layout)
                .await,
            default_layout,
        );
        let assets = StepOutcome::from_result(self.extract_assets(page, &requests).await, AssetCatalog::default);
        let metadata = StepOutcome::from_result(
            self.extract_object(page, Capability::Metadata, ExtractionStep::Metadata)
                .await,
            Map::new,
        );

        let errors = [
            screenshots.error(),
            dom.error(),
            css.error(),
            colors.error(),
            typography.error(),
            layout.error(),
            assets.error(),
            metadata.error(),
        ];
        let mut degraded_steps = 0;
        for error in errors.into_iter().flatten() {
            degraded_steps += 1;
            self.sink.log(LogLevel::Error, &error.to_string());
        }

        Ok(RawExtraction {
            screenshots: screenshots.into_value(),
            dom_structure: dom.into_value(),
            extracted_css: css.into_value(),
            color_palette: colors.into_value(),
            typography: typography.into_value(),
            layout_info: layout.into_value(),
            assets: assets.into_value(),
            metadata: metadata.into_value(),
            degraded_steps,
        })
    }

    async fn inject_scripts(&self, page: &dyn ScrapePage) {
        for script in self.scripts.scripts() {
            if let Err(e) = page.inject_script(script).await {
                self.sink.log(
                    LogLevel::Warn,
                    &format!("Failed to inject {}: {}", script.name, e),
                );
            }
        }
    }

    /// All viewports or none: a failure at any viewport discards the set.
    async fn capture_screenshots(
        &self,
        page: &dyn ScrapePage,
    ) -> Result<BTreeMap<String, String>, ScrapeError> {
        let mut screenshots = BTreeMap::new();

        for (name, viewport) in SCREENSHOT_VIEWPORTS.iter() {
            page.set_viewport(viewport)
                .await
                .map_err(|e| ScrapeError::step(ExtractionStep::Screenshots, e))?;
            sleep(self.config.reflow_delay).await;

            let png = page
                .screenshot_full_page()
                .await
                .map_err(|e| ScrapeError::step(ExtractionStep::Screenshots, e))?;
            screenshots.insert(name.to_string(), general_purpose::STANDARD.encode(png));
        }

        Ok(screenshots)
    }

    async fn snapshot_dom(&self, page: &dyn ScrapePage) -> Result<String, ScrapeError> {
        let html = page
            .content()
            .await
            .map_err(|e| ScrapeError::step(ExtractionStep::Dom, e))?;

        let (dom, error) = sanitize_or_raw(html);
        if let Some(e) = error {
            self.sink
                .log(LogLevel::Error, &format!("DOM cleaning failed: {}", e));
        }
        Ok(dom)
    }

    async fn invoke(
        &self,
        page: &dyn ScrapePage,
        capability: Capability,
        step: ExtractionStep,
    ) -> Result<Value, ScrapeError> {
        page.invoke(capability)
            .await
            .map_err(|e| ScrapeError::step(step, e))
    }

    async fn extract_css(&self, page: &dyn ScrapePage) -> Result<CssInfo, ScrapeError> {
        let raw = self.invoke(page, Capability::CssInfo, ExtractionStep::Css).await?;
        normalize_css(&raw)
    }

    async fn extract_colors(&self, page: &dyn ScrapePage) -> Result<Vec<String>, ScrapeError> {
        let raw = self
            .invoke(page, Capability::ColorPalette, ExtractionStep::Colors)
            .await?;
        let palette = normalize_palette(&raw)?;
        self.sink.log(
            LogLevel::Debug,
            &format!("Extracted {} colors: {:?}", palette.len(), palette),
        );
        Ok(palette)
    }

    async fn extract_object(
        &self,
        page: &dyn ScrapePage,
        capability: Capability,
        step: ExtractionStep,
    ) -> Result<Map<String, Value>, ScrapeError> {
        let raw = self.invoke(page, capability, step).await?;
        expect_object(step, raw)
    }

    async fn extract_assets(
        &self,
        page: &dyn ScrapePage,
        requests: &RequestLog,
    ) -> Result<AssetCatalog, ScrapeError> {
        let dom_assets = self.invoke(page, Capability::Assets, ExtractionStep::Assets).await?;
        let (catalog, unknown) = merge_assets(&dom_assets, &requests.snapshot())?;

        for category in unknown {
            self.sink.log(
                LogLevel::Debug,
                &format!("Ignoring unknown asset category '{}'", category),
            );
        }
        Ok(catalog)
    }
}
