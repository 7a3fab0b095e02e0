//! Scrape result record and its assembly
//!
//! Every field of `ScrapingResult` is always present; failure is signalled
//! only through `success` and `error_message`, never through missing fields.

use crate::browser::ResourceCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub type StyleMap = BTreeMap<String, String>;

/// Style findings reported by the CSS capability, after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CssInfo {
    pub body_styles: StyleMap,
    pub header_styles: StyleMap,
    pub main_content_styles: StyleMap,
    pub common_patterns: Vec<StylePattern>,
    pub layout_info: Map<String, Value>,
    pub responsive_breakpoints: Vec<Value>,
    pub animations: Vec<Value>,
    /// Keys returned by the page that have no dedicated field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CssInfo {
    pub fn is_empty(&self) -> bool {
        self.body_styles.is_empty()
            && self.header_styles.is_empty()
            && self.main_content_styles.is_empty()
            && self.common_patterns.is_empty()
            && self.layout_info.is_empty()
            && self.responsive_breakpoints.is_empty()
            && self.animations.is_empty()
            && self.extra.is_empty()
    }
}

/// A selector whose elements repeat with shared computed styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylePattern {
    pub selector: String,
    pub styles: StyleMap,
    #[serde(default = "default_pattern_count")]
    pub count: u64,
}

fn default_pattern_count() -> u64 {
    1
}

/// Asset URLs bucketed by category, deduplicated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetCatalog {
    pub images: Vec<String>,
    pub stylesheets: Vec<String>,
    pub fonts: Vec<String>,
    pub icons: Vec<String>,
    pub scripts: Vec<String>,
}

impl AssetCatalog {
    pub const CATEGORIES: [&'static str; 5] = ["images", "stylesheets", "fonts", "icons", "scripts"];

    pub fn bucket(&self, name: &str) -> Option<&Vec<String>> {
        match name {
            "images" => Some(&self.images),
            "stylesheets" => Some(&self.stylesheets),
            "fonts" => Some(&self.fonts),
            "icons" => Some(&self.icons),
            "scripts" => Some(&self.scripts),
            _ => None,
        }
    }

    pub fn bucket_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match name {
            "images" => Some(&mut self.images),
            "stylesheets" => Some(&mut self.stylesheets),
            "fonts" => Some(&mut self.fonts),
            "icons" => Some(&mut self.icons),
            "scripts" => Some(&mut self.scripts),
            _ => None,
        }
    }

    /// Bucket fed by network requests of the given category; `Other` has none.
    pub fn bucket_for(&mut self, category: ResourceCategory) -> Option<&mut Vec<String>> {
        match category {
            ResourceCategory::Image => Some(&mut self.images),
            ResourceCategory::Stylesheet => Some(&mut self.stylesheets),
            ResourceCategory::Font => Some(&mut self.fonts),
            ResourceCategory::Script => Some(&mut self.scripts),
            ResourceCategory::Other => None,
        }
    }

    pub fn buckets_mut(&mut self) -> [&mut Vec<String>; 5] {
        [
            &mut self.images,
            &mut self.stylesheets,
            &mut self.fonts,
            &mut self.icons,
            &mut self.scripts,
        ]
    }

    pub fn total(&self) -> usize {
        self.images.len() + self.stylesheets.len() + self.fonts.len() + self.icons.len() + self.scripts.len()
    }
}

/// Everything captured from one page, one field per extraction step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtraction {
    pub screenshots: BTreeMap<String, String>,
    pub dom_structure: String,
    pub extracted_css: CssInfo,
    pub color_palette: Vec<String>,
    pub typography: Map<String, Value>,
    pub layout_info: Map<String, Value>,
    pub assets: AssetCatalog,
    pub metadata: Map<String, Value>,
    /// Number of steps that fell back to their default
    pub degraded_steps: usize,
}

/// Everything the scraper learned about one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingResult {
    /// The requested URL, not the post-redirect one
    pub url: String,
    /// Base64 PNG per viewport name
    pub screenshots: BTreeMap<String, String>,
    pub dom_structure: String,
    pub extracted_css: CssInfo,
    pub typography: Map<String, Value>,
    pub color_palette: Vec<String>,
    pub layout_info: Map<String, Value>,
    pub assets: AssetCatalog,
    pub metadata: Map<String, Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub attempts: usize,
    pub duration_ms: u64,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapingResult {
    /// Stamps attempt count and wall time onto a finished result.
    pub fn with_run_info(self, attempts: usize, elapsed: Duration) -> Self {
        Self {
            attempts,
            duration_ms: elapsed.as_millis() as u64,
            ..self
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Builds the final record; the only place results are constructed.
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn success(url: &str, raw: RawExtraction) -> ScrapingResult {
        ScrapingResult {
            url: url.to_string(),
            screenshots: raw.screenshots,
            dom_structure: raw.dom_structure,
            extracted_css: raw.extracted_css,
            typography: raw.typography,
            color_palette: raw.color_palette,
            layout_info: raw.layout_info,
            assets: raw.assets,
            metadata: raw.metadata,
            success: true,
            error_message: None,
            attempts: 0,
            duration_ms: 0,
            scraped_at: Utc::now(),
        }
    }

    /// Failure record with every content field at its empty default.
    pub fn failure(url: &str, message: impl Into<String>) -> ScrapingResult {
        ScrapingResult {
            url: url.to_string(),
            screenshots: BTreeMap::new(),
            dom_structure: String::new(),
            extracted_css: CssInfo::default(),
            typography: Map::new(),
            color_palette: Vec::new(),
            layout_info: Map::new(),
            assets: AssetCatalog::default(),
            metadata: Map::new(),
            success: false,
            error_message: Some(message.into()),
            attempts: 0,
            duration_ms: 0,
            scraped_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_has_only_empty_content() {
        let result = ResultAssembler::failure("https://example.com", "not valid");

        assert!(!result.success);
        assert_eq!(result.error(), Some("not valid"));
        assert!(result.screenshots.is_empty());
        assert!(result.dom_structure.is_empty());
        assert!(result.extracted_css.is_empty());
        assert!(result.typography.is_empty());
        assert!(result.color_palette.is_empty());
        assert!(result.layout_info.is_empty());
        assert_eq!(result.assets.total(), 0);
        assert!(result.metadata.is_empty());
    }

    #[test]
    fn test_success_carries_raw_fields() {
        let mut raw = RawExtraction {
            dom_structure: "<html></html>".to_string(),
            color_palette: vec!["#ffffff".to_string()],
            ..Default::default()
        };
        raw.screenshots.insert("desktop".to_string(), "iVBORw0KGgo=".to_string());

        let result = ResultAssembler::success("https://example.com", raw);
        assert!(result.success);
        assert!(result.error_message.is_none());
        assert_eq!(result.url, "https://example.com");
        assert_eq!(result.screenshots.len(), 1);
        assert_eq!(result.color_palette, vec!["#ffffff"]);
    }

    #[test]
    fn test_serialized_shape_always_has_every_field() {
        let json = serde_json::to_value(ResultAssembler::failure("https://example.com", "boom")).unwrap();
        for key in [
            "url",
            "screenshots",
            "dom_structure",
            "extracted_css",
            "typography",
            "color_palette",
            "layout_info",
            "assets",
            "metadata",
            "success",
            "error_message",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }

        let ok = serde_json::to_value(ResultAssembler::success("https://example.com", RawExtraction::default())).unwrap();
        assert!(ok.get("error_message").is_none());
        assert_eq!(ok["assets"]["icons"], serde_json::json!([]));
    }

    #[test]
    fn test_with_run_info() {
        let result = ResultAssembler::failure("https://example.com", "boom")
            .with_run_info(3, Duration::from_millis(7250));
        assert_eq!(result.attempts, 3);
        assert_eq!(result.duration_ms, 7250);
    }

    #[test]
    fn test_asset_catalog_buckets() {
        let mut assets = AssetCatalog::default();
        assets.bucket_mut("icons").unwrap().push("https://a.test/favicon.ico".to_string());
        assets
            .bucket_for(ResourceCategory::Font)
            .unwrap()
            .push("https://a.test/font.woff2".to_string());

        assert!(assets.bucket_for(ResourceCategory::Other).is_none());
        assert!(assets.bucket("videos").is_none());
        assert_eq!(assets.bucket("icons").unwrap().len(), 1);
        assert_eq!(assets.total(), 2);
    }
}
