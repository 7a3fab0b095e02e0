//! Normalization of raw capability payloads
//!
//! Pure functions turning the JSON returned by the in-page extractors into
//! the typed, bounded shapes stored on the result.

use crate::browser::RequestRecord;
use crate::result::{AssetCatalog, CssInfo, StyleMap, StylePattern};
use crate::{ExtractionStep, ScrapeError};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const MAX_COMMON_PATTERNS: usize = 15;
pub const MAX_PALETTE_COLORS: usize = 15;
pub const MAX_ASSETS_PER_CATEGORY: usize = 20;

/// Palette used when the page yields no colors at all.
pub const DEFAULT_PALETTE: [&str; 3] = ["#4a90e2", "#f39c12", "#e74c3c"];

/// Property values that carry no design information.
const NOOP_KEYWORDS: [&str; 5] = ["none", "initial", "inherit", "unset", "auto"];

pub fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
}

/// Converts `rgb(r, g, b)` / `rgba(r, g, b, a)` to `#rrggbb`.
///
/// Returns `None` when fewer than three components can be read.
pub fn rgb_to_hex(value: &str) -> Option<String> {
    let components: Vec<u32> = value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .take(3)
        .map(|part| part.parse::<u32>().unwrap_or(u32::MAX).min(255))
        .collect();

    match components.as_slice() {
        [r, g, b] => Some(format!("#{:02x}{:02x}{:02x}", r, g, b)),
        _ => None,
    }
}

/// First family of a font stack, without quotes.
pub fn simplify_font_family(value: &str) -> String {
    value
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

fn style_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Drops no-op values, converts rgb colors to hex and simplifies font stacks.
pub fn clean_styles(styles: Option<&Value>) -> StyleMap {
    let Some(Value::Object(styles)) = styles else {
        return StyleMap::new();
    };

    let mut cleaned = StyleMap::new();
    for (key, raw) in styles {
        let Some(mut value) = style_value(raw) else {
            continue;
        };

        if key.contains("color") && value.starts_with("rgb") {
            if let Some(hex) = rgb_to_hex(&value) {
                value = hex;
            }
        }

        if key == "font-family" {
            value = simplify_font_family(&value);
        }

        // Checked on the final value so a second pass has nothing left to drop
        if value.is_empty() || NOOP_KEYWORDS.contains(&value.as_str()) {
            continue;
        }

        cleaned.insert(key.clone(), value);
    }

    cleaned
}

fn clean_pattern(raw: &Value) -> Option<StylePattern> {
    let selector = raw.get("selector")?.as_str()?.to_string();
    let styles = clean_styles(raw.get("styles"));
    if styles.is_empty() {
        return None;
    }

    let count = raw.get("count").and_then(Value::as_u64).unwrap_or(1);
    Some(StylePattern {
        selector,
        styles,
        count,
    })
}

fn object_field(raw: &Map<String, Value>, key: &str) -> Map<String, Value> {
    match raw.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn array_field(raw: &Map<String, Value>, key: &str) -> Vec<Value> {
    match raw.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

const CSS_FIELDS: [&str; 7] = [
    "body_styles",
    "header_styles",
    "main_content_styles",
    "common_patterns",
    "layout_info",
    "responsive_breakpoints",
    "animations",
];

/// Normalizes the CSS capability payload. Applying it to its own
/// (serialized) output leaves the value unchanged.
pub fn normalize_css(raw: &Value) -> Result<CssInfo, ScrapeError> {
    let Value::Object(raw) = raw else {
        return Err(ScrapeError::step(
            ExtractionStep::Css,
            format!("expected an object, got {}", raw),
        ));
    };

    let common_patterns = array_field(raw, "common_patterns")
        .iter()
        .filter_map(clean_pattern)
        .take(MAX_COMMON_PATTERNS)
        .collect();

    let extra = raw
        .iter()
        .filter(|(key, _)| !CSS_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(CssInfo {
        body_styles: clean_styles(raw.get("body_styles")),
        header_styles: clean_styles(raw.get("header_styles")),
        main_content_styles: clean_styles(raw.get("main_content_styles")),
        common_patterns,
        layout_info: object_field(raw, "layout_info"),
        responsive_breakpoints: array_field(raw, "responsive_breakpoints"),
        animations: array_field(raw, "animations"),
        extra,
    })
}

/// Keeps the first occurrence of each item, up to `cap` items.
pub fn dedupe_capped<I>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .take(cap)
        .collect()
}

/// Deduplicated, capped palette; falls back to the default palette when empty.
pub fn normalize_palette(raw: &Value) -> Result<Vec<String>, ScrapeError> {
    let colors = match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::to_string)
            .collect::<Vec<_>>(),
        Value::Null => Vec::new(),
        other => {
            return Err(ScrapeError::step(
                ExtractionStep::Colors,
                format!("expected an array, got {}", other),
            ))
        }
    };

    let palette = dedupe_capped(colors, MAX_PALETTE_COLORS);
    if palette.is_empty() {
        Ok(default_palette())
    } else {
        Ok(palette)
    }
}

/// Free-form capability payloads must at least be JSON objects.
pub fn expect_object(step: ExtractionStep, raw: Value) -> Result<Map<String, Value>, ScrapeError> {
    match raw {
        Value::Object(map) => Ok(map),
        other => Err(ScrapeError::step(step, format!("expected an object, got {}", other))),
    }
}

/// Merges DOM-reported assets with network-observed ones.
///
/// DOM entries come first, then requests in observation order. Categories
/// not known to `AssetCatalog` are returned in the second tuple slot so the
/// caller can report them.
pub fn merge_assets(
    dom_assets: &Value,
    requests: &[RequestRecord],
) -> Result<(AssetCatalog, Vec<String>), ScrapeError> {
    let Value::Object(dom_assets) = dom_assets else {
        return Err(ScrapeError::step(
            ExtractionStep::Assets,
            format!("expected an object, got {}", dom_assets),
        ));
    };

    let mut catalog = AssetCatalog::default();
    let mut unknown = Vec::new();

    for (category, urls) in dom_assets {
        let Some(bucket) = catalog.bucket_mut(category) else {
            unknown.push(category.clone());
            continue;
        };
        if let Value::Array(urls) = urls {
            bucket.extend(urls.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }

    for request in requests {
        if let Some(bucket) = catalog.bucket_for(request.category) {
            bucket.push(request.url.clone());
        }
    }

    for bucket in catalog.buckets_mut() {
        *bucket = dedupe_capped(std::mem::take(bucket), MAX_ASSETS_PER_CATEGORY);
    }

    Ok((catalog, unknown))
}
