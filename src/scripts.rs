//! In-page extraction capabilities
//!
//! The page-side extractors are plain JavaScript functions installed into the
//! page's global scope. The host only knows them as a fixed set of named
//! capabilities, each invoked with no arguments and returning JSON.

use crate::ScrapeError;
use std::fmt;
use std::path::Path;

/// Named extraction functions available once the script bundle is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CssInfo,
    ColorPalette,
    Typography,
    LayoutInfo,
    Assets,
    Metadata,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::CssInfo,
        Capability::ColorPalette,
        Capability::Typography,
        Capability::LayoutInfo,
        Capability::Assets,
        Capability::Metadata,
    ];

    /// Global function name the capability is exposed under in the page.
    pub fn function_name(&self) -> &'static str {
        match self {
            Capability::CssInfo => "extract_css_info",
            Capability::ColorPalette => "extract_color_palette",
            Capability::Typography => "extract_typography",
            Capability::LayoutInfo => "extract_layout_info",
            Capability::Assets => "extract_assets",
            Capability::Metadata => "extract_metadata",
        }
    }

    /// Expression that invokes the capability inside the page.
    pub fn call_expression(&self) -> String {
        format!("{}()", self.function_name())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// One script file destined for the page, tagged with its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedScript {
    pub name: String,
    pub source: String,
}

impl InjectedScript {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Source with a trailing `sourceURL` directive so page errors and
    /// console output point back at the originating file.
    pub fn tagged_source(&self) -> String {
        format!("{}\n//# sourceURL={}", self.source, self.name)
    }
}

const BUILTIN_SCRIPTS: [(&str, &str); 6] = [
    ("assets.js", include_str!("../webscripts/assets.js")),
    ("colors.js", include_str!("../webscripts/colors.js")),
    ("css.js", include_str!("../webscripts/css.js")),
    ("layout.js", include_str!("../webscripts/layout.js")),
    ("metadata.js", include_str!("../webscripts/metadata.js")),
    ("typography.js", include_str!("../webscripts/typography.js")),
];

/// Ordered set of scripts injected into every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBundle {
    scripts: Vec<InjectedScript>,
}

impl ScriptBundle {
    pub fn new(scripts: Vec<InjectedScript>) -> Self {
        Self { scripts }
    }

    /// Scripts compiled into the binary.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_SCRIPTS
                .iter()
                .map(|(name, source)| InjectedScript::new(*name, *source))
                .collect(),
        )
    }

    /// Loads every `*.js` file of `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> Result<Self, ScrapeError> {
        let mut scripts = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("js") {
                continue;
            }

            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| ScrapeError::Configuration(format!("Invalid script path: {}", path.display())))?
                .to_string();
            let source = std::fs::read_to_string(&path)?;
            scripts.push(InjectedScript::new(name, source));
        }

        if scripts.is_empty() {
            return Err(ScrapeError::Configuration(format!(
                "No extraction scripts found in {}",
                dir.display()
            )));
        }

        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self::new(scripts))
    }

    /// Built-in bundle unless a directory override is given.
    pub fn load(dir: Option<&Path>) -> Result<Self, ScrapeError> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Ok(Self::builtin()),
        }
    }

    pub fn scripts(&self) -> &[InjectedScript] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl Default for ScriptBundle {
    fn default() -> Self {
        Self::builtin()
    }
}
