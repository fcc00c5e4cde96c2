//! Configuration module.
//!
//! Handles loading, validating, and merging `blazy.toml`. Stock defaults are
//! the base layer; a user file overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! [ui]
//! placeholder = ""              # Custom placeholder URL, empty = generated SVG
//! unstyled_extensions = ""      # Space-separated extensions never styled (svg always is)
//! one_pixel = true              # Responsive images carry data-b-lazy
//! noscript = false              # Emit a <noscript> twin for lazy images
//! nojs_lazy = false             # Disable JS lazy loading site-wide
//! fx = ""                       # "" or "blur"
//! lazy_class = "b-lazy"
//! lazy_attribute = "src"        # "src" → data-src, "lazy" → data-lazy
//!
//! [files]
//! host = "http://localhost"
//! base_path = ""
//! public_path = "sites/default/files"
//! private_path = "system/files"
//! temporary_path = "system/temporary"
//! public_dir = "sites/default/files"
//! private_dir = "private"
//! temporary_dir = "tmp"
//! schemes = ["public", "private", "temporary"]
//!
//! [lightbox]
//! lightboxes = ["colorbox", "photobox", ...]
//! video_width = 640
//! video_height = 360
//!
//! [styles.large]
//! effects = [{ type = "scale", width = 480, height = 480 }]
//!
//! [[breakpoints.theme]]
//! id = "mobile"
//! media_query = "(min-width: 0px)"
//! weight = 0
//! multipliers = ["1x"]
//!
//! [responsive_styles.hero]
//! breakpoint_group = "theme"
//! fallback_image_style = "large"
//! mappings = [{ breakpoint = "mobile", multiplier = "1x", image_style = "medium" }]
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::ImageEffect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the config directory.
pub const CONFIG_FILENAME: &str = "blazy.toml";

/// Responsive fallback that renders the placeholder instead of an image.
pub const EMPTY_IMAGE: &str = "_empty image_";
/// Responsive fallback/mapping that uses the unstyled original.
pub const ORIGINAL_IMAGE: &str = "_original image_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `blazy.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlazyConfig {
    pub ui: UiConfig,
    pub files: FilesConfig,
    pub lightbox: LightboxConfig,
    /// Image styles by id.
    pub styles: BTreeMap<String, StyleConfig>,
    /// Responsive image styles by id.
    pub responsive_styles: BTreeMap<String, ResponsiveStyleConfig>,
    /// Breakpoint groups by id.
    pub breakpoints: BTreeMap<String, Vec<Breakpoint>>,
    pub processing: ProcessingConfig,
}

impl BlazyConfig {
    /// Validate config values and cross references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.ui.lazy_attribute.as_str(), "src" | "lazy") {
            return Err(ConfigError::Validation(
                "ui.lazy_attribute must be \"src\" or \"lazy\"".into(),
            ));
        }
        if !matches!(self.ui.fx.as_str(), "" | "blur") {
            return Err(ConfigError::Validation(
                "ui.fx must be empty or \"blur\"".into(),
            ));
        }
        if self.files.schemes.is_empty() {
            return Err(ConfigError::Validation(
                "files.schemes must not be empty".into(),
            ));
        }
        if self.lightbox.video_width == 0 || self.lightbox.video_height == 0 {
            return Err(ConfigError::Validation(
                "lightbox.video_width and video_height must be non-zero".into(),
            ));
        }
        for (id, style) in &self.styles {
            for effect in &style.effects {
                effect
                    .validate()
                    .map_err(|e| ConfigError::Validation(format!("styles.{id}: {e}")))?;
            }
        }
        for (id, responsive) in &self.responsive_styles {
            self.validate_responsive(id, responsive)?;
        }
        Ok(())
    }

    fn validate_responsive(
        &self,
        id: &str,
        responsive: &ResponsiveStyleConfig,
    ) -> Result<(), ConfigError> {
        let known_style = |style: &str| style == ORIGINAL_IMAGE || self.styles.contains_key(style);

        let fallback = responsive.fallback_image_style.as_str();
        if fallback != EMPTY_IMAGE && !known_style(fallback) {
            return Err(ConfigError::Validation(format!(
                "responsive_styles.{id}: unknown fallback_image_style '{fallback}'"
            )));
        }
        let group = self
            .breakpoints
            .get(&responsive.breakpoint_group)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "responsive_styles.{id}: unknown breakpoint_group '{}'",
                    responsive.breakpoint_group
                ))
            })?;
        for mapping in &responsive.mappings {
            if !group.iter().any(|b| b.id == mapping.breakpoint) {
                return Err(ConfigError::Validation(format!(
                    "responsive_styles.{id}: unknown breakpoint '{}'",
                    mapping.breakpoint
                )));
            }
            if let Some(style) = mapping.image_style.as_deref().filter(|s| !known_style(*s)) {
                return Err(ConfigError::Validation(format!(
                    "responsive_styles.{id}: unknown image_style '{style}'"
                )));
            }
            if let Some(style) = mapping.sizes_image_styles.iter().find(|s| !known_style(s.as_str())) {
                return Err(ConfigError::Validation(format!(
                    "responsive_styles.{id}: unknown sizes image style '{style}'"
                )));
            }
        }
        Ok(())
    }

    /// Extensions rendered without image styles: `svg` plus the configured ones.
    pub fn unstyled_extensions(&self) -> Vec<String> {
        let mut extensions = vec!["svg".to_string()];
        for ext in self.ui.unstyled_extensions.split_whitespace() {
            let ext = ext.trim_start_matches('.').to_lowercase();
            if !ext.is_empty() && !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        extensions
    }

    pub fn is_lightbox(&self, switch: &str) -> bool {
        self.lightbox.lightboxes.iter().any(|l| l == switch)
    }
}

/// Presentation options shared by every element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    /// Custom placeholder URL. Empty means a generated SVG sized to the element.
    pub placeholder: String,
    /// Space-separated file extensions never passed through image styles.
    pub unstyled_extensions: String,
    /// Responsive images get `data-b-lazy` with a one-pixel placeholder.
    pub one_pixel: bool,
    /// Add a `<noscript>` copy of lazy images.
    pub noscript: bool,
    /// Disable JavaScript lazy loading (native `loading` only).
    pub nojs_lazy: bool,
    /// Visual effect while loading: empty or `blur`.
    pub fx: String,
    /// Class marking lazy elements for the loader script.
    pub lazy_class: String,
    /// `src` → `data-src`, `lazy` → `data-lazy`.
    pub lazy_attribute: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            placeholder: String::new(),
            unstyled_extensions: String::new(),
            one_pixel: true,
            noscript: false,
            nojs_lazy: false,
            fx: String::new(),
            lazy_class: "b-lazy".to_string(),
            lazy_attribute: "src".to_string(),
        }
    }
}

/// Where stream-wrapper files live, on disk and on the web.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Scheme and host of the site, stripped when making URLs relative.
    pub host: String,
    /// Path prefix the site is installed under (e.g. `/subdir`).
    pub base_path: String,
    /// Web path of `public://` files.
    pub public_path: String,
    /// Web path of `private://` files.
    pub private_path: String,
    /// Web path of `temporary://` files.
    pub temporary_path: String,
    /// Directory backing `public://`.
    pub public_dir: PathBuf,
    /// Directory backing `private://`.
    pub private_dir: PathBuf,
    /// Directory backing `temporary://`.
    pub temporary_dir: PathBuf,
    /// Valid stream schemes.
    pub schemes: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".to_string(),
            base_path: String::new(),
            public_path: "sites/default/files".to_string(),
            private_path: "system/files".to_string(),
            temporary_path: "system/temporary".to_string(),
            public_dir: PathBuf::from("sites/default/files"),
            private_dir: PathBuf::from("private"),
            temporary_dir: PathBuf::from("tmp"),
            schemes: vec!["public".into(), "private".into(), "temporary".into()],
        }
    }
}

impl FilesConfig {
    /// Web path for a scheme, without leading or trailing slashes.
    pub fn web_path(&self, scheme: &str) -> Option<&str> {
        let path = match scheme {
            "public" => &self.public_path,
            "private" => &self.private_path,
            "temporary" => &self.temporary_path,
            _ => return None,
        };
        Some(path.trim_matches('/'))
    }

    /// Directory on disk for a scheme.
    pub fn directory(&self, scheme: &str) -> Option<&Path> {
        match scheme {
            "public" => Some(&self.public_dir),
            "private" => Some(&self.private_dir),
            "temporary" => Some(&self.temporary_dir),
            _ => None,
        }
    }
}

/// Lightbox integration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightboxConfig {
    /// Media switches that open a lightbox.
    pub lightboxes: Vec<String>,
    /// Box size used for videos without a box media style.
    pub video_width: u32,
    pub video_height: u32,
}

impl Default for LightboxConfig {
    fn default() -> Self {
        Self {
            lightboxes: ["colorbox", "photobox", "mfp", "photoswipe", "splidebox", "zooming"]
                .into_iter()
                .map(String::from)
                .collect(),
            video_width: 640,
            video_height: 360,
        }
    }
}

/// A named image style: effects applied in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    pub effects: Vec<ImageEffect>,
    /// Encoding quality for derivatives (1-100). Defaults to 90.
    pub quality: Option<u32>,
}

/// A responsive image style: one image style per breakpoint and multiplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponsiveStyleConfig {
    pub breakpoint_group: String,
    /// Image style of the `<img>` fallback, or `_empty image_`.
    pub fallback_image_style: String,
    pub mappings: Vec<StyleMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleMapping {
    pub breakpoint: String,
    pub multiplier: String,
    /// Single style for this breakpoint (`srcset` with density descriptors).
    pub image_style: Option<String>,
    /// `sizes` attribute; pairs with `sizes_image_styles` (width descriptors).
    pub sizes: Option<String>,
    pub sizes_image_styles: Vec<String>,
}

impl Default for StyleMapping {
    fn default() -> Self {
        Self {
            breakpoint: String::new(),
            multiplier: "1x".to_string(),
            image_style: None,
            sizes: None,
            sizes_image_styles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Breakpoint {
    pub id: String,
    pub media_query: String,
    pub weight: i32,
    pub multipliers: Vec<String>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BlazyConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `blazy.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BlazyConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BlazyConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `blazy.toml` in the given directory, on top of stock defaults.
pub fn load_config(dir: &Path) -> Result<BlazyConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `blazy.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Blazy Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Presentation
# ---------------------------------------------------------------------------
[ui]
# Custom placeholder image URL. Empty generates an inline SVG sized to
# the element so the layout does not jump while loading.
placeholder = ""

# Space-separated extensions rendered as-is, without image styles.
# SVG is always unstyled.
unstyled_extensions = ""

# Responsive images carry data-b-lazy with a one-pixel placeholder.
one_pixel = true

# Emit a <noscript> copy of every lazy image.
noscript = false

# Disable JavaScript lazy loading everywhere; only the native loading
# attribute remains. Items with loading = "defer" stay lazy.
nojs_lazy = false

# Loading effect: "" or "blur".
fx = ""

# Class the loader script looks for.
lazy_class = "b-lazy"

# "src" puts the real URL in data-src, "lazy" in data-lazy.
lazy_attribute = "src"

# ---------------------------------------------------------------------------
# Files
# ---------------------------------------------------------------------------
[files]
# Scheme and host of the site; stripped to make URLs relative.
host = "http://localhost"

# Path prefix the site is installed under, e.g. "/subdir".
base_path = ""

# Web paths of each stream scheme.
public_path = "sites/default/files"
private_path = "system/files"
temporary_path = "system/temporary"

# Directories on disk backing each scheme (used for dimension probes,
# derivatives and blur data URIs).
public_dir = "sites/default/files"
private_dir = "private"
temporary_dir = "tmp"

# Valid stream schemes.
schemes = ["public", "private", "temporary"]

# ---------------------------------------------------------------------------
# Lightboxes
# ---------------------------------------------------------------------------
[lightbox]
# Media switches that open a lightbox.
lightboxes = ["colorbox", "photobox", "mfp", "photoswipe", "splidebox", "zooming"]

# Box size for videos without a box media style.
video_width = 640
video_height = 360

# ---------------------------------------------------------------------------
# Image styles
# ---------------------------------------------------------------------------
# Each style is an ordered list of effects:
#   { type = "scale", width = 480, height = 480, upscale = false }
#   { type = "scale_and_crop", width = 400, height = 300 }
#   { type = "resize", width = 200, height = 100 }
#   { type = "convert", extension = "webp" }
#
# [styles.large]
# effects = [{ type = "scale", width = 480, height = 480 }]
# quality = 90

# ---------------------------------------------------------------------------
# Breakpoint groups
# ---------------------------------------------------------------------------
# [[breakpoints.theme]]
# id = "mobile"
# media_query = "all and (min-width: 0px)"
# weight = 0
# multipliers = ["1x", "2x"]

# ---------------------------------------------------------------------------
# Responsive image styles
# ---------------------------------------------------------------------------
# fallback_image_style may be a style id or "_empty image_".
#
# [responsive_styles.hero]
# breakpoint_group = "theme"
# fallback_image_style = "large"
# mappings = [
#   { breakpoint = "mobile", multiplier = "1x", image_style = "medium" },
# ]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
