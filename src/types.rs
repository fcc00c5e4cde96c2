//! Typed inputs of a render pass.
//!
//! [`ItemSettings`] is what callers hand in per element (usually
//! deserialized from JSON). Keys this crate does not know about are kept in
//! [`ItemSettings::extra`] rather than rejected, and everything a stage
//! derives for the next one goes into the [`Settings`] bag
//! [`ItemSettings::blazies`].

use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// How an element is expected to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingMode {
    /// Lazy-load through data attributes and a placeholder.
    #[default]
    Lazy,
    /// Native `loading="eager"`, no data attributes.
    Eager,
    /// No lazy loading at all; the element is marked `data-b-unloading`.
    Unlazy,
    /// Lazy even when the site disables lazy loading without JavaScript.
    Defer,
    /// Carousel slide: the initial slide loads eagerly, the rest lazily.
    Slider,
}

impl LoadingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lazy => "lazy",
            Self::Eager => "eager",
            Self::Unlazy => "unlazy",
            Self::Defer => "defer",
            Self::Slider => "slider",
        }
    }

    /// Whether the native `loading` attribute may carry this mode.
    pub fn is_native_hint(self) -> bool {
        !matches!(self, Self::Slider | Self::Unlazy)
    }
}

impl fmt::Display for LoadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-level flags that force eager, attribute-free output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderContext {
    /// Accelerated Mobile Pages response.
    pub is_amp: bool,
    /// Editor preview.
    pub is_preview: bool,
    /// Sandboxed embed (e.g. inside an editor iframe).
    pub is_sandboxed: bool,
}

impl RenderContext {
    pub fn is_static(&self) -> bool {
        self.is_amp || self.is_preview || self.is_sandboxed
    }
}

/// Width and height in pixels, either of which may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    /// Both sides known and non-zero.
    pub fn is_known(&self) -> bool {
        matches!((self.width, self.height), (Some(w), Some(h)) if w > 0 && h > 0)
    }

    /// Height as a percentage of width, see [`crate::imaging::aspect_ratio`].
    pub fn ratio(&self) -> f64 {
        crate::imaging::aspect_ratio(self.width, self.height)
    }
}

/// The file behind an element: an internal storage URI or a web URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaReference {
    /// Internal storage locator, e.g. `public://2024/a.jpg`.
    pub uri: Option<String>,
    /// Web URL when the file is external or only known by URL.
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime: Option<String>,
    pub alt: Option<String>,
    pub title: Option<String>,
    /// Label of the owning entity, used by the `entity_title` caption.
    pub label: Option<String>,
    /// Replacement values for `[name]` tokens in custom captions.
    pub tokens: BTreeMap<String, String>,
}

impl MediaReference {
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    pub fn set_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

/// Per-element input settings.
///
/// Every field is optional in JSON. Unknown keys land in [`Self::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSettings {
    #[serde(flatten)]
    pub media: MediaReference,

    /// Resolved URL of the main image; derived when absent.
    pub image_url: Option<String>,
    pub image_style: Option<String>,
    pub thumbnail_style: Option<String>,
    /// Pre-built thumbnail location, preferred over `thumbnail_style`.
    pub thumbnail_uri: Option<String>,
    pub responsive_image_style: Option<String>,
    pub box_style: Option<String>,
    pub box_media_style: Option<String>,

    pub loading: LoadingMode,
    /// `content`, `media`, or a lightbox id such as `colorbox`.
    pub media_switch: Option<String>,
    /// `fluid`, `enforced`, or a fixed ratio such as `16:9`.
    pub ratio: Option<String>,
    /// Render as a CSS background instead of an `<img>`.
    pub background: bool,
    /// Per-item override of the `ui.fx` effect.
    pub fx: Option<String>,

    pub delta: usize,
    /// Index of the initially visible slide in slider mode.
    pub initial: usize,

    /// `image`, `video`, `audio`, `rich`, ...
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub bundle: Option<String>,
    pub embed_url: Option<String>,
    pub entity_uuid: Option<String>,

    pub field_name: Option<String>,
    pub view_name: Option<String>,
    pub current_view_mode: Option<String>,
    pub gallery_id: Option<String>,

    pub box_caption: Option<String>,
    pub box_caption_custom: Option<String>,
    /// Inline HTML shown in the lightbox instead of an image.
    pub lightbox_html: Option<String>,
    /// Link target for the `content` switch.
    pub content_url: Option<String>,

    /// Treat URLs as untrusted and strip dangerous protocols.
    pub check_protocol: bool,
    /// Emit `<link rel="preload">` for this element.
    pub preload: bool,

    /// Derived state shared between render stages.
    pub blazies: Settings,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemSettings {
    /// Settings for an internal file of known size.
    pub fn for_uri(uri: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            media: MediaReference {
                uri: Some(uri.into()),
                width: Some(width),
                height: Some(height),
                ..MediaReference::default()
            },
            ..Self::default()
        }
    }

    pub fn size(&self) -> Size {
        self.media.size()
    }

    pub fn media_type(&self) -> &str {
        self.media_type.as_deref().unwrap_or("image")
    }

    pub fn is_fluid(&self) -> bool {
        self.ratio.as_deref() == Some("fluid")
    }

    /// The media switch, lower-cased with underscores turned into hyphens.
    pub fn switch_css(&self) -> Option<String> {
        self.media_switch
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase().replace('_', "-"))
    }

    /// Whether this element is a slider slide currently on screen at load.
    pub fn is_initial_slide(&self) -> bool {
        self.loading == LoadingMode::Slider && self.delta == self.initial
    }
}
