//! Responsive variants: one image style per breakpoint.
//!
//! A responsive style maps breakpoints to image styles. From it this module
//! derives the per-width dimensions and aspect ratios used for fluid
//! placeholders, the background sources for CSS-background mode, the
//! `<picture>` sources, and `<link rel="preload">` attributes.
//!
//! Everything derived here is also written to the item's `blazies` bag:
//!
//! | Key | Value |
//! |---|---|
//! | `dimensions` | `[{width, height, ratio}, ...]`, ascending width |
//! | `ratios` | `{width: ratio}` |
//! | `bgs` | `{width: {src, ratio}}` (background mode only) |
//! | `item.padding_bottom` | ratio of the widest variant |

use crate::attributes::Attributes;
use crate::cache::RenderCache;
use crate::config::{BlazyConfig, EMPTY_IMAGE, ORIGINAL_IMAGE, ResponsiveStyleConfig};
use crate::file::{self, FileResolver, ResolveError, UrlOptions, transform_dimensions};
use crate::imaging::{ImageStyle, ImageTransform, StyleRegistry, aspect_ratio};
use crate::placeholder;
use crate::types::ItemSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Output size of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
    pub ratio: f64,
}

/// One CSS background source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSource {
    pub src: String,
    pub ratio: f64,
}

/// A `<source>` element of a `<picture>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub media: String,
    pub srcset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// All sources of a responsive image, heaviest breakpoint first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSet {
    pub items: Vec<Source>,
    /// URL of the `<img>` inside the `<picture>`.
    pub fallback: Option<String>,
}

/// A `<link rel="preload">` and its de-duplication key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreloadLink {
    pub key: String,
    pub attributes: Attributes,
}

pub struct ResponsiveResolver<'a> {
    config: &'a BlazyConfig,
    styles: &'a StyleRegistry,
    cache: &'a RenderCache,
}

impl<'a> ResponsiveResolver<'a> {
    pub fn new(config: &'a BlazyConfig, styles: &'a StyleRegistry, cache: &'a RenderCache) -> Self {
        Self {
            config,
            styles,
            cache,
        }
    }

    pub fn style(&self, id: &str) -> Result<&'a ResponsiveStyleConfig, ResolveError> {
        self.config
            .responsive_styles
            .get(id)
            .ok_or_else(|| ResolveError::UnknownResponsiveStyle(id.to_string()))
    }

    /// Distinct image styles used by `responsive`, in mapping order.
    ///
    /// The fallback style comes last. Ids missing from the registry are
    /// skipped.
    pub fn image_styles(&self, responsive: &ResponsiveStyleConfig) -> Vec<&'a ImageStyle> {
        let mut ids: Vec<&str> = Vec::new();
        for mapping in &responsive.mappings {
            let referenced = mapping
                .image_style
                .iter()
                .chain(mapping.sizes_image_styles.iter());
            for id in referenced {
                if !ids.contains(&id.as_str()) {
                    ids.push(id);
                }
            }
        }
        let fallback = responsive.fallback_image_style.as_str();
        if !fallback.is_empty() && !ids.contains(&fallback) {
            ids.push(fallback);
        }

        ids.into_iter()
            .filter(|id| !is_pseudo_style(id))
            .filter_map(|id| {
                let style = self.styles.get(id);
                if style.is_none() {
                    tracing::debug!(style = id, "responsive mapping names unknown image style");
                }
                style
            })
            .collect()
    }

    /// Per-width output sizes of every variant, ascending by width.
    ///
    /// Computed once per item: a second call returns what the bag holds.
    /// Variants whose width cannot be predicted are left out; a later
    /// variant with the same width replaces an earlier one.
    pub fn dimensions(
        &self,
        responsive: &ResponsiveStyleConfig,
        settings: &mut ItemSettings,
        initial: bool,
    ) -> Vec<Dimension> {
        if let Some(stored) = settings.blazies.get("dimensions") {
            return serde_json::from_value(stored.clone()).unwrap_or_default();
        }

        let mut by_width: BTreeMap<u32, Dimension> = BTreeMap::new();
        for style in self.image_styles(responsive) {
            let size = transform_dimensions(style, settings, initial, self.cache);
            let (Some(width), Some(height)) = (size.width, size.height) else {
                continue;
            };
            by_width.insert(
                width,
                Dimension {
                    width,
                    height,
                    ratio: aspect_ratio(Some(width), Some(height)),
                },
            );
        }

        let dimensions: Vec<Dimension> = by_width.into_values().collect();
        let ratios: Map<String, Value> = dimensions
            .iter()
            .map(|d| (d.width.to_string(), Value::from(d.ratio)))
            .collect();
        let records: Vec<Value> = dimensions
            .iter()
            .map(|d| json!({ "width": d.width, "height": d.height, "ratio": d.ratio }))
            .collect();

        settings.blazies.set("dimensions", records);
        if let Some(last) = dimensions.last() {
            settings
                .blazies
                .set("ratios", ratios)
                .set("item.padding_bottom", last.ratio)
                .set("_dimensions", true);
        }
        dimensions
    }

    /// Background sources keyed by width, smallest first.
    ///
    /// Unless `undata`, the smallest source becomes the item's `image_url`
    /// so a script that knows nothing about breakpoints still loads
    /// something real.
    pub fn to_background(
        &self,
        responsive: &ResponsiveStyleConfig,
        settings: &mut ItemSettings,
        files: &FileResolver<'_>,
        undata: bool,
    ) -> BTreeMap<u32, BackgroundSource> {
        let mut sources = BTreeMap::new();
        let Some(uri) = settings.media.uri.clone() else {
            return sources;
        };

        let options = UrlOptions {
            url: None,
            sanitize: settings.check_protocol,
        };
        for style in self.image_styles(responsive) {
            let size = transform_dimensions(style, settings, false, self.cache);
            let Some(width) = size.width else {
                continue;
            };
            sources.insert(
                width,
                BackgroundSource {
                    src: files.transform_relative(&uri, Some(style), options),
                    ratio: size.ratio(),
                },
            );
        }

        let Some((_, smallest)) = sources.first_key_value() else {
            return sources;
        };
        if !undata {
            settings.image_url = Some(smallest.src.clone());
        }

        let bgs: Map<String, Value> = sources
            .iter()
            .map(|(w, bg)| (w.to_string(), json!({ "src": bg.src, "ratio": bg.ratio })))
            .collect();
        let ratios: Map<String, Value> = sources
            .iter()
            .map(|(w, bg)| (w.to_string(), Value::from(bg.ratio)))
            .collect();
        let padding = sources.values().last().map(|bg| bg.ratio);
        settings.blazies.set("bgs", bgs).set("ratios", ratios);
        if let Some(padding) = padding {
            settings.blazies.set("item.padding_bottom", padding);
        }
        sources
    }

    /// Apply the responsive fallback when the item has no image style.
    ///
    /// `_empty image_` shows `placeholder` instead of a file; any other
    /// fallback style becomes the item's image style.
    pub fn fallback(
        &self,
        responsive: &ResponsiveStyleConfig,
        settings: &mut ItemSettings,
        placeholder: &str,
    ) {
        if settings.image_style.is_some() {
            return;
        }
        match responsive.fallback_image_style.as_str() {
            EMPTY_IMAGE => settings.image_url = Some(placeholder.to_string()),
            "" | ORIGINAL_IMAGE => {}
            style => settings.image_style = Some(style.to_string()),
        }
    }

    /// `<picture>` sources for the item's file.
    pub fn sources(
        &self,
        responsive: &ResponsiveStyleConfig,
        settings: &ItemSettings,
        files: &FileResolver<'_>,
    ) -> Option<SourceSet> {
        let uri = settings.media.uri.as_deref()?;
        let mut breakpoints: Vec<_> = self
            .config
            .breakpoints
            .get(&responsive.breakpoint_group)
            .map(|group| group.iter().collect())
            .unwrap_or_default();
        breakpoints.sort_by(|a, b| b.weight.cmp(&a.weight));

        let ext = file::extension(uri).unwrap_or_default();
        let mut items = Vec::new();
        for breakpoint in breakpoints {
            let mut srcset = Vec::new();
            let mut sizes = None;
            let mut mime = None;
            for mapping in responsive
                .mappings
                .iter()
                .filter(|m| m.breakpoint == breakpoint.id)
            {
                if let Some(mapping_sizes) = mapping
                    .sizes
                    .as_deref()
                    .filter(|_| !mapping.sizes_image_styles.is_empty())
                {
                    sizes = Some(mapping_sizes.to_string());
                    for style in mapping
                        .sizes_image_styles
                        .iter()
                        .filter_map(|id| self.styles.get(id))
                    {
                        let Some(width) = transform_dimensions(style, settings, true, self.cache).width
                        else {
                            continue;
                        };
                        srcset.push(format!("{} {width}w", self.style_url(uri, style, settings, files)));
                        mime = mime.or_else(|| derivative_mime(style, &ext));
                    }
                } else if let Some(id) = mapping.image_style.as_deref() {
                    let url = match id {
                        EMPTY_IMAGE => placeholder::DATA.to_string(),
                        ORIGINAL_IMAGE => files.transform_relative(uri, None, UrlOptions::default()),
                        id => match self.styles.get(id) {
                            Some(style) => {
                                mime = mime.or_else(|| derivative_mime(style, &ext));
                                self.style_url(uri, style, settings, files)
                            }
                            None => continue,
                        },
                    };
                    srcset.push(format!("{url} {}", mapping.multiplier));
                }
            }
            if srcset.is_empty() {
                continue;
            }
            items.push(Source {
                media: breakpoint.media_query.clone(),
                srcset: srcset.join(", "),
                sizes,
                mime: mime.or_else(|| file::mime_for_extension(&ext).map(str::to_string)),
            });
        }
        if items.is_empty() {
            return None;
        }

        let fallback = match responsive.fallback_image_style.as_str() {
            EMPTY_IMAGE => Some(placeholder::DATA.to_string()),
            "" | ORIGINAL_IMAGE => Some(files.transform_relative(uri, None, UrlOptions::default())),
            id => self
                .styles
                .get(id)
                .map(|style| self.style_url(uri, style, settings, files)),
        };
        Some(SourceSet { items, fallback })
    }

    fn style_url(
        &self,
        uri: &str,
        style: &ImageStyle,
        settings: &ItemSettings,
        files: &FileResolver<'_>,
    ) -> String {
        files.transform_relative(
            uri,
            Some(style),
            UrlOptions {
                url: None,
                sanitize: settings.check_protocol,
            },
        )
    }
}

fn is_pseudo_style(id: &str) -> bool {
    id == EMPTY_IMAGE || id == ORIGINAL_IMAGE
}

fn derivative_mime(style: &ImageStyle, ext: &str) -> Option<String> {
    file::mime_for_extension(&style.derivative_extension(ext)).map(str::to_string)
}

/// Preload links for the item's first image.
///
/// With responsive sources there is one link per source, carrying
/// `imagesrcset`/`imagesizes`; a 1px data URI fallback is replaced by the
/// resolved `image_url`. Without sources the plain `image_url` is preloaded.
pub fn preload_links(settings: &ItemSettings, sources: Option<&SourceSet>) -> Vec<PreloadLink> {
    let origin = settings.media.uri.as_deref().or(settings.media.url.as_deref());
    match sources.filter(|set| !set.items.is_empty()) {
        Some(set) => {
            let mut url = set.fallback.clone().unwrap_or_default();
            if url.starts_with("data:image")
                && let Some(image_url) = settings.image_url.as_deref()
            {
                url = image_url.to_string();
            }
            set.items
                .iter()
                .filter(|source| !source.srcset.is_empty())
                .map(|source| preload_link(&url, origin, settings, Some(source)))
                .collect()
        }
        None => settings
            .image_url
            .as_deref()
            .filter(|url| !url.is_empty() && !url.starts_with("data:"))
            .map(|url| vec![preload_link(url, origin, settings, None)])
            .unwrap_or_default(),
    }
}

fn preload_link(
    url: &str,
    origin: Option<&str>,
    settings: &ItemSettings,
    source: Option<&Source>,
) -> PreloadLink {
    let mime = source
        .and_then(|s| s.mime.clone())
        .or_else(|| settings.media.mime.clone())
        .or_else(|| {
            file::extension(origin.unwrap_or(url))
                .and_then(|ext| file::mime_for_extension(&ext))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "image/jpeg".to_string());
    let kind = mime.split('/').next().unwrap_or("image").trim().to_string();

    let mut attributes = Attributes::new();
    attributes
        .set("rel", "preload")
        .set("as", kind.as_str())
        .set("href", url)
        .set("type", mime.as_str());

    let mut suffix = "";
    if let Some(source) = source {
        suffix = "_responsive";
        attributes.set("imagesrcset", source.srcset.as_str());
        if let Some(sizes) = source.sizes.as_deref() {
            attributes.set("imagesizes", sizes);
        }
    }
    if file::is_external(origin.unwrap_or(url)) {
        attributes.flag("crossorigin");
    }

    let digest = Sha256::digest(url.as_bytes());
    let hash: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    PreloadLink {
        key: format!("blazy{suffix}_{kind}{hash}"),
        attributes,
    }
}
