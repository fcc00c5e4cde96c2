//! Placeholders shown before the real image loads.
//!
//! Three kinds, from cheapest to richest:
//! - [`DATA`]: a 1px transparent GIF.
//! - [`generate`]: an empty SVG with the element's aspect ratio, so the
//!   browser reserves the right box without a network request.
//! - Blur: a thumbnail derivative inlined as a base64 data URI and shown
//!   blurred under the real image ([`blur`]).

use crate::attributes::Attributes;
use crate::cache::RenderCache;
use crate::config::UiConfig;
use crate::file::{FileResolver, ResolveError, UrlOptions};
use crate::imaging::{ImageBackend, ImageStyle, ImageTransform, StyleRegistry};
use crate::types::{ItemSettings, Size};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

/// 1px transparent GIF.
pub const DATA: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Style used for blur thumbnails when the item names none.
pub const DEFAULT_THUMBNAIL_STYLE: &str = "thumbnail";

/// Elements wider than this get the large blur variant.
const FX_LARGE_WIDTH: u32 = 980;

/// An empty SVG with `viewBox="0 0 width height"`; missing sides are 100.
pub fn generate(width: Option<u32>, height: Option<u32>) -> String {
    let width = width.filter(|w| *w > 0).unwrap_or(100);
    let height = height.filter(|h| *h > 0).unwrap_or(100);
    format!(
        "data:image/svg+xml;charset=utf-8,%3Csvg%20xmlns%3D'http%3A%2F%2Fwww.w3.org%2F2000%2Fsvg'%20viewBox%3D'0%200%20{width}%20{height}'%2F%3E"
    )
}

/// The configured placeholder, or a generated one sized to `size`.
pub fn for_size(ui: &UiConfig, size: Size) -> String {
    if ui.placeholder.is_empty() {
        generate(size.width, size.height)
    } else {
        ui.placeholder.clone()
    }
}

/// Base64 data URI of an image file.
pub fn data_uri(path: &Path) -> Result<String, ResolveError> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(ResolveError::MissingDerivative(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "png".to_string());
    Ok(format!("data:image/{ext};base64,{}", STANDARD.encode(bytes)))
}

/// Thumbnail and blur handling for one render pass.
pub struct Thumbnailer<'a> {
    files: FileResolver<'a>,
    styles: &'a StyleRegistry,
    backend: &'a dyn ImageBackend,
    cache: &'a RenderCache,
}

impl<'a> Thumbnailer<'a> {
    pub fn new(
        files: FileResolver<'a>,
        styles: &'a StyleRegistry,
        backend: &'a dyn ImageBackend,
        cache: &'a RenderCache,
    ) -> Self {
        Self {
            files,
            styles,
            backend,
            cache,
        }
    }

    /// Add `data-thumb` and the effect markers to the container.
    ///
    /// Returns the blur data URI when `fx` is `blur`, the page loads lazily
    /// and the item can be styled. Static pages (AMP, preview, sandboxed) get
    /// no effect at all. Failures only cost the blur; they are logged and the
    /// element renders without it.
    pub fn thumbnail(
        &self,
        settings: &mut ItemSettings,
        container: &mut Attributes,
        fx: &str,
        is_static: bool,
    ) -> Option<String> {
        let uri = settings.media.uri.clone();
        let external = settings.blazies.get_bool("is.external");
        let style = settings
            .thumbnail_style
            .as_deref()
            .and_then(|id| self.styles.get(id));

        let mut thumbnail_url = None;
        if let Some(thumbnail_uri) = settings.thumbnail_uri.as_deref() {
            thumbnail_url = Some(self.files.transform_relative(
                thumbnail_uri,
                None,
                UrlOptions::default(),
            ));
        } else if !external
            && let (Some(style), Some(uri)) = (style, uri.as_deref())
            && self.files.is_valid_uri(uri)
        {
            thumbnail_url = Some(self.files.transform_relative(uri, Some(style), UrlOptions::default()));
            if let Err(e) = self.ensure_derivative(style, uri) {
                tracing::debug!(uri, style = style.id(), error = %e, "thumbnail derivative unavailable");
            }
        }

        if let Some(url) = thumbnail_url {
            container.set("data-thumb", url.as_str());
            settings.blazies.set("thumbnail.url", url);
        }

        if is_static || fx.is_empty() {
            return None;
        }
        container.add_class("media--fx").set("data-animation", fx);

        if fx != "blur" || settings.blazies.get_bool("is.unstyled") {
            return None;
        }
        let blur_style = style.or_else(|| self.styles.get(DEFAULT_THUMBNAIL_STYLE))?;
        let uri = uri.filter(|u| self.files.is_valid_uri(u))?;
        match self.data_image(blur_style, &uri) {
            Ok(data) => {
                settings.blazies.set("use.loader", false);
                Some(data)
            }
            Err(e) => {
                tracing::debug!(uri = %uri, error = %e, "no blur placeholder");
                None
            }
        }
    }

    /// Inline the `style` derivative of `uri`, creating it first if missing.
    pub fn data_image(&self, style: &ImageStyle, uri: &str) -> Result<String, ResolveError> {
        let path = self.files.local_path(&style.build_uri(uri))?;
        self.cache.data_uri(&path, || {
            self.ensure_derivative(style, uri)?;
            data_uri(&path)
        })
    }

    /// Write the `style` derivative of `uri` unless it already exists.
    pub fn ensure_derivative(&self, style: &ImageStyle, uri: &str) -> Result<(), ResolveError> {
        let output = self.files.local_path(&style.build_uri(uri))?;
        if output.is_file() {
            return Ok(());
        }
        let source = self.files.local_path(uri)?;
        tracing::debug!(source = %source.display(), output = %output.display(), "creating derivative");
        self.backend
            .derive(&style.derive_params(&source, &output))
            .map_err(|e| ResolveError::Derive {
                path: output.clone(),
                source: e,
            })?;
        if output.is_file() {
            Ok(())
        } else {
            Err(ResolveError::MissingDerivative(output))
        }
    }
}

/// The temporary blurred image shown before the real one.
///
/// `None` for unstyled items. Wide elements get `media--fx-lg` on the
/// container.
pub fn blur(
    settings: &ItemSettings,
    container: &mut Attributes,
    data: &str,
    placeholder: &str,
) -> Option<Attributes> {
    if settings.blazies.get_bool("is.unstyled") {
        return None;
    }
    let mut preface = Attributes::new();
    preface
        .add_class("b-lazy")
        .add_class("b-blur")
        .add_class("b-blur--tmp")
        .set("src", placeholder)
        .set("data-src", data)
        .set("loading", "lazy")
        .set("decoding", "async");

    if settings.media.width.is_some_and(|w| w > FX_LARGE_WIDTH) {
        container.add_class("media--fx-lg");
    }
    Some(preface)
}
