//! URI and URL resolution for media files.
//!
//! Files are addressed two ways: a stream URI (`public://2024/a.jpg`) for
//! anything stored by the site, or a web URL for everything else. The
//! resolver turns either into the URL an element should load, optionally
//! through an image style, and finds the file's dimensions.
//!
//! ```text
//! public://a.jpg                → /sites/default/files/a.jpg
//! public://a.jpg + style large  → /sites/default/files/styles/large/public/a.jpg?itok=…
//! /sites/default/files/b.png    → public://b.png            (build_uri)
//! https://cdn.example.com/c.jpg → unchanged                  (external)
//! ```
//!
//! Nothing here fails a render. Operations that can miss return
//! [`ResolveError`] and the caller picks the fallback.

use crate::cache::RenderCache;
use crate::config::FilesConfig;
use crate::imaging::{BackendError, ImageBackend, ImageTransform};
use crate::types::{ItemSettings, Size};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::path::PathBuf;
use thiserror::Error;

/// Protocols a link may use. Anything else is considered dangerous.
pub const ALLOWED_PROTOCOLS: &[&str] = &[
    "ftp", "http", "https", "irc", "mailto", "news", "nntp", "rtsp", "sftp", "ssh", "tel",
    "telnet", "webcal",
];

/// Characters escaped in generated file paths; `/` is kept.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid URI: {0}")]
    InvalidUri(String),
    #[error("unknown image style: {0}")]
    UnknownStyle(String),
    #[error("unknown responsive image style: {0}")]
    UnknownResponsiveStyle(String),
    #[error("not probing remote file: {0}")]
    RemoteProbe(String),
    #[error("probe failed for {path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("derivative failed for {path}: {source}")]
    Derive {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("derivative missing: {0}")]
    MissingDerivative(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for [`FileResolver::transform_relative`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlOptions<'a> {
    /// A URL the caller already trusts; used instead of building one.
    pub url: Option<&'a str>,
    /// Strip dangerous protocols from the result.
    pub sanitize: bool,
}

/// Protocol-relative or using an allowed web protocol.
pub fn is_external(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    url::Url::parse(url).is_ok_and(|parsed| ALLOWED_PROTOCOLS.contains(&parsed.scheme()))
}

/// Remove leading protocols that are not in [`ALLOWED_PROTOCOLS`].
///
/// Repeats until stable, so `javascript:javascript:alert(1)` is fully
/// stripped. Text before a `/`, `?` or `#` is never treated as a protocol.
pub fn strip_dangerous_protocols(uri: &str) -> String {
    let mut current = uri;
    loop {
        let Some(colon) = current.find(':').filter(|pos| *pos > 0) else {
            break;
        };
        let protocol = &current[..colon];
        if protocol.contains(['/', '?', '#']) {
            break;
        }
        if ALLOWED_PROTOCOLS.contains(&protocol.to_lowercase().as_str()) {
            break;
        }
        current = &current[colon + 1..];
    }
    current.to_string()
}

/// Scheme of a stream URI, e.g. `public` for `public://a.jpg`.
pub fn scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Path of a stream URI below its scheme.
pub fn target(uri: &str) -> &str {
    match uri.split_once("://") {
        Some((_, target)) => target.trim_start_matches('/'),
        None => uri,
    }
}

/// Lower-cased extension of the last path segment, ignoring query and fragment.
pub fn extension(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_lowercase())
}

/// MIME type for common image extensions.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "apng" => "image/apng",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    })
}

/// Resolves stream URIs against the configured file locations.
#[derive(Debug, Clone, Copy)]
pub struct FileResolver<'a> {
    files: &'a FilesConfig,
}

impl<'a> FileResolver<'a> {
    pub fn new(files: &'a FilesConfig) -> Self {
        Self { files }
    }

    /// Scheme is configured and the target is not empty.
    pub fn is_valid_uri(&self, uri: &str) -> bool {
        scheme(uri).is_some_and(|s| self.files.schemes.iter().any(|known| known == s))
            && !target(uri).is_empty()
    }

    /// Root-relative web URL of a stream URI.
    pub fn file_url(&self, uri: &str) -> Result<String, ResolveError> {
        if !self.is_valid_uri(uri) {
            return Err(ResolveError::InvalidUri(uri.to_string()));
        }
        let scheme = scheme(uri).unwrap_or_default();
        let web_path = self
            .files
            .web_path(scheme)
            .ok_or_else(|| ResolveError::InvalidUri(uri.to_string()))?;
        let encoded = utf8_percent_encode(target(uri), PATH_ENCODE_SET);
        Ok(format!("{}/{web_path}/{encoded}", self.base_path()))
    }

    /// Web URL of the style derivative of `uri`.
    pub fn style_url(&self, style: &dyn ImageTransform, uri: &str) -> Result<String, ResolveError> {
        let url = self.file_url(&style.build_uri(uri))?;
        let separator = if url.contains('?') { '&' } else { '?' };
        Ok(format!("{url}{separator}itok={}", style.token(uri)))
    }

    /// Strip the site's own host so URLs stay root-relative.
    pub fn make_relative(&self, url: &str) -> String {
        let host = self.files.host.trim_end_matches('/');
        match url.strip_prefix(host) {
            Some(rest) if !host.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                if rest.is_empty() { "/".to_string() } else { rest.to_string() }
            }
            _ => url.to_string(),
        }
    }

    /// Turn a site URL back into a `public://` URI.
    ///
    /// Only works for URLs on this site that point into the public files
    /// directory; everything else is `None`.
    pub fn build_uri(&self, url: &str) -> Option<String> {
        let relative = self.make_relative(url);
        if is_external(&relative) || relative.starts_with("data:") {
            return None;
        }
        let path = relative.split(['?', '#']).next().unwrap_or_default();
        let path = path
            .strip_prefix(self.base_path().as_str())
            .filter(|_| !self.base_path().is_empty())
            .unwrap_or(path);
        let public_path = self.files.public_path.trim_matches('/');
        if public_path.is_empty() {
            return None;
        }
        let (_, rest) = path.split_once(public_path)?;
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            return None;
        }
        let decoded = percent_decode_str(rest).decode_utf8_lossy();
        Some(format!("public://{decoded}"))
    }

    /// The URL an element should load for `uri`.
    ///
    /// External URIs pass through. A valid stream URI without a trusted URL
    /// is resolved (through `style` when given) and made relative. Otherwise
    /// the trusted URL or the URI itself is used. With `sanitize`, dangerous
    /// protocols are stripped unless the result is an inline image.
    pub fn transform_relative(
        &self,
        uri: &str,
        style: Option<&dyn ImageTransform>,
        options: UrlOptions<'_>,
    ) -> String {
        let resolved = if is_external(uri) {
            Some(uri.to_string())
        } else if options.url.is_none() && self.is_valid_uri(uri) {
            let built = match style {
                Some(style) => self.style_url(style, uri),
                None => self.file_url(uri),
            };
            match built {
                Ok(url) => Some(self.make_relative(&url)),
                Err(e) => {
                    tracing::debug!(uri, error = %e, "falling back to raw URI");
                    None
                }
            }
        } else {
            None
        };

        let url = resolved
            .or_else(|| options.url.filter(|u| !u.is_empty()).map(str::to_string))
            .unwrap_or_else(|| uri.to_string());

        if options.sanitize && !url.starts_with("data:image") {
            strip_dangerous_protocols(&url)
        } else {
            url
        }
    }

    /// File on disk backing a stream URI.
    pub fn local_path(&self, uri: &str) -> Result<PathBuf, ResolveError> {
        if is_external(uri) {
            return Err(ResolveError::RemoteProbe(uri.to_string()));
        }
        if !self.is_valid_uri(uri) {
            return Err(ResolveError::InvalidUri(uri.to_string()));
        }
        let scheme = scheme(uri).unwrap_or_default();
        let dir = self
            .files
            .directory(scheme)
            .ok_or_else(|| ResolveError::InvalidUri(uri.to_string()))?;
        Ok(dir.join(target(uri)))
    }

    /// Fill in the URI, extension, external flag and unstyled state.
    ///
    /// Unstyled items (SVG and configured extensions) have every image style
    /// cleared so no derivative is ever requested for them.
    pub fn prepare(&self, settings: &mut ItemSettings, unstyled_extensions: &[String]) {
        if settings.media.uri.is_none()
            && let Some(url) = settings.media.url.as_deref()
        {
            settings.media.uri = self.build_uri(url);
        }

        let location = settings
            .media
            .uri
            .as_deref()
            .or(settings.media.url.as_deref())
            .unwrap_or_default()
            .to_string();
        let external = is_external(&location);
        settings.blazies.set("is.external", external);

        let ext = extension(&location).unwrap_or_default();
        let unstyled = !ext.is_empty() && unstyled_extensions.contains(&ext);
        settings.blazies.set("image.extension", ext);

        if unstyled {
            settings.image_style = None;
            settings.thumbnail_style = None;
            settings.box_style = None;
            settings.box_media_style = None;
            settings.responsive_image_style = None;
        }
        settings.blazies.set("is.unstyled", unstyled);
    }

    /// Resolve `image_url`, and the styled size when `style` applies.
    ///
    /// The styled size is only computed here when the responsive resolver has
    /// not already filled in dimensions.
    pub fn image_url(
        &self,
        settings: &mut ItemSettings,
        style: Option<&dyn ImageTransform>,
        cache: &RenderCache,
    ) {
        let sanitize = settings.check_protocol;
        let trusted = settings.image_url.clone();
        let url = match settings.media.uri.clone() {
            Some(uri) => {
                let styled = style.filter(|_| self.is_valid_uri(&uri));
                if let Some(style) = styled
                    && !settings.blazies.get_bool("_dimensions")
                {
                    let size = transform_dimensions(style, settings, true, cache);
                    settings.media.set_size(size);
                }
                self.transform_relative(
                    &uri,
                    styled,
                    UrlOptions {
                        url: trusted.as_deref(),
                        sanitize,
                    },
                )
            }
            None => {
                let raw = trusted
                    .or_else(|| settings.media.url.clone())
                    .unwrap_or_default();
                if sanitize && !raw.starts_with("data:image") {
                    strip_dangerous_protocols(&raw)
                } else {
                    raw
                }
            }
        };
        settings.image_url = (!url.is_empty()).then_some(url);
    }

    /// Fill unknown dimensions with one guarded probe of the local file.
    ///
    /// Probing only happens when no image style is set, because a style
    /// predicts its own output size. Returns the resulting size; errors mean
    /// the size stays unknown.
    pub fn image_dimensions(
        &self,
        settings: &mut ItemSettings,
        backend: &dyn ImageBackend,
    ) -> Result<Size, ResolveError> {
        let size = settings.size();
        if size.is_known() || settings.image_style.is_some() {
            return Ok(size);
        }
        let Some(uri) = settings.media.uri.clone() else {
            return Ok(size);
        };

        let path = self.local_path(&uri)?;
        let dims = backend
            .identify(&path)
            .map_err(|source| ResolveError::Probe { path, source })?;
        let probed = Size::new(dims.width, dims.height);
        settings.media.set_size(probed);
        Ok(probed)
    }

    fn base_path(&self) -> String {
        let trimmed = self.files.base_path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

/// Predicted output size of `style` for this item, memoised.
///
/// With `initial`, the original size recorded before any styling
/// (`original.width`/`original.height` in the bag) is the input; otherwise
/// the item's current size is.
pub fn transform_dimensions(
    style: &dyn ImageTransform,
    settings: &ItemSettings,
    initial: bool,
    cache: &RenderCache,
) -> Size {
    let uri = settings
        .media
        .uri
        .as_deref()
        .or(settings.media.url.as_deref())
        .unwrap_or_default();
    let input = if initial {
        original_size(settings)
    } else {
        settings.size()
    };
    cache.transform(style.id(), uri, initial, || {
        style.transform_dimensions(input, uri)
    })
}

/// Size recorded before styling, falling back to the current size.
pub fn original_size(settings: &ItemSettings) -> Size {
    let bag = &settings.blazies;
    let side = |path: &str| bag.get_u64(path).and_then(|v| u32::try_from(v).ok());
    match (side("original.width"), side("original.height")) {
        (Some(w), Some(h)) => Size::new(w, h),
        _ => settings.size(),
    }
}
