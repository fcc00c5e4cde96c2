//! Lightbox links.
//!
//! When an item's media switch names a configured lightbox, the element is
//! wrapped in a link that the lightbox script picks up. The link carries:
//!
//! - classes `blazy__<switch> litebox` and a `data-<switch>-trigger` flag,
//! - `data-media`: a JSON [`LightboxDescriptor`] with the box size and type,
//! - for videos, `data-oembed-url` (with autoplay forced) and `data-box-url`.
//!
//! Items are grouped into galleries by [`gallery_id`]. Captions come from
//! [`caption`], filtered down to a small set of inline tags.

use crate::attributes::Attributes;
use crate::cache::RenderCache;
use crate::config::BlazyConfig;
use crate::file::{FileResolver, ResolveError, UrlOptions, original_size, transform_dimensions};
use crate::imaging::{StyleRegistry, aspect_ratio, format_ratio};
use crate::responsive::{ResponsiveResolver, SourceSet};
use crate::types::{ItemSettings, Size};
use maud::html;
use serde::Serialize;
use std::collections::BTreeMap;

/// Tags kept in captions; everything else is stripped.
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "em", "strong", "h2", "p", "span", "ul", "ol", "li", "br",
];

const VIDEO_BUNDLES: &[&str] = &["video", "remote_video"];

/// How the lightbox should display the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoxType {
    Image,
    Iframe,
    Video,
    Picture,
    ResponsiveImage,
}

/// JSON attached to the link as `data-media`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightboxDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(rename = "boxType")]
    pub box_type: BoxType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// The link around a lightboxed element.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Lightbox {
    pub url: String,
    pub attributes: Attributes,
    pub descriptor: Option<LightboxDescriptor>,
    pub caption: Option<String>,
}

/// Append `autoplay=1` unless autoplay is already requested.
///
/// An explicit `autoplay=0` still gets `autoplay=1` appended; the later
/// parameter wins in every player we target.
pub fn add_autoplay(url: &str) -> String {
    if url.contains("autoplay") && !url.contains("autoplay=0") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}autoplay=1")
}

/// Gallery the item belongs to.
///
/// An explicit `gallery_id` wins; otherwise `<view>-<view mode>` inside a
/// view, or `blazy-<switch>`. Underscores become hyphens.
pub fn gallery_id(settings: &ItemSettings) -> String {
    let explicit = settings.gallery_id.as_deref().filter(|id| !id.is_empty());
    let id = match (explicit, settings.view_name.as_deref().filter(|v| !v.is_empty())) {
        (Some(id), _) => id.to_string(),
        (None, Some(view)) => match settings.current_view_mode.as_deref().filter(|m| !m.is_empty()) {
            Some(mode) => format!("{view}-{mode}"),
            None => view.to_string(),
        },
        (None, None) => match settings.switch_css() {
            Some(switch) => format!("blazy-{switch}"),
            None => "blazy".to_string(),
        },
    };
    id.replace('_', "-")
}

fn is_video(settings: &ItemSettings) -> bool {
    settings.media_type.as_deref() == Some("video")
        || settings
            .bundle
            .as_deref()
            .is_some_and(|b| VIDEO_BUNDLES.contains(&b))
}

/// Builds lightbox links for one render pass.
pub struct LightboxBuilder<'a> {
    config: &'a BlazyConfig,
    files: FileResolver<'a>,
    styles: &'a StyleRegistry,
    cache: &'a RenderCache,
}

impl<'a> LightboxBuilder<'a> {
    pub fn new(
        config: &'a BlazyConfig,
        styles: &'a StyleRegistry,
        cache: &'a RenderCache,
    ) -> Self {
        Self {
            config,
            files: FileResolver::new(&config.files),
            styles,
            cache,
        }
    }

    /// The link for `settings`, or `None` when the switch is not a lightbox.
    ///
    /// The `content` switch only yields a plain link to `content_url`.
    pub fn build(&self, settings: &mut ItemSettings) -> Option<Lightbox> {
        let switch = settings.media_switch.clone().filter(|s| !s.is_empty())?;
        if switch == "content" {
            let url = settings.content_url.clone().filter(|u| !u.is_empty())?;
            return Some(Lightbox {
                url,
                ..Lightbox::default()
            });
        }
        if !self.config.is_lightbox(&switch) {
            return None;
        }
        let switch_css = settings.switch_css()?;

        let mut attributes = Attributes::new();
        attributes
            .add_class(&format!("blazy__{switch_css} litebox"))
            .flag(&format!("data-{switch_css}-trigger"));

        let gallery = gallery_id(settings);
        settings.blazies.set("lightbox.gallery_id", gallery.as_str());

        let uri = settings.media.uri.clone().filter(|u| self.files.is_valid_uri(u));
        let mut box_url = match uri.as_deref() {
            Some(uri) => self.files.transform_relative(uri, None, UrlOptions::default()),
            None => settings
                .image_url
                .clone()
                .or_else(|| settings.media.url.clone())
                .unwrap_or_default(),
        };
        let mut box_size = original_size(settings);
        let video = is_video(settings);

        let mut descriptor = LightboxDescriptor {
            id: switch_css.clone(),
            bundle: settings.bundle.clone().filter(|b| !b.is_empty()),
            media_type: settings.media_type.clone().filter(|t| !t.is_empty()),
            width: None,
            height: None,
            box_type: BoxType::Image,
            rel: None,
            html: None,
        };

        let mut picture = None;
        if let (Some(uri), Some(box_style)) = (uri.as_deref(), settings.box_style.clone()) {
            match self.box_picture(&box_style, settings, video) {
                Some(set) => {
                    descriptor.media_type = Some("rich".to_string());
                    picture = Some(picture_html(&set));
                }
                None => match self.styles.get(&box_style) {
                    Some(style) => {
                        box_size = transform_dimensions(style, settings, true, self.cache);
                        box_url = self.files.transform_relative(uri, Some(style), UrlOptions::default());
                    }
                    None => {
                        let e = ResolveError::UnknownStyle(box_style);
                        tracing::debug!(error = %e, "box style ignored");
                    }
                },
            }
        }
        descriptor.width = box_size.width;
        descriptor.height = box_size.height;

        let mut box_media = None;
        if let (Some(uri), Some(id)) = (uri.as_deref(), settings.box_media_style.as_deref()) {
            match self.styles.get(id) {
                Some(style) => {
                    box_media = Some((
                        self.files.transform_relative(uri, Some(style), UrlOptions::default()),
                        transform_dimensions(style, settings, true, self.cache),
                    ));
                }
                None => tracing::debug!(style = id, "unknown box media style"),
            }
        }

        let mut url = box_url.clone();
        if video {
            descriptor.width = Some(self.config.lightbox.video_width);
            descriptor.height = Some(self.config.lightbox.video_height);

            if let Some(embed_url) = settings.embed_url.as_deref().filter(|u| !u.is_empty()) {
                url = add_autoplay(embed_url);
                attributes.set("data-oembed-url", url.as_str());
                descriptor.box_type = BoxType::Iframe;
            }
            if let Some((media_url, media_size)) = &box_media {
                box_url = media_url.clone();
                descriptor.width = media_size.width;
                descriptor.height = media_size.height;
            }
            if switch == "photobox" {
                attributes.set("rel", "video");
            }
            if !box_url.is_empty() {
                attributes.set("data-box-url", box_url.as_str());
            }
        }

        if switch == "colorbox" {
            descriptor.rel = Some(gallery.clone());
        }

        let has_dimensions = Size {
            width: descriptor.width,
            height: descriptor.height,
        }
        .is_known();
        if !has_dimensions {
            descriptor.width = None;
            descriptor.height = None;
        }

        if let Some(html) = picture {
            descriptor.box_type = if html.contains("<picture") {
                BoxType::Picture
            } else {
                BoxType::ResponsiveImage
            };
            descriptor.html = Some(html);
        } else if let Some(inline) = settings.lightbox_html.as_deref().filter(|h| !h.trim().is_empty()) {
            let html = wrap_inline_html(inline, descriptor.width, descriptor.height);
            if html.contains("<video") {
                descriptor.box_type = BoxType::Video;
            }
            descriptor.html = Some(html);
        }

        attributes.set(
            "data-media",
            serde_json::to_string(&descriptor).unwrap_or_default(),
        );

        Some(Lightbox {
            url,
            attributes,
            caption: caption(settings),
            descriptor: Some(descriptor),
        })
    }

    /// Sources for a responsive box style, when `box_style` names one.
    fn box_picture(
        &self,
        box_style: &str,
        settings: &ItemSettings,
        video: bool,
    ) -> Option<SourceSet> {
        if video || settings.lightbox_html.is_some() {
            return None;
        }
        let resolver = ResponsiveResolver::new(self.config, self.styles, self.cache);
        let responsive = resolver.style(box_style).ok()?;
        resolver.sources(responsive, settings, &self.files)
    }
}

/// `<picture>` markup for a set of sources.
pub fn picture_html(set: &SourceSet) -> String {
    html! {
        picture {
            @for source in &set.items {
                source srcset=(source.srcset) media=(source.media)
                    sizes=[source.sizes.as_deref()] type=[source.mime.as_deref()];
            }
            @if let Some(fallback) = &set.fallback {
                img src=(fallback) alt="";
            }
        }
    }
    .into_string()
}

/// Wrap inline HTML in a box keeping the item's aspect ratio.
fn wrap_inline_html(inline: &str, width: Option<u32>, height: Option<u32>) -> String {
    let style = match (width, height) {
        (Some(w), Some(h)) => Some(format!(
            "width:{w}px; padding-bottom: {}%;",
            format_ratio(aspect_ratio(Some(w), Some(h)))
        )),
        _ => None,
    };
    html! {
        div class="media media--ratio" style=[style] {
            (maud::PreEscaped(inline.trim()))
        }
    }
    .into_string()
}

/// Lightbox caption for the item's `box_caption` mode.
///
/// | Mode | Caption |
/// |---|---|
/// | `auto` | alt, else title |
/// | `alt`, `title` | that text |
/// | `alt_title`, `title_alt` | `<p>alt</p>` and `<h2>title</h2>` in that order |
/// | `entity_title` | the owning entity's label |
/// | `custom` | `box_caption_custom` with `[token]`s replaced |
/// | `inline` | none |
/// | anything else | the mode text itself |
pub fn caption(settings: &ItemSettings) -> Option<String> {
    let mode = settings.box_caption.as_deref().filter(|m| !m.is_empty())?;
    let alt = settings.media.alt.clone().unwrap_or_default();
    let title = settings.media.title.clone().unwrap_or_default();

    let text = match mode {
        "auto" => {
            if alt.is_empty() {
                title
            } else {
                alt
            }
        }
        "alt" => alt,
        "title" => title,
        "alt_title" | "title_alt" => {
            let alt = wrap_nonempty("p", &alt);
            let title = wrap_nonempty("h2", &title);
            if mode == "alt_title" {
                alt + &title
            } else {
                title + &alt
            }
        }
        "entity_title" => settings.media.label.clone().unwrap_or_default(),
        "custom" => custom_caption(settings),
        "inline" => String::new(),
        literal => literal.to_string(),
    };

    let filtered = filter_tags(&text);
    let filtered = filtered.trim();
    (!filtered.is_empty()).then(|| filtered.to_string())
}

fn wrap_nonempty(tag: &str, text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("<{tag}>{text}</{tag}>")
    }
}

/// Token-replaced custom caption; multi-value text picks the item's delta.
fn custom_caption(settings: &ItemSettings) -> String {
    let Some(template) = settings.box_caption_custom.as_deref() else {
        return String::new();
    };
    let caption = replace_tokens(template, &settings.media.tokens);
    if !caption.contains(", <p>") {
        return caption;
    }
    caption
        .replace(", <p>", "| <p>")
        .split('|')
        .nth(settings.delta)
        .unwrap_or_default()
        .to_string()
}

/// Replace `[name]` tokens from `tokens`; unknown tokens are removed.
pub fn replace_tokens(template: &str, tokens: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let token_end = after
            .find(']')
            .filter(|end| !after[..*end].is_empty())
            .filter(|end| !after[..*end].contains(['[', ' ', '\n', '\t']));
        match token_end {
            Some(end) => {
                if let Some(value) = tokens.get(&after[..end]) {
                    out.push_str(value);
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Keep only [`ALLOWED_TAGS`], without event handlers or inline styles.
///
/// Disallowed tags are dropped but their text kept. A `<` that does not open
/// a tag is escaped. Link targets lose dangerous protocols.
pub fn filter_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            out.push_str("&lt;");
            rest = after;
            continue;
        };
        if let Some(tag) = filter_tag(&after[..end]) {
            out.push_str(&tag);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn filter_tag(inner: &str) -> Option<String> {
    let (closing, body) = match inner.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, inner),
    };
    let body = body.trim_end_matches('/').trim();
    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let name = body[..name_end].to_lowercase();
    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return None;
    }
    if closing {
        return Some(format!("</{name}>"));
    }

    let mut tag = format!("<{name}");
    for (attr, value) in parse_attributes(&body[name_end..]) {
        let attr = attr.to_lowercase();
        if attr.starts_with("on") || attr == "style" {
            continue;
        }
        let value = match attr.as_str() {
            "href" | "src" => crate::file::strip_dangerous_protocols(&value),
            _ => value,
        };
        tag.push_str(&format!(" {attr}=\"{}\"", value.replace('"', "&quot;")));
    }
    tag.push('>');
    Some(tag)
}

fn parse_attributes(mut input: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    loop {
        input = input.trim_start();
        if input.is_empty() {
            break;
        }
        let name_end = input
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(input.len());
        let name = input[..name_end].to_string();
        input = input[name_end..].trim_start();

        let Some(value_part) = input.strip_prefix('=') else {
            if !name.is_empty() {
                attrs.push((name, String::new()));
            }
            if name_end == 0 {
                // Unparseable remainder.
                break;
            }
            continue;
        };
        let value_part = value_part.trim_start();
        let (value, remaining) = match value_part.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &value_part[1..];
                match body.find(quote) {
                    Some(close) => (&body[..close], &body[close + 1..]),
                    None => (body, ""),
                }
            }
            _ => {
                let end = value_part
                    .find(char::is_whitespace)
                    .unwrap_or(value_part.len());
                (&value_part[..end], &value_part[end..])
            }
        };
        if !name.is_empty() {
            attrs.push((name, value.to_string()));
        }
        input = remaining;
    }
    attrs
}
