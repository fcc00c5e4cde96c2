//! The render pass.
//!
//! [`BlazyManager`] owns everything that outlives one element (config, the
//! style registry, the [`RenderCache`] and the image backend) and turns one
//! [`ItemSettings`] into a [`Rendered`] element:
//!
//! ```text
//! prepare        URI, extension, external/unstyled flags
//! thumbnail      data-thumb, blur data URI
//! dimensions     explicit size, else one guarded probe
//! decide         lazy or not, recorded as is.* in the bag
//! responsive     per-breakpoint dimensions and fallback style
//! image_url      styled URL and size
//! placeholder    custom, or SVG sized to the element
//! media          <img>, <iframe>, or CSS background
//! ratio          fluid padding or fixed ratio classes
//! lightbox       link, gallery descriptor, caption
//! ```
//!
//! The pass never fails. A resolver error costs the feature that needed it
//! (a styled URL, a probed size, a blur) and is logged through [`degrade`].

use crate::attributes::{
    Attributes, LoadDecision, aspect_ratio_attributes, background_attributes,
    container_attributes, container_classes, decide, iframe_attributes, iframe_container,
    image_attributes, record_decision, single_background,
};
use crate::cache::RenderCache;
use crate::config::BlazyConfig;
use crate::file::{FileResolver, ResolveError};
use crate::imaging::{ImageBackend, ImageTransform, StyleRegistry};
use crate::lightbox::{Lightbox, LightboxBuilder};
use crate::placeholder::{self, Thumbnailer};
use crate::responsive::{PreloadLink, ResponsiveResolver, SourceSet, preload_links};
use crate::types::{ItemSettings, RenderContext};
use maud::{Markup, PreEscaped, html};
use rayon::prelude::*;
use serde::Serialize;

/// One rendered element: attribute maps plus the final item state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    /// The `.media` container.
    pub container: Attributes,
    pub image: Option<Attributes>,
    /// `<img>` copy for browsers without JavaScript.
    pub noscript: Option<Attributes>,
    pub iframe: Option<Attributes>,
    /// Blurred placeholder image shown before the real one.
    pub preface: Option<Attributes>,
    /// `<source>` elements when the image is a `<picture>`.
    pub sources: Vec<Attributes>,
    pub preloads: Vec<PreloadLink>,
    pub lightbox: Option<Lightbox>,
    /// Item settings after every stage, including the `blazies` bag.
    pub settings: ItemSettings,
}

impl Rendered {
    pub fn caption(&self) -> Option<&str> {
        self.lightbox.as_ref().and_then(|l| l.caption.as_deref())
    }

    /// Link target, when the element is wrapped in a link.
    pub fn url(&self) -> Option<&str> {
        self.lightbox.as_ref().map(|l| l.url.as_str())
    }

    /// The element as HTML.
    pub fn to_markup(&self) -> Markup {
        let link = self.lightbox.as_ref().map(|lightbox| {
            let mut attrs = lightbox.attributes.clone();
            attrs.set("href", lightbox.url.as_str());
            attrs
        });
        html! {
            @if let Some(link) = &link {
                (open_tag("a", link))
            }
            (open_tag("div", &self.container))
            @if let Some(preface) = &self.preface {
                (open_tag("img", preface))
            }
            @if let Some(iframe) = &self.iframe {
                (open_tag("iframe", iframe))
                (PreEscaped("</iframe>"))
            }
            @if let Some(image) = &self.image {
                @if self.sources.is_empty() {
                    (open_tag("img", image))
                } @else {
                    (PreEscaped("<picture>"))
                    @for source in &self.sources {
                        (open_tag("source", source))
                    }
                    (open_tag("img", image))
                    (PreEscaped("</picture>"))
                }
            }
            @if let Some(noscript) = &self.noscript {
                noscript { (open_tag("img", noscript)) }
            }
            (PreEscaped("</div>"))
            @if let Some(caption) = self.caption() {
                div class="litebox-caption visually-hidden" { (PreEscaped(caption)) }
            }
            @if link.is_some() {
                (PreEscaped("</a>"))
            }
        }
    }

    /// `<link>` elements for the page head.
    pub fn preload_markup(&self) -> Markup {
        html! {
            @for link in &self.preloads {
                (open_tag("link", &link.attributes))
            }
        }
    }
}

fn open_tag(tag: &str, attributes: &Attributes) -> PreEscaped<String> {
    PreEscaped(format!("<{tag}{}>", attributes.to_html()))
}

/// Log a resolver error and continue without the value.
///
/// I/O and pixel failures are warnings; misses that config or input explain
/// (unknown styles, remote files) are debug noise.
pub fn degrade<T>(result: Result<T, ResolveError>, fallback: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            match &e {
                ResolveError::Io(_)
                | ResolveError::Probe { .. }
                | ResolveError::Derive { .. }
                | ResolveError::MissingDerivative(_) => {
                    tracing::warn!(error = %e, fallback, "resolve failed");
                }
                _ => tracing::debug!(error = %e, fallback, "resolve skipped"),
            }
            None
        }
    }
}

/// Renders elements against one configuration.
///
/// Cheap to share: `render` takes `&self`, and [`render_all`] fans a batch
/// out over the rayon pool with one shared cache.
///
/// [`render_all`]: BlazyManager::render_all
pub struct BlazyManager<B: ImageBackend> {
    config: BlazyConfig,
    styles: StyleRegistry,
    unstyled: Vec<String>,
    cache: RenderCache,
    backend: B,
}

impl<B: ImageBackend> BlazyManager<B> {
    pub fn new(config: BlazyConfig, backend: B) -> Self {
        Self::with_cache(config, backend, RenderCache::new())
    }

    /// Use an existing cache, e.g. one kept across config reloads.
    pub fn with_cache(config: BlazyConfig, backend: B, cache: RenderCache) -> Self {
        Self {
            styles: StyleRegistry::from_config(&config.styles),
            unstyled: config.unstyled_extensions(),
            config,
            cache,
            backend,
        }
    }

    pub fn config(&self) -> &BlazyConfig {
        &self.config
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Render one element.
    pub fn render(&self, ctx: &RenderContext, mut settings: ItemSettings) -> Rendered {
        let ui = &self.config.ui;
        let files = FileResolver::new(&self.config.files);
        let responsive = ResponsiveResolver::new(&self.config, &self.styles, &self.cache);
        let thumbnailer = Thumbnailer::new(files, &self.styles, &self.backend, &self.cache);
        let mut container = Attributes::new();

        files.prepare(&mut settings, &self.unstyled);

        let fx = settings
            .fx
            .clone()
            .filter(|fx| !fx.is_empty())
            .unwrap_or_else(|| ui.fx.clone());
        let blur_data = thumbnailer.thumbnail(&mut settings, &mut container, &fx, ctx.is_static());

        degrade(
            files.image_dimensions(&mut settings, &self.backend),
            "size unknown",
        );
        if let (Some(width), Some(height)) = (settings.media.width, settings.media.height) {
            settings
                .blazies
                .set("original.width", width)
                .set("original.height", height);
        }

        let decision = decide(ctx, &settings, ui);
        record_decision(&mut settings, ctx, decision);

        let responsive_style = settings
            .responsive_image_style
            .clone()
            .and_then(|id| {
                let style = degrade(responsive.style(&id), "plain image")?;
                settings.blazies.set("resimage.id", id);
                Some(style)
            });
        if let Some(style) = responsive_style {
            responsive.dimensions(style, &mut settings, true);
            let early = placeholder::for_size(ui, settings.size());
            responsive.fallback(style, &mut settings, &early);
        }

        let image_style = settings.image_style.clone().and_then(|id| {
            degrade(
                self.styles
                    .get(&id)
                    .ok_or(ResolveError::UnknownStyle(id)),
                "original image",
            )
        });
        files.image_url(
            &mut settings,
            image_style.map(|s| s as &dyn ImageTransform),
            &self.cache,
        );

        let placeholder_url = placeholder::for_size(ui, settings.size());
        settings.blazies.set("ui.placeholder", placeholder_url.as_str());
        if !settings.blazies.contains("use.loader") {
            settings.blazies.set("use.loader", decision.is_lazy());
        }

        let is_iframe = settings.embed_url.as_deref().is_some_and(|u| !u.is_empty())
            && matches!(settings.media_type(), "video" | "audio");
        settings.blazies.set("use.media", is_iframe);

        let mut image = None;
        let mut noscript = None;
        let mut iframe = None;
        let mut sources = Vec::new();
        let mut source_set = None;

        if is_iframe {
            iframe_container(&mut container, &settings);
            iframe = Some(iframe_attributes(&settings, ctx, decision));
        }

        if settings.background {
            match responsive_style {
                Some(style) => {
                    responsive.to_background(style, &mut settings, &files, decision.is_undata());
                }
                None => single_background(&mut settings, decision.is_undata(), &placeholder_url),
            }
            background_attributes(&mut container, &settings, ui, decision);
        } else if settings.image_url.is_some() {
            let built = image_attributes(&settings, ui, decision, &placeholder_url);
            let mut img = built.image;
            if let Some(style) = responsive_style {
                source_set = responsive.sources(style, &settings, &files);
                if let Some(set) = &source_set {
                    img.add_class("b-responsive");
                    if decision.is_lazy() {
                        if ui.one_pixel {
                            img.flag("data-b-lazy");
                        }
                        img.set("data-placeholder", placeholder_url.as_str());
                    }
                    sources = source_attributes(set, decision);
                }
            }
            image = Some(img);
            noscript = built.noscript;
        }

        let preface = blur_data
            .as_deref()
            .and_then(|data| placeholder::blur(&settings, &mut container, data, &placeholder_url));

        aspect_ratio_attributes(&mut container, &settings, ctx);
        container_classes(&mut container, &settings, decision);

        let preloads = if settings.preload {
            preload_links(&settings, source_set.as_ref())
        } else {
            Vec::new()
        };

        let lightbox = LightboxBuilder::new(&self.config, &self.styles, &self.cache).build(&mut settings);

        tracing::trace!(
            uri = settings.media.uri.as_deref().unwrap_or_default(),
            ?decision,
            "rendered"
        );
        Rendered {
            container,
            image,
            noscript,
            iframe,
            preface,
            sources,
            preloads,
            lightbox,
            settings,
        }
    }

    /// Render a batch in parallel, keeping input order.
    pub fn render_all(&self, ctx: &RenderContext, items: Vec<ItemSettings>) -> Vec<Rendered> {
        items
            .into_par_iter()
            .map(|item| self.render(ctx, item))
            .collect()
    }

    /// Attributes of the field or view wrapper around a set of elements.
    ///
    /// Reads the shared options from the first element; `blazies.data`, when
    /// present, becomes the `data-blazy` JSON.
    pub fn wrapper(&self, ctx: &RenderContext, settings: &ItemSettings) -> Attributes {
        let decision = decide(ctx, settings, &self.config.ui);
        container_attributes(settings, decision, settings.blazies.get("data"))
    }
}

/// `<source>` attributes; lazy sources keep the real srcset in `data-srcset`.
fn source_attributes(set: &SourceSet, decision: LoadDecision) -> Vec<Attributes> {
    set.items
        .iter()
        .map(|source| {
            let mut attrs = Attributes::new();
            attrs.set("media", source.media.as_str());
            if decision.is_lazy() {
                attrs
                    .set("data-srcset", source.srcset.as_str())
                    .set("srcset", "");
            } else {
                attrs.set("srcset", source.srcset.as_str());
            }
            if let Some(sizes) = &source.sizes {
                attrs.set("sizes", sizes.as_str());
            }
            if let Some(mime) = &source.mime {
                attrs.set("type", mime.as_str());
            }
            attrs
        })
        .collect()
}
