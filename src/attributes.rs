//! HTML attributes for lazy-loaded media.
//!
//! An element is either *lazy* (the real URL waits in `data-src` and `src`
//! shows a placeholder until a loader script swaps them) or *unlazy* (the
//! real URL goes straight into `src`). [`decide`] makes that choice once per
//! element; the builders below then only read the [`LoadDecision`].
//!
//! ## Decision order
//!
//! | Condition | Decision | Lazy |
//! |---|---|---|
//! | AMP, preview or sandboxed page | [`LoadDecision::Static`] | no |
//! | `loading = unlazy` | [`LoadDecision::Unloading`] | no |
//! | `loading = eager` | [`LoadDecision::Eager`] | no |
//! | `loading = defer` | [`LoadDecision::Deferred`] | yes |
//! | initial slide of a slider | [`LoadDecision::Initial`] | no |
//! | `ui.nojs_lazy` | [`LoadDecision::NoJs`] | no |
//! | otherwise | [`LoadDecision::Lazy`] | yes |
//!
//! The first matching row wins, so `defer` keeps an element lazy even when
//! the site turns JavaScript lazy loading off, but never on a static page.

use crate::config::UiConfig;
use crate::imaging::{format_ratio, round2};
use crate::types::{ItemSettings, LoadingMode, RenderContext};
use maud::Escaper;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Value of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    /// Present without a value, e.g. `allowfullscreen`.
    Flag,
    /// Space-separated class list, in insertion order, without duplicates.
    Classes(Vec<String>),
}

/// Attribute map of one element, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    attrs: BTreeMap<String, AttrValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.attrs
            .insert(name.to_string(), AttrValue::Text(value.into()));
        self
    }

    pub fn flag(&mut self, name: &str) -> &mut Self {
        self.attrs.insert(name.to_string(), AttrValue::Flag);
        self
    }

    /// Add one or more space-separated classes.
    pub fn add_class(&mut self, classes: &str) -> &mut Self {
        let entry = self
            .attrs
            .entry("class".to_string())
            .or_insert_with(|| AttrValue::Classes(Vec::new()));
        if !matches!(entry, AttrValue::Classes(_)) {
            let existing = match entry {
                AttrValue::Text(text) => text.split_whitespace().map(str::to_string).collect(),
                _ => Vec::new(),
            };
            *entry = AttrValue::Classes(existing);
        }
        if let AttrValue::Classes(list) = entry {
            for class in classes.split_whitespace() {
                if !list.iter().any(|c| c == class) {
                    list.push(class.to_string());
                }
            }
        }
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list().contains(&class)
    }

    pub fn class_list(&self) -> Vec<&str> {
        match self.attrs.get("class") {
            Some(AttrValue::Classes(list)) => list.iter().map(String::as_str).collect(),
            Some(AttrValue::Text(text)) => text.split_whitespace().collect(),
            _ => Vec::new(),
        }
    }

    /// Append a declaration to the inline `style`.
    pub fn append_style(&mut self, css: &str) -> &mut Self {
        let style = match self.get("style") {
            Some(existing) => format!("{existing}{css}"),
            None => css.to_string(),
        };
        self.set("style", style)
    }

    /// Text value of `name`. Flags and class lists have none.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name)? {
            AttrValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        self.attrs.remove(name)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy `other` over this map. Classes are unioned.
    pub fn merge(&mut self, other: &Attributes) -> &mut Self {
        for (name, value) in other.iter() {
            match value {
                AttrValue::Classes(list) => {
                    for class in list {
                        self.add_class(class);
                    }
                }
                value => {
                    self.attrs.insert(name.to_string(), value.clone());
                }
            }
        }
        self
    }

    /// Attributes as HTML, each preceded by a space, values escaped.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for (name, value) in &self.attrs {
            html.push(' ');
            html.push_str(name);
            let text = match value {
                AttrValue::Flag => continue,
                AttrValue::Text(text) => text.clone(),
                AttrValue::Classes(list) => list.join(" "),
            };
            html.push_str("=\"");
            // Writing into a String cannot fail.
            let _ = write!(Escaper::new(&mut html), "{text}");
            html.push('"');
        }
        html
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attrs.len()))?;
        for (name, value) in &self.attrs {
            match value {
                AttrValue::Text(text) => map.serialize_entry(name, text)?,
                AttrValue::Flag => map.serialize_entry(name, &true)?,
                AttrValue::Classes(list) => map.serialize_entry(name, &list.join(" "))?,
            }
        }
        map.end()
    }
}

/// How one element loads, decided once per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDecision {
    /// AMP, preview or sandboxed page.
    Static,
    /// `loading = unlazy`.
    Unloading,
    /// `loading = eager`: native hint only.
    Eager,
    /// `loading = defer`: lazy regardless of `ui.nojs_lazy`.
    Deferred,
    /// Initially visible slide.
    Initial,
    /// Lazy loading without JavaScript is disabled site-wide.
    NoJs,
    Lazy,
}

impl LoadDecision {
    pub fn is_lazy(self) -> bool {
        matches!(self, Self::Lazy | Self::Deferred)
    }

    pub fn is_unlazy(self) -> bool {
        !self.is_lazy()
    }

    /// No data attributes at all: static pages and explicit `unlazy`.
    pub fn is_undata(self) -> bool {
        matches!(self, Self::Static | Self::Unloading)
    }

    /// Elements the loader script must leave alone.
    pub fn is_unloading(self) -> bool {
        matches!(self, Self::Unloading | Self::Initial)
    }
}

/// Decide how an element loads; see the module docs for the order.
pub fn decide(ctx: &RenderContext, settings: &ItemSettings, ui: &UiConfig) -> LoadDecision {
    if ctx.is_static() {
        return LoadDecision::Static;
    }
    match settings.loading {
        LoadingMode::Unlazy => LoadDecision::Unloading,
        LoadingMode::Eager => LoadDecision::Eager,
        LoadingMode::Defer => LoadDecision::Deferred,
        _ if settings.is_initial_slide() => LoadDecision::Initial,
        _ if ui.nojs_lazy => LoadDecision::NoJs,
        _ => LoadDecision::Lazy,
    }
}

/// Record the decision in the item's bag for later stages and callers.
pub fn record_decision(settings: &mut ItemSettings, ctx: &RenderContext, decision: LoadDecision) {
    settings
        .blazies
        .set("is.amp", ctx.is_amp)
        .set("is.preview", ctx.is_preview)
        .set("is.sandboxed", ctx.is_sandboxed)
        .set("is.static", ctx.is_static())
        .set("is.undata", decision.is_undata())
        .set("is.unlazy", decision.is_unlazy())
        .set("is.unloading", decision.is_unloading())
        .set("is.nojs", decision == LoadDecision::NoJs);
}

/// `media__element` and the native `loading` hint.
pub fn common_attributes(attributes: &mut Attributes, settings: &ItemSettings) {
    attributes.add_class("media__element");
    if settings.media.width.is_some_and(|w| w > 0) && settings.loading.is_native_hint() {
        attributes.set("loading", settings.loading.as_str());
    }
}

/// Lazy class, and `data-<lazy_attribute>` with the real URL when lazy.
pub fn lazy_attributes(
    attributes: &mut Attributes,
    settings: &ItemSettings,
    ui: &UiConfig,
    decision: LoadDecision,
) {
    attributes.add_class(&ui.lazy_class);
    if decision.is_lazy() {
        let url = settings.image_url.as_deref().unwrap_or_default();
        attributes.set(&format!("data-{}", ui.lazy_attribute), url);
    }
}

/// `data-b-unloading` for elements the loader must skip.
pub fn unloading(attributes: &mut Attributes, decision: LoadDecision) {
    if decision.is_unloading() {
        attributes.flag("data-b-unloading");
    }
}

/// An `<img>` and its optional `<noscript>` twin.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttributes {
    pub image: Attributes,
    pub noscript: Option<Attributes>,
}

/// Attributes of the `<img>` element.
///
/// Lazy images show `placeholder` in `src`; unlazy ones the real URL.
pub fn image_attributes(
    settings: &ItemSettings,
    ui: &UiConfig,
    decision: LoadDecision,
    placeholder: &str,
) -> ImageAttributes {
    let mut image = Attributes::new();
    let url = settings.image_url.as_deref().unwrap_or_default();

    if let Some(alt) = settings.media.alt.as_deref().map(str::trim) {
        image.set("alt", alt);
    }
    if let Some(title) = settings
        .media
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        image.set("title", title);
    }
    if !settings.blazies.get_bool("is.unstyled")
        && let (Some(width), Some(height)) = (settings.media.width, settings.media.height)
    {
        image
            .set("width", width.to_string())
            .set("height", height.to_string());
    }

    image.add_class("media__image").set("decoding", "async");
    if let Some(uuid) = settings.entity_uuid.as_deref().filter(|u| !u.is_empty()) {
        image.set("data-entity-uuid", uuid);
    }
    common_attributes(&mut image, settings);
    image.set("src", if decision.is_lazy() { placeholder } else { url });

    let noscript = (ui.noscript && decision.is_lazy()).then(|| {
        let mut twin = image.clone();
        twin.set("src", url).flag("data-b-noscript");
        twin
    });

    lazy_attributes(&mut image, settings, ui, decision);
    unloading(&mut image, decision);
    ImageAttributes { image, noscript }
}

/// Attributes of an `<iframe>` for remote video or audio.
pub fn iframe_attributes(
    settings: &ItemSettings,
    ctx: &RenderContext,
    decision: LoadDecision,
) -> Attributes {
    let embed_url = settings.embed_url.as_deref().unwrap_or_default();
    let mut iframe = Attributes::new();
    iframe.add_class("b-lazy media__iframe").flag("allowfullscreen");

    if ctx.is_sandboxed {
        iframe.flag("sandbox").set("src", embed_url);
    } else if decision.is_unlazy() {
        iframe.set("src", embed_url);
    } else {
        iframe.set("data-src", embed_url).set("src", "about:blank");
    }
    common_attributes(&mut iframe, settings);
    iframe
}

/// Marks the container as holding an iframe of `type`.
pub fn iframe_container(container: &mut Attributes, settings: &ItemSettings) {
    let media = json!({ "type": settings.media_type() });
    container.set("data-media", media.to_string());
}

/// CSS background mode on the container.
///
/// Reads the `bgs` bag entry; static pages also get an inline
/// `background-image`.
pub fn background_attributes(
    container: &mut Attributes,
    settings: &ItemSettings,
    ui: &UiConfig,
    decision: LoadDecision,
) {
    lazy_attributes(container, settings, ui, decision);
    let Some(bgs) = settings.blazies.get("bgs").filter(|v| crate::settings::is_truthy(v)) else {
        return;
    };
    container
        .add_class("b-bg media--background")
        .set("data-b-bg", bgs.to_string());

    if decision == LoadDecision::Static
        && let Some(url) = settings.image_url.as_deref().filter(|u| !u.is_empty())
    {
        container.append_style(&format!("background-image: url({url});"));
    }
}

/// Record a single-image background source keyed by the item's width.
///
/// Unless `undata`, the item's `image_url` is swapped for `placeholder`;
/// the real URL then only lives in `data-b-bg`.
pub fn single_background(settings: &mut ItemSettings, undata: bool, placeholder: &str) {
    let Some(url) = settings.image_url.clone().filter(|u| !u.is_empty()) else {
        return;
    };
    let width = settings.media.width.unwrap_or_default();
    settings.blazies.set(
        &format!("bgs.{width}"),
        json!({ "src": url, "ratio": settings.size().ratio() }),
    );
    if !undata {
        settings.image_url = Some(placeholder.to_string());
    }
}

/// Aspect ratio classes and the fluid `padding-bottom`.
pub fn aspect_ratio_attributes(
    container: &mut Attributes,
    settings: &ItemSettings,
    ctx: &RenderContext,
) {
    let Some(ratio) = settings.ratio.as_deref().filter(|r| !r.is_empty()) else {
        return;
    };
    let Some(width) = settings.media.width.filter(|w| *w > 0) else {
        return;
    };
    if ctx.is_amp {
        return;
    }

    container
        .add_class("media--ratio")
        .add_class(&format!("media--ratio--{}", ratio.replace(':', "")));

    if settings.is_fluid()
        && let Some(height) = settings.media.height.filter(|h| *h > 0)
    {
        let padding = settings
            .blazies
            .get_f64("item.padding_bottom")
            .unwrap_or_else(|| round2(height as f64 / width as f64 * 100.0));
        let padding = format_ratio(padding);
        container
            .append_style(&format!("padding-bottom: {padding}%;"))
            .set("data-ratio", padding);
    }
}

/// Classes and data attributes of the `.media` container.
pub fn container_classes(
    container: &mut Attributes,
    settings: &ItemSettings,
    decision: LoadDecision,
) {
    container
        .add_class("media media--blazy")
        .add_class(&format!("media--{}", settings.media_type()));
    if let Some(bundle) = settings.bundle.as_deref().filter(|b| !b.is_empty()) {
        container.add_class(&format!("media--bundle--{}", bundle.replace('_', "-")));
    }
    if let Some(switch) = settings.switch_css() {
        container
            .add_class("media--switch")
            .add_class(&format!("media--switch--{switch}"));
    }
    if decision.is_lazy() {
        container.add_class("media--loading");
        if let Some(ratios) = settings
            .blazies
            .get("ratios")
            .filter(|v| crate::settings::is_truthy(v))
        {
            container.set("data-ratios", ratios.to_string());
        }
    }
}

/// Attributes of the wrapper around a field or view of blazy items.
///
/// `blazy_data` becomes the `data-blazy` JSON; an absent value leaves it
/// empty.
pub fn container_attributes(
    settings: &ItemSettings,
    decision: LoadDecision,
    blazy_data: Option<&Value>,
) -> Attributes {
    let mut classes = vec!["blazy".to_string()];
    let mut attributes = Attributes::new();
    attributes.set(
        "data-blazy",
        blazy_data.map(Value::to_string).unwrap_or_default(),
    );

    if let Some(switch) = settings.switch_css().filter(|s| s != "content") {
        attributes.flag(&format!("data-{switch}-gallery"));
        classes.push(format!("blazy--{switch}"));
    }
    if decision.is_unlazy() {
        classes.push("blazy--nojs".to_string());
    }

    let names = [
        ("field", settings.field_name.as_deref()),
        ("view", settings.view_name.as_deref()),
    ];
    for (key, name) in names {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            continue;
        };
        let name = name.replace('_', "-");
        let name = if key == "view" {
            format!("view--{name}")
        } else {
            name
        };
        classes.push(format!("blazy--{key}"));
        classes.push(format!("blazy--{name}"));
        if let Some(mode) = settings.current_view_mode.as_deref().filter(|m| !m.is_empty()) {
            classes.push(format!("blazy--{name}--{}", mode.replace('_', "-")));
        }
    }

    attributes.add_class(&classes.join(" "));
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_item() -> ItemSettings {
        ItemSettings {
            image_url: Some("/sites/default/files/a.jpg".into()),
            ..ItemSettings::for_uri("public://a.jpg", 200, 100)
        }
    }

    const PLACEHOLDER: &str = "data:placeholder";

    // =========================================================================
    // Attributes map
    // =========================================================================

    #[test]
    fn classes_dedup_in_order() {
        let mut attrs = Attributes::new();
        attrs.add_class("b b").add_class("a").add_class("b c");
        assert_eq!(attrs.class_list(), vec!["b", "a", "c"]);
        assert!(attrs.has_class("c"));
        assert_eq!(attrs.get("class"), None);
    }

    #[test]
    fn to_html_escapes_values_and_renders_flags() {
        let mut attrs = Attributes::new();
        attrs
            .set("alt", "a \"quoted\" <b>")
            .flag("allowfullscreen")
            .add_class("x y");
        assert_eq!(
            attrs.to_html(),
            " allowfullscreen alt=\"a &quot;quoted&quot; &lt;b&gt;\" class=\"x y\""
        );
    }

    #[test]
    fn serialize_as_flat_map() {
        let mut attrs = Attributes::new();
        attrs.set("src", "/a.jpg").flag("data-b-unloading").add_class("a b");
        assert_eq!(
            serde_json::to_value(&attrs).unwrap(),
            json!({"src": "/a.jpg", "data-b-unloading": true, "class": "a b"})
        );
    }

    #[test]
    fn append_style_concatenates() {
        let mut attrs = Attributes::new();
        attrs.append_style("a: 1;").append_style("b: 2;");
        assert_eq!(attrs.get("style"), Some("a: 1;b: 2;"));
    }

    #[test]
    fn merge_overwrites_and_unions_classes() {
        let mut base = Attributes::new();
        base.set("src", "a").add_class("x");
        let mut other = Attributes::new();
        other.set("src", "b").add_class("y x");
        base.merge(&other);
        assert_eq!(base.get("src"), Some("b"));
        assert_eq!(base.class_list(), vec!["x", "y"]);
    }

    // =========================================================================
    // Decision
    // =========================================================================

    #[test]
    fn decide_static_wins_over_everything() {
        let ui = UiConfig::default();
        let ctx = RenderContext {
            is_amp: true,
            ..Default::default()
        };
        let mut item = lazy_item();
        for mode in [LoadingMode::Lazy, LoadingMode::Defer, LoadingMode::Unlazy] {
            item.loading = mode;
            assert_eq!(decide(&ctx, &item, &ui), LoadDecision::Static);
        }
    }

    #[test]
    fn decide_modes() {
        let ui = UiConfig::default();
        let ctx = RenderContext::default();
        let mut item = lazy_item();
        assert_eq!(decide(&ctx, &item, &ui), LoadDecision::Lazy);
        item.loading = LoadingMode::Unlazy;
        assert_eq!(decide(&ctx, &item, &ui), LoadDecision::Unloading);
        item.loading = LoadingMode::Eager;
        assert_eq!(decide(&ctx, &item, &ui), LoadDecision::Eager);
        item.loading = LoadingMode::Slider;
        assert_eq!(decide(&ctx, &item, &ui), LoadDecision::Initial);
        item.delta = 1;
        assert_eq!(decide(&ctx, &item, &ui), LoadDecision::Lazy);
    }

    #[test]
    fn decide_defer_overrides_nojs() {
        let ui = UiConfig {
            nojs_lazy: true,
            ..Default::default()
        };
        let ctx = RenderContext::default();
        let mut item = lazy_item();
        assert_eq!(decide(&ctx, &item, &ui), LoadDecision::NoJs);
        item.loading = LoadingMode::Defer;
        assert_eq!(decide(&ctx, &item, &ui), LoadDecision::Deferred);
        assert!(LoadDecision::Deferred.is_lazy());
    }

    #[test]
    fn decision_flags() {
        assert!(LoadDecision::Static.is_undata());
        assert!(LoadDecision::Unloading.is_undata());
        assert!(!LoadDecision::NoJs.is_undata());
        assert!(LoadDecision::Initial.is_unloading());
        assert!(!LoadDecision::Eager.is_unloading());
        assert!(LoadDecision::Eager.is_unlazy());
    }

    // =========================================================================
    // Element builders
    // =========================================================================

    #[test]
    fn lazy_image_swaps_url_into_data_src() {
        let ui = UiConfig::default();
        let built = image_attributes(&lazy_item(), &ui, LoadDecision::Lazy, PLACEHOLDER);
        let img = built.image;
        assert_eq!(img.get("data-src"), Some("/sites/default/files/a.jpg"));
        assert_eq!(img.get("src"), Some(PLACEHOLDER));
        assert_eq!(img.get("loading"), Some("lazy"));
        assert_eq!(img.get("decoding"), Some("async"));
        assert_eq!(img.get("width"), Some("200"));
        assert_eq!(img.get("height"), Some("100"));
        assert_eq!(img.class_list(), vec!["media__image", "media__element", "b-lazy"]);
        assert!(built.noscript.is_none());
    }

    #[test]
    fn lazy_attribute_name_is_configurable() {
        let ui = UiConfig {
            lazy_attribute: "lazy".into(),
            lazy_class: "lazyload".into(),
            ..Default::default()
        };
        let img = image_attributes(&lazy_item(), &ui, LoadDecision::Lazy, PLACEHOLDER).image;
        assert_eq!(img.get("data-lazy"), Some("/sites/default/files/a.jpg"));
        assert!(!img.contains("data-src"));
        assert!(img.has_class("lazyload"));
    }

    #[test]
    fn static_image_has_real_src_only() {
        let ui = UiConfig {
            noscript: true,
            ..Default::default()
        };
        let built = image_attributes(&lazy_item(), &ui, LoadDecision::Static, PLACEHOLDER);
        let img = built.image;
        assert_eq!(img.get("src"), Some("/sites/default/files/a.jpg"));
        assert!(!img.contains("data-src"));
        assert!(!img.contains("data-b-unloading"));
        assert!(built.noscript.is_none());
    }

    #[test]
    fn eager_image_gets_native_hint() {
        let ui = UiConfig::default();
        let mut item = lazy_item();
        item.loading = LoadingMode::Eager;
        let img = image_attributes(&item, &ui, LoadDecision::Eager, PLACEHOLDER).image;
        assert_eq!(img.get("loading"), Some("eager"));
        assert_eq!(img.get("src"), Some("/sites/default/files/a.jpg"));
    }

    #[test]
    fn unlazy_image_is_marked_unloading_without_loading_attr() {
        let ui = UiConfig::default();
        let mut item = lazy_item();
        item.loading = LoadingMode::Unlazy;
        let img = image_attributes(&item, &ui, LoadDecision::Unloading, PLACEHOLDER).image;
        assert!(img.contains("data-b-unloading"));
        assert!(!img.contains("loading"));
    }

    #[test]
    fn noscript_twin_has_real_src() {
        let ui = UiConfig {
            noscript: true,
            ..Default::default()
        };
        let built = image_attributes(&lazy_item(), &ui, LoadDecision::Lazy, PLACEHOLDER);
        let twin = built.noscript.unwrap();
        assert_eq!(twin.get("src"), Some("/sites/default/files/a.jpg"));
        assert!(twin.contains("data-b-noscript"));
        assert!(!twin.contains("data-src"));
    }

    #[test]
    fn image_trims_alt_and_skips_empty_title() {
        let ui = UiConfig::default();
        let mut item = lazy_item();
        item.media.alt = Some("  Sunset ".into());
        item.media.title = Some("   ".into());
        item.entity_uuid = Some("abc-123".into());
        let img = image_attributes(&item, &ui, LoadDecision::Lazy, PLACEHOLDER).image;
        assert_eq!(img.get("alt"), Some("Sunset"));
        assert!(!img.contains("title"));
        assert_eq!(img.get("data-entity-uuid"), Some("abc-123"));
    }

    #[test]
    fn unstyled_image_has_no_dimensions() {
        let ui = UiConfig::default();
        let mut item = lazy_item();
        item.blazies.set("is.unstyled", true);
        let img = image_attributes(&item, &ui, LoadDecision::Lazy, PLACEHOLDER).image;
        assert!(!img.contains("width"));
        assert!(!img.contains("height"));
    }

    #[test]
    fn iframe_variants() {
        let mut item = lazy_item();
        item.embed_url = Some("https://www.youtube.com/embed/x".into());

        let lazy = iframe_attributes(&item, &RenderContext::default(), LoadDecision::Lazy);
        assert_eq!(lazy.get("data-src"), Some("https://www.youtube.com/embed/x"));
        assert_eq!(lazy.get("src"), Some("about:blank"));
        assert!(lazy.contains("allowfullscreen"));
        assert_eq!(lazy.class_list(), vec!["b-lazy", "media__iframe", "media__element"]);

        let ctx = RenderContext {
            is_sandboxed: true,
            ..Default::default()
        };
        let sandboxed = iframe_attributes(&item, &ctx, LoadDecision::Static);
        assert!(sandboxed.contains("sandbox"));
        assert_eq!(sandboxed.get("src"), Some("https://www.youtube.com/embed/x"));

        let unlazy = iframe_attributes(&item, &RenderContext::default(), LoadDecision::NoJs);
        assert_eq!(unlazy.get("src"), Some("https://www.youtube.com/embed/x"));
        assert!(!unlazy.contains("data-src"));
    }

    #[test]
    fn iframe_container_records_type() {
        let mut item = lazy_item();
        item.media_type = Some("video".into());
        let mut container = Attributes::new();
        iframe_container(&mut container, &item);
        assert_eq!(container.get("data-media"), Some(r#"{"type":"video"}"#));
    }

    #[test]
    fn single_background_lazy() {
        let ui = UiConfig::default();
        let mut item = lazy_item();
        single_background(&mut item, false, PLACEHOLDER);
        let mut container = Attributes::new();
        background_attributes(&mut container, &item, &ui, LoadDecision::Lazy);

        assert_eq!(container.get("data-src"), Some(PLACEHOLDER));
        assert!(container.has_class("b-bg"));
        assert!(container.has_class("media--background"));
        assert_eq!(
            container.get("data-b-bg"),
            Some(r#"{"200":{"ratio":50.0,"src":"/sites/default/files/a.jpg"}}"#)
        );
        assert!(!container.contains("style"));
    }

    #[test]
    fn static_background_inlines_image() {
        let ui = UiConfig::default();
        let mut item = lazy_item();
        single_background(&mut item, true, PLACEHOLDER);
        let mut container = Attributes::new();
        background_attributes(&mut container, &item, &ui, LoadDecision::Static);

        assert!(!container.contains("data-src"));
        assert_eq!(
            container.get("style"),
            Some("background-image: url(/sites/default/files/a.jpg);")
        );
    }

    #[test]
    fn fluid_ratio_sets_padding() {
        let mut item = lazy_item();
        item.ratio = Some("fluid".into());
        let mut container = Attributes::new();
        aspect_ratio_attributes(&mut container, &item, &RenderContext::default());
        assert_eq!(container.get("style"), Some("padding-bottom: 50%;"));
        assert_eq!(container.get("data-ratio"), Some("50"));
        assert!(container.has_class("media--ratio--fluid"));
    }

    #[test]
    fn fluid_ratio_prefers_stored_padding() {
        let mut item = lazy_item();
        item.ratio = Some("fluid".into());
        item.blazies.set("item.padding_bottom", 56.25);
        let mut container = Attributes::new();
        aspect_ratio_attributes(&mut container, &item, &RenderContext::default());
        assert_eq!(container.get("data-ratio"), Some("56.25"));
    }

    #[test]
    fn fixed_ratio_classes_only() {
        let mut item = lazy_item();
        item.ratio = Some("16:9".into());
        let mut container = Attributes::new();
        aspect_ratio_attributes(&mut container, &item, &RenderContext::default());
        assert_eq!(container.class_list(), vec!["media--ratio", "media--ratio--169"]);
        assert!(!container.contains("style"));
    }

    #[test]
    fn ratio_skipped_without_width_or_on_amp() {
        let mut item = lazy_item();
        item.ratio = Some("fluid".into());
        let amp = RenderContext {
            is_amp: true,
            ..Default::default()
        };
        let mut container = Attributes::new();
        aspect_ratio_attributes(&mut container, &item, &amp);
        assert!(container.is_empty());

        item.media.width = None;
        aspect_ratio_attributes(&mut container, &item, &RenderContext::default());
        assert!(container.is_empty());
    }

    #[test]
    fn container_classes_and_ratios() {
        let mut item = lazy_item();
        item.media_switch = Some("colorbox".into());
        item.blazies.set("ratios", json!({"480": 50.0}));
        let mut container = Attributes::new();
        container_classes(&mut container, &item, LoadDecision::Lazy);

        assert_eq!(&container.class_list()[..2], &["media", "media--blazy"]);
        assert!(container.has_class("media--switch--colorbox"));
        assert!(container.has_class("media--loading"));
        assert_eq!(container.get("data-ratios"), Some(r#"{"480":50.0}"#));

        let mut eager = Attributes::new();
        container_classes(&mut eager, &item, LoadDecision::Static);
        assert!(!eager.contains("data-ratios"));
    }

    #[test]
    fn wrapper_attributes_for_view() {
        let item = ItemSettings {
            media_switch: Some("photo_box".into()),
            view_name: Some("front_page".into()),
            current_view_mode: Some("page_1".into()),
            ..Default::default()
        };
        let attrs = container_attributes(&item, LoadDecision::NoJs, None);

        assert_eq!(attrs.get("data-blazy"), Some(""));
        assert!(attrs.contains("data-photo-box-gallery"));
        assert_eq!(
            attrs.class_list(),
            vec![
                "blazy",
                "blazy--photo-box",
                "blazy--nojs",
                "blazy--view",
                "blazy--view--front-page",
                "blazy--view--front-page--page-1",
            ]
        );
    }

    #[test]
    fn wrapper_attributes_content_switch_has_no_gallery() {
        let item = ItemSettings {
            media_switch: Some("content".into()),
            field_name: Some("field_image".into()),
            ..Default::default()
        };
        let data = json!({"count": 2});
        let attrs = container_attributes(&item, LoadDecision::Lazy, Some(&data));
        assert_eq!(attrs.get("data-blazy"), Some(r#"{"count":2}"#));
        assert!(!attrs.contains("data-content-gallery"));
        assert_eq!(attrs.class_list(), vec!["blazy", "blazy--field", "blazy--field-image"]);
    }
}
