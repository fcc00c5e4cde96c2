//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every rendered element is shown by what it is (its position and the file
//! it renders) with the derived state as indented context lines. This keeps
//! the output readable as an inventory of a page's media while still showing
//! why each element loads the way it does.
//!
//! # Output Format
//!
//! ## Render
//!
//! ```text
//! 001 public://2024/dawn.jpg
//!     Loading: lazy (data-src)
//!     URL: /sites/default/files/styles/large/public/2024/dawn.jpg?itok=…
//!     Size: 960x480 (50%)
//!     Sources: 3 breakpoints
//!     Lightbox: colorbox → gallery featured-teaser
//!
//! Rendered 1 element (1 lazy, 0 eager)
//! Cache: 3 hits, 2 misses (60% hit rate)
//! ```
//!
//! ## Check
//!
//! ```text
//! Config
//!     Styles: 3 (large, medium, small)
//!     Responsive styles: 1 (hero)
//!     Breakpoint groups: 1 (hero: 3 breakpoints)
//!     Lightboxes: colorbox, photobox
//!     Lazy: b-lazy, data-src
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::config::BlazyConfig;
use crate::render::Rendered;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// `name (a, b, c)` with the count in front.
fn counted<'a>(label: &str, names: impl Iterator<Item = &'a String>) -> String {
    let names: Vec<&str> = names.map(String::as_str).collect();
    if names.is_empty() {
        format!("{label}: 0")
    } else {
        format!("{label}: {} ({})", names.len(), names.join(", "))
    }
}

/// What identifies an element: its URI, else URL, else embed URL.
fn element_identity(rendered: &Rendered) -> &str {
    let settings = &rendered.settings;
    settings
        .media
        .uri
        .as_deref()
        .or(settings.media.url.as_deref())
        .or(settings.embed_url.as_deref())
        .unwrap_or("(no media)")
}

// ============================================================================
// Render output
// ============================================================================

fn loading_line(rendered: &Rendered) -> String {
    let bag = &rendered.settings.blazies;
    let mode = if bag.get_bool("is.static") {
        "static"
    } else if bag.get_bool("is.unlazy") {
        "eager"
    } else {
        "lazy"
    };
    let lazy_attr = [rendered.image.as_ref(), rendered.iframe.as_ref(), Some(&rendered.container)]
        .into_iter()
        .flatten()
        .flat_map(|attrs| attrs.iter().map(|(name, _)| name))
        .find(|name| matches!(*name, "data-src" | "data-lazy"));
    match lazy_attr {
        Some(attr) => format!("Loading: {mode} ({attr})"),
        None => format!("Loading: {mode}"),
    }
}

/// Format a rendered batch.
pub fn format_render_output(rendered: &[Rendered], stats: &CacheStats) -> Vec<String> {
    let mut lines = Vec::new();
    let mut lazy = 0;

    for (i, element) in rendered.iter().enumerate() {
        let settings = &element.settings;
        if !settings.blazies.get_bool("is.unlazy") {
            lazy += 1;
        }

        lines.push(format!("{} {}", format_index(i + 1), element_identity(element)));
        lines.push(format!("{}{}", indent(1), loading_line(element)));
        if let Some(url) = settings.image_url.as_deref() {
            lines.push(format!("{}URL: {}", indent(1), truncate(url, 96)));
        }
        let size = settings.size();
        if let (Some(w), Some(h)) = (size.width, size.height) {
            lines.push(format!(
                "{}Size: {w}x{h} ({}%)",
                indent(1),
                crate::imaging::format_ratio(size.ratio())
            ));
        }
        if !element.sources.is_empty() {
            lines.push(format!("{}Sources: {} breakpoints", indent(1), element.sources.len()));
        }
        if settings.background {
            lines.push(format!("{}Background: yes", indent(1)));
        }
        if element.preface.is_some() {
            lines.push(format!("{}Blur: inline thumbnail", indent(1)));
        }
        if let Some(lightbox) = &element.lightbox {
            let line = match (&lightbox.descriptor, settings.blazies.get_str("lightbox.gallery_id")) {
                (Some(descriptor), Some(gallery)) => {
                    format!("Lightbox: {} → gallery {gallery}", descriptor.id)
                }
                _ => format!("Link: {}", lightbox.url),
            };
            lines.push(format!("{}{line}", indent(1)));
        }
        if let Some(caption) = element.caption() {
            lines.push(format!("{}Caption: {}", indent(1), truncate(caption, 60)));
        }
    }

    if !rendered.is_empty() {
        lines.push(String::new());
    }
    let noun = if rendered.len() == 1 { "element" } else { "elements" };
    lines.push(format!(
        "Rendered {} {noun} ({lazy} lazy, {} eager)",
        rendered.len(),
        rendered.len() - lazy
    ));
    lines.push(format!("Cache: {stats}"));
    lines
}

pub fn print_render_output(rendered: &[Rendered], stats: &CacheStats) {
    for line in format_render_output(rendered, stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format a summary of a loaded, valid config.
pub fn format_check_output(config: &BlazyConfig) -> Vec<String> {
    let mut lines = vec!["Config".to_string()];
    lines.push(format!("{}{}", indent(1), counted("Styles", config.styles.keys())));
    lines.push(format!(
        "{}{}",
        indent(1),
        counted("Responsive styles", config.responsive_styles.keys())
    ));

    let groups: Vec<String> = config
        .breakpoints
        .iter()
        .map(|(id, group)| format!("{id}: {} breakpoints", group.len()))
        .collect();
    lines.push(format!(
        "{}{}",
        indent(1),
        counted("Breakpoint groups", groups.iter())
    ));

    lines.push(format!(
        "{}Lightboxes: {}",
        indent(1),
        config.lightbox.lightboxes.join(", ")
    ));
    lines.push(format!(
        "{}Lazy: {}, data-{}",
        indent(1),
        config.ui.lazy_class, config.ui.lazy_attribute
    ));
    if !config.ui.fx.is_empty() {
        lines.push(format!("{}Effect: {}", indent(1), config.ui.fx));
    }
    lines.push(format!(
        "{}Unstyled: {}",
        indent(1),
        config.unstyled_extensions().join(", ")
    ));
    lines
}

pub fn print_check_output(config: &BlazyConfig) {
    for line in format_check_output(config) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
