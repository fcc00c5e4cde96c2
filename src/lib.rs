//! # Blazy
//!
//! Lazy-loading state for media elements. Given per-element settings (a file
//! reference, image styles, a loading mode, a lightbox switch) this crate
//! resolves everything a page needs to show the element without layout jumps
//! and without loading it before it scrolls into view: the file URL, the
//! styled dimensions, per-breakpoint aspect ratios, the placeholder, the
//! `data-*` attributes a loader script swaps in, and the lightbox gallery
//! descriptor.
//!
//! # Architecture: One Render Pass
//!
//! ```text
//! ItemSettings ─→ file ─→ responsive ─→ attributes ─→ lightbox ─→ Rendered
//!                 URL,     per-width     data-src,     gallery,     attribute maps,
//!                 size     ratios        placeholder   JSON         Maud markup
//! ```
//!
//! Each stage reads the typed settings and writes what it derives into the
//! item's `blazies` bag ([`settings::Settings`]), so later stages and callers
//! can see why an element ended up lazy, which ratios it has, or which
//! gallery it joined. [`render::BlazyManager`] runs the stages; nothing in a
//! pass returns an error. A failed probe or an unknown style costs only the
//! feature that needed it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`settings`] | Dotted-path nested settings bag |
//! | [`types`] | Typed item settings, media reference, loading mode, render context |
//! | [`config`] | `blazy.toml` loading, merging over stock defaults, validation |
//! | [`cache`] | Memo for style dimension predictions and blur data URIs |
//! | [`imaging`] | Image styles, dimension maths, the pixel backend |
//! | [`file`] | Stream URIs, web URLs, protocol sanitizing, dimension probe |
//! | [`responsive`] | Breakpoint dimensions, background sources, `<picture>` sources, preload |
//! | [`placeholder`] | SVG placeholder, thumbnails, blur |
//! | [`attributes`] | Attribute maps and the lazy/unlazy decision |
//! | [`lightbox`] | Lightbox links, galleries, captions |
//! | [`render`] | The render pass and HTML output |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Decision Per Element
//!
//! Whether an element is lazy depends on the page (AMP, preview, sandboxed),
//! the element's loading mode, slider position and a site-wide switch. The
//! precedence is subtle, so it is evaluated once into an
//! [`attributes::LoadDecision`] and every builder reads that value.
//!
//! ## Predicted, Not Measured, Dimensions
//!
//! Styled sizes come from the style's effect chain applied to the original
//! size ([`imaging::style_dimensions`]). No derivative has to exist to know
//! its size, which is what lets a page reserve space for an image that has
//! never been generated. The only pixel work in a pass is an optional probe
//! of an unsized original and the blur thumbnail.
//!
//! ## Injected Cache
//!
//! The [`cache::RenderCache`] belongs to the manager, not to a global. Tests
//! get a fresh one per manager; the CLI shares one across a rayon batch.

pub mod attributes;
pub mod cache;
pub mod config;
pub mod file;
pub mod imaging;
pub mod lightbox;
pub mod output;
pub mod placeholder;
pub mod render;
pub mod responsive;
pub mod settings;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
