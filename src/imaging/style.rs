//! Image styles: named effect chains applied to stored files.
//!
//! A style maps a source URI to a derivative URI under
//! `<scheme>://styles/<id>/<scheme>/<target>` and predicts the derivative's
//! size without touching pixels. URLs carry an `itok` token derived from the
//! style id and source URI so derivative requests cannot be forged for
//! arbitrary styles.

use super::calculations::style_dimensions;
use super::params::{DeriveParams, ImageEffect, Quality};
use crate::config::StyleConfig;
use crate::types::Size;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// The transform seam of the render pass.
///
/// The render pass only needs the style id, predicted output size, the
/// derivative URI and its access token.
pub trait ImageTransform: Send + Sync {
    fn id(&self) -> &str;

    /// Output size for a source of `size`. `uri` lets styles vary per file.
    fn transform_dimensions(&self, size: Size, uri: &str) -> Size;

    /// Derivative location for `uri`.
    fn build_uri(&self, uri: &str) -> String;

    /// Access token appended to derivative URLs as `itok`.
    fn token(&self, uri: &str) -> String;

    /// Extension of the derivative for a source with `extension`.
    fn derivative_extension(&self, extension: &str) -> String {
        extension.to_string()
    }
}

/// A configured image style.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStyle {
    id: String,
    effects: Vec<ImageEffect>,
    quality: Quality,
}

impl ImageStyle {
    pub fn new(id: impl Into<String>, effects: Vec<ImageEffect>) -> Self {
        Self {
            id: id.into(),
            effects,
            quality: Quality::default(),
        }
    }

    pub fn from_config(id: &str, config: &StyleConfig) -> Self {
        Self {
            id: id.to_string(),
            effects: config.effects.clone(),
            quality: config.quality.map(Quality::new).unwrap_or_default(),
        }
    }

    pub fn effects(&self) -> &[ImageEffect] {
        &self.effects
    }

    /// Parameters to write this style's derivative of `source` to `output`.
    pub fn derive_params(&self, source: &Path, output: &Path) -> DeriveParams {
        DeriveParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            effects: self.effects.clone(),
            quality: self.quality,
        }
    }

    fn converted_extension(&self) -> Option<&str> {
        self.effects.iter().rev().find_map(|effect| match effect {
            ImageEffect::Convert { extension } => Some(extension.as_str()),
            _ => None,
        })
    }
}

impl ImageTransform for ImageStyle {
    fn id(&self) -> &str {
        &self.id
    }

    fn transform_dimensions(&self, size: Size, _uri: &str) -> Size {
        style_dimensions(&self.effects, size)
    }

    fn build_uri(&self, uri: &str) -> String {
        let (scheme, target) = uri.split_once("://").unwrap_or(("public", uri));
        let mut derivative = format!("{scheme}://styles/{}/{scheme}/{target}", self.id);
        if let Some(ext) = self.converted_extension() {
            derivative.push('.');
            derivative.push_str(ext);
        }
        derivative
    }

    fn token(&self, uri: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"itok\0");
        hasher.update(self.id.as_bytes());
        hasher.update(b":");
        hasher.update(uri.as_bytes());
        let encoded = URL_SAFE_NO_PAD.encode(hasher.finalize());
        encoded[..8].to_string()
    }

    fn derivative_extension(&self, extension: &str) -> String {
        self.converted_extension().unwrap_or(extension).to_string()
    }
}

/// All configured styles, by id.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: BTreeMap<String, ImageStyle>,
}

impl StyleRegistry {
    pub fn from_config(styles: &BTreeMap<String, StyleConfig>) -> Self {
        Self {
            styles: styles
                .iter()
                .map(|(id, config)| (id.clone(), ImageStyle::from_config(id, config)))
                .collect(),
        }
    }

    pub fn insert(&mut self, style: ImageStyle) {
        self.styles.insert(style.id.clone(), style);
    }

    pub fn get(&self, id: &str) -> Option<&ImageStyle> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
