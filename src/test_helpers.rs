//! Shared test utilities for the blazy test suite.
//!
//! Provides a small but complete configuration (three scale styles and one
//! responsive style over three breakpoints) and helpers for tests that need
//! real files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let config = test_config();
//! let registry = test_registry(&config);
//! assert!(registry.get("medium").is_some());
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::config::{BlazyConfig, Breakpoint, ResponsiveStyleConfig, StyleConfig, StyleMapping};
use crate::imaging::{ImageEffect, StyleRegistry};

// =========================================================================
// Configuration
// =========================================================================

fn scale(width: u32) -> StyleConfig {
    StyleConfig {
        effects: vec![ImageEffect::Scale {
            width: Some(width),
            height: None,
            upscale: false,
        }],
        quality: None,
    }
}

fn breakpoint(id: &str, media_query: &str, weight: i32) -> Breakpoint {
    Breakpoint {
        id: id.to_string(),
        media_query: media_query.to_string(),
        weight,
        multipliers: vec!["1x".to_string()],
    }
}

fn mapping(breakpoint: &str, style: &str) -> StyleMapping {
    StyleMapping {
        breakpoint: breakpoint.to_string(),
        image_style: Some(style.to_string()),
        ..StyleMapping::default()
    }
}

/// Stock config plus styles `small` (220), `medium` (480), `large` (960),
/// the `hero` breakpoint group and the `hero` responsive style.
pub fn test_config() -> BlazyConfig {
    let mut config = BlazyConfig::default();
    config.styles.insert("small".into(), scale(220));
    config.styles.insert("medium".into(), scale(480));
    config.styles.insert("large".into(), scale(960));

    config.breakpoints.insert(
        "hero".into(),
        vec![
            breakpoint("mobile", "all", 0),
            breakpoint("narrow", "(min-width: 560px)", 1),
            breakpoint("wide", "(min-width: 1024px)", 2),
        ],
    );
    config.responsive_styles.insert(
        "hero".into(),
        ResponsiveStyleConfig {
            breakpoint_group: "hero".into(),
            fallback_image_style: "large".into(),
            mappings: vec![
                mapping("mobile", "small"),
                mapping("narrow", "medium"),
                mapping("wide", "large"),
            ],
        },
    );
    config
}

pub fn test_registry(config: &BlazyConfig) -> StyleRegistry {
    StyleRegistry::from_config(&config.styles)
}

// =========================================================================
// Files on disk
// =========================================================================

/// [`test_config`] with `public://` backed by a fresh temp directory.
pub fn config_in(tmp: &TempDir) -> BlazyConfig {
    let mut config = test_config();
    config.files.public_dir = tmp.path().to_path_buf();
    config
}

/// Write a solid-colour JPEG of the given size.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
    img.save(path).unwrap();
}
