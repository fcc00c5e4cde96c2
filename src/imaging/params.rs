//! Parameter types for image operations.
//!
//! These describe *what* a derivative looks like, not *how* it is produced.
//! [`ImageEffect`] lists come from `[styles.*]` in `blazy.toml`; the
//! [`backend`](super::backend) turns a [`DeriveParams`] into pixels.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// One step of an image style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageEffect {
    /// Fit inside the box keeping the aspect ratio. Either side may be open.
    Scale {
        width: Option<u32>,
        height: Option<u32>,
        #[serde(default)]
        upscale: bool,
    },
    /// Cover the box, then center-crop to it exactly.
    ScaleAndCrop { width: u32, height: u32 },
    /// Stretch to exactly the given size.
    Resize { width: u32, height: u32 },
    /// Change the derivative's file format.
    Convert { extension: String },
}

impl ImageEffect {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Scale { width, height, .. } => {
                if width.unwrap_or(0) == 0 && height.unwrap_or(0) == 0 {
                    return Err("scale needs a non-zero width or height".into());
                }
            }
            Self::ScaleAndCrop { width, height } | Self::Resize { width, height } => {
                if *width == 0 || *height == 0 {
                    return Err(format!("{} needs non-zero width and height", self.name()));
                }
            }
            Self::Convert { extension } => {
                if extension.trim().is_empty() {
                    return Err("convert needs an extension".into());
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Scale { .. } => "scale",
            Self::ScaleAndCrop { .. } => "scale_and_crop",
            Self::Resize { .. } => "resize",
            Self::Convert { .. } => "convert",
        }
    }
}

/// Everything needed to write one style derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub effects: Vec<ImageEffect>,
    pub quality: Quality,
}
