//! Image styles, dimension maths and the pixel backend.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Derive** | effect chain → `resize_exact` / `resize_to_fill` |
//! | **Predict size** | [`style_dimensions`] (no pixels touched) |
//!
//! The module is split into:
//! - **Calculations**: pure functions for ratio and scale math
//! - **Parameters**: effect and derivative descriptions
//! - **Style**: [`ImageTransform`] trait + config-backed [`ImageStyle`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;
pub mod style;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{aspect_ratio, format_ratio, round2, scale_dimensions, style_dimensions};
pub use params::{DeriveParams, ImageEffect, Quality};
pub use rust_backend::RustBackend;
pub use style::{ImageStyle, ImageTransform, StyleRegistry};
