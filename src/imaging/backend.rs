//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the render pass
//! needs from pixels: identify (the guarded dimension probe) and derive
//! (write a style derivative, used for blur thumbnails).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::DeriveParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image backends.
///
/// `Sync` so one backend can serve a rayon batch.
pub trait ImageBackend: Sync {
    /// Get image dimensions without decoding pixels where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Apply a style's effects to `params.source` and write `params.output`.
    fn derive(&self, params: &DeriveParams) -> Result<(), BackendError>;
}
