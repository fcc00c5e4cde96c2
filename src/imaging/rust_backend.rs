//! Pure Rust image backend built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::ImageReader` |
//! | Scale / resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Scale and crop | `image::DynamicImage::resize_to_fill` |
//! | Encode | format from the output extension; JPEG honours quality |
//!
//! Derivatives are encoded to a hidden sibling file and renamed into place,
//! so a reader never sees a partly written derivative.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::scale_dimensions;
use super::params::{DeriveParams, ImageEffect};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Pure Rust backend using the `image` crate ecosystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

fn apply_effect(img: DynamicImage, effect: &ImageEffect) -> DynamicImage {
    match effect {
        ImageEffect::Scale {
            width,
            height,
            upscale,
        } => match scale_dimensions((img.width(), img.height()), *width, *height, *upscale) {
            Some((w, h)) => img.resize_exact(w, h, FilterType::Lanczos3),
            None => img,
        },
        ImageEffect::ScaleAndCrop { width, height } => {
            img.resize_to_fill(*width, *height, FilterType::Lanczos3)
        }
        ImageEffect::Resize { width, height } => {
            img.resize_exact(*width, *height, FilterType::Lanczos3)
        }
        // The output path already carries the converted extension.
        ImageEffect::Convert { .. } => img,
    }
}

/// Unique hidden path next to `path`, on the same filesystem.
fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
}

fn encode(img: &DynamicImage, path: &Path, format: ImageFormat, quality: u32) -> Result<(), BackendError> {
    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let writer = std::io::BufWriter::new(file);
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality as u8);
            // JPEG has no alpha channel.
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))
        }
        other => img.save_with_format(path, other).map_err(|e| {
            BackendError::ProcessingFailed(format!("{other:?} encode failed: {e}"))
        }),
    }
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        BackendError::ProcessingFailed(format!("Unsupported output format {}: {e}", path.display()))
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    let written = encode(img, &tmp, format, quality)
        .and_then(|()| std::fs::rename(&tmp, path).map_err(BackendError::Io));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn derive(&self, params: &DeriveParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let derived = params.effects.iter().fold(img, apply_effect);
        save_image(&derived, &params.output, params.quality.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{ImageEncoder, RgbImage};

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn identify_garbage_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(RustBackend::new().identify(&path).is_err());
    }

    #[test]
    fn derive_scale_and_crop_exact_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 800, 600);

        let output = tmp.path().join("styles/thumb/public/source.jpg");
        RustBackend::new()
            .derive(&DeriveParams {
                source,
                output: output.clone(),
                effects: vec![ImageEffect::ScaleAndCrop {
                    width: 100,
                    height: 100,
                }],
                quality: Quality::new(80),
            })
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (100, 100));
    }

    #[test]
    fn derive_scale_then_convert_to_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 200);

        let output = tmp.path().join("source.jpg.png");
        RustBackend::new()
            .derive(&DeriveParams {
                source,
                output: output.clone(),
                effects: vec![
                    ImageEffect::Scale {
                        width: Some(100),
                        height: None,
                        upscale: false,
                    },
                    ImageEffect::Convert {
                        extension: "png".into(),
                    },
                ],
                quality: Quality::default(),
            })
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (100, 50));
    }

    #[test]
    fn derive_leaves_only_the_finished_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 300, 200);
        let out_dir = tmp.path().join("styles/thumb/public");

        let params = DeriveParams {
            source,
            output: out_dir.join("source.jpg"),
            effects: vec![ImageEffect::Resize {
                width: 30,
                height: 20,
            }],
            quality: Quality::default(),
        };
        let backend = RustBackend::new();
        backend.derive(&params).unwrap();
        // A second derive replaces the file in place.
        backend.derive(&params).unwrap();

        let names: Vec<String> = std::fs::read_dir(&out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["source.jpg".to_string()]);
        assert_eq!(image::image_dimensions(&params.output).unwrap(), (30, 20));
    }

    #[test]
    fn tmp_path_is_hidden_sibling() {
        let a = tmp_path(Path::new("/site/styles/x/public/a.jpg"));
        let b = tmp_path(Path::new("/site/styles/x/public/a.jpg"));
        assert_eq!(a.parent(), Some(Path::new("/site/styles/x/public")));
        assert!(a.file_name().unwrap().to_string_lossy().starts_with(".a.jpg."));
        assert_ne!(a, b);
    }

    #[test]
    fn derive_unknown_output_format_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 40, 40);

        let result = RustBackend::new().derive(&DeriveParams {
            source,
            output: tmp.path().join("out.unknownext"),
            effects: vec![],
            quality: Quality::default(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn derive_missing_source_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = RustBackend::new().derive(&DeriveParams {
            source: tmp.path().join("missing.jpg"),
            output: tmp.path().join("out.jpg"),
            effects: vec![],
            quality: Quality::default(),
        });
        assert!(matches!(result, Err(BackendError::Io(_))));
    }
}
