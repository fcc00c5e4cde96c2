//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::ImageEffect;
use crate::types::Size;

/// Height as a percentage of width, rounded to two decimals.
///
/// Falls back to `100.0` (a square box) when either side is missing or
/// zero, so callers always get a usable `padding-bottom`.
///
/// ```
/// # use blazy::imaging::aspect_ratio;
/// assert_eq!(aspect_ratio(Some(100), Some(50)), 50.0);
/// assert_eq!(aspect_ratio(Some(1920), Some(1080)), 56.25);
/// assert_eq!(aspect_ratio(None, Some(50)), 100.0);
/// ```
pub fn aspect_ratio(width: Option<u32>, height: Option<u32>) -> f64 {
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => round2(h as f64 / w as f64 * 100.0),
        _ => 100.0,
    }
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a ratio the way CSS and data attributes expect it: no trailing
/// zeros, no trailing dot.
pub fn format_ratio(value: f64) -> String {
    let formatted = format!("{:.2}", round2(value));
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Scale `(width, height)` to fit a target box, keeping the aspect ratio.
///
/// One of the target sides may be open. Returns `None` when the scale factor
/// would not shrink the image and `upscale` is off, meaning "keep the source
/// size".
pub fn scale_dimensions(
    source: (u32, u32),
    target_width: Option<u32>,
    target_height: Option<u32>,
    upscale: bool,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return None;
    }
    let aspect = src_h as f64 / src_w as f64;
    let target_width = target_width.filter(|w| *w > 0);
    let target_height = target_height.filter(|h| *h > 0);

    let (width, height, factor) = match (target_width, target_height) {
        (Some(w), None) => (w, (w as f64 * aspect).round() as u32, w as f64 / src_w as f64),
        (Some(w), Some(h)) if aspect < h as f64 / w as f64 => {
            (w, (w as f64 * aspect).round() as u32, w as f64 / src_w as f64)
        }
        (_, Some(h)) => ((h as f64 / aspect).round() as u32, h, h as f64 / src_h as f64),
        (None, None) => return None,
    };

    if !upscale && factor >= 1.0 {
        return None;
    }
    Some((width, height))
}

/// Output size of one effect.
///
/// Crops and resizes produce their configured size whatever the input is.
/// A scale needs a known, non-zero input and otherwise passes it through.
pub fn effect_dimensions(effect: &ImageEffect, size: Size) -> Size {
    match effect {
        ImageEffect::ScaleAndCrop { width, height } | ImageEffect::Resize { width, height } => {
            Size::new(*width, *height)
        }
        ImageEffect::Scale {
            width,
            height,
            upscale,
        } => {
            let (Some(w), Some(h)) = (size.width, size.height) else {
                return size;
            };
            match scale_dimensions((w, h), *width, *height, *upscale) {
                Some((width, height)) => Size::new(width, height),
                None => size,
            }
        }
        ImageEffect::Convert { .. } => size,
    }
}

/// Output size after applying every effect in order.
pub fn style_dimensions(effects: &[ImageEffect], size: Size) -> Size {
    effects
        .iter()
        .fold(size, |current, effect| effect_dimensions(effect, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // aspect_ratio tests
    // =========================================================================

    #[test]
    fn ratio_half() {
        assert_eq!(aspect_ratio(Some(100), Some(50)), 50.0);
    }

    #[test]
    fn ratio_three_quarters() {
        assert_eq!(aspect_ratio(Some(100), Some(75)), 75.0);
    }

    #[test]
    fn ratio_zero_or_missing_is_square() {
        assert_eq!(aspect_ratio(Some(0), Some(50)), 100.0);
        assert_eq!(aspect_ratio(Some(50), Some(0)), 100.0);
        assert_eq!(aspect_ratio(None, None), 100.0);
        assert_eq!(aspect_ratio(Some(50), None), 100.0);
    }

    #[test]
    fn ratio_rounds_to_two_decimals() {
        // 2/3 = 66.666...
        assert_eq!(aspect_ratio(Some(3), Some(2)), 66.67);
        assert_eq!(aspect_ratio(Some(1920), Some(1080)), 56.25);
    }

    #[test]
    fn format_ratio_trims_zeros() {
        assert_eq!(format_ratio(50.0), "50");
        assert_eq!(format_ratio(56.25), "56.25");
        assert_eq!(format_ratio(66.5), "66.5");
    }

    // =========================================================================
    // scale_dimensions tests
    // =========================================================================

    #[test]
    fn scale_by_width_only() {
        assert_eq!(scale_dimensions((1000, 500), Some(200), None, false), Some((200, 100)));
    }

    #[test]
    fn scale_by_height_only() {
        assert_eq!(scale_dimensions((1000, 500), None, Some(100), false), Some((200, 100)));
    }

    #[test]
    fn scale_box_landscape_limited_by_width() {
        // 2:1 into 480x480 → width bound
        assert_eq!(scale_dimensions((1000, 500), Some(480), Some(480), false), Some((480, 240)));
    }

    #[test]
    fn scale_box_portrait_limited_by_height() {
        assert_eq!(scale_dimensions((500, 1000), Some(480), Some(480), false), Some((240, 480)));
    }

    #[test]
    fn scale_refuses_upscale_by_default() {
        assert_eq!(scale_dimensions((200, 100), Some(400), None, false), None);
        assert_eq!(scale_dimensions((200, 100), Some(400), None, true), Some((400, 200)));
    }

    #[test]
    fn scale_rounding_up_to_source_still_shrinks() {
        // 999/1000 of a 1px height rounds back to 1px.
        assert_eq!(scale_dimensions((1000, 1), Some(999), None, false), Some((999, 1)));
        assert_eq!(scale_dimensions((1000, 1000), Some(1000), None, false), None);
    }

    #[test]
    fn scale_zero_source_is_none() {
        assert_eq!(scale_dimensions((0, 100), Some(50), None, true), None);
    }

    // =========================================================================
    // style_dimensions tests
    // =========================================================================

    #[test]
    fn crop_and_resize_are_exact() {
        let crop = ImageEffect::ScaleAndCrop {
            width: 100,
            height: 100,
        };
        assert_eq!(effect_dimensions(&crop, Size::new(800, 600)), Size::new(100, 100));
        let resize = ImageEffect::Resize {
            width: 30,
            height: 20,
        };
        assert_eq!(effect_dimensions(&resize, Size::new(800, 600)), Size::new(30, 20));
    }

    #[test]
    fn crop_and_resize_ignore_unknown_input() {
        let crop = ImageEffect::ScaleAndCrop {
            width: 300,
            height: 200,
        };
        assert_eq!(effect_dimensions(&crop, Size::unknown()), Size::new(300, 200));
        let resize = ImageEffect::Resize {
            width: 30,
            height: 20,
        };
        assert_eq!(effect_dimensions(&resize, Size::unknown()), Size::new(30, 20));
    }

    #[test]
    fn scale_and_convert_pass_unknown_size_through() {
        let scale = ImageEffect::Scale {
            width: Some(480),
            height: None,
            upscale: false,
        };
        assert_eq!(effect_dimensions(&scale, Size::unknown()), Size::unknown());
        let convert = ImageEffect::Convert {
            extension: "webp".into(),
        };
        assert_eq!(effect_dimensions(&convert, Size::unknown()), Size::unknown());
    }

    #[test]
    fn effects_chain_in_order() {
        let effects = vec![
            ImageEffect::Scale {
                width: Some(400),
                height: None,
                upscale: false,
            },
            ImageEffect::Convert {
                extension: "webp".into(),
            },
            ImageEffect::Scale {
                width: None,
                height: Some(100),
                upscale: false,
            },
        ];
        assert_eq!(style_dimensions(&effects, Size::new(800, 400)), Size::new(200, 100));
    }

    #[test]
    fn scale_without_upscale_keeps_source() {
        let effects = vec![ImageEffect::Scale {
            width: Some(1200),
            height: None,
            upscale: false,
        }];
        assert_eq!(style_dimensions(&effects, Size::new(800, 400)), Size::new(800, 400));
    }
}
