//! Region redaction on the canonical image.

use image::imageops;
use image::{Rgb, RgbImage};

use crate::canonical::CanonicalImage;
use crate::proposals::Detection;

/// How detected regions are redacted.
///
/// `Outline` marks a region without occluding it; the pixels inside stay
/// fully visible. Use `Gaussian` to actually hide the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurType {
    /// Leave the image untouched.
    None,
    /// Draw an unfilled 3-pixel border at the detection bounds.
    Outline,
    /// Blur the region in place.
    Gaussian,
}

/// Border thickness of the outline marker, in pixels.
const OUTLINE_THICKNESS: i32 = 3;

/// Outline color, B,G,R.
const OUTLINE_COLOR: [u8; 3] = [0, 0, 255];

/// Sigma of the region blur; the equivalent of a 51×51 kernel with
/// auto-derived sigma (0.3·((51−1)/2 − 1) + 0.8).
const GAUSSIAN_SIGMA: f32 = 8.0;

/// Apply the redaction operator to every detection, in list order.
///
/// Later detections paint over earlier ones where they overlap. Boxes are
/// expected to be bounds-clamped by the proposal decoder; regions are still
/// clipped here so a degenerate box is a no-op rather than a panic.
pub fn apply(image: &mut CanonicalImage<'_>, detections: &[Detection], blur: BlurType) {
    if matches!(blur, BlurType::None) {
        return;
    }
    for detection in detections {
        match blur {
            BlurType::None => {}
            BlurType::Outline => draw_outline(image, detection),
            BlurType::Gaussian => blur_region(image, detection),
        }
    }
}

/// Clip a detection to the image, returning inclusive bounds or `None`
/// when nothing remains.
fn clip(image: &CanonicalImage<'_>, d: &Detection) -> Option<(i32, i32, i32, i32)> {
    let left = d.left.max(0);
    let top = d.top.max(0);
    let right = d.right.min(image.width() as i32 - 1);
    let bottom = d.bottom.min(image.height() as i32 - 1);
    if left > right || top > bottom {
        return None;
    }
    Some((left, top, right, bottom))
}

fn draw_outline(image: &mut CanonicalImage<'_>, detection: &Detection) {
    let Some((left, top, right, bottom)) = clip(image, detection) else {
        return;
    };

    for y in top..=bottom {
        let near_horizontal_edge = y - top < OUTLINE_THICKNESS || bottom - y < OUTLINE_THICKNESS;
        let row = image.row_mut(y as u32);
        let mut paint = |x0: i32, x1: i32| {
            for x in x0..=x1 {
                row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&OUTLINE_COLOR);
            }
        };
        if near_horizontal_edge {
            paint(left, right);
        } else {
            paint(left, (left + OUTLINE_THICKNESS - 1).min(right));
            paint((right - OUTLINE_THICKNESS + 1).max(left), right);
        }
    }
}

fn blur_region(image: &mut CanonicalImage<'_>, detection: &Detection) {
    let Some((left, top, right, bottom)) = clip(image, detection) else {
        return;
    };
    let region_w = (right - left + 1) as u32;
    let region_h = (bottom - top + 1) as u32;

    // Channel order does not matter to the blur, so the B,G,R bytes are
    // used as-is.
    let region = RgbImage::from_fn(region_w, region_h, |x, y| {
        let row = image.row((top as u32) + y);
        let i = (left as usize + x as usize) * 3;
        Rgb([row[i], row[i + 1], row[i + 2]])
    });

    let blurred = imageops::blur(&region, GAUSSIAN_SIGMA);

    for (x, y, pixel) in blurred.enumerate_pixels() {
        let row = image.row_mut((top as u32) + y);
        let i = (left as usize + x as usize) * 3;
        row[i..i + 3].copy_from_slice(&pixel.0);
    }
}
