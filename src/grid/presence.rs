//! Puzzle presence check via color-class statistics.
//!
//! Every pixel of the grid rectangle is put into one of three disjoint
//! classes: glyph foreground, dark background, or border line. The puzzle
//! counts as present only when all three fractions are in range; any one of
//! them alone fires on unrelated screen content too often.

use image::Rgba;

use super::locator::GridRect;
use crate::capture::Frame;
use crate::glyph::signature::mean_brightness;
use crate::solver::config::{ForegroundRule, PresenceThresholds};

/// Brightness band for border lines (mid-range blue/gray).
const BORDER_MIN_BRIGHTNESS: u8 = 45;
const BORDER_MAX_BRIGHTNESS: u8 = 160;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelClass {
    Foreground,
    Background,
    Border,
    Other,
}

/// Color-class fractions over the grid rectangle.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct PresenceReport {
    pub foreground: f32,
    pub background: f32,
    pub border: f32,
    /// Pixels inspected (the grid rectangle clipped to the frame)
    pub pixel_count: u64,
    pub present: bool,
}

/// Assigns a pixel to its color class. Classes are checked in order.
pub fn classify_pixel(
    pixel: &Rgba<u8>,
    rule: &ForegroundRule,
    thresholds: &PresenceThresholds,
) -> PixelClass {
    if rule.matches(pixel) {
        return PixelClass::Foreground;
    }

    let brightness = mean_brightness(pixel);
    if brightness <= thresholds.background_max_brightness {
        return PixelClass::Background;
    }

    let [r, _, b, _] = pixel.0;
    if (thresholds.border_min_blue..=thresholds.border_max_blue).contains(&b)
        && (BORDER_MIN_BRIGHTNESS..=BORDER_MAX_BRIGHTNESS).contains(&brightness)
        && b >= r
    {
        return PixelClass::Border;
    }

    PixelClass::Other
}

/// Measures the color classes over the grid rectangle and decides presence.
///
/// The rectangle is clipped to the frame; an empty intersection is absent.
pub fn validate_presence(
    frame: &Frame,
    rect: &GridRect,
    rule: &ForegroundRule,
    thresholds: &PresenceThresholds,
) -> PresenceReport {
    let x0 = rect.x.min(frame.width());
    let y0 = rect.y.min(frame.height());
    let x1 = rect.right().min(frame.width());
    let y1 = rect.bottom().min(frame.height());

    let mut foreground = 0u64;
    let mut background = 0u64;
    let mut border = 0u64;
    let img = frame.image();

    for y in y0..y1 {
        for x in x0..x1 {
            match classify_pixel(img.get_pixel(x, y), rule, thresholds) {
                PixelClass::Foreground => foreground += 1,
                PixelClass::Background => background += 1,
                PixelClass::Border => border += 1,
                PixelClass::Other => {}
            }
        }
    }

    let pixel_count = (x1 - x0) as u64 * (y1 - y0) as u64;
    if pixel_count == 0 {
        return PresenceReport {
            foreground: 0.0,
            background: 0.0,
            border: 0.0,
            pixel_count,
            present: false,
        };
    }

    let total = pixel_count as f64;
    let fg = (foreground as f64 / total) as f32;
    let bg = (background as f64 / total) as f32;
    let br = (border as f64 / total) as f32;

    let present = fg >= thresholds.min_foreground
        && fg <= thresholds.max_foreground
        && bg >= thresholds.min_background
        && br >= thresholds.min_border;

    PresenceReport {
        foreground: fg,
        background: bg,
        border: br,
        pixel_count,
        present,
    }
}
