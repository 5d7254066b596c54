//! Per-cell glyph signatures.
//!
//! A signature summarizes the shape of the cyan foreground pixels in one
//! cell: how many there are, the aspect ratio of their bounding box, how the
//! mass splits around the box center, and whether the box center is empty.

use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::solver::config::ForegroundRule;

impl ForegroundRule {
    /// Returns true if the pixel belongs to a glyph under this rule.
    pub fn matches(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b, _] = pixel.0;
        if r > self.max_red || g < self.min_green || b < self.min_blue {
            return false;
        }
        if mean_brightness(pixel) < self.min_brightness {
            return false;
        }
        channel_deviation(pixel) >= self.min_deviation
    }
}

/// Mean of the R, G and B channels.
pub fn mean_brightness(pixel: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}

/// Spread between the strongest and weakest color channel (0 for pure gray).
pub fn channel_deviation(pixel: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    r.max(g).max(b) - r.min(g).min(b)
}

/// Binary foreground mask of a cell or reference glyph.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
    count: u32,
}

impl GlyphMask {
    /// Builds a mask by applying the foreground rule to every pixel.
    pub fn from_image(img: &RgbaImage, rule: &ForegroundRule) -> Self {
        let (width, height) = img.dimensions();
        let bits: Vec<bool> = img.pixels().map(|p| rule.matches(p)).collect();
        let count = bits.iter().filter(|&&b| b).count() as u32;
        Self {
            width,
            height,
            bits,
            count,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[(y * self.width + x) as usize]
    }

    /// Coordinates of every foreground pixel, row-major.
    pub fn points(&self) -> Vec<(u32, u32)> {
        let width = self.width.max(1);
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(i, _)| (i as u32 % width, i as u32 / width))
            .collect()
    }
}

/// Geometric summary of a cell's foreground pixels.
///
/// Mass fractions are measured around the bounding box center, not the cell
/// center, because glyphs are rarely perfectly centered in their cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Signature {
    pub cyan_pixel_count: u32,
    /// Bounding box width / height
    pub aspect_ratio: f32,
    pub top_heavy: f32,
    pub bottom_heavy: f32,
    pub left_heavy: f32,
    pub right_heavy: f32,
    pub center_hole: bool,
}

impl Signature {
    /// Signature reported when there is not enough foreground to measure.
    pub fn neutral(cyan_pixel_count: u32) -> Self {
        Self {
            cyan_pixel_count,
            aspect_ratio: 1.0,
            top_heavy: 0.5,
            bottom_heavy: 0.5,
            left_heavy: 0.5,
            right_heavy: 0.5,
            center_hole: false,
        }
    }

    /// True if the signature was computed from at least `floor` pixels.
    pub fn has_evidence(&self, floor: u32) -> bool {
        self.cyan_pixel_count >= floor
    }
}

/// Turns cell pixels into signatures.
#[derive(Clone, Copy, Debug)]
pub struct SignatureExtractor {
    pub rule: ForegroundRule,
    /// Minimum foreground pixel count for a measured signature
    pub min_foreground_pixels: u32,
    /// Center share below which the glyph counts as looped
    pub hole_ratio: f32,
}

impl SignatureExtractor {
    pub fn new(rule: ForegroundRule, min_foreground_pixels: u32, hole_ratio: f32) -> Self {
        Self {
            rule,
            min_foreground_pixels,
            hole_ratio,
        }
    }

    /// Extracts the signature of one cell. Never fails: too little foreground
    /// yields the neutral signature.
    pub fn extract(&self, pixels: &RgbaImage) -> Signature {
        let mask = GlyphMask::from_image(pixels, &self.rule);
        self.from_points(&mask.points())
    }

    /// Computes a signature from foreground pixel coordinates.
    pub fn from_points(&self, points: &[(u32, u32)]) -> Signature {
        let count = points.len() as u32;
        if count == 0 || count < self.min_foreground_pixels {
            return Signature::neutral(count);
        }

        let mut min_x = u32::MAX;
        let mut max_x = 0;
        let mut min_y = u32::MAX;
        let mut max_y = 0;
        for &(x, y) in points {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let box_width = max_x - min_x + 1;
        let box_height = max_y - min_y + 1;
        let center_x = (min_x + max_x) as f32 / 2.0;
        let center_y = (min_y + max_y) as f32 / 2.0;

        // Pixels on a center line count half to each side so opposite
        // fractions always sum to 1.
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        let mut top = 0.0f32;
        let mut bottom = 0.0f32;

        let radius = 0.25 * box_width.min(box_height) as f32;
        let radius_sq = radius * radius;
        let mut inner = 0u32;

        for &(x, y) in points {
            let (fx, fy) = (x as f32, y as f32);

            if fx < center_x {
                left += 1.0;
            } else if fx > center_x {
                right += 1.0;
            } else {
                left += 0.5;
                right += 0.5;
            }

            if fy < center_y {
                top += 1.0;
            } else if fy > center_y {
                bottom += 1.0;
            } else {
                top += 0.5;
                bottom += 0.5;
            }

            let dx = fx - center_x;
            let dy = fy - center_y;
            if dx * dx + dy * dy <= radius_sq {
                inner += 1;
            }
        }

        let n = count as f32;
        Signature {
            cyan_pixel_count: count,
            aspect_ratio: box_width as f32 / box_height as f32,
            top_heavy: top / n,
            bottom_heavy: bottom / n,
            left_heavy: left / n,
            right_heavy: right / n,
            center_hole: (inner as f32 / n) < self.hole_ratio,
        }
    }
}
