//! Decision-tree classifier over signature features.
//!
//! Branches are evaluated in a fixed priority order and the first match wins;
//! there is no scoring between branches.

use image::RgbaImage;

use super::classifier::LetterClassifier;
use super::signature::Signature;
use super::symbol::{Classification, Symbol};

/// Aspect ratios outside this range are treated as broken detections.
const SANE_ASPECT_MIN: f32 = 0.35;
const SANE_ASPECT_MAX: f32 = 2.5;

/// Left-mass split used when the aspect ratio is not trustworthy.
const FALLBACK_LEFT_SPLIT: f32 = 0.55;
const FALLBACK_CONFIDENCE: f32 = 0.25;

/// Boxes wider than this are the wide glyph.
const WIDE_ASPECT: f32 = 1.25;

/// Looped glyphs: taller-than-wide and left-heavy.
const TALL_ASPECT: f32 = 0.75;
const TALL_LEFT_MIN: f32 = 0.55;
/// Looped glyphs with a strong left stem.
const STEM_LEFT_MIN: f32 = 0.58;

/// Solid glyphs with a strong left stem.
const SOLID_STEM_LEFT_MIN: f32 = 0.60;
/// Solid glyphs that are balanced but bottom-heavy (wide base).
const BASE_LEFT_MIN: f32 = 0.45;
const BASE_BOTTOM_MIN: f32 = 0.56;

#[derive(Clone, Copy, Debug)]
pub struct HeuristicClassifier {
    min_foreground_pixels: u32,
}

impl HeuristicClassifier {
    pub fn new(min_foreground_pixels: u32) -> Self {
        Self {
            min_foreground_pixels,
        }
    }

    /// Runs the decision tree on a signature.
    pub fn classify_signature(&self, sig: &Signature) -> Classification {
        if !sig.has_evidence(self.min_foreground_pixels) || sig.cyan_pixel_count == 0 {
            return Classification::unknown();
        }

        if !(SANE_ASPECT_MIN..=SANE_ASPECT_MAX).contains(&sig.aspect_ratio) {
            let symbol = if sig.left_heavy > FALLBACK_LEFT_SPLIT {
                Symbol::E
            } else {
                Symbol::S
            };
            return Classification::new(symbol, FALLBACK_CONFIDENCE);
        }

        if sig.aspect_ratio > WIDE_ASPECT {
            return Classification::new(Symbol::W, 0.85);
        }

        if sig.center_hole {
            if sig.aspect_ratio < TALL_ASPECT && sig.left_heavy > TALL_LEFT_MIN {
                return Classification::new(Symbol::R, 0.75);
            }
            if sig.left_heavy >= STEM_LEFT_MIN {
                return Classification::new(Symbol::D, 0.8);
            }
            return Classification::new(Symbol::Q, 0.6);
        }

        if sig.left_heavy >= SOLID_STEM_LEFT_MIN {
            return Classification::new(Symbol::E, 0.8);
        }
        if sig.left_heavy >= BASE_LEFT_MIN && sig.bottom_heavy >= BASE_BOTTOM_MIN {
            return Classification::new(Symbol::A, 0.7);
        }

        // The most neutral glyph
        Classification::new(Symbol::S, 0.5)
    }
}

impl LetterClassifier for HeuristicClassifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn classify(&self, _pixels: &RgbaImage, signature: &Signature) -> Classification {
        self.classify_signature(signature)
    }
}
