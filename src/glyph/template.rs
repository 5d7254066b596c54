//! Reference-template classifier.
//!
//! Each alphabet symbol may have one reference image in the templates
//! directory (`Q.png`, `W.png`, ...). Images are converted to foreground masks
//! at load time. A cell is scored against every template by the share of the
//! template's foreground pixels that are also foreground in the cell.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::Path;

use super::classifier::LetterClassifier;
use super::signature::{GlyphMask, Signature};
use super::symbol::{Classification, Symbol};
use crate::solver::config::ForegroundRule;

/// Loaded reference masks, kept in alphabet order.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    entries: Vec<(Symbol, GlyphMask)>,
}

impl TemplateSet {
    /// Adds or replaces the template for a symbol.
    pub fn insert(&mut self, symbol: Symbol, mask: GlyphMask) {
        self.entries.retain(|(s, _)| *s != symbol);
        self.entries.push((symbol, mask));
        self.entries.sort_by_key(|(s, _)| s.index());
    }

    pub fn get(&self, symbol: Symbol) -> Option<&GlyphMask> {
        self.entries
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, mask)| mask)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbols that have no template and can never be produced.
    pub fn missing(&self) -> Vec<Symbol> {
        Symbol::ALL
            .into_iter()
            .filter(|s| self.get(*s).is_none())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Symbol, GlyphMask)> {
        self.entries.iter()
    }
}

/// Loads `<SYMBOL>.png` for every symbol from a directory.
///
/// Missing files are skipped with a log line. Images without any foreground
/// pixels under the rule are rejected, since they could never match.
/// Returns an error only if the directory itself cannot be read.
pub fn load_templates(dir: &Path, rule: &ForegroundRule) -> Result<TemplateSet> {
    std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read template directory {}", dir.display()))?;

    let mut set = TemplateSet::default();
    for symbol in Symbol::ALL {
        let path = dir.join(format!("{}.png", symbol));
        if !path.exists() {
            crate::log(&format!("Template missing: {}", path.display()));
            continue;
        }

        let img = match image::open(&path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                crate::log(&format!(
                    "Failed to load template {}: {}",
                    path.display(),
                    e
                ));
                continue;
            }
        };

        let mask = GlyphMask::from_image(&img, rule);
        if mask.count() == 0 {
            crate::log(&format!(
                "Template {} has no foreground pixels, ignoring",
                path.display()
            ));
            continue;
        }

        crate::log(&format!(
            "Loaded template {} ({}x{}, {} foreground pixels)",
            symbol,
            mask.width(),
            mask.height(),
            mask.count()
        ));
        set.insert(symbol, mask);
    }

    Ok(set)
}

/// Share of the template's foreground that is also foreground in the
/// candidate. Candidate coordinates are scaled when the sizes differ.
pub fn template_score(template: &GlyphMask, candidate: &GlyphMask) -> f32 {
    if template.count() == 0 || candidate.width() == 0 || candidate.height() == 0 {
        return 0.0;
    }

    let (tw, th) = (template.width() as u64, template.height() as u64);
    let (cw, ch) = (candidate.width() as u64, candidate.height() as u64);

    let matched = template
        .points()
        .into_iter()
        .filter(|&(x, y)| {
            let cx = (x as u64 * cw / tw) as u32;
            let cy = (y as u64 * ch / th) as u32;
            candidate.get(cx, cy)
        })
        .count();

    matched as f32 / template.count() as f32
}

pub struct TemplateClassifier {
    templates: TemplateSet,
    rule: ForegroundRule,
    min_foreground_pixels: u32,
    min_score: f32,
}

impl TemplateClassifier {
    pub fn new(
        templates: TemplateSet,
        rule: ForegroundRule,
        min_foreground_pixels: u32,
        min_score: f32,
    ) -> Self {
        Self {
            templates,
            rule,
            min_foreground_pixels,
            min_score,
        }
    }

    pub fn classify_pixels(&self, pixels: &RgbaImage) -> Classification {
        let candidate = GlyphMask::from_image(pixels, &self.rule);
        if candidate.count() == 0 || candidate.count() < self.min_foreground_pixels {
            return Classification::unknown();
        }

        let mut best: Option<(Symbol, f32)> = None;
        for (symbol, template) in self.templates.iter() {
            let score = template_score(template, &candidate);
            // Strictly greater keeps the earlier symbol on ties
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((*symbol, score));
            }
        }

        match best {
            Some((symbol, score)) if score >= self.min_score => Classification::new(symbol, score),
            _ => Classification::unknown(),
        }
    }
}

impl LetterClassifier for TemplateClassifier {
    fn name(&self) -> &'static str {
        "template"
    }

    fn classify(&self, pixels: &RgbaImage, _signature: &Signature) -> Classification {
        self.classify_pixels(pixels)
    }
}
