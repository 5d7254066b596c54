//! Letter classifier capability and strategy selection.

use image::RgbaImage;
use std::sync::Arc;

use super::heuristic::HeuristicClassifier;
use super::signature::Signature;
use super::symbol::Classification;
use super::template::{TemplateClassifier, TemplateSet};
use crate::solver::config::{ClassifierStrategy, SolverConfig};

/// Maps one cell to a symbol and confidence.
///
/// Implementations must be pure: the same pixels and signature always give
/// the same classification. Too little evidence yields Unknown rather than
/// an error.
pub trait LetterClassifier: Send + Sync {
    /// Short strategy name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Classifies one cell. `pixels` is the padded cell crop and `signature`
    /// was extracted from it.
    fn classify(&self, pixels: &RgbaImage, signature: &Signature) -> Classification;
}

/// Builds the classifier selected by the configuration.
///
/// The template strategy needs at least one loaded template. Without any it
/// falls back to the heuristic strategy and logs a warning.
pub fn build_classifier(
    config: &SolverConfig,
    templates: Option<TemplateSet>,
) -> Arc<dyn LetterClassifier> {
    let heuristic = HeuristicClassifier::new(config.min_foreground_pixels);

    match config.classifier_strategy {
        ClassifierStrategy::Heuristic => Arc::new(heuristic),
        ClassifierStrategy::Template => match templates {
            Some(set) if !set.is_empty() => {
                let missing = set.missing();
                if !missing.is_empty() {
                    crate::log(&format!(
                        "Warning: no template for {:?}; these glyphs cannot be recognized",
                        missing
                    ));
                }
                Arc::new(TemplateClassifier::new(
                    set,
                    config.foreground,
                    config.min_foreground_pixels,
                    config.min_template_score,
                ))
            }
            _ => {
                crate::log("Warning: template strategy selected but no templates loaded, using heuristic");
                Arc::new(heuristic)
            }
        },
    }
}
