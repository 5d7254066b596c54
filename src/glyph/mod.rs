//! Glyph recognition.
//!
//! This module provides:
//! - The glyph alphabet and classification results
//! - Signature extraction from a cell's foreground pixels
//! - Two interchangeable letter classifiers (heuristic and template)
//! - The post-classification correction table

pub mod classifier;
pub mod correction;
pub mod heuristic;
pub mod signature;
pub mod symbol;
pub mod template;

pub use classifier::{build_classifier, LetterClassifier};
pub use correction::CorrectionMap;
pub use signature::{Signature, SignatureExtractor};
pub use symbol::{Classification, Symbol};
pub use template::load_templates;
