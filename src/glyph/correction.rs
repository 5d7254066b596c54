//! Post-classification relabeling.
//!
//! The heuristic classifier's raw output names the wrong glyph for several
//! symbols in a consistent way. The built-in table maps those outputs back
//! onto the glyph actually on screen. It compensates for the bias; the
//! thresholds themselves are not re-derived from it.

use std::collections::BTreeMap;

use super::symbol::{Classification, Symbol};
use crate::solver::config::{ClassifierStrategy, SolverConfig};

/// Partial symbol → symbol mapping. A missing entry is the identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CorrectionMap {
    table: [Option<Symbol>; 7],
}

impl CorrectionMap {
    /// No relabeling.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Built-in table for the heuristic classifier.
    pub fn heuristic_default() -> Self {
        Self::identity()
            .with(Symbol::Q, Symbol::R)
            .with(Symbol::R, Symbol::D)
            .with(Symbol::D, Symbol::Q)
            .with(Symbol::E, Symbol::A)
            .with(Symbol::A, Symbol::E)
    }

    /// Builds a map from explicit entries.
    pub fn from_entries(entries: &BTreeMap<Symbol, Symbol>) -> Self {
        entries
            .iter()
            .fold(Self::identity(), |map, (&from, &to)| map.with(from, to))
    }

    /// Chooses the table for a configuration: explicit corrections win,
    /// otherwise the built-in table for the configured strategy.
    pub fn for_config(config: &SolverConfig) -> Self {
        match (&config.corrections, config.classifier_strategy) {
            (Some(entries), _) => Self::from_entries(entries),
            (None, ClassifierStrategy::Heuristic) => Self::heuristic_default(),
            (None, ClassifierStrategy::Template) => Self::identity(),
        }
    }

    pub fn with(mut self, from: Symbol, to: Symbol) -> Self {
        self.table[from.index()] = if from == to { None } else { Some(to) };
        self
    }

    /// Relabels one symbol.
    pub fn map(&self, symbol: Symbol) -> Symbol {
        self.table[symbol.index()].unwrap_or(symbol)
    }

    /// Relabels a classification, keeping its confidence. Unknown stays Unknown.
    pub fn apply(&self, classification: Classification) -> Classification {
        Classification {
            symbol: classification.symbol.map(|s| self.map(s)),
            confidence: classification.confidence,
        }
    }

    /// Number of symbols that are relabeled.
    pub fn relabeled_count(&self) -> usize {
        self.table.iter().filter(|entry| entry.is_some()).count()
    }
}
