//! The fixed glyph alphabet and per-cell classification results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the seven glyphs that can appear in a grid cell.
///
/// Each glyph is pressed as the key with the same letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    Q,
    W,
    E,
    R,
    A,
    S,
    D,
}

impl Symbol {
    /// Every symbol in alphabet order. Template matching breaks ties in this order.
    pub const ALL: [Symbol; 7] = [
        Symbol::Q,
        Symbol::W,
        Symbol::E,
        Symbol::R,
        Symbol::A,
        Symbol::S,
        Symbol::D,
    ];

    /// Position of this symbol in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The key character this symbol is replayed as.
    pub fn key(self) -> char {
        match self {
            Symbol::Q => 'Q',
            Symbol::W => 'W',
            Symbol::E => 'E',
            Symbol::R => 'R',
            Symbol::A => 'A',
            Symbol::S => 'S',
            Symbol::D => 'D',
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Classifier output for one cell. `symbol == None` means Unknown.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub symbol: Option<Symbol>,
    /// Self-reported certainty in [0, 1]
    pub confidence: f32,
}

impl Classification {
    pub fn new(symbol: Symbol, confidence: f32) -> Self {
        Self {
            symbol: Some(symbol),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn unknown() -> Self {
        Self {
            symbol: None,
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.symbol.is_none()
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol {
            Some(symbol) => write!(f, "{} ({:.2})", symbol, self.confidence),
            None => write!(f, "? (unknown)"),
        }
    }
}
