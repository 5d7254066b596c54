//! Classified grids and the key sequences they produce.

use serde::Serialize;
use std::fmt;

use crate::glyph::{Classification, Symbol};

/// Nine classifications in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Grid {
    cells: [Classification; 9],
}

impl Grid {
    pub fn new(cells: [Classification; 9]) -> Self {
        Self { cells }
    }

    /// Builds a grid from symbols; `None` entries are Unknown.
    pub fn from_symbols(symbols: [Option<Symbol>; 9]) -> Self {
        Self::new(symbols.map(|s| match s {
            Some(symbol) => Classification::new(symbol, 1.0),
            None => Classification::unknown(),
        }))
    }

    pub fn get(&self, row: usize, col: usize) -> &Classification {
        &self.cells[row * 3 + col]
    }

    pub fn cells(&self) -> &[Classification; 9] {
        &self.cells
    }

    pub fn unknown_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_unknown()).count()
    }

    /// Row-major key requests, skipping Unknown cells.
    pub fn key_sequence(&self) -> KeySequence {
        let requests = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(index, c)| c.symbol.map(|symbol| KeyRequest { index, symbol }))
            .collect();
        KeySequence { requests }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            let line: Vec<String> = (0..3)
                .map(|col| match self.get(row, col).symbol {
                    Some(symbol) => symbol.to_string(),
                    None => "?".to_string(),
                })
                .collect();
            if row > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// One key press: the symbol and the grid position it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct KeyRequest {
    /// Row-major cell index, 0..9
    pub index: usize,
    pub symbol: Symbol,
}

/// Keys to press, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySequence {
    requests: Vec<KeyRequest>,
}

impl KeySequence {
    pub fn requests(&self) -> &[KeyRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// The keys as a string, e.g. "QWE".
    pub fn keys(&self) -> String {
        self.requests.iter().map(|r| r.symbol.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Symbol::*;

    #[test]
    fn test_key_sequence_is_row_major_and_skips_unknown() {
        let grid = Grid::from_symbols([
            Some(Q), None, Some(E),
            Some(R), Some(A), None,
            None, Some(S), Some(D),
        ]);
        let seq = grid.key_sequence();

        assert_eq!(seq.keys(), "QERASD");
        let indices: Vec<usize> = seq.requests().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 2, 3, 4, 7, 8]);
        assert_eq!(grid.unknown_count(), 3);
    }

    #[test]
    fn test_grid_display() {
        let grid = Grid::from_symbols([
            Some(W), Some(W), Some(W),
            None, None, None,
            Some(A), Some(S), Some(D),
        ]);
        assert_eq!(grid.to_string(), "W W W\n? ? ?\nA S D");
    }

    #[test]
    fn test_get_uses_row_and_column() {
        let mut symbols = [None; 9];
        symbols[5] = Some(D);
        let grid = Grid::from_symbols(symbols);
        assert_eq!(grid.get(1, 2).symbol, Some(D));
    }
}
