//! Frame → grid detection.
//!
//! Locates the grid, checks that the puzzle is on screen, cuts out the nine
//! cells and reads them in parallel. Each cell runs signature extraction,
//! classification and correction independently; results are joined and
//! placed by position.

use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::config::SolverConfig;
use super::error::SolveError;
use super::sequence::Grid;
use crate::capture::Frame;
use crate::glyph::{Classification, CorrectionMap, LetterClassifier, Signature, SignatureExtractor};
use crate::grid::{
    crop_grid, extract_cells, locate_grid, validate_presence, Cell, DisplayGeometry, GridRect,
    PresenceReport,
};

/// Diagnostic record for one cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CellReading {
    pub row: usize,
    pub col: usize,
    pub signature: Signature,
    /// Classifier output before correction
    pub raw: Classification,
    /// Final classification placed in the grid
    pub corrected: Classification,
    pub elapsed_us: u64,
}

impl CellReading {
    /// Reading for a cell whose worker did not return.
    fn unreadable(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            signature: Signature::neutral(0),
            raw: Classification::unknown(),
            corrected: Classification::unknown(),
            elapsed_us: 0,
        }
    }
}

/// Everything one detection produced.
#[derive(Clone, Debug)]
pub struct Detection {
    pub rect: GridRect,
    pub presence: PresenceReport,
    pub grid: Grid,
    /// Row-major
    pub readings: Vec<CellReading>,
    /// Grid crop and padded cell crops, kept only when debug images are on
    pub grid_image: Option<RgbaImage>,
    pub cell_images: Vec<RgbaImage>,
    pub elapsed_ms: u64,
}

/// Detection pipeline bound to one configuration snapshot.
pub struct Detector {
    config: Arc<SolverConfig>,
    classifier: Arc<dyn LetterClassifier>,
    corrections: CorrectionMap,
    signatures: SignatureExtractor,
}

impl Detector {
    pub fn new(config: Arc<SolverConfig>, classifier: Arc<dyn LetterClassifier>) -> Self {
        let corrections = CorrectionMap::for_config(&config);
        let signatures = SignatureExtractor::new(
            config.foreground,
            config.min_foreground_pixels,
            config.hole_ratio,
        );
        Self {
            config,
            classifier,
            corrections,
            signatures,
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    pub fn correction_count(&self) -> usize {
        self.corrections.relabeled_count()
    }

    /// Runs signature → classification → correction on one cell.
    pub fn read_cell(&self, cell: &Cell) -> CellReading {
        let start = Instant::now();
        let signature = self.signatures.extract(&cell.pixels);
        let raw = self.classifier.classify(&cell.pixels, &signature);
        let corrected = self.corrections.apply(raw);
        CellReading {
            row: cell.row,
            col: cell.col,
            signature,
            raw,
            corrected,
            elapsed_us: start.elapsed().as_micros() as u64,
        }
    }

    /// Detects the grid in a frame.
    ///
    /// Fails with `OutOfBounds` if the configured grid does not fit the frame
    /// and with `NotPresent` if the presence check rejects it. The Unknown
    /// ceiling is the session's decision, not checked here.
    pub fn detect(&self, frame: &Frame, display: DisplayGeometry) -> Result<Detection, SolveError> {
        let start = Instant::now();
        let rect = locate_grid(display, &self.config.grid);

        // Cell extraction checks bounds too, but a misplaced grid must not be
        // reported as "not present"
        crate::grid::extract::ensure_within_frame(frame, &rect)?;

        let presence = validate_presence(
            frame,
            &rect,
            &self.config.foreground,
            &self.config.presence,
        );
        if !presence.present {
            return Err(SolveError::NotPresent {
                foreground: presence.foreground,
                background: presence.background,
                border: presence.border,
            });
        }

        let cells = extract_cells(frame, &rect, self.config.grid.edge_padding)?;

        let readings: Vec<CellReading> = thread::scope(|scope| {
            let handles: Vec<_> = cells
                .iter()
                .map(|cell| (cell.row, cell.col, scope.spawn(move || self.read_cell(cell))))
                .collect();

            handles
                .into_iter()
                .map(|(row, col, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        crate::log(&format!("Cell ({}, {}) worker panicked", row, col));
                        CellReading::unreadable(row, col)
                    })
                })
                .collect()
        });

        let mut classifications = [Classification::unknown(); 9];
        for reading in &readings {
            classifications[reading.row * 3 + reading.col] = reading.corrected;
        }
        let grid = Grid::new(classifications);

        let (grid_image, cell_images) = if self.config.save_debug_images {
            (
                Some(crop_grid(frame, &rect)?),
                cells.into_iter().map(|c| c.pixels).collect(),
            )
        } else {
            (None, Vec::new())
        };

        Ok(Detection {
            rect,
            presence,
            grid,
            readings,
            grid_image,
            cell_images,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}
