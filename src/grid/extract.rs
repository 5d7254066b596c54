//! Splitting a frame into the nine grid cells.

use image::RgbaImage;

use super::locator::{GridRect, GRID_DIM};
use crate::capture::Frame;
use crate::solver::error::SolveError;

/// Pixel rectangle of one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellBounds {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &CellBounds) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Shrinks the rectangle by `padding` on every side, keeping at least one pixel.
    pub fn inset(&self, padding: u32) -> CellBounds {
        let pad_x = padding.min(self.width.saturating_sub(1) / 2);
        let pad_y = padding.min(self.height.saturating_sub(1) / 2);
        CellBounds {
            x: self.x + pad_x,
            y: self.y + pad_y,
            width: self.width - 2 * pad_x,
            height: self.height - 2 * pad_y,
        }
    }
}

/// One grid cell cut out of a frame.
#[derive(Clone, Debug)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    /// Cell pixels after edge padding
    pub pixels: RgbaImage,
}

impl Cell {
    /// Row-major position, 0..9.
    pub fn index(&self) -> usize {
        self.row * GRID_DIM as usize + self.col
    }
}

/// Unpadded rectangle of cell (row, col).
pub fn cell_bounds(rect: &GridRect, row: u32, col: u32) -> CellBounds {
    let (x, y) = rect.cell_origin(row, col);
    CellBounds {
        x,
        y,
        width: rect.cell_size,
        height: rect.cell_size,
    }
}

/// All nine unpadded cell rectangles, row-major.
pub fn all_cell_bounds(rect: &GridRect) -> Vec<CellBounds> {
    (0..GRID_DIM)
        .flat_map(|row| (0..GRID_DIM).map(move |col| cell_bounds(rect, row, col)))
        .collect()
}

/// Checks that the grid rectangle lies entirely inside the frame.
pub fn ensure_within_frame(frame: &Frame, rect: &GridRect) -> Result<(), SolveError> {
    if rect.right_wide() > frame.width() as u64 || rect.bottom_wide() > frame.height() as u64 {
        return Err(SolveError::OutOfBounds {
            rect: *rect,
            frame_width: frame.width(),
            frame_height: frame.height(),
        });
    }
    Ok(())
}

/// Cuts the nine cells out of a frame, row-major, each inset by `edge_padding`.
///
/// Fails with `OutOfBounds` if the grid does not fit in the frame.
pub fn extract_cells(
    frame: &Frame,
    rect: &GridRect,
    edge_padding: u32,
) -> Result<Vec<Cell>, SolveError> {
    ensure_within_frame(frame, rect)?;

    let cells = (0..GRID_DIM)
        .flat_map(|row| (0..GRID_DIM).map(move |col| (row, col)))
        .map(|(row, col)| {
            let bounds = cell_bounds(rect, row, col).inset(edge_padding);
            let pixels = image::imageops::crop_imm(
                frame.image(),
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
            )
            .to_image();
            Cell {
                row: row as usize,
                col: col as usize,
                pixels,
            }
        })
        .collect();

    Ok(cells)
}

/// Crops the whole grid rectangle, for diagnostics.
pub fn crop_grid(frame: &Frame, rect: &GridRect) -> Result<RgbaImage, SolveError> {
    ensure_within_frame(frame, rect)?;
    Ok(
        image::imageops::crop_imm(frame.image(), rect.x, rect.y, rect.extent(), rect.extent())
            .to_image(),
    )
}
