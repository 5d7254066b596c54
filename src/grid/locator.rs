//! Grid placement on screen.
//!
//! The grid position depends only on the display resolution and the
//! configuration, never on frame content.

use std::fmt;

use crate::solver::config::GridConfig;

/// Number of cells along each axis.
pub const GRID_DIM: u32 = 3;

/// Size of the active display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
}

impl DisplayGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Preset key for this resolution, e.g. "1920x1080".
    pub fn profile_key(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Pixel rectangle of the whole grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridRect {
    pub x: u32,
    pub y: u32,
    pub cell_size: u32,
    /// Gap between adjacent cells
    pub cell_spacing: u32,
}

impl GridRect {
    /// Width and height of the grid: three cells plus two gaps, without overflow.
    pub fn extent_wide(&self) -> u64 {
        GRID_DIM as u64 * self.cell_size as u64 + (GRID_DIM - 1) as u64 * self.cell_spacing as u64
    }

    /// Width and height of the grid, saturating at `u32::MAX`.
    pub fn extent(&self) -> u32 {
        u32::try_from(self.extent_wide()).unwrap_or(u32::MAX)
    }

    /// Distance between the origins of neighbouring cells.
    pub fn pitch(&self) -> u32 {
        self.cell_size.saturating_add(self.cell_spacing)
    }

    /// Exclusive right edge. Saturates; use `right_wide` for bounds checks.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.extent())
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.extent())
    }

    pub fn right_wide(&self) -> u64 {
        self.x as u64 + self.extent_wide()
    }

    pub fn bottom_wide(&self) -> u64 {
        self.y as u64 + self.extent_wide()
    }

    /// Top-left pixel of cell (row, col).
    pub fn cell_origin(&self, row: u32, col: u32) -> (u32, u32) {
        (
            self.x.saturating_add(col.saturating_mul(self.pitch())),
            self.y.saturating_add(row.saturating_mul(self.pitch())),
        )
    }
}

impl fmt::Display for GridRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{} [cell {} gap {}]",
            self.x,
            self.y,
            self.extent(),
            self.extent(),
            self.cell_size,
            self.cell_spacing
        )
    }
}

/// A known screen layout.
struct Preset {
    key: &'static str,
    cell_size: u32,
    cell_spacing: u32,
    x: i32,
    y: i32,
}

const PRESETS: [Preset; 4] = [
    Preset { key: "1280x720", cell_size: 64, cell_spacing: 8, x: 536, y: 256 },
    Preset { key: "1920x1080", cell_size: 96, cell_spacing: 12, x: 804, y: 384 },
    Preset { key: "2560x1440", cell_size: 128, cell_spacing: 16, x: 1072, y: 512 },
    Preset { key: "3840x2160", cell_size: 192, cell_spacing: 24, x: 1608, y: 768 },
];

/// Fallback layout as fractions of the display, taken from the 1080p preset.
const FALLBACK_CELL_FRAC: f32 = 96.0 / 1080.0;
const FALLBACK_GAP_FRAC: f32 = 12.0 / 1080.0;
const FALLBACK_X_FRAC: f32 = 804.0 / 1920.0;
const FALLBACK_Y_FRAC: f32 = 384.0 / 1080.0;

pub const PROFILE_AUTO: &str = "auto";
pub const PROFILE_CUSTOM: &str = "custom";

/// Returns true if `key` names a built-in preset.
pub fn is_known_preset(key: &str) -> bool {
    PRESETS.iter().any(|p| p.key == key)
}

/// Computes the grid rectangle for a display and configuration.
///
/// - "custom": cell size, spacing and origin come from the config.
/// - "auto": the preset matching the display resolution.
/// - any other value: the preset with that key.
///
/// Without a matching preset the grid is laid out proportionally to the
/// display. For presets and the fallback, the configured offset nudges the
/// origin. Coordinates are clamped to be non-negative.
pub fn locate_grid(display: DisplayGeometry, config: &GridConfig) -> GridRect {
    let (cell_size, cell_spacing, x, y) = if config.resolution_profile == PROFILE_CUSTOM {
        (
            config.cell_size,
            config.cell_spacing,
            config.offset_x as i64,
            config.offset_y as i64,
        )
    } else {
        let key = if config.resolution_profile == PROFILE_AUTO {
            display.profile_key()
        } else {
            config.resolution_profile.clone()
        };

        let (cell_size, cell_spacing, x, y) = match PRESETS.iter().find(|p| p.key == key) {
            Some(p) => (p.cell_size, p.cell_spacing, p.x as i64, p.y as i64),
            None => proportional_layout(display),
        };
        (
            cell_size,
            cell_spacing,
            x + config.offset_x as i64,
            y + config.offset_y as i64,
        )
    };

    GridRect {
        x: x.clamp(0, u32::MAX as i64) as u32,
        y: y.clamp(0, u32::MAX as i64) as u32,
        cell_size: cell_size.max(1),
        cell_spacing,
    }
}

fn proportional_layout(display: DisplayGeometry) -> (u32, u32, i64, i64) {
    let w = display.width as f32;
    let h = display.height as f32;
    (
        (h * FALLBACK_CELL_FRAC).round() as u32,
        (h * FALLBACK_GAP_FRAC).round() as u32,
        (w * FALLBACK_X_FRAC).round() as i64,
        (h * FALLBACK_Y_FRAC).round() as i64,
    )
}
