//! Session-level failures.

use thiserror::Error;

use crate::grid::GridRect;

/// Errors that end a detection attempt.
///
/// Classification never produces one of these: cells without enough evidence
/// become Unknown, and only the Unknown count is escalated.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The puzzle overlay is not on screen. Nothing to solve yet.
    #[error(
        "puzzle not on screen (foreground {foreground:.3}, background {background:.3}, border {border:.3})"
    )]
    NotPresent {
        foreground: f32,
        background: f32,
        border: f32,
    },

    /// The configured grid does not fit in the captured frame.
    #[error("grid {rect} exceeds the {frame_width}x{frame_height} frame")]
    OutOfBounds {
        rect: GridRect,
        frame_width: u32,
        frame_height: u32,
    },

    /// Too many cells could not be classified.
    #[error("{unknown} of 9 cells could not be read")]
    DetectionFailure { unknown: usize },

    #[error("frame capture failed: {0}")]
    Capture(#[source] anyhow::Error),
}

impl SolveError {
    /// Geometry errors are not fixed by trying again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SolveError::OutOfBounds { .. })
    }
}
