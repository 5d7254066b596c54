//! Debug artifacts for a detection.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::detect::{CellReading, Detection};
use crate::grid::PresenceReport;

#[derive(Serialize)]
struct ReadingsFile<'a> {
    grid: String,
    rect: [u32; 4],
    presence: &'a PresenceReport,
    unknown: usize,
    readings: &'a [CellReading],
}

/// Writes the grid crop, the nine cell crops and a readings.json into `dir`.
///
/// Images are only present when the detection kept them; readings are
/// always written. Returns the directory.
pub fn save_detection_artifacts(dir: &Path, detection: &Detection) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    if let Some(grid_image) = &detection.grid_image {
        let path = dir.join("grid.png");
        grid_image
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }

    for (i, cell) in detection.cell_images.iter().enumerate() {
        let path = dir.join(format!("cell_{}_{}.png", i / 3, i % 3));
        cell.save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }

    let rect = detection.rect;
    let file = ReadingsFile {
        grid: detection.grid.to_string(),
        rect: [rect.x, rect.y, rect.cell_size, rect.cell_spacing],
        presence: &detection.presence,
        unknown: detection.grid.unknown_count(),
        readings: &detection.readings,
    };
    let json = serde_json::to_string_pretty(&file).context("Failed to serialize readings")?;
    fs::write(dir.join("readings.json"), json).context("Failed to write readings.json")?;

    Ok(dir.to_path_buf())
}
