//! Grid geometry and frame slicing.
//!
//! This module provides:
//! - Grid localization from display geometry and configuration
//! - The color-class presence check that gates detection
//! - Cell extraction from a captured frame

pub mod extract;
pub mod locator;
pub mod presence;

pub use extract::{crop_grid, extract_cells, Cell};
pub use locator::{locate_grid, DisplayGeometry, GridRect};
pub use presence::{validate_presence, PresenceReport};
