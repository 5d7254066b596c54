//! Frame input for the solver.
//!
//! This module provides:
//! - The immutable `Frame` buffer (`Frame::from_raw`, `Frame::from_bgra`)
//! - The `FrameSource` seam sessions capture through
//! - A screenshot-file source and a pre-captured frame source

pub mod frame;
pub mod source;

pub use frame::Frame;
pub use source::{FrameSource, ImageFileSource, StaticFrameSource};
