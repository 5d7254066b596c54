//! Frame sources consumed by solver sessions.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::frame::Frame;

/// Supplies a frame each time a session starts detecting.
///
/// Capturing may block; the session thread waits for it.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame>;
}

/// Reads a screenshot from disk on every capture.
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for ImageFileSource {
    fn capture(&mut self) -> Result<Frame> {
        let img = image::open(&self.path)
            .with_context(|| format!("Failed to load {}", self.path.display()))?;
        Ok(Frame::from_image(img.to_rgba8()))
    }
}

/// Hands out a frame that was captured elsewhere.
pub struct StaticFrameSource {
    frame: Frame,
}

impl StaticFrameSource {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }
}

impl FrameSource for StaticFrameSource {
    fn capture(&mut self) -> Result<Frame> {
        Ok(self.frame.clone())
    }
}
