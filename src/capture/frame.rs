//! Immutable frame buffers handed over by the capture side.

use anyhow::{anyhow, Result};
use image::{ImageBuffer, Rgba, RgbaImage};
use std::sync::Arc;

/// A captured screen frame, stored as RGBA.
///
/// Cloning is cheap: the pixels are shared and never mutated.
#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbaImage>,
}

impl Frame {
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Builds a frame from a raw RGB-ordered pixel buffer.
    ///
    /// `channels` is 1 (gray), 3 (RGB) or 4 (RGBA). Rows must be tightly packed.
    pub fn from_raw(width: u32, height: u32, channels: u8, data: &[u8]) -> Result<Self> {
        Self::from_raw_ordered(width, height, channels, data, false)
    }

    /// Builds a frame from a BGRA buffer, as produced by most desktop capture APIs.
    pub fn from_bgra(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        Self::from_raw_ordered(width, height, 4, data, true)
    }

    fn from_raw_ordered(
        width: u32,
        height: u32,
        channels: u8,
        data: &[u8],
        bgr: bool,
    ) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(anyhow!("Unsupported channel count: {}", channels));
        }

        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(anyhow!(
                "Frame buffer size mismatch: expected {} bytes for {}x{}x{}, got {}",
                expected,
                width,
                height,
                channels,
                data.len()
            ));
        }

        let stride = channels as usize;
        let image: RgbaImage = ImageBuffer::from_fn(width, height, |x, y| {
            let offset = (y as usize * width as usize + x as usize) * stride;
            let px = &data[offset..offset + stride];
            match channels {
                1 => Rgba([px[0], px[0], px[0], 255]),
                3 if bgr => Rgba([px[2], px[1], px[0], 255]),
                3 => Rgba([px[0], px[1], px[2], 255]),
                _ if bgr => Rgba([px[2], px[1], px[0], px[3]]),
                _ => Rgba([px[0], px[1], px[2], px[3]]),
            }
        });

        Ok(Self::from_image(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}
