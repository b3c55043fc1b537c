//! Multi-frame averaging buffer.

use image::{Rgb, RgbImage};

use crate::traits::{CaptureError, Result};

/// Largest number of frames that may be averaged.
///
/// A `u32` channel slot holds `255 * MAX_FRAMES` without overflowing.
pub const MAX_FRAMES: u32 = u32::MAX >> 8;

/// Per-channel running sums for one capture run.
#[derive(Debug, Clone)]
pub struct AverageAccumulator {
    channels: Vec<u32>,
    width: u32,
    height: u32,
    frames_added: u32,
}

impl AverageAccumulator {
    /// Allocate a zeroed accumulator for `width` x `height` RGB pixels.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| {
                CaptureError::InvalidConfig(format!("resolution {width}x{height} is too large"))
            })?;
        let mut channels = Vec::new();
        channels
            .try_reserve_exact(len)
            .map_err(|_| CaptureError::OutOfMemory(len.saturating_mul(4)))?;
        channels.resize(len, 0);
        Ok(Self {
            channels,
            width,
            height,
            frames_added: 0,
        })
    }

    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of complete frames accumulated so far.
    pub const fn frames_added(&self) -> u32 {
        self.frames_added
    }

    /// Number of pixels per frame.
    pub fn pixel_count(&self) -> usize {
        self.channels.len() / 3
    }

    /// Add one pixel's contribution. Out-of-range indices are ignored.
    ///
    /// Sums saturate, although the [`MAX_FRAMES`] cap keeps them from ever
    /// reaching `u32::MAX`. This does not count a frame; decoders go through
    /// [`AverageAccumulator::accumulate`], which adds every pixel here.
    pub fn add(&mut self, pixel_index: usize, r: u8, g: u8, b: u8) {
        let start = pixel_index.saturating_mul(3);
        if let Some(slot) = self.channels.get_mut(start..start.saturating_add(3)) {
            for (sum, value) in slot.iter_mut().zip([r, g, b]) {
                *sum = sum.saturating_add(u32::from(value));
            }
        }
    }

    /// Add one whole frame, asking `pixel` for the RGB value of every pixel
    /// index in row-major order.
    pub fn accumulate<F>(&mut self, mut pixel: F) -> Result<()>
    where
        F: FnMut(usize) -> [u8; 3],
    {
        if self.frames_added >= MAX_FRAMES {
            return Err(CaptureError::InvalidConfig(format!(
                "cannot average more than {MAX_FRAMES} frames"
            )));
        }
        for index in 0..self.pixel_count() {
            let [r, g, b] = pixel(index);
            self.add(index, r, g, b);
        }
        self.frames_added += 1;
        Ok(())
    }

    /// Divide every sum by `frame_count` and produce the averaged image.
    pub fn finalize(&self, frame_count: u32) -> Result<RgbImage> {
        if frame_count == 0 {
            return Err(CaptureError::NoFramesCaptured);
        }
        let mut image = RgbImage::new(self.width, self.height);
        for (pixel, sums) in image.pixels_mut().zip(self.channels.chunks_exact(3)) {
            let mut rgb = [0u8; 3];
            for (out, sum) in rgb.iter_mut().zip(sums) {
                *out = u8::try_from(sum / frame_count).unwrap_or(u8::MAX);
            }
            *pixel = Rgb(rgb);
        }
        Ok(image)
    }

    /// Zero all sums for another run at the same resolution.
    pub fn reset(&mut self) {
        self.channels.fill(0);
        self.frames_added = 0;
    }
}
