//! Raw frames as delivered by a capture source.

use crate::encoding::Encoding;
use crate::traits::{CaptureError, Result};

/// One captured frame in its native encoding.
///
/// The bytes are borrowed from the source (a shared ring slot, a file image,
/// or a read buffer), so the frame cannot be held across the next grab.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    data: &'a [u8],
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Native pixel encoding.
    pub encoding: Encoding,
    /// Sequence number assigned by the source.
    pub sequence: u32,
}

impl<'a> RawFrame<'a> {
    /// Wrap delivered bytes.
    pub const fn new(data: &'a [u8], width: u32, height: u32, encoding: Encoding) -> Self {
        Self {
            data,
            width,
            height,
            encoding,
            sequence: 0,
        }
    }

    /// Attach a sequence number.
    #[must_use]
    pub const fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Delivered bytes. May be shorter than the nominal frame size.
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Number of delivered bytes.
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes were delivered.
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of pixels at the frame's resolution.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Return the first `frame_size(encoding)` bytes, or `ShortFrame`.
    ///
    /// Every fixed-size decoder goes through this before reading pixels.
    pub fn checked_payload(&self) -> Result<&'a [u8]> {
        let required = self
            .encoding
            .frame_size(self.width, self.height)
            .ok_or_else(|| {
                CaptureError::InvalidConfig(format!(
                    "{} frame of {}x{} has no fixed size",
                    self.encoding, self.width, self.height
                ))
            })?;
        self.data
            .get(..required)
            .ok_or(CaptureError::ShortFrame {
                encoding: self.encoding,
                required,
                actual: self.data.len(),
            })
    }
}
