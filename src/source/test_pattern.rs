//! Synthetic colour-bar source.

use crate::encoding::Encoding;
use crate::frame::RawFrame;
use crate::source::{ListFlags, SourceRequest};
use crate::traits::{CaptureError, CaptureSource, Negotiated, Result};

/// Bar colours from left to right.
pub const TEST_PATTERN_BARS: [[u8; 3]; 8] = [
    [0xFF, 0xFF, 0xFF], // white
    [0xFF, 0xFF, 0x00], // yellow
    [0x00, 0xFF, 0xFF], // cyan
    [0x00, 0xFF, 0x00], // green
    [0xFF, 0x00, 0xFF], // magenta
    [0xFF, 0x00, 0x00], // red
    [0x00, 0x00, 0xFF], // blue
    [0x00, 0x00, 0x00], // black
];

/// Eight vertical bars in RGB24, drawn once at open and delivered unchanged
/// by every grab.
///
/// Bars are `width / 8` pixels wide (at least one). Columns left over when
/// the width is not a multiple of eight are white.
#[derive(Debug)]
pub struct TestPatternSource {
    image: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u32,
    closed: bool,
}

impl TestPatternSource {
    /// Draw the pattern at the requested resolution.
    pub fn open(request: &SourceRequest) -> Result<Self> {
        if request.list.contains(ListFlags::INPUTS) {
            log::info!("--- No inputs.");
        }
        if request.list.contains(ListFlags::TUNERS) {
            log::info!("--- No tuners.");
        }
        if request.list.contains(ListFlags::FORMATS) {
            log::info!("--- Test only supports RGB24.");
        }
        if request.list.contains(ListFlags::CONTROLS) {
            log::info!("--- No controls.");
        }
        if let Some(encoding) = request.encoding.filter(|e| *e != Encoding::Rgb24) {
            log::warn!("Test source ignores palette {encoding}, using RGB24.");
        }

        let (width, height) = (request.width, request.height);
        let size = Encoding::Rgb24
            .frame_size(width, height)
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                CaptureError::InvalidConfig(format!("unusable test resolution {width}x{height}"))
            })?;

        let mut image = Vec::new();
        image
            .try_reserve_exact(size)
            .map_err(|_| CaptureError::OutOfMemory(size))?;

        let bar_width = (width / 8).max(1);
        for _ in 0..height {
            for x in 0..width {
                let bar = usize::try_from(x / bar_width).unwrap_or(usize::MAX);
                let colour = TEST_PATTERN_BARS.get(bar).unwrap_or(&TEST_PATTERN_BARS[0]);
                image.extend_from_slice(colour);
            }
        }

        Ok(Self {
            image,
            width,
            height,
            sequence: 0,
            closed: false,
        })
    }
}

impl CaptureSource for TestPatternSource {
    fn name(&self) -> &'static str {
        "test"
    }

    fn negotiated(&self) -> Negotiated {
        Negotiated {
            width: self.width,
            height: self.height,
            encoding: Encoding::Rgb24,
        }
    }

    fn grab(&mut self) -> Result<RawFrame<'_>> {
        if self.closed {
            return Err(CaptureError::Stream("test source is closed".to_owned()));
        }
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(RawFrame::new(&self.image, self.width, self.height, Encoding::Rgb24)
            .with_sequence(sequence))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.image = Vec::new();
        Ok(())
    }
}
