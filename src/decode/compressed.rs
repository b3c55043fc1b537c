//! PNG and JPEG frames, decoded by the `image` crate.

use image::ImageFormat;

use crate::accumulator::AverageAccumulator;
use crate::frame::RawFrame;
use crate::repair::repair;
use crate::traits::{CaptureError, Result};

pub(super) fn decode_png(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    decode_with(frame.data(), ImageFormat::Png, frame, acc)
}

/// JPEG and MJPEG frames get their Huffman tables restored first.
pub(super) fn decode_jpeg(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    let bytes = repair(frame.data());
    decode_with(&bytes, ImageFormat::Jpeg, frame, acc)
}

fn decode_with(
    bytes: &[u8],
    format: ImageFormat,
    frame: &RawFrame<'_>,
    acc: &mut AverageAccumulator,
) -> Result<()> {
    let codec_error = |reason: String| CaptureError::CodecError {
        encoding: frame.encoding,
        reason,
    };

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|err| codec_error(err.to_string()))?
        .to_rgb8();
    if decoded.dimensions() != (frame.width, frame.height) {
        return Err(codec_error(format!(
            "decoded {}x{} image, expected {}x{}",
            decoded.width(),
            decoded.height(),
            frame.width,
            frame.height
        )));
    }

    let mut pixels = decoded.pixels();
    acc.accumulate(|_| pixels.next().map_or([0; 3], |p| p.0))
}
