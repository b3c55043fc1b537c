//! Greyscale decoders.

use crate::accumulator::AverageAccumulator;
use crate::frame::RawFrame;
use crate::traits::Result;

pub(super) fn decode_grey(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    let payload = frame.checked_payload()?;
    let mut samples = payload.iter();
    acc.accumulate(|_| {
        let y = samples.next().copied().unwrap_or(0);
        [y, y, y]
    })
}

/// 16-bit little-endian luminance; only the high byte is kept.
pub(super) fn decode_y16(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    let payload = frame.checked_payload()?;
    let mut samples = payload.chunks_exact(2);
    acc.accumulate(|_| {
        let y = samples
            .next()
            .and_then(|s| s.get(1))
            .copied()
            .unwrap_or(0);
        [y, y, y]
    })
}
