//! Packed RGB decoders.

use crate::accumulator::AverageAccumulator;
use crate::frame::RawFrame;
use crate::traits::Result;

/// Walk the payload `N` bytes at a time and add each mapped pixel.
fn accumulate_packed<const N: usize, F>(
    frame: &RawFrame<'_>,
    acc: &mut AverageAccumulator,
    to_rgb: F,
) -> Result<()>
where
    F: Fn(&[u8; N]) -> [u8; 3],
{
    let payload = frame.checked_payload()?;
    let mut pixels = payload
        .chunks_exact(N)
        .filter_map(|chunk| <&[u8; N]>::try_from(chunk).ok());
    acc.accumulate(|_| pixels.next().map_or([0; 3], &to_rgb))
}

pub(super) fn decode_rgb24(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    accumulate_packed::<3, _>(frame, acc, |&[r, g, b]| [r, g, b])
}

pub(super) fn decode_bgr24(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    accumulate_packed::<3, _>(frame, acc, |&[b, g, r]| [r, g, b])
}

pub(super) fn decode_rgb32(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    accumulate_packed::<4, _>(frame, acc, |&[r, g, b, _]| [r, g, b])
}

pub(super) fn decode_bgr32(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    accumulate_packed::<4, _>(frame, acc, |&[b, g, r, _]| [r, g, b])
}

pub(super) fn decode_rgb565(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    accumulate_packed::<2, _>(frame, acc, |&bytes| {
        let v = u16::from_le_bytes(bytes);
        [
            widen((v & 0xF800) >> 8, 5),
            widen((v & 0x07E0) >> 3, 6),
            widen((v & 0x001F) << 3, 5),
        ]
    })
}

pub(super) fn decode_rgb555(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    accumulate_packed::<2, _>(frame, acc, |&bytes| {
        let v = u16::from_le_bytes(bytes);
        [
            widen((v & 0x7C00) >> 7, 5),
            widen((v & 0x03E0) >> 2, 5),
            widen((v & 0x001F) << 3, 5),
        ]
    })
}

/// Scale a left-aligned `bits`-wide field to 8 bits by replicating its top
/// bits into the empty low bits, then clip.
fn widen(field: u16, bits: u32) -> u8 {
    let value = field + (field >> bits);
    u8::try_from(value).unwrap_or(u8::MAX)
}
