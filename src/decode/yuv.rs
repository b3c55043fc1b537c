//! YUV decoders: packed 4:2:2, planar 4:2:0 and tiled NV12.

use crate::accumulator::AverageAccumulator;
use crate::decode::clip;
use crate::encoding::nv12mb_plane_sizes;
use crate::frame::RawFrame;
use crate::traits::Result;

/// Convert one BT.601 sample to RGB with 8.8 fixed-point coefficients.
///
/// `R = Y + 1.402 V'`, `G = Y - 0.344 U' - 0.714 V'`, `B = Y + 1.772 U'`,
/// where `U' = U - 128` and `V' = V - 128`.
#[allow(clippy::many_single_char_names)]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = i32::from(y) << 8;
    let u = i32::from(u) - 128;
    let v = i32::from(v) - 128;

    [
        clip((y + 359 * v) >> 8),
        clip((y - 88 * u - 183 * v) >> 8),
        clip((y + 454 * u) >> 8),
    ]
}

/// Byte order of a packed 4:2:2 macropixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PackedOrder {
    /// Y0 U Y1 V
    Yuyv,
    /// U Y0 V Y1
    Uyvy,
}

pub(super) fn decode_packed(
    frame: &RawFrame<'_>,
    acc: &mut AverageAccumulator,
    order: PackedOrder,
) -> Result<()> {
    let payload = frame.checked_payload()?;
    let mut pixels = payload
        .chunks_exact(4)
        .filter_map(|m| <[u8; 4]>::try_from(m).ok())
        .flat_map(|m| [(m, false), (m, true)]);

    acc.accumulate(|_| {
        let Some((m, second)) = pixels.next() else {
            return [0; 3];
        };
        let (y0, u, y1, v) = match order {
            PackedOrder::Yuyv => (m[0], m[1], m[2], m[3]),
            PackedOrder::Uyvy => (m[1], m[0], m[3], m[2]),
        };
        yuv_to_rgb(if second { y1 } else { y0 }, u, v)
    })
}

pub(super) fn decode_yuv420p(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    let payload = frame.checked_payload()?;
    let w = frame.width as usize;
    let luma_len = frame.pixel_count();
    let chroma_w = w.div_ceil(2);
    let chroma_len = chroma_w * (frame.height as usize).div_ceil(2);
    let (luma, chroma) = payload.split_at(luma_len.min(payload.len()));
    let (u_plane, v_plane) = chroma.split_at(chroma_len.min(chroma.len()));

    acc.accumulate(|i| {
        let (x, y) = (i % w, i / w);
        let c = (y / 2) * chroma_w + x / 2;
        yuv_to_rgb(
            luma.get(i).copied().unwrap_or(0),
            u_plane.get(c).copied().unwrap_or(128),
            v_plane.get(c).copied().unwrap_or(128),
        )
    })
}

/// NV12 in 16x16 macroblocks.
///
/// The luma plane is a row-major grid of 256-byte tiles, each holding a
/// 16x16 block of pixels row by row. The interleaved UV plane (one row per
/// two luma rows) is tiled the same way, so one chroma tile spans 16 pixels
/// across and 32 luma rows down.
pub(super) fn decode_nv12mb(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    let payload = frame.checked_payload()?;
    let w = frame.width as usize;
    let tiles_x = w.div_ceil(16);
    let luma_len = nv12mb_plane_sizes(w, frame.height as usize).map_or(0, |(luma, _)| luma);
    let (luma, chroma) = payload.split_at(luma_len.min(payload.len()));

    acc.accumulate(|i| {
        let (x, y) = (i % w, i / w);
        let cy = y / 2;
        let luma_at = tile_offset(tiles_x, x, y);
        let chroma_at = tile_offset(tiles_x, x & !1, cy);
        yuv_to_rgb(
            luma.get(luma_at).copied().unwrap_or(0),
            chroma.get(chroma_at).copied().unwrap_or(128),
            chroma.get(chroma_at + 1).copied().unwrap_or(128),
        )
    })
}

/// Offset of byte (`x`, `y`) in a plane of 16x16-byte tiles, `tiles_x` wide.
const fn tile_offset(tiles_x: usize, x: usize, y: usize) -> usize {
    ((y >> 4) * tiles_x + (x >> 4)) * 256 + ((y & 15) << 4) + (x & 15)
}
