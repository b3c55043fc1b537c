//! 8-bit Bayer demosaic by neighbour averaging.
//!
//! Phases, top-left 2x2 block:
//!
//! ```text
//! Bggr    Gbrg    Grbg
//! B G     G B     G R
//! G R     R G     B G
//! ```

use crate::accumulator::AverageAccumulator;
use crate::frame::RawFrame;
use crate::traits::Result;

/// Colour-filter layout of a Bayer mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BayerPhase {
    /// Rows alternate B G / G R.
    Bggr,
    /// Rows alternate G B / R G.
    Gbrg,
    /// Rows alternate G R / B G.
    Grbg,
}

pub(super) fn decode(
    frame: &RawFrame<'_>,
    acc: &mut AverageAccumulator,
    phase: BayerPhase,
) -> Result<()> {
    let mosaic = frame.checked_payload()?;
    let (w, h) = (frame.width as usize, frame.height as usize);
    acc.accumulate(|i| demosaic_pixel(mosaic, w, h, i % w, i / w, phase))
}

/// Index of the neighbour one step before `c`, mirrored onto the step after
/// it at the low edge.
const fn before(c: usize, len: usize) -> usize {
    if c > 0 {
        c - 1
    } else if c + 1 < len {
        c + 1
    } else {
        c
    }
}

/// Index of the neighbour one step after `c`, mirrored onto the step before
/// it at the high edge.
const fn after(c: usize, len: usize) -> usize {
    if c + 1 < len {
        c + 1
    } else if c > 0 {
        c - 1
    } else {
        c
    }
}

fn narrow(value: u16) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// Reconstruct RGB at (`x`, `y`) of a `width` x `height` mosaic.
///
/// The horizontal, vertical and diagonal neighbour means supply the two
/// colours the site did not sample. Out-of-bounds neighbours are replaced by
/// their mirror on the opposite side, so edges never read outside the image.
#[allow(clippy::many_single_char_names)]
pub fn demosaic_pixel(
    mosaic: &[u8],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    phase: BayerPhase,
) -> [u8; 3] {
    let at = |x: usize, y: usize| {
        u16::from(
            y.checked_mul(width)
                .and_then(|row| mosaic.get(row + x))
                .copied()
                .unwrap_or(0),
        )
    };
    let (left, right) = (before(x, width), after(x, width));
    let (up, down) = (before(y, height), after(y, height));

    let centre = narrow(at(x, y));
    let hn = (at(left, y) + at(right, y)) / 2;
    let vn = (at(x, up) + at(x, down)) / 2;
    let di = (at(left, up) + at(right, up) + at(left, down) + at(right, down)) / 4;

    let parity = (x + y) & 1 == 1;
    let green_site = match phase {
        BayerPhase::Bggr => parity,
        BayerPhase::Gbrg | BayerPhase::Grbg => !parity,
    };
    let odd_row = y & 1 == 1;

    let (r, g, b) = if green_site {
        if odd_row {
            (narrow(hn), centre, narrow(vn))
        } else {
            (narrow(vn), centre, narrow(hn))
        }
    } else if odd_row {
        (centre, narrow((vn + hn) / 2), narrow(di))
    } else {
        (narrow(di), narrow((vn + hn) / 2), centre)
    };

    if phase == BayerPhase::Grbg {
        [b, g, r]
    } else {
        [r, g, b]
    }
}
