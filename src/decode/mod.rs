//! Frame decoders.
//!
//! One decoder per [`Encoding`]. Each validates the delivered length before
//! touching pixel data, then adds exactly one frame to the accumulator in
//! R, G, B order. A decoder that fails leaves the accumulator untouched.

mod bayer;
mod compressed;
mod grey;
mod rgb;
mod yuv;

use crate::accumulator::AverageAccumulator;
use crate::encoding::Encoding;
use crate::frame::RawFrame;
use crate::traits::{CaptureError, Result};

pub use bayer::{demosaic_pixel, BayerPhase};
pub use yuv::yuv_to_rgb;

/// Decode `frame` and add it to `acc`.
pub fn decode(frame: &RawFrame<'_>, acc: &mut AverageAccumulator) -> Result<()> {
    if frame.width != acc.width() || frame.height != acc.height() {
        return Err(CaptureError::InvalidConfig(format!(
            "{}x{} frame does not match {}x{} accumulator",
            frame.width,
            frame.height,
            acc.width(),
            acc.height()
        )));
    }

    match frame.encoding {
        Encoding::Png => compressed::decode_png(frame, acc),
        Encoding::Jpeg | Encoding::Mjpeg => compressed::decode_jpeg(frame, acc),
        Encoding::Rgb32 => rgb::decode_rgb32(frame, acc),
        Encoding::Bgr32 => rgb::decode_bgr32(frame, acc),
        Encoding::Rgb24 => rgb::decode_rgb24(frame, acc),
        Encoding::Bgr24 => rgb::decode_bgr24(frame, acc),
        Encoding::Rgb565 => rgb::decode_rgb565(frame, acc),
        Encoding::Rgb555 => rgb::decode_rgb555(frame, acc),
        Encoding::Yuyv => yuv::decode_packed(frame, acc, yuv::PackedOrder::Yuyv),
        Encoding::Uyvy => yuv::decode_packed(frame, acc, yuv::PackedOrder::Uyvy),
        Encoding::Yuv420p => yuv::decode_yuv420p(frame, acc),
        Encoding::Nv12mb => yuv::decode_nv12mb(frame, acc),
        Encoding::Bayer => bayer::decode(frame, acc, BayerPhase::Bggr),
        Encoding::Sgbrg8 => bayer::decode(frame, acc, BayerPhase::Gbrg),
        Encoding::Sgrbg8 => bayer::decode(frame, acc, BayerPhase::Grbg),
        Encoding::Y16 => grey::decode_y16(frame, acc),
        Encoding::Grey => grey::decode_grey(frame, acc),
    }
}

/// Clip an intermediate channel value to `0..=255`.
pub(crate) fn clip(value: i32) -> u8 {
    u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX)
}
