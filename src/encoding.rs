//! Pixel encodings understood by the decoders.

use std::fmt;
use std::str::FromStr;

use crate::traits::{CaptureError, FourCC};

/// Native pixel layout of a captured frame.
///
/// Each tag fixes the byte layout a source delivers and the decoder used to
/// turn it into RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// PNG compressed image.
    Png,
    /// JPEG compressed image.
    Jpeg,
    /// Motion JPEG frame, possibly missing its Huffman tables.
    Mjpeg,
    /// Packed R, G, B, X bytes.
    Rgb32,
    /// Packed B, G, R, X bytes.
    Bgr32,
    /// Packed R, G, B bytes.
    Rgb24,
    /// Packed B, G, R bytes.
    Bgr24,
    /// Packed 4:2:2, Y0 U Y1 V.
    Yuyv,
    /// Packed 4:2:2, U Y0 V Y1.
    Uyvy,
    /// Planar 4:2:0, full Y plane then quarter U and V planes.
    Yuv420p,
    /// NV12 stored as 16x16 macroblock tiles.
    Nv12mb,
    /// 8-bit Bayer mosaic starting B G / G R.
    Bayer,
    /// 8-bit Bayer mosaic starting G B / R G.
    Sgbrg8,
    /// 8-bit Bayer mosaic starting G R / B G.
    Sgrbg8,
    /// Little-endian 16-bit 5:6:5 RGB.
    Rgb565,
    /// Little-endian 16-bit X:5:5:5 RGB.
    Rgb555,
    /// Little-endian 16-bit greyscale.
    Y16,
    /// 8-bit greyscale.
    Grey,
}

impl Encoding {
    /// Every encoding, in the order devices are tried when the caller
    /// leaves the choice open.
    pub const ALL: [Self; 18] = [
        Self::Png,
        Self::Jpeg,
        Self::Mjpeg,
        Self::Rgb32,
        Self::Bgr32,
        Self::Rgb24,
        Self::Bgr24,
        Self::Yuyv,
        Self::Uyvy,
        Self::Yuv420p,
        Self::Nv12mb,
        Self::Bayer,
        Self::Sgbrg8,
        Self::Sgrbg8,
        Self::Rgb565,
        Self::Rgb555,
        Self::Y16,
        Self::Grey,
    ];

    /// Canonical upper-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Mjpeg => "MJPEG",
            Self::Rgb32 => "RGB32",
            Self::Bgr32 => "BGR32",
            Self::Rgb24 => "RGB24",
            Self::Bgr24 => "BGR24",
            Self::Yuyv => "YUYV",
            Self::Uyvy => "UYVY",
            Self::Yuv420p => "YUV420P",
            Self::Nv12mb => "NV12MB",
            Self::Bayer => "BAYER",
            Self::Sgbrg8 => "SGBRG8",
            Self::Sgrbg8 => "SGRBG8",
            Self::Rgb565 => "RGB565",
            Self::Rgb555 => "RGB555",
            Self::Y16 => "Y16",
            Self::Grey => "GREY",
        }
    }

    /// Whether frames of this encoding have a variable, codec-defined length.
    pub const fn is_compressed(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::Mjpeg)
    }

    /// V4L2 pixel format code, if a capture device can deliver this encoding.
    pub const fn fourcc(self) -> Option<FourCC> {
        let code = match self {
            Self::Png => return None,
            Self::Jpeg => b"JPEG",
            Self::Mjpeg => b"MJPG",
            Self::Rgb32 => b"RGB4",
            Self::Bgr32 => b"BGR4",
            Self::Rgb24 => b"RGB3",
            Self::Bgr24 => b"BGR3",
            Self::Yuyv => b"YUYV",
            Self::Uyvy => b"UYVY",
            Self::Yuv420p => b"YU12",
            Self::Nv12mb => b"HM12",
            Self::Bayer => b"BA81",
            Self::Sgbrg8 => b"GBRG",
            Self::Sgrbg8 => b"GRBG",
            Self::Rgb565 => b"RGBP",
            Self::Rgb555 => b"RGBO",
            Self::Y16 => b"Y16 ",
            Self::Grey => b"GREY",
        };
        Some(FourCC::new(code))
    }

    /// Reverse of [`Encoding::fourcc`].
    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.fourcc() == Some(fourcc))
    }

    /// Minimum number of bytes a frame of `width` x `height` must carry.
    ///
    /// Returns `None` for compressed encodings, whose length is not fixed,
    /// and when the size does not fit in `usize`.
    pub fn frame_size(self, width: u32, height: u32) -> Option<usize> {
        let w = usize::try_from(width).ok()?;
        let h = usize::try_from(height).ok()?;
        let pixels = w.checked_mul(h)?;
        match self {
            Self::Png | Self::Jpeg | Self::Mjpeg => None,
            Self::Rgb32 | Self::Bgr32 => pixels.checked_mul(4),
            Self::Rgb24 | Self::Bgr24 => pixels.checked_mul(3),
            // Two pixels per 4-byte macropixel; an odd last pixel still takes one.
            Self::Yuyv | Self::Uyvy => pixels.div_ceil(2).checked_mul(4),
            Self::Rgb565 | Self::Rgb555 | Self::Y16 => pixels.checked_mul(2),
            Self::Yuv420p => {
                let chroma = w.div_ceil(2).checked_mul(h.div_ceil(2))?;
                pixels.checked_add(chroma.checked_mul(2)?)
            }
            Self::Nv12mb => {
                let (luma, chroma) = nv12mb_plane_sizes(w, h)?;
                luma.checked_add(chroma)
            }
            Self::Bayer | Self::Sgbrg8 | Self::Sgrbg8 | Self::Grey => Some(pixels),
        }
    }
}

/// Byte sizes of the tiled luma and chroma planes of an NV12 macroblock frame.
///
/// Both planes are stored as whole 16x16-byte tiles, so partial tiles at the
/// right and bottom edges still occupy a full tile.
pub(crate) fn nv12mb_plane_sizes(width: usize, height: usize) -> Option<(usize, usize)> {
    let tiles_x = width.div_ceil(16);
    let luma = tiles_x.checked_mul(height.div_ceil(16))?.checked_mul(256)?;
    let chroma = tiles_x
        .checked_mul(height.div_ceil(2).div_ceil(16))?
        .checked_mul(256)?;
    Some((luma, chroma))
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CaptureError::UnsupportedEncoding(s.to_owned()))
    }
}
