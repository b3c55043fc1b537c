//! Still-image source: one JPEG or PNG file delivered as every frame.

use crate::encoding::Encoding;
use crate::frame::RawFrame;
use crate::source::SourceRequest;
use crate::traits::{CaptureError, CaptureSource, Negotiated, Result};

const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];
const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

/// Identify a JPEG or PNG image and read its resolution from the header.
///
/// JPEG segments are walked from the start-of-image marker to the first
/// start-of-frame; hitting a scan or end-of-image first is an error. PNG
/// requires `IHDR` to be the first chunk.
pub fn read_dimensions(bytes: &[u8]) -> Result<(Encoding, u32, u32)> {
    if bytes.starts_with(&JPEG_MAGIC) {
        let (width, height) = jpeg_dimensions(bytes)?;
        Ok((Encoding::Jpeg, width, height))
    } else if bytes.starts_with(&PNG_MAGIC) {
        let (width, height) = png_dimensions(bytes)?;
        Ok((Encoding::Png, width, height))
    } else {
        Err(CaptureError::UnrecognisedSource(
            "unknown file format".to_owned(),
        ))
    }
}

fn jpeg_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let malformed = |reason: &str| CaptureError::CodecError {
        encoding: Encoding::Jpeg,
        reason: reason.to_owned(),
    };

    let mut at = 2;
    loop {
        let Some(&[mark, marker, hi, lo]) = bytes.get(at..at + 4) else {
            return Err(malformed("unable to read resolution"));
        };
        if mark != 0xFF {
            return Err(malformed("segment marker not found"));
        }
        let length = usize::from(u16::from_be_bytes([hi, lo]));
        let body = bytes
            .get(at + 2..at + 2 + length)
            .ok_or_else(|| malformed("incomplete segment"))?;

        match marker {
            // Baseline, extended and progressive frames.
            0xC0..=0xC2 => {
                let Some(&[_, _, _, h_hi, h_lo, w_hi, w_lo]) = body.get(..7) else {
                    return Err(malformed("truncated frame header"));
                };
                return Ok((
                    u32::from(u16::from_be_bytes([w_hi, w_lo])),
                    u32::from(u16::from_be_bytes([h_hi, h_lo])),
                ));
            }
            0xD9 | 0xDA => return Err(malformed("unable to read resolution")),
            _ => at += 2 + length,
        }
    }
}

fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let malformed = |reason: &str| CaptureError::CodecError {
        encoding: Encoding::Png,
        reason: reason.to_owned(),
    };

    let header = bytes
        .get(12..24)
        .ok_or_else(|| malformed("unexpected end of file"))?;
    let (chunk, size) = header.split_at(4);
    if chunk != b"IHDR" {
        return Err(malformed("IHDR chunk must be first"));
    }
    let Some(&[w0, w1, w2, w3, h0, h1, h2, h3]) = size.get(..8) else {
        return Err(malformed("unexpected end of file"));
    };
    Ok((
        u32::from_be_bytes([w0, w1, w2, w3]),
        u32::from_be_bytes([h0, h1, h2, h3]),
    ))
}

/// Serves the whole file as the frame on every grab, at the resolution
/// recorded in the image header.
#[derive(Debug)]
pub struct FileSource {
    image: Vec<u8>,
    negotiated: Negotiated,
    sequence: u32,
    closed: bool,
}

impl FileSource {
    /// Load `path` into memory and parse its header.
    pub fn open(path: &str, request: &SourceRequest) -> Result<Self> {
        let image = std::fs::read(path)
            .map_err(|err| CaptureError::SourceUnavailable(format!("{path}: {err}")))?;
        let source = Self::from_bytes(image, request).map_err(|err| match err {
            CaptureError::UnrecognisedSource(reason) => {
                CaptureError::UnrecognisedSource(format!("{path}: {reason}"))
            }
            other => CaptureError::SourceUnavailable(format!("{path}: {other}")),
        })?;
        log::info!(
            "{path}: Loading {} file.",
            source.negotiated.encoding
        );
        Ok(source)
    }

    /// Serve an in-memory image.
    pub fn from_bytes(image: Vec<u8>, request: &SourceRequest) -> Result<Self> {
        let (encoding, width, height) = read_dimensions(&image)?;
        if (width, height) != (request.width, request.height) {
            log::info!("Adjusting resolution to {width}x{height}.");
        }
        Ok(Self {
            image,
            negotiated: Negotiated {
                width,
                height,
                encoding,
            },
            sequence: 0,
            closed: false,
        })
    }
}

impl CaptureSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    fn grab(&mut self) -> Result<RawFrame<'_>> {
        if self.closed {
            return Err(CaptureError::Stream("file source is closed".to_owned()));
        }
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        let Negotiated {
            width,
            height,
            encoding,
        } = self.negotiated;
        Ok(RawFrame::new(&self.image, width, height, encoding).with_sequence(sequence))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.image = Vec::new();
        Ok(())
    }
}
