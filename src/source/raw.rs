//! Headerless frames read back to back from a file, pipe or device node.

use std::fs::File;
use std::io::{ErrorKind, Read};

use crate::encoding::Encoding;
use crate::frame::RawFrame;
use crate::source::SourceRequest;
use crate::traits::{CaptureError, CaptureSource, Negotiated, Result};

/// Reads exactly one frame's worth of bytes per grab.
///
/// There is no header to negotiate from, so the request must name an
/// uncompressed encoding and the resolution is taken as given.
#[derive(Debug)]
pub struct RawSource {
    reader: Option<Box<dyn ReadDebug>>,
    buffer: Vec<u8>,
    negotiated: Negotiated,
    sequence: u32,
}

trait ReadDebug: Read + std::fmt::Debug {}
impl<T: Read + std::fmt::Debug> ReadDebug for T {}

impl RawSource {
    /// Open `path` for reading frames of the requested encoding.
    pub fn open(path: &str, request: &SourceRequest) -> Result<Self> {
        if path.is_empty() {
            return Err(CaptureError::SourceUnavailable(
                "no device or file name specified".to_owned(),
            ));
        }
        let file = File::open(path)
            .map_err(|err| CaptureError::SourceUnavailable(format!("{path}: {err}")))?;
        let source = Self::from_reader(file, request)?;
        log::info!("{path} opened.");
        Ok(source)
    }

    /// Read frames from an already-open stream.
    pub fn from_reader<R>(reader: R, request: &SourceRequest) -> Result<Self>
    where
        R: Read + std::fmt::Debug + 'static,
    {
        let encoding = request.encoding.ok_or_else(|| {
            CaptureError::UnsupportedEncoding("no palette format specified".to_owned())
        })?;
        let size = encoding
            .frame_size(request.width, request.height)
            .ok_or_else(|| {
                CaptureError::UnsupportedEncoding(format!(
                    "palette {encoding} is not supported by the raw source"
                ))
            })?;
        if size == 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "unusable raw resolution {}x{}",
                request.width, request.height
            )));
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| CaptureError::OutOfMemory(size))?;
        buffer.resize(size, 0);

        Ok(Self {
            reader: Some(Box::new(reader)),
            buffer,
            negotiated: Negotiated {
                width: request.width,
                height: request.height,
                encoding,
            },
            sequence: 0,
        })
    }
}

impl CaptureSource for RawSource {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    fn grab(&mut self) -> Result<RawFrame<'_>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| CaptureError::Stream("raw source is closed".to_owned()))?;

        match reader.read_exact(&mut self.buffer) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                log::info!("End of file reached.");
                return Err(CaptureError::EndOfStream);
            }
            Err(err) => return Err(err.into()),
        }

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        let Negotiated {
            width,
            height,
            encoding,
        } = self.negotiated;
        Ok(RawFrame::new(&self.buffer, width, height, encoding).with_sequence(sequence))
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}
