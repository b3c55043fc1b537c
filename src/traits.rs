//! Core traits and types shared by every capture backend.

use std::time::Duration;

use crate::encoding::Encoding;
use crate::frame::RawFrame;

/// Pixel format code (e.g., YUYV, MJPG, RGB3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format as seen by a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride), zero when not applicable.
    pub stride: u32,
    /// Size in bytes of one frame buffer.
    pub size: u32,
}

impl Format {
    /// Create a format request. Stride and size are filled in by the driver.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Self {
            width,
            height,
            fourcc,
            stride: 0,
            size: 0,
        }
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming (buffer ring) I/O.
    pub can_stream: bool,
    /// Whether the device supports the synchronous `read` interface.
    pub can_read: bool,
}

/// A video input on a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputInfo {
    /// Input index.
    pub index: u32,
    /// Human-readable name.
    pub name: String,
    /// Whether the input is fed by a tuner.
    pub has_tuner: bool,
}

/// A tuner attached to an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunerInfo {
    /// Tuner index.
    pub index: u32,
    /// Human-readable name.
    pub name: String,
    /// Lowest tunable frequency in 1/16 units.
    pub range_low: u32,
    /// Highest tunable frequency in 1/16 units.
    pub range_high: u32,
    /// Whether units are 1/16 kHz (otherwise 1/16 MHz).
    pub low: bool,
}

/// An integer picture control exposed by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInfo {
    /// Driver control id.
    pub id: u32,
    /// Human-readable name.
    pub name: String,
    /// Minimum native value.
    pub minimum: i64,
    /// Maximum native value.
    pub maximum: i64,
    /// Default native value.
    pub default: i64,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone, Default)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// Resolution and encoding a source settled on during `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel encoding of delivered frames.
    pub encoding: Encoding,
}

/// Error type for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The source could not be opened.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    /// The target exists but is not something this backend can read.
    #[error("unrecognised source: {0}")]
    UnrecognisedSource(String),
    /// No frame arrived before the deadline.
    #[error("timed out waiting for frame")]
    Timeout,
    /// A frame carried fewer bytes than its encoding requires.
    #[error("short {encoding} frame: need {required} bytes, got {actual}")]
    ShortFrame {
        /// Encoding of the rejected frame.
        encoding: Encoding,
        /// Bytes required for the negotiated resolution.
        required: usize,
        /// Bytes actually delivered.
        actual: usize,
    },
    /// The encoding is unknown or cannot be handled by this source.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    /// An allocation failed.
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),
    /// The external codec rejected a compressed frame.
    #[error("codec rejected {encoding} frame: {reason}")]
    CodecError {
        /// Encoding of the rejected frame.
        encoding: Encoding,
        /// Codec message.
        reason: String,
    },
    /// Capture finished without a single decodable frame.
    #[error("no frames captured")]
    NoFramesCaptured,
    /// The source ran out of data.
    #[error("end of stream")]
    EndOfStream,
    /// Error during a streaming operation.
    #[error("stream error: {0}")]
    Stream(String),
    /// The requested settings are not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether the error only spoils the current frame and capture may go on.
    pub const fn is_frame_local(&self) -> bool {
        matches!(self, Self::ShortFrame { .. } | Self::CodecError { .. })
    }
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Control surface of a character-device style capture device.
///
/// Optional surfaces (inputs, tuners, frequency) default to "not present" so
/// that bindings without them only implement the core.
pub trait CameraDevice {
    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Enumerate video inputs.
    fn inputs(&self) -> Result<Vec<InputInfo>> {
        Ok(Vec::new())
    }

    /// Switch to the input with the given index.
    fn select_input(&mut self, index: u32) -> Result<()> {
        Err(CaptureError::InvalidConfig(format!(
            "device has no selectable input {index}"
        )))
    }

    /// Enumerate the tuners attached to an input.
    fn tuners(&self, _input: u32) -> Result<Vec<TunerInfo>> {
        Ok(Vec::new())
    }

    /// Select a tuner.
    fn select_tuner(&mut self, index: u32) -> Result<()> {
        Err(CaptureError::InvalidConfig(format!(
            "device has no tuner {index}"
        )))
    }

    /// Current tuner frequency in the tuner's 1/16 units.
    fn frequency(&self, _tuner: u32) -> Result<u32> {
        Ok(0)
    }

    /// Set the tuner frequency in the tuner's 1/16 units.
    fn set_frequency(&mut self, tuner: u32, _frequency: u32) -> Result<()> {
        Err(CaptureError::InvalidConfig(format!(
            "device has no tuner {tuner}"
        )))
    }

    /// Pixel formats the device advertises.
    fn formats(&self) -> Result<Vec<FourCC>>;

    /// Integer picture controls the device exposes.
    fn controls(&self) -> Result<Vec<ControlInfo>>;

    /// Current native value of a control.
    fn control(&self, id: u32) -> Result<i64>;

    /// Set a control to a native value.
    fn set_control(&mut self, id: u32, value: i64) -> Result<()>;

    /// Get current format.
    fn format(&self) -> Result<Format>;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// Request a capture frame rate.
    fn set_frame_rate(&mut self, fps: u32) -> Result<()>;

    /// Map a ring of `buffer_count` shared buffers and start streaming.
    ///
    /// Returns the ring size in use. Bindings whose driver layer does not
    /// report how many buffers were granted return `buffer_count`.
    fn start_stream(&mut self, buffer_count: u32, timeout: Option<Duration>) -> Result<u32>;

    /// Dequeue the next filled ring buffer.
    ///
    /// The buffer handed out by the previous call goes back to the driver
    /// first, so the returned slice stays valid until the next call.
    fn next_frame(&mut self) -> Result<(&[u8], FrameMetadata)>;

    /// Read one frame with the synchronous interface. Returns bytes read.
    ///
    /// With a `timeout`, fails with [`CaptureError::Timeout`] when no data
    /// becomes readable in time.
    fn read_frame(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize>;

    /// Stop streaming and release the ring.
    fn stop_stream(&mut self) -> Result<()>;
}

/// A backend yielding successive raw frames.
pub trait CaptureSource {
    /// Backend name, as used in source descriptors.
    fn name(&self) -> &'static str;

    /// The resolution and encoding settled on at open time.
    fn negotiated(&self) -> Negotiated;

    /// Block until the next frame is available.
    ///
    /// The frame borrows the source and is invalidated by the next call.
    fn grab(&mut self) -> Result<RawFrame<'_>>;

    /// Release backend resources. Further grabs fail.
    fn close(&mut self) -> Result<()>;
}
