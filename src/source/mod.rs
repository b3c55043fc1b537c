//! Capture sources and backend selection.
//!
//! A source descriptor is either `"<backend>:<target>"`, naming the backend
//! explicitly, or a bare path. Bare paths are offered to every backend whose
//! capability matches the path's file type (character device or regular
//! file), in preference order, and the first one that opens wins.

mod device;
mod file;
mod raw;
mod test_pattern;

use std::os::unix::fs::FileTypeExt;
use std::time::Duration;

use bitflags::bitflags;

use crate::device::V4l2Device;
use crate::encoding::Encoding;
use crate::traits::{CaptureError, CaptureSource, Result};

pub use device::DeviceSource;
pub use file::{read_dimensions, FileSource};
pub use raw::RawSource;
pub use test_pattern::{TestPatternSource, TEST_PATTERN_BARS};

/// Default capture width.
pub const DEFAULT_WIDTH: u32 = 384;
/// Default capture height.
pub const DEFAULT_HEIGHT: u32 = 288;
/// Default number of shared buffers requested from a device.
pub const DEFAULT_BUFFERS: u32 = 4;

bitflags! {
    /// What a source should enumerate while opening.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ListFlags: u8 {
        /// Video inputs.
        const INPUTS = 1 << 1;
        /// Tuners.
        const TUNERS = 1 << 2;
        /// Pixel formats.
        const FORMATS = 1 << 3;
        /// Picture controls.
        const CONTROLS = 1 << 4;
    }
}

/// Caller's wishes for a capture run. Backends treat them as hints and
/// report what they actually settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    /// Requested width in pixels.
    pub width: u32,
    /// Requested height in pixels.
    pub height: u32,
    /// Requested encoding; `None` lets the backend choose.
    pub encoding: Option<Encoding>,
    /// Requested frame rate.
    pub fps: Option<u32>,
    /// Input to select, by index or name.
    pub input: Option<String>,
    /// Tuner index on the selected input.
    pub tuner: u32,
    /// Tuner frequency in Hz; zero leaves it unchanged.
    pub frequency: u32,
    /// Settle time after the device is configured.
    pub delay: Duration,
    /// Longest wait for a single frame.
    pub timeout: Option<Duration>,
    /// Use synchronous reads instead of a shared buffer ring.
    pub use_read: bool,
    /// Number of ring buffers to request.
    pub buffers: u32,
    /// What to enumerate while opening.
    pub list: ListFlags,
    /// Backend options as ordered `name=value` pairs.
    pub options: Vec<(String, String)>,
}

impl Default for SourceRequest {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            encoding: None,
            fps: None,
            input: None,
            tuner: 0,
            frequency: 0,
            delay: Duration::ZERO,
            timeout: None,
            use_read: false,
            buffers: DEFAULT_BUFFERS,
            list: ListFlags::empty(),
            options: Vec::new(),
        }
    }
}

impl SourceRequest {
    /// Look up an option by case-insensitive name.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set an option, replacing an existing value of the same name.
    pub fn set_option(&mut self, name: &str, value: &str) {
        match self
            .options
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => value.clone_into(existing),
            None => self.options.push((name.to_owned(), value.to_owned())),
        }
    }
}

/// What kind of target a backend can open when probing a bare path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Character devices.
    Device,
    /// Regular files.
    File,
    /// Only when named explicitly.
    Explicit,
}

/// Available capture backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Video4Linux2 capture device.
    V4l2,
    /// JPEG or PNG image file.
    File,
    /// Headerless frames read from a file or pipe.
    Raw,
    /// Built-in colour bars.
    Test,
}

impl Backend {
    /// Backends in order of preference.
    pub const PREFERENCE: [Self; 4] = [Self::V4l2, Self::File, Self::Raw, Self::Test];

    /// Name used in descriptors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::V4l2 => "v4l2",
            Self::File => "file",
            Self::Raw => "raw",
            Self::Test => "test",
        }
    }

    /// Targets this backend accepts when probing.
    pub const fn kind(self) -> BackendKind {
        match self {
            Self::V4l2 => BackendKind::Device,
            Self::File => BackendKind::File,
            Self::Raw | Self::Test => BackendKind::Explicit,
        }
    }

    /// Find a backend by case-insensitive name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::PREFERENCE
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(name))
    }

    /// Open `target` with this backend.
    pub fn open(self, target: &str, request: &SourceRequest) -> Result<Box<dyn CaptureSource>> {
        Ok(match self {
            Self::V4l2 => Box::new(DeviceSource::open(V4l2Device::with_path(target)?, request)?),
            Self::File => Box::new(FileSource::open(target, request)?),
            Self::Raw => Box::new(RawSource::open(target, request)?),
            Self::Test => Box::new(TestPatternSource::open(request)?),
        })
    }
}

/// Open the source named by `descriptor`.
pub fn open_source(descriptor: &str, request: &SourceRequest) -> Result<Box<dyn CaptureSource>> {
    let (head, target) = descriptor
        .split_once(':')
        .unwrap_or((descriptor, ""));
    if head.is_empty() {
        return Err(CaptureError::SourceUnavailable(
            "no source was specified".to_owned(),
        ));
    }

    if let Some(backend) = Backend::from_name(head) {
        log::info!(">>> Using '{}' source module.", backend.name());
        return backend.open(target, request);
    }

    let metadata = std::fs::metadata(descriptor).map_err(|err| {
        CaptureError::SourceUnavailable(format!("{descriptor}: {err}"))
    })?;
    let wanted = if metadata.file_type().is_char_device() {
        BackendKind::Device
    } else {
        BackendKind::File
    };

    let candidates: Vec<Backend> = Backend::PREFERENCE
        .into_iter()
        .filter(|backend| backend.kind() == wanted)
        .collect();
    try_backends(descriptor, &candidates, |backend| backend.open(descriptor, request))
}

/// Try `candidates` in order until one opens `descriptor`. Only an
/// unrecognised target moves on to the next backend; any other failure is
/// returned as is.
fn try_backends<T, F>(descriptor: &str, candidates: &[Backend], mut open: F) -> Result<T>
where
    F: FnMut(Backend) -> Result<T>,
{
    let mut last_reason = None;
    for &backend in candidates {
        log::info!("Trying source module {}...", backend.name());
        match open(backend) {
            Ok(source) => return Ok(source),
            Err(CaptureError::UnrecognisedSource(reason)) => {
                log::debug!("{}: {reason}", backend.name());
                last_reason = Some(reason);
            }
            Err(err) => return Err(err),
        }
    }

    Err(CaptureError::SourceUnavailable(match last_reason {
        Some(reason) => format!("unable to find a source module that can read {descriptor}: {reason}"),
        None => format!("unable to find a source module that can read {descriptor}"),
    }))
}
