//! TOML configuration file.
//!
//! Every key is optional; anything left out takes the same default the
//! command line would use.
//!
//! ```toml
//! device = "/dev/video1"
//! resolution = "640x480"
//! palette = "YUYV"
//! frames = 10
//! skip = 5
//!
//! [options]
//! brightness = 20
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::accumulator::MAX_FRAMES;
use crate::capture::CaptureSettings;
use crate::encoding::Encoding;
use crate::source::SourceRequest;
use crate::traits::{CaptureError, Result};

/// Device opened when nothing else is configured.
pub const DEFAULT_DEVICE: &str = "/dev/video0";

/// The configuration file as written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Source descriptor.
    pub device: Option<String>,
    /// Input index or name.
    pub input: Option<String>,
    /// Tuner index.
    pub tuner: Option<u32>,
    /// Tuner frequency in Hz.
    pub frequency: Option<u32>,
    /// Settle delay in seconds.
    pub delay: Option<u64>,
    /// Per-frame timeout in seconds.
    pub timeout: Option<u64>,
    /// Use synchronous reads.
    pub use_read: Option<bool>,
    /// Encoding name.
    pub palette: Option<String>,
    /// `"WIDTHxHEIGHT"`.
    pub resolution: Option<String>,
    /// Frame rate hint.
    pub fps: Option<u32>,
    /// Frames to average.
    pub frames: Option<u32>,
    /// Frames to discard first.
    pub skip: Option<u32>,
    /// Ring buffers to request.
    pub buffers: Option<u32>,
    /// Where to write the first raw frame.
    pub dump_frame: Option<PathBuf>,
    /// Output image path.
    pub output: Option<PathBuf>,
    /// Source options.
    #[serde(default)]
    pub options: toml::Table,
}

/// Everything needed for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Source descriptor.
    pub device: String,
    /// What to ask of the source.
    pub request: SourceRequest,
    /// How to capture.
    pub capture: CaptureSettings,
    /// Output image path.
    pub output: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_owned(),
            request: SourceRequest::default(),
            capture: CaptureSettings::default(),
            output: None,
        }
    }
}

impl Settings {
    /// Read and apply a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = read_config_file(path)?;
        let settings = Self::from_file(file)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(settings)
    }

    /// Fill defaults in around whatever the file sets.
    pub fn from_file(file: FileConfig) -> Result<Self> {
        let mut settings = Self::default();
        let request = &mut settings.request;

        if let Some(device) = file.device {
            settings.device = device;
        }
        request.input = file.input;
        if let Some(tuner) = file.tuner {
            request.tuner = tuner;
        }
        if let Some(frequency) = file.frequency {
            request.frequency = frequency;
        }
        if let Some(delay) = file.delay {
            request.delay = Duration::from_secs(delay);
        }
        request.timeout = file.timeout.map(Duration::from_secs);
        if let Some(use_read) = file.use_read {
            request.use_read = use_read;
        }
        if let Some(palette) = file.palette {
            request.encoding = Some(palette.parse::<Encoding>()?);
        }
        if let Some(resolution) = file.resolution {
            (request.width, request.height) = parse_resolution(&resolution)?;
        }
        request.fps = file.fps;
        if let Some(buffers) = file.buffers {
            request.buffers = buffers;
        }
        for (name, value) in &file.options {
            let value = match value {
                toml::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            request.set_option(name, &value);
        }

        if let Some(frames) = file.frames {
            settings.capture.frames = frames;
        }
        if let Some(skip) = file.skip {
            settings.capture.skip = skip;
        }
        settings.capture.dump_frame = file.dump_frame;
        settings.output = file.output;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no source could honour.
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "device must not be empty".to_owned(),
            ));
        }
        if self.request.width == 0 || self.request.height == 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "invalid resolution {}x{}",
                self.request.width, self.request.height
            )));
        }
        if self.request.buffers == 0 {
            return Err(CaptureError::InvalidConfig(
                "buffers must be at least 1".to_owned(),
            ));
        }
        if self.capture.frames == 0 || self.capture.frames > MAX_FRAMES {
            return Err(CaptureError::InvalidConfig(format!(
                "frames must be between 1 and {MAX_FRAMES}, got {}",
                self.capture.frames
            )));
        }
        Ok(())
    }
}

/// Parse the file at `path`.
pub fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        CaptureError::InvalidConfig(format!("failed to read {}: {err}", path.display()))
    })?;
    toml::from_str(&raw).map_err(|err| {
        CaptureError::InvalidConfig(format!("failed to parse {}: {err}", path.display()))
    })
}

/// Parse `"WIDTHxHEIGHT"`.
pub fn parse_resolution(text: &str) -> Result<(u32, u32)> {
    let invalid = || CaptureError::InvalidConfig(format!("invalid resolution '{text}'"));
    let (width, height) = text
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(invalid)?;
    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}
