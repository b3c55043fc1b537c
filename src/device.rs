//! V4L2 device implementation using the v4l crate.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Device;

use crate::traits::{
    CameraDevice, CaptureError, ControlInfo, DeviceCapabilities, Format, FourCC, FrameMetadata,
    Result,
};

/// V4L2 device implementation wrapping the v4l crate.
///
/// Inputs, tuners and frequency are left at the [`CameraDevice`] defaults.
pub struct V4l2Device {
    device: Device,
    path: PathBuf,
    capabilities: DeviceCapabilities,
    stream: Option<Stream<'static>>,
    reader: Option<File>,
}

fn stream_error(err: &std::io::Error) -> CaptureError {
    if err.kind() == ErrorKind::TimedOut {
        CaptureError::Timeout
    } else {
        CaptureError::Stream(err.to_string())
    }
}

/// Block until `file` has data to read or `timeout` expires.
fn wait_readable(file: &File, timeout: Duration) -> Result<()> {
    let timeout = PollTimeout::try_from(timeout).unwrap_or(PollTimeout::MAX);
    let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
    let ready = poll(&mut fds, timeout)
        .map_err(|errno| CaptureError::Stream(format!("poll failed: {errno}")))?;
    if ready == 0 {
        return Err(CaptureError::Timeout);
    }
    Ok(())
}

impl V4l2Device {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        Self::with_path(format!("/dev/video{index}"))
    }

    /// Open a V4L2 device node.
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Err(CaptureError::SourceUnavailable(
                "no device name specified".to_owned(),
            ));
        }
        let device = Device::with_path(&path).map_err(|err| {
            CaptureError::SourceUnavailable(format!("{}: {err}", path.display()))
        })?;

        let caps = device.query_caps().map_err(|err| {
            CaptureError::UnrecognisedSource(format!("{}: not a V4L2 device? {err}", path.display()))
        })?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
            can_read: caps
                .capabilities
                .contains(v4l::capability::Flags::READ_WRITE),
        };

        Ok(Self {
            device,
            path,
            capabilities,
            stream: None,
            reader: None,
        })
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraDevice for V4l2Device {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn formats(&self) -> Result<Vec<FourCC>> {
        let formats = self
            .device
            .enum_formats()
            .map_err(|err| CaptureError::Stream(err.to_string()))?;
        Ok(formats.into_iter().map(|f| FourCC::from(f.fourcc)).collect())
    }

    fn controls(&self) -> Result<Vec<ControlInfo>> {
        let controls = self
            .device
            .query_controls()
            .map_err(|err| CaptureError::Stream(err.to_string()))?;
        Ok(controls
            .into_iter()
            .filter(|c| matches!(c.typ, v4l::control::Type::Integer))
            .map(|c| ControlInfo {
                id: c.id,
                name: c.name,
                minimum: c.minimum,
                maximum: c.maximum,
                default: c.default,
            })
            .collect())
    }

    fn control(&self, id: u32) -> Result<i64> {
        let control = self
            .device
            .control(id)
            .map_err(|err| CaptureError::Stream(err.to_string()))?;
        match control.value {
            Value::Integer(value) => Ok(value),
            Value::Boolean(value) => Ok(i64::from(value)),
            _ => Err(CaptureError::InvalidConfig(format!(
                "control {id} is not an integer"
            ))),
        }
    }

    fn set_control(&mut self, id: u32, value: i64) -> Result<()> {
        self.device
            .set_control(Control {
                id,
                value: Value::Integer(value),
            })
            .map_err(|err| CaptureError::Stream(err.to_string()))
    }

    fn format(&self) -> Result<Format> {
        let fmt = self
            .device
            .format()
            .map_err(|err| CaptureError::Stream(err.to_string()))?;

        Ok(Format {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.fourcc),
            stride: fmt.stride,
            size: fmt.size,
        })
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CaptureError::Stream(err.to_string()))?;

        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|err| CaptureError::Stream(err.to_string()))?;

        Ok(Format {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.fourcc),
            stride: fmt.stride,
            size: fmt.size,
        })
    }

    fn set_frame_rate(&mut self, fps: u32) -> Result<()> {
        self.device
            .set_params(&Parameters::with_fps(fps))
            .map(|_| ())
            .map_err(|err| CaptureError::Stream(err.to_string()))
    }

    fn start_stream(&mut self, buffer_count: u32, timeout: Option<Duration>) -> Result<u32> {
        let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, buffer_count)
            .map_err(|err| CaptureError::Stream(err.to_string()))?;
        if let Some(timeout) = timeout {
            stream.set_timeout(timeout);
        }
        self.stream = Some(stream);
        // The mmap stream keeps the granted count to itself.
        Ok(buffer_count)
    }

    fn next_frame(&mut self) -> Result<(&[u8], FrameMetadata)> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::Stream("stream not started".to_owned()))?;
        let (buf, meta) = stream.next().map_err(|err| stream_error(&err))?;

        // Safe conversions: V4L2 timestamps are always non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        let used = usize::try_from(meta.bytesused).unwrap_or(usize::MAX);
        let data = if used > 0 { buf.get(..used).unwrap_or(buf) } else { buf };

        Ok((
            data,
            FrameMetadata {
                sequence: meta.sequence,
                timestamp: Duration::new(secs, nanos),
                bytes_used: meta.bytesused,
            },
        ))
    }

    fn read_frame(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        if self.reader.is_none() {
            self.reader = Some(File::open(&self.path)?);
        }
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| CaptureError::Stream("device not readable".to_owned()))?;
        if let Some(timeout) = timeout {
            wait_readable(reader, timeout)?;
        }
        reader.read(buf).map_err(|err| stream_error(&err))
    }

    fn stop_stream(&mut self) -> Result<()> {
        // Dropping the stream stops capture and unmaps the buffers.
        self.stream = None;
        self.reader = None;
        Ok(())
    }
}
