//! Mock device implementation for testing without hardware.

use std::collections::HashMap;
use std::time::Duration;

use crate::encoding::Encoding;
use crate::traits::{
    CameraDevice, CaptureError, ControlInfo, DeviceCapabilities, Format, FourCC, FrameMetadata,
    InputInfo, Result, TunerInfo,
};

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestPattern {
    /// 100% colour bars in YUYV.
    ColorBars,
    /// Horizontal luma ramp in YUYV.
    Gradient,
    /// Solid colour with the given Y, U, V values in YUYV.
    Solid(u8, u8, u8),
    /// Fixed bytes delivered as every frame, whatever the format.
    Bytes(Vec<u8>),
}

/// Scriptable [`CameraDevice`].
#[derive(Debug)]
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    formats: Vec<FourCC>,
    format: Format,
    max_resolution: (u32, u32),
    inputs: Vec<InputInfo>,
    tuners: Vec<TunerInfo>,
    controls: Vec<ControlInfo>,
    control_values: HashMap<u32, i64>,
    selected_input: Option<u32>,
    selected_tuner: Option<u32>,
    frequency: u32,
    frame_rate: Option<u32>,
    pattern: TestPattern,
    frame: Vec<u8>,
    ring_fails: bool,
    ring_limit: Option<u32>,
    frame_limit: Option<u32>,
    read_stalls: bool,
    streaming: bool,
    buffers_requested: u32,
    stream_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    outstanding: bool,
    requeued: u32,
    frame_count: u32,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a YUYV-only mock device showing colour bars.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
                can_read: true,
            },
            formats: vec![FourCC::new(b"YUYV")],
            format: Format::new(640, 480, FourCC::new(b"YUYV")),
            max_resolution: (1920, 1080),
            inputs: Vec::new(),
            tuners: Vec::new(),
            controls: Vec::new(),
            control_values: HashMap::new(),
            selected_input: None,
            selected_tuner: None,
            frequency: 0,
            frame_rate: None,
            pattern: TestPattern::ColorBars,
            frame: Vec::new(),
            ring_fails: false,
            ring_limit: None,
            frame_limit: None,
            read_stalls: false,
            streaming: false,
            buffers_requested: 0,
            stream_timeout: None,
            read_timeout: None,
            outstanding: false,
            requeued: 0,
            frame_count: 0,
        }
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Advertise these formats. The first one is offered in place of any
    /// unsupported request.
    #[must_use]
    pub fn with_formats(mut self, formats: &[FourCC]) -> Self {
        self.formats = formats.to_vec();
        self
    }

    /// Clamp requested resolutions to this size.
    #[must_use]
    pub const fn with_max_resolution(mut self, width: u32, height: u32) -> Self {
        self.max_resolution = (width, height);
        self
    }

    /// Expose video inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<InputInfo>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Attach tuners to every input that has one.
    #[must_use]
    pub fn with_tuners(mut self, tuners: Vec<TunerInfo>) -> Self {
        self.tuners = tuners;
        self
    }

    /// Expose picture controls, each starting at its default.
    #[must_use]
    pub fn with_controls(mut self, controls: Vec<ControlInfo>) -> Self {
        self.control_values = controls.iter().map(|c| (c.id, c.default)).collect();
        self.controls = controls;
        self
    }

    /// Frame content.
    #[must_use]
    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Refuse to map a buffer ring.
    #[must_use]
    pub const fn with_ring_failure(mut self) -> Self {
        self.ring_fails = true;
        self
    }

    /// Grant at most `buffers` ring buffers.
    #[must_use]
    pub const fn with_ring_limit(mut self, buffers: u32) -> Self {
        self.ring_limit = Some(buffers);
        self
    }

    /// Never have data ready for `read_frame`.
    #[must_use]
    pub const fn with_read_stall(mut self) -> Self {
        self.read_stalls = true;
        self
    }

    /// Time out on every ring dequeue after `frames` frames.
    #[must_use]
    pub const fn with_frame_limit(mut self, frames: u32) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Input selected by the last `select_input`.
    pub const fn selected_input(&self) -> Option<u32> {
        self.selected_input
    }

    /// Tuner selected by the last `select_tuner`.
    pub const fn selected_tuner(&self) -> Option<u32> {
        self.selected_tuner
    }

    /// Frequency set by the last `set_frequency`, in tuner units.
    pub const fn tuned_frequency(&self) -> u32 {
        self.frequency
    }

    /// Frame rate set by the last `set_frame_rate`.
    pub const fn frame_rate(&self) -> Option<u32> {
        self.frame_rate
    }

    /// Whether a ring is currently mapped.
    pub const fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Buffer count passed to the last `start_stream`.
    pub const fn buffers_requested(&self) -> u32 {
        self.buffers_requested
    }

    /// Timeout passed to the last `start_stream`.
    pub const fn stream_timeout(&self) -> Option<Duration> {
        self.stream_timeout
    }

    /// Timeout passed to the last `read_frame`.
    pub const fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Ring buffers handed back to the driver so far.
    pub const fn requeued(&self) -> u32 {
        self.requeued
    }

    fn regenerate(&mut self) {
        self.frame = generate_test_frame(&self.format, &self.pattern);
    }
}

impl CameraDevice for MockDevice {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn inputs(&self) -> Result<Vec<InputInfo>> {
        Ok(self.inputs.clone())
    }

    fn select_input(&mut self, index: u32) -> Result<()> {
        if !self.inputs.iter().any(|input| input.index == index) {
            return Err(CaptureError::InvalidConfig(format!("no input {index}")));
        }
        self.selected_input = Some(index);
        Ok(())
    }

    fn tuners(&self, input: u32) -> Result<Vec<TunerInfo>> {
        let has_tuner = self
            .inputs
            .iter()
            .any(|candidate| candidate.index == input && candidate.has_tuner);
        Ok(if has_tuner {
            self.tuners.clone()
        } else {
            Vec::new()
        })
    }

    fn select_tuner(&mut self, index: u32) -> Result<()> {
        if !self.tuners.iter().any(|tuner| tuner.index == index) {
            return Err(CaptureError::InvalidConfig(format!("no tuner {index}")));
        }
        self.selected_tuner = Some(index);
        Ok(())
    }

    fn frequency(&self, _tuner: u32) -> Result<u32> {
        Ok(self.frequency)
    }

    fn set_frequency(&mut self, _tuner: u32, frequency: u32) -> Result<()> {
        self.frequency = frequency;
        Ok(())
    }

    fn formats(&self) -> Result<Vec<FourCC>> {
        Ok(self.formats.clone())
    }

    fn controls(&self) -> Result<Vec<ControlInfo>> {
        Ok(self.controls.clone())
    }

    fn control(&self, id: u32) -> Result<i64> {
        self.control_values
            .get(&id)
            .copied()
            .ok_or_else(|| CaptureError::InvalidConfig(format!("no control {id}")))
    }

    fn set_control(&mut self, id: u32, value: i64) -> Result<()> {
        let control = self
            .controls
            .iter()
            .find(|control| control.id == id)
            .ok_or_else(|| CaptureError::InvalidConfig(format!("no control {id}")))?;
        self.control_values
            .insert(id, value.clamp(control.minimum, control.maximum));
        Ok(())
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format.clone())
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let fourcc = if self.formats.contains(&format.fourcc) {
            format.fourcc
        } else {
            *self
                .formats
                .first()
                .ok_or_else(|| CaptureError::Stream("no formats".to_owned()))?
        };
        let width = format.width.min(self.max_resolution.0);
        let height = format.height.min(self.max_resolution.1);

        let mut actual = Format::new(width, height, fourcc);
        if let Some(size) = Encoding::from_fourcc(fourcc).and_then(|e| e.frame_size(width, height)) {
            actual.size = u32::try_from(size).unwrap_or(u32::MAX);
        }
        self.format = actual;
        self.regenerate();
        Ok(self.format.clone())
    }

    fn set_frame_rate(&mut self, fps: u32) -> Result<()> {
        self.frame_rate = Some(fps);
        Ok(())
    }

    fn start_stream(&mut self, buffer_count: u32, timeout: Option<Duration>) -> Result<u32> {
        self.buffers_requested = buffer_count;
        if self.ring_fails {
            return Err(CaptureError::Stream("mmap refused".to_owned()));
        }
        self.streaming = true;
        self.stream_timeout = timeout;
        Ok(self
            .ring_limit
            .map_or(buffer_count, |limit| buffer_count.min(limit)))
    }

    fn next_frame(&mut self) -> Result<(&[u8], FrameMetadata)> {
        if !self.streaming {
            return Err(CaptureError::Stream("not streaming".to_owned()));
        }
        if self.outstanding {
            self.requeued += 1;
            self.outstanding = false;
        }
        if self.frame_limit.is_some_and(|limit| self.frame_count >= limit) {
            return Err(CaptureError::Timeout);
        }

        let sequence = self.frame_count;
        self.frame_count += 1;
        self.outstanding = true;
        Ok((
            &self.frame,
            FrameMetadata {
                sequence,
                timestamp: Duration::from_millis(u64::from(sequence) * 33), // ~30fps
                bytes_used: u32::try_from(self.frame.len()).unwrap_or(u32::MAX),
            },
        ))
    }

    fn read_frame(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        self.read_timeout = timeout;
        if self.read_stalls {
            return Err(match timeout {
                Some(_) => CaptureError::Timeout,
                None => CaptureError::Stream("read would block forever".to_owned()),
            });
        }
        let len = self.frame.len().min(buf.len());
        let (dst, src) = (buf.get_mut(..len), self.frame.get(..len));
        if let (Some(dst), Some(src)) = (dst, src) {
            dst.copy_from_slice(src);
        }
        self.frame_count += 1;
        Ok(len)
    }

    fn stop_stream(&mut self) -> Result<()> {
        self.streaming = false;
        self.outstanding = false;
        Ok(())
    }
}

/// Generate test frame data based on pattern.
fn generate_test_frame(format: &Format, pattern: &TestPattern) -> Vec<u8> {
    if let TestPattern::Bytes(bytes) = pattern {
        return bytes.clone();
    }
    let size = Encoding::from_fourcc(format.fourcc)
        .and_then(|e| e.frame_size(format.width, format.height))
        .unwrap_or(0);
    let mut data = vec![0x80u8; size];
    if format.fourcc != FourCC::new(b"YUYV") {
        return data;
    }

    match pattern {
        TestPattern::ColorBars => generate_color_bars(&mut data, format.width),
        TestPattern::Gradient => generate_gradient(&mut data, format.width),
        TestPattern::Solid(y, u, v) => fill_macropixels(&mut data, |_| [*y, *u, *y, *v]),
        TestPattern::Bytes(_) => {}
    }
    data
}

/// Write one YUYV macropixel per call, indexed from the top-left.
fn fill_macropixels<F: FnMut(usize) -> [u8; 4]>(data: &mut [u8], mut macropixel: F) {
    for (i, chunk) in data.chunks_exact_mut(4).enumerate() {
        chunk.copy_from_slice(&macropixel(i));
    }
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32) {
    // 8 color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128), // White
        (210, 16, 146),  // Yellow
        (170, 166, 16),  // Cyan
        (145, 54, 34),   // Green
        (106, 202, 222), // Magenta
        (81, 90, 240),   // Red
        (41, 240, 110),  // Blue
        (16, 128, 128),  // Black
    ];
    let width = width as usize;
    let bar_width = (width / 8).max(1);
    let per_row = width.div_ceil(2);

    fill_macropixels(data, |i| {
        let x = (i % per_row) * 2;
        let (y, u, v) = bars[(x / bar_width).min(7)];
        [y, u, y, v]
    });
}

/// Generate YUYV horizontal gradient pattern.
fn generate_gradient(data: &mut [u8], width: u32) {
    let width = width as usize;
    let per_row = width.div_ceil(2);
    fill_macropixels(data, |i| {
        let x = (i % per_row) * 2;
        #[allow(clippy::cast_possible_truncation)]
        let y = ((x * 255) / width) as u8;
        [y, 128, y, 128]
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
        assert!(device.capabilities().can_read);
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new().with_max_resolution(1280, 720);
        let format = device.format().expect("format should succeed");
        assert_eq!(format.width, 640);
        assert_eq!(format.height, 480);

        let new_format = Format::new(1920, 1080, FourCC::new(b"RGB3"));
        let actual = device.set_format(&new_format).expect("set_format should succeed");
        assert_eq!(actual.width, 1280);
        assert_eq!(actual.height, 720);
        assert_eq!(actual.fourcc, FourCC::new(b"YUYV"));
        assert_eq!(actual.size, 1280 * 720 * 2);
    }

    #[test]
    fn test_mock_ring_requeues_previous_buffer() {
        let mut device = MockDevice::new();
        device
            .set_format(&Format::new(16, 2, FourCC::new(b"YUYV")))
            .expect("set_format should succeed");
        device.start_stream(4, None).expect("start_stream should succeed");

        let (data, meta) = device.next_frame().expect("next_frame should succeed");
        assert_eq!(meta.sequence, 0);
        assert_eq!(data.len(), 64);
        assert_eq!(device.requeued(), 0);

        let (_, meta) = device.next_frame().expect("next_frame should succeed");
        assert_eq!(meta.sequence, 1);
        assert_eq!(device.requeued(), 1);
    }

    #[test]
    fn test_mock_read_stall_honours_timeout() {
        let mut device = MockDevice::new().with_read_stall();
        let mut buf = [0u8; 16];
        assert!(matches!(
            device.read_frame(&mut buf, Some(Duration::from_millis(10))),
            Err(CaptureError::Timeout)
        ));
        assert!(matches!(
            device.read_frame(&mut buf, None),
            Err(CaptureError::Stream(_))
        ));
    }

    #[test]
    fn test_color_bars_pattern() {
        let format = Format::new(640, 480, FourCC::new(b"YUYV"));
        let data = generate_test_frame(&format, &TestPattern::ColorBars);

        assert_eq!(data.len(), 640 * 480 * 2);
        // First bar should be white (Y=235), last black (Y=16)
        assert_eq!(data[0], 235);
        assert_eq!(data[640 * 2 - 4], 16);
    }

    #[test]
    fn test_gradient_pattern() {
        let format = Format::new(640, 480, FourCC::new(b"YUYV"));
        let data = generate_test_frame(&format, &TestPattern::Gradient);

        // Left edge should be dark
        assert!(data[0] < 10);

        // Right edge should be bright (check last row, last pixel)
        let last_row_start = 479 * 640 * 2;
        let last_pixel_y = data[last_row_start + 638 * 2];
        assert!(last_pixel_y > 200);
    }

    #[test]
    fn test_solid_pattern() {
        let format = Format::new(64, 64, FourCC::new(b"YUYV"));
        let data = generate_test_frame(&format, &TestPattern::Solid(128, 64, 192));

        assert_eq!(&data[..4], &[128, 64, 128, 192]);
        assert_eq!(&data[data.len() - 4..], &[128, 64, 128, 192]);
    }

    #[test]
    fn test_set_control_clamps_to_range() {
        let mut device = MockDevice::new().with_controls(vec![ControlInfo {
            id: 7,
            name: "Contrast".to_owned(),
            minimum: 0,
            maximum: 10,
            default: 5,
        }]);
        assert_eq!(device.control(7).expect("default"), 5);
        device.set_control(7, 99).expect("set_control should succeed");
        assert_eq!(device.control(7).expect("clamped"), 10);
        assert!(device.set_control(8, 0).is_err());
    }
}
