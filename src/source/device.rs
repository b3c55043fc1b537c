//! Capture from a character-device style camera.
//!
//! Opening walks the device through the usual setup sequence: capability
//! check, optional enumeration, input and tuner selection, picture controls,
//! encoding negotiation, frame rate, settle delay and finally I/O mode.
//! Frames come from a shared buffer ring when the device can stream, and
//! from synchronous reads otherwise.

use std::time::Duration;

use crate::encoding::Encoding;
use crate::frame::RawFrame;
use crate::source::{ListFlags, SourceRequest};
use crate::traits::{
    CameraDevice, CaptureError, CaptureSource, Format, InputInfo, Negotiated, Result,
};

/// Ring size used for compressed encodings, whose frames vary in size and
/// tend to arrive in bursts.
pub const COMPRESSED_BUFFERS: u32 = 32;

/// Picture options on a -100..100 scale and the device control names each
/// one maps to.
const PICTURE_OPTIONS: [(&str, &[&str]); 5] = [
    ("brightness", &["brightness"]),
    ("hue", &["hue"]),
    ("colour", &["saturation", "colour", "color"]),
    ("contrast", &["contrast"]),
    ("whiteness", &["whiteness", "white balance temperature"]),
];

/// Linearly map `value` from `src_lo..=src_hi` onto `dst_lo..=dst_hi`.
pub(crate) fn scale(dst_lo: i64, dst_hi: i64, src_lo: i64, src_hi: i64, value: i64) -> i64 {
    if src_hi == src_lo {
        return dst_lo;
    }
    (value - src_lo) * (dst_hi - dst_lo) / (src_hi - src_lo) + dst_lo
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoMode {
    Ring,
    Read,
}

/// A [`CaptureSource`] driving any [`CameraDevice`].
#[derive(Debug)]
pub struct DeviceSource<D: CameraDevice> {
    device: D,
    negotiated: Negotiated,
    io: IoMode,
    ring_buffers: u32,
    timeout: Option<Duration>,
    read_buffer: Vec<u8>,
    sequence: u32,
    closed: bool,
}

impl<D: CameraDevice> DeviceSource<D> {
    /// Configure `device` according to `request` and start capturing.
    pub fn open(mut device: D, request: &SourceRequest) -> Result<Self> {
        let caps = device.capabilities().clone();
        log::debug!("driver: {}", caps.driver);
        log::debug!("card: {}", caps.card);
        log::debug!("bus: {}", caps.bus_info);
        if !caps.can_capture {
            return Err(CaptureError::SourceUnavailable(format!(
                "{}: device does not support capturing",
                caps.card
            )));
        }

        if request.list.contains(ListFlags::FORMATS) {
            list_formats(&device)?;
        }
        if let Some(input) = select_input(&mut device, request)? {
            if input.has_tuner || request.list.contains(ListFlags::TUNERS) {
                select_tuner(&mut device, &input, request)?;
            }
        }
        apply_controls(&mut device, request)?;

        let (negotiated, format) = negotiate(&mut device, request)?;

        if let Some(fps) = request.fps {
            log::info!("Setting frame rate to {fps} fps.");
            if let Err(err) = device.set_frame_rate(fps) {
                log::warn!("Unable to set frame rate: {err}");
            }
        }

        if !request.delay.is_zero() {
            log::info!("Delaying {:.1} seconds.", request.delay.as_secs_f32());
            std::thread::sleep(request.delay);
        }

        let (io, ring_buffers) =
            start_io(&mut device, request, negotiated.encoding, caps.can_stream);
        let read_buffer = if io == IoMode::Read {
            if !caps.can_read {
                return Err(CaptureError::SourceUnavailable(format!(
                    "{}: device supports neither streaming nor read",
                    caps.card
                )));
            }
            read_buffer(&format, negotiated)?
        } else {
            Vec::new()
        };

        log::info!("{} opened.", caps.card);
        Ok(Self {
            device,
            negotiated,
            io,
            ring_buffers,
            timeout: request.timeout,
            read_buffer,
            sequence: 0,
            closed: false,
        })
    }

    /// The underlying device.
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Whether frames come from the shared buffer ring.
    pub fn is_streaming(&self) -> bool {
        self.io == IoMode::Ring
    }

    /// Size of the shared buffer ring as reported by the device, zero when
    /// frames are read.
    pub const fn ring_buffers(&self) -> u32 {
        self.ring_buffers
    }
}

fn list_formats<D: CameraDevice>(device: &D) -> Result<()> {
    log::info!("--- Available formats:");
    for fourcc in device.formats()? {
        match Encoding::from_fourcc(fourcc) {
            Some(encoding) => log::info!("{fourcc}: {encoding}"),
            None => log::info!("{fourcc}: (not supported)"),
        }
    }
    Ok(())
}

/// Select the requested input by index or case-insensitive name, or the
/// first one when none was requested.
fn select_input<D: CameraDevice>(device: &mut D, request: &SourceRequest) -> Result<Option<InputInfo>> {
    let inputs = device.inputs()?;
    if inputs.is_empty() {
        if request.input.is_some() || request.list.contains(ListFlags::INPUTS) {
            log::info!("No inputs available.");
        }
        return Ok(None);
    }

    if request.list.contains(ListFlags::INPUTS) {
        log::info!("--- Available inputs:");
        for input in &inputs {
            log::info!("{}: {}", input.index, input.name);
        }
    }

    let chosen = match request.input.as_deref() {
        None => {
            log::info!("No input was specified, using the first.");
            inputs.first()
        }
        Some(wanted) => match wanted.trim().parse::<u32>() {
            Ok(index) => inputs.iter().find(|input| input.index == index),
            Err(_) => inputs
                .iter()
                .find(|input| input.name.eq_ignore_ascii_case(wanted.trim())),
        },
    };
    let input = chosen.cloned().ok_or_else(|| {
        CaptureError::InvalidConfig(format!(
            "unrecognised input \"{}\"",
            request.input.as_deref().unwrap_or_default()
        ))
    })?;

    log::info!("Setting input to {}.", input.index);
    device.select_input(input.index)?;
    Ok(Some(input))
}

fn select_tuner<D: CameraDevice>(
    device: &mut D,
    input: &InputInfo,
    request: &SourceRequest,
) -> Result<()> {
    let tuners = device.tuners(input.index)?;
    if tuners.is_empty() {
        log::info!("No tuners available.");
        return Ok(());
    }
    if request.list.contains(ListFlags::TUNERS) {
        log::info!("--- Available tuners:");
        for tuner in &tuners {
            log::info!("{}: {}", tuner.index, tuner.name);
        }
    }

    let tuner = tuners
        .iter()
        .find(|tuner| tuner.index == request.tuner)
        .ok_or_else(|| {
            CaptureError::InvalidConfig(format!(
                "requested tuner {} and only {} tuner(s) found",
                request.tuner,
                tuners.len()
            ))
        })?;

    log::info!("Setting tuner to {}.", tuner.index);
    device.select_tuner(tuner.index)?;

    let unit = if tuner.low { "kHz" } else { "MHz" };
    let current = device.frequency(tuner.index)?;
    log::debug!("Current frequency is {:.3}{unit}", f64::from(current) / 16.0);
    if request.frequency == 0 {
        return Ok(());
    }

    // Tuner units are 1/16 kHz on low-band tuners and 1/16 MHz otherwise.
    let divisor = if tuner.low { 1_000 } else { 1_000_000 };
    let mut frequency = (request.frequency / divisor).saturating_mul(16);
    if frequency < tuner.range_low {
        frequency = tuner.range_low;
        log::warn!(
            "Frequency is below tuners minimum. Using {:.3}{unit}.",
            f64::from(frequency) / 16.0
        );
    }
    if frequency > tuner.range_high {
        frequency = tuner.range_high;
        log::warn!(
            "Frequency is above tuners maximum. Using {:.3}{unit}.",
            f64::from(frequency) / 16.0
        );
    }

    log::info!("Setting frequency to {:.3}{unit}.", f64::from(frequency) / 16.0);
    device.set_frequency(tuner.index, frequency)
}

/// List controls and apply picture options. Named picture options map onto
/// the matching device control; any other option naming a control directly
/// is applied on the same -100..100 scale.
fn apply_controls<D: CameraDevice>(device: &mut D, request: &SourceRequest) -> Result<()> {
    let controls = device.controls()?;

    if request.list.contains(ListFlags::CONTROLS) {
        log::info!("--- Available controls:");
        for control in &controls {
            let Ok(value) = device.control(control.id) else {
                continue;
            };
            log::info!(
                "{:<25} {:<15} -100 - 100",
                control.name,
                format!(
                    "{} ({}%)",
                    scale(-100, 100, control.minimum, control.maximum, value),
                    scale(0, 100, control.minimum, control.maximum, value)
                )
            );
        }
    }

    for (name, value) in &request.options {
        let aliases = PICTURE_OPTIONS
            .iter()
            .find(|(option, _)| option.eq_ignore_ascii_case(name))
            .map(|(_, aliases)| *aliases);
        let control = controls.iter().find(|control| match aliases {
            Some(aliases) => aliases
                .iter()
                .any(|alias| control.name.eq_ignore_ascii_case(alias)),
            None => control.name.eq_ignore_ascii_case(name),
        });

        let Some(control) = control else {
            if aliases.is_some() {
                log::warn!("Device has no {name} control.");
            } else {
                log::warn!("Unknown option {name}.");
            }
            continue;
        };
        let Ok(value) = value.trim().parse::<i64>() else {
            log::warn!("Invalid value for {name}: {value}");
            continue;
        };

        let native = scale(
            control.minimum,
            control.maximum,
            -100,
            100,
            value.clamp(-100, 100),
        );
        log::debug!("Setting {} to {native}.", control.name);
        if let Err(err) = device.set_control(control.id, native) {
            log::warn!("Unable to set {}: {err}", control.name);
        }
    }
    Ok(())
}

/// Settle on an encoding and resolution with the device.
///
/// A requested encoding is the only candidate. Otherwise every encoding with
/// a device code is tried in declaration order and the first one the device
/// accepts unchanged wins.
fn negotiate<D: CameraDevice>(
    device: &mut D,
    request: &SourceRequest,
) -> Result<(Negotiated, Format)> {
    let candidates: Vec<Encoding> = match request.encoding {
        Some(encoding) => vec![encoding],
        None => Encoding::ALL.to_vec(),
    };

    for encoding in candidates {
        let Some(fourcc) = encoding.fourcc() else {
            if request.encoding.is_some() {
                return Err(CaptureError::UnsupportedEncoding(format!(
                    "{encoding} cannot be captured from a device"
                )));
            }
            continue;
        };

        match device.set_format(&Format::new(request.width, request.height, fourcc)) {
            Ok(actual) if actual.fourcc == fourcc => {
                if (actual.width, actual.height) != (request.width, request.height) {
                    log::warn!(
                        "Adjusting resolution from {}x{} to {}x{}.",
                        request.width,
                        request.height,
                        actual.width,
                        actual.height
                    );
                }
                log::info!("Using palette {encoding}.");
                let negotiated = Negotiated {
                    width: actual.width,
                    height: actual.height,
                    encoding,
                };
                return Ok((negotiated, actual));
            }
            Ok(actual) => log::debug!("Device offered {} instead of {fourcc}.", actual.fourcc),
            Err(err) => log::debug!("Palette {encoding} rejected: {err}"),
        }

        if request.encoding.is_some() {
            log::warn!("The device does not support palette {encoding}.");
        }
    }

    Err(CaptureError::UnsupportedEncoding(
        "unable to find a compatible palette".to_owned(),
    ))
}

/// Map a buffer ring unless reads were asked for or the ring is refused.
/// Returns the I/O mode and the ring size.
fn start_io<D: CameraDevice>(
    device: &mut D,
    request: &SourceRequest,
    encoding: Encoding,
    can_stream: bool,
) -> (IoMode, u32) {
    if request.use_read || !can_stream {
        return (IoMode::Read, 0);
    }

    let buffers = if encoding.is_compressed() {
        request.buffers.max(COMPRESSED_BUFFERS)
    } else {
        request.buffers.max(1)
    };
    match device.start_stream(buffers, request.timeout) {
        Ok(granted) => {
            if granted < buffers {
                log::warn!("Only {granted} of {buffers} buffers were granted.");
            }
            log::debug!("Mapped {granted} buffers.");
            (IoMode::Ring, granted)
        }
        Err(err) => {
            log::warn!("{err}");
            log::warn!("Unable to use mmap. Using read instead.");
            (IoMode::Read, 0)
        }
    }
}

/// Buffer for synchronous reads, sized by the driver or by the encoding.
fn read_buffer(format: &Format, negotiated: Negotiated) -> Result<Vec<u8>> {
    let size = match usize::try_from(format.size) {
        Ok(size) if size > 0 => size,
        _ => negotiated
            .encoding
            .frame_size(negotiated.width, negotiated.height)
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                CaptureError::InvalidConfig(format!(
                    "cannot size read buffer for {} at {}x{}",
                    negotiated.encoding, negotiated.width, negotiated.height
                ))
            })?,
    };

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| CaptureError::OutOfMemory(size))?;
    buffer.resize(size, 0);
    Ok(buffer)
}

impl<D: CameraDevice> CaptureSource for DeviceSource<D> {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    fn grab(&mut self) -> Result<RawFrame<'_>> {
        if self.closed {
            return Err(CaptureError::Stream("device source is closed".to_owned()));
        }
        let Negotiated {
            width,
            height,
            encoding,
        } = self.negotiated;

        match self.io {
            IoMode::Ring => {
                let (data, meta) = self.device.next_frame()?;
                self.sequence = meta.sequence;
                Ok(RawFrame::new(data, width, height, encoding).with_sequence(meta.sequence))
            }
            IoMode::Read => {
                let read = self.device.read_frame(&mut self.read_buffer, self.timeout)?;
                if read == 0 {
                    log::warn!("Didn't read a frame.");
                    return Err(CaptureError::Stream("didn't read a frame".to_owned()));
                }
                let sequence = self.sequence;
                self.sequence = self.sequence.wrapping_add(1);
                let data = self.read_buffer.get(..read).unwrap_or_default();
                Ok(RawFrame::new(data, width, height, encoding).with_sequence(sequence))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.io == IoMode::Ring {
            self.device.stop_stream()?;
        }
        log::info!("{} closed.", self.device.capabilities().card);
        Ok(())
    }
}

impl<D: CameraDevice> Drop for DeviceSource<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("Error closing device: {err}");
        }
    }
}
