//! framegrab: capture an averaged still image from a camera or other source.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use framegrab::config::parse_resolution;
use framegrab::{CaptureOrchestrator, Encoding, ListFlags, Settings};

/// What to enumerate while opening the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ListItem {
    Inputs,
    Tuners,
    Formats,
    Controls,
}

impl From<ListItem> for ListFlags {
    fn from(item: ListItem) -> Self {
        match item {
            ListItem::Inputs => Self::INPUTS,
            ListItem::Tuners => Self::TUNERS,
            ListItem::Formats => Self::FORMATS,
            ListItem::Controls => Self::CONTROLS,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file to write (PNG or JPEG, chosen by extension).
    output: Option<PathBuf>,
    /// Configuration file.
    #[arg(short, long, env = "FRAMEGRAB_CONFIG")]
    config: Option<PathBuf>,
    /// Source: a device or file path, or "<backend>:<target>".
    #[arg(short, long)]
    device: Option<String>,
    /// Input to select, by index or name.
    #[arg(short, long)]
    input: Option<String>,
    /// Tuner index.
    #[arg(long)]
    tuner: Option<u32>,
    /// Tuner frequency in Hz.
    #[arg(long)]
    frequency: Option<u32>,
    /// Seconds to wait after setting up the device.
    #[arg(short = 'D', long, value_name = "SECONDS")]
    delay: Option<u64>,
    /// Seconds to wait for each frame.
    #[arg(short = 'T', long, value_name = "SECONDS")]
    timeout: Option<u64>,
    /// Use read() instead of memory-mapped buffers.
    #[arg(short, long)]
    read: bool,
    /// Palette to request, e.g. YUYV or MJPEG.
    #[arg(short, long)]
    palette: Option<String>,
    /// Capture resolution, e.g. 640x480.
    #[arg(short = 'R', long)]
    resolution: Option<String>,
    /// Frame rate hint.
    #[arg(long)]
    fps: Option<u32>,
    /// Number of frames to average.
    #[arg(short = 'F', long)]
    frames: Option<u32>,
    /// Number of frames to discard before capturing.
    #[arg(short = 'S', long)]
    skip: Option<u32>,
    /// Number of shared buffers to request.
    #[arg(long)]
    buffers: Option<u32>,
    /// Write the raw bytes of the first frame to this file.
    #[arg(long = "dumpframe", value_name = "FILE")]
    dump_frame: Option<PathBuf>,
    /// Source option as name=value (repeatable).
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,
    /// Enumerate inputs, tuners, formats or controls while opening.
    #[arg(long, value_enum)]
    list: Vec<ListItem>,
    /// More logging (repeat for trace).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    const fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }

    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Settings::default(),
        };

        if let Some(device) = &self.device {
            settings.device.clone_from(device);
        }
        if let Some(output) = &self.output {
            settings.output = Some(output.clone());
        }

        let request = &mut settings.request;
        if let Some(input) = &self.input {
            request.input = Some(input.clone());
        }
        if let Some(tuner) = self.tuner {
            request.tuner = tuner;
        }
        if let Some(frequency) = self.frequency {
            request.frequency = frequency;
        }
        if let Some(delay) = self.delay {
            request.delay = Duration::from_secs(delay);
        }
        if let Some(timeout) = self.timeout {
            request.timeout = Some(Duration::from_secs(timeout));
        }
        request.use_read |= self.read;
        if let Some(palette) = &self.palette {
            request.encoding = Some(palette.parse::<Encoding>()?);
        }
        if let Some(resolution) = &self.resolution {
            (request.width, request.height) = parse_resolution(resolution)?;
        }
        if self.fps.is_some() {
            request.fps = self.fps;
        }
        if let Some(buffers) = self.buffers {
            request.buffers = buffers;
        }
        for option in &self.set {
            let (name, value) = option
                .split_once('=')
                .ok_or_else(|| anyhow!("option '{option}' is not name=value"))?;
            request.set_option(name.trim(), value.trim());
        }
        for item in &self.list {
            request.list |= ListFlags::from(*item);
        }

        let capture = &mut settings.capture;
        if let Some(frames) = self.frames {
            capture.frames = frames;
            capture.frames = capture.frame_count();
        }
        if let Some(skip) = self.skip {
            capture.skip = skip;
        }
        if let Some(dump_frame) = &self.dump_frame {
            capture.dump_frame = Some(dump_frame.clone());
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    let settings = args.settings()?;
    let output = settings
        .output
        .clone()
        .ok_or_else(|| anyhow!("no output file given"))?;

    let mut orchestrator = CaptureOrchestrator::new(settings.capture.clone());
    let outcome = orchestrator
        .run(&settings.device, &settings.request)
        .with_context(|| format!("capture from {} failed", settings.device))?;

    if !outcome.dropped.is_empty() {
        log::warn!(
            "{} of {} frames could not be decoded.",
            outcome.dropped.len(),
            outcome
                .frames
                .saturating_add(u32::try_from(outcome.dropped.len()).unwrap_or(u32::MAX))
        );
    }
    if let Some(err) = &outcome.interrupted {
        log::warn!("Capture stopped early after {} frames: {err}", outcome.frames);
    }

    log::info!("Writing {}", output.display());
    outcome
        .image
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}
