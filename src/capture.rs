//! Capture runs: open a source, skip, capture, average.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::accumulator::{AverageAccumulator, MAX_FRAMES};
use crate::decode::decode;
use crate::encoding::Encoding;
use crate::frame::RawFrame;
use crate::source::{open_source, SourceRequest};
use crate::traits::{CaptureError, CaptureSource, Result};

/// What a capture run does once the source is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Frames to average.
    pub frames: u32,
    /// Frames to grab and discard first, letting auto-exposure settle.
    pub skip: u32,
    /// Where to write the undecoded bytes of the first captured frame.
    pub dump_frame: Option<PathBuf>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frames: 1,
            skip: 0,
            dump_frame: None,
        }
    }
}

impl CaptureSettings {
    /// Frame count forced into `1..=MAX_FRAMES`.
    pub fn frame_count(&self) -> u32 {
        if self.frames > MAX_FRAMES {
            log::warn!(
                "Requested {} frames, maximum is {MAX_FRAMES}. Using that.",
                self.frames
            );
        }
        self.frames.clamp(1, MAX_FRAMES)
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Not started.
    Idle,
    /// Opening the source.
    Opening,
    /// Discarding frames; the count still to skip.
    Skipping(u32),
    /// Capturing frame `frame` (1-based) of `of`.
    Capturing {
        /// Current frame, counting from 1.
        frame: u32,
        /// Frames requested.
        of: u32,
    },
    /// Averaging the accumulated frames.
    Finalizing,
    /// Finished with an image.
    Done,
    /// Finished without an image.
    Failed,
}

/// Grab timing for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Successful grabs, skipped frames included.
    pub grabs: u32,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl CaptureStats {
    fn record(&mut self) {
        let now = Instant::now();
        self.first.get_or_insert(now);
        self.last = Some(now);
        self.grabs = self.grabs.saturating_add(1);
    }

    /// Time between the first and the last successful grab.
    pub fn elapsed(&self) -> Duration {
        match (self.first, self.last) {
            (Some(first), Some(last)) => last.saturating_duration_since(first),
            _ => Duration::ZERO,
        }
    }

    /// Grabs per second, once there is a measurable interval.
    pub fn fps(&self) -> Option<f64> {
        let seconds = self.elapsed().as_secs_f64();
        (seconds > 0.0).then(|| f64::from(self.grabs) / seconds)
    }

    fn log(&self) {
        let seconds = self.elapsed().as_secs_f64();
        match (self.grabs, self.fps()) {
            (0, _) => {}
            (1, _) => log::info!("Captured frame in {seconds:0.2} seconds."),
            (2, _) | (_, None) => {
                log::info!("Captured {} frames in {seconds:0.2} seconds.", self.grabs);
            }
            (grabs, Some(fps)) => {
                log::info!("Captured {grabs} frames in {seconds:0.2} seconds. ({fps:.0} fps)");
            }
        }
    }
}

/// A frame that was grabbed but could not be decoded.
#[derive(Debug)]
pub struct DroppedFrame {
    /// Index of the frame within the capture phase, from 0.
    pub index: u32,
    /// Encoding of the frame.
    pub encoding: Encoding,
    /// Why it was dropped.
    pub error: CaptureError,
}

/// Result of a successful run.
#[derive(Debug)]
pub struct CaptureOutcome {
    /// The averaged image.
    pub image: RgbImage,
    /// Frames that went into the average.
    pub frames: u32,
    /// Frames grabbed but rejected by their decoder.
    pub dropped: Vec<DroppedFrame>,
    /// The grab failure that ended capture early, if any.
    pub interrupted: Option<CaptureError>,
    /// Grab timing.
    pub stats: CaptureStats,
}

/// Drives one capture run through [`CaptureState`].
///
/// Open failures and resource errors fail the run. A frame its decoder
/// rejects is dropped and capture goes on. A grab failure during capture ends
/// the capture phase, and whatever was accumulated so far is averaged.
#[derive(Debug)]
pub struct CaptureOrchestrator {
    settings: CaptureSettings,
    state: CaptureState,
    stats: CaptureStats,
}

impl CaptureOrchestrator {
    /// Create an idle orchestrator.
    pub const fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            state: CaptureState::Idle,
            stats: CaptureStats {
                grabs: 0,
                first: None,
                last: None,
            },
        }
    }

    /// Current state.
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Timing of the current or last run.
    pub const fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Open the source named by `descriptor` and run a capture on it.
    pub fn run(&mut self, descriptor: &str, request: &SourceRequest) -> Result<CaptureOutcome> {
        self.state = CaptureState::Opening;
        self.stats = CaptureStats::default();
        log::info!("--- Opening {descriptor}...");
        let mut source = open_source(descriptor, request).inspect_err(|_| {
            self.state = CaptureState::Failed;
        })?;
        self.capture(source.as_mut())
    }

    /// Run a capture on an already-open source, closing it afterwards.
    pub fn capture(&mut self, source: &mut dyn CaptureSource) -> Result<CaptureOutcome> {
        self.stats = CaptureStats::default();
        let result = self.capture_frames(source);

        if let Err(err) = source.close() {
            log::warn!("Error closing source: {err}");
        }
        self.stats.log();

        let (acc, dropped, interrupted) = result.inspect_err(|_| {
            self.state = CaptureState::Failed;
        })?;

        self.state = CaptureState::Finalizing;
        let frames = acc.frames_added();
        if frames == 0 {
            self.state = CaptureState::Failed;
            return Err(interrupted.unwrap_or(CaptureError::NoFramesCaptured));
        }
        let image = acc.finalize(frames).inspect_err(|_| {
            self.state = CaptureState::Failed;
        })?;

        self.state = CaptureState::Done;
        Ok(CaptureOutcome {
            image,
            frames,
            dropped,
            interrupted,
            stats: self.stats,
        })
    }

    fn capture_frames(
        &mut self,
        source: &mut dyn CaptureSource,
    ) -> Result<(AverageAccumulator, Vec<DroppedFrame>, Option<CaptureError>)> {
        let negotiated = source.negotiated();
        let mut acc = AverageAccumulator::new(negotiated.width, negotiated.height)?;
        let frames = self.settings.frame_count();
        let skip = self.settings.skip;

        if frames == 1 {
            log::info!("--- Capturing frame...");
        } else {
            log::info!("--- Capturing {frames} frames...");
        }

        if skip > 0 {
            if skip == 1 {
                log::info!("Skipping frame...");
            } else {
                log::info!("Skipping {skip} frames...");
            }
            for remaining in (1..=skip).rev() {
                self.state = CaptureState::Skipping(remaining);
                if let Err(err) = source.grab() {
                    log::warn!("Skipping stopped early: {err}");
                    break;
                }
                self.stats.record();
            }
            log::info!("Capturing {frames} frames...");
        }

        let mut dropped = Vec::new();
        let mut interrupted = None;
        for index in 0..frames {
            self.state = CaptureState::Capturing {
                frame: index + 1,
                of: frames,
            };
            let frame = match source.grab() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("Capture stopped after {index} frame(s): {err}");
                    interrupted = Some(err);
                    break;
                }
            };
            self.stats.record();

            if index == 0 {
                if let Some(path) = &self.settings.dump_frame {
                    dump_frame(path, &frame);
                }
            }

            match decode(&frame, &mut acc) {
                Ok(()) => {}
                Err(err) if err.is_frame_local() => {
                    log::warn!("Dropping frame {index} ({}): {err}", frame.encoding);
                    dropped.push(DroppedFrame {
                        index,
                        encoding: frame.encoding,
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok((acc, dropped, interrupted))
    }
}

fn dump_frame(path: &Path, frame: &RawFrame<'_>) {
    log::info!("Dumping raw frame to '{}'...", path.display());
    if let Err(err) = std::fs::write(path, frame.data()) {
        log::error!("Unable to dump frame: {err}");
    }
}
