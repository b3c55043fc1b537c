//! Framegrab: capture and average still frames.
//!
//! Frames come from a [`CaptureSource`]: a V4L2 device, a JPEG or PNG file,
//! a stream of headerless raw frames, or a built-in test pattern. Each frame
//! is decoded according to its [`Encoding`] into an [`AverageAccumulator`],
//! and the [`CaptureOrchestrator`] turns the running sums into one RGB image.
//!
//! Device access goes through the [`CameraDevice`] trait, so the whole
//! pipeline can be driven by a mock device in tests.

pub mod accumulator;
pub mod capture;
pub mod config;
pub mod decode;
pub mod device;
pub mod encoding;
pub mod frame;
pub mod repair;
pub mod source;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use accumulator::{AverageAccumulator, MAX_FRAMES};
pub use capture::{
    CaptureOrchestrator, CaptureOutcome, CaptureSettings, CaptureState, CaptureStats, DroppedFrame,
};
pub use config::{FileConfig, Settings};
pub use device::V4l2Device;
pub use encoding::Encoding;
pub use frame::RawFrame;
pub use source::{open_source, Backend, ListFlags, SourceRequest};
pub use traits::{
    CameraDevice, CaptureError, CaptureSource, DeviceCapabilities, Format, FourCC, FrameMetadata,
    Negotiated, Result,
};
