//! Device-side streaming core
//!
//! The peripheral runs one [`StreamController`] plus two capture
//! activities: [`FrameStreamer`] for both chunked image channels and
//! [`AudioStreamer`] for the audio packet stream. The activities poll the
//! shared configuration on fixed ticks; the controller is the only writer.

mod audio;
mod controller;
mod streaming;

pub use audio::{AudioStreamer, AudioStreamerStats};
pub use controller::{ControllerStats, StreamController};
pub use streaming::{FrameStreamer, FrameStreamerStats};
