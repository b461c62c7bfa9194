//! Audio compression pipeline
//!
//! Converts fixed-size linear PCM frames to 8-bit μ-law packets with
//! adaptive noise gating. Packets are small enough to ship unfragmented.

pub mod encoder;
pub mod mulaw;

pub use encoder::{AudioEncoder, EncodeOutcome};
pub use mulaw::linear_to_mulaw;
