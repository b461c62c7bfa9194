//! Audio frame encoder
//!
//! Wraps the μ-law transform with the peripheral's front-end conditioning:
//! an adaptive RMS noise gate and a first-order DC-removal filter. Gated
//! frames are reported as [`EncodeOutcome::Suppressed`] and produce no
//! packet; that is a normal outcome, not an error.

use bytes::Bytes;

use crate::audio::mulaw::linear_to_mulaw;

/// Initial adaptive noise threshold (RMS units)
const INITIAL_THRESHOLD: i32 = 50;

/// Result of encoding one PCM frame
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    /// Frame passed the gate; one μ-law byte per input sample
    Encoded(Bytes),
    /// Frame was below the noise threshold and was not encoded
    Suppressed,
}

/// μ-law encoder with adaptive noise gating
pub struct AudioEncoder {
    /// Adaptive RMS threshold, tracks recent signal level
    threshold: i32,
    /// One sample of DC-removal filter state
    prev_sample: i16,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    frames_encoded: u64,
    frames_suppressed: u64,
}

impl Default for AudioEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder {
    pub fn new() -> Self {
        Self {
            threshold: INITIAL_THRESHOLD,
            prev_sample: 0,
            encode_buffer: Vec::new(),
            frames_encoded: 0,
            frames_suppressed: 0,
        }
    }

    /// Encode one frame of 16-bit mono PCM
    ///
    /// The threshold adapts before the gate is applied: a loud frame raises
    /// the floor to a quarter of its own level. Filter state only advances
    /// for frames that are actually encoded.
    pub fn encode_frame(&mut self, pcm: &[i16]) -> EncodeOutcome {
        if pcm.is_empty() {
            self.frames_suppressed += 1;
            return EncodeOutcome::Suppressed;
        }

        let rms = frame_rms(pcm);
        if rms > self.threshold * 2 {
            self.threshold = rms / 4;
        }
        if rms < self.threshold {
            self.frames_suppressed += 1;
            return EncodeOutcome::Suppressed;
        }

        self.encode_buffer.clear();
        self.encode_buffer.reserve(pcm.len());
        for &sample in pcm {
            let filtered =
                (i32::from(sample) - ((i32::from(self.prev_sample) * 15) >> 4)) as i16;
            self.prev_sample = sample;
            self.encode_buffer.push(linear_to_mulaw(filtered));
        }

        self.frames_encoded += 1;
        EncodeOutcome::Encoded(Bytes::copy_from_slice(&self.encode_buffer))
    }

    /// Current adaptive threshold
    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// Get statistics
    pub fn stats(&self) -> AudioEncoderStats {
        AudioEncoderStats {
            frames_encoded: self.frames_encoded,
            frames_suppressed: self.frames_suppressed,
        }
    }
}

/// Integer RMS of a PCM frame
fn frame_rms(pcm: &[i16]) -> i32 {
    let sum: i64 = pcm
        .iter()
        .map(|&sample| i64::from(sample) * i64::from(sample))
        .sum();
    ((sum / pcm.len() as i64) as f64).sqrt() as i32
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct AudioEncoderStats {
    pub frames_encoded: u64,
    pub frames_suppressed: u64,
}
