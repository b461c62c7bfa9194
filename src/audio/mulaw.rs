//! G.711-style μ-law companding
//!
//! Fixed bit-exact transform: 16-bit linear PCM in, complemented
//! sign/segment/mantissa byte out. This exact variant (including its
//! segment-0 mantissa shift of 4) is what the peripheral has always put on
//! the wire. It must not be "corrected" to the textbook table; downstream
//! companding decoders are calibrated against these bytes.

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

/// Encode one 16-bit linear PCM sample to an 8-bit μ-law sample
pub fn linear_to_mulaw(pcm: i16) -> u8 {
    let sign: u8 = if pcm < 0 { 0x80 } else { 0 };
    // Widened before abs() so i16::MIN clips instead of overflowing
    let mut magnitude = i32::from(pcm).abs();
    if magnitude > CLIP {
        magnitude = CLIP;
    }
    magnitude += BIAS;

    let mut exponent: u32 = 7;
    let mut mask = 0x4000;
    while magnitude & mask == 0 && exponent > 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let shift = if exponent == 0 { 4 } else { exponent + 3 };
    let mantissa = ((magnitude >> shift) & 0x0F) as u8;

    !(sign | ((exponent as u8) << 4) | mantissa)
}

/// Encode a PCM frame in place into `out`
///
/// `out` is cleared first; one output byte per input sample.
pub fn encode_frame(pcm: &[i16], out: &mut Vec<u8>) {
    out.clear();
    out.extend(pcm.iter().map(|&sample| linear_to_mulaw(sample)));
}
