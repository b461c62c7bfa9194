//! Assembled frames and audio packets delivered to the host application

use std::time::Instant;

use bytes::Bytes;

/// The two chunked channels multiplexed over the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkChannel {
    /// Single-shot captures at boosted settings
    Image,
    /// Continuous frame stream
    Frame,
}

/// One assembled JPEG frame
///
/// Completion is best-effort: a frame whose end marker arrived is delivered
/// even when data records were lost on the air. [`completion_ratio`]
/// (Frame::completion_ratio) tells the application how much survived.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Channel the frame arrived on
    pub channel: ChunkChannel,
    /// Monotonic counter shared across both chunked channels
    pub frame_number: u64,
    /// Buffer of the declared length; ranges whose chunks were lost read
    /// as zeros
    pub data: Bytes,
    /// Total length declared by the sender's start record
    pub declared_len: u32,
    /// Chunk count declared by the sender's start record
    pub chunk_count: u16,
    /// Distinct data chunks actually received
    pub chunks_received: u16,
    /// When the end marker closed the transfer
    pub received_at: Instant,
}

impl Frame {
    /// Fraction of declared chunks that arrived, in `0.0..=1.0`
    ///
    /// An empty transfer (zero declared chunks) is complete by definition.
    pub fn completion_ratio(&self) -> f64 {
        if self.chunk_count == 0 {
            1.0
        } else {
            f64::from(self.chunks_received) / f64::from(self.chunk_count)
        }
    }

    /// Whether every declared chunk arrived
    pub fn is_complete(&self) -> bool {
        self.chunks_received == self.chunk_count
    }
}

/// One μ-law audio packet, delivered as received
#[derive(Debug, Clone)]
pub struct AudioPacket {
    /// Monotonic packet counter, host-side
    pub sequence: u64,
    /// Compressed samples, one byte each
    pub data: Bytes,
    /// When the packet arrived
    pub received_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(chunk_count: u16, chunks_received: u16) -> Frame {
        Frame {
            channel: ChunkChannel::Frame,
            frame_number: 1,
            data: Bytes::new(),
            declared_len: 0,
            chunk_count,
            chunks_received,
            received_at: Instant::now(),
        }
    }

    #[test]
    fn test_completion_ratio() {
        assert_eq!(frame(4, 4).completion_ratio(), 1.0);
        assert_eq!(frame(4, 3).completion_ratio(), 0.75);
        assert_eq!(frame(4, 0).completion_ratio(), 0.0);
    }

    #[test]
    fn test_empty_transfer_counts_as_complete() {
        let f = frame(0, 0);
        assert_eq!(f.completion_ratio(), 1.0);
        assert!(f.is_complete());
    }
}
