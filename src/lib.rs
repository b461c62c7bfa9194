//! # BLE Camera Streamer
//!
//! Chunked transfer core for a battery-powered camera/microphone peripheral
//! streaming JPEG images and μ-law audio to a host over a packet-size-limited
//! wireless link.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────── PERIPHERAL ────────────────────────┐
//! │  Camera ──► FrameStreamer ──► ChunkEncoder ──┐             │
//! │                 ▲                            │             │
//! │  Commands ──► StreamController (StreamConfig)│             │
//! │                 ▼                            ▼             │
//! │  Microphone ─► AudioStreamer ─► μ-law ──► Transport.notify │
//! └──────────────────────────────┬─────────────────────────────┘
//!                                │ ≤517-byte notifications
//! ┌──────────────────────────────▼──────────────── HOST ───────┐
//! │  HostSession ──► Reassembler per channel ──► Frame channel │
//! │              └─► AudioPacket channel                       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Three logical channels (single-capture image, continuous frame stream,
//! continuous audio stream) share one physical link. Images are fragmented
//! into start/data/end records by [`protocol::chunk`]; audio packets always
//! fit a single link payload. The host side tolerates loss, duplication and
//! reordering and reports a completion ratio per assembled frame.

pub mod audio;
pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod protocol;
pub mod transport;

pub use error::{Error, Result};

/// Protocol and scheduling constants
pub mod constants {
    use std::time::Duration;

    /// Negotiated link payload size in bytes (BLE MTU with DLE)
    pub const LINK_PAYLOAD_SIZE: usize = 517;

    /// Data record header: marker byte + 16-bit chunk index
    pub const DATA_CHUNK_HEADER_LEN: usize = 3;

    /// Start record: marker + chunk count (u16 BE) + total length (u32 LE)
    pub const START_HEADER_LEN: usize = 7;

    /// End record: marker + chunk count (u16 BE)
    pub const END_MARKER_LEN: usize = 3;

    /// Maximum data-chunk payload per record. The 517-byte link payload
    /// leaves 514 bytes after the record header; the link stack reserves
    /// four more for ATT overhead, so 510 bytes is the on-air contract.
    pub const MAX_CHUNK_PAYLOAD: usize = 510;

    /// Audio sample rate in Hz (telephony standard)
    pub const AUDIO_SAMPLE_RATE: u32 = 8000;

    /// PCM samples per audio packet (20ms at 8kHz)
    pub const AUDIO_FRAME_SAMPLES: usize = 160;

    /// Minimum spacing between audio packets
    pub const AUDIO_PACKET_INTERVAL: Duration = Duration::from_millis(100);

    /// Frame activity scheduling tick
    pub const FRAME_TICK: Duration = Duration::from_millis(10);

    /// Audio activity scheduling tick
    pub const AUDIO_TICK: Duration = Duration::from_millis(25);

    /// Fast retry delay after a failed camera capture
    pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(20);

    /// Pacing delay between transmitted records. Sustained back-to-back
    /// notifications overrun the receiver's queue; this is a rate-limiting
    /// contract with the link, not tuning.
    pub const CHUNK_PACING: Duration = Duration::from_millis(1);

    /// JPEG quality bounds (lower = higher quality)
    pub const MIN_QUALITY: u8 = 4;
    pub const MAX_QUALITY: u8 = 63;

    /// Frame interval bounds in seconds
    pub const MIN_FRAME_INTERVAL: f64 = 0.1;
    pub const MAX_FRAME_INTERVAL: f64 = 60.0;
}
