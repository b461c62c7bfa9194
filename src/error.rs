//! Error types for the streaming core

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Status serialization error: {0}")]
    Status(#[from] serde_json::Error),
}

/// Chunked-transfer protocol errors
///
/// Always scoped to a single transfer: the affected session aborts,
/// nothing else does.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Record too short: {0} bytes")]
    Truncated(usize),

    #[error("Unknown record marker: {0:#04x}")]
    UnknownMarker(u8),

    #[error("Chunk index {index} out of range (expected < {count})")]
    IndexOutOfRange { index: u16, count: u16 },

    #[error("Chunk payload of {len} bytes exceeds limit of {max}")]
    OversizedChunk { len: usize, max: usize },

    #[error("Declared length {total_len} inconsistent with {chunk_count} chunks")]
    LengthMismatch { total_len: u32, chunk_count: u16 },

    #[error("Buffer of {len} bytes needs {required} chunks, exceeding the 16-bit chunk count")]
    TooLarge { len: usize, required: usize },

    #[error("Invalid chunk payload limit: {0}")]
    InvalidPayloadLimit(usize),
}

/// Capture collaborator errors (camera / microphone)
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No buffer available")]
    NotAvailable,

    #[error("Capture timed out")]
    Timeout,

    #[error("Sensor error: {0}")]
    Sensor(String),
}

/// Transport-layer errors
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Link not connected")]
    NotConnected,

    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    #[error("Payload of {0} bytes exceeds link limit")]
    PayloadTooLarge(usize),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
