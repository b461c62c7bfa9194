//! Host-side reassembly
//!
//! Mirrors the device's transmit path: chunked records are rebuilt into
//! frames, audio packets pass through untouched, and everything is handed to
//! the application over bounded channels.

mod frame;
mod session;

pub use frame::{AudioPacket, ChunkChannel, Frame};
pub use session::{HostSession, SessionStats};
