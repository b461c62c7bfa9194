//! Wire protocol: chunked transfer records, command tokens and the status
//! report. The record layout is a fixed contract shared by both sides of the
//! link; everything marker-byte related lives in [`chunk`].

pub mod chunk;
pub mod command;
pub mod status;

pub use chunk::{ChunkEncoder, Record};
pub use command::Command;
pub use status::StatusReport;
