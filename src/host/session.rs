//! Host-side link session
//!
//! One [`HostSession`] per connection. Inbound notifications are dispatched
//! by endpoint: the two chunked channels each feed their own [`Reassembler`],
//! audio packets pass straight through, status reports are parsed and kept.
//! Assembled frames and audio packets are handed to the application over
//! bounded channels; a slow consumer loses data instead of stalling the
//! receive path.

use std::time::Instant;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::constants::MAX_CHUNK_PAYLOAD;
use crate::error::{ProtocolError, Result};
use crate::host::frame::{AudioPacket, ChunkChannel, Frame};
use crate::protocol::{Record, StatusReport};
use crate::transport::Endpoint;

/// Assembled frames buffered before the consumer falls behind
const FRAME_CHANNEL_CAPACITY: usize = 16;
/// Audio packets buffered before the consumer falls behind
const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// Reassembly state of one chunked channel
enum SessionState {
    Idle,
    Receiving(TransferSession),
}

/// One in-flight transfer
///
/// The backing buffer is allocated to the declared length up front and
/// chunks are copied at their index offsets, so reordering needs no special
/// casing and ranges whose chunks never arrive stay zeroed.
struct TransferSession {
    chunk_count: u16,
    total_len: u32,
    buffer: Vec<u8>,
    seen: Vec<bool>,
    received: u16,
    /// Sender's per-chunk payload size, inferred from the first stored chunk
    chunk_size: Option<usize>,
}

enum StoreOutcome {
    Stored,
    Duplicate,
}

impl TransferSession {
    fn new(chunk_count: u16, total_len: u32) -> Self {
        Self {
            chunk_count,
            total_len,
            buffer: vec![0; total_len as usize],
            seen: vec![false; chunk_count as usize],
            received: 0,
            chunk_size: None,
        }
    }

    /// Store one data chunk at its offset; duplicates are idempotent
    fn store(
        &mut self,
        index: u16,
        payload: &[u8],
    ) -> std::result::Result<StoreOutcome, ProtocolError> {
        if index >= self.chunk_count {
            return Err(ProtocolError::IndexOutOfRange {
                index,
                count: self.chunk_count,
            });
        }
        if payload.len() > MAX_CHUNK_PAYLOAD {
            return Err(ProtocolError::OversizedChunk {
                len: payload.len(),
                max: MAX_CHUNK_PAYLOAD,
            });
        }
        if self.seen[index as usize] {
            return Ok(StoreOutcome::Duplicate);
        }
        let chunk_size = self.validated_chunk_size(index, payload.len())?;
        let offset = index as usize * chunk_size;
        self.buffer[offset..offset + payload.len()].copy_from_slice(payload);
        self.seen[index as usize] = true;
        self.received += 1;
        Ok(StoreOutcome::Stored)
    }

    /// Check a chunk's length against the transfer geometry
    ///
    /// Every chunk but the last carries exactly the sender's chunk payload
    /// size; the last carries the remainder. The size is not on the wire, so
    /// it is inferred from whichever chunk arrives first and every later
    /// chunk must agree, which also guarantees the offset copy stays within
    /// the declared length.
    fn validated_chunk_size(
        &mut self,
        index: u16,
        len: usize,
    ) -> std::result::Result<usize, ProtocolError> {
        let count = self.chunk_count as usize;
        let total = self.total_len as usize;
        let is_final = index as usize == count - 1;
        let mismatch = || ProtocolError::LengthMismatch {
            total_len: self.total_len,
            chunk_count: self.chunk_count,
        };

        if let Some(size) = self.chunk_size {
            let expected = if is_final { total - (count - 1) * size } else { size };
            if len != expected {
                return Err(mismatch());
            }
            return Ok(size);
        }

        let size = if !is_final {
            // Non-final chunks fix the size directly; the remainder for the
            // final chunk must come out in 1..=size
            let used = len.checked_mul(count - 1).ok_or_else(mismatch)?;
            if used >= total || total - used > len {
                return Err(mismatch());
            }
            len
        } else if count == 1 {
            if len != total {
                return Err(mismatch());
            }
            len.max(1)
        } else {
            // Final chunk first: the remaining bytes must split evenly over
            // the other chunks
            if len == 0 || len > total {
                return Err(mismatch());
            }
            let rest = total - len;
            if rest % (count - 1) != 0 {
                return Err(mismatch());
            }
            let size = rest / (count - 1);
            if size == 0 || size > MAX_CHUNK_PAYLOAD || len > size {
                return Err(mismatch());
            }
            size
        };
        self.chunk_size = Some(size);
        Ok(size)
    }

    fn assemble(self) -> (Bytes, u16) {
        (Bytes::from(self.buffer), self.received)
    }
}

/// Everything known about one finished transfer
struct AssembledTransfer {
    data: Bytes,
    declared_len: u32,
    chunk_count: u16,
    chunks_received: u16,
}

/// Per-channel reassembly state machine
struct Reassembler {
    channel: ChunkChannel,
    state: SessionState,
    chunks_received: u64,
    duplicate_chunks: u64,
    stale_chunks: u64,
    aborted: u64,
}

impl Reassembler {
    fn new(channel: ChunkChannel) -> Self {
        Self {
            channel,
            state: SessionState::Idle,
            chunks_received: 0,
            duplicate_chunks: 0,
            stale_chunks: 0,
            aborted: 0,
        }
    }

    /// Feed one parsed record through the state machine
    ///
    /// Returns the assembled transfer when an end marker closes a session.
    /// Corrupt data records are discarded without touching the session;
    /// malformed payloads (oversized or inconsistent with the declared
    /// geometry) abort it.
    fn handle_record(
        &mut self,
        record: Record,
    ) -> std::result::Result<Option<AssembledTransfer>, ProtocolError> {
        match record {
            Record::Start {
                chunk_count,
                total_len,
            } => {
                // A fresh start record always wins over an in-flight transfer
                if matches!(self.state, SessionState::Receiving(_)) {
                    tracing::warn!(
                        channel = ?self.channel,
                        "new transfer started mid-receive, aborting previous"
                    );
                    self.aborted += 1;
                    self.state = SessionState::Idle;
                }
                if (chunk_count == 0 && total_len > 0)
                    || u64::from(total_len) > u64::from(chunk_count) * MAX_CHUNK_PAYLOAD as u64
                {
                    return Err(ProtocolError::LengthMismatch {
                        total_len,
                        chunk_count,
                    });
                }
                tracing::debug!(
                    channel = ?self.channel,
                    chunk_count,
                    total_len,
                    "transfer started"
                );
                self.state = SessionState::Receiving(TransferSession::new(chunk_count, total_len));
                Ok(None)
            }
            Record::Data { index, payload } => {
                let session = match &mut self.state {
                    SessionState::Receiving(session) => session,
                    SessionState::Idle => {
                        // Chunk from an already-closed or never-seen transfer
                        self.stale_chunks += 1;
                        tracing::debug!(channel = ?self.channel, index, "discarding stale chunk");
                        return Ok(None);
                    }
                };
                match session.store(index, payload) {
                    Ok(StoreOutcome::Stored) => {
                        self.chunks_received += 1;
                        Ok(None)
                    }
                    Ok(StoreOutcome::Duplicate) => {
                        self.duplicate_chunks += 1;
                        Ok(None)
                    }
                    Err(e @ ProtocolError::IndexOutOfRange { .. }) => Err(e),
                    Err(e) => {
                        self.aborted += 1;
                        self.state = SessionState::Idle;
                        Err(e)
                    }
                }
            }
            Record::End { chunk_count } => {
                let session = match std::mem::replace(&mut self.state, SessionState::Idle) {
                    SessionState::Receiving(session) => session,
                    SessionState::Idle => {
                        tracing::debug!(channel = ?self.channel, "discarding stale end marker");
                        return Ok(None);
                    }
                };
                if chunk_count != session.chunk_count {
                    // Tolerated: the start record is authoritative
                    tracing::debug!(
                        channel = ?self.channel,
                        start = session.chunk_count,
                        end = chunk_count,
                        "end marker chunk count differs from start record"
                    );
                }
                let declared_len = session.total_len;
                let declared_chunks = session.chunk_count;
                let (data, chunks_received) = session.assemble();
                Ok(Some(AssembledTransfer {
                    data,
                    declared_len,
                    chunk_count: declared_chunks,
                    chunks_received,
                }))
            }
        }
    }

    /// Drop any in-flight transfer
    fn abort(&mut self) {
        if matches!(self.state, SessionState::Receiving(_)) {
            self.aborted += 1;
            self.state = SessionState::Idle;
        }
    }
}

/// Host-side receive path for one connection
pub struct HostSession {
    image: Reassembler,
    frame: Reassembler,
    /// Shared across both chunked channels
    frame_number: u64,
    audio_sequence: u64,
    last_status: Option<StatusReport>,
    frame_tx: Sender<Frame>,
    audio_tx: Sender<AudioPacket>,
    frames_completed: u64,
    frames_dropped: u64,
    corrupt_records: u64,
    audio_dropped: u64,
}

impl HostSession {
    /// Create a session plus the application-facing receive channels
    pub fn new() -> (Self, Receiver<Frame>, Receiver<AudioPacket>) {
        let (frame_tx, frame_rx) = bounded(FRAME_CHANNEL_CAPACITY);
        let (audio_tx, audio_rx) = bounded(AUDIO_CHANNEL_CAPACITY);
        let session = Self {
            image: Reassembler::new(ChunkChannel::Image),
            frame: Reassembler::new(ChunkChannel::Frame),
            frame_number: 0,
            audio_sequence: 0,
            last_status: None,
            frame_tx,
            audio_tx,
            frames_completed: 0,
            frames_dropped: 0,
            corrupt_records: 0,
            audio_dropped: 0,
        };
        (session, frame_rx, audio_rx)
    }

    /// Process one inbound notification
    ///
    /// Errors are scoped to the offending record or transfer; the session
    /// itself stays usable.
    pub fn handle_notification(&mut self, endpoint: Endpoint, payload: &[u8]) -> Result<()> {
        match endpoint {
            Endpoint::Image => self.handle_chunked(ChunkChannel::Image, payload),
            Endpoint::Frame => self.handle_chunked(ChunkChannel::Frame, payload),
            Endpoint::Audio => {
                self.handle_audio(payload);
                Ok(())
            }
            Endpoint::Status => self.handle_status(payload),
            Endpoint::Control => {
                tracing::debug!("ignoring inbound control payload");
                Ok(())
            }
        }
    }

    fn handle_chunked(&mut self, channel: ChunkChannel, payload: &[u8]) -> Result<()> {
        let record = match Record::parse(payload) {
            Ok(record) => record,
            Err(e) => {
                self.corrupt_records += 1;
                tracing::warn!(?channel, "discarding unparseable record: {e}");
                return Err(e.into());
            }
        };
        let reassembler = match channel {
            ChunkChannel::Image => &mut self.image,
            ChunkChannel::Frame => &mut self.frame,
        };
        match reassembler.handle_record(record) {
            Ok(Some(assembled)) => {
                self.deliver_frame(channel, assembled);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.corrupt_records += 1;
                tracing::warn!(?channel, "protocol violation: {e}");
                Err(e.into())
            }
        }
    }

    fn deliver_frame(&mut self, channel: ChunkChannel, assembled: AssembledTransfer) {
        self.frame_number += 1;
        let frame = Frame {
            channel,
            frame_number: self.frame_number,
            data: assembled.data,
            declared_len: assembled.declared_len,
            chunk_count: assembled.chunk_count,
            chunks_received: assembled.chunks_received,
            received_at: Instant::now(),
        };
        if frame.is_complete() {
            tracing::debug!(
                ?channel,
                number = frame.frame_number,
                bytes = frame.data.len(),
                "frame assembled"
            );
        } else {
            tracing::warn!(
                ?channel,
                number = frame.frame_number,
                ratio = frame.completion_ratio(),
                "frame assembled with missing chunks"
            );
        }
        self.frames_completed += 1;
        if self.frame_tx.try_send(frame).is_err() {
            self.frames_dropped += 1;
            tracing::warn!("frame channel full, dropping frame");
        }
    }

    fn handle_audio(&mut self, payload: &[u8]) {
        self.audio_sequence += 1;
        let packet = AudioPacket {
            sequence: self.audio_sequence,
            data: Bytes::copy_from_slice(payload),
            received_at: Instant::now(),
        };
        if self.audio_tx.try_send(packet).is_err() {
            self.audio_dropped += 1;
            tracing::debug!("audio channel full, dropping packet");
        }
    }

    fn handle_status(&mut self, payload: &[u8]) -> Result<()> {
        let report: StatusReport = serde_json::from_slice(payload)?;
        tracing::debug!(
            battery = report.battery,
            frames = report.frames,
            audio = report.audio,
            "status report received"
        );
        self.last_status = Some(report);
        Ok(())
    }

    /// Most recent status report, if any arrived
    pub fn last_status(&self) -> Option<&StatusReport> {
        self.last_status.as_ref()
    }

    /// Drop all in-flight transfers, e.g. on link loss
    pub fn on_disconnect(&mut self) {
        tracing::info!("link lost, aborting in-flight transfers");
        self.image.abort();
        self.frame.abort();
    }

    /// Get statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_completed: self.frames_completed,
            frames_dropped: self.frames_dropped,
            frames_aborted: self.image.aborted + self.frame.aborted,
            chunks_received: self.image.chunks_received + self.frame.chunks_received,
            duplicate_chunks: self.image.duplicate_chunks + self.frame.duplicate_chunks,
            stale_chunks: self.image.stale_chunks + self.frame.stale_chunks,
            corrupt_records: self.corrupt_records,
            audio_packets: self.audio_sequence,
            audio_dropped: self.audio_dropped,
        }
    }
}

/// Session statistics, aggregated over both chunked channels
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub frames_completed: u64,
    pub frames_dropped: u64,
    pub frames_aborted: u64,
    pub chunks_received: u64,
    pub duplicate_chunks: u64,
    pub stale_chunks: u64,
    pub corrupt_records: u64,
    pub audio_packets: u64,
    pub audio_dropped: u64,
}
