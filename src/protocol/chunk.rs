//! Chunked transfer codec
//!
//! Fragments an opaque buffer into a start record, ordered data records and
//! an end marker, each sized to fit one link notification, and parses the
//! same records on the receive side. The byte layout is a fixed wire
//! contract with no version field:
//!
//! ```text
//! Start: [0x01][chunk_count u16 BE][total_len u32 LE]
//! Data:  [0x02][chunk_index u16 BE][payload ≤ C bytes]
//! End:   [0x03][chunk_count u16 BE]
//! ```
//!
//! The codec itself is transfer-agnostic: reassembly state lives in the
//! host session.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{DATA_CHUNK_HEADER_LEN, END_MARKER_LEN, START_HEADER_LEN};
use crate::error::ProtocolError;

/// Start record marker byte
pub const MARKER_START: u8 = 0x01;
/// Data record marker byte
pub const MARKER_DATA: u8 = 0x02;
/// End record marker byte
pub const MARKER_END: u8 = 0x03;

/// Number of data chunks needed for `len` bytes at `max_payload` per chunk
pub fn required_chunks(len: usize, max_payload: usize) -> usize {
    len.div_ceil(max_payload)
}

/// One parsed transfer record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    Start { chunk_count: u16, total_len: u32 },
    Data { index: u16, payload: &'a [u8] },
    End { chunk_count: u16 },
}

impl<'a> Record<'a> {
    /// Parse one notification payload into a record
    ///
    /// All length and marker fields are range-checked; corrupted input is a
    /// [`ProtocolError`], never a panic.
    pub fn parse(buf: &'a [u8]) -> Result<Self, ProtocolError> {
        let marker = *buf.first().ok_or(ProtocolError::Truncated(0))?;
        match marker {
            MARKER_START => {
                if buf.len() < START_HEADER_LEN {
                    return Err(ProtocolError::Truncated(buf.len()));
                }
                let chunk_count = u16::from_be_bytes([buf[1], buf[2]]);
                let total_len = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);
                Ok(Record::Start {
                    chunk_count,
                    total_len,
                })
            }
            MARKER_DATA => {
                if buf.len() < DATA_CHUNK_HEADER_LEN {
                    return Err(ProtocolError::Truncated(buf.len()));
                }
                let index = u16::from_be_bytes([buf[1], buf[2]]);
                Ok(Record::Data {
                    index,
                    payload: &buf[DATA_CHUNK_HEADER_LEN..],
                })
            }
            MARKER_END => {
                if buf.len() < END_MARKER_LEN {
                    return Err(ProtocolError::Truncated(buf.len()));
                }
                let chunk_count = u16::from_be_bytes([buf[1], buf[2]]);
                Ok(Record::End { chunk_count })
            }
            other => Err(ProtocolError::UnknownMarker(other)),
        }
    }
}

/// Iterator producing the full record sequence for one buffer
///
/// Yields the start record, `ceil(len / max_payload)` data records in strict
/// ascending index order, then the end marker. Records are emitted lazily so
/// the device side never holds more than one in memory.
#[derive(Debug)]
pub struct ChunkEncoder<'a> {
    data: &'a [u8],
    max_payload: usize,
    chunk_count: u16,
    position: Position,
}

#[derive(Debug)]
enum Position {
    Start,
    Data(u16),
    End,
    Done,
}

impl<'a> ChunkEncoder<'a> {
    /// Prepare a buffer for transmission
    ///
    /// Fails with [`ProtocolError::TooLarge`] if the buffer would need more
    /// than 65535 chunks or its length does not fit the 32-bit total-length
    /// field; no records are emitted in that case.
    pub fn new(data: &'a [u8], max_payload: usize) -> Result<Self, ProtocolError> {
        if max_payload == 0 {
            return Err(ProtocolError::InvalidPayloadLimit(max_payload));
        }
        let required = required_chunks(data.len(), max_payload);
        if required > u16::MAX as usize || u32::try_from(data.len()).is_err() {
            return Err(ProtocolError::TooLarge {
                len: data.len(),
                required,
            });
        }
        Ok(Self {
            data,
            max_payload,
            chunk_count: required as u16,
            position: Position::Start,
        })
    }

    /// Total number of data records this encoder will emit
    pub fn chunk_count(&self) -> u16 {
        self.chunk_count
    }

    /// Declared total length of the buffer
    pub fn total_len(&self) -> u32 {
        self.data.len() as u32
    }

    fn start_record(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(START_HEADER_LEN);
        buf.put_u8(MARKER_START);
        buf.put_u16(self.chunk_count);
        buf.put_u32_le(self.total_len());
        buf.freeze()
    }

    fn data_record(&self, index: u16) -> Bytes {
        let offset = index as usize * self.max_payload;
        let end = (offset + self.max_payload).min(self.data.len());
        let mut buf = BytesMut::with_capacity(DATA_CHUNK_HEADER_LEN + (end - offset));
        buf.put_u8(MARKER_DATA);
        buf.put_u16(index);
        buf.put_slice(&self.data[offset..end]);
        buf.freeze()
    }

    fn end_record(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(END_MARKER_LEN);
        buf.put_u8(MARKER_END);
        buf.put_u16(self.chunk_count);
        buf.freeze()
    }
}

impl Iterator for ChunkEncoder<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        match self.position {
            Position::Start => {
                self.position = if self.chunk_count == 0 {
                    Position::End
                } else {
                    Position::Data(0)
                };
                Some(self.start_record())
            }
            Position::Data(index) => {
                self.position = if index + 1 < self.chunk_count {
                    Position::Data(index + 1)
                } else {
                    Position::End
                };
                Some(self.data_record(index))
            }
            Position::End => {
                self.position = Position::Done;
                Some(self.end_record())
            }
            Position::Done => None,
        }
    }
}
