//! On-disk record format.
//!
//! A record file is a bare concatenation of records with no framing, index,
//! or trailer:
//!
//! ```text
//! [key u64][len u32][payload; len bytes]
//! ```
//!
//! Header fields are packed, host byte order. `len` must lie in
//! `[PAYLOAD_MIN, PAYLOAD_MAX]`; anything else marks the stream corrupt from
//! that point on. Record boundaries are only discoverable by walking from
//! offset 0.

use std::io::{Read, Write};

use bytes::Bytes;

pub const PAYLOAD_MIN: u32 = 8;
pub const PAYLOAD_MAX: u32 = 4096;

/// key (8) + len (4), no padding.
pub const HEADER_SIZE: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid payload length {len}")]
    CorruptLen { len: u32 },

    #[error("truncated record header")]
    TruncatedHeader,

    #[error("truncated payload: expected {expected} bytes, got {got}")]
    TruncatedPayload { expected: u32, got: usize },
}

/// A record that owns its payload. Used by streaming readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRecord {
    pub key: u64,
    pub payload: Bytes,
}

impl OwnedRecord {
    pub fn encoded_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.payload.len() as u64
    }
}

/// A record view borrowing its payload from a mapped buffer.
///
/// Compared by `key` alone. Must not outlive the mapping it points into.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    pub key: u64,
    pub payload: &'a [u8],
}

/// Decode the header starting at `offset` of `buf`, or `None` if fewer than
/// `HEADER_SIZE` bytes remain. Uses copies rather than pointer casts: records
/// are unaligned within the file.
pub fn header_at(buf: &[u8], offset: usize) -> Option<(u64, u32)> {
    let end = offset.checked_add(HEADER_SIZE)?;
    if end > buf.len() {
        return None;
    }
    let key = u64::from_ne_bytes(buf[offset..offset + 8].try_into().unwrap());
    let len = u32::from_ne_bytes(buf[offset + 8..end].try_into().unwrap());
    Some((key, len))
}

pub fn valid_len(len: u32) -> bool {
    (PAYLOAD_MIN..=PAYLOAD_MAX).contains(&len)
}

/// Read one header from the stream. `Ok(None)` on clean EOF (no bytes read);
/// a partial header is `TruncatedHeader`, an out-of-range `len` is
/// `CorruptLen`.
pub(crate) fn read_header(reader: &mut impl Read) -> Result<Option<(u64, u32)>, RecordError> {
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RecordError::TruncatedHeader);
        }
        filled += n;
    }
    let key = u64::from_ne_bytes(header[0..8].try_into().unwrap());
    let len = u32::from_ne_bytes(header[8..HEADER_SIZE].try_into().unwrap());
    if !valid_len(len) {
        return Err(RecordError::CorruptLen { len });
    }
    Ok(Some((key, len)))
}

/// Read the next record from the stream, or `Ok(None)` at clean EOF.
pub fn read_record(reader: &mut impl Read) -> Result<Option<OwnedRecord>, RecordError> {
    let (key, len) = match read_header(reader)? {
        None => return Ok(None),
        Some(header) => header,
    };
    let mut payload = vec![0u8; len as usize];
    let mut filled = 0;
    while filled < payload.len() {
        let n = reader.read(&mut payload[filled..])?;
        if n == 0 {
            return Err(RecordError::TruncatedPayload {
                expected: len,
                got: filled,
            });
        }
        filled += n;
    }
    Ok(Some(OwnedRecord {
        key,
        payload: Bytes::from(payload),
    }))
}

/// Emit the 12-byte header followed by the payload verbatim. Callers choose
/// the buffering policy.
pub fn write_record(writer: &mut impl Write, key: u64, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(&key.to_ne_bytes())?;
    writer.write_all(&(payload.len() as u32).to_ne_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}
