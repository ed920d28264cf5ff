//! Record boundary scanning.
//!
//! Runs only on the coordinator. One buffered pass over the input collects
//! the starting offset of every record; payload bytes are skipped, not read.
//! The resulting table is what partition planning slices, so both per-rank
//! endpoints are guaranteed to be record boundaries.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::warn;

use crate::record::{self, RecordError, HEADER_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot open input {path} for boundary scan: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("io error during boundary scan: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered record start offsets plus the input's byte length.
#[derive(Debug, Clone, Default)]
pub struct BoundaryTable {
    pub offsets: Vec<u64>,
    pub file_len: u64,
}

impl BoundaryTable {
    pub fn total_records(&self) -> u64 {
        self.offsets.len() as u64
    }
}

/// Walk the input from offset 0 recording every record boundary.
///
/// Termination: the cursor lands exactly on the file length (success), or an
/// invalid `len` / short header is hit, which truncates the table with a
/// warning. Per-record damage never fails the scan; only open/read errors do.
pub fn scan_boundaries(path: &Path) -> Result<BoundaryTable, ScanError> {
    let file = File::open(path).map_err(|source| ScanError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut offsets = Vec::new();
    let mut offset = 0u64;
    while offset < file_len {
        let len = match record::read_header(&mut reader) {
            Ok(Some((_, len))) => len,
            Ok(None) => break,
            Err(RecordError::CorruptLen { len }) => {
                warn!("boundary scan: invalid payload length {len} at offset {offset}, truncating");
                break;
            }
            Err(RecordError::TruncatedHeader) => {
                warn!("boundary scan: truncated header at offset {offset}, truncating");
                break;
            }
            Err(RecordError::Io(err)) => return Err(err.into()),
            Err(err) => {
                warn!("boundary scan: {err} at offset {offset}, truncating");
                break;
            }
        };
        let next = offset + HEADER_SIZE as u64 + len as u64;
        if next > file_len {
            warn!("boundary scan: truncated payload at offset {offset}, truncating");
            break;
        }
        offsets.push(offset);
        reader.seek_relative(len as i64)?;
        offset = next;
    }

    Ok(BoundaryTable { offsets, file_len })
}
