//! K-way merge of sorted record runs.
//!
//! A min-heap holds the front record of every input stream, keyed on
//! `(key, stream index)`. The stream index only breaks ties deterministically
//! within one merge; the pipeline as a whole makes no stability promise
//! across equal keys.
//!
//! Used both for the two-way merges inside the distributed reduction and for
//! arbitrary fan-in within a process.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::record::{self, OwnedRecord};

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot open run {path}: {source}")]
    OpenRun {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create merge output {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("io error during merge: {0}")]
    Io(#[from] std::io::Error),
}

struct RunStream {
    reader: BufReader<File>,
    path: PathBuf,
}

impl RunStream {
    fn open(path: &Path) -> Result<Self, MergeError> {
        let file = File::open(path).map_err(|source| MergeError::OpenRun {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Next record, or `None` at end of stream. A corrupt record retires the
    /// stream with a warning, mirroring the codec's truncation policy.
    fn next(&mut self) -> Option<OwnedRecord> {
        match record::read_record(&mut self.reader) {
            Ok(next) => next,
            Err(err) => {
                warn!(
                    "merge: corrupt record in {}, retiring stream: {err}",
                    self.path.display()
                );
                None
            }
        }
    }
}

/// Merge the sorted runs at `inputs` into a single sorted run at `out`.
/// Returns the number of bytes written.
///
/// Degenerate cases: no inputs produce an empty output file; a single input
/// is copied as-is.
pub fn merge_runs(inputs: &[PathBuf], out: &Path) -> Result<u64, MergeError> {
    match inputs {
        [] => {
            File::create(out).map_err(|source| MergeError::CreateOutput {
                path: out.to_path_buf(),
                source,
            })?;
            return Ok(0);
        }
        [only] => {
            let bytes = std::fs::copy(only, out).map_err(|source| MergeError::CreateOutput {
                path: out.to_path_buf(),
                source,
            })?;
            return Ok(bytes);
        }
        _ => {}
    }

    let mut streams = Vec::with_capacity(inputs.len());
    for path in inputs {
        streams.push(RunStream::open(path)?);
    }

    let out_file = File::create(out).map_err(|source| MergeError::CreateOutput {
        path: out.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(out_file);

    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::with_capacity(streams.len());
    for (stream, source) in streams.iter_mut().enumerate() {
        if let Some(rec) = source.next() {
            heap.push(Reverse(HeapEntry { rec, stream }));
        }
    }

    let mut bytes = 0u64;
    while let Some(Reverse(entry)) = heap.pop() {
        record::write_record(&mut writer, entry.rec.key, &entry.rec.payload)?;
        bytes += entry.rec.encoded_len();
        if let Some(rec) = streams[entry.stream].next() {
            heap.push(Reverse(HeapEntry {
                rec,
                stream: entry.stream,
            }));
        }
    }
    writer.flush()?;
    Ok(bytes)
}

/// Front record of one stream, ordered by `(key, stream index)`.
struct HeapEntry {
    rec: OwnedRecord,
    stream: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.rec.key == other.rec.key && self.stream == other.stream
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.rec.key, self.stream).cmp(&(other.rec.key, other.stream))
    }
}
