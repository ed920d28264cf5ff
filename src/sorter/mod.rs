//! Local slice sorting over a memory-mapped input.
//!
//! The whole input is mapped read-only even though only a slice is consumed,
//! so payload pointers stay valid against absolute offsets. The sort itself
//! runs over an index of `{key, payload}` views and never copies payload
//! bytes; records are only copied once, when the sorted run is written out.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use memmap2::Mmap;

use crate::plan::ByteRange;
use crate::record::{self, RecordView, HEADER_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("cannot open input {path}: {source}")]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot map input {path}: {source}")]
    MapInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create run {path}: {source}")]
    CreateRun {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("io error writing run: {0}")]
    Io(#[from] std::io::Error),
}

/// Thresholds for the parallel index sort.
#[derive(Debug, Clone, Copy)]
pub struct SortTuning {
    /// Below this many records the sort stays sequential.
    pub parallel_threshold: usize,
    /// Sub-ranges at or below this size are handed to the sequential sort
    /// instead of being split further.
    pub sequential_cutoff: usize,
}

impl Default for SortTuning {
    fn default() -> Self {
        Self {
            parallel_threshold: 1_000,
            sequential_cutoff: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SliceStats {
    pub records: u64,
    pub bytes: u64,
}

/// Sort every record whose start offset lies in `range` into a run at
/// `out_path`.
///
/// A corrupt header inside the slice truncates the index with a warning; the
/// run is then a valid sorted prefix of the slice. Open, map, and create
/// failures are fatal to this rank.
pub fn sort_slice(
    input: &Path,
    range: ByteRange,
    out_path: &Path,
    pool: &rayon::ThreadPool,
    tuning: SortTuning,
) -> Result<SliceStats, SortError> {
    let file = File::open(input).map_err(|source| SortError::OpenInput {
        path: input.to_path_buf(),
        source,
    })?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| SortError::MapInput {
        path: input.to_path_buf(),
        source,
    })?;
    #[cfg(unix)]
    if let Err(err) = mmap.advise(memmap2::Advice::Sequential) {
        debug!("madvise(sequential) failed: {err}");
    }

    let file_len = mmap.len() as u64;
    let end = range.end.min(file_len);
    let mut index: Vec<RecordView<'_>> = Vec::new();
    let mut offset = range.start;
    let mut bytes = 0u64;
    while offset < end {
        let (key, len) = match record::header_at(&mmap, offset as usize) {
            Some(header) => header,
            None => {
                warn!("local sort: truncated header at offset {offset}, truncating slice");
                break;
            }
        };
        if !record::valid_len(len) {
            warn!("local sort: invalid payload length {len} at offset {offset}, truncating slice");
            break;
        }
        let payload_start = offset as usize + HEADER_SIZE;
        let payload_end = payload_start + len as usize;
        if payload_end as u64 > file_len {
            warn!("local sort: truncated payload at offset {offset}, truncating slice");
            break;
        }
        index.push(RecordView {
            key,
            payload: &mmap[payload_start..payload_end],
        });
        bytes += HEADER_SIZE as u64 + len as u64;
        offset = payload_end as u64;
    }

    if index.len() > tuning.parallel_threshold {
        pool.install(|| par_sort_views(&mut index, tuning.sequential_cutoff));
    } else {
        index.sort_unstable_by_key(|view| view.key);
    }

    let out = File::create(out_path).map_err(|source| SortError::CreateRun {
        path: out_path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(out);
    for view in &index {
        record::write_record(&mut writer, view.key, view.payload)?;
    }
    writer.flush()?;

    Ok(SliceStats {
        records: index.len() as u64,
        bytes,
    })
}

/// Parallel quicksort over record views: partition around a pivot, then sort
/// the two sub-ranges as independent tasks. Unless both sub-ranges exceed
/// `cutoff`, they are handed to the sequential sort instead, which also keeps
/// recursion shallow on skewed or duplicate-heavy inputs.
pub(crate) fn par_sort_views(views: &mut [RecordView<'_>], cutoff: usize) {
    if views.len() <= 1 {
        return;
    }
    let pivot = partition(views);
    let (low, rest) = views.split_at_mut(pivot);
    let high = &mut rest[1..];
    if low.len() > cutoff && high.len() > cutoff {
        rayon::join(
            || par_sort_views(low, cutoff),
            || par_sort_views(high, cutoff),
        );
    } else {
        low.sort_unstable_by_key(|view| view.key);
        high.sort_unstable_by_key(|view| view.key);
    }
}

/// Lomuto partition around the last element's key. Returns the pivot's final
/// index.
fn partition(views: &mut [RecordView<'_>]) -> usize {
    let last = views.len() - 1;
    let pivot = views[last].key;
    let mut boundary = 0;
    for probe in 0..last {
        if views[probe].key < pivot {
            views.swap(boundary, probe);
            boundary += 1;
        }
    }
    views.swap(boundary, last);
    boundary
}
