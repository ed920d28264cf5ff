use std::path::PathBuf;

use crate::fabric::transport::MAX_CHUNK_BYTES;
use crate::plan::{Dissemination, SCATTER_THRESHOLD};

/// Thread affinity hints for the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    /// Export `close` binding / `cores` placement hints unless the
    /// environment already sets them.
    #[default]
    CloseCores,
    None,
}

#[derive(Debug, Clone)]
pub struct SortOptions {
    /// Scratch base directory; `TMPDIR` then the working directory when
    /// unset.
    pub tmpdir: Option<PathBuf>,
    /// Worker threads per process; derived from the world size when unset
    /// (more ranks, fewer threads, to avoid oversubscription).
    pub threads: Option<usize>,
    pub affinity: Affinity,
    /// Boundary dissemination policy; `None` picks by record count against
    /// `scatter_threshold`.
    pub dissemination: Option<Dissemination>,
    pub scatter_threshold: u64,
    /// Per-chunk buffer for bulk file transfers.
    pub transport_chunk_bytes: usize,
    /// Record count above which the local index sort goes parallel.
    pub parallel_sort_threshold: usize,
    /// Sub-range floor below which parallel sort tasks run sequentially.
    pub sequential_cutoff: usize,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            tmpdir: None,
            threads: None,
            affinity: Affinity::default(),
            dissemination: None,
            scatter_threshold: SCATTER_THRESHOLD,
            transport_chunk_bytes: MAX_CHUNK_BYTES,
            parallel_sort_threshold: 1_000,
            sequential_cutoff: 10_000,
        }
    }
}

impl SortOptions {
    /// Pool size when `threads` is unset: 2 for worlds of 8+, 3 for 4..8,
    /// otherwise 4.
    pub fn threads_for_world(&self, world: usize) -> usize {
        self.threads.unwrap_or(match world {
            w if w >= 8 => 2,
            w if w >= 4 => 3,
            _ => 4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_shrinks_with_world() {
        let options = SortOptions::default();
        assert_eq!(options.threads_for_world(1), 4);
        assert_eq!(options.threads_for_world(4), 3);
        assert_eq!(options.threads_for_world(8), 2);
        assert_eq!(options.threads_for_world(64), 2);
    }

    #[test]
    fn explicit_threads_win() {
        let options = SortOptions {
            threads: Some(16),
            ..Default::default()
        };
        assert_eq!(options.threads_for_world(64), 16);
    }
}
