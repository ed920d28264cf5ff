//! Partition planning.
//!
//! Maps record indices to ranks and record indices to byte ranges. The
//! arithmetic is fabric-free so it can be computed identically on the
//! coordinator (scatter path) and on every peer (broadcast path).

use crate::scan::BoundaryTable;

/// Sentinel meaning "to end of file". Also marks an empty tail slice when a
/// rank's record range starts past the last record.
pub const EOF_SENTINEL: u64 = u64::MAX;

/// Record count above which the coordinator scatters per-rank byte ranges
/// instead of broadcasting the whole boundary table.
pub const SCATTER_THRESHOLD: u64 = 100_000_000;

/// Half-open byte range `[start, end)`, record-aligned at both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn runs_to_eof(&self) -> bool {
        self.end == EOF_SENTINEL
    }
}

/// How boundary metadata reaches the peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dissemination {
    /// Ship the full offset vector to every rank; each computes its slice.
    Broadcast,
    /// Ship exactly one `(start, end)` pair per rank; peers never hold the
    /// full table.
    Scatter,
}

pub fn choose_dissemination(
    total_records: u64,
    forced: Option<Dissemination>,
    scatter_threshold: u64,
) -> Dissemination {
    forced.unwrap_or(if total_records > scatter_threshold {
        Dissemination::Scatter
    } else {
        Dissemination::Broadcast
    })
}

/// Half-open record index range `[start, end)` assigned to `rank`.
///
/// The first `total % world` ranks take one extra record, so slice sizes
/// differ by at most one.
pub fn record_range(rank: usize, world: usize, total: u64) -> (u64, u64) {
    debug_assert!(world > 0 && rank < world);
    let base = total / world as u64;
    let extra = total % world as u64;
    let rank = rank as u64;
    let start = rank * base + rank.min(extra);
    let end = start + base + u64::from(rank < extra);
    (start, end)
}

/// Byte range for `rank` given the full offset vector. An endpoint past the
/// last record becomes `EOF_SENTINEL`.
pub fn byte_range(offsets: &[u64], rank: usize, world: usize) -> ByteRange {
    let (start_record, end_record) = record_range(rank, world, offsets.len() as u64);
    ByteRange {
        start: offsets
            .get(start_record as usize)
            .copied()
            .unwrap_or(EOF_SENTINEL),
        end: offsets
            .get(end_record as usize)
            .copied()
            .unwrap_or(EOF_SENTINEL),
    }
}

/// Flattened `[start_0, end_0, start_1, end_1, ..]` scatter payload, one pair
/// per rank. Coordinator-only: this is the scatter path's entire wire format.
pub fn rank_byte_ranges(table: &BoundaryTable, world: usize) -> Vec<u64> {
    let mut flat = Vec::with_capacity(world * 2);
    for rank in 0..world {
        let range = byte_range(&table.offsets, rank, world);
        flat.push(range.start);
        flat.push(range.end);
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        assert_eq!(record_range(0, 4, 8), (0, 2));
        assert_eq!(record_range(1, 4, 8), (2, 4));
        assert_eq!(record_range(3, 4, 8), (6, 8));
    }

    #[test]
    fn remainder_goes_to_leading_ranks() {
        // 10 records over 4 ranks: 3, 3, 2, 2.
        assert_eq!(record_range(0, 4, 10), (0, 3));
        assert_eq!(record_range(1, 4, 10), (3, 6));
        assert_eq!(record_range(2, 4, 10), (6, 8));
        assert_eq!(record_range(3, 4, 10), (8, 10));
    }

    #[test]
    fn more_ranks_than_records() {
        assert_eq!(record_range(0, 4, 2), (0, 1));
        assert_eq!(record_range(1, 4, 2), (1, 2));
        assert_eq!(record_range(2, 4, 2), (2, 2));
        assert_eq!(record_range(3, 4, 2), (2, 2));
    }

    #[test]
    fn single_rank_takes_everything() {
        assert_eq!(record_range(0, 1, 7), (0, 7));
    }

    #[test]
    fn byte_ranges_cover_file_without_overlap() {
        let offsets = vec![0, 20, 132, 152, 300];
        let ranges: Vec<ByteRange> = (0..3).map(|r| byte_range(&offsets, r, 3)).collect();
        assert_eq!(ranges[0], ByteRange { start: 0, end: 132 });
        assert_eq!(
            ranges[1],
            ByteRange {
                start: 132,
                end: 300
            }
        );
        assert_eq!(
            ranges[2],
            ByteRange {
                start: 300,
                end: EOF_SENTINEL
            }
        );
    }

    #[test]
    fn empty_tail_slices_use_sentinel() {
        let offsets = vec![0, 20];
        let range = byte_range(&offsets, 3, 4);
        assert_eq!(range.start, EOF_SENTINEL);
        assert_eq!(range.end, EOF_SENTINEL);
    }

    #[test]
    fn empty_table_gives_every_rank_nothing() {
        for rank in 0..4 {
            let range = byte_range(&[], rank, 4);
            assert_eq!(range.start, EOF_SENTINEL);
        }
    }

    #[test]
    fn dissemination_switches_on_threshold() {
        assert_eq!(
            choose_dissemination(100, None, SCATTER_THRESHOLD),
            Dissemination::Broadcast
        );
        assert_eq!(
            choose_dissemination(SCATTER_THRESHOLD + 1, None, SCATTER_THRESHOLD),
            Dissemination::Scatter
        );
        assert_eq!(
            choose_dissemination(100, Some(Dissemination::Scatter), SCATTER_THRESHOLD),
            Dissemination::Scatter
        );
    }

    #[test]
    fn scatter_payload_matches_broadcast_math() {
        let table = BoundaryTable {
            offsets: vec![0, 20, 132, 152, 300],
            file_len: 400,
        };
        let flat = rank_byte_ranges(&table, 2);
        assert_eq!(flat, vec![0, 152, 152, EOF_SENTINEL]);
    }
}
