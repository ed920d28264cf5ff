//! Pipeline driver.
//!
//! One engine per process. Control flow per run: boundary scan (coordinator)
//! -> plan dissemination -> local slice sort -> barrier -> tree merge ->
//! final file at the coordinator's output path. A world of one degenerates
//! to a local sort followed by a move to the output path.

mod options;
pub mod tree;

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use log::{error, info};

use crate::fabric::Fabric;
use crate::plan::{self, ByteRange, Dissemination};
use crate::scan;
use crate::scratch::ScratchDir;
use crate::sorter::{self, SortTuning};

pub use options::{Affinity, SortOptions};
pub use tree::{round_role, Role};

pub struct SortEngine {
    fabric: Fabric,
    options: SortOptions,
    pool: rayon::ThreadPool,
    scratch: ScratchDir,
}

impl SortEngine {
    pub fn new(fabric: Fabric, options: SortOptions) -> anyhow::Result<Self> {
        if options.affinity == Affinity::CloseCores {
            apply_affinity_hints();
        }
        let threads = options.threads_for_world(fabric.size());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("building worker pool")?;
        let scratch = ScratchDir::create(options.tmpdir.as_deref(), fabric.rank())
            .context("creating scratch directory")?;
        info!(
            "rank {}: {} worker threads, scratch at {}",
            fabric.rank(),
            threads,
            scratch.path().display()
        );
        Ok(Self {
            fabric,
            options,
            pool,
            scratch,
        })
    }

    /// Run the full pipeline. Any fatal error aborts the whole communicator;
    /// per-record corruption only ever truncates the affected stream.
    pub fn run(&mut self, input: &Path, output: &Path) -> anyhow::Result<()> {
        match self.execute(input, output) {
            Ok(()) => {
                self.fabric.barrier();
                Ok(())
            }
            Err(err) => {
                error!("rank {}: fatal: {err:#}", self.fabric.rank());
                self.fabric.abort(1)
            }
        }
    }

    fn execute(&mut self, input: &Path, output: &Path) -> anyhow::Result<()> {
        let rank = self.fabric.rank();
        let started = Instant::now();

        let range = self.partition(input)?;
        info!(
            "rank {rank}: slice bytes {}..{}",
            range.start,
            if range.runs_to_eof() {
                "eof".to_string()
            } else {
                range.end.to_string()
            }
        );

        let sort_started = Instant::now();
        let run = self.scratch.next_run_path();
        let tuning = SortTuning {
            parallel_threshold: self.options.parallel_sort_threshold,
            sequential_cutoff: self.options.sequential_cutoff,
        };
        let stats = sorter::sort_slice(input, range, &run, &self.pool, tuning)?;
        info!(
            "rank {rank}: sorted {} records ({} bytes) in {:.2?}",
            stats.records,
            stats.bytes,
            sort_started.elapsed()
        );
        self.fabric.barrier();

        tree::tree_merge(
            &self.fabric,
            &mut self.scratch,
            run,
            output,
            self.options.transport_chunk_bytes,
        )?;

        if self.fabric.is_coordinator() {
            info!(
                "sorted {} across {} ranks in {:.2?}",
                input.display(),
                self.fabric.size(),
                started.elapsed()
            );
        }
        Ok(())
    }

    /// Phases 1-3: boundary scan on the coordinator, then either broadcast
    /// the whole table or scatter one byte-range pair per rank.
    fn partition(&mut self, input: &Path) -> anyhow::Result<ByteRange> {
        let rank = self.fabric.rank();
        let world = self.fabric.size();

        let scan_started = Instant::now();
        let table = if rank == 0 {
            let table = scan::scan_boundaries(input)?;
            info!(
                "rank 0: found {} records in {:.2?}",
                table.total_records(),
                scan_started.elapsed()
            );
            Some(table)
        } else {
            None
        };

        let mut total = table.as_ref().map_or(0, |t| t.total_records());
        self.fabric.broadcast_u64(0, &mut total);

        let policy = plan::choose_dissemination(
            total,
            self.options.dissemination,
            self.options.scatter_threshold,
        );
        match policy {
            Dissemination::Broadcast => {
                let mut offsets = table.map(|t| t.offsets).unwrap_or_default();
                offsets.resize(total as usize, 0);
                self.fabric.broadcast_u64s(0, &mut offsets);
                Ok(plan::byte_range(&offsets, rank, world))
            }
            Dissemination::Scatter => {
                let flat = table.map(|t| plan::rank_byte_ranges(&t, world));
                let pair = self.fabric.scatter_u64_pair(0, flat.as_deref());
                Ok(ByteRange {
                    start: pair[0],
                    end: pair[1],
                })
            }
        }
    }
}

/// Export close-binding / core-placement hints for downstream thread
/// runtimes, but never override an operator's explicit choice.
fn apply_affinity_hints() {
    if std::env::var_os("OMP_PROC_BIND").is_none() {
        std::env::set_var("OMP_PROC_BIND", "close");
        std::env::set_var("OMP_PLACES", "cores");
    }
}
