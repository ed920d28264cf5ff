//! Distributed tree merge.
//!
//! Logarithmic-depth binary reduction: each round halves the active ranks.
//! A rank is active in round `step` iff `rank % step == 0`; of the active
//! pair `(r, r + step)`, the lower receives and merges, the upper ships its
//! run and goes idle. Idle ranks still hit the round barrier: the global
//! barrier is the fabric's synchronization primitive and every rank must
//! participate until termination.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};

use crate::fabric::{transport, Fabric};
use crate::merge;
use crate::scratch::ScratchDir;

/// What a rank does in one reduction round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Receive the partner's run and merge it with the held one.
    Receive { partner: usize },
    /// Ship the held run to the partner and go idle.
    Send { partner: usize },
    /// Nothing this round (already idle, or no partner in range).
    Idle,
}

pub fn round_role(rank: usize, step: usize, world: usize) -> Role {
    if rank % (2 * step) == 0 {
        let partner = rank + step;
        if partner < world {
            Role::Receive { partner }
        } else {
            Role::Idle
        }
    } else if rank % (2 * step) == step {
        Role::Send {
            partner: rank - step,
        }
    } else {
        Role::Idle
    }
}

/// Reduce per-rank runs to a single sorted file at `output` on rank 0.
///
/// Consumes `local_run`; every intermediate file lives in `scratch` and is
/// deleted as soon as it is merged or shipped. Each run crosses the network
/// at most once.
pub(crate) fn tree_merge(
    fabric: &Fabric,
    scratch: &mut ScratchDir,
    local_run: PathBuf,
    output: &Path,
    chunk_bytes: usize,
) -> anyhow::Result<()> {
    let world = fabric.size();
    let rank = fabric.rank();
    let mut current = local_run;

    let mut step = 1;
    while step < world {
        match round_role(rank, step, world) {
            Role::Receive { partner } => {
                let received = scratch.next_run_path();
                let mut writer = BufWriter::new(
                    File::create(&received)
                        .with_context(|| format!("creating {}", received.display()))?,
                );
                let received_bytes = transport::recv_file(fabric, partner, &mut writer, chunk_bytes)?;
                writer.flush()?;
                drop(writer);
                debug!("rank {rank}: received {received_bytes} bytes from rank {partner} (step {step})");

                let merged = scratch.next_run_path();
                merge::merge_runs(&[current.clone(), received.clone()], &merged)?;
                std::fs::remove_file(&current)
                    .with_context(|| format!("removing {}", current.display()))?;
                std::fs::remove_file(&received)
                    .with_context(|| format!("removing {}", received.display()))?;
                current = merged;
            }
            Role::Send { partner } => {
                transport::send_file(fabric, &current, partner, chunk_bytes)?;
                std::fs::remove_file(&current)
                    .with_context(|| format!("removing {}", current.display()))?;
            }
            Role::Idle => {}
        }
        fabric.barrier();
        step *= 2;
    }

    if rank == 0 {
        finalize(&current, output)?;
        info!("rank 0: final sorted file at {}", output.display());
    }
    Ok(())
}

/// Move the held run to the caller's output path. Rename where possible,
/// copy-and-remove across filesystems.
fn finalize(current: &Path, output: &Path) -> anyhow::Result<()> {
    if std::fs::rename(current, output).is_ok() {
        return Ok(());
    }
    std::fs::copy(current, output)
        .with_context(|| format!("copying {} to {}", current.display(), output.display()))?;
    std::fs::remove_file(current)
        .with_context(|| format!("removing {}", current.display()))?;
    Ok(())
}
