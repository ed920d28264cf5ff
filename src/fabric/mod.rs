//! Message-passing fabric.
//!
//! Thin wrapper over the MPI world communicator. The runtime is initialized
//! at the funneled threading level: worker threads never touch the fabric,
//! every call here is issued from the main thread of each process.

pub mod transport;

use log::debug;
use mpi::environment::Universe;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;
use mpi::Threading;

#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    #[error("message-passing runtime failed to initialize (already initialized?)")]
    Init,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Fabric {
    world: SystemCommunicator,
    // Dropping the universe finalizes the runtime; keep it alive for the
    // whole job.
    _universe: Universe,
}

impl Fabric {
    pub fn init() -> Result<Self, FabricError> {
        let (universe, granted) =
            mpi::initialize_with_threading(Threading::Funneled).ok_or(FabricError::Init)?;
        debug!("fabric initialized, granted threading level {granted:?}");
        let world = universe.world();
        Ok(Self {
            world,
            _universe: universe,
        })
    }

    pub fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    pub fn size(&self) -> usize {
        self.world.size() as usize
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    pub fn barrier(&self) {
        self.world.barrier();
    }

    /// Abort the whole communicator. Terminates the job across every rank.
    pub fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }

    pub fn broadcast_u64(&self, root: usize, value: &mut u64) {
        self.world
            .process_at_rank(root as i32)
            .broadcast_into(value);
    }

    pub fn broadcast_u64s(&self, root: usize, values: &mut [u64]) {
        self.world
            .process_at_rank(root as i32)
            .broadcast_into(values);
    }

    /// Scatter one `[start, end)` pair to every rank. On the root, `pairs`
    /// must hold `2 * world` values; peers pass `None`.
    pub fn scatter_u64_pair(&self, root: usize, pairs: Option<&[u64]>) -> [u64; 2] {
        let mut local = [0u64; 2];
        let root_process = self.world.process_at_rank(root as i32);
        match pairs {
            Some(pairs) if self.rank() == root => {
                root_process.scatter_into_root(pairs, &mut local[..]);
            }
            _ => {
                root_process.scatter_into(&mut local[..]);
            }
        }
        local
    }

    pub(crate) fn world(&self) -> &SystemCommunicator {
        &self.world
    }
}
