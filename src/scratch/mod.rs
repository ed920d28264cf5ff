//! Per-rank scratch directory lifecycle.
//!
//! Every process owns one scratch directory for its intermediate runs. Run
//! names carry both the rank and a monotone counter, so two ranks pointed at
//! the same base directory can never collide. The whole tree is removed on
//! drop; cleanup failures are logged, never propagated.

use std::path::{Path, PathBuf};

use log::warn;

#[derive(Debug)]
pub struct ScratchDir {
    dir: PathBuf,
    rank: usize,
    counter: u64,
}

impl ScratchDir {
    /// Create `<base>/runsort_tmp_<rank>`. Base resolution: explicit argument,
    /// else `TMPDIR`, else the current working directory.
    pub fn create(base: Option<&Path>, rank: usize) -> std::io::Result<Self> {
        let base = match base {
            Some(base) => base.to_path_buf(),
            None => std::env::var_os("TMPDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        let dir = base.join(format!("runsort_tmp_{rank}"));
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            rank,
            counter: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Next unique run path for this rank.
    pub fn next_run_path(&mut self) -> PathBuf {
        let id = self.counter;
        self.counter += 1;
        self.dir.join(format!("run_{}_{id}.tmp", self.rank))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.dir) {
            warn!(
                "rank {}: failed to clean scratch {}: {err}",
                self.rank,
                self.dir.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_names_are_unique_and_rank_tagged() {
        let base = tempfile::TempDir::new().unwrap();
        let mut scratch = ScratchDir::create(Some(base.path()), 3).unwrap();
        let first = scratch.next_run_path();
        let second = scratch.next_run_path();
        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_str().unwrap().contains("3_0"));
        assert!(scratch.path().ends_with("runsort_tmp_3"));
    }

    #[test]
    fn drop_removes_tree() {
        let base = tempfile::TempDir::new().unwrap();
        let dir;
        {
            let mut scratch = ScratchDir::create(Some(base.path()), 0).unwrap();
            let run = scratch.next_run_path();
            std::fs::write(&run, b"data").unwrap();
            dir = scratch.path().to_path_buf();
            assert!(dir.exists());
        }
        assert!(!dir.exists());
    }
}
