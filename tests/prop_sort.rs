//! Property tests: for arbitrary record sets and world sizes, the pipeline
//! output is a sorted permutation of the input with the same byte length.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use runsort::merge;
use runsort::plan;
use runsort::record;
use runsort::scan;
use runsort::sorter::{self, SortTuning};
use tempfile::TempDir;

fn record_set() -> impl Strategy<Value = Vec<(u64, Vec<u8>)>> {
    proptest::collection::vec(
        (any::<u64>(), proptest::collection::vec(any::<u8>(), 8..64)),
        0..120,
    )
}

fn sort_via_slices(input: &Path, output: &Path, world: usize, dir: &TempDir) {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(2)
        .build()
        .expect("pool");
    let table = scan::scan_boundaries(input).expect("scan");
    let mut runs: Vec<PathBuf> = Vec::new();
    for rank in 0..world {
        let run = dir.path().join(format!("run_{rank}.tmp"));
        sorter::sort_slice(
            input,
            plan::byte_range(&table.offsets, rank, world),
            &run,
            &pool,
            SortTuning {
                parallel_threshold: 16,
                sequential_cutoff: 8,
            },
        )
        .expect("sort slice");
        runs.push(run);
    }
    merge::merge_runs(&runs, output).expect("merge");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn output_is_sorted_permutation(records in record_set(), world in 1usize..5) {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("input.bin");
        let output = dir.path().join("sorted.bin");

        let mut buf = Vec::new();
        for (key, payload) in &records {
            record::write_record(&mut buf, *key, payload).expect("encode");
        }
        std::fs::write(&input, &buf).expect("write input");

        sort_via_slices(&input, &output, world, &dir);

        let mut reader = BufReader::new(File::open(&output).expect("open output"));
        let mut got = Vec::new();
        while let Some(rec) = record::read_record(&mut reader).expect("decode") {
            got.push((rec.key, rec.payload.to_vec()));
        }

        prop_assert!(got.windows(2).all(|pair| pair[0].0 <= pair[1].0));
        prop_assert_eq!(
            std::fs::metadata(&output).expect("stat").len(),
            buf.len() as u64
        );

        let mut want = records.clone();
        want.sort();
        let mut got_sorted = got;
        got_sorted.sort();
        prop_assert_eq!(want, got_sorted);
    }
}
