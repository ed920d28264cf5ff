//! Operator tooling for record files: generation, verification, inspection.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use runsort::record::{self, HEADER_SIZE, PAYLOAD_MAX, PAYLOAD_MIN};

#[derive(Debug, Parser)]
#[command(name = "rectool")]
#[command(about = "Record file helper tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a record file with uniform random keys.
    Generate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        records: u64,
        /// Fixed payload length; random in [8, 4096] when omitted.
        #[arg(long)]
        payload: Option<u32>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Check that a file is a valid record stream in non-decreasing key
    /// order.
    Verify {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print record count, byte totals, and key/payload ranges.
    Stat {
        #[arg(long)]
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate {
            out,
            records,
            payload,
            seed,
        } => generate(&out, records, payload, seed),
        Command::Verify { file } => verify(&file),
        Command::Stat { file } => stat(&file),
    }
}

fn generate(out: &Path, records: u64, payload: Option<u32>, seed: u64) -> anyhow::Result<()> {
    if let Some(len) = payload {
        if !record::valid_len(len) {
            bail!("payload length must be between {PAYLOAD_MIN} and {PAYLOAD_MAX}, got {len}");
        }
    }

    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    let mut writer = BufWriter::new(file);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = vec![0u8; PAYLOAD_MAX as usize];
    for _ in 0..records {
        let key: u64 = rng.gen();
        let len = payload.unwrap_or_else(|| rng.gen_range(PAYLOAD_MIN..=PAYLOAD_MAX)) as usize;
        rng.fill_bytes(&mut buf[..len]);
        record::write_record(&mut writer, key, &buf[..len])?;
    }
    writer.flush()?;

    match payload {
        Some(len) => println!("generated {records} records with {len}B payloads"),
        None => println!("generated {records} records with random-sized payloads"),
    }
    Ok(())
}

fn verify(path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut count = 0u64;
    let mut prev_key = None;
    loop {
        let rec = record::read_record(&mut reader)
            .with_context(|| format!("record {count} is invalid"))?;
        let rec = match rec {
            Some(rec) => rec,
            None => break,
        };
        if let Some(prev) = prev_key {
            if rec.key < prev {
                bail!(
                    "sort order violation at record {count}: previous key {prev}, current key {}",
                    rec.key
                );
            }
        }
        prev_key = Some(rec.key);
        count += 1;
    }

    println!("{count} records verified, all in non-decreasing key order");
    Ok(())
}

fn stat(path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut count = 0u64;
    let mut bytes = 0u64;
    let mut min_key = u64::MAX;
    let mut max_key = 0u64;
    let mut min_len = u32::MAX;
    let mut max_len = 0u32;
    while let Some(rec) = record::read_record(&mut reader)? {
        let len = rec.payload.len() as u32;
        count += 1;
        bytes += HEADER_SIZE as u64 + len as u64;
        min_key = min_key.min(rec.key);
        max_key = max_key.max(rec.key);
        min_len = min_len.min(len);
        max_len = max_len.max(len);
    }

    if count == 0 {
        println!("empty record file");
        return Ok(());
    }
    println!("records:  {count}");
    println!("bytes:    {bytes}");
    println!("keys:     {min_key}..={max_key}");
    println!(
        "payloads: {min_len}..={max_len} bytes (mean {:.1})",
        (bytes - count * HEADER_SIZE as u64) as f64 / count as f64
    );
    Ok(())
}
