use std::path::PathBuf;

use clap::Parser;
use log::info;

use runsort::{Fabric, SortEngine, SortOptions};

#[derive(Debug, Parser)]
#[command(name = "runsort")]
#[command(about = "Distributed external merge sort over keyed binary records", long_about = None)]
struct Args {
    /// Input record file, visible to every rank over a shared filesystem.
    input: PathBuf,
    /// Destination for the globally sorted file, written by rank 0.
    output: PathBuf,
    /// Worker threads per process; derived from the world size when omitted.
    threads: Option<usize>,
    /// Scratch base directory; defaults to TMPDIR, then the working
    /// directory.
    #[arg(long)]
    tmpdir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Usage failures must exit 1; clap's default error path exits 2. Help
    // and version requests still exit 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            err.print()?;
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    let fabric = Fabric::init()?;
    if fabric.is_coordinator() {
        info!(
            "world size {}, input {}, output {}",
            fabric.size(),
            args.input.display(),
            args.output.display()
        );
    }

    let options = SortOptions {
        tmpdir: args.tmpdir,
        threads: args.threads,
        ..Default::default()
    };
    let mut engine = SortEngine::new(fabric, options)?;
    engine.run(&args.input, &args.output)
}
