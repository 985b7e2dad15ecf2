//! Batch open -> save round trip over a directory of Office packages.
//!
//! Every `.docx`, `.xlsx` and `.pptx` file under the input directory is opened and saved
//! unchanged into the output directory. Packages are processed in parallel, one package per
//! worker.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example roundtrip -- --input corpus/ --output out/ --workers 8
//! RUST_LOG=opc_engine=debug cargo run --example roundtrip -- -i corpus/ -o out/ --strict
//! ```

use clap::Parser;
use opc_engine::ooxml::opc::{OpcPackage, OpenOptions, PartFactory};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXTENSIONS: [&str; 3] = ["docx", "xlsx", "pptx"];

/// Open and re-save Office packages
#[derive(Parser, Debug)]
#[command(name = "roundtrip", version)]
struct Args {
    /// Directory searched for packages
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// Directory the saved copies are written to
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Worker threads (0 uses one per CPU)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Fail packages with dangling relationships or parts without a content type
    #[arg(long)]
    strict: bool,
}

fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Collect package files below `dir`, sorted for stable output.
fn collect_packages(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn roundtrip(input: &Path, output: &Path, factory: &PartFactory, options: &OpenOptions) -> opc_engine::Result<usize> {
    let mut pkg = OpcPackage::open_with(input, factory, options)?;
    pkg.save_to_file(output)?;
    Ok(pkg.part_count())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers)
        .build_global()?;
    fs::create_dir_all(&args.output)?;

    let packages = collect_packages(&args.input)?;
    let factory = PartFactory::with_defaults();
    let options = OpenOptions::new().with_strict(args.strict);

    let ok = packages
        .par_iter()
        .filter(|input| {
            let relative = input.strip_prefix(&args.input).unwrap_or(input.as_path());
            let output = args.output.join(relative.to_string_lossy().replace(['/', '\\'], "_"));
            match roundtrip(input, &output, &factory, &options) {
                Ok(parts) => {
                    info!(path = %input.display(), parts, "saved");
                    true
                },
                Err(e) => {
                    error!(path = %input.display(), error = %e, "round trip failed");
                    false
                },
            }
        })
        .count();

    println!("{}/{} packages round-tripped", ok, packages.len());
    Ok(())
}
