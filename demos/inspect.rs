//! Print the part graph of one package.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example inspect -- document.docx
//! cargo run --example inspect -- extracted_dir/ --infer
//! ```

use clap::Parser;
use opc_engine::ooxml::opc::{OpcPackage, OpenOptions, PartFactory};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Show the parts and relationships of an OPC package
#[derive(Parser, Debug)]
#[command(name = "inspect", version)]
struct Args {
    /// Package file, or a directory holding an extracted package
    #[arg(value_name = "PACKAGE")]
    path: PathBuf,

    /// Give parts missing from [Content_Types].xml their well-known content type
    #[arg(long)]
    infer: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = OpenOptions::new().with_infer_content_types(args.infer);
    let pkg = OpcPackage::open_with(&args.path, &PartFactory::with_defaults(), &options)?;

    println!("Parts ({}):", pkg.part_count());
    for part in pkg.iter_parts() {
        println!("  {:<48} {:>9} B  {}", part.partname(), part.blob().len(), part.content_type());
    }

    println!("\nRelationships:");
    for rel in pkg.iter_rels() {
        let state = if rel.is_external() {
            "external"
        } else if rel.is_dangling() {
            "dangling"
        } else {
            "internal"
        };
        let reltype = rel.reltype().rsplit('/').next().unwrap_or(rel.reltype());
        println!("  {:<6} {:<8} {:<24} {}", rel.r_id(), state, reltype, rel.target_ref());
    }

    Ok(())
}
