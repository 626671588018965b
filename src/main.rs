//! pelisting - static PE32 header dump and annotated disassembly
//!
//! Usage:
//!   pelisting <image>                Write output/<Document>.txt
//!   pelisting <image> -o <dir>       Write into <dir>
//!   pelisting <image> --stdout       Print every document instead

use anyhow::{Context, Result};
use clap::Parser;
use pelisting::formats::pe::headers::find_pe_signature;
use pelisting::io::{load_image, write_report, IOLimits};
use pelisting::logging::{init_tracing, init_tracing_json};
use pelisting::{ListingConfig, Report};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "pelisting")]
#[command(about = "Dump a PE32 image and write an annotated disassembly listing", long_about = None)]
struct Cli {
    /// Path to the PE32 image
    image: PathBuf,

    /// Directory for the report documents
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the report to stdout instead of writing files
    #[arg(long)]
    stdout: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        init_tracing_json();
    } else {
        init_tracing();
    }

    let config = match &cli.config {
        Some(path) => ListingConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ListingConfig::default(),
    };

    let data = load_image(&cli.image, IOLimits::whole_file(config.limits.max_file_size))
        .with_context(|| format!("reading {}", cli.image.display()))?;
    info!(path = %cli.image.display(), size = data.len(), "loaded image");

    find_pe_signature(&data).with_context(|| format!("{} is not a PE image", cli.image.display()))?;

    let report = Report::build(&data, &config);

    if cli.stdout {
        print!("{}", report);
    } else {
        let written = write_report(&cli.output, &report)
            .with_context(|| format!("writing report to {}", cli.output.display()))?;
        for path in written {
            println!("{}", path.display());
        }
    }

    Ok(())
}
