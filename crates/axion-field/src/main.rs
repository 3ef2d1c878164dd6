//! axion-propagate: CLI tool for propagating axions through magnetic fields

use anyhow::{Context, Result};
use axion_field::{render_json, render_text, setup::load_and_run};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "axion-propagate")]
#[command(about = "Trace axions through magnet volumes and compute photon conversion probabilities")]
#[command(version)]
struct Args {
    /// Input JSON file (simulation setup)
    #[arg(short, long)]
    input: PathBuf,

    /// Output report file
    #[arg(short, long, required_unless_present = "stdout")]
    output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print the report to stdout instead of a file
    #[arg(long)]
    stdout: bool,

    /// Log per-event details
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let report = load_and_run(&args.input).context("Propagation failed")?;

    let rendered = match args.format {
        OutputFormat::Json => render_json(&report)?,
        OutputFormat::Text => render_text(&report)?,
    };

    match (&args.output, args.stdout) {
        (Some(path), false) => {
            fs::write(path, &rendered).with_context(|| format!("Failed to write output file: {:?}", path))?;
            info!(
                events = report.totals.events,
                failed = report.totals.failed,
                "wrote report to {:?}",
                path
            );
        }
        _ => println!("{}", rendered),
    }

    Ok(())
}
