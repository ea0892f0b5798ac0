use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use boxfit_pipeline::{decode_input, BoxFieldList, DecodeInput, DecoderConfig};
use clap::Parser;
use log::debug;

/// Recover 3D boxes from 2D corner correspondences.
#[derive(Debug, Parser)]
#[command(author, version, about = "3D box decoding from 2D corner correspondences")]
struct Args {
    /// Path to JSON file containing a DecodeInput frame.
    #[arg(long)]
    input: PathBuf,

    /// Optional path to JSON DecoderConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fit instances in parallel (overrides the config file).
    #[arg(long)]
    parallel: bool,
}

fn write_boxes_json(boxes: &BoxFieldList) -> Result<String> {
    serde_json::to_string_pretty(boxes).context("failed to serialize boxes")
}

fn decode_from_files(input_path: &Path, config_path: Option<&Path>, parallel: bool) -> Result<String> {
    let input = DecodeInput::from_json_file(input_path)?;

    let mut config = match config_path {
        Some(path) => DecoderConfig::from_json_file(path)?,
        None => DecoderConfig::default(),
    };
    config.parallel |= parallel;
    debug!("decoder config: {:?}", config);

    let boxes = decode_input(&input, &config)
        .with_context(|| format!("failed to decode {}", input_path.display()))?;
    write_boxes_json(&boxes)
}

fn main() {
    env_logger::init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = decode_from_files(&args.input, args.config.as_deref(), args.parallel)?;
    println!("{}", json);
    Ok(())
}
