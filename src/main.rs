use clap::Parser;
use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use rusty_cloud_converter::export::{export_point_set, ExportOptions};
use rusty_cloud_converter::model::cloud::PointSet;
use rusty_cloud_converter::{csv_reader, pcd_reader, ply, Error};

/// Convert a point file into a chunked streaming store.
#[derive(Parser, Debug)]
#[command(name = "rusty-cloud-converter", version)]
struct Args {
	/// Input point file (.ply, .csv or .pcd)
	input: PathBuf,
	/// Output store directory (replaced if it exists)
	output: PathBuf,
	/// Merge radius for duplicate suppression
	#[arg(long, default_value_t = 0.1)]
	resolution: f64,
	/// Target number of points per chunk
	#[arg(long, default_value_t = 200_000)]
	chunk_size: usize,
	/// Fixed random seed for reproducible chunking
	#[arg(long)]
	seed: Option<u64>,
}

fn main() -> ExitCode {
	env_logger::init();
	let args = Args::parse();
	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}

fn run(args: &Args) -> rusty_cloud_converter::Result<()> {
	let set = load(&args.input)?;
	info!("loaded {} points from {}", set.len(), args.input.display());

	let options = ExportOptions {
		chunk_size: args.chunk_size,
		resolution: args.resolution,
		seed: args.seed,
		..ExportOptions::default()
	};
	let summary = export_point_set(&set, &args.output, &options)?;
	info!(
		"exported {} points in {} chunks",
		summary.total, summary.chunks
	);
	Ok(())
}

fn load(path: &PathBuf) -> rusty_cloud_converter::Result<PointSet> {
	let extension = path
		.extension()
		.and_then(|e| e.to_str())
		.map(|e| e.to_lowercase());
	match extension.as_deref() {
		Some("ply") => ply::decode(path),
		Some("csv") => {
			let buffer = fs::read(path)
				.map_err(|e| Error::decode(format!("reading {}: {}", path.display(), e)))?;
			csv_reader::from_csv(&buffer)
		}
		Some("pcd") => {
			let buffer = fs::read(path)
				.map_err(|e| Error::decode(format!("reading {}: {}", path.display(), e)))?;
			pcd_reader::from_pcd(&buffer)
		}
		_ => Err(Error::decode(format!(
			"unsupported input file {}",
			path.display()
		))),
	}
}
