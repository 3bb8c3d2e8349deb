use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};
use std::path::Path;

use crate::cluster;
use crate::dedupe::dedupe;
use crate::error::Result;
use crate::model::cloud::PointSet;
use crate::model::matrix::PointMatrix;
use crate::model::style::{GroupSpec, StyleSheet};
use crate::stream::writer::{StoreSummary, StreamWriter};

pub struct ExportOptions {
	/// Target number of points per chunk.
	pub chunk_size: usize,
	/// Merge radius for duplicate suppression; doubles as the point size
	/// hint stored for the viewer.
	pub resolution: f64,
	pub styles: Option<Vec<String>>,
	pub stylesheet: Option<StyleSheet>,
	pub groups: Option<GroupSpec>,
	/// Extra key/value metadata copied verbatim into the store root.
	pub extra: Map<String, Value>,
	/// Pin the seed-chunk sampling and clustering for reproducible output.
	pub seed: Option<u64>,
}

impl Default for ExportOptions {
	fn default() -> ExportOptions {
		ExportOptions {
			chunk_size: 200_000,
			resolution: 0.1,
			styles: None,
			stylesheet: None,
			groups: None,
			extra: Map::new(),
			seed: None,
		}
	}
}

/// Run the full pipeline: dedupe to `resolution`, cluster into chunks, and
/// write the streaming store at `destination` (replacing any previous
/// store there).
pub fn export_cloud(
	points: &PointMatrix,
	destination: &Path,
	options: &ExportOptions,
) -> Result<StoreSummary> {
	let deduped = dedupe(points, options.resolution)?;
	info!(
		"deduplicated {} points down to {} at resolution {}",
		points.rows(),
		deduped.rows(),
		options.resolution
	);

	let mut rng = match options.seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_entropy(),
	};
	let assignment = cluster::assign(&deduped, options.chunk_size, &mut rng)?;

	let writer = StreamWriter {
		resolution: options.resolution,
		styles: options.styles.as_deref(),
		stylesheet: options.stylesheet.as_ref(),
		groups: options.groups.as_ref(),
		extra: &options.extra,
	};
	writer.write(&deduped, &assignment.labels, destination)
}

/// Convenience wrapper for callers holding a `PointSet` rather than a raw
/// band matrix.
pub fn export_point_set(
	set: &PointSet,
	destination: &Path,
	options: &ExportOptions,
) -> Result<StoreSummary> {
	export_cloud(&set.to_matrix()?, destination, options)
}
