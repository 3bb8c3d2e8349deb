use log::debug;
use ord_subset::OrdSubsetIterExt;
use rand::seq::index::sample;
use rand::Rng;

use crate::error::{Error, Result};
use crate::model::matrix::PointMatrix;

const MAX_ITERATIONS: usize = 25;
// Total centroid movement below which the clustering has converged.
const TOLERANCE: f64 = 0.1;

/// Chunk labels for every point plus the seed-chunk membership mask.
/// Label 0 is the seed chunk; cluster labels start at 1.
pub struct ChunkAssignment {
	pub labels: Vec<usize>,
	pub seed: Vec<bool>,
	pub effective_chunk_size: usize,
}

/// Partition points into spatially-coherent chunks of roughly
/// `target_chunk_size` points. Clustering runs on the position columns only.
/// A uniform random sample of one chunk's worth of points is relabelled to
/// chunk 0 afterwards, so the first chunk a viewer fetches always covers the
/// whole cloud.
pub fn assign(
	points: &PointMatrix,
	target_chunk_size: usize,
	rng: &mut impl Rng,
) -> Result<ChunkAssignment> {
	let n = points.rows();
	if n == 0 {
		return Err(Error::invalid_argument("cannot chunk an empty point set"));
	}
	if target_chunk_size == 0 {
		return Err(Error::invalid_argument("chunk size must be positive"));
	}

	// Clamp so small clouds still get a few chunks to stream.
	let effective = target_chunk_size.min((n / 3).max(1));
	let clusters = (n / effective).max(1);
	debug!(
		"assigning {} points to {} clusters (chunk size {})",
		n, clusters, effective
	);

	let mut labels = kmeans_labels(points, clusters, rng);
	for label in labels.iter_mut() {
		*label += 1;
	}

	let mut seed = vec![false; n];
	for i in sample(rng, n, effective.min(n)) {
		labels[i] = 0;
		seed[i] = true;
	}

	Ok(ChunkAssignment {
		labels,
		seed,
		effective_chunk_size: effective,
	})
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
	let dx = a[0] - b[0];
	let dy = a[1] - b[1];
	let dz = a[2] - b[2];
	dx * dx + dy * dy + dz * dz
}

fn nearest_centroid(p: &[f64; 3], centroids: &[[f64; 3]]) -> usize {
	centroids
		.iter()
		.enumerate()
		.ord_subset_min_by_key(|(_, c)| squared_distance(p, c))
		.map(|(i, _)| i)
		.unwrap_or(0)
}

/// Lloyd's algorithm with farthest-point seeding. Chunk assignment only
/// needs spatial coherence, so a handful of iterations is plenty.
fn kmeans_labels(points: &PointMatrix, clusters: usize, rng: &mut impl Rng) -> Vec<usize> {
	let n = points.rows();
	let positions: Vec<[f64; 3]> = (0..n).map(|i| points.position(i)).collect();

	let mut centroids: Vec<[f64; 3]> = Vec::with_capacity(clusters);
	centroids.push(positions[rng.gen_range(0..n)]);
	while centroids.len() < clusters {
		let (mut best_distance, mut best_index) = (0.0f64, 0);
		for (i, p) in positions.iter().enumerate() {
			let d = centroids
				.iter()
				.map(|c| squared_distance(p, c))
				.fold(f64::MAX, f64::min);
			if d > best_distance {
				best_distance = d;
				best_index = i;
			}
		}
		centroids.push(positions[best_index]);
	}

	let mut labels = vec![0usize; n];
	for _ in 0..MAX_ITERATIONS {
		for (label, p) in labels.iter_mut().zip(&positions) {
			*label = nearest_centroid(p, &centroids);
		}

		let mut sums = vec![[0.0f64; 3]; clusters];
		let mut counts = vec![0usize; clusters];
		for (label, p) in labels.iter().zip(&positions) {
			counts[*label] += 1;
			for d in 0..3 {
				sums[*label][d] += p[d];
			}
		}

		let mut movement = 0.0;
		for i in 0..clusters {
			if counts[i] == 0 {
				continue;
			}
			let updated = [
				sums[i][0] / counts[i] as f64,
				sums[i][1] / counts[i] as f64,
				sums[i][2] / counts[i] as f64,
			];
			movement += squared_distance(&centroids[i], &updated).sqrt();
			centroids[i] = updated;
		}
		if movement < TOLERANCE {
			break;
		}
	}

	for (label, p) in labels.iter_mut().zip(&positions) {
		*label = nearest_centroid(p, &centroids);
	}
	labels
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	fn grid(n: usize) -> PointMatrix {
		let mut m = PointMatrix::new(3);
		let side = (n as f64).sqrt().ceil() as usize;
		for i in 0..n {
			m.push_row(&[(i % side) as f64, (i / side) as f64, 0.0]);
		}
		m
	}

	#[test]
	fn test_empty_input_fails() {
		let mut rng = StdRng::seed_from_u64(1);
		assert!(matches!(
			assign(&PointMatrix::new(3), 100, &mut rng),
			Err(Error::InvalidArgument(_))
		));
	}

	#[test]
	fn test_chunk_size_larger_than_cloud_is_clamped() {
		let mut rng = StdRng::seed_from_u64(1);
		let points = grid(30);
		let assignment = assign(&points, 1_000_000, &mut rng).unwrap();
		// clamped to a third of the cloud: three clusters plus the seed
		assert_eq!(assignment.effective_chunk_size, 10);
		let max_label = *assignment.labels.iter().max().unwrap();
		assert!(max_label >= 1 && max_label <= 3);
	}

	#[test]
	fn test_chunk_size_one_degenerates_gracefully() {
		let mut rng = StdRng::seed_from_u64(7);
		let points = grid(10);
		let assignment = assign(&points, 1, &mut rng).unwrap();
		assert_eq!(assignment.effective_chunk_size, 1);
		assert_eq!(assignment.labels.len(), 10);
		assert_eq!(assignment.seed.iter().filter(|&&s| s).count(), 1);
	}

	#[test]
	fn test_seed_chunk_has_configured_size() {
		let mut rng = StdRng::seed_from_u64(3);
		let points = grid(1000);
		let assignment = assign(&points, 200, &mut rng).unwrap();
		assert_eq!(assignment.effective_chunk_size, 200);
		let seed_count = assignment.labels.iter().filter(|&&l| l == 0).count();
		assert_eq!(seed_count, 200);
		for (label, seed) in assignment.labels.iter().zip(&assignment.seed) {
			assert_eq!(*label == 0, *seed);
		}
	}

	#[test]
	fn test_every_point_gets_exactly_one_label() {
		let mut rng = StdRng::seed_from_u64(11);
		let points = grid(500);
		let assignment = assign(&points, 100, &mut rng).unwrap();
		assert_eq!(assignment.labels.len(), points.rows());
		// 500 / 100 = 5 clusters requested; labels stay in 0..=5
		assert!(assignment.labels.iter().all(|&l| l <= 5));
	}

	#[test]
	fn test_separated_blobs_land_in_separate_chunks() {
		let mut m = PointMatrix::new(3);
		for i in 0..30 {
			m.push_row(&[(i % 5) as f64 * 0.1, (i / 5) as f64 * 0.1, 0.0]);
		}
		for i in 0..30 {
			m.push_row(&[1000.0 + (i % 5) as f64 * 0.1, (i / 5) as f64 * 0.1, 0.0]);
		}
		let mut rng = StdRng::seed_from_u64(5);
		let assignment = assign(&m, 30, &mut rng).unwrap();
		// ignoring seed points, the two blobs never share a cluster label
		let left: Vec<usize> = assignment.labels[..30]
			.iter()
			.copied()
			.filter(|&l| l != 0)
			.collect();
		let right: Vec<usize> = assignment.labels[30..]
			.iter()
			.copied()
			.filter(|&l| l != 0)
			.collect();
		for l in &left {
			assert!(!right.contains(l));
		}
	}

	#[test]
	fn test_fixed_seed_is_reproducible() {
		let points = grid(200);
		let a = assign(&points, 40, &mut StdRng::seed_from_u64(42)).unwrap();
		let b = assign(&points, 40, &mut StdRng::seed_from_u64(42)).unwrap();
		assert_eq!(a.labels, b.labels);
	}
}
