use log::debug;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::error::{Error, Result};
use crate::model::matrix::PointMatrix;

type IndexedPosition = GeomWithData<[f64; 3], usize>;

/// Collapse near-duplicate points: every point within `radius` of a kept
/// point is folded into it, and the kept row becomes the column-wise mean of
/// its neighbourhood (all bands, not just position).
///
/// This is a greedy single pass in input order, so different input orderings
/// can produce different representative rows; the output count and spatial
/// coverage are stable. Neighbourhood membership is always decided against
/// the original positions, while the averaged values reflect earlier merges.
pub fn dedupe(points: &PointMatrix, radius: f64) -> Result<PointMatrix> {
	if !(radius > 0.0) {
		return Err(Error::invalid_argument(format!(
			"dedup radius must be positive, got {}",
			radius
		)));
	}

	let n = points.rows();
	let tree = RTree::bulk_load(
		(0..n)
			.map(|i| IndexedPosition::new(points.position(i), i))
			.collect(),
	);

	let mut work = points.clone();
	let mut removed = vec![false; n];
	let squared_radius = radius * radius;
	for i in 0..n {
		if removed[i] {
			continue;
		}
		let neighbours: Vec<usize> = tree
			.locate_within_distance(points.position(i), squared_radius)
			.map(|p| p.data)
			.collect();
		let mean = work.mean_of_rows(&neighbours);
		work.row_mut(i).copy_from_slice(&mean);
		for &j in &neighbours {
			if j != i {
				removed[j] = true;
			}
		}
	}

	let kept: Vec<usize> = (0..n).filter(|&i| !removed[i]).collect();
	debug!("culled {} points down to {}", n, kept.len());
	let mut out = work.select(&kept);
	round_positions(&mut out, radius);
	Ok(out)
}

// Rounding the positions to a precision derived from the merge radius costs
// nothing the radius has not already discarded, and makes the downstream
// chunk arrays compress much better.
fn round_positions(points: &mut PointMatrix, radius: f64) {
	let decimals = 1 - radius.log10().floor() as i32;
	let scale = 10f64.powi(decimals);
	for i in 0..points.rows() {
		for v in points.row_mut(i)[..3].iter_mut() {
			*v = (*v * scale).round() / scale;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::matrix::PointMatrix;

	fn line_of_points(n: usize) -> PointMatrix {
		let mut m = PointMatrix::new(3);
		for i in 0..n {
			m.push_row(&[i as f64, 0.0, 0.0]);
		}
		m
	}

	#[test]
	fn test_rejects_non_positive_radius() {
		let points = line_of_points(10);
		assert!(matches!(
			dedupe(&points, 0.0),
			Err(Error::InvalidArgument(_))
		));
		assert!(matches!(
			dedupe(&points, -1.0),
			Err(Error::InvalidArgument(_))
		));
	}

	#[test]
	fn test_line_collapses_to_two_representatives() {
		// 10 points spanning [0, 9] with a radius of 5: any 5-unit window
		// holds at most one representative, so two survive.
		let points = line_of_points(10);
		let out = dedupe(&points, 5.0).unwrap();
		assert_eq!(out.rows(), 2);
	}

	#[test]
	fn test_output_never_grows() {
		let points = line_of_points(25);
		for radius in [0.1, 1.0, 3.0, 100.0] {
			let out = dedupe(&points, radius).unwrap();
			assert!(out.rows() <= points.rows());
			assert!(out.rows() >= 1);
		}
	}

	#[test]
	fn test_representatives_average_all_bands() {
		let mut points = PointMatrix::new(4);
		points.push_row(&[0.0, 0.0, 0.0, 10.0]);
		points.push_row(&[0.1, 0.0, 0.0, 20.0]);
		let out = dedupe(&points, 1.0).unwrap();
		assert_eq!(out.rows(), 1);
		// position mean rounded to the radius-derived precision
		assert!((out.row(0)[0] - 0.1).abs() < 1e-12);
		assert_eq!(out.row(0)[3], 15.0);
	}

	#[test]
	fn test_far_points_are_untouched() {
		let mut points = PointMatrix::new(3);
		points.push_row(&[0.0, 0.0, 0.0]);
		points.push_row(&[100.0, 0.0, 0.0]);
		let out = dedupe(&points, 0.5).unwrap();
		assert_eq!(out.rows(), 2);
	}

	#[test]
	fn test_positions_rounded_for_compression() {
		let mut points = PointMatrix::new(3);
		points.push_row(&[1.23456789, 0.0, 0.0]);
		// radius 0.1 keeps two decimal digits
		let out = dedupe(&points, 0.1).unwrap();
		assert_eq!(out.row(0)[0], 1.23);
	}
}
