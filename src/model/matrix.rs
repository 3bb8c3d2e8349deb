use crate::error::{Error, Result};

/// Row-major `[N, D]` matrix of point data. The first three columns are
/// always world-space x, y, z; the remaining columns are display bands
/// (colour channels, scalar attributes).
#[derive(Clone, Debug, PartialEq)]
pub struct PointMatrix {
	data: Vec<f64>,
	cols: usize,
}

impl PointMatrix {
	pub fn new(cols: usize) -> PointMatrix {
		PointMatrix {
			data: Vec::new(),
			cols,
		}
	}

	pub fn from_vec(data: Vec<f64>, cols: usize) -> Result<PointMatrix> {
		if cols < 3 {
			return Err(Error::invalid_argument(
				"point matrix needs at least the three position columns",
			));
		}
		if data.len() % cols != 0 {
			return Err(Error::invalid_argument(format!(
				"matrix data of length {} is not divisible by {} columns",
				data.len(),
				cols
			)));
		}
		Ok(PointMatrix { data, cols })
	}

	pub fn rows(&self) -> usize {
		if self.cols == 0 {
			0
		} else {
			self.data.len() / self.cols
		}
	}

	pub fn cols(&self) -> usize {
		self.cols
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn row(&self, i: usize) -> &[f64] {
		&self.data[i * self.cols..(i + 1) * self.cols]
	}

	pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
		&mut self.data[i * self.cols..(i + 1) * self.cols]
	}

	pub fn push_row(&mut self, row: &[f64]) {
		debug_assert_eq!(row.len(), self.cols);
		self.data.extend_from_slice(row);
	}

	pub fn position(&self, i: usize) -> [f64; 3] {
		let row = self.row(i);
		[row[0], row[1], row[2]]
	}

	/// Column-wise mean over the given row indices.
	pub fn mean_of_rows(&self, indices: &[usize]) -> Vec<f64> {
		let mut mean = vec![0.0; self.cols];
		if indices.is_empty() {
			return mean;
		}
		for &i in indices {
			for (m, v) in mean.iter_mut().zip(self.row(i)) {
				*m += v;
			}
		}
		for m in mean.iter_mut() {
			*m /= indices.len() as f64;
		}
		mean
	}

	/// New matrix holding the given rows, in order.
	pub fn select(&self, indices: &[usize]) -> PointMatrix {
		let mut out = PointMatrix {
			data: Vec::with_capacity(indices.len() * self.cols),
			cols: self.cols,
		};
		for &i in indices {
			out.push_row(self.row(i));
		}
		out
	}

	/// Mean of the position columns over all rows.
	pub fn position_centroid(&self) -> [f64; 3] {
		let mut centroid = [0.0; 3];
		let n = self.rows();
		for i in 0..n {
			let p = self.position(i);
			centroid[0] += p[0];
			centroid[1] += p[1];
			centroid[2] += p[2];
		}
		if n > 0 {
			for c in centroid.iter_mut() {
				*c /= n as f64;
			}
		}
		centroid
	}
}

#[cfg(test)]
mod tests {
	use super::PointMatrix;

	#[test]
	fn test_row_access() {
		let m = PointMatrix::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
		assert_eq!(m.rows(), 2);
		assert_eq!(m.row(1), &[3.0, 4.0, 5.0]);
		assert_eq!(m.position(0), [0.0, 1.0, 2.0]);
	}

	#[test]
	fn test_mean_and_select() {
		let m = PointMatrix::from_vec(vec![0.0, 0.0, 0.0, 2.0, 4.0, 6.0], 3).unwrap();
		assert_eq!(m.mean_of_rows(&[0, 1]), vec![1.0, 2.0, 3.0]);
		let s = m.select(&[1]);
		assert_eq!(s.rows(), 1);
		assert_eq!(s.row(0), &[2.0, 4.0, 6.0]);
	}

	#[test]
	fn test_rejects_ragged_data() {
		assert!(PointMatrix::from_vec(vec![1.0; 7], 3).is_err());
		assert!(PointMatrix::from_vec(vec![1.0; 4], 2).is_err());
	}
}
