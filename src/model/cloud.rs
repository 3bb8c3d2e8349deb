use crate::error::{Error, Result};
use crate::model::matrix::PointMatrix;

/// An in-memory point cloud: N positions plus optional per-point colour,
/// normals and named scalar channels. Point order carries no meaning beyond
/// round-trip fidelity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointSet {
	pub positions: Vec<[f64; 3]>,
	/// Per-point RGB, each channel in [0, 1].
	pub colors: Option<Vec<[f32; 3]>>,
	pub normals: Option<Vec<[f32; 3]>>,
	/// Named scalar channels, insertion order preserved for display.
	pub attributes: Vec<(String, Vec<f32>)>,
}

impl PointSet {
	pub fn new(positions: Vec<[f64; 3]>) -> PointSet {
		PointSet {
			positions,
			colors: None,
			normals: None,
			attributes: Vec::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}

	pub fn with_colors(mut self, colors: Vec<[f32; 3]>) -> PointSet {
		self.colors = Some(colors);
		self
	}

	pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> PointSet {
		self.normals = Some(normals);
		self
	}

	pub fn push_attribute(&mut self, name: impl Into<String>, values: Vec<f32>) -> Result<()> {
		let name = name.into();
		if values.len() != self.len() {
			return Err(Error::invalid_argument(format!(
				"attribute {} has {} values for {} points",
				name,
				values.len(),
				self.len()
			)));
		}
		if self.attributes.iter().any(|(n, _)| *n == name) {
			return Err(Error::invalid_argument(format!(
				"duplicate attribute name {}",
				name
			)));
		}
		self.attributes.push((name, values));
		Ok(())
	}

	/// Every per-point array must have exactly as many entries as there are
	/// positions. Wrong lengths fail here, never silently truncate or pad.
	pub fn validate(&self) -> Result<()> {
		let n = self.len();
		if let Some(colors) = &self.colors {
			if colors.len() != n {
				return Err(Error::invalid_argument(format!(
					"{} colours for {} points",
					colors.len(),
					n
				)));
			}
		}
		if let Some(normals) = &self.normals {
			if normals.len() != n {
				return Err(Error::invalid_argument(format!(
					"{} normals for {} points",
					normals.len(),
					n
				)));
			}
		}
		for (name, values) in &self.attributes {
			if values.len() != n {
				return Err(Error::invalid_argument(format!(
					"attribute {} has {} values for {} points",
					name,
					values.len(),
					n
				)));
			}
		}
		for (i, (name, _)) in self.attributes.iter().enumerate() {
			if self.attributes[i + 1..].iter().any(|(n, _)| n == name) {
				return Err(Error::invalid_argument(format!(
					"duplicate attribute name {}",
					name
				)));
			}
		}
		Ok(())
	}

	/// Band matrix view: `[x, y, z, (r, g, b,) attributes...]`. Colour lands
	/// in bands 3..6 when present; normals are not part of the band matrix.
	pub fn to_matrix(&self) -> Result<PointMatrix> {
		self.validate()?;
		let mut cols = 3 + self.attributes.len();
		if self.colors.is_some() {
			cols += 3;
		}
		let mut matrix = PointMatrix::new(cols);
		let mut row = vec![0.0; cols];
		for i in 0..self.len() {
			let p = self.positions[i];
			row[0] = p[0];
			row[1] = p[1];
			row[2] = p[2];
			let mut b = 3;
			if let Some(colors) = &self.colors {
				let c = colors[i];
				row[b] = c[0] as f64;
				row[b + 1] = c[1] as f64;
				row[b + 2] = c[2] as f64;
				b += 3;
			}
			for (_, values) in &self.attributes {
				row[b] = values[i] as f64;
				b += 1;
			}
			matrix.push_row(&row);
		}
		Ok(matrix)
	}

	/// Build a set from a raw band matrix. Columns past position become
	/// scalar channels named after `names`, or `SF1, SF2, ...` when no
	/// names are given.
	pub fn from_matrix(matrix: &PointMatrix, names: Option<Vec<String>>) -> Result<PointSet> {
		if matrix.cols() < 3 {
			return Err(Error::invalid_argument(
				"matrix needs at least the three position columns",
			));
		}
		let bands = matrix.cols() - 3;
		let names = match names {
			Some(names) => {
				if names.len() != bands {
					return Err(Error::invalid_argument(format!(
						"{} names for {} bands",
						names.len(),
						bands
					)));
				}
				names
			}
			None => (1..=bands).map(|i| format!("SF{}", i)).collect(),
		};

		let mut set = PointSet::new((0..matrix.rows()).map(|i| matrix.position(i)).collect());
		for (b, name) in names.into_iter().enumerate() {
			let values = (0..matrix.rows())
				.map(|i| matrix.row(i)[3 + b] as f32)
				.collect();
			set.push_attribute(name, values)?;
		}
		Ok(set)
	}
}

#[cfg(test)]
mod tests {
	use super::PointSet;
	use crate::model::matrix::PointMatrix;

	#[test]
	fn test_validate_catches_length_mismatch() {
		let mut set = PointSet::new(vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
		assert!(set.validate().is_ok());
		assert!(set.push_attribute("intensity", vec![1.0]).is_err());

		set.colors = Some(vec![[0.5, 0.5, 0.5]]);
		assert!(set.validate().is_err());
	}

	#[test]
	fn test_matrix_round_trip_with_default_names() {
		let matrix =
			PointMatrix::from_vec(vec![0.0, 1.0, 2.0, 9.0, 3.0, 4.0, 5.0, 8.0], 4).unwrap();
		let set = PointSet::from_matrix(&matrix, None).unwrap();
		assert_eq!(set.attributes.len(), 1);
		assert_eq!(set.attributes[0].0, "SF1");
		assert_eq!(set.attributes[0].1, vec![9.0, 8.0]);
		assert_eq!(set.to_matrix().unwrap(), matrix);
	}

	#[test]
	fn test_to_matrix_places_colour_before_attributes() {
		let mut set = PointSet::new(vec![[1.0, 2.0, 3.0]])
			.with_colors(vec![[0.25, 0.5, 0.75]]);
		set.push_attribute("height", vec![7.0]).unwrap();
		let matrix = set.to_matrix().unwrap();
		assert_eq!(matrix.cols(), 7);
		assert_eq!(matrix.row(0), &[1.0, 2.0, 3.0, 0.25, 0.5, 0.75, 7.0]);
	}
}
