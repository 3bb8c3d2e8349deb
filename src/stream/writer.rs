use log::{debug, info};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::matrix::PointMatrix;
use crate::model::style::{GroupSpec, StyleSheet};
use crate::stream::zarr::ZarrGroup;

/// Serializes a labelled point matrix into the chunked streaming store.
pub struct StreamWriter<'a> {
	pub resolution: f64,
	/// Style names offered by the viewer; defaults to every stylesheet key.
	pub styles: Option<&'a [String]>,
	pub stylesheet: Option<&'a StyleSheet>,
	pub groups: Option<&'a GroupSpec>,
	/// Caller metadata, passed through to the root attributes untouched.
	pub extra: &'a Map<String, Value>,
}

pub struct StoreSummary {
	pub total: usize,
	pub chunks: usize,
	pub origin: [i64; 3],
}

impl StreamWriter<'_> {
	/// Write every chunk array, the chunk-centers array, and finally the
	/// root attributes. Root attributes land last on purpose: readers treat
	/// a store without them as incomplete.
	pub fn write(
		&self,
		points: &PointMatrix,
		labels: &[usize],
		destination: &Path,
	) -> Result<StoreSummary> {
		if points.rows() == 0 {
			return Err(Error::invalid_argument("cannot export an empty point set"));
		}
		if labels.len() != points.rows() {
			return Err(Error::invalid_argument(format!(
				"{} chunk labels for {} points",
				labels.len(),
				points.rows()
			)));
		}

		let default_sheet;
		let stylesheet = match self.stylesheet {
			Some(sheet) => sheet,
			None => {
				default_sheet = StyleSheet::default_for_width(points.cols());
				&default_sheet
			}
		};
		let styles = match self.styles {
			Some(styles) => styles.to_vec(),
			None => stylesheet.names(),
		};
		for style in &styles {
			if !stylesheet.contains(style) {
				return Err(Error::invalid_argument(format!(
					"style {} is not in the stylesheet",
					style
				)));
			}
		}

		// Store coordinates are origin-relative so the float32 payload keeps
		// its precision and compresses well.
		let centroid = points.position_centroid();
		let origin = [
			centroid[0] as i64,
			centroid[1] as i64,
			centroid[2] as i64,
		];

		let chunk_ids: BTreeSet<usize> = labels.iter().copied().collect();
		let group = ZarrGroup::create(destination)?;

		let cols = points.cols();
		let mut centers: Vec<f32> = Vec::with_capacity(chunk_ids.len() * cols);
		for (sequence, id) in chunk_ids.iter().enumerate() {
			let indices: Vec<usize> = labels
				.iter()
				.enumerate()
				.filter(|(_, l)| **l == *id)
				.map(|(i, _)| i)
				.collect();
			let chunk = extract_chunk(points, &indices, &origin);

			let name = format!("c{}", sequence);
			debug!("writing chunk {} ({} points)", name, indices.len());
			group.write_array(&name, indices.len(), cols, &chunk)?;
			centers.extend(column_means(&chunk, cols));
		}

		group.write_array("chunk_centers", chunk_ids.len(), cols, &centers)?;

		let mut attrs = Map::new();
		attrs.insert("origin".to_string(), json!(origin));
		attrs.insert("resolution".to_string(), json!(self.resolution));
		attrs.insert("total".to_string(), json!(points.rows()));
		attrs.insert("chunks".to_string(), json!(chunk_ids.len()));
		attrs.insert("styles".to_string(), json!(styles));
		attrs.insert(
			"stylesheet".to_string(),
			serde_json::to_value(stylesheet)
				.map_err(|e| Error::write(format!("serializing stylesheet: {}", e)))?,
		);
		if let Some(groups) = self.groups {
			attrs.insert(
				"groups".to_string(),
				serde_json::to_value(groups)
					.map_err(|e| Error::write(format!("serializing groups: {}", e)))?,
			);
		}
		for (key, value) in self.extra {
			attrs.insert(key.clone(), value.clone());
		}
		group.write_attrs(&attrs)?;

		info!(
			"wrote {} points in {} chunks to {}",
			points.rows(),
			chunk_ids.len(),
			destination.display()
		);
		Ok(StoreSummary {
			total: points.rows(),
			chunks: chunk_ids.len(),
			origin,
		})
	}
}

fn extract_chunk(points: &PointMatrix, indices: &[usize], origin: &[i64; 3]) -> Vec<f32> {
	let mut out = Vec::with_capacity(indices.len() * points.cols());
	for &i in indices {
		let row = points.row(i);
		out.push((row[0] - origin[0] as f64) as f32);
		out.push((row[1] - origin[1] as f64) as f32);
		out.push((row[2] - origin[2] as f64) as f32);
		for v in &row[3..] {
			out.push(*v as f32);
		}
	}
	out
}

fn column_means(data: &[f32], cols: usize) -> Vec<f32> {
	let rows = data.len() / cols;
	let mut means = vec![0.0f32; cols];
	for row in data.chunks_exact(cols) {
		for (m, v) in means.iter_mut().zip(row) {
			*m += v;
		}
	}
	if rows > 0 {
		for m in means.iter_mut() {
			*m /= rows as f32;
		}
	}
	means
}
