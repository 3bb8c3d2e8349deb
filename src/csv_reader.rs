use csv::Reader;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::cloud::PointSet;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Intensity {
	Int(i64),
	Float(f32),
}

impl Intensity {
	fn value(&self) -> f32 {
		match self {
			Intensity::Int(v) => *v as f32,
			Intensity::Float(v) => *v,
		}
	}
}

#[derive(Debug, Deserialize)]
struct Record {
	pub x: f64,
	pub y: f64,
	pub z: f64,
	pub intensity: Option<Intensity>,
}

/// Read an x,y,z[,intensity] CSV into a point set. An intensity column, when
/// present on every row, becomes a scalar channel.
pub fn from_csv(buf: &[u8]) -> Result<PointSet> {
	let mut rdr = Reader::from_reader(buf);
	let mut positions = Vec::new();
	let mut intensity = Vec::new();
	for result in rdr.deserialize() {
		let record: Record = result.map_err(|e| Error::decode(format!("csv: {}", e)))?;
		positions.push([record.x, record.y, record.z]);
		if let Some(value) = record.intensity {
			intensity.push(value.value());
		}
	}

	let mut set = PointSet::new(positions);
	if !intensity.is_empty() {
		if intensity.len() != set.len() {
			return Err(Error::decode(
				"csv: intensity column is missing on some rows",
			));
		}
		set.push_attribute("intensity", intensity)?;
	}
	Ok(set)
}
