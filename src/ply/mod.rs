pub mod format;

use byteorder::LittleEndian;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::cloud::PointSet;
use self::format::{BodyEncoding, ElementData, ElementSpec, Header, Property, ScalarType};

// Fields of a vertex element that never become scalar channels.
const VERTEX_FIELD_MASK: [&str; 9] = ["red", "green", "blue", "nx", "ny", "nz", "x", "y", "z"];

/// Read a PLY point file. Elements are matched by name: anything containing
/// "vert" supplies positions (plus embedded colour/normals/attributes),
/// "color" supplies r,g,b, "normal" supplies x,y,z, and every other element
/// is one scalar channel named after its first field, `scalar_` marker
/// stripped.
pub fn decode(path: &Path) -> Result<PointSet> {
	let file = File::open(path)
		.map_err(|e| Error::decode(format!("opening {}: {}", path.display(), e)))?;
	let mut reader = BufReader::new(file);
	let header = format::read_header(&mut reader)?;
	let elements = format::read_body(&mut reader, &header)?;
	from_elements(&elements)
}

fn from_elements(elements: &[ElementData]) -> Result<PointSet> {
	let mut positions: Option<Vec<[f64; 3]>> = None;
	let mut colors: Option<Vec<[f64; 3]>> = None;
	let mut normals: Option<Vec<[f32; 3]>> = None;
	let mut attributes: Vec<(String, Vec<f32>)> = Vec::new();

	for element in elements {
		let name = element.spec.name.to_lowercase();
		if name.contains("vert") {
			positions = Some(triples_f64(element, ["x", "y", "z"])?);
			if element.spec.properties.len() > 3 {
				if element.column("red").is_some()
					&& element.column("green").is_some()
					&& element.column("blue").is_some()
				{
					colors = Some(triples_f64(element, ["red", "green", "blue"])?);
				}
				if element.column("nx").is_some()
					&& element.column("ny").is_some()
					&& element.column("nz").is_some()
				{
					normals = Some(triples_f32(element, ["nx", "ny", "nz"])?);
				}
				for (property, column) in
					element.spec.properties.iter().zip(&element.columns)
				{
					if !VERTEX_FIELD_MASK.contains(&property.name.as_str()) {
						attributes.push((
							property.name.clone(),
							column.iter().map(|&v| v as f32).collect(),
						));
					}
				}
			}
		} else if name.contains("color") {
			colors = Some(triples_f64(element, ["r", "g", "b"])?);
		} else if name.contains("normal") {
			normals = Some(triples_f32(element, ["x", "y", "z"])?);
		} else if let Some(property) = element.spec.properties.first() {
			attributes.push((
				property.name.replace("scalar_", ""),
				element.columns[0].iter().map(|&v| v as f32).collect(),
			));
		}
	}

	let positions = match positions {
		Some(positions) if !positions.is_empty() => positions,
		_ => return Err(Error::decode("file contains no geometry")),
	};

	let mut set = PointSet::new(positions);
	// Colour is stored as 0-255 on disk; normalize to [0, 1] floats.
	set.colors = colors.map(|colors| {
		colors
			.iter()
			.map(|c| {
				[
					c[0] as f32 / 255.0,
					c[1] as f32 / 255.0,
					c[2] as f32 / 255.0,
				]
			})
			.collect()
	});
	set.normals = normals;
	set.attributes = attributes;
	set.validate()
		.map_err(|e| Error::decode(format!("inconsistent element sizes: {}", e)))?;
	Ok(set)
}

fn triples_f64(element: &ElementData, fields: [&str; 3]) -> Result<Vec<[f64; 3]>> {
	let columns: Vec<&Vec<f64>> = fields
		.iter()
		.map(|f| {
			element.column(f).ok_or_else(|| {
				Error::decode(format!("element {} is missing field {}", element.spec.name, f))
			})
		})
		.collect::<Result<_>>()?;
	Ok((0..element.spec.count)
		.map(|i| [columns[0][i], columns[1][i], columns[2][i]])
		.collect())
}

fn triples_f32(element: &ElementData, fields: [&str; 3]) -> Result<Vec<[f32; 3]>> {
	Ok(triples_f64(element, fields)?
		.iter()
		.map(|t| [t[0] as f32, t[1] as f32, t[2] as f32])
		.collect())
}

/// Write a PLY point file with a binary little-endian body: positions as
/// doubles, colour as 0-255 unsigned bytes, normals and scalar channels as
/// floats. Channel names gain a `scalar_` prefix on disk unless they already
/// carry the marker, so downstream tooling recognises them as scalar fields.
pub fn encode(set: &PointSet, path: &Path) -> Result<()> {
	set.validate()?;

	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent)
				.map_err(|e| Error::encode(format!("creating {}: {}", parent.display(), e)))?;
		}
	}
	let file = File::create(path)
		.map_err(|e| Error::encode(format!("creating {}: {}", path.display(), e)))?;
	let mut writer = BufWriter::new(file);
	write_contents(&mut writer, set)
		.map_err(|e| Error::encode(format!("writing {}: {}", path.display(), e)))
}

fn write_contents(writer: &mut impl Write, set: &PointSet) -> std::io::Result<()> {
	let count = set.len();
	let mut elements = vec![element(
		"vertices",
		count,
		&[
			("x", ScalarType::Float64),
			("y", ScalarType::Float64),
			("z", ScalarType::Float64),
		],
	)];

	let byte_colors = set.colors.as_ref().map(|colors| quantize_colors(colors));
	if byte_colors.is_some() {
		elements.push(element(
			"color",
			count,
			&[
				("r", ScalarType::UInt8),
				("g", ScalarType::UInt8),
				("b", ScalarType::UInt8),
			],
		));
	}
	if set.normals.is_some() {
		elements.push(element(
			"normals",
			count,
			&[
				("x", ScalarType::Float32),
				("y", ScalarType::Float32),
				("z", ScalarType::Float32),
			],
		));
	}
	for (name, _) in &set.attributes {
		let field = scalar_field_name(name);
		elements.push(element(&field, count, &[(&field, ScalarType::Float32)]));
	}

	let header = Header {
		encoding: BodyEncoding::BinaryLittleEndian,
		elements,
	};
	format::write_header(writer, &header)?;

	for p in &set.positions {
		for v in p {
			format::write_scalar::<LittleEndian>(writer, ScalarType::Float64, *v)?;
		}
	}
	if let Some(colors) = &byte_colors {
		for c in colors {
			for v in c {
				format::write_scalar::<LittleEndian>(writer, ScalarType::UInt8, *v as f64)?;
			}
		}
	}
	if let Some(normals) = &set.normals {
		for n in normals {
			for v in n {
				format::write_scalar::<LittleEndian>(writer, ScalarType::Float32, *v as f64)?;
			}
		}
	}
	for (_, values) in &set.attributes {
		for v in values {
			format::write_scalar::<LittleEndian>(writer, ScalarType::Float32, *v as f64)?;
		}
	}
	writer.flush()
}

fn element(name: &str, count: usize, properties: &[(&str, ScalarType)]) -> ElementSpec {
	ElementSpec {
		name: name.to_string(),
		count,
		properties: properties
			.iter()
			.map(|(name, dtype)| Property {
				name: name.to_string(),
				dtype: *dtype,
			})
			.collect(),
	}
}

/// Values at or below 1 are treated as normalized and scaled to 0-255 first.
fn quantize_colors(colors: &[[f32; 3]]) -> Vec<[u8; 3]> {
	let max = colors
		.iter()
		.flatten()
		.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
	let scale = if max <= 1.0 { 255.0 } else { 1.0 };
	colors
		.iter()
		.map(|c| {
			[
				(c[0] * scale).clamp(0.0, 255.0) as u8,
				(c[1] * scale).clamp(0.0, 255.0) as u8,
				(c[2] * scale).clamp(0.0, 255.0) as u8,
			]
		})
		.collect()
}

fn scalar_field_name(name: &str) -> String {
	let name = name.trim().replace(' ', "_");
	if name.contains("scalar") {
		name
	} else {
		format!("scalar_{}", name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::tempdir;

	fn sample_positions() -> Vec<[f64; 3]> {
		vec![
			[0.0, 0.25, -10.5],
			[1.0e6, -2.0e-7, 3.125],
			[42.0, 42.0, 42.0],
		]
	}

	#[test]
	fn test_round_trip_positions_exact() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("points.ply");
		let set = PointSet::new(sample_positions());
		encode(&set, &path).unwrap();
		assert_eq!(decode(&path).unwrap(), set);
	}

	#[test]
	fn test_round_trip_color_within_quantization() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("points.ply");
		let colors = vec![
			[0.0, 0.5, 1.0],
			[0.1, 0.2, 0.3],
			[0.99, 0.01, 0.66],
		];
		let set = PointSet::new(sample_positions()).with_colors(colors.clone());
		encode(&set, &path).unwrap();
		let loaded = decode(&path).unwrap();
		for (a, b) in loaded.colors.unwrap().iter().zip(&colors) {
			for (x, y) in a.iter().zip(b) {
				assert!((x - y).abs() <= 1.0 / 255.0, "{} vs {}", x, y);
			}
		}
	}

	#[test]
	fn test_round_trip_normals_and_attributes() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("points.ply");
		let mut set = PointSet::new(sample_positions())
			.with_normals(vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
		set.push_attribute("intensity", vec![0.5, 1.5, 2.5]).unwrap();
		set.push_attribute("class", vec![1.0, 2.0, 3.0]).unwrap();
		encode(&set, &path).unwrap();
		let loaded = decode(&path).unwrap();
		assert_eq!(loaded.normals, set.normals);
		assert_eq!(loaded.attributes, set.attributes);
	}

	#[test]
	fn test_scalar_prefix_written_to_disk() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("points.ply");
		let mut set = PointSet::new(sample_positions());
		set.push_attribute("my field", vec![1.0, 2.0, 3.0]).unwrap();
		set.push_attribute("scalar_other", vec![4.0, 5.0, 6.0]).unwrap();
		encode(&set, &path).unwrap();

		let bytes = fs::read(&path).unwrap();
		let header_end = b"end_header\n";
		let end = bytes
			.windows(header_end.len())
			.position(|w| w == header_end)
			.unwrap();
		let header = std::str::from_utf8(&bytes[..end]).unwrap();
		assert!(header.contains("element scalar_my_field 3"));
		assert!(header.contains("property float scalar_my_field"));
		// already marked, no double prefix
		assert!(header.contains("element scalar_other 3"));
		assert!(!header.contains("scalar_scalar_other"));

		// names come back without the marker
		let loaded = decode(&path).unwrap();
		assert_eq!(loaded.attributes[0].0, "my_field");
		assert_eq!(loaded.attributes[1].0, "other");
	}

	#[test]
	fn test_missing_geometry_fails() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("bad.ply");
		fs::write(
			&path,
			"ply\nformat ascii 1.0\nelement color 1\nproperty uchar r\n\
			property uchar g\nproperty uchar b\nend_header\n255 0 0\n",
		)
		.unwrap();
		assert!(matches!(decode(&path), Err(Error::Decode(_))));
	}

	#[test]
	fn test_decodes_ascii_vertex_with_embedded_fields() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("ascii.ply");
		fs::write(
			&path,
			"ply\nformat ascii 1.0\nelement vertex 2\n\
			property float x\nproperty float y\nproperty float z\n\
			property uchar red\nproperty uchar green\nproperty uchar blue\n\
			property float nx\nproperty float ny\nproperty float nz\n\
			property float intensity\nend_header\n\
			0 0 0 255 0 0 0 0 1 7.5\n\
			1 1 1 0 255 0 1 0 0 8.5\n",
		)
		.unwrap();
		let set = decode(&path).unwrap();
		assert_eq!(set.len(), 2);
		let colors = set.colors.unwrap();
		assert!((colors[0][0] - 1.0).abs() < 1e-6);
		assert!((colors[1][1] - 1.0).abs() < 1e-6);
		assert_eq!(set.normals.unwrap()[1], [1.0, 0.0, 0.0]);
		assert_eq!(set.attributes, vec![("intensity".to_string(), vec![7.5, 8.5])]);
	}
}
