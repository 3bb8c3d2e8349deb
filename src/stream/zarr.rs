use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const COMPRESSION_LEVEL: i32 = 3;
const ELEMENT_SIZE: usize = 4; // every array is float32

/// Minimal Zarr v2 directory store: one group of float32 arrays, each
/// stored as a single compression block (byte shuffle + zstd). Root
/// attributes are written separately so callers can make them the last
/// thing on disk.
pub struct ZarrGroup {
	root: PathBuf,
}

impl ZarrGroup {
	/// Create (or fully replace) the store directory. The store is never
	/// updated incrementally.
	pub fn create(path: &Path) -> Result<ZarrGroup> {
		if path.exists() {
			fs::remove_dir_all(path)
				.map_err(|e| Error::write(format!("clearing {}: {}", path.display(), e)))?;
		}
		fs::create_dir_all(path)
			.map_err(|e| Error::write(format!("creating {}: {}", path.display(), e)))?;
		let group = ZarrGroup {
			root: path.to_path_buf(),
		};
		group.write_json(&path.join(".zgroup"), &json!({ "zarr_format": 2 }))?;
		Ok(group)
	}

	/// Write one `[rows, cols]` float32 array as a single chunk.
	pub fn write_array(&self, name: &str, rows: usize, cols: usize, data: &[f32]) -> Result<()> {
		debug_assert_eq!(data.len(), rows * cols);
		let dir = self.root.join(name);
		fs::create_dir_all(&dir)
			.map_err(|e| Error::write(format!("creating array {}: {}", name, e)))?;

		let metadata = json!({
			"zarr_format": 2,
			"shape": [rows, cols],
			"chunks": [rows, cols],
			"dtype": "<f4",
			"order": "C",
			"fill_value": 0.0,
			"compressor": { "id": "zstd", "level": COMPRESSION_LEVEL },
			"filters": [{ "id": "shuffle", "elementsize": ELEMENT_SIZE }],
		});
		self.write_json(&dir.join(".zarray"), &metadata)?;

		let mut bytes = Vec::with_capacity(data.len() * ELEMENT_SIZE);
		for v in data {
			bytes.extend_from_slice(&v.to_le_bytes());
		}
		let shuffled = shuffle(&bytes, ELEMENT_SIZE);
		let compressed = zstd::encode_all(&shuffled[..], COMPRESSION_LEVEL)
			.map_err(|e| Error::write(format!("compressing array {}: {}", name, e)))?;
		fs::write(dir.join("0.0"), compressed)
			.map_err(|e| Error::write(format!("writing array {}: {}", name, e)))
	}

	/// Attach the root attributes. Callers invoke this last: a store
	/// without `.zattrs` is incomplete and must be ignored by readers.
	pub fn write_attrs(&self, attrs: &Map<String, Value>) -> Result<()> {
		self.write_json(&self.root.join(".zattrs"), &Value::Object(attrs.clone()))
	}

	fn write_json(&self, path: &Path, value: &Value) -> Result<()> {
		let text = serde_json::to_string_pretty(value)
			.map_err(|e| Error::write(format!("serializing {}: {}", path.display(), e)))?;
		fs::write(path, text)
			.map_err(|e| Error::write(format!("writing {}: {}", path.display(), e)))
	}
}

/// Group byte 0 of every element together, then byte 1, and so on. Same-typed
/// bytes sit next to each other afterwards, which is where the entropy coder
/// earns its keep on regular numeric data.
fn shuffle(bytes: &[u8], element_size: usize) -> Vec<u8> {
	let count = bytes.len() / element_size;
	let mut out = vec![0u8; bytes.len()];
	for i in 0..count {
		for j in 0..element_size {
			out[j * count + i] = bytes[i * element_size + j];
		}
	}
	out
}

#[cfg(test)]
fn unshuffle(bytes: &[u8], element_size: usize) -> Vec<u8> {
	let count = bytes.len() / element_size;
	let mut out = vec![0u8; bytes.len()];
	for i in 0..count {
		for j in 0..element_size {
			out[i * element_size + j] = bytes[j * count + i];
		}
	}
	out
}

#[cfg(test)]
pub fn read_array(store: &Path, name: &str) -> (Vec<usize>, Vec<f32>) {
	let dir = store.join(name);
	let metadata: Value =
		serde_json::from_str(&fs::read_to_string(dir.join(".zarray")).unwrap()).unwrap();
	let shape: Vec<usize> = metadata["shape"]
		.as_array()
		.unwrap()
		.iter()
		.map(|v| v.as_u64().unwrap() as usize)
		.collect();
	let compressed = fs::read(dir.join("0.0")).unwrap();
	let shuffled = zstd::decode_all(&compressed[..]).unwrap();
	let bytes = unshuffle(&shuffled, ELEMENT_SIZE);
	let values = bytes
		.chunks_exact(ELEMENT_SIZE)
		.map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
		.collect();
	(shape, values)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use tempfile::tempdir;

	#[test]
	fn test_shuffle_round_trip() {
		let bytes: Vec<u8> = (0u8..40).collect();
		let shuffled = shuffle(&bytes, 4);
		assert_eq!(unshuffle(&shuffled, 4), bytes);
		// first output run is byte 0 of every element
		assert_eq!(&shuffled[..10], &[0, 4, 8, 12, 16, 20, 24, 28, 32, 36]);
	}

	#[test]
	fn test_array_round_trip() {
		let dir = tempdir().unwrap();
		let store = dir.path().join("cloud.zarr");
		let group = ZarrGroup::create(&store).unwrap();
		let data: Vec<f32> = (0..12).map(|v| v as f32 * 0.5).collect();
		group.write_array("c0", 4, 3, &data).unwrap();

		assert!(store.join(".zgroup").exists());
		let (shape, values) = read_array(&store, "c0");
		assert_eq!(shape, vec![4, 3]);
		assert_eq!(values, data);
	}

	#[test]
	fn test_create_replaces_existing_store() {
		let dir = tempdir().unwrap();
		let store = dir.path().join("cloud.zarr");
		let group = ZarrGroup::create(&store).unwrap();
		group.write_array("c0", 1, 3, &[1.0, 2.0, 3.0]).unwrap();
		drop(group);

		let group = ZarrGroup::create(&store).unwrap();
		let mut attrs = Map::new();
		attrs.insert("total".to_string(), json!(0));
		group.write_attrs(&attrs).unwrap();
		assert!(!store.join("c0").exists());
		assert!(store.join(".zattrs").exists());
	}
}
