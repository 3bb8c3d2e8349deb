use pcd_rs::{anyhow, DynReader, DynRecord};

use crate::error::{Error, Result};
use crate::model::cloud::PointSet;

/// Read positions from a PCD buffer into a point set.
pub fn from_pcd(buf: &[u8]) -> Result<PointSet> {
    let reader =
        DynReader::from_bytes(buf).map_err(|e| Error::decode(format!("pcd: {}", e)))?;
    let pcd: std::result::Result<Vec<DynRecord>, anyhow::Error> = reader.collect();
    let pcd = pcd.map_err(|e| Error::decode(format!("pcd: {}", e)))?;

    let mut positions = Vec::with_capacity(pcd.len());
    for point in pcd.iter() {
        let [x, y, z] = point
            .to_owned()
            .xyz::<f64>()
            .ok_or_else(|| Error::decode("pcd: record has no x/y/z fields"))?;
        positions.push([x, y, z]);
    }

    Ok(PointSet::new(positions))
}
