pub mod cluster;
pub mod csv_reader;
pub mod dedupe;
pub mod error;
pub mod export;
pub mod model;
pub mod pcd_reader;
pub mod ply;
pub mod stream;

pub use error::{Error, Result};
pub use export::{export_cloud, export_point_set, ExportOptions};
pub use model::cloud::PointSet;
pub use model::matrix::PointMatrix;
pub use model::style::{
	BandPredicate, BandScale, CompareOp, Group, GroupSpec, Ramp, RampLimits, Style, StyleSheet,
};
pub use stream::writer::StoreSummary;
