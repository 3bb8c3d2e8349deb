use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::json;

/// Linear clamp of one band into the [0, 1] display range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandScale {
	pub band: usize,
	pub min: f64,
	pub max: f64,
}

impl BandScale {
	pub fn new(band: usize, min: f64, max: f64) -> BandScale {
		BandScale { band, min, max }
	}
}

/// Colour ramp selector: either a ramp name known to the viewer
/// (e.g. "viridis", "spectral") or an explicit ordered colour list.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Ramp {
	Named(String),
	Colors(Vec<String>),
}

impl Ramp {
	pub fn named(name: impl Into<String>) -> Ramp {
		Ramp::Named(name.into())
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RampLimits {
	pub min: f64,
	pub max: f64,
	pub steps: u32,
}

/// A named colour-mapping rule. The serialized form is the viewer's JSON
/// contract and must not change shape:
///
/// ternary: `{"color": {"R": [i, min, max], "G": ..., "B": ...}}`
/// ramp:    `{"color": [i, {"scale": ..., "limits": [min, max, steps]}]}`
#[derive(Clone, Debug, PartialEq)]
pub enum Style {
	Ternary {
		r: BandScale,
		g: BandScale,
		b: BandScale,
	},
	Ramp {
		band: usize,
		scale: Ramp,
		limits: RampLimits,
	},
}

impl Serialize for Style {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let value = match self {
			Style::Ternary { r, g, b } => json!({
				"color": {
					"R": [r.band, r.min, r.max],
					"G": [g.band, g.min, g.max],
					"B": [b.band, b.min, b.max],
				}
			}),
			Style::Ramp {
				band,
				scale,
				limits,
			} => json!({
				"color": [band, {
					"scale": scale,
					"limits": [limits.min, limits.max, limits.steps],
				}]
			}),
		};
		value.serialize(serializer)
	}
}

/// Ordered style name -> rule map attached to every exported store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleSheet {
	entries: Vec<(String, Style)>,
}

impl StyleSheet {
	pub fn new() -> StyleSheet {
		StyleSheet::default()
	}

	pub fn insert(mut self, name: impl Into<String>, style: Style) -> StyleSheet {
		let name = name.into();
		if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
			entry.1 = style;
		} else {
			self.entries.push((name, style));
		}
		self
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.iter().any(|(n, _)| n == name)
	}

	pub fn names(&self) -> Vec<String> {
		self.entries.iter().map(|(n, _)| n.clone()).collect()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Fallback stylesheet for a band matrix of the given width: true-colour
	/// RGB when the matrix carries colour bands, otherwise a viridis
	/// elevation ramp.
	pub fn default_for_width(cols: usize) -> StyleSheet {
		if cols >= 6 {
			StyleSheet::new().insert(
				"rgb",
				Style::Ternary {
					r: BandScale::new(3, 0.0, 1.0),
					g: BandScale::new(4, 0.0, 1.0),
					b: BandScale::new(5, 0.0, 1.0),
				},
			)
		} else {
			StyleSheet::new().insert(
				"elev",
				Style::Ramp {
					band: 2,
					scale: Ramp::named("viridis"),
					limits: RampLimits {
						min: -100.0,
						max: 100.0,
						steps: 255,
					},
				},
			)
		}
	}
}

impl Serialize for StyleSheet {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;
		for (name, style) in &self.entries {
			map.serialize_entry(name, style)?;
		}
		map.end()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
	Eq,
	Ne,
	Gt,
	Lt,
	Ge,
	Le,
}

impl CompareOp {
	pub fn as_str(&self) -> &'static str {
		match self {
			CompareOp::Eq => "=",
			CompareOp::Ne => "!=",
			CompareOp::Gt => ">",
			CompareOp::Lt => "<",
			CompareOp::Ge => ">=",
			CompareOp::Le => "<=",
		}
	}
}

/// Predicate over one band, serialized as `[band, "op", value]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandPredicate {
	pub band: usize,
	pub op: CompareOp,
	pub value: f64,
}

impl BandPredicate {
	pub fn new(band: usize, op: CompareOp, value: f64) -> BandPredicate {
		BandPredicate { band, op, value }
	}
}

impl Serialize for BandPredicate {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		json!([self.band, self.op.as_str(), self.value]).serialize(serializer)
	}
}

/// A highlight/mask toggle shown by the viewer. `iq` selects points to
/// highlight, `mask` selects points to hide; a group may carry either or
/// both.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
	pub blend: Option<f64>,
	pub color: Option<[f64; 3]>,
	pub iq: Option<BandPredicate>,
	pub mask: Option<BandPredicate>,
}

impl Serialize for Group {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let len = self.blend.is_some() as usize
			+ self.color.is_some() as usize
			+ self.iq.is_some() as usize
			+ self.mask.is_some() as usize;
		let mut map = serializer.serialize_map(Some(len))?;
		if let Some(blend) = self.blend {
			map.serialize_entry("blend", &blend)?;
		}
		if let Some(color) = self.color {
			map.serialize_entry("color", &color)?;
		}
		if let Some(iq) = &self.iq {
			map.serialize_entry("iq", iq)?;
		}
		if let Some(mask) = &self.mask {
			map.serialize_entry("mask", mask)?;
		}
		map.end()
	}
}

/// Ordered group name -> definition map, passed through to the store
/// metadata under the "groups" key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupSpec {
	entries: Vec<(String, Group)>,
}

impl GroupSpec {
	pub fn new() -> GroupSpec {
		GroupSpec::default()
	}

	pub fn insert(mut self, name: impl Into<String>, group: Group) -> GroupSpec {
		let name = name.into();
		if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
			entry.1 = group;
		} else {
			self.entries.push((name, group));
		}
		self
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl Serialize for GroupSpec {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;
		for (name, group) in &self.entries {
			map.serialize_entry(name, group)?;
		}
		map.end()
	}
}
