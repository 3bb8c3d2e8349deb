use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{BufRead, Read, Write};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
	Int8,
	UInt8,
	Int16,
	UInt16,
	Int32,
	UInt32,
	Float32,
	Float64,
}

impl ScalarType {
	pub fn parse(token: &str) -> Option<ScalarType> {
		match token {
			"char" | "int8" => Some(ScalarType::Int8),
			"uchar" | "uint8" => Some(ScalarType::UInt8),
			"short" | "int16" => Some(ScalarType::Int16),
			"ushort" | "uint16" => Some(ScalarType::UInt16),
			"int" | "int32" => Some(ScalarType::Int32),
			"uint" | "uint32" => Some(ScalarType::UInt32),
			"float" | "float32" => Some(ScalarType::Float32),
			"double" | "float64" => Some(ScalarType::Float64),
			_ => None,
		}
	}

	pub fn keyword(&self) -> &'static str {
		match self {
			ScalarType::Int8 => "char",
			ScalarType::UInt8 => "uchar",
			ScalarType::Int16 => "short",
			ScalarType::UInt16 => "ushort",
			ScalarType::Int32 => "int",
			ScalarType::UInt32 => "uint",
			ScalarType::Float32 => "float",
			ScalarType::Float64 => "double",
		}
	}
}

#[derive(Clone, Debug)]
pub struct Property {
	pub name: String,
	pub dtype: ScalarType,
}

#[derive(Clone, Debug)]
pub struct ElementSpec {
	pub name: String,
	pub count: usize,
	pub properties: Vec<Property>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyEncoding {
	Ascii,
	BinaryLittleEndian,
	BinaryBigEndian,
}

pub struct Header {
	pub encoding: BodyEncoding,
	pub elements: Vec<ElementSpec>,
}

/// One decoded element: its header description plus a value column per
/// property.
pub struct ElementData {
	pub spec: ElementSpec,
	pub columns: Vec<Vec<f64>>,
}

impl ElementData {
	pub fn column(&self, name: &str) -> Option<&Vec<f64>> {
		self.spec
			.properties
			.iter()
			.position(|p| p.name == name)
			.map(|i| &self.columns[i])
	}
}

fn next_line(reader: &mut impl BufRead) -> Result<String> {
	let mut line = String::new();
	let read = reader
		.read_line(&mut line)
		.map_err(|e| Error::decode(format!("reading header: {}", e)))?;
	if read == 0 {
		return Err(Error::decode("unexpected end of file in header"));
	}
	Ok(line.trim_end().to_string())
}

pub fn read_header(reader: &mut impl BufRead) -> Result<Header> {
	if next_line(reader)? != "ply" {
		return Err(Error::decode("not a PLY file (missing magic line)"));
	}

	let mut encoding = None;
	let mut elements: Vec<ElementSpec> = Vec::new();
	loop {
		let line = next_line(reader)?;
		let tokens: Vec<&str> = line.split_whitespace().collect();
		match tokens.first() {
			None | Some(&"comment") | Some(&"obj_info") => continue,
			Some(&"format") => {
				encoding = Some(match tokens.get(1) {
					Some(&"ascii") => BodyEncoding::Ascii,
					Some(&"binary_little_endian") => BodyEncoding::BinaryLittleEndian,
					Some(&"binary_big_endian") => BodyEncoding::BinaryBigEndian,
					other => {
						return Err(Error::decode(format!(
							"unsupported format {:?}",
							other.unwrap_or(&"")
						)))
					}
				});
			}
			Some(&"element") => {
				if tokens.len() != 3 {
					return Err(Error::decode(format!("malformed element line: {}", line)));
				}
				let count = tokens[2]
					.parse()
					.map_err(|_| Error::decode(format!("bad element count: {}", line)))?;
				elements.push(ElementSpec {
					name: tokens[1].to_string(),
					count,
					properties: Vec::new(),
				});
			}
			Some(&"property") => {
				if tokens.get(1) == Some(&"list") {
					return Err(Error::decode("list properties are not supported"));
				}
				let (dtype, name) = match (tokens.get(1), tokens.get(2)) {
					(Some(t), Some(n)) => match ScalarType::parse(t) {
						Some(dtype) => (dtype, n.to_string()),
						None => {
							return Err(Error::decode(format!("unknown property type {}", t)))
						}
					},
					_ => return Err(Error::decode(format!("malformed property line: {}", line))),
				};
				match elements.last_mut() {
					Some(element) => element.properties.push(Property { name, dtype }),
					None => return Err(Error::decode("property before any element")),
				}
			}
			Some(&"end_header") => break,
			Some(other) => {
				return Err(Error::decode(format!("unknown header keyword {}", other)))
			}
		}
	}

	match encoding {
		Some(encoding) => Ok(Header { encoding, elements }),
		None => Err(Error::decode("header has no format line")),
	}
}

pub fn read_body(reader: &mut impl BufRead, header: &Header) -> Result<Vec<ElementData>> {
	match header.encoding {
		BodyEncoding::Ascii => read_ascii_body(reader, header),
		BodyEncoding::BinaryLittleEndian => read_binary_body::<byteorder::LittleEndian>(reader, header),
		BodyEncoding::BinaryBigEndian => read_binary_body::<BigEndian>(reader, header),
	}
}

fn read_ascii_body(reader: &mut impl BufRead, header: &Header) -> Result<Vec<ElementData>> {
	let mut out = Vec::with_capacity(header.elements.len());
	for spec in &header.elements {
		let mut columns = vec![Vec::with_capacity(spec.count); spec.properties.len()];
		for _ in 0..spec.count {
			let line = next_line(reader)?;
			let tokens: Vec<&str> = line.split_whitespace().collect();
			if tokens.len() != spec.properties.len() {
				return Err(Error::decode(format!(
					"element {} expects {} values per row, got {}",
					spec.name,
					spec.properties.len(),
					tokens.len()
				)));
			}
			for (token, column) in tokens.iter().zip(columns.iter_mut()) {
				let value = token
					.parse::<f64>()
					.map_err(|_| Error::decode(format!("bad numeric value {}", token)))?;
				column.push(value);
			}
		}
		out.push(ElementData {
			spec: spec.clone(),
			columns,
		});
	}
	Ok(out)
}

fn read_binary_body<E: ByteOrder>(
	reader: &mut impl BufRead,
	header: &Header,
) -> Result<Vec<ElementData>> {
	let mut out = Vec::with_capacity(header.elements.len());
	for spec in &header.elements {
		let mut columns = vec![Vec::with_capacity(spec.count); spec.properties.len()];
		for _ in 0..spec.count {
			for (property, column) in spec.properties.iter().zip(columns.iter_mut()) {
				let value = read_scalar::<E>(reader, property.dtype).map_err(|_| {
					Error::decode(format!("unexpected end of data in element {}", spec.name))
				})?;
				column.push(value);
			}
		}
		out.push(ElementData {
			spec: spec.clone(),
			columns,
		});
	}
	Ok(out)
}

fn read_scalar<E: ByteOrder>(reader: &mut impl Read, dtype: ScalarType) -> std::io::Result<f64> {
	Ok(match dtype {
		ScalarType::Int8 => reader.read_i8()? as f64,
		ScalarType::UInt8 => reader.read_u8()? as f64,
		ScalarType::Int16 => reader.read_i16::<E>()? as f64,
		ScalarType::UInt16 => reader.read_u16::<E>()? as f64,
		ScalarType::Int32 => reader.read_i32::<E>()? as f64,
		ScalarType::UInt32 => reader.read_u32::<E>()? as f64,
		ScalarType::Float32 => reader.read_f32::<E>()? as f64,
		ScalarType::Float64 => reader.read_f64::<E>()?,
	})
}

pub fn write_header(writer: &mut impl Write, header: &Header) -> std::io::Result<()> {
	writeln!(writer, "ply")?;
	let format = match header.encoding {
		BodyEncoding::Ascii => "ascii",
		BodyEncoding::BinaryLittleEndian => "binary_little_endian",
		BodyEncoding::BinaryBigEndian => "binary_big_endian",
	};
	writeln!(writer, "format {} 1.0", format)?;
	for element in &header.elements {
		writeln!(writer, "element {} {}", element.name, element.count)?;
		for property in &element.properties {
			writeln!(
				writer,
				"property {} {}",
				property.dtype.keyword(),
				property.name
			)?;
		}
	}
	writeln!(writer, "end_header")
}

/// Values are truncated to the property type, mirroring a plain numeric cast.
pub fn write_scalar<E: ByteOrder>(
	writer: &mut impl Write,
	dtype: ScalarType,
	value: f64,
) -> std::io::Result<()> {
	match dtype {
		ScalarType::Int8 => writer.write_i8(value as i8),
		ScalarType::UInt8 => writer.write_u8(value as u8),
		ScalarType::Int16 => writer.write_i16::<E>(value as i16),
		ScalarType::UInt16 => writer.write_u16::<E>(value as u16),
		ScalarType::Int32 => writer.write_i32::<E>(value as i32),
		ScalarType::UInt32 => writer.write_u32::<E>(value as u32),
		ScalarType::Float32 => writer.write_f32::<E>(value as f32),
		ScalarType::Float64 => writer.write_f64::<E>(value),
	}
}
