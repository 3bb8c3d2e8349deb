use thiserror::Error;

/// Failure categories for the converter. Every validation error is raised
/// before any destructive I/O happens.
#[derive(Debug, Error)]
pub enum Error {
	#[error("Decode error: {0}")]
	Decode(String),

	#[error("Encode error: {0}")]
	Encode(String),

	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Write error: {0}")]
	Write(String),
}

impl Error {
	pub fn decode<T: ToString>(msg: T) -> Error {
		Error::Decode(msg.to_string())
	}

	pub fn encode<T: ToString>(msg: T) -> Error {
		Error::Encode(msg.to_string())
	}

	pub fn invalid_argument<T: ToString>(msg: T) -> Error {
		Error::InvalidArgument(msg.to_string())
	}

	pub fn write<T: ToString>(msg: T) -> Error {
		Error::Write(msg.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
