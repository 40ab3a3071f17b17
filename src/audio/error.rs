//! HAL error types
//!
//! Every backend maps its native status codes onto these variants.
//! Status codes are kept as `i32` so the four-char names can be shown.

use std::fmt;

use crate::audio::types::{AudioObjectId, PropertyAddress};

/// HAL status codes (four-char codes packed big-endian into an `i32`)
pub mod status {
    pub const NO_ERROR: i32 = 0;
    pub const NOT_RUNNING: i32 = fourcc(b"stop");
    pub const UNSPECIFIED: i32 = fourcc(b"what");
    pub const UNKNOWN_PROPERTY: i32 = fourcc(b"who?");
    pub const BAD_PROPERTY_SIZE: i32 = fourcc(b"!siz");
    pub const ILLEGAL_OPERATION: i32 = fourcc(b"nope");
    pub const BAD_OBJECT: i32 = fourcc(b"!obj");
    pub const BAD_DEVICE: i32 = fourcc(b"!dev");
    pub const BAD_STREAM: i32 = fourcc(b"!str");
    pub const UNSUPPORTED_OPERATION: i32 = fourcc(b"unop");
    pub const NOT_READY: i32 = fourcc(b"nrdy");
    pub const PERMISSIONS: i32 = fourcc(b"!hog");

    const fn fourcc(code: &[u8; 4]) -> i32 {
        u32::from_be_bytes(*code) as i32
    }
}

/// Render a status code as its four-char name when it is printable,
/// otherwise as a plain number.
pub fn status_name(code: i32) -> String {
    let bytes = (code as u32).to_be_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!("'{}'", String::from_utf8_lossy(&bytes))
    } else {
        code.to_string()
    }
}

/// Unified error type for HAL operations
#[derive(Debug, Clone, PartialEq)]
pub enum AudioHalError {
    /// Device not found or unavailable
    DeviceNotFound(String),
    /// The object does not expose the requested property
    PropertyUnavailable {
        object: AudioObjectId,
        address: PropertyAddress,
    },
    /// Property value had an unexpected type or size
    InvalidPropertyValue {
        address: PropertyAddress,
        reason: String,
    },
    /// Aggregate composition rejected before reaching the HAL
    InvalidComposition(String),
    /// HAL/System API error
    SystemError { code: i32, message: String },
    /// Preset file could not be read or parsed
    Config(String),
    /// Operation not supported on this platform
    NotSupported(String),
    /// Generic error
    Other(String),
}

impl AudioHalError {
    pub fn system(code: i32, message: impl Into<String>) -> Self {
        Self::SystemError {
            code,
            message: message.into(),
        }
    }

    /// HAL status carried by this error, if any
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::SystemError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for AudioHalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound(name) => write!(f, "Device not found: {}", name),
            Self::PropertyUnavailable { object, address } => {
                write!(f, "Object {} has no property {}", object, address)
            }
            Self::InvalidPropertyValue { address, reason } => {
                write!(f, "Invalid value for property {}: {}", address, reason)
            }
            Self::InvalidComposition(e) => write!(f, "Invalid aggregate composition: {}", e),
            Self::SystemError { code, message } => {
                write!(f, "System error {}: {}", status_name(*code), message)
            }
            Self::Config(e) => write!(f, "Configuration error: {}", e),
            Self::NotSupported(op) => write!(f, "Not supported: {}", op),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AudioHalError {}

/// Result type alias for HAL operations
pub type Result<T> = std::result::Result<T, AudioHalError>;
