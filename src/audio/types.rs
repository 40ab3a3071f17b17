//! Shared HAL types used by all backends
//!
//! Property addressing, object classes and typed property values.
//! NO platform-specific imports allowed here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an object in the HAL object model
pub type AudioObjectId = u32;

/// The object that owns the device list and the default-device properties
pub const SYSTEM_OBJECT: AudioObjectId = 1;

/// Sentinel the HAL uses for "no object"
pub const UNKNOWN_OBJECT: AudioObjectId = 0;

/// Main element of every property (`kAudioObjectPropertyElementMain`)
pub const ELEMENT_MAIN: u32 = 0;

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

fn fmt_fourcc(value: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let bytes = value.to_be_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        write!(f, "'{}'", String::from_utf8_lossy(&bytes))
    } else {
        write!(f, "{:#010x}", value)
    }
}

/// Property selector (four-char code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(pub u32);

impl Selector {
    // System object
    pub const DEVICES: Self = Self(fourcc(b"dev#"));
    pub const DEFAULT_INPUT_DEVICE: Self = Self(fourcc(b"dIn "));
    pub const DEFAULT_OUTPUT_DEVICE: Self = Self(fourcc(b"dOut"));
    pub const DEFAULT_SYSTEM_OUTPUT_DEVICE: Self = Self(fourcc(b"sOut"));
    pub const TRANSLATE_UID_TO_DEVICE: Self = Self(fourcc(b"uidd"));

    // Any object
    pub const CLASS: Self = Self(fourcc(b"clas"));
    pub const BASE_CLASS: Self = Self(fourcc(b"bcls"));
    pub const OWNED_OBJECTS: Self = Self(fourcc(b"ownd"));
    pub const NAME: Self = Self(fourcc(b"lnam"));
    pub const MANUFACTURER: Self = Self(fourcc(b"lmak"));

    // Devices
    pub const DEVICE_UID: Self = Self(fourcc(b"uid "));
    pub const NOMINAL_SAMPLE_RATE: Self = Self(fourcc(b"nsrt"));
    pub const STREAM_CONFIGURATION: Self = Self(fourcc(b"slay"));

    // Aggregate devices
    pub const AGGREGATE_ACTIVE_SUB_DEVICE_LIST: Self = Self(fourcc(b"agrp"));
    pub const AGGREGATE_MAIN_SUB_DEVICE: Self = Self(fourcc(b"amst"));
    pub const AGGREGATE_CLOCK_DEVICE: Self = Self(fourcc(b"apcd"));

    // Sub-devices
    pub const SUB_DEVICE_EXTRA_LATENCY: Self = Self(fourcc(b"xltc"));
    pub const SUB_DEVICE_DRIFT_COMPENSATION: Self = Self(fourcc(b"drft"));
    pub const SUB_DEVICE_DRIFT_COMPENSATION_QUALITY: Self = Self(fourcc(b"drfq"));
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_fourcc(self.0, f)
    }
}

/// Property scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Input,
    Output,
    PlayThrough,
}

impl Scope {
    pub const fn code(self) -> u32 {
        match self {
            Self::Global => fourcc(b"glob"),
            Self::Input => fourcc(b"inpt"),
            Self::Output => fourcc(b"outp"),
            Self::PlayThrough => fourcc(b"ptru"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_fourcc(self.code(), f)
    }
}

/// Full address of a property on an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyAddress {
    pub selector: Selector,
    pub scope: Scope,
    pub element: u32,
}

impl PropertyAddress {
    pub const fn global(selector: Selector) -> Self {
        Self::scoped(selector, Scope::Global)
    }

    pub const fn scoped(selector: Selector, scope: Scope) -> Self {
        Self {
            selector,
            scope,
            element: ELEMENT_MAIN,
        }
    }
}

impl fmt::Display for PropertyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.selector, self.scope, self.element)
    }
}

/// Object class identifiers (value of the `clas` property)
pub struct ObjectClass;

impl ObjectClass {
    pub const SYSTEM: u32 = fourcc(b"asys");
    pub const DEVICE: u32 = fourcc(b"adev");
    pub const AGGREGATE_DEVICE: u32 = fourcc(b"aagg");
    pub const SUB_DEVICE: u32 = fourcc(b"asub");
    pub const STREAM: u32 = fourcc(b"astr");

    /// Whether objects of this class can be driven as audio devices
    pub fn is_device(class: u32) -> bool {
        matches!(
            class,
            Self::DEVICE | Self::AGGREGATE_DEVICE | Self::SUB_DEVICE
        )
    }
}

/// Drift compensation quality presets (`kAudioSubDeviceDriftCompensation*Quality`)
pub struct DriftCompensationQuality;

impl DriftCompensationQuality {
    pub const MIN: u32 = 0x00;
    pub const LOW: u32 = 0x20;
    pub const MEDIUM: u32 = 0x40;
    pub const HIGH: u32 = 0x60;
    pub const MAX: u32 = 0x7F;
}

/// Shape of the data stored behind a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    U32,
    F64,
    String,
    ObjectList,
    /// Channel count of every buffer in a stream configuration
    StreamChannels,
}

/// A property value read from or written to the HAL
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    U32(u32),
    F64(f64),
    String(String),
    ObjectList(Vec<AudioObjectId>),
    StreamChannels(Vec<u32>),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::U32(_) => PropertyKind::U32,
            Self::F64(_) => PropertyKind::F64,
            Self::String(_) => PropertyKind::String,
            Self::ObjectList(_) => PropertyKind::ObjectList,
            Self::StreamChannels(_) => PropertyKind::StreamChannels,
        }
    }
}

/// Rust types that map onto a property value
///
/// Lets accessors be written once, generic over the value they read.
pub trait PropertyType: Sized {
    const KIND: PropertyKind;

    fn from_value(value: PropertyValue) -> Option<Self>;

    fn into_value(self) -> PropertyValue;
}

impl PropertyType for u32 {
    const KIND: PropertyKind = PropertyKind::U32;

    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::U32(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> PropertyValue {
        PropertyValue::U32(self)
    }
}

/// Booleans travel as `UInt32` (0 = false)
impl PropertyType for bool {
    const KIND: PropertyKind = PropertyKind::U32;

    fn from_value(value: PropertyValue) -> Option<Self> {
        u32::from_value(value).map(|v| v != 0)
    }

    fn into_value(self) -> PropertyValue {
        PropertyValue::U32(self as u32)
    }
}

impl PropertyType for f64 {
    const KIND: PropertyKind = PropertyKind::F64;

    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::F64(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> PropertyValue {
        PropertyValue::F64(self)
    }
}

impl PropertyType for String {
    const KIND: PropertyKind = PropertyKind::String;

    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> PropertyValue {
        PropertyValue::String(self)
    }
}

impl PropertyType for Vec<AudioObjectId> {
    const KIND: PropertyKind = PropertyKind::ObjectList;

    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::ObjectList(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> PropertyValue {
        PropertyValue::ObjectList(self)
    }
}

/// Snapshot of a device for display or serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// HAL object id
    pub id: AudioObjectId,
    /// Persistent device UID
    pub uid: Option<String>,
    /// Human-readable device name
    pub name: Option<String>,
    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,
    pub input_channels: u32,
    pub output_channels: u32,
    /// Current nominal sample rate
    pub sample_rate: Option<f64>,
    pub is_aggregate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_display() {
        assert_eq!(Selector::DEVICE_UID.to_string(), "'uid '");
        assert_eq!(Selector::AGGREGATE_MAIN_SUB_DEVICE.to_string(), "'amst'");
        assert_eq!(Selector(1).to_string(), "0x00000001");
    }

    #[test]
    fn test_selector_codes_match_hal() {
        // kAudioHardwarePropertyDevices
        assert_eq!(Selector::DEVICES.0, 0x6465_7623);
        // kAudioObjectPropertyOwnedObjects
        assert_eq!(Selector::OWNED_OBJECTS.0, 0x6f77_6e64);
        assert_eq!(Scope::Output.code(), 0x6f75_7470);
    }

    #[test]
    fn test_bool_travels_as_u32() {
        assert_eq!(true.into_value(), PropertyValue::U32(1));
        assert_eq!(bool::from_value(PropertyValue::U32(0)), Some(false));
        assert_eq!(bool::from_value(PropertyValue::U32(7)), Some(true));
        assert_eq!(bool::from_value(PropertyValue::F64(1.0)), None);
    }

    #[test]
    fn test_device_classes() {
        assert!(ObjectClass::is_device(ObjectClass::AGGREGATE_DEVICE));
        assert!(ObjectClass::is_device(ObjectClass::SUB_DEVICE));
        assert!(!ObjectClass::is_device(ObjectClass::STREAM));
    }

    #[test]
    fn test_address_display() {
        let address = PropertyAddress::scoped(Selector::STREAM_CONFIGURATION, Scope::Input);
        assert_eq!(address.to_string(), "'slay'/'inpt'/0");
    }
}
