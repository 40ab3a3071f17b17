//! HAL backend abstraction layer
//!
//! This trait is the generic property-address/get/set surface of the audio
//! hardware object model. Everything typed (device UIDs, sub-device latency,
//! aggregate membership) is built on top of it in `crate::device`.
//!
//! # Important
//!
//! This file must NOT contain any platform-specific imports (coreaudio-sys, etc.).
//! All platform-specific code goes in the implementation files.

use crate::aggregate::AggregateDescription;
use crate::audio::error::Result;
use crate::audio::types::*;

/// Core HAL backend trait
///
/// Implementations provide:
/// - Property presence checks and settability
/// - Raw property reads and writes on any object
/// - UID to object id translation
/// - Aggregate device creation and destruction
///
/// # Example
///
/// ```ignore
/// let backend = create_backend()?;
///
/// let devices: Vec<AudioObjectId> = match backend.get_property(
///     SYSTEM_OBJECT,
///     &PropertyAddress::global(Selector::DEVICES),
///     PropertyKind::ObjectList,
/// )? {
///     PropertyValue::ObjectList(ids) => ids,
///     _ => Vec::new(),
/// };
/// ```
pub trait AudioBackend: Send + Sync {
    // === Property Access ===

    /// Whether `object` exposes the property at `address`
    fn has_property(&self, object: AudioObjectId, address: &PropertyAddress) -> bool;

    /// Whether the property at `address` can be written
    fn is_property_settable(&self, object: AudioObjectId, address: &PropertyAddress)
        -> Result<bool>;

    /// Read a property, interpreting its data as `kind`
    fn get_property(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        kind: PropertyKind,
    ) -> Result<PropertyValue>;

    /// Write a property
    fn set_property(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        value: &PropertyValue,
    ) -> Result<()>;

    // === Device Lookup ===

    /// Resolve a device UID to the object id currently carrying it
    ///
    /// Returns `Ok(None)` when no device has this UID.
    fn translate_uid(&self, uid: &str) -> Result<Option<AudioObjectId>>;

    // === Aggregate Devices ===

    /// Ask the HAL to instantiate an aggregate device
    fn create_aggregate_device(&self, description: &AggregateDescription)
        -> Result<AudioObjectId>;

    /// Destroy an aggregate device
    ///
    /// The HAL may finish the destruction asynchronously, after this call
    /// has returned.
    fn destroy_aggregate_device(&self, id: AudioObjectId) -> Result<()>;

    // === Info ===

    /// Get the backend name (e.g., "CoreAudio", "Memory")
    fn name(&self) -> &'static str;
}

/// Factory function to create the appropriate backend for the current platform
pub fn create_backend() -> Result<Box<dyn AudioBackend>> {
    #[cfg(target_os = "macos")]
    {
        use crate::audio::coreaudio_backend::CoreAudioBackend;
        Ok(Box::new(CoreAudioBackend::new()))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Err(crate::audio::error::AudioHalError::NotSupported(
            "No native audio HAL for this platform".to_string(),
        ))
    }
}
