//! Typed access to HAL device objects
//!
//! `AudioDevice` pairs an object id with the backend that owns it and turns
//! named properties into typed getters. Getters return `None` whenever the
//! object does not expose the property or the read fails.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::audio::backend::AudioBackend;
use crate::audio::error::{AudioHalError, Result};
use crate::audio::types::*;

/// A device object in the HAL
#[derive(Clone)]
pub struct AudioDevice {
    id: AudioObjectId,
    backend: Arc<dyn AudioBackend>,
}

impl AudioDevice {
    /// Wrap `id` if it names a device object
    ///
    /// Objects whose class is not a device class (streams, controls, the
    /// system object) are rejected.
    pub fn lookup_by_id(backend: &Arc<dyn AudioBackend>, id: AudioObjectId) -> Option<Self> {
        if id == UNKNOWN_OBJECT {
            return None;
        }

        let class_of = |selector| match backend.get_property(
            id,
            &PropertyAddress::global(selector),
            PropertyKind::U32,
        ) {
            Ok(PropertyValue::U32(class)) => Some(class),
            _ => None,
        };

        let is_device = class_of(Selector::CLASS).is_some_and(ObjectClass::is_device)
            || class_of(Selector::BASE_CLASS).is_some_and(ObjectClass::is_device);
        if !is_device {
            return None;
        }

        Some(Self {
            id,
            backend: Arc::clone(backend),
        })
    }

    /// Find the device currently carrying `uid`
    pub fn lookup_by_uid(backend: &Arc<dyn AudioBackend>, uid: &str) -> Option<Self> {
        match backend.translate_uid(uid) {
            Ok(Some(id)) => Self::lookup_by_id(backend, id),
            Ok(None) => None,
            Err(e) => {
                debug!("UID lookup for {} failed: {}", uid, e);
                None
            }
        }
    }

    pub fn id(&self) -> AudioObjectId {
        self.id
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    // === Generic Property Access ===

    /// The address of `selector` in `scope`, if this device has it
    pub fn valid_address(&self, selector: Selector, scope: Scope) -> Option<PropertyAddress> {
        let address = PropertyAddress::scoped(selector, scope);
        self.backend
            .has_property(self.id, &address)
            .then_some(address)
    }

    pub fn get_property<T: PropertyType>(&self, address: &PropertyAddress) -> Option<T> {
        match self.backend.get_property(self.id, address, T::KIND) {
            Ok(value) => T::from_value(value),
            Err(e) => {
                debug!("Reading {} on device {} failed: {}", address, self.id, e);
                None
            }
        }
    }

    pub fn set_property<T: PropertyType>(&self, address: &PropertyAddress, value: T) -> Result<()> {
        self.backend
            .set_property(self.id, address, &value.into_value())
    }

    pub fn is_settable(&self, selector: Selector, scope: Scope) -> bool {
        self.valid_address(selector, scope)
            .map(|address| {
                self.backend
                    .is_property_settable(self.id, &address)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Read a global-scope property if present
    pub(crate) fn global<T: PropertyType>(&self, selector: Selector) -> Option<T> {
        let address = self.valid_address(selector, Scope::Global)?;
        self.get_property(&address)
    }

    /// Write a global-scope property, failing if the device lacks it
    pub(crate) fn set_global<T: PropertyType>(&self, selector: Selector, value: T) -> Result<()> {
        let address = self
            .valid_address(selector, Scope::Global)
            .ok_or(AudioHalError::PropertyUnavailable {
                object: self.id,
                address: PropertyAddress::global(selector),
            })?;
        self.set_property(&address, value)
    }

    // === Device Properties ===

    /// Persistent UID, stable across reboots and reconnections
    pub fn uid(&self) -> Option<String> {
        self.global(Selector::DEVICE_UID)
    }

    pub fn name(&self) -> Option<String> {
        self.global(Selector::NAME)
    }

    pub fn manufacturer(&self) -> Option<String> {
        self.global(Selector::MANUFACTURER)
    }

    pub fn class(&self) -> Option<u32> {
        self.global(Selector::CLASS)
    }

    pub fn nominal_sample_rate(&self) -> Option<f64> {
        self.global(Selector::NOMINAL_SAMPLE_RATE)
    }

    pub fn set_nominal_sample_rate(&self, rate: f64) -> Result<()> {
        self.set_global(Selector::NOMINAL_SAMPLE_RATE, rate)
    }

    /// Total channel count across the device's streams in `scope`
    pub fn channels(&self, scope: Scope) -> Option<u32> {
        let address = self.valid_address(Selector::STREAM_CONFIGURATION, scope)?;
        match self
            .backend
            .get_property(self.id, &address, PropertyKind::StreamChannels)
        {
            Ok(PropertyValue::StreamChannels(channels)) => Some(channels.iter().sum()),
            Ok(_) => None,
            Err(e) => {
                debug!("Reading stream configuration of {} failed: {}", self.id, e);
                None
            }
        }
    }

    pub fn has_input(&self) -> bool {
        self.channels(Scope::Input).is_some_and(|c| c > 0)
    }

    pub fn has_output(&self) -> bool {
        self.channels(Scope::Output).is_some_and(|c| c > 0)
    }

    /// Ids of every object this device owns (streams, controls, sub-devices)
    pub fn owned_object_ids(&self) -> Option<Vec<AudioObjectId>> {
        self.global(Selector::OWNED_OBJECTS)
    }

    /// Snapshot of the device for display or serialization
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            id: self.id,
            uid: self.uid(),
            name: self.name(),
            manufacturer: self.manufacturer(),
            input_channels: self.channels(Scope::Input).unwrap_or(0),
            output_channels: self.channels(Scope::Output).unwrap_or(0),
            sample_rate: self.nominal_sample_rate(),
            is_aggregate: self.is_aggregate_device(),
        }
    }

    // === Aggregate Devices ===

    /// `true` if this device owns other devices
    pub fn is_aggregate_device(&self) -> bool {
        self.owned_aggregate_devices()
            .is_some_and(|devices| !devices.is_empty())
    }

    /// Owned objects that are devices, i.e. the sub-devices of an aggregate
    pub fn owned_aggregate_devices(&self) -> Option<Vec<AudioDevice>> {
        let owned = self.owned_object_ids()?;
        Some(
            owned
                .into_iter()
                .filter_map(|id| Self::lookup_by_id(&self.backend, id))
                .collect(),
        )
    }

    /// Sub-devices with at least one input channel
    pub fn owned_aggregate_input_devices(&self) -> Option<Vec<AudioDevice>> {
        self.owned_aggregate_devices()
            .map(|devices| devices.into_iter().filter(|d| d.has_input()).collect())
    }

    /// Sub-devices with at least one output channel
    pub fn owned_aggregate_output_devices(&self) -> Option<Vec<AudioDevice>> {
        self.owned_aggregate_devices()
            .map(|devices| devices.into_iter().filter(|d| d.has_output()).collect())
    }

    /// Sub-devices currently taking part in I/O
    pub fn active_sub_devices(&self) -> Option<Vec<AudioDevice>> {
        let ids: Vec<AudioObjectId> = self.global(Selector::AGGREGATE_ACTIVE_SUB_DEVICE_LIST)?;
        Some(
            ids.into_iter()
                .filter_map(|id| Self::lookup_by_id(&self.backend, id))
                .collect(),
        )
    }

    /// The sub-device the aggregate uses as its timing reference
    pub fn main_sub_device(&self) -> Option<AudioDevice> {
        let uid: String = self.global(Selector::AGGREGATE_MAIN_SUB_DEVICE)?;
        Self::lookup_by_uid(&self.backend, &uid)
    }

    pub fn set_main_sub_device(&self, device: &AudioDevice) -> Result<()> {
        let uid = device
            .uid()
            .ok_or_else(|| AudioHalError::DeviceNotFound(format!("UID of device {}", device.id)))?;
        self.set_global(Selector::AGGREGATE_MAIN_SUB_DEVICE, uid)
    }

    /// The device whose clock drives the aggregate
    pub fn clock_device(&self) -> Option<AudioDevice> {
        let uid: String = self.global(Selector::AGGREGATE_CLOCK_DEVICE)?;
        Self::lookup_by_uid(&self.backend, &uid)
    }

    /// Set the clock device; `None` clears it
    pub fn set_clock_device(&self, device: Option<&AudioDevice>) -> Result<()> {
        let uid = match device {
            Some(device) => device.uid().ok_or_else(|| {
                AudioHalError::DeviceNotFound(format!("UID of device {}", device.id))
            })?,
            None => String::new(),
        };
        self.set_global(Selector::AGGREGATE_CLOCK_DEVICE, uid)
    }
}

impl PartialEq for AudioDevice {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AudioDevice {}

impl Hash for AudioDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioDevice")
            .field("id", &self.id)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (ID: {})", name, self.id),
            None => write!(f, "Unknown (ID: {})", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateDescription, AggregateOptions};
    use crate::audio::memory_backend::{DeviceSpec, MemoryBackend};

    struct Rig {
        backend: Arc<dyn AudioBackend>,
        mic: AudioObjectId,
        dac: AudioObjectId,
        aggregate: AudioObjectId,
    }

    fn rig() -> Rig {
        let memory = MemoryBackend::new();
        let mic = memory.add_device(DeviceSpec::new("mic", "USB Mic").input(1));
        let dac = memory.add_device(DeviceSpec::new("dac", "DAC").manufacturer("Acme").output(2));
        let description = AggregateDescription::compose(
            "Pair",
            "pair",
            Some("mic"),
            ["dac"],
            AggregateOptions::default(),
        )
        .unwrap()
        .with_clock_device("dac");
        let aggregate = memory.create_aggregate_device(&description).unwrap();

        Rig {
            backend: Arc::new(memory),
            mic,
            dac,
            aggregate,
        }
    }

    #[test]
    fn test_lookup_by_id_rejects_non_devices() {
        let rig = rig();
        assert!(AudioDevice::lookup_by_id(&rig.backend, rig.mic).is_some());
        assert!(AudioDevice::lookup_by_id(&rig.backend, SYSTEM_OBJECT).is_none());
        assert!(AudioDevice::lookup_by_id(&rig.backend, UNKNOWN_OBJECT).is_none());
        assert!(AudioDevice::lookup_by_id(&rig.backend, 4242).is_none());
    }

    #[test]
    fn test_lookup_by_uid() {
        let rig = rig();
        let dac = AudioDevice::lookup_by_uid(&rig.backend, "dac").unwrap();
        assert_eq!(dac.id(), rig.dac);
        assert!(AudioDevice::lookup_by_uid(&rig.backend, "nope").is_none());
    }

    #[test]
    fn test_basic_properties() {
        let rig = rig();
        let dac = AudioDevice::lookup_by_id(&rig.backend, rig.dac).unwrap();
        assert_eq!(dac.uid().as_deref(), Some("dac"));
        assert_eq!(dac.name().as_deref(), Some("DAC"));
        assert_eq!(dac.manufacturer().as_deref(), Some("Acme"));
        assert_eq!(dac.channels(Scope::Output), Some(2));
        assert_eq!(dac.channels(Scope::Input), Some(0));
        assert!(dac.has_output());
        assert!(!dac.has_input());
        assert_eq!(dac.to_string(), format!("DAC (ID: {})", rig.dac));
    }

    #[test]
    fn test_valid_address_only_for_present_properties() {
        let rig = rig();
        let mic = AudioDevice::lookup_by_id(&rig.backend, rig.mic).unwrap();
        assert!(mic.valid_address(Selector::DEVICE_UID, Scope::Global).is_some());
        assert!(mic
            .valid_address(Selector::AGGREGATE_MAIN_SUB_DEVICE, Scope::Global)
            .is_none());
        assert!(mic.manufacturer().is_none());
    }

    #[test]
    fn test_sample_rate_round_trip() {
        let rig = rig();
        let dac = AudioDevice::lookup_by_id(&rig.backend, rig.dac).unwrap();
        assert!(dac.is_settable(Selector::NOMINAL_SAMPLE_RATE, Scope::Global));
        dac.set_nominal_sample_rate(96000.0).unwrap();
        assert_eq!(dac.nominal_sample_rate(), Some(96000.0));
    }

    #[test]
    fn test_physical_device_is_not_aggregate() {
        let rig = rig();
        let mic = AudioDevice::lookup_by_id(&rig.backend, rig.mic).unwrap();
        assert!(!mic.is_aggregate_device());
        // Streams are owned but are not devices
        assert_eq!(mic.owned_object_ids().map(|ids| ids.len()), Some(1));
        assert_eq!(mic.owned_aggregate_devices(), Some(Vec::new()));
        assert!(mic.main_sub_device().is_none());
    }

    #[test]
    fn test_aggregate_accessors() {
        let rig = rig();
        let aggregate = AudioDevice::lookup_by_id(&rig.backend, rig.aggregate).unwrap();
        assert!(aggregate.is_aggregate_device());

        let subs = aggregate.owned_aggregate_devices().unwrap();
        let uids: Vec<String> = subs.iter().filter_map(|d| d.uid()).collect();
        assert_eq!(uids, vec!["mic", "dac"]);

        let inputs = aggregate.owned_aggregate_input_devices().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].uid().as_deref(), Some("mic"));

        let outputs = aggregate.owned_aggregate_output_devices().unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].uid().as_deref(), Some("dac"));

        assert_eq!(aggregate.active_sub_devices().map(|d| d.len()), Some(2));
        assert_eq!(aggregate.channels(Scope::Input), Some(1));
        assert_eq!(aggregate.channels(Scope::Output), Some(2));
    }

    #[test]
    fn test_main_and_clock_resolve_to_physical_devices() {
        let rig = rig();
        let aggregate = AudioDevice::lookup_by_id(&rig.backend, rig.aggregate).unwrap();
        assert_eq!(aggregate.main_sub_device().map(|d| d.id()), Some(rig.mic));
        assert_eq!(aggregate.clock_device().map(|d| d.id()), Some(rig.dac));
    }

    #[test]
    fn test_change_main_and_clear_clock() {
        let rig = rig();
        let aggregate = AudioDevice::lookup_by_id(&rig.backend, rig.aggregate).unwrap();
        let dac = AudioDevice::lookup_by_id(&rig.backend, rig.dac).unwrap();

        aggregate.set_main_sub_device(&dac).unwrap();
        assert_eq!(aggregate.main_sub_device(), Some(dac));

        aggregate.set_clock_device(None).unwrap();
        assert!(aggregate.clock_device().is_none());
    }

    #[test]
    fn test_aggregate_properties_unavailable_on_physical_device() {
        let rig = rig();
        let mic = AudioDevice::lookup_by_id(&rig.backend, rig.mic).unwrap();
        let dac = AudioDevice::lookup_by_id(&rig.backend, rig.dac).unwrap();
        let err = mic.set_main_sub_device(&dac).unwrap_err();
        assert!(matches!(err, AudioHalError::PropertyUnavailable { .. }));
    }

    #[test]
    fn test_info_snapshot() {
        let rig = rig();
        let aggregate = AudioDevice::lookup_by_id(&rig.backend, rig.aggregate).unwrap();
        let info = aggregate.info();
        assert_eq!(info.uid.as_deref(), Some("pair"));
        assert_eq!(info.name.as_deref(), Some("Pair"));
        assert!(info.is_aggregate);
        assert_eq!(info.input_channels, 1);
        assert_eq!(info.output_channels, 2);
    }
}
