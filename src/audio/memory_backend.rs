//! In-process HAL object model
//!
//! Mirrors what the CoreAudio HAL exposes for the properties this crate uses:
//! a system object listing devices, physical devices with streams, and
//! aggregate devices that own one sub-device object per member. Errors carry
//! the same status codes the HAL would return.
//!
//! Used on platforms without a native HAL and as the backend for tests.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::aggregate::AggregateDescription;
use crate::audio::backend::AudioBackend;
use crate::audio::error::{status, AudioHalError, Result};
use crate::audio::types::*;

/// Description of a physical device to register with [`MemoryBackend`]
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    uid: Option<String>,
    name: String,
    manufacturer: Option<String>,
    input_streams: Vec<u32>,
    output_streams: Vec<u32>,
    sample_rate: f64,
}

impl DeviceSpec {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            name: name.into(),
            manufacturer: None,
            input_streams: Vec::new(),
            output_streams: Vec::new(),
            sample_rate: 48000.0,
        }
    }

    /// Register the device without a UID property, as some drivers do
    pub fn without_uid(mut self) -> Self {
        self.uid = None;
        self
    }

    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Add an input stream with `channels` channels
    pub fn input(mut self, channels: u32) -> Self {
        self.input_streams.push(channels);
        self
    }

    /// Add an output stream with `channels` channels
    pub fn output(mut self, channels: u32) -> Self {
        self.output_streams.push(channels);
        self
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }
}

#[derive(Debug, Clone)]
struct Property {
    value: PropertyValue,
    settable: bool,
}

#[derive(Debug, Default)]
struct ObjectState {
    properties: HashMap<PropertyAddress, Property>,
}

impl ObjectState {
    fn with_class(class: u32) -> Self {
        let mut object = Self::default();
        object.insert(Selector::CLASS, PropertyValue::U32(class), false);
        object
    }

    fn insert(&mut self, selector: Selector, value: PropertyValue, settable: bool) {
        self.insert_scoped(selector, Scope::Global, value, settable);
    }

    fn insert_scoped(
        &mut self,
        selector: Selector,
        scope: Scope,
        value: PropertyValue,
        settable: bool,
    ) {
        self.properties.insert(
            PropertyAddress::scoped(selector, scope),
            Property { value, settable },
        );
    }

    fn value(&self, selector: Selector, scope: Scope) -> Option<&PropertyValue> {
        self.properties
            .get(&PropertyAddress::scoped(selector, scope))
            .map(|p| &p.value)
    }

    fn class(&self) -> Option<u32> {
        match self.value(Selector::CLASS, Scope::Global) {
            Some(PropertyValue::U32(class)) => Some(*class),
            _ => None,
        }
    }

    fn string(&self, selector: Selector) -> Option<&str> {
        match self.value(selector, Scope::Global) {
            Some(PropertyValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn f64(&self, selector: Selector) -> Option<f64> {
        match self.value(selector, Scope::Global) {
            Some(PropertyValue::F64(v)) => Some(*v),
            _ => None,
        }
    }

    fn streams(&self, scope: Scope) -> Vec<u32> {
        match self.value(Selector::STREAM_CONFIGURATION, scope) {
            Some(PropertyValue::StreamChannels(channels)) => channels.clone(),
            _ => Vec::new(),
        }
    }

    fn owned(&self) -> Vec<AudioObjectId> {
        match self.value(Selector::OWNED_OBJECTS, Scope::Global) {
            Some(PropertyValue::ObjectList(ids)) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// UIDs of the physical devices behind an aggregate's sub-device objects
    fn member_uids<'a>(&self, state: &'a State) -> Vec<&'a str> {
        let members = match self.value(Selector::AGGREGATE_ACTIVE_SUB_DEVICE_LIST, Scope::Global) {
            Some(PropertyValue::ObjectList(ids)) => ids.as_slice(),
            _ => &[],
        };
        members
            .iter()
            .filter_map(|id| state.objects.get(id))
            .filter_map(|sub| sub.string(Selector::DEVICE_UID))
            .collect()
    }

    /// Top-level devices are listed by the system object and found by UID
    fn is_top_level_device(&self) -> bool {
        matches!(
            self.class(),
            Some(ObjectClass::DEVICE) | Some(ObjectClass::AGGREGATE_DEVICE)
        )
    }
}

struct State {
    objects: BTreeMap<AudioObjectId, ObjectState>,
    next_id: AudioObjectId,
}

impl State {
    fn allocate(&mut self, object: ObjectState) -> AudioObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    fn object(&self, id: AudioObjectId) -> Result<&ObjectState> {
        self.objects.get(&id).ok_or_else(|| {
            AudioHalError::system(status::BAD_OBJECT, format!("Unknown object {}", id))
        })
    }

    fn device_uid_in_use(&self, uid: &str) -> Option<AudioObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| {
                object.is_top_level_device() && object.string(Selector::DEVICE_UID) == Some(uid)
            })
            .map(|(id, _)| *id)
    }

    /// Rebuild the system object's device list from the object table
    fn refresh_device_list(&mut self) {
        let devices: Vec<AudioObjectId> = self
            .objects
            .iter()
            .filter(|(_, object)| object.is_top_level_device())
            .map(|(id, _)| *id)
            .collect();
        if let Some(system) = self.objects.get_mut(&SYSTEM_OBJECT) {
            system.insert(Selector::DEVICES, PropertyValue::ObjectList(devices), false);
        }
    }

    /// Stream objects for every buffer of a device, in input then output order
    fn add_streams(&mut self, input: &[u32], output: &[u32]) -> Vec<AudioObjectId> {
        let mut ids = Vec::with_capacity(input.len() + output.len());
        for _ in input.iter().chain(output) {
            ids.push(self.allocate(ObjectState::with_class(ObjectClass::STREAM)));
        }
        ids
    }

    fn remove_tree(&mut self, id: AudioObjectId) {
        if let Some(object) = self.objects.remove(&id) {
            for child in object.owned() {
                self.remove_tree(child);
            }
        }
    }
}

/// In-memory HAL backend
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    /// Create an object model holding only the system object
    pub fn new() -> Self {
        let mut system = ObjectState::with_class(ObjectClass::SYSTEM);
        system.insert(Selector::DEVICES, PropertyValue::ObjectList(Vec::new()), false);
        for selector in [
            Selector::DEFAULT_INPUT_DEVICE,
            Selector::DEFAULT_OUTPUT_DEVICE,
            Selector::DEFAULT_SYSTEM_OUTPUT_DEVICE,
        ] {
            system.insert(selector, PropertyValue::U32(UNKNOWN_OBJECT), true);
        }

        let mut objects = BTreeMap::new();
        objects.insert(SYSTEM_OBJECT, system);

        Self {
            state: RwLock::new(State {
                objects,
                next_id: SYSTEM_OBJECT + 1,
            }),
        }
    }

    /// Register a physical device and return its object id
    ///
    /// The first device with input streams becomes the default input device,
    /// the first with output streams the default (system) output device.
    pub fn add_device(&self, spec: DeviceSpec) -> AudioObjectId {
        let mut state = self.state.write();

        if let Some(uid) = &spec.uid {
            if let Some(existing) = state.device_uid_in_use(uid) {
                warn!(
                    "[Memory] UID {} already used by object {}; lookups keep resolving to it",
                    uid, existing
                );
            }
        }

        let streams = state.add_streams(&spec.input_streams, &spec.output_streams);

        let mut device = ObjectState::with_class(ObjectClass::DEVICE);
        if let Some(uid) = &spec.uid {
            device.insert(Selector::DEVICE_UID, PropertyValue::String(uid.clone()), false);
        }
        device.insert(Selector::NAME, PropertyValue::String(spec.name), false);
        if let Some(manufacturer) = spec.manufacturer {
            device.insert(Selector::MANUFACTURER, PropertyValue::String(manufacturer), false);
        }
        device.insert(Selector::NOMINAL_SAMPLE_RATE, PropertyValue::F64(spec.sample_rate), true);
        device.insert(Selector::OWNED_OBJECTS, PropertyValue::ObjectList(streams), false);
        device.insert_scoped(
            Selector::STREAM_CONFIGURATION,
            Scope::Input,
            PropertyValue::StreamChannels(spec.input_streams.clone()),
            false,
        );
        device.insert_scoped(
            Selector::STREAM_CONFIGURATION,
            Scope::Output,
            PropertyValue::StreamChannels(spec.output_streams.clone()),
            false,
        );

        let id = state.allocate(device);
        state.refresh_device_list();

        let mut defaults = Vec::new();
        if !spec.input_streams.is_empty() {
            defaults.push(Selector::DEFAULT_INPUT_DEVICE);
        }
        if !spec.output_streams.is_empty() {
            defaults.push(Selector::DEFAULT_OUTPUT_DEVICE);
            defaults.push(Selector::DEFAULT_SYSTEM_OUTPUT_DEVICE);
        }
        if let Some(system) = state.objects.get_mut(&SYSTEM_OBJECT) {
            for selector in defaults {
                if system.value(selector, Scope::Global) == Some(&PropertyValue::U32(UNKNOWN_OBJECT)) {
                    system.insert(selector, PropertyValue::U32(id), true);
                }
            }
        }

        debug!(
            "[Memory] Registered device {} ({})",
            spec.uid.as_deref().unwrap_or("<no uid>"),
            id
        );
        id
    }

    /// Build the sub-device object for one aggregate member
    fn sub_device_object(device: &ObjectState, drift_compensation: u32) -> ObjectState {
        let mut sub = ObjectState::with_class(ObjectClass::SUB_DEVICE);
        sub.insert(Selector::BASE_CLASS, PropertyValue::U32(ObjectClass::DEVICE), false);
        for selector in [Selector::DEVICE_UID, Selector::NAME, Selector::MANUFACTURER] {
            if let Some(value) = device.value(selector, Scope::Global) {
                sub.insert(selector, value.clone(), false);
            }
        }
        for scope in [Scope::Input, Scope::Output] {
            sub.insert_scoped(
                Selector::STREAM_CONFIGURATION,
                scope,
                PropertyValue::StreamChannels(device.streams(scope)),
                false,
            );
        }
        sub.insert(Selector::SUB_DEVICE_EXTRA_LATENCY, PropertyValue::F64(0.0), true);
        sub.insert(
            Selector::SUB_DEVICE_DRIFT_COMPENSATION,
            PropertyValue::U32(drift_compensation),
            true,
        );
        sub.insert(
            Selector::SUB_DEVICE_DRIFT_COMPENSATION_QUALITY,
            PropertyValue::U32(DriftCompensationQuality::MAX),
            true,
        );
        sub
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MemoryBackend {
    fn has_property(&self, object: AudioObjectId, address: &PropertyAddress) -> bool {
        self.state
            .read()
            .objects
            .get(&object)
            .map(|o| o.properties.contains_key(address))
            .unwrap_or(false)
    }

    fn is_property_settable(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
    ) -> Result<bool> {
        let state = self.state.read();
        state
            .object(object)?
            .properties
            .get(address)
            .map(|p| p.settable)
            .ok_or_else(|| unknown_property(object, address))
    }

    fn get_property(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        kind: PropertyKind,
    ) -> Result<PropertyValue> {
        let state = self.state.read();
        let property = state
            .object(object)?
            .properties
            .get(address)
            .ok_or_else(|| unknown_property(object, address))?;

        if property.value.kind() != kind {
            return Err(AudioHalError::system(
                status::BAD_PROPERTY_SIZE,
                format!(
                    "Property {} holds {:?}, requested {:?}",
                    address,
                    property.value.kind(),
                    kind
                ),
            ));
        }

        Ok(property.value.clone())
    }

    fn set_property(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        value: &PropertyValue,
    ) -> Result<()> {
        let mut state = self.state.write();
        check_sub_device_reference(&state, object, address, value)?;

        let target = state.objects.get_mut(&object).ok_or_else(|| {
            AudioHalError::system(status::BAD_OBJECT, format!("Unknown object {}", object))
        })?;
        let property = target
            .properties
            .get_mut(address)
            .ok_or_else(|| unknown_property(object, address))?;

        if !property.settable {
            return Err(AudioHalError::system(
                status::ILLEGAL_OPERATION,
                format!("Property {} is read-only", address),
            ));
        }
        if property.value.kind() != value.kind() {
            return Err(AudioHalError::system(
                status::BAD_PROPERTY_SIZE,
                format!("Property {} expects {:?}", address, property.value.kind()),
            ));
        }

        property.value = value.clone();
        Ok(())
    }

    fn translate_uid(&self, uid: &str) -> Result<Option<AudioObjectId>> {
        Ok(self.state.read().device_uid_in_use(uid))
    }

    fn create_aggregate_device(
        &self,
        description: &AggregateDescription,
    ) -> Result<AudioObjectId> {
        let mut state = self.state.write();

        if description.uid.is_empty() {
            return Err(AudioHalError::system(
                status::ILLEGAL_OPERATION,
                "Aggregate device needs a UID",
            ));
        }
        if let Some(existing) = state.device_uid_in_use(&description.uid) {
            return Err(AudioHalError::system(
                status::ILLEGAL_OPERATION,
                format!("UID {} already used by object {}", description.uid, existing),
            ));
        }

        // Resolve every member before touching the object table
        let mut members = Vec::with_capacity(description.sub_devices.len());
        for entry in &description.sub_devices {
            let device_id = state.device_uid_in_use(&entry.uid).ok_or_else(|| {
                AudioHalError::system(status::BAD_DEVICE, format!("No device with UID {}", entry.uid))
            })?;
            let device = state.object(device_id)?;
            members.push((
                Self::sub_device_object(device, entry.drift_compensation),
                device.streams(Scope::Input),
                device.streams(Scope::Output),
                device.f64(Selector::NOMINAL_SAMPLE_RATE),
            ));
        }

        let mut input_streams = Vec::new();
        let mut output_streams = Vec::new();
        let mut sample_rate = None;
        let mut sub_ids = Vec::with_capacity(members.len());
        for (sub, input, output, rate) in members {
            input_streams.extend(input);
            // Stacked members mirror the first member's outputs
            if !description.is_stacked || sub_ids.is_empty() {
                output_streams.extend(output);
            }
            sample_rate = sample_rate.or(rate);
            sub_ids.push(state.allocate(sub));
        }

        let mut owned = sub_ids.clone();
        owned.extend(state.add_streams(&input_streams, &output_streams));

        let mut aggregate = ObjectState::with_class(ObjectClass::AGGREGATE_DEVICE);
        aggregate.insert(Selector::BASE_CLASS, PropertyValue::U32(ObjectClass::DEVICE), false);
        aggregate.insert(
            Selector::DEVICE_UID,
            PropertyValue::String(description.uid.clone()),
            false,
        );
        aggregate.insert(
            Selector::NAME,
            PropertyValue::String(description.name.clone()),
            false,
        );
        aggregate.insert(
            Selector::NOMINAL_SAMPLE_RATE,
            PropertyValue::F64(sample_rate.unwrap_or(48000.0)),
            true,
        );
        aggregate.insert(Selector::OWNED_OBJECTS, PropertyValue::ObjectList(owned), false);
        aggregate.insert(
            Selector::AGGREGATE_ACTIVE_SUB_DEVICE_LIST,
            PropertyValue::ObjectList(sub_ids),
            false,
        );
        aggregate.insert(
            Selector::AGGREGATE_MAIN_SUB_DEVICE,
            PropertyValue::String(description.main_sub_device.clone().unwrap_or_default()),
            true,
        );
        aggregate.insert(
            Selector::AGGREGATE_CLOCK_DEVICE,
            PropertyValue::String(description.clock_device.clone().unwrap_or_default()),
            true,
        );
        aggregate.insert_scoped(
            Selector::STREAM_CONFIGURATION,
            Scope::Input,
            PropertyValue::StreamChannels(input_streams),
            false,
        );
        aggregate.insert_scoped(
            Selector::STREAM_CONFIGURATION,
            Scope::Output,
            PropertyValue::StreamChannels(output_streams),
            false,
        );

        let id = state.allocate(aggregate);
        state.refresh_device_list();

        debug!(
            "[Memory] Created aggregate {} ({}) with {} sub-device(s)",
            description.uid,
            id,
            description.sub_devices.len()
        );
        Ok(id)
    }

    fn destroy_aggregate_device(&self, id: AudioObjectId) -> Result<()> {
        let mut state = self.state.write();

        if state.object(id)?.class() != Some(ObjectClass::AGGREGATE_DEVICE) {
            return Err(AudioHalError::system(
                status::BAD_DEVICE,
                format!("Object {} is not an aggregate device", id),
            ));
        }

        state.remove_tree(id);
        state.refresh_device_list();

        if let Some(system) = state.objects.get_mut(&SYSTEM_OBJECT) {
            for property in system.properties.values_mut() {
                if property.settable && property.value == PropertyValue::U32(id) {
                    property.value = PropertyValue::U32(UNKNOWN_OBJECT);
                }
            }
        }

        debug!("[Memory] Destroyed aggregate {}", id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

/// Main and clock device must name a member; the clock may also be cleared
fn check_sub_device_reference(
    state: &State,
    object: AudioObjectId,
    address: &PropertyAddress,
    value: &PropertyValue,
) -> Result<()> {
    let clearable = match address.selector {
        Selector::AGGREGATE_MAIN_SUB_DEVICE => false,
        Selector::AGGREGATE_CLOCK_DEVICE => true,
        _ => return Ok(()),
    };
    let (Some(aggregate), PropertyValue::String(uid)) = (state.objects.get(&object), value) else {
        return Ok(());
    };

    if (clearable && uid.is_empty()) || aggregate.member_uids(state).contains(&uid.as_str()) {
        return Ok(());
    }
    Err(AudioHalError::system(
        status::ILLEGAL_OPERATION,
        format!("{} is not a sub-device of aggregate {}", uid, object),
    ))
}

fn unknown_property(object: AudioObjectId, address: &PropertyAddress) -> AudioHalError {
    AudioHalError::system(
        status::UNKNOWN_PROPERTY,
        format!("Object {} has no property {}", object, address),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateOptions;

    fn devices(backend: &MemoryBackend) -> Vec<AudioObjectId> {
        match backend
            .get_property(
                SYSTEM_OBJECT,
                &PropertyAddress::global(Selector::DEVICES),
                PropertyKind::ObjectList,
            )
            .unwrap()
        {
            PropertyValue::ObjectList(ids) => ids,
            other => panic!("unexpected value {:?}", other),
        }
    }

    fn pair(backend: &MemoryBackend) -> AggregateDescription {
        backend.add_device(DeviceSpec::new("mic", "USB Mic").input(1));
        backend.add_device(DeviceSpec::new("dac", "DAC").output(2));
        AggregateDescription::compose("Pair", "pair", Some("mic"), ["dac"], AggregateOptions::default())
            .unwrap()
    }

    #[test]
    fn test_system_lists_devices_and_defaults() {
        let backend = MemoryBackend::new();
        let mic = backend.add_device(DeviceSpec::new("mic", "USB Mic").input(1));
        let dac = backend.add_device(DeviceSpec::new("dac", "DAC").output(2));

        assert_eq!(devices(&backend), vec![mic, dac]);

        let default_out = backend
            .get_property(
                SYSTEM_OBJECT,
                &PropertyAddress::global(Selector::DEFAULT_OUTPUT_DEVICE),
                PropertyKind::U32,
            )
            .unwrap();
        assert_eq!(default_out, PropertyValue::U32(dac));
    }

    #[test]
    fn test_stream_objects_are_owned_not_listed() {
        let backend = MemoryBackend::new();
        let id = backend.add_device(DeviceSpec::new("iface", "Interface").input(2).output(2).output(2));

        let owned = backend
            .get_property(id, &PropertyAddress::global(Selector::OWNED_OBJECTS), PropertyKind::ObjectList)
            .unwrap();
        match owned {
            PropertyValue::ObjectList(ids) => assert_eq!(ids.len(), 3),
            other => panic!("unexpected value {:?}", other),
        }
        assert_eq!(devices(&backend), vec![id]);
    }

    #[test]
    fn test_get_property_errors() {
        let backend = MemoryBackend::new();
        let id = backend.add_device(DeviceSpec::new("dac", "DAC").output(2));

        let err = backend
            .get_property(99, &PropertyAddress::global(Selector::NAME), PropertyKind::String)
            .unwrap_err();
        assert_eq!(err.status(), Some(status::BAD_OBJECT));

        let err = backend
            .get_property(
                id,
                &PropertyAddress::global(Selector::SUB_DEVICE_EXTRA_LATENCY),
                PropertyKind::F64,
            )
            .unwrap_err();
        assert_eq!(err.status(), Some(status::UNKNOWN_PROPERTY));

        let err = backend
            .get_property(id, &PropertyAddress::global(Selector::NAME), PropertyKind::U32)
            .unwrap_err();
        assert_eq!(err.status(), Some(status::BAD_PROPERTY_SIZE));
    }

    #[test]
    fn test_set_read_only_property_fails() {
        let backend = MemoryBackend::new();
        let id = backend.add_device(DeviceSpec::new("dac", "DAC").output(2));
        let address = PropertyAddress::global(Selector::NAME);

        assert!(!backend.is_property_settable(id, &address).unwrap());
        let err = backend
            .set_property(id, &address, &PropertyValue::String("Renamed".into()))
            .unwrap_err();
        assert_eq!(err.status(), Some(status::ILLEGAL_OPERATION));
    }

    #[test]
    fn test_create_aggregate_builds_sub_devices() {
        let backend = MemoryBackend::new();
        let description = pair(&backend);
        let id = backend.create_aggregate_device(&description).unwrap();

        assert_eq!(backend.translate_uid("pair").unwrap(), Some(id));
        assert!(devices(&backend).contains(&id));

        let subs = match backend
            .get_property(
                id,
                &PropertyAddress::global(Selector::AGGREGATE_ACTIVE_SUB_DEVICE_LIST),
                PropertyKind::ObjectList,
            )
            .unwrap()
        {
            PropertyValue::ObjectList(ids) => ids,
            other => panic!("unexpected value {:?}", other),
        };
        assert_eq!(subs.len(), 2);

        let drift = backend
            .get_property(
                subs[1],
                &PropertyAddress::global(Selector::SUB_DEVICE_DRIFT_COMPENSATION),
                PropertyKind::U32,
            )
            .unwrap();
        assert_eq!(drift, PropertyValue::U32(1));

        // Sub-device objects keep the member's UID but do not shadow it
        assert_ne!(backend.translate_uid("dac").unwrap(), Some(subs[1]));
    }

    #[test]
    fn test_create_aggregate_rejects_duplicate_uid() {
        let backend = MemoryBackend::new();
        let description = pair(&backend);
        backend.create_aggregate_device(&description).unwrap();

        let err = backend.create_aggregate_device(&description).unwrap_err();
        assert_eq!(err.status(), Some(status::ILLEGAL_OPERATION));
    }

    #[test]
    fn test_create_aggregate_rejects_unknown_member() {
        let backend = MemoryBackend::new();
        let description = AggregateDescription::compose(
            "Ghost",
            "ghost",
            Some("missing"),
            Vec::<String>::new(),
            AggregateOptions::default(),
        )
        .unwrap();

        let err = backend.create_aggregate_device(&description).unwrap_err();
        assert_eq!(err.status(), Some(status::BAD_DEVICE));
        assert_eq!(backend.translate_uid("ghost").unwrap(), None);
    }

    #[test]
    fn test_destroy_aggregate_removes_tree() {
        let backend = MemoryBackend::new();
        let description = pair(&backend);
        let id = backend.create_aggregate_device(&description).unwrap();

        backend.destroy_aggregate_device(id).unwrap();
        assert!(!devices(&backend).contains(&id));
        assert_eq!(backend.translate_uid("pair").unwrap(), None);
        assert!(!backend.has_property(id, &PropertyAddress::global(Selector::NAME)));
    }

    #[test]
    fn test_device_without_uid() {
        let backend = MemoryBackend::new();
        let id = backend.add_device(DeviceSpec::new("ignored", "Anonymous").output(2).without_uid());

        assert!(devices(&backend).contains(&id));
        assert!(!backend.has_property(id, &PropertyAddress::global(Selector::DEVICE_UID)));
        assert_eq!(backend.translate_uid("ignored").unwrap(), None);
    }

    #[test]
    fn test_duplicate_device_uid_resolves_to_first() {
        let backend = MemoryBackend::new();
        let first = backend.add_device(DeviceSpec::new("dac", "DAC").output(2));
        let second = backend.add_device(DeviceSpec::new("dac", "DAC Clone").output(2));

        assert_eq!(devices(&backend), vec![first, second]);
        assert_eq!(backend.translate_uid("dac").unwrap(), Some(first));
    }

    #[test]
    fn test_main_and_clock_must_be_members() {
        let backend = MemoryBackend::new();
        let description = pair(&backend);
        backend.add_device(DeviceSpec::new("other", "Other").output(2));
        let id = backend.create_aggregate_device(&description).unwrap();

        let main = PropertyAddress::global(Selector::AGGREGATE_MAIN_SUB_DEVICE);
        let clock = PropertyAddress::global(Selector::AGGREGATE_CLOCK_DEVICE);
        let uid = |s: &str| PropertyValue::String(s.to_string());

        backend.set_property(id, &main, &uid("dac")).unwrap();
        backend.set_property(id, &clock, &uid("mic")).unwrap();
        backend.set_property(id, &clock, &uid("")).unwrap();

        for (address, value) in [(&main, "other"), (&main, ""), (&clock, "other")] {
            let err = backend.set_property(id, address, &uid(value)).unwrap_err();
            assert_eq!(err.status(), Some(status::ILLEGAL_OPERATION));
        }
        assert_eq!(
            backend.get_property(id, &main, PropertyKind::String).unwrap(),
            uid("dac")
        );
    }

    #[test]
    fn test_destroy_physical_device_fails() {
        let backend = MemoryBackend::new();
        let id = backend.add_device(DeviceSpec::new("dac", "DAC").output(2));

        let err = backend.destroy_aggregate_device(id).unwrap_err();
        assert_eq!(err.status(), Some(status::BAD_DEVICE));
    }
}
