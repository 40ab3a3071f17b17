//! Device enumeration and aggregate device lifecycle
//!
//! `AudioSystem` is the entry point: it owns the backend, lists devices and
//! creates or removes aggregate devices.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregate::{AggregateDescription, AggregateOptions};
use crate::audio::backend::{create_backend, AudioBackend};
use crate::audio::error::{AudioHalError, Result};
use crate::audio::types::*;
use crate::config::AggregatePreset;
use crate::device::AudioDevice;

pub struct AudioSystem {
    backend: Arc<dyn AudioBackend>,
}

impl AudioSystem {
    /// Use the native HAL of this platform
    pub fn new() -> Result<Self> {
        let backend: Arc<dyn AudioBackend> = Arc::from(create_backend()?);
        Ok(Self::with_backend(backend))
    }

    pub fn with_backend(backend: Arc<dyn AudioBackend>) -> Self {
        debug!("Using {} backend", backend.name());
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    // === Enumeration ===

    pub fn all_device_ids(&self) -> Vec<AudioObjectId> {
        match self.backend.get_property(
            SYSTEM_OBJECT,
            &PropertyAddress::global(Selector::DEVICES),
            PropertyKind::ObjectList,
        ) {
            Ok(PropertyValue::ObjectList(ids)) => ids,
            Ok(other) => {
                warn!("Device list has unexpected shape: {:?}", other);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to enumerate devices: {}", e);
                Vec::new()
            }
        }
    }

    pub fn all_devices(&self) -> Vec<AudioDevice> {
        self.all_device_ids()
            .into_iter()
            .filter_map(|id| AudioDevice::lookup_by_id(&self.backend, id))
            .collect()
    }

    pub fn all_input_devices(&self) -> Vec<AudioDevice> {
        self.all_devices().into_iter().filter(|d| d.has_input()).collect()
    }

    pub fn all_output_devices(&self) -> Vec<AudioDevice> {
        self.all_devices().into_iter().filter(|d| d.has_output()).collect()
    }

    pub fn all_aggregate_devices(&self) -> Vec<AudioDevice> {
        self.all_devices()
            .into_iter()
            .filter(|d| d.is_aggregate_device())
            .collect()
    }

    pub fn all_non_aggregate_devices(&self) -> Vec<AudioDevice> {
        self.all_devices()
            .into_iter()
            .filter(|d| !d.is_aggregate_device())
            .collect()
    }

    pub fn default_input_device(&self) -> Option<AudioDevice> {
        self.default_device(Selector::DEFAULT_INPUT_DEVICE)
    }

    pub fn default_output_device(&self) -> Option<AudioDevice> {
        self.default_device(Selector::DEFAULT_OUTPUT_DEVICE)
    }

    /// Device used for alerts and sound effects
    pub fn default_system_output_device(&self) -> Option<AudioDevice> {
        self.default_device(Selector::DEFAULT_SYSTEM_OUTPUT_DEVICE)
    }

    fn default_device(&self, selector: Selector) -> Option<AudioDevice> {
        match self.backend.get_property(
            SYSTEM_OBJECT,
            &PropertyAddress::global(selector),
            PropertyKind::U32,
        ) {
            Ok(PropertyValue::U32(id)) => AudioDevice::lookup_by_id(&self.backend, id),
            Ok(_) => None,
            Err(e) => {
                debug!("No default device for {}: {}", selector, e);
                None
            }
        }
    }

    pub fn device_by_id(&self, id: AudioObjectId) -> Option<AudioDevice> {
        AudioDevice::lookup_by_id(&self.backend, id)
    }

    pub fn device_by_uid(&self, uid: &str) -> Option<AudioDevice> {
        AudioDevice::lookup_by_uid(&self.backend, uid)
    }

    // === Aggregate Devices ===

    /// Create an aggregate device
    ///
    /// `main` comes first in the sub-device list and is the drift reference;
    /// `sub_devices` follow in order, duplicates dropped. Sub-devices whose
    /// UID cannot be read are skipped. Giving sub-devices without a main
    /// device is an error.
    pub fn create_aggregate_device(
        &self,
        main: Option<&AudioDevice>,
        sub_devices: &[AudioDevice],
        name: &str,
        uid: &str,
        options: Option<AggregateOptions>,
    ) -> Result<AudioDevice> {
        if main.is_none() && !sub_devices.is_empty() {
            return Err(AudioHalError::InvalidComposition(
                "sub-devices given without a main device".to_string(),
            ));
        }

        let main_uid = match main {
            Some(device) => Some(device.uid().ok_or_else(|| {
                AudioHalError::DeviceNotFound(format!("UID of main device {}", device.id()))
            })?),
            None => None,
        };

        let sub_uids: Vec<String> = sub_devices
            .iter()
            .filter_map(|device| {
                let uid = device.uid();
                if uid.is_none() {
                    warn!("Skipping sub-device {} without UID", device.id());
                }
                uid
            })
            .collect();

        let description = AggregateDescription::compose(
            name,
            uid,
            main_uid.as_deref(),
            sub_uids,
            options.unwrap_or_default(),
        )?;
        self.create_from_description(&description)
    }

    /// Aggregate of `main` and, optionally, one more device
    pub fn create_aggregate_device_pair(
        &self,
        main: &AudioDevice,
        second: Option<&AudioDevice>,
        name: &str,
        uid: &str,
    ) -> Result<AudioDevice> {
        let sub_devices: Vec<AudioDevice> = second.into_iter().cloned().collect();
        self.create_aggregate_device(Some(main), &sub_devices, name, uid, None)
    }

    /// Public stacked aggregate playing the same output on every sub-device
    pub fn create_multi_output_device(
        &self,
        main: Option<&AudioDevice>,
        sub_devices: &[AudioDevice],
        name: &str,
        uid: &str,
    ) -> Result<AudioDevice> {
        self.create_aggregate_device(
            main,
            sub_devices,
            name,
            uid,
            Some(AggregateOptions::MULTI_OUTPUT),
        )
    }

    /// Hand a composed description to the HAL and wrap the result
    pub fn create_from_description(&self, description: &AggregateDescription) -> Result<AudioDevice> {
        let id = self
            .backend
            .create_aggregate_device(description)
            .map_err(|e| {
                debug!("Failed creating aggregate device with error: {}", e);
                e
            })?;

        info!(
            "Created aggregate device {} ({}) with {} sub-device(s)",
            description.name,
            id,
            description.sub_devices.len()
        );

        AudioDevice::lookup_by_id(&self.backend, id)
            .ok_or_else(|| AudioHalError::DeviceNotFound(format!("aggregate device {}", id)))
    }

    /// Create the aggregate a preset describes and apply its sub-device settings
    ///
    /// Every UID in the preset must resolve to a connected device. If a
    /// setting cannot be applied the aggregate is destroyed again and the
    /// error returned.
    pub fn create_from_preset(&self, preset: &AggregatePreset) -> Result<AudioDevice> {
        let referenced = preset
            .main
            .iter()
            .chain(&preset.sub_devices)
            .chain(&preset.clock_device);
        for uid in referenced {
            if self.device_by_uid(uid).is_none() {
                return Err(AudioHalError::DeviceNotFound(uid.clone()));
            }
        }

        let aggregate = self.create_from_description(&preset.description()?)?;

        if let Err(e) = Self::apply_sub_device_settings(&aggregate, preset) {
            if let Err(cleanup) = self.backend.destroy_aggregate_device(aggregate.id()) {
                debug!(
                    "Failed removing aggregate device {} after error: {}",
                    aggregate.id(),
                    cleanup
                );
            }
            return Err(e);
        }

        Ok(aggregate)
    }

    fn apply_sub_device_settings(aggregate: &AudioDevice, preset: &AggregatePreset) -> Result<()> {
        if preset.sub_device_settings.is_empty() {
            return Ok(());
        }

        let subs = aggregate.owned_aggregate_devices().unwrap_or_default();
        let member_uids: Vec<String> = subs.iter().filter_map(AudioDevice::uid).collect();
        for settings in &preset.sub_device_settings {
            if !member_uids.contains(&settings.uid) {
                warn!(
                    "Preset {} has settings for {} which is not a member",
                    preset.name, settings.uid
                );
            }
        }

        for sub in &subs {
            let Some(settings) = sub.uid().and_then(|uid| preset.settings_for(&uid)) else {
                continue;
            };

            if let Some(latency) = settings.extra_latency {
                sub.set_extra_latency(latency)?;
            }
            if let Some(enabled) = settings.drift_compensation {
                sub.set_drift_compensation(enabled)?;
            }
            if let Some(quality) = settings.drift_compensation_quality {
                sub.set_drift_compensation_quality(quality)?;
            }
        }
        Ok(())
    }

    /// Destroy an aggregate device
    ///
    /// The HAL may complete the destruction after this returns.
    pub fn remove_aggregate_device(&self, id: AudioObjectId) -> Result<()> {
        self.backend.destroy_aggregate_device(id)?;
        info!("Removed aggregate device {}", id);
        Ok(())
    }
}
