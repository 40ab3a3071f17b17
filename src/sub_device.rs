//! Sub-device properties
//!
//! These live on the sub-device objects an aggregate device owns (see
//! [`AudioDevice::owned_aggregate_devices`]), not on the physical devices.

use crate::audio::error::{AudioHalError, Result};
use crate::audio::types::{DriftCompensationQuality, PropertyAddress, Selector};
use crate::device::AudioDevice;

impl AudioDevice {
    /// Additional latency, in frames, applied to this sub-device
    pub fn extra_latency(&self) -> Option<f64> {
        self.global(Selector::SUB_DEVICE_EXTRA_LATENCY)
    }

    pub fn set_extra_latency(&self, frames: f64) -> Result<()> {
        if !frames.is_finite() || frames < 0.0 {
            return Err(AudioHalError::InvalidPropertyValue {
                address: PropertyAddress::global(Selector::SUB_DEVICE_EXTRA_LATENCY),
                reason: format!("{} is not a frame count", frames),
            });
        }
        self.set_global(Selector::SUB_DEVICE_EXTRA_LATENCY, frames)
    }

    /// Whether the aggregate resamples this sub-device to follow the clock device
    pub fn drift_compensation(&self) -> Option<bool> {
        self.global(Selector::SUB_DEVICE_DRIFT_COMPENSATION)
    }

    pub fn set_drift_compensation(&self, enabled: bool) -> Result<()> {
        self.set_global(Selector::SUB_DEVICE_DRIFT_COMPENSATION, enabled)
    }

    /// See [`DriftCompensationQuality`](crate::audio::types::DriftCompensationQuality)
    pub fn drift_compensation_quality(&self) -> Option<u32> {
        self.global(Selector::SUB_DEVICE_DRIFT_COMPENSATION_QUALITY)
    }

    /// `quality` ranges from `MIN` to `MAX`
    pub fn set_drift_compensation_quality(&self, quality: u32) -> Result<()> {
        if quality > DriftCompensationQuality::MAX {
            return Err(AudioHalError::InvalidPropertyValue {
                address: PropertyAddress::global(Selector::SUB_DEVICE_DRIFT_COMPENSATION_QUALITY),
                reason: format!("{:#x} is above the maximum quality", quality),
            });
        }
        self.set_global(Selector::SUB_DEVICE_DRIFT_COMPENSATION_QUALITY, quality)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::aggregate::{AggregateDescription, AggregateOptions};
    use crate::audio::backend::AudioBackend;
    use crate::audio::error::AudioHalError;
    use crate::audio::memory_backend::{DeviceSpec, MemoryBackend};
    use crate::audio::types::{DriftCompensationQuality, PropertyAddress, Selector};
    use crate::device::AudioDevice;

    fn aggregate_subs() -> (Arc<dyn AudioBackend>, Vec<AudioDevice>) {
        let memory = MemoryBackend::new();
        memory.add_device(DeviceSpec::new("main", "Main").output(2));
        memory.add_device(DeviceSpec::new("second", "Second").output(2));
        let description = AggregateDescription::compose(
            "Agg",
            "agg",
            Some("main"),
            ["second"],
            AggregateOptions::default(),
        )
        .unwrap();
        let id = memory.create_aggregate_device(&description).unwrap();

        let backend: Arc<dyn AudioBackend> = Arc::new(memory);
        let subs = AudioDevice::lookup_by_id(&backend, id)
            .unwrap()
            .owned_aggregate_devices()
            .unwrap();
        (backend, subs)
    }

    #[test]
    fn test_drift_compensation_defaults() {
        let (_backend, subs) = aggregate_subs();
        assert_eq!(subs[0].drift_compensation(), Some(false));
        assert_eq!(subs[1].drift_compensation(), Some(true));
        assert_eq!(
            subs[1].drift_compensation_quality(),
            Some(DriftCompensationQuality::MAX)
        );
        assert_eq!(subs[0].extra_latency(), Some(0.0));
    }

    #[test]
    fn test_set_sub_device_properties() {
        let (_backend, subs) = aggregate_subs();
        let second = &subs[1];

        second.set_extra_latency(128.0).unwrap();
        second.set_drift_compensation(false).unwrap();
        second
            .set_drift_compensation_quality(DriftCompensationQuality::MEDIUM)
            .unwrap();

        assert_eq!(second.extra_latency(), Some(128.0));
        assert_eq!(second.drift_compensation(), Some(false));
        assert_eq!(
            second.drift_compensation_quality(),
            Some(DriftCompensationQuality::MEDIUM)
        );
        // Siblings are untouched
        assert_eq!(subs[0].extra_latency(), Some(0.0));
    }

    #[test]
    fn test_physical_device_has_no_sub_device_properties() {
        let (backend, _subs) = aggregate_subs();
        let main = AudioDevice::lookup_by_uid(&backend, "main").unwrap();

        assert_eq!(main.extra_latency(), None);
        assert_eq!(main.drift_compensation(), None);
        assert_eq!(main.drift_compensation_quality(), None);

        let err = main.set_extra_latency(64.0).unwrap_err();
        assert!(matches!(err, AudioHalError::PropertyUnavailable { .. }));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let (_backend, subs) = aggregate_subs();
        let second = &subs[1];

        let err = second
            .set_drift_compensation_quality(DriftCompensationQuality::MAX + 1)
            .unwrap_err();
        assert!(matches!(
            err,
            AudioHalError::InvalidPropertyValue { address, .. }
                if address == PropertyAddress::global(Selector::SUB_DEVICE_DRIFT_COMPENSATION_QUALITY)
        ));
        assert_eq!(
            second.drift_compensation_quality(),
            Some(DriftCompensationQuality::MAX)
        );

        assert!(matches!(
            second.set_extra_latency(-1.0),
            Err(AudioHalError::InvalidPropertyValue { .. })
        ));
        assert!(matches!(
            second.set_extra_latency(f64::NAN),
            Err(AudioHalError::InvalidPropertyValue { .. })
        ));
        assert_eq!(second.extra_latency(), Some(0.0));
    }
}
