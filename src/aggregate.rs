//! Aggregate device composition
//!
//! Builds the description the HAL needs to instantiate an aggregate device:
//! name, UID, visibility flags and the ordered list of sub-devices. The field
//! names serialize to the HAL dictionary keys (`kAudioAggregateDevice*Key`).

use serde::{Deserialize, Serialize};

use crate::audio::error::{AudioHalError, Result};

/// `kAudioAggregateDeviceNameKey`
pub const AGGREGATE_DEVICE_NAME_KEY: &str = "name";
/// `kAudioAggregateDeviceUIDKey`
pub const AGGREGATE_DEVICE_UID_KEY: &str = "uid";
/// `kAudioAggregateDeviceIsPrivateKey`
pub const AGGREGATE_DEVICE_PRIVATE_KEY: &str = "private";
/// `kAudioAggregateDeviceIsStackedKey`
pub const AGGREGATE_DEVICE_STACKED_KEY: &str = "stacked";
/// `kAudioAggregateDeviceSubDeviceListKey`
pub const AGGREGATE_DEVICE_SUB_DEVICE_LIST_KEY: &str = "subdevices";
/// `kAudioAggregateDeviceMainSubDeviceKey`
pub const AGGREGATE_DEVICE_MAIN_SUB_DEVICE_KEY: &str = "master";
/// `kAudioAggregateDeviceClockDeviceKey`
pub const AGGREGATE_DEVICE_CLOCK_DEVICE_KEY: &str = "clock";
/// `kAudioSubDeviceUIDKey`
pub const SUB_DEVICE_UID_KEY: &str = "uid";
/// `kAudioSubDeviceDriftCompensationKey`
pub const SUB_DEVICE_DRIFT_COMPENSATION_KEY: &str = "drift";

/// Visibility and layout of a new aggregate device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// Only visible to the creating process, destroyed when it exits
    #[serde(default)]
    pub is_private: bool,
    /// Sub-devices play the same signal (multi-output device)
    #[serde(default)]
    pub is_stacked: bool,
}

impl AggregateOptions {
    /// Public stacked aggregate, what Audio MIDI Setup calls a multi-output device
    pub const MULTI_OUTPUT: Self = Self {
        is_private: false,
        is_stacked: true,
    };
}

/// One entry of the sub-device list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDeviceEntry {
    #[serde(rename = "uid")]
    pub uid: String,
    /// 0 for the main sub-device, 1 for every other one
    #[serde(rename = "drift")]
    pub drift_compensation: u32,
}

/// Everything the HAL needs to create an aggregate device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateDescription {
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "uid")]
    pub uid: String,
    #[serde(rename = "private")]
    pub is_private: bool,
    #[serde(rename = "stacked")]
    pub is_stacked: bool,
    #[serde(rename = "subdevices", default, skip_serializing_if = "Vec::is_empty")]
    pub sub_devices: Vec<SubDeviceEntry>,
    #[serde(rename = "master", default, skip_serializing_if = "Option::is_none")]
    pub main_sub_device: Option<String>,
    #[serde(rename = "clock", default, skip_serializing_if = "Option::is_none")]
    pub clock_device: Option<String>,
}

impl AggregateDescription {
    /// Compose an aggregate from a main device UID and further sub-device UIDs
    ///
    /// The main device comes first and is the drift reference; repeated UIDs
    /// keep their first position. Sub-devices without a main device are
    /// rejected. With neither, the aggregate is created empty.
    pub fn compose<I, S>(
        name: impl Into<String>,
        uid: impl Into<String>,
        main_uid: Option<&str>,
        sub_uids: I,
        options: AggregateOptions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sub_uids: Vec<String> = sub_uids.into_iter().map(Into::into).collect();

        let mut description = Self {
            name: name.into(),
            uid: uid.into(),
            is_private: options.is_private,
            is_stacked: options.is_stacked,
            sub_devices: Vec::new(),
            main_sub_device: None,
            clock_device: None,
        };

        let main_uid = match main_uid {
            Some(main) => main,
            None if sub_uids.is_empty() => return Ok(description),
            None => {
                return Err(AudioHalError::InvalidComposition(format!(
                    "{} sub-device(s) given without a main device",
                    sub_uids.len()
                )))
            }
        };

        let all_uids = std::iter::once(main_uid.to_string()).chain(sub_uids);
        description.sub_devices = unique(all_uids)
            .into_iter()
            .map(|uid| SubDeviceEntry {
                drift_compensation: u32::from(uid != main_uid),
                uid,
            })
            .collect();
        description.main_sub_device = Some(main_uid.to_string());

        Ok(description)
    }

    /// Designate the device that drives the aggregate's clock
    pub fn with_clock_device(mut self, uid: impl Into<String>) -> Self {
        self.clock_device = Some(uid.into());
        self
    }

    pub fn sub_device_uids(&self) -> impl Iterator<Item = &str> {
        self.sub_devices.iter().map(|entry| entry.uid.as_str())
    }
}

/// Drop repeated items, keeping the first occurrence of each
fn unique<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
