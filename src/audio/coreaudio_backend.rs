//! CoreAudio HAL backend for macOS
//!
//! Uses coreaudio-sys for direct HAL access to:
//! - Read and write AudioObject properties (AudioObjectGetPropertyData & co)
//! - Translate device UIDs to object ids (kAudioHardwarePropertyTranslateUIDToDevice)
//! - Create and destroy aggregate devices
//!
//! This file is only compiled on macOS via #[cfg(target_os = "macos")]

use std::ffi::c_void;
use std::mem;
use std::ptr;

use core_foundation::array::CFArray;
use core_foundation::base::{CFType, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use coreaudio_sys::*;
use tracing::{debug, warn};

use crate::aggregate::*;
use crate::audio::backend::AudioBackend;
use crate::audio::error::{AudioHalError, Result};
use crate::audio::types::*;

/// CoreAudio HAL backend
///
/// Stateless: every call goes straight to the HAL, which owns the object model.
pub struct CoreAudioBackend;

impl CoreAudioBackend {
    pub fn new() -> Self {
        debug!("[CoreAudio] Backend initialized");
        Self
    }

    // === Private HAL Functions ===

    fn native_address(address: &PropertyAddress) -> AudioObjectPropertyAddress {
        AudioObjectPropertyAddress {
            mSelector: address.selector.0,
            mScope: address.scope.code(),
            mElement: address.element,
        }
    }

    fn check(status: OSStatus, context: impl FnOnce() -> String) -> Result<()> {
        if status == kAudioHardwareNoError as OSStatus {
            Ok(())
        } else {
            Err(AudioHalError::system(status, context()))
        }
    }

    fn data_size(object: AudioObjectId, address: &AudioObjectPropertyAddress) -> Result<u32> {
        let mut size: u32 = 0;
        let status = unsafe {
            AudioObjectGetPropertyDataSize(object, address, 0, ptr::null(), &mut size)
        };
        Self::check(status, || {
            format!("Failed to get property size on object {}", object)
        })?;
        Ok(size)
    }

    /// Read a fixed-size value (UInt32, Float64)
    fn read_scalar<T: Copy + Default>(
        object: AudioObjectId,
        address: &AudioObjectPropertyAddress,
    ) -> Result<T> {
        let mut value = T::default();
        let mut size = mem::size_of::<T>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                object,
                address,
                0,
                ptr::null(),
                &mut size,
                &mut value as *mut T as *mut c_void,
            )
        };
        Self::check(status, || format!("Failed to read property on object {}", object))?;
        Ok(value)
    }

    fn read_string(object: AudioObjectId, address: &AudioObjectPropertyAddress) -> Result<String> {
        let mut cf_value: CFStringRef = ptr::null();
        let mut size = mem::size_of::<CFStringRef>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                object,
                address,
                0,
                ptr::null(),
                &mut size,
                &mut cf_value as *mut CFStringRef as *mut c_void,
            )
        };
        Self::check(status, || format!("Failed to read string on object {}", object))?;

        if cf_value.is_null() {
            return Ok(String::new());
        }

        // The HAL hands out a retained string
        let cf_string = unsafe { CFString::wrap_under_create_rule(cf_value as _) };
        Ok(cf_string.to_string())
    }

    fn read_object_list(
        object: AudioObjectId,
        address: &AudioObjectPropertyAddress,
    ) -> Result<Vec<AudioObjectId>> {
        let mut size = Self::data_size(object, address)?;
        let count = size as usize / mem::size_of::<AudioObjectID>();
        let mut ids: Vec<AudioObjectID> = vec![0; count];
        if count == 0 {
            return Ok(ids);
        }

        let status = unsafe {
            AudioObjectGetPropertyData(
                object,
                address,
                0,
                ptr::null(),
                &mut size,
                ids.as_mut_ptr() as *mut c_void,
            )
        };
        Self::check(status, || format!("Failed to read object list on object {}", object))?;

        // The list can shrink between the two calls
        ids.truncate(size as usize / mem::size_of::<AudioObjectID>());
        Ok(ids)
    }

    fn read_stream_channels(
        object: AudioObjectId,
        address: &AudioObjectPropertyAddress,
    ) -> Result<Vec<u32>> {
        let mut size = Self::data_size(object, address)?;
        if size == 0 {
            return Ok(Vec::new());
        }

        // AudioBufferList is variable-length; back it with a u64 buffer for alignment
        let words = (size as usize).div_ceil(mem::size_of::<u64>());
        let mut buffer = vec![0u64; words];
        let buffer_list = buffer.as_mut_ptr() as *mut AudioBufferList;

        let status = unsafe {
            AudioObjectGetPropertyData(
                object,
                address,
                0,
                ptr::null(),
                &mut size,
                buffer_list as *mut c_void,
            )
        };
        Self::check(status, || {
            format!("Failed to read stream configuration on object {}", object)
        })?;

        let channels = unsafe {
            let num_buffers = (*buffer_list).mNumberBuffers as usize;
            let buffers = std::slice::from_raw_parts((*buffer_list).mBuffers.as_ptr(), num_buffers);
            buffers.iter().map(|b| b.mNumberChannels).collect()
        };
        Ok(channels)
    }

    fn write_raw(
        object: AudioObjectId,
        address: &AudioObjectPropertyAddress,
        size: usize,
        data: *const c_void,
    ) -> Result<()> {
        let status =
            unsafe { AudioObjectSetPropertyData(object, address, 0, ptr::null(), size as u32, data) };
        Self::check(status, || format!("Failed to write property on object {}", object))
    }

    /// Convert an aggregate description to the CFDictionary the HAL expects
    fn description_dictionary(description: &AggregateDescription) -> CFDictionary<CFString, CFType> {
        let flag = |value: bool| {
            if value {
                CFBoolean::true_value().as_CFType()
            } else {
                CFBoolean::false_value().as_CFType()
            }
        };

        let mut pairs: Vec<(CFString, CFType)> = vec![
            (
                CFString::from_static_string(AGGREGATE_DEVICE_NAME_KEY),
                CFString::new(&description.name).as_CFType(),
            ),
            (
                CFString::from_static_string(AGGREGATE_DEVICE_UID_KEY),
                CFString::new(&description.uid).as_CFType(),
            ),
            (
                CFString::from_static_string(AGGREGATE_DEVICE_PRIVATE_KEY),
                flag(description.is_private),
            ),
            (
                CFString::from_static_string(AGGREGATE_DEVICE_STACKED_KEY),
                flag(description.is_stacked),
            ),
        ];

        if !description.sub_devices.is_empty() {
            let entries: Vec<CFDictionary<CFString, CFType>> = description
                .sub_devices
                .iter()
                .map(|entry| {
                    CFDictionary::from_CFType_pairs(&[
                        (
                            CFString::from_static_string(SUB_DEVICE_UID_KEY),
                            CFString::new(&entry.uid).as_CFType(),
                        ),
                        (
                            CFString::from_static_string(SUB_DEVICE_DRIFT_COMPENSATION_KEY),
                            CFNumber::from(entry.drift_compensation as i32).as_CFType(),
                        ),
                    ])
                })
                .collect();
            pairs.push((
                CFString::from_static_string(AGGREGATE_DEVICE_SUB_DEVICE_LIST_KEY),
                CFArray::from_CFTypes(&entries).as_CFType(),
            ));
        }

        if let Some(main) = &description.main_sub_device {
            pairs.push((
                CFString::from_static_string(AGGREGATE_DEVICE_MAIN_SUB_DEVICE_KEY),
                CFString::new(main).as_CFType(),
            ));
        }

        if let Some(clock) = &description.clock_device {
            pairs.push((
                CFString::from_static_string(AGGREGATE_DEVICE_CLOCK_DEVICE_KEY),
                CFString::new(clock).as_CFType(),
            ));
        }

        CFDictionary::from_CFType_pairs(&pairs)
    }
}

impl Default for CoreAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CoreAudioBackend {
    fn has_property(&self, object: AudioObjectId, address: &PropertyAddress) -> bool {
        let address = Self::native_address(address);
        unsafe { AudioObjectHasProperty(object, &address) != 0 }
    }

    fn is_property_settable(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
    ) -> Result<bool> {
        let native = Self::native_address(address);
        let mut settable: Boolean = 0;
        let status = unsafe { AudioObjectIsPropertySettable(object, &native, &mut settable) };
        Self::check(status, || {
            format!("Failed to query settability of {} on object {}", address, object)
        })?;
        Ok(settable != 0)
    }

    fn get_property(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        kind: PropertyKind,
    ) -> Result<PropertyValue> {
        let native = Self::native_address(address);
        let value = match kind {
            PropertyKind::U32 => PropertyValue::U32(Self::read_scalar::<u32>(object, &native)?),
            PropertyKind::F64 => PropertyValue::F64(Self::read_scalar::<f64>(object, &native)?),
            PropertyKind::String => PropertyValue::String(Self::read_string(object, &native)?),
            PropertyKind::ObjectList => {
                PropertyValue::ObjectList(Self::read_object_list(object, &native)?)
            }
            PropertyKind::StreamChannels => {
                PropertyValue::StreamChannels(Self::read_stream_channels(object, &native)?)
            }
        };
        Ok(value)
    }

    fn set_property(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        value: &PropertyValue,
    ) -> Result<()> {
        let native = Self::native_address(address);
        match value {
            PropertyValue::U32(v) => Self::write_raw(
                object,
                &native,
                mem::size_of::<u32>(),
                v as *const u32 as *const c_void,
            ),
            PropertyValue::F64(v) => Self::write_raw(
                object,
                &native,
                mem::size_of::<f64>(),
                v as *const f64 as *const c_void,
            ),
            PropertyValue::String(s) => {
                let cf_string = CFString::new(s);
                let cf_ref = cf_string.as_concrete_TypeRef();
                Self::write_raw(
                    object,
                    &native,
                    mem::size_of::<CFStringRef>(),
                    &cf_ref as *const _ as *const c_void,
                )
            }
            PropertyValue::ObjectList(ids) => Self::write_raw(
                object,
                &native,
                mem::size_of_val(ids.as_slice()),
                ids.as_ptr() as *const c_void,
            ),
            PropertyValue::StreamChannels(_) => Err(AudioHalError::NotSupported(format!(
                "Writing stream configuration {}",
                address
            ))),
        }
    }

    fn translate_uid(&self, uid: &str) -> Result<Option<AudioObjectId>> {
        let address = Self::native_address(&PropertyAddress::global(
            Selector::TRANSLATE_UID_TO_DEVICE,
        ));
        let cf_uid = CFString::new(uid);
        let cf_ref = cf_uid.as_concrete_TypeRef();

        let mut device_id: AudioObjectID = kAudioObjectUnknown;
        let mut size = mem::size_of::<AudioObjectID>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                mem::size_of::<CFStringRef>() as u32,
                &cf_ref as *const _ as *const c_void,
                &mut size,
                &mut device_id as *mut _ as *mut c_void,
            )
        };
        Self::check(status, || format!("Failed to translate UID {}", uid))?;

        if device_id == kAudioObjectUnknown {
            return Ok(None);
        }
        Ok(Some(device_id))
    }

    fn create_aggregate_device(
        &self,
        description: &AggregateDescription,
    ) -> Result<AudioObjectId> {
        let dictionary = Self::description_dictionary(description);

        let mut device_id: AudioObjectID = kAudioObjectUnknown;
        let status = unsafe {
            AudioHardwareCreateAggregateDevice(
                dictionary.as_concrete_TypeRef() as _,
                &mut device_id,
            )
        };
        if let Err(e) = Self::check(status, || {
            format!("Failed to create aggregate device {}", description.uid)
        }) {
            warn!("[CoreAudio] {}", e);
            return Err(e);
        }

        debug!(
            "[CoreAudio] Created aggregate device {} (ID: {})",
            description.uid, device_id
        );
        Ok(device_id)
    }

    fn destroy_aggregate_device(&self, id: AudioObjectId) -> Result<()> {
        let status = unsafe { AudioHardwareDestroyAggregateDevice(id) };
        Self::check(status, || format!("Failed to destroy aggregate device {}", id))?;
        debug!("[CoreAudio] Destroyed aggregate device {}", id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CoreAudio"
    }
}
