//! Device enumeration, aggregate device composition and sub-device
//! properties over the audio hardware abstraction layer.
//!
//! ```ignore
//! use coreaudio_aggregate::AudioSystem;
//!
//! let system = AudioSystem::new()?;
//! let main = system.default_output_device().unwrap();
//! let others = system.all_output_devices();
//!
//! let aggregate = system.create_aggregate_device(
//!     Some(&main),
//!     &others,
//!     "All Outputs",
//!     "com.example.all-outputs",
//!     None,
//! )?;
//! for sub in aggregate.owned_aggregate_devices().unwrap_or_default() {
//!     sub.set_extra_latency(32.0)?;
//! }
//! ```

pub mod aggregate;
pub mod audio;
pub mod config;
pub mod device;
pub mod sub_device;
pub mod system;

pub use aggregate::{AggregateDescription, AggregateOptions, SubDeviceEntry};
pub use audio::{
    create_backend, AudioBackend, AudioHalError, DeviceInfo, DeviceSpec,
    DriftCompensationQuality, MemoryBackend, PropertyAddress, Result, Scope, Selector,
};
pub use config::{AggregatePreset, PresetFile, SubDeviceSettings};
pub use device::AudioDevice;
pub use system::AudioSystem;
