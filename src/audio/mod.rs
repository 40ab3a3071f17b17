//! HAL backend abstraction layer
//!
//! This module provides the generic property-address/get/set surface of the
//! audio hardware object model and the backends that implement it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │       AudioSystem / AudioDevice             │
//! │  Typed accessors, doesn't know which        │
//! │  backend answers the property requests      │
//! └─────────────┬───────────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────────┐
//! │         trait AudioBackend                  │
//! │  get_property(), set_property()             │
//! │  create_aggregate_device(), translate_uid() │
//! └──────┬──────────────────────┬───────────────┘
//!        ▼                      ▼
//! ┌──────────────┐    ┌──────────────┐
//! │ CoreAudio    │    │ Memory       │
//! │ Backend      │    │ Backend      │
//! │ (macOS)      │    │ (any)        │
//! └──────────────┘    └──────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod memory_backend;
pub mod types;

#[cfg(target_os = "macos")]
pub mod coreaudio_backend;

// Re-exports for convenience
pub use backend::{create_backend, AudioBackend};
pub use error::{status, status_name, AudioHalError, Result};
pub use memory_backend::{DeviceSpec, MemoryBackend};
pub use types::*;
