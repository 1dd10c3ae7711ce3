//! Core library for optomask.
//!
//! Keeps the in-memory configuration of optical modulators (spatial light
//! modulators and micromirror projectors) consistent with their hardware
//! limits before anything reaches a device:
//!
//! - [`device`]: model registry, typed mask buffers and validated device state
//! - [`sequence`]: all-or-nothing staging of projector mask sequences
//! - [`session`]: the hardware adapter boundary, controllers and mocks
//! - [`camera`]: settings for the camera triggered by the projector
//! - [`config`]: Figment-based TOML/environment configuration
//! - [`error`]: validation error types

pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod sequence;
pub mod session;

pub use device::{DeviceSpec, DeviceSpecRegistry, DeviceState, MaskBuffer};
pub use error::{MaskError, MaskResult};
pub use sequence::{MaskSequence, ProjectionMode, SequenceAllocator, SequenceTiming, SynchPolarity};
