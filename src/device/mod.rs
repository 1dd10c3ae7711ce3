//! Modulator geometry, mask buffers and validated device state.

pub mod mask;
pub mod spec;
pub mod state;

pub use mask::{ElementKind, MaskBuffer};
pub use spec::{DeviceSpec, DeviceSpecRegistry};
pub use state::{AxisSign, DeviceConfig, DeviceState, DeviceStateBuilder, ShiftComponent};
