//! Validated in-memory state of one modulator.
//!
//! Every mutator checks its input first and only then commits, so a rejected
//! call leaves the state exactly as it was and logs which constraint failed.
//!
//! # Example
//!
//! ```
//! use optomask::device::DeviceState;
//!
//! let mut slm = DeviceState::builder("LCR2500").inversion((1, -1)).build()?;
//! assert_eq!(slm.reference(), (512, 384));
//!
//! slm.update_reference((10, -4))?;
//! assert_eq!(slm.reference(), (522, 380));
//! assert!(slm.update_reference((600, 0)).is_err());
//! # Ok::<(), optomask::error::MaskError>(())
//! ```

use crate::device::mask::MaskBuffer;
use crate::device::spec::{DeviceSpec, DeviceSpecRegistry};
use crate::error::{MaskError, MaskResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default intensity bit depth of a modulator.
pub const DEFAULT_BIT_DEPTH: u32 = 8;
const MAX_BIT_DEPTH: u32 = 32;

/// Per-axis readout sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisSign {
    /// Axis read out as stored (`1`).
    #[default]
    Normal,
    /// Axis read out mirrored (`-1`).
    Flipped,
}

impl AxisSign {
    fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(AxisSign::Normal),
            -1 => Some(AxisSign::Flipped),
            _ => None,
        }
    }

    /// `1` or `-1`.
    pub fn as_i8(self) -> i8 {
        match self {
            AxisSign::Normal => 1,
            AxisSign::Flipped => -1,
        }
    }
}

/// A scalar usable as one component of a reference shift.
///
/// Integers are always whole pixels. Floats count only when finite with no
/// fractional part.
pub trait ShiftComponent: Copy {
    /// The value as whole pixels, or `None` if it is not integral.
    fn whole_pixels(self) -> Option<i64>;
    /// The raw value, for diagnostics.
    fn raw(self) -> f64;
}

macro_rules! impl_shift_int {
    ($($ty:ty),*) => {
        $(
            impl ShiftComponent for $ty {
                fn whole_pixels(self) -> Option<i64> {
                    // Out-of-range magnitudes saturate and fail the bounds check.
                    let saturated = if (self as f64) > 0.0 { i64::MAX } else { i64::MIN };
                    Some(i64::try_from(self).unwrap_or(saturated))
                }
                fn raw(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_shift_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ShiftComponent for f64 {
    fn whole_pixels(self) -> Option<i64> {
        (self.is_finite() && self.fract() == 0.0).then_some(self as i64)
    }
    fn raw(self) -> f64 {
        self
    }
}

impl ShiftComponent for f32 {
    fn whole_pixels(self) -> Option<i64> {
        f64::from(self).whole_pixels()
    }
    fn raw(self) -> f64 {
        f64::from(self)
    }
}

/// Construction parameters for a [`DeviceState`].
///
/// Also the `[slm]` / `[dmd]` configuration block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Registry model name, e.g. `"LCR2500"`.
    pub model: String,
    /// Offset of the reference point from the panel center, in pixels.
    #[serde(default)]
    pub reference_offset: (i64, i64),
    /// Monitor the modulator is attached to. Passed through to the session.
    #[serde(default)]
    pub monitor_index: u32,
    /// Intensity bit depth.
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u32,
    /// Per-axis inversion sign, each `1` or `-1`.
    #[serde(default = "default_inversion")]
    pub inversion: (i64, i64),
}

fn default_bit_depth() -> u32 {
    DEFAULT_BIT_DEPTH
}

fn default_inversion() -> (i64, i64) {
    (1, 1)
}

impl DeviceConfig {
    /// Defaults for `model`: centered reference, monitor 0, 8 bits, no inversion.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reference_offset: (0, 0),
            monitor_index: 0,
            bit_depth: DEFAULT_BIT_DEPTH,
            inversion: default_inversion(),
        }
    }
}

/// Builder for [`DeviceState`]. Nothing is validated until [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct DeviceStateBuilder {
    config: DeviceConfig,
}

impl DeviceStateBuilder {
    /// Offset from the panel center, applied as the first shift.
    pub fn reference_offset(mut self, offset: (i64, i64)) -> Self {
        self.config.reference_offset = offset;
        self
    }

    /// Monitor the modulator is attached to.
    pub fn monitor_index(mut self, monitor_index: u32) -> Self {
        self.config.monitor_index = monitor_index;
        self
    }

    /// Intensity bit depth, `1..=32`.
    pub fn bit_depth(mut self, bit_depth: u32) -> Self {
        self.config.bit_depth = bit_depth;
        self
    }

    /// Per-axis inversion signs.
    pub fn inversion(mut self, inversion: (i64, i64)) -> Self {
        self.config.inversion = inversion;
        self
    }

    /// Validate everything and construct the state.
    pub fn build(self) -> MaskResult<DeviceState> {
        DeviceState::from_config(&self.config)
    }
}

/// Current configuration of one modulator: mask, placement and readout.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    model: String,
    spec: DeviceSpec,
    monitor_index: u32,
    reference: (i64, i64),
    inversion: (AxisSign, AxisSign),
    bit_depth: u32,
    max_value: u64,
    mask: MaskBuffer,
}

impl DeviceState {
    /// State for `model` with every other parameter at its default.
    pub fn new(model: &str) -> MaskResult<Self> {
        Self::builder(model).build()
    }

    /// Builder starting from the defaults for `model`.
    pub fn builder(model: &str) -> DeviceStateBuilder {
        DeviceStateBuilder {
            config: DeviceConfig::new(model),
        }
    }

    /// Resolve the model and apply the configured offset and inversion.
    ///
    /// # Errors
    ///
    /// `UnknownModel`, `InvalidBitDepth`, `OutOfBounds` or `InvalidInversion`.
    /// No state is produced on any of them.
    pub fn from_config(config: &DeviceConfig) -> MaskResult<Self> {
        let spec = DeviceSpecRegistry::global().resolve(&config.model)?;

        if config.bit_depth == 0 || config.bit_depth > MAX_BIT_DEPTH {
            warn!(model = %config.model, bit_depth = config.bit_depth, "Rejected bit depth");
            return Err(MaskError::InvalidBitDepth(config.bit_depth));
        }

        let mut state = Self {
            model: config.model.clone(),
            spec,
            monitor_index: config.monitor_index,
            reference: spec.center_px(),
            inversion: (AxisSign::Normal, AxisSign::Normal),
            bit_depth: config.bit_depth,
            max_value: (1u64 << config.bit_depth) - 1,
            mask: MaskBuffer::zeros(spec.resolution_px),
        };
        state.update_reference(config.reference_offset)?;
        state.update_inversion(config.inversion)?;
        state.blank_mask();

        debug!(
            model = %state.model,
            reference = ?state.reference,
            inversion = ?state.inversion(),
            bit_depth = state.bit_depth,
            "Device state initialised"
        );
        Ok(state)
    }

    /// Registry model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Resolved hardware description.
    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    /// Resolution as `(width, height)`.
    pub fn resolution_px(&self) -> (usize, usize) {
        self.spec.resolution_px
    }

    /// Projector frame shape as `(rows, cols)`, i.e. `(height, width)`.
    pub fn frame_shape(&self) -> (usize, usize) {
        let (width, height) = self.spec.resolution_px;
        (height, width)
    }

    /// Monitor passed to the session on open.
    pub fn monitor_index(&self) -> u32 {
        self.monitor_index
    }

    /// Placement reference `(x, y)`, 1-based.
    pub fn reference(&self) -> (i64, i64) {
        self.reference
    }

    /// Inversion signs as `(sx, sy)`.
    pub fn inversion(&self) -> (i8, i8) {
        (self.inversion.0.as_i8(), self.inversion.1.as_i8())
    }

    /// Intensity bit depth.
    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    /// Largest intensity value, `2^bit_depth - 1`.
    pub fn max_value(&self) -> u64 {
        self.max_value
    }

    /// The stored mask, exactly as last accepted.
    pub fn mask(&self) -> &MaskBuffer {
        &self.mask
    }

    /// The mask in hardware readout order: each axis whose inversion is `-1`
    /// is reversed.
    pub fn oriented_mask(&self) -> MaskBuffer {
        self.mask.flipped(
            self.inversion.0 == AxisSign::Flipped,
            self.inversion.1 == AxisSign::Flipped,
        )
    }

    /// Replace the mask after checking its element kind and shape.
    pub fn update_mask(&mut self, mask: impl Into<MaskBuffer>) -> MaskResult<()> {
        let mask = mask.into();

        let kind = mask.kind();
        if !kind.is_whitelisted() {
            warn!(model = %self.model, %kind, "Rejected mask: element type not accepted");
            return Err(MaskError::InvalidMaskKind { kind });
        }

        let shape = mask.shape();
        if shape != self.spec.resolution_px {
            warn!(
                model = %self.model,
                shape = ?shape,
                expected = ?self.spec.resolution_px,
                "Rejected mask: shape does not match device resolution"
            );
            return Err(MaskError::InvalidMaskShape {
                actual: shape,
                expected: self.spec.resolution_px,
            });
        }

        self.mask = mask;
        debug!(model = %self.model, %kind, "Mask updated");
        Ok(())
    }

    /// Reset the mask to `float64` zeros.
    pub fn blank_mask(&mut self) {
        self.mask = MaskBuffer::zeros(self.spec.resolution_px);
    }

    /// Move the reference by `dshift`. Shifts accumulate.
    ///
    /// The new reference must satisfy `0 < r <= resolution` on both axes.
    pub fn update_reference<T: ShiftComponent>(&mut self, dshift: (T, T)) -> MaskResult<()> {
        let (Some(dx), Some(dy)) = (dshift.0.whole_pixels(), dshift.1.whole_pixels()) else {
            let (rx, ry) = (dshift.0.raw(), dshift.1.raw());
            warn!(model = %self.model, dx = rx, dy = ry, "Rejected shift: values must be integers");
            return Err(MaskError::NonIntegerShift(rx, ry));
        };

        let target = (
            self.reference.0.saturating_add(dx),
            self.reference.1.saturating_add(dy),
        );
        let shift = (dx, dy);
        let (width, height) = self.spec.resolution_px;
        if target.0 <= 0 || target.0 > width as i64 || target.1 <= 0 || target.1 > height as i64 {
            warn!(
                model = %self.model,
                reference = ?self.reference,
                shift = ?shift,
                "Rejected shift: new center reference is outside device boundaries"
            );
            return Err(MaskError::OutOfBounds {
                target,
                bounds: self.spec.resolution_px,
            });
        }

        self.reference = target;
        debug!(model = %self.model, reference = ?target, "Reference updated");
        Ok(())
    }

    /// Set the per-axis inversion. Each component must be `1` or `-1`.
    pub fn update_inversion<T: Into<i64>>(&mut self, inversion: (T, T)) -> MaskResult<()> {
        let (sx, sy) = (inversion.0.into(), inversion.1.into());
        let (Some(x), Some(y)) = (AxisSign::from_value(sx), AxisSign::from_value(sy)) else {
            warn!(model = %self.model, sx, sy, "Rejected inversion: values must be 1 or -1");
            return Err(MaskError::InvalidInversion(sx, sy));
        };

        self.inversion = (x, y);
        debug!(model = %self.model, sx, sy, "Inversion updated");
        Ok(())
    }
}
