//! Error types for device state validation and sequence staging.
//!
//! `MaskError` is the single error type of the validation core. Every variant
//! names the constraint that failed together with the offending values, so a
//! rejected mutation can be reported to the operator verbatim.
//!
//! ## Error Hierarchy
//!
//! - **`UnknownModel`**: the requested hardware model is not in the registry.
//!   Construction stops; no device state is produced.
//! - **`InvalidMask`**: a mask has a rejected element kind or the wrong shape.
//! - **`OutOfBounds`** / **`NonIntegerShift`**: a reference shift would leave
//!   the panel, or is not a whole number of pixels.
//! - **`InvalidInversion`**: an inversion sign other than `1` or `-1`.
//! - **`InvalidBitDepth`**: bit depth outside `1..=32`.
//! - **`InvalidMaskValues`** / **`EmptySequence`** / **`InvalidFrameShape`** /
//!   **`InvalidTiming`**: a DMD sequence batch was rejected as a whole.
//! - **`InvalidCameraSetting`**: a camera exposure or gain value is unusable.
//!
//! Hardware session failures are not represented here. Adapters report them as
//! `anyhow::Error` and they reach the caller unmodified.

use crate::device::mask::ElementKind;
use thiserror::Error;

/// Convenience alias for results using the validation error type.
pub type MaskResult<T> = std::result::Result<T, MaskError>;

/// Failure reported by a validating operation. State is unchanged on error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
    /// Model name missing from the device registry.
    #[error(
        "Model '{model}' is not present in the device database (known: {}). \
         Consider contributing the {model} specifications.",
        .supported.join(", ")
    )]
    UnknownModel {
        /// Requested model name.
        model: String,
        /// Names the registry does know about.
        supported: Vec<String>,
    },

    /// Mask element kind is not accepted by the hardware.
    #[error("Mask values are of invalid type {kind}. Valid types are {}", ElementKind::whitelist_display())]
    InvalidMaskKind {
        /// Rejected element kind.
        kind: ElementKind,
    },

    /// Mask shape does not match the device resolution.
    #[error("The new mask has shape {actual:?} and the required shape is {expected:?}")]
    InvalidMaskShape {
        /// Shape of the rejected mask.
        actual: (usize, usize),
        /// Device resolution.
        expected: (usize, usize),
    },

    /// Reference shift would move the reference outside the panel.
    #[error(
        "New center reference {target:?} is outside device boundaries (1..={}, 1..={})",
        .bounds.0, .bounds.1
    )]
    OutOfBounds {
        /// Reference after the rejected shift.
        target: (i64, i64),
        /// Panel resolution.
        bounds: (usize, usize),
    },

    /// Reference shift is not a whole number of pixels.
    #[error("Shift values must be integers, got ({0}, {1})")]
    NonIntegerShift(f64, f64),

    /// Inversion sign outside {-1, 1}.
    #[error("Inversion values ({0}, {1}) are not valid. Valid values are [-1, 1]")]
    InvalidInversion(i64, i64),

    /// Bit depth outside the supported range.
    #[error("Bit depth {0} is not valid. Must be within 1..=32")]
    InvalidBitDepth(u32),

    /// A sequence frame holds a value outside [0, 1].
    #[error("Pixel values of masks must be in the interval [0, 1]: frame {frame} holds {value}")]
    InvalidMaskValues {
        /// Index of the first offending frame.
        frame: usize,
        /// First offending value in that frame.
        value: f64,
    },

    /// A sequence has no frames or zero-sized frames.
    #[error("Mask sequence is empty (frames: {frames}, frame shape: {rows}x{cols})")]
    EmptySequence {
        /// Number of frames supplied.
        frames: usize,
        /// Rows per frame.
        rows: usize,
        /// Columns per frame.
        cols: usize,
    },

    /// Sequence frames do not match the projector resolution.
    #[error("Sequence frames have shape {actual:?} (rows, cols) and the projector requires {expected:?}")]
    InvalidFrameShape {
        /// `(rows, cols)` of the supplied frames.
        actual: (usize, usize),
        /// `(height, width)` of the projector.
        expected: (usize, usize),
    },

    /// Sequence timing violates the projector constraints.
    #[error("Invalid sequence timing: {0}")]
    InvalidTiming(String),

    /// Camera setting rejected before reaching the device.
    #[error("Invalid camera setting: {0}")]
    InvalidCameraSetting(String),
}

impl MaskError {
    /// True for both `InvalidMask` flavours (element kind or shape).
    pub fn is_invalid_mask(&self) -> bool {
        matches!(
            self,
            MaskError::InvalidMaskKind { .. } | MaskError::InvalidMaskShape { .. }
        )
    }
}
