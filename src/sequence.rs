//! Mask sequence staging for the micromirror projector.
//!
//! A batch of masks is validated as a unit: either every frame and the timing
//! pass and one [`MaskSequence`] is produced, or nothing is. The sequence is
//! then handed to the session in a single allocation.
//!
//! Frames are given as a `(frames, rows, cols)` array with values in `[0, 1]`.
//! The projector runs at 1-bit depth and expects `0`/`255` bytes, so accepted
//! values are scaled by the full-scale value and flattened row-major, frame
//! after frame.

use crate::error::{MaskError, MaskResult};
use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Full-scale byte value for a 1-bit projector sequence.
pub const FULL_SCALE_1BIT: u8 = 255;
/// Bit depth the projector sequences are allocated with.
pub const SEQUENCE_BIT_DEPTH: u8 = 1;

/// Who drives the projector's frame clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    /// The projector runs on its own clock and emits the sync pulse.
    #[default]
    Master,
    /// The projector waits for an external trigger.
    Slave,
}

/// Active level of the sync pulse sent to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynchPolarity {
    /// Pulse goes high; a rising edge marks the frame start.
    #[default]
    High,
    /// Pulse goes low; a falling edge marks the frame start.
    Low,
}

/// Projector timing, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceTiming {
    /// Time slot dedicated to each frame.
    pub picture_time_us: u32,
    /// Time each frame is actually shown; at most `picture_time_us`.
    pub illumination_time_us: u32,
    /// Width of the sync pulse sent to the camera.
    #[serde(default = "default_synch_pulse_width")]
    pub synch_pulse_width_us: u32,
    /// Delay between picture start and illumination start.
    #[serde(default)]
    pub synch_delay_us: u32,
}

fn default_synch_pulse_width() -> u32 {
    100
}

impl SequenceTiming {
    /// Timing with the default sync pulse (100 us, no delay).
    pub fn new(picture_time_us: u32, illumination_time_us: u32) -> Self {
        Self {
            picture_time_us,
            illumination_time_us,
            synch_pulse_width_us: default_synch_pulse_width(),
            synch_delay_us: 0,
        }
    }

    /// Same timing with a different sync pulse.
    pub fn with_synch(mut self, pulse_width_us: u32, delay_us: u32) -> Self {
        self.synch_pulse_width_us = pulse_width_us;
        self.synch_delay_us = delay_us;
        self
    }

    /// Picture time must be non-zero and cover the illumination time.
    pub fn validate(&self) -> MaskResult<()> {
        if self.picture_time_us == 0 {
            return Err(MaskError::InvalidTiming(
                "picture_time_us must be greater than 0".to_string(),
            ));
        }
        if self.illumination_time_us > self.picture_time_us {
            return Err(MaskError::InvalidTiming(format!(
                "illumination_time_us ({}) exceeds picture_time_us ({})",
                self.illumination_time_us, self.picture_time_us
            )));
        }
        Ok(())
    }
}

/// A validated, scaled and flattened batch of projector frames.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSequence {
    payload: Vec<u8>,
    frame_count: usize,
    frame_shape: (usize, usize),
    timing: SequenceTiming,
}

impl MaskSequence {
    /// Number of frames, at least one.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// `(rows, cols)` of each frame.
    pub fn frame_shape(&self) -> (usize, usize) {
        self.frame_shape
    }

    /// Timing the sequence was validated with.
    pub fn timing(&self) -> &SequenceTiming {
        &self.timing
    }

    /// Always [`SEQUENCE_BIT_DEPTH`].
    pub fn bit_depth(&self) -> u8 {
        SEQUENCE_BIT_DEPTH
    }

    /// All frames in upload order.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// One frame's bytes, row-major. `None` past the last frame.
    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        let len = self.frame_shape.0 * self.frame_shape.1;
        let start = index.checked_mul(len)?;
        let end = start.checked_add(len)?;
        self.payload.get(start..end)
    }

    /// Iterate over frames in upload order.
    pub fn frames(&self) -> impl Iterator<Item = &[u8]> {
        self.payload.chunks_exact(self.frame_shape.0 * self.frame_shape.1)
    }
}

/// Validates mask batches and stages them as [`MaskSequence`]s.
#[derive(Debug, Clone, Copy)]
pub struct SequenceAllocator {
    full_scale: u8,
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new(FULL_SCALE_1BIT)
    }
}

impl SequenceAllocator {
    /// Allocator scaling `1.0` to `full_scale`.
    pub fn new(full_scale: u8) -> Self {
        Self { full_scale }
    }

    /// Byte value `1.0` is scaled to.
    pub fn full_scale(&self) -> u8 {
        self.full_scale
    }

    /// Validate `masks` and `timing` and build the sequence.
    ///
    /// # Errors
    ///
    /// - `EmptySequence` if there are no frames or frames have no pixels.
    /// - `InvalidMaskValues` naming the first frame with a value outside
    ///   `[0, 1]` (NaN included).
    /// - `InvalidTiming` if the timing is rejected.
    pub fn allocate(
        &self,
        masks: ArrayView3<'_, f64>,
        timing: SequenceTiming,
    ) -> MaskResult<MaskSequence> {
        let (frames, rows, cols) = masks.dim();
        if frames == 0 || rows == 0 || cols == 0 {
            warn!(frames, rows, cols, "Rejected sequence: no frames to allocate");
            return Err(MaskError::EmptySequence { frames, rows, cols });
        }

        for (index, frame) in masks.outer_iter().enumerate() {
            if let Some(&value) = frame.iter().find(|v| !(0.0..=1.0).contains(*v)) {
                warn!(frame = index, value, "Rejected sequence: pixel values must be in [0, 1]");
                return Err(MaskError::InvalidMaskValues { frame: index, value });
            }
        }

        if let Err(err) = timing.validate() {
            warn!(?timing, %err, "Rejected sequence timing");
            return Err(err);
        }

        let scale = f64::from(self.full_scale);
        // Logical iteration order is row-major regardless of memory layout.
        let payload: Vec<u8> = masks.iter().map(|&v| (v * scale).round() as u8).collect();

        info!(
            frames,
            rows,
            cols,
            picture_time_us = timing.picture_time_us,
            illumination_time_us = timing.illumination_time_us,
            "Mask sequence staged"
        );
        Ok(MaskSequence {
            payload,
            frame_count: frames,
            frame_shape: (rows, cols),
            timing,
        })
    }
}
