//! Triggered camera settings.
//!
//! The camera is slaved to the projector: every frame start is triggered by
//! the projector's sync pulse on a GPI line. This module only validates and
//! applies settings; frame acquisition lives outside this crate.

use crate::error::{MaskError, MaskResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Edge of the external signal that triggers an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Free-running, no external trigger.
    Off,
    /// Low-to-high transition on the GPI line.
    #[default]
    RisingEdge,
    /// High-to-low transition on the GPI line.
    FallingEdge,
    /// Triggered from the host.
    Software,
}

/// What a trigger starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSelector {
    /// Each trigger starts one frame.
    #[default]
    FrameStart,
    /// Exposure lasts while the trigger is active.
    ExposureActive,
    /// The first trigger starts a continuous acquisition.
    AcquisitionStart,
}

/// Mode of the general-purpose input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GpiMode {
    /// Input ignored.
    Off,
    /// Input used as trigger.
    #[default]
    Trigger,
}

/// Sensor readout reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Downsampling {
    /// Full sensor resolution.
    Full,
    /// 2x2 reduction by skipping pixels.
    #[default]
    Skip2x2,
    /// 2x2 reduction by binning pixels.
    Bin2x2,
}

/// Output pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit monochrome.
    #[default]
    Mono8,
    /// 16-bit monochrome.
    Mono16,
}

/// Camera settings applied before an acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Exposure time in microseconds; must be > 0.
    #[serde(default = "default_exposure_us")]
    pub exposure_us: u32,
    /// Sensor gain in dB; finite and >= 0.
    #[serde(default)]
    pub gain_db: f64,
    /// Mode of the GPI line the projector sync is wired to.
    #[serde(default)]
    pub gpi_mode: GpiMode,
    /// Trigger edge. Anything but `off` needs `gpi_mode = trigger`.
    #[serde(default)]
    pub trigger_source: TriggerSource,
    /// What each trigger starts.
    #[serde(default)]
    pub trigger_selector: TriggerSelector,
    /// Readout reduction.
    #[serde(default)]
    pub downsampling: Downsampling,
    /// Output pixel format.
    #[serde(default)]
    pub pixel_format: PixelFormat,
    /// Grow the driver's buffer queue to its maximum.
    #[serde(default = "default_true")]
    pub max_buffer_queue: bool,
}

fn default_exposure_us() -> u32 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            exposure_us: default_exposure_us(),
            gain_db: 0.0,
            gpi_mode: GpiMode::default(),
            trigger_source: TriggerSource::default(),
            trigger_selector: TriggerSelector::default(),
            downsampling: Downsampling::default(),
            pixel_format: PixelFormat::default(),
            max_buffer_queue: true,
        }
    }
}

impl CameraConfig {
    /// Same settings with a different exposure.
    pub fn with_exposure_us(mut self, exposure_us: u32) -> Self {
        self.exposure_us = exposure_us;
        self
    }

    /// Check exposure, gain and trigger wiring.
    pub fn validate(&self) -> MaskResult<()> {
        if self.exposure_us == 0 {
            return Err(MaskError::InvalidCameraSetting(
                "exposure_us must be greater than 0".to_string(),
            ));
        }
        if !self.gain_db.is_finite() || self.gain_db < 0.0 {
            return Err(MaskError::InvalidCameraSetting(format!(
                "gain_db must be a finite value >= 0, got {}",
                self.gain_db
            )));
        }
        if self.trigger_source != TriggerSource::Off && self.gpi_mode != GpiMode::Trigger {
            return Err(MaskError::InvalidCameraSetting(format!(
                "trigger source {:?} requires gpi_mode = trigger",
                self.trigger_source
            )));
        }
        Ok(())
    }

    /// True if the exposure fits inside one projector picture slot.
    pub fn fits_picture_time(&self, picture_time_us: u32) -> bool {
        self.exposure_us <= picture_time_us
    }
}

/// Adapter for a camera that takes the settings above.
#[async_trait]
pub trait TriggeredCamera: Send {
    /// Connect to the camera.
    async fn open(&mut self) -> Result<()>;
    /// Send validated settings to an open camera.
    async fn apply(&mut self, config: &CameraConfig) -> Result<()>;
    /// Release the camera.
    async fn close(&mut self) -> Result<()>;
}

/// Validate `config`, open the camera and apply it.
///
/// Nothing is sent to the camera if validation fails. If the settings cannot
/// be applied the camera is closed again and the apply error is returned.
pub async fn configure_camera<C: TriggeredCamera>(camera: &mut C, config: &CameraConfig) -> Result<()> {
    if let Err(err) = config.validate() {
        warn!(%err, "Rejected camera configuration");
        return Err(err.into());
    }
    camera.open().await?;
    if let Err(err) = camera.apply(config).await {
        if let Err(close_err) = camera.close().await {
            warn!(%close_err, "Camera close failed after apply error");
        }
        return Err(err);
    }
    info!(
        exposure_us = config.exposure_us,
        trigger = ?config.trigger_source,
        "Camera configured"
    );
    Ok(())
}
