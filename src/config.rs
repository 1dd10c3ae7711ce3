//! Configuration loading using Figment.
//!
//! Configuration is loaded from (highest precedence first):
//! 1. Environment variables prefixed with `OPTOMASK_`, nested keys separated
//!    by `__`
//! 2. A TOML file (default: `config/optomask.toml`)
//!
//! ```text
//! OPTOMASK_APPLICATION__LOG_LEVEL=debug
//! OPTOMASK_SLM__MONITOR_INDEX=1
//! OPTOMASK_DMD__TIMING__PICTURE_TIME_US=20000
//! ```
//!
//! Loading also validates: every configured model must resolve, every device
//! block must produce a valid device state, and the projector timing and camera
//! settings must pass their own checks.

use crate::camera::{CameraConfig, TriggerSource};
use crate::device::{DeviceConfig, DeviceState};
use crate::error::MaskError;
use crate::sequence::{ProjectionMode, SequenceTiming, SynchPolarity};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/optomask.toml";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "OPTOMASK_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or environment could not be read or deserialized.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    /// Values deserialized but are not usable.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    /// A device block was rejected by the validation core.
    #[error("Configured device is invalid: {0}")]
    Device(#[from] MaskError),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptomaskConfig {
    /// Name and logging.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Spatial light modulator, if one is attached.
    #[serde(default)]
    pub slm: Option<DeviceConfig>,
    /// Micromirror projector, if one is attached.
    #[serde(default)]
    pub dmd: Option<ProjectorConfig>,
    /// Camera slaved to the projector sync output.
    #[serde(default)]
    pub camera: CameraConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Bench name, shown by `optomask check`.
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// Micromirror projector: device geometry, sync output and default sequence
/// timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Model, monitor and orientation of the projector.
    #[serde(flatten)]
    pub device: DeviceConfig,
    /// Frame clock source.
    #[serde(default)]
    pub projection_mode: ProjectionMode,
    /// Active level of the sync pulse; must match the camera trigger edge.
    #[serde(default)]
    pub synch_polarity: SynchPolarity,
    /// Default sequence timing.
    pub timing: SequenceTiming,
}

fn default_name() -> String {
    "optomask".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl OptomaskConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific TOML file and the environment, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::extract(Figment::new().merge(Toml::file(path.as_ref())))
    }

    /// Load from an in-memory TOML document and the environment, then validate.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::new().merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but are semantically wrong.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        self.slm_state()?;
        self.dmd_state()?;

        if let Some(dmd) = &self.dmd {
            dmd.timing.validate()?;
            let edge_matches = match self.camera.trigger_source {
                TriggerSource::RisingEdge => dmd.synch_polarity == SynchPolarity::High,
                TriggerSource::FallingEdge => dmd.synch_polarity == SynchPolarity::Low,
                TriggerSource::Off | TriggerSource::Software => true,
            };
            if !edge_matches {
                return Err(ConfigError::ValidationError(format!(
                    "Camera trigger {:?} does not match projector synch_polarity {:?}",
                    self.camera.trigger_source, dmd.synch_polarity
                )));
            }
            if !self.camera.fits_picture_time(dmd.timing.picture_time_us) {
                warn!(
                    exposure_us = self.camera.exposure_us,
                    picture_time_us = dmd.timing.picture_time_us,
                    "Camera exposure is longer than one projector picture slot"
                );
            }
        }
        self.camera.validate()?;

        Ok(())
    }

    /// Device state for the configured SLM, if any.
    pub fn slm_state(&self) -> Result<Option<DeviceState>, MaskError> {
        self.slm.as_ref().map(DeviceState::from_config).transpose()
    }

    /// Device state for the configured projector, if any.
    pub fn dmd_state(&self) -> Result<Option<DeviceState>, MaskError> {
        self.dmd
            .as_ref()
            .map(|dmd| DeviceState::from_config(&dmd.device))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [application]
        name = "bench"
        log_level = "debug"

        [slm]
        model = "LCR2500"
        reference_offset = [10, -4]
        inversion = [1, -1]

        [dmd]
        model = "DMD_DLP"
        bit_depth = 1

        [dmd.timing]
        picture_time_us = 20000
        illumination_time_us = 15000

        [camera]
        exposure_us = 1500
    "#;

    #[test]
    fn test_parse_sample() {
        let config = OptomaskConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.application.name, "bench");

        let slm = config.slm_state().unwrap().unwrap();
        assert_eq!(slm.reference(), (522, 380));
        assert_eq!(slm.inversion(), (1, -1));
        assert_eq!(slm.bit_depth(), 8);

        let dmd = config.dmd.as_ref().unwrap();
        assert_eq!(dmd.device.bit_depth, 1);
        assert_eq!(dmd.projection_mode, ProjectionMode::Master);
        assert_eq!(dmd.synch_polarity, SynchPolarity::High);
        assert_eq!(dmd.timing.synch_pulse_width_us, 100);
        assert_eq!(config.camera.exposure_us, 1500);
        assert!(config.camera.max_buffer_queue);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = OptomaskConfig::from_toml_str("").unwrap();
        assert_eq!(config.application.log_level, "info");
        assert!(config.slm.is_none());
        assert!(config.dmd.is_none());
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_unknown_model_fails_validation() {
        let err = OptomaskConfig::from_toml_str("[slm]\nmodel = \"NOPE\"").unwrap_err();
        assert!(matches!(err, ConfigError::Device(MaskError::UnknownModel { .. })));
    }

    #[test]
    fn test_bad_log_level() {
        let err = OptomaskConfig::from_toml_str("[application]\nlog_level = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_timing() {
        let toml = r#"
            [dmd]
            model = "DMD_DLP"
            [dmd.timing]
            picture_time_us = 100
            illumination_time_us = 200
        "#;
        let err = OptomaskConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Device(MaskError::InvalidTiming(_))));
    }

    #[test]
    fn test_synch_polarity_must_match_trigger_edge() {
        let dmd = r#"
            [dmd]
            model = "DMD_DLP"
            synch_polarity = "low"
            [dmd.timing]
            picture_time_us = 20000
            illumination_time_us = 15000
        "#;
        let err = OptomaskConfig::from_toml_str(dmd).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("synch_polarity")));

        let falling = format!("{dmd}\n[camera]\ntrigger_source = \"falling_edge\"\n");
        let config = OptomaskConfig::from_toml_str(&falling).unwrap();
        assert_eq!(config.dmd.unwrap().synch_polarity, SynchPolarity::Low);
    }

    #[test]
    fn test_missing_model_is_load_error() {
        let err = OptomaskConfig::from_toml_str("[slm]\nmonitor_index = 1").unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
