//! Registry of supported modulator models.
//!
//! Geometry for each model is fixed at process start. Unknown models are a
//! hard stop for device construction: the caller gets `MaskError::UnknownModel`
//! listing what the registry does know.

use crate::error::{MaskError, MaskResult};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;

/// Resolution and physical size of one modulator model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceSpec {
    /// Pixel count as `(width, height)`.
    pub resolution_px: (usize, usize),
    /// Active area in millimetres as `(width, height)`.
    pub physical_size_mm: (f64, f64),
}

impl DeviceSpec {
    const fn new(resolution_px: (usize, usize), physical_size_mm: (f64, f64)) -> Self {
        Self {
            resolution_px,
            physical_size_mm,
        }
    }

    /// Pixel pitch in micrometres as `(x, y)`.
    pub fn pixel_pitch_um(&self) -> (f64, f64) {
        (
            self.physical_size_mm.0 * 1e3 / self.resolution_px.0 as f64,
            self.physical_size_mm.1 * 1e3 / self.resolution_px.1 as f64,
        )
    }

    /// Geometric center in pixels, rounded down.
    pub fn center_px(&self) -> (i64, i64) {
        (
            (self.resolution_px.0 / 2) as i64,
            (self.resolution_px.1 / 2) as i64,
        )
    }
}

// DLP micromirror pitch is 10.8 um, LC2012 pixel pitch is 36 um.
const DMD_PITCH_MM: f64 = 10.8e-3;
const LC2012_PITCH_MM: f64 = 36e-3;

static REGISTRY: Lazy<DeviceSpecRegistry> = Lazy::new(|| {
    let mut specs = BTreeMap::new();
    specs.insert("LCR2500", DeviceSpec::new((1024, 768), (19.5, 14.6)));
    specs.insert("PLUTO", DeviceSpec::new((1920, 1080), (15.36, 8.64)));
    specs.insert("PLUTO_AMP", DeviceSpec::new((1920, 1080), (15.36, 8.64)));
    specs.insert(
        "DMD_DLP",
        DeviceSpec::new((1024, 768), (1024.0 * DMD_PITCH_MM, 768.0 * DMD_PITCH_MM)),
    );
    specs.insert(
        "LC2012",
        DeviceSpec::new((1024, 768), (1024.0 * LC2012_PITCH_MM, 768.0 * LC2012_PITCH_MM)),
    );
    DeviceSpecRegistry { specs }
});

/// Read-only lookup of model name to [`DeviceSpec`].
#[derive(Debug)]
pub struct DeviceSpecRegistry {
    specs: BTreeMap<&'static str, DeviceSpec>,
}

impl DeviceSpecRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static DeviceSpecRegistry {
        &REGISTRY
    }

    /// Look up a model by exact name.
    pub fn resolve(&self, model: &str) -> MaskResult<DeviceSpec> {
        match self.specs.get(model) {
            Some(spec) => Ok(*spec),
            None => {
                tracing::warn!(
                    model,
                    "Model not present in the device database; consider contributing its specifications"
                );
                Err(MaskError::UnknownModel {
                    model: model.to_string(),
                    supported: self.supported_models().iter().map(|m| m.to_string()).collect(),
                })
            }
        }
    }

    /// Known model names, sorted.
    pub fn supported_models(&self) -> Vec<&'static str> {
        self.specs.keys().copied().collect()
    }

    /// Iterate `(model, spec)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &DeviceSpec)> + '_ {
        self.specs.iter().map(|(name, spec)| (*name, spec))
    }
}

/// Shorthand for `DeviceSpecRegistry::global().resolve(model)`.
pub fn resolve(model: &str) -> MaskResult<DeviceSpec> {
    DeviceSpecRegistry::global().resolve(model)
}
