//! Serializable description of a simulation: domain, resolution, seed and
//! species.

use crate::error::{Error, Result};
use crate::geometry::{Vect3, DIM};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// One species in an [`NsmConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    /// Diffusion constant D.
    pub diffusion: f64,
    /// Molecules scattered uniformly over the domain at start.
    #[serde(default)]
    pub initial_count: u32,
    /// Generate lattice diffusion reactions for this species.
    #[serde(default = "default_true")]
    pub diffusing: bool,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NsmConfig {
    pub low: Vect3,
    pub high: Vect3,
    /// Target cell edge length; rounded so cells tile the domain.
    pub cell_size: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub species: Vec<SpeciesConfig>,
}

impl NsmConfig {
    pub fn validate(&self) -> Result<()> {
        for k in 0..DIM {
            if !self.low[k].is_finite() || !self.high[k].is_finite() || self.low[k] >= self.high[k] {
                return Err(Error::InvalidParam(format!(
                    "domain bounds must be finite with low < high on axis {k}"
                )));
            }
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(Error::InvalidParam("cell_size must be finite and > 0".into()));
        }
        for s in &self.species {
            if !s.diffusion.is_finite() || s.diffusion < 0.0 {
                return Err(Error::InvalidParam(format!(
                    "species {}: diffusion must be finite and >= 0",
                    s.name
                )));
            }
        }
        Ok(())
    }
}
