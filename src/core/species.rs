use crate::error::{Error, Result};
use crate::geometry::Vect3;
use std::fmt;

/// Stable handle into the engine's species table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpeciesId(pub usize);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// A chemical species: one copy number per subvolume plus the molecules that
/// have been promoted off-lattice.
///
/// `particles` and `reference_particles` always have the same length; the
/// reference entry records where the molecule came from (the centre of its
/// origin cell, or the emission point itself).
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    id: SpeciesId,
    name: String,
    diffusion_constant: f64,
    interface_dt: Option<f64>,
    pub copy_numbers: Vec<u32>,
    pub particles: Vec<Vect3>,
    pub reference_particles: Vec<Vect3>,
}

impl Species {
    /// A species with diffusion constant `d` and no molecules yet.
    ///
    /// The id and copy-number storage are assigned when the species is added
    /// to an engine.
    pub fn new(name: impl Into<String>, d: f64) -> Result<Self> {
        if !d.is_finite() || d < 0.0 {
            return Err(Error::InvalidParam(
                "diffusion constant must be finite and >= 0".into(),
            ));
        }
        Ok(Self {
            id: SpeciesId(0),
            name: name.into(),
            diffusion_constant: d,
            interface_dt: None,
            copy_numbers: Vec::new(),
            particles: Vec::new(),
            reference_particles: Vec::new(),
        })
    }

    pub(crate) fn attach(&mut self, id: SpeciesId, num_subvolumes: usize) {
        self.id = id;
        self.copy_numbers.resize(num_subvolumes, 0);
    }

    pub fn id(&self) -> SpeciesId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn diffusion_constant(&self) -> f64 {
        self.diffusion_constant
    }

    pub(crate) fn set_interface_dt(&mut self, dt: f64) {
        self.interface_dt = Some(dt);
    }

    /// Typical Brownian step over the interface time step, `sqrt(2 D dt)`.
    pub fn step_length(&self) -> Option<f64> {
        self.interface_dt
            .map(|dt| (2.0 * self.diffusion_constant * dt).sqrt())
    }

    /// Total molecules on the lattice.
    pub fn total_copy_number(&self) -> u64 {
        self.copy_numbers.iter().map(|&n| u64::from(n)).sum()
    }

    /// Replace every copy number; the length must match the grid.
    pub fn set_copy_numbers(&mut self, values: &[u32]) -> Result<()> {
        if values.len() != self.copy_numbers.len() {
            return Err(Error::InvalidParam(format!(
                "expected {} copy numbers, got {}",
                self.copy_numbers.len(),
                values.len()
            )));
        }
        self.copy_numbers.copy_from_slice(values);
        Ok(())
    }

    pub(crate) fn remove(&mut self, subvolume: usize, n: u32) -> Result<()> {
        let slot = &mut self.copy_numbers[subvolume];
        *slot = slot.checked_sub(n).ok_or(Error::NegativeCopyNumber {
            species: self.id.0,
            subvolume,
        })?;
        Ok(())
    }

    pub(crate) fn emit(&mut self, position: Vect3, reference: Vect3) {
        self.particles.push(position);
        self.reference_particles.push(reference);
    }

    /// Drop all off-lattice particles, e.g. after the caller has taken them over.
    pub fn clear_particles(&mut self) {
        self.particles.clear();
        self.reference_particles.clear();
    }
}
