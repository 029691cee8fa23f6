use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::core::{Compartment, NextSubvolumeMethod, ReactionEquation, ReactionSide, Species, SpeciesId, StructuredGrid};
use crate::geometry::{Vect3, DIM};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn to_vect3(v: &[f64], name: &str) -> PyResult<Vect3> {
    if v.len() != DIM {
        return Err(py_err(format!("{name} must have length {DIM}")));
    }
    Ok([v[0], v[1], v[2]])
}

fn side_from(terms: &[(usize, u32)]) -> PyResult<ReactionSide> {
    terms.iter().try_fold(ReactionSide::new(), |side, &(species, multiplier)| {
        side.with(multiplier, SpeciesId(species), Compartment::Ordinary(0))
            .map_err(py_err)
    })
}

/// Python-facing wrapper around the Next Subvolume Method engine.
///
/// - __new__(low, high, cell_size, seed=None)
/// - add_species(name, diffusion) -> int
/// - add_diffusion(species, rate=None)
/// - add_reaction(rate, lhs, rhs) with sides as [(species, multiplier), ...]
/// - integrate(dt)
/// - get_copy_numbers(species) -> np.ndarray, shape (N,)
/// - get_particles(species) -> np.ndarray, shape (M, 3)
#[pyclass]
pub struct NsmSim {
    nsm: NextSubvolumeMethod,
}

#[pymethods]
impl NsmSim {
    /// Partition the box [low, high] into cells of about `cell_size`.
    ///
    /// Errors: raises ValueError on invalid bounds or cell size.
    #[new]
    #[pyo3(signature = (low, high, cell_size, seed=None))]
    fn new(low: Vec<f64>, high: Vec<f64>, cell_size: f64, seed: Option<u64>) -> PyResult<Self> {
        let grid = StructuredGrid::with_cell_size(
            to_vect3(&low, "low")?,
            to_vect3(&high, "high")?,
            cell_size,
        )
        .map_err(py_err)?;
        let nsm = NextSubvolumeMethod::new(grid, seed).map_err(py_err)?;
        Ok(Self { nsm })
    }

    fn add_species(&mut self, name: String, diffusion: f64) -> PyResult<usize> {
        let species = Species::new(name, diffusion).map_err(py_err)?;
        Ok(self.nsm.add_species(species).0)
    }

    /// Lattice diffusion between all neighbours, at D/h^2 unless `rate` is given.
    #[pyo3(signature = (species, rate=None))]
    fn add_diffusion(&mut self, species: usize, rate: Option<f64>) -> PyResult<()> {
        match rate {
            Some(r) => self.nsm.add_diffusion_with_rate(SpeciesId(species), r),
            None => self.nsm.add_diffusion(SpeciesId(species)),
        }
        .map_err(py_err)
    }

    /// Add a mass-action reaction to every cell.
    fn add_reaction(&mut self, rate: f64, lhs: Vec<(usize, u32)>, rhs: Vec<(usize, u32)>) -> PyResult<()> {
        let eq = ReactionEquation::new(side_from(&lhs)?, side_from(&rhs)?);
        self.nsm.add_reaction(rate, &eq).map_err(py_err)
    }

    /// Scatter `n` molecules uniformly over the box [low, high].
    fn fill_uniform(&mut self, species: usize, low: Vec<f64>, high: Vec<f64>, n: u32) -> PyResult<()> {
        self.nsm
            .fill_uniform(
                SpeciesId(species),
                &to_vect3(&low, "low")?,
                &to_vect3(&high, "high")?,
                n,
            )
            .map_err(py_err)
    }

    /// Advance by `dt` (releases the GIL during computation).
    fn integrate(&mut self, py: Python<'_>, dt: f64) -> PyResult<()> {
        py.detach(|| self.nsm.integrate(dt)).map_err(py_err)
    }

    fn get_time(&self) -> f64 {
        self.nsm.get_time()
    }

    fn get_next_event_time(&self) -> f64 {
        self.nsm.get_next_event_time()
    }

    /// Copy numbers per cell as a NumPy array of shape (N,), dtype=uint32.
    fn get_copy_numbers<'py>(&self, py: Python<'py>, species: usize) -> PyResult<Bound<'py, PyArray1<u32>>> {
        let s = self.nsm.get_species(SpeciesId(species)).map_err(py_err)?;
        Ok(s.copy_numbers.clone().into_pyarray(py))
    }

    /// Replace copy numbers from a NumPy array of shape (N,), dtype=uint32.
    fn set_copy_numbers(&mut self, species: usize, values: PyReadonlyArray1<'_, u32>) -> PyResult<()> {
        let slice = values.as_slice().map_err(py_err)?;
        self.nsm
            .get_species_mut(SpeciesId(species))
            .and_then(|s| s.set_copy_numbers(slice))
            .map_err(py_err)?;
        self.nsm.reset_all_priorities().map_err(py_err)
    }

    /// Off-lattice particle positions as a NumPy array of shape (M, 3).
    fn get_particles<'py>(&self, py: Python<'py>, species: usize) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let s = self.nsm.get_species(SpeciesId(species)).map_err(py_err)?;
        let mut arr = Array2::<f64>::zeros((s.particles.len(), DIM));
        for (i, p) in s.particles.iter().enumerate() {
            for k in 0..DIM {
                arr[[i, k]] = p[k];
            }
        }
        Ok(arr.into_pyarray(py))
    }

    fn __str__(&self) -> String {
        self.nsm.to_string()
    }
}

/// The nsmsim Python module entry point.
#[pymodule]
fn nsmsim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<NsmSim>()?;
    Ok(())
}
