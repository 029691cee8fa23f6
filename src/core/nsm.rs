use crate::config::NsmConfig;
use crate::core::grid::StructuredGrid;
use crate::core::queue::{QueueEntry, SubvolumeQueue};
use crate::core::reaction::{Compartment, ReactionEquation, ReactionSide};
use crate::core::reaction_list::ReactionList;
use crate::core::species::{Species, SpeciesId};
use crate::error::{Error, Result};
use crate::geometry::{add, scale, Geometry, Vect3};
use crate::random::{StdUniform, UniformSampler};
use std::f64::consts::PI;
use std::fmt;
use tracing::{debug, instrument, trace, warn};

/// "Never": a subvolume that cannot fire is scheduled this far past the
/// current time, so it stays behind every finite horizon.
pub const LONGEST_TIME: f64 = f64::INFINITY;

/// Next Subvolume Method scheduler.
///
/// Owns the grid, the species table, one [`ReactionList`] per subvolume and a
/// queue holding exactly one next-event time per subvolume. Each call to
/// [`integrate`](Self::integrate) repeatedly fires the earliest subvolume,
/// applies one reaction there and reschedules the subvolumes it touched.
#[derive(Debug)]
pub struct NextSubvolumeMethod {
    grid: StructuredGrid,
    species: Vec<Species>,
    diffusing_species: Vec<SpeciesId>,
    subvolume_reactions: Vec<ReactionList>,
    queue: SubvolumeQueue,
    time: f64,
    rng: StdUniform,
}

impl NextSubvolumeMethod {
    /// Create an engine over `grid` with no species or reactions.
    ///
    /// `seed` fixes the random stream; `None` seeds from OS entropy.
    pub fn new(grid: StructuredGrid, seed: Option<u64>) -> Result<Self> {
        let n = grid.size();
        Ok(Self {
            queue: SubvolumeQueue::new(n, LONGEST_TIME, 0.0)?,
            subvolume_reactions: vec![ReactionList::new(); n],
            grid,
            species: Vec::new(),
            diffusing_species: Vec::new(),
            time: 0.0,
            rng: StdUniform::new(seed),
        })
    }

    /// Build grid, species, initial counts and diffusion from a configuration.
    pub fn from_config(config: &NsmConfig) -> Result<Self> {
        config.validate()?;
        let grid = StructuredGrid::with_cell_size(config.low, config.high, config.cell_size)?;
        let mut nsm = Self::new(grid, config.seed)?;
        for sc in &config.species {
            let id = nsm.add_species(Species::new(sc.name.clone(), sc.diffusion)?);
            if sc.initial_count > 0 {
                nsm.fill_uniform(id, &config.low, &config.high, sc.initial_count)?;
            }
            if sc.diffusing {
                nsm.add_diffusion(id)?;
            }
        }
        debug!(
            subvolumes = nsm.grid.size(),
            species = nsm.species.len(),
            "engine built from config"
        );
        Ok(nsm)
    }

    pub fn grid(&self) -> &StructuredGrid {
        &self.grid
    }

    pub fn get_time(&self) -> f64 {
        self.time
    }

    /// Earliest scheduled event time over all subvolumes.
    pub fn get_next_event_time(&self) -> f64 {
        self.queue
            .top()
            .map_or(self.time + LONGEST_TIME, QueueEntry::time_f64)
    }

    /// Scheduled event time of one subvolume.
    pub fn get_event_time(&self, subvolume: usize) -> Result<f64> {
        self.queue
            .get(subvolume)
            .map(QueueEntry::time_f64)
            .ok_or_else(|| Error::InvalidParam(format!("subvolume {subvolume} out of range")))
    }

    pub fn get_species(&self, id: SpeciesId) -> Result<&Species> {
        self.species
            .get(id.0)
            .ok_or_else(|| Error::InvalidParam(format!("unknown species {id}")))
    }

    /// Mutable access for setting initial conditions. Call
    /// [`reset_all_priorities`](Self::reset_all_priorities) afterwards so the
    /// schedule reflects the new counts.
    pub fn get_species_mut(&mut self, id: SpeciesId) -> Result<&mut Species> {
        self.species
            .get_mut(id.0)
            .ok_or_else(|| Error::InvalidParam(format!("unknown species {id}")))
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn get_diffusing_species(&self) -> &[SpeciesId] {
        &self.diffusing_species
    }

    pub fn get_reactions(&self, subvolume: usize) -> Result<&ReactionList> {
        self.subvolume_reactions
            .get(subvolume)
            .ok_or_else(|| Error::InvalidParam(format!("subvolume {subvolume} out of range")))
    }

    /// Take ownership of `species`, sizing its copy numbers to the grid.
    pub fn add_species(&mut self, mut species: Species) -> SpeciesId {
        let id = SpeciesId(self.species.len());
        species.attach(id, self.grid.size());
        self.species.push(species);
        id
    }

    fn check_subvolume(&self, i: usize) -> Result<()> {
        if i >= self.grid.size() {
            return Err(Error::InvalidParam(format!(
                "subvolume {i} out of range (grid has {})",
                self.grid.size()
            )));
        }
        Ok(())
    }

    fn check_equation(&self, eq: &ReactionEquation) -> Result<()> {
        for c in eq.lhs.components().iter().chain(eq.rhs.components()) {
            self.get_species(c.species)?;
            self.check_subvolume(c.compartment.index())?;
        }
        Ok(())
    }

    // ============ Scheduling ============

    /// Recompute propensities of `i` and draw a fresh next-event time.
    pub fn reset_priority(&mut self, i: usize) -> Result<()> {
        self.schedule(i)
    }

    /// Reschedule `i` after a neighbour changed its counts.
    ///
    /// This redraws a fresh exponential time exactly like
    /// [`reset_priority`](Self::reset_priority); the unused part of the
    /// previous draw is not carried over.
    pub fn recalc_priority(&mut self, i: usize) -> Result<()> {
        self.schedule(i)
    }

    pub fn reset_all_priorities(&mut self) -> Result<()> {
        for i in 0..self.grid.size() {
            self.schedule(i)?;
        }
        Ok(())
    }

    fn schedule(&mut self, i: usize) -> Result<()> {
        self.check_subvolume(i)?;
        let inverse_total = self.subvolume_reactions[i].recalculate_propensities(&self.species);
        let time = if inverse_total > 0.0 {
            self.time - inverse_total * self.rng.open().ln()
        } else {
            self.time + LONGEST_TIME
        };
        self.queue.update(QueueEntry::new(time, i, self.time)?)
    }

    fn reschedule_all(&mut self, indices: &[usize]) -> Result<()> {
        for &i in indices {
            self.schedule(i)?;
        }
        Ok(())
    }

    // ============ Construction ============

    /// Instantiate the template `eq` in every subvolume.
    ///
    /// The rate is scaled by `volume^(1 - n)` for a reaction with `n`
    /// reactant molecules: zero-order production grows with the cell volume,
    /// first-order reactions are unchanged, higher orders shrink.
    pub fn add_reaction(&mut self, rate: f64, eq: &ReactionEquation) -> Result<()> {
        let indices: Vec<usize> = (0..self.grid.size()).collect();
        self.add_reaction_in(rate, eq, &indices)
    }

    /// As [`add_reaction`](Self::add_reaction), restricted to cells whose
    /// centre lies inside `geometry`.
    pub fn add_reaction_on_region(
        &mut self,
        rate: f64,
        eq: &ReactionEquation,
        geometry: &dyn Geometry,
    ) -> Result<()> {
        let mut indices = Vec::new();
        self.grid.get_region(geometry, &mut indices);
        self.add_reaction_in(rate, eq, &indices)
    }

    /// As [`add_reaction`](Self::add_reaction), restricted to cells cut by
    /// the boundary of `geometry`.
    pub fn add_reaction_on_slice(
        &mut self,
        rate: f64,
        eq: &ReactionEquation,
        geometry: &dyn Geometry,
    ) -> Result<()> {
        let mut indices = Vec::new();
        self.grid.get_slice(geometry, &mut indices);
        self.add_reaction_in(rate, eq, &indices)
    }

    fn add_reaction_in(&mut self, rate: f64, eq: &ReactionEquation, indices: &[usize]) -> Result<()> {
        if eq.is_empty() {
            return Err(Error::EmptyReaction);
        }
        if let Some(c) = eq
            .lhs
            .components()
            .iter()
            .chain(eq.rhs.components())
            .find(|c| matches!(c.compartment, Compartment::InterfaceTo(_)))
        {
            return Err(Error::InvalidParam(format!(
                "reaction template {eq} places {} on an interface; use set_interface_reactions",
                c.species
            )));
        }
        let exponent = 1 - eq.num_reactants() as i32;
        let scaled = rate * self.grid.cell_volume().powi(exponent);
        for &i in indices {
            let instance = eq.relocated(i);
            self.check_equation(&instance)?;
            self.subvolume_reactions[i].add_reaction(scaled, &instance)?;
        }
        debug!(reaction = %eq, rate = scaled, subvolumes = indices.len(), "reaction added");
        self.reschedule_all(indices)
    }

    /// Diffusion between every pair of neighbouring cells at `D / h^2`.
    pub fn add_diffusion(&mut self, species: SpeciesId) -> Result<()> {
        let indices: Vec<usize> = (0..self.grid.size()).collect();
        self.add_diffusion_in(species, None, &indices)
    }

    /// Diffusion between every pair of neighbouring cells at a fixed `rate`.
    pub fn add_diffusion_with_rate(&mut self, species: SpeciesId, rate: f64) -> Result<()> {
        let indices: Vec<usize> = (0..self.grid.size()).collect();
        self.add_diffusion_in(species, Some(rate), &indices)
    }

    /// Diffusion among the cells whose centre lies inside `geometry`; moves
    /// that would leave the region are not generated.
    pub fn add_diffusion_on_region(&mut self, species: SpeciesId, geometry: &dyn Geometry) -> Result<()> {
        let mut indices = Vec::new();
        self.grid.get_region(geometry, &mut indices);
        self.add_diffusion_in(species, None, &indices)
    }

    fn add_diffusion_in(&mut self, species: SpeciesId, rate: Option<f64>, indices: &[usize]) -> Result<()> {
        let d = self.get_species(species)?.diffusion_constant();
        let mut selected = vec![false; self.grid.size()];
        for &i in indices {
            self.check_subvolume(i)?;
            selected[i] = true;
        }
        let mut added = 0usize;
        for &i in indices {
            for j in self.grid.get_neighbour_indicies(i) {
                if !selected[j] {
                    continue;
                }
                let rate = match rate {
                    Some(r) => r,
                    None => {
                        let h = self.grid.get_distance_between(i, j)?;
                        d / (h * h)
                    }
                };
                let eq = transfer_equation(species, i, Compartment::Ordinary(j))?;
                self.subvolume_reactions[i].add_reaction(rate, &eq)?;
                added += 1;
            }
        }
        if !self.diffusing_species.contains(&species) {
            self.diffusing_species.push(species);
        }
        debug!(%species, reactions = added, "diffusion added");
        self.reschedule_all(indices)
    }

    /// One-way transfers `from[k] -> to[k]` at `rate`.
    pub fn add_diffusion_between(
        &mut self,
        species: SpeciesId,
        rate: f64,
        from: &[usize],
        to: &[usize],
    ) -> Result<()> {
        check_pairs(from, to)?;
        self.get_species(species)?;
        for (&i, &j) in from.iter().zip(to) {
            self.check_subvolume(i)?;
            self.check_subvolume(j)?;
            let eq = transfer_equation(species, i, Compartment::Ordinary(j))?;
            self.subvolume_reactions[i].add_reaction(rate, &eq)?;
        }
        if !self.diffusing_species.contains(&species) {
            self.diffusing_species.push(species);
        }
        self.reschedule_all(from)
    }

    /// Replace diffusion `from[k] -> to[k]` by an absorbing interface
    /// reaction that moves the molecule off-lattice across the shared face.
    ///
    /// The new rate is `plain_rate * h / sqrt(pi * D * dt)`, doubled when
    /// `corrected`. `dt` is remembered on the species and fixes the step
    /// length used to place the emerging particle.
    pub fn set_interface_reactions(
        &mut self,
        from: &[usize],
        to: &[usize],
        species: SpeciesId,
        dt: f64,
        corrected: bool,
    ) -> Result<()> {
        check_pairs(from, to)?;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::InvalidParam("interface dt must be finite and > 0".into()));
        }
        let d = self.get_species(species)?.diffusion_constant();
        if d <= 0.0 {
            return Err(Error::InvalidParam(format!(
                "species {species} must diffuse (D > 0) to cross an interface"
            )));
        }

        // Validate every pair before touching any reaction list.
        let mut planned = Vec::with_capacity(from.len());
        for (&i, &j) in from.iter().zip(to) {
            let h = self.grid.get_distance_between(i, j)?;
            let plain = transfer_equation(species, i, Compartment::Ordinary(j))?;
            let Some(plain_rate) = self.subvolume_reactions[i].get_rate(&plain) else {
                warn!(from = i, to = j, %species, "no diffusion to replace with an interface");
                continue;
            };
            let mut rate = plain_rate * h / (PI * d * dt).sqrt();
            if corrected {
                rate *= 2.0;
            }
            if !rate.is_finite() {
                return Err(Error::MathError(format!(
                    "interface rate from {i} to {j} is not finite"
                )));
            }
            let interface = transfer_equation(species, i, Compartment::InterfaceTo(j))?;
            planned.push((i, plain, rate, interface));
        }

        let mut touched = Vec::with_capacity(planned.len());
        for (i, plain, rate, interface) in planned {
            self.subvolume_reactions[i].delete_reaction(&plain);
            self.subvolume_reactions[i].add_reaction(rate, &interface)?;
            touched.push(i);
        }
        self.species[species.0].set_interface_dt(dt);
        debug!(%species, pairs = touched.len(), dt, corrected, "interface reactions set");
        self.reschedule_all(&touched)
    }

    /// Undo [`set_interface_reactions`](Self::set_interface_reactions),
    /// restoring diffusion at `D * laplace_coefficient(from, to)`.
    pub fn unset_interface_reactions(&mut self, from: &[usize], to: &[usize], species: SpeciesId) -> Result<()> {
        check_pairs(from, to)?;
        let d = self.get_species(species)?.diffusion_constant();
        let mut planned = Vec::with_capacity(from.len());
        for (&i, &j) in from.iter().zip(to) {
            let coefficient = self.grid.get_laplace_coefficient(i, j)?;
            let interface = transfer_equation(species, i, Compartment::InterfaceTo(j))?;
            if self.subvolume_reactions[i].get_rate(&interface).is_none() {
                warn!(from = i, to = j, %species, "no interface reaction to remove");
                continue;
            }
            let plain = transfer_equation(species, i, Compartment::Ordinary(j))?;
            planned.push((i, interface, d * coefficient, plain));
        }

        let mut touched = Vec::with_capacity(planned.len());
        for (i, interface, rate, plain) in planned {
            self.subvolume_reactions[i].delete_reaction(&interface);
            self.subvolume_reactions[i].add_reaction(rate, &plain)?;
            touched.push(i);
        }
        debug!(%species, pairs = touched.len(), "interface reactions unset");
        self.reschedule_all(&touched)
    }

    // ============ Initial conditions ============

    /// Scatter `n` molecules over the box `[low, high]`, each landing in a
    /// cell with probability proportional to its overlap with the box.
    pub fn fill_uniform(&mut self, species: SpeciesId, low: &Vect3, high: &Vect3, n: u32) -> Result<()> {
        self.get_species(species)?;
        let mut indices = Vec::new();
        let mut fractions = Vec::new();
        self.grid.get_overlap(low, high, &mut indices, &mut fractions)?;
        let total: f64 = fractions.iter().sum();
        if indices.is_empty() || total <= 0.0 {
            return Err(Error::InvalidParam("fill box has no volume inside the grid".into()));
        }
        for _ in 0..n {
            let target = self.rng.closed_open() * total;
            let mut cumulative = 0.0;
            let mut chosen = indices[indices.len() - 1];
            for (&i, &f) in indices.iter().zip(&fractions) {
                cumulative += f;
                if cumulative > target {
                    chosen = i;
                    break;
                }
            }
            self.species[species.0].copy_numbers[chosen] += 1;
        }
        self.reschedule_all(&indices)
    }

    /// Molecules per unit volume inside `[low, high]`, resampled from the
    /// cell counts by overlap fraction.
    pub fn get_concentration(&self, species: SpeciesId, low: &Vect3, high: &Vect3) -> Result<f64> {
        let s = self.get_species(species)?;
        let mut indices = Vec::new();
        let mut fractions = Vec::new();
        self.grid.get_overlap(low, high, &mut indices, &mut fractions)?;
        let volume: f64 = (0..3).map(|k| high[k] - low[k]).product();
        if volume <= 0.0 {
            return Err(Error::InvalidParam("concentration box must have volume".into()));
        }
        let count: f64 = indices
            .iter()
            .zip(&fractions)
            .map(|(&i, &f)| f64::from(s.copy_numbers[i]) * f)
            .sum();
        Ok(count / volume)
    }

    // ============ Execution ============

    /// Advance the system by `dt`, firing every event scheduled before
    /// `time + dt`. Time ends at exactly `time + dt`.
    #[instrument(skip(self), fields(start = self.time))]
    pub fn integrate(&mut self, dt: f64) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(Error::InvalidParam("dt must be finite and >= 0".into()));
        }
        let final_time = self.time + dt;
        let mut events = 0u64;
        while let Some(next) = self.queue.top().copied() {
            if next.time_f64() >= final_time {
                break;
            }
            let i = next.subvolume;
            self.time = next.time_f64();
            if self.subvolume_reactions[i].total_propensity() <= 0.0 {
                self.reset_priority(i)?;
                continue;
            }
            let rand = self.rng.closed_open();
            let eq = self.subvolume_reactions[i].pick_random_reaction(rand)?;
            trace!(subvolume = i, time = self.time, reaction = %eq, "event");
            let origin = self.execute(&eq)?;
            if origin != i {
                self.reset_priority(i)?;
            }
            events += 1;
        }
        self.time = final_time;
        debug!(events, time = self.time, "integrate finished");
        Ok(())
    }

    /// Apply one reaction: consume reactants, place products, reschedule.
    pub fn react(&mut self, eq: &ReactionEquation) -> Result<()> {
        self.execute(eq).map(|_| ())
    }

    fn execute(&mut self, eq: &ReactionEquation) -> Result<usize> {
        let origin = eq.origin().ok_or(Error::EmptyReaction)?;
        self.check_equation(eq)?;
        for c in eq.rhs.components() {
            if let Compartment::InterfaceTo(j) = c.compartment {
                self.grid.get_distance_between(origin, j)?;
                if self.species[c.species.0].step_length().is_none() {
                    return Err(Error::InvalidParam(format!(
                        "species {} has no interface time step",
                        c.species
                    )));
                }
            }
        }

        let lhs = eq.lhs.components();
        for (n, c) in lhs.iter().enumerate() {
            let index = c.compartment.index();
            if let Err(e) = self.species[c.species.0].remove(index, c.multiplier) {
                for undo in &lhs[..n] {
                    self.species[undo.species.0].copy_numbers[undo.compartment.index()] += undo.multiplier;
                }
                return Err(e);
            }
        }

        for c in eq.rhs.components() {
            let s = c.species.0;
            match c.compartment {
                Compartment::Ordinary(j) => {
                    self.species[s].copy_numbers[j] += c.multiplier;
                }
                Compartment::EmitAt(k) => {
                    for _ in 0..c.multiplier {
                        let p = self.grid.get_random_point(k, &mut self.rng);
                        self.species[s].emit(p, p);
                    }
                }
                Compartment::InterfaceTo(j) => {
                    let face = self.grid.get_face_between(origin, j)?;
                    let reference = self.grid.get_cell_centre(origin);
                    let step = self.species[s].step_length().unwrap_or(0.0);
                    for _ in 0..c.multiplier {
                        let (point, normal) = face.get_random_point_and_normal_triangle(&mut self.rng);
                        let offset = step * interface_offset(self.rng.closed_open());
                        self.species[s].emit(add(&point, &scale(&normal, offset)), reference);
                    }
                }
            }
        }

        self.reset_priority(origin)?;
        if let Some(j) = eq.plain_transfer_target() {
            self.recalc_priority(j)?;
        }
        Ok(origin)
    }
}

/// Distance past the face, in units of the step length, at which a molecule
/// crossing an absorbing interface is placed, for a uniform draw `p`.
#[inline]
fn interface_offset(p: f64) -> f64 {
    (0.729614 * p - 0.70252 * p * p) / (1.0 - 1.47494 * p + 0.484371 * p * p)
}

fn transfer_equation(species: SpeciesId, from: usize, to: Compartment) -> Result<ReactionEquation> {
    Ok(ReactionEquation::new(
        ReactionSide::new().with(1, species, Compartment::Ordinary(from))?,
        ReactionSide::new().with(1, species, to)?,
    ))
}

fn check_pairs(from: &[usize], to: &[usize]) -> Result<()> {
    if from.len() != to.len() {
        return Err(Error::InvalidParam(format!(
            "from and to must have equal length ({} vs {})",
            from.len(),
            to.len()
        )));
    }
    Ok(())
}

impl fmt::Display for NextSubvolumeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Next Subvolume Method at time {}", self.time)?;
        writeln!(f, "\tdomain: low = {:?} high = {:?}", self.grid.get_low(), self.grid.get_high())?;
        writeln!(
            f,
            "\tcells: {:?} of size {:?}",
            self.grid.get_num_cells(),
            self.grid.get_cell_size()
        )?;
        for s in &self.species {
            writeln!(
                f,
                "\tspecies {} ({}): D = {} lattice = {} off-lattice = {}",
                s.name(),
                s.id(),
                s.diffusion_constant(),
                s.total_copy_number(),
                s.particles.len()
            )?;
        }
        Ok(())
    }
}
