use crate::core::reaction::{ReactionEquation, ReactionSide};
use crate::core::species::Species;
use crate::error::{Error, Result};

/// Reactions that share a rate and a canonical left-hand side.
///
/// When the group fires, one of its right-hand sides is chosen uniformly;
/// diffusion out of a cell is the typical case, one alternative per
/// neighbour.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionsWithSameRateAndLHS {
    rate: f64,
    lhs: ReactionSide,
    all_rhs: Vec<ReactionSide>,
}

impl ReactionsWithSameRateAndLHS {
    fn new(rate: f64, lhs: ReactionSide, rhs: ReactionSide) -> Self {
        Self {
            rate,
            lhs,
            all_rhs: vec![rhs],
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn lhs(&self) -> &ReactionSide {
        &self.lhs
    }

    pub fn all_rhs(&self) -> &[ReactionSide] {
        &self.all_rhs
    }

    pub fn get_num_of_alternatives(&self) -> usize {
        self.all_rhs.len()
    }

    /// `rate * alternatives * prod_k C(n_k, m_k)`, zero as soon as any
    /// reactant count is below its multiplier.
    fn propensity(&self, species: &[Species]) -> f64 {
        let mut propensity = self.rate * self.all_rhs.len() as f64;
        for c in self.lhs.components() {
            let available = species[c.species.0].copy_numbers[c.compartment.index()];
            if available < c.multiplier {
                return 0.0;
            }
            propensity *= combinations(available, c.multiplier);
        }
        propensity
    }
}

/// Number of ways to pick `k` of `n` indistinguishable molecules:
/// the falling factorial `n (n-1) ... (n-k+1)` divided by `k!`.
#[inline]
fn combinations(n: u32, k: u32) -> f64 {
    match k {
        0 => 1.0,
        1 => f64::from(n),
        2 => 0.5 * f64::from(n) * f64::from(n.saturating_sub(1)),
        _ if n < k => 0.0,
        _ => {
            let mut acc = 1.0;
            for i in 0..k {
                acc *= f64::from(n - i) / f64::from(i + 1);
            }
            acc
        }
    }
}

/// All reactions whose left-hand side lives in one subvolume, with their
/// current propensities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionList {
    reactions: Vec<ReactionsWithSameRateAndLHS>,
    propensities: Vec<f64>,
    total_propensity: f64,
    inverse_total_propensity: f64,
}

impl ReactionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    pub fn groups(&self) -> &[ReactionsWithSameRateAndLHS] {
        &self.reactions
    }

    pub fn propensities(&self) -> &[f64] {
        &self.propensities
    }

    pub fn total_propensity(&self) -> f64 {
        self.total_propensity
    }

    pub fn inverse_total_propensity(&self) -> f64 {
        self.inverse_total_propensity
    }

    /// Rate of the reaction `eq` if present.
    pub fn get_rate(&self, eq: &ReactionEquation) -> Option<f64> {
        self.find(eq).map(|(g, _)| self.reactions[g].rate)
    }

    /// Add `eq` with `rate`, merging it into an existing group with the same
    /// rate and canonical left-hand side.
    pub fn add_reaction(&mut self, rate: f64, eq: &ReactionEquation) -> Result<()> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::InvalidParam(format!(
                "reaction rate must be finite and >= 0, got {rate}"
            )));
        }
        let lhs = eq.lhs.canonical();
        match self
            .reactions
            .iter_mut()
            .find(|g| g.rate == rate && g.lhs == lhs)
        {
            Some(group) => group.all_rhs.push(eq.rhs.clone()),
            None => {
                self.reactions
                    .push(ReactionsWithSameRateAndLHS::new(rate, lhs, eq.rhs.clone()));
                self.propensities.push(0.0);
            }
        }
        Ok(())
    }

    fn find(&self, eq: &ReactionEquation) -> Option<(usize, usize)> {
        let lhs = eq.lhs.canonical();
        self.reactions.iter().enumerate().find_map(|(g, group)| {
            if group.lhs != lhs {
                return None;
            }
            group
                .all_rhs
                .iter()
                .position(|rhs| *rhs == eq.rhs)
                .map(|r| (g, r))
        })
    }

    /// Remove `eq` and return its rate, or 0 when it is not in the list.
    ///
    /// A group left without alternatives is dropped.
    pub fn delete_reaction(&mut self, eq: &ReactionEquation) -> f64 {
        let Some((g, r)) = self.find(eq) else {
            return 0.0;
        };
        let rate = self.reactions[g].rate;
        self.reactions[g].all_rhs.remove(r);
        if self.reactions[g].all_rhs.is_empty() {
            self.reactions.remove(g);
            self.propensities.remove(g);
        }
        rate
    }

    /// Recompute every group's propensity from current copy numbers and
    /// return the inverse total propensity (0 when nothing can fire).
    pub fn recalculate_propensities(&mut self, species: &[Species]) -> f64 {
        self.total_propensity = 0.0;
        for (group, slot) in self.reactions.iter().zip(self.propensities.iter_mut()) {
            let p = group.propensity(species);
            assert!(
                p >= 0.0,
                "negative propensity {p} for {} at rate {}",
                group.lhs,
                group.rate
            );
            *slot = p;
            self.total_propensity += p;
        }
        self.inverse_total_propensity = if self.total_propensity > 0.0 {
            1.0 / self.total_propensity
        } else {
            0.0
        };
        self.inverse_total_propensity
    }

    /// Weighted choice of a reaction for `rand` in [0, 1).
    ///
    /// Groups are scanned in order until the running sum of propensities
    /// exceeds `rand * total`; the part of `rand` left over inside the
    /// chosen group then picks one of its alternatives uniformly.
    pub fn pick_random_reaction(&self, rand: f64) -> Result<ReactionEquation> {
        let target = rand * self.total_propensity;
        let mut cumulative = 0.0;
        for (group, &p) in self.reactions.iter().zip(self.propensities.iter()) {
            let before = cumulative;
            cumulative += p;
            if cumulative > target {
                let n = group.all_rhs.len();
                let residual = (target - before) / p;
                let alt = ((residual * n as f64) as usize).min(n - 1);
                return Ok(ReactionEquation::new(
                    group.lhs.clone(),
                    group.all_rhs[alt].clone(),
                ));
            }
        }
        Err(Error::Unreachable(format!(
            "no reaction selected for rand = {rand}, total propensity = {}",
            self.total_propensity
        )))
    }
}
