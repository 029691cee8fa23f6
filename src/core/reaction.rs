use crate::core::species::SpeciesId;
use crate::error::{Error, Result};
use std::fmt;

/// Where a reaction component lives.
///
/// A reaction template is written with placeholder indices; instantiating it
/// in a subvolume keeps the variant and replaces the index
/// (see [`Compartment::relocated`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compartment {
    /// An ordinary lattice subvolume.
    Ordinary(usize),
    /// Leaves the lattice through the face shared with this subvolume.
    InterfaceTo(usize),
    /// Leaves the lattice at a uniform point inside this subvolume.
    EmitAt(usize),
}

impl Compartment {
    /// Subvolume index carried by any variant.
    pub fn index(&self) -> usize {
        match *self {
            Compartment::Ordinary(i) | Compartment::InterfaceTo(i) | Compartment::EmitAt(i) => i,
        }
    }

    pub fn is_ordinary(&self) -> bool {
        matches!(self, Compartment::Ordinary(_))
    }

    /// Same variant at `index`.
    pub fn relocated(&self, index: usize) -> Self {
        match self {
            Compartment::Ordinary(_) => Compartment::Ordinary(index),
            Compartment::InterfaceTo(_) => Compartment::InterfaceTo(index),
            Compartment::EmitAt(_) => Compartment::EmitAt(index),
        }
    }
}

/// `multiplier` molecules of `species` in `compartment`.
///
/// - `multiplier`: stoichiometric count, at least 1.
/// - `species`: which species.
/// - `compartment`: where the molecules are taken from or placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReactionComponent {
    pub multiplier: u32,
    pub species: SpeciesId,
    pub compartment: Compartment,
}

impl ReactionComponent {
    /// Errors: `InvalidParam` when `multiplier` is 0.
    pub fn new(multiplier: u32, species: SpeciesId, compartment: Compartment) -> Result<Self> {
        if multiplier == 0 {
            return Err(Error::InvalidParam("reaction multiplier must be >= 1".into()));
        }
        Ok(Self {
            multiplier,
            species,
            compartment,
        })
    }
}

/// One side of a reaction, in authoring order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReactionSide(Vec<ReactionComponent>);

impl ReactionSide {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `multiplier` of `species` in `compartment`.
    pub fn with(mut self, multiplier: u32, species: SpeciesId, compartment: Compartment) -> Result<Self> {
        self.0.push(ReactionComponent::new(multiplier, species, compartment)?);
        Ok(self)
    }

    pub fn push(&mut self, component: ReactionComponent) {
        self.0.push(component);
    }

    pub fn components(&self) -> &[ReactionComponent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of multipliers; the molecularity for a left-hand side.
    pub fn total_multiplier(&self) -> u32 {
        self.0.iter().map(|c| c.multiplier).sum()
    }

    /// Copy sorted by species, the key used to group reactions.
    pub fn canonical(&self) -> Self {
        let mut sorted = self.0.clone();
        sorted.sort_by_key(|c| c.species);
        Self(sorted)
    }

    /// Copy with every compartment moved to `index`, keeping its kind.
    pub fn relocated(&self, index: usize) -> Self {
        Self(
            self.0
                .iter()
                .map(|c| ReactionComponent {
                    compartment: c.compartment.relocated(index),
                    ..*c
                })
                .collect(),
        )
    }
}

impl FromIterator<ReactionComponent> for ReactionSide {
    fn from_iter<I: IntoIterator<Item = ReactionComponent>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ReactionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0");
        }
        for (n, c) in self.0.iter().enumerate() {
            if n > 0 {
                write!(f, " + ")?;
            }
            if c.multiplier > 1 {
                write!(f, "{}", c.multiplier)?;
            }
            write!(f, "{}", c.species)?;
            match c.compartment {
                Compartment::Ordinary(i) => write!(f, "({i})")?,
                Compartment::InterfaceTo(i) => write!(f, "(->{i})")?,
                Compartment::EmitAt(i) => write!(f, "(~{i})")?,
            }
        }
        Ok(())
    }
}

/// A left/right pair describing one reaction instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReactionEquation {
    pub lhs: ReactionSide,
    pub rhs: ReactionSide,
}

impl ReactionEquation {
    pub fn new(lhs: ReactionSide, rhs: ReactionSide) -> Self {
        Self { lhs, rhs }
    }

    pub fn is_empty(&self) -> bool {
        self.lhs.is_empty() && self.rhs.is_empty()
    }

    /// Molecularity: total multiplier of the left-hand side.
    pub fn num_reactants(&self) -> u32 {
        self.lhs.total_multiplier()
    }

    pub fn relocated(&self, index: usize) -> Self {
        Self {
            lhs: self.lhs.relocated(index),
            rhs: self.rhs.relocated(index),
        }
    }

    /// Subvolume the reaction happens in: the first reactant's, or the first
    /// product's for zero-order reactions.
    pub fn origin(&self) -> Option<usize> {
        self.lhs
            .components()
            .first()
            .or_else(|| self.rhs.components().first())
            .map(|c| c.compartment.index())
    }

    /// Target subvolume when the reaction has a single product placed in an
    /// ordinary subvolume other than the one the reactants came from.
    pub fn plain_transfer_target(&self) -> Option<usize> {
        let origin = self.lhs.components().first()?.compartment.index();
        match self.rhs.components() {
            [r] => match r.compartment {
                Compartment::Ordinary(j) if j != origin => Some(j),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ReactionEquation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.lhs, self.rhs)
    }
}
