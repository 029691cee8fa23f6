use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the reaction-diffusion core.
///
/// Construction mistakes (bad rates, queries between cells that do not touch)
/// and modelling bugs (a reaction that would drive a count negative) are both
/// reported here; none of them are recoverable mid-run.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// A point or box lies outside the grid domain.
    #[error("out of domain: {0}")]
    OutOfDomain(String),

    /// Distance or face requested between cells that do not share a face.
    #[error("subvolumes {from} and {to} are not face-adjacent")]
    NotAdjacent { from: usize, to: usize },

    /// Executing a reaction would make a copy number negative.
    #[error("negative copy number for species {species} in subvolume {subvolume}")]
    NegativeCopyNumber { species: usize, subvolume: usize },

    /// Tried to execute a reaction with neither reactants nor products.
    #[error("cannot react an empty reaction equation")]
    EmptyReaction,

    /// Numerical inconsistency, e.g. a weighted draw that selected nothing.
    #[error("unreachable state: {0}")]
    Unreachable(String),

    /// Non-finite event time or similar numerical failure.
    #[error("numerical error: {0}")]
    MathError(String),
}
