//! Spatial stochastic reaction-diffusion with the Next Subvolume Method.
//!
//! The domain is cut into a regular grid of subvolumes holding integer
//! molecule counts. Reactions and diffusion hops are exact discrete events;
//! each subvolume keeps one exponentially distributed next-event time and a
//! priority queue fires the earliest. Molecules can also leave the lattice,
//! either at a random point in their cell or across an interface face, and
//! are then handed to an off-lattice particle simulator.

pub mod config;
pub mod core;
pub mod error;
pub mod geometry;
pub mod random;

#[cfg(feature = "python")]
mod python;

pub use crate::core::NextSubvolumeMethod;
