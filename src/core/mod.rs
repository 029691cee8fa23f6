//! Next Subvolume Method engine: the grid, species, reaction bookkeeping and
//! the event scheduler that ties them together.

pub mod grid;
pub mod nsm;
pub mod queue;
pub mod reaction;
pub mod reaction_list;
pub mod species;

pub use grid::StructuredGrid;
pub use nsm::{NextSubvolumeMethod, LONGEST_TIME};
pub use queue::{QueueEntry, SubvolumeQueue};
pub use reaction::{Compartment, ReactionComponent, ReactionEquation, ReactionSide};
pub use reaction_list::{ReactionList, ReactionsWithSameRateAndLHS};
pub use species::{Species, SpeciesId};
