use nsmsim::core::{Compartment, NextSubvolumeMethod, ReactionEquation, ReactionSide, Species, SpeciesId, StructuredGrid};
use nsmsim::error::Result;
use std::f64::consts::PI;

fn two_cells() -> Result<(NextSubvolumeMethod, SpeciesId)> {
    let grid = StructuredGrid::new([0.0; 3], [2.0, 1.0, 1.0], [1.0; 3])?;
    let mut nsm = NextSubvolumeMethod::new(grid, Some(31))?;
    let a = nsm.add_species(Species::new("A", 0.5)?);
    nsm.add_diffusion(a)?;
    Ok((nsm, a))
}

fn transfer(a: SpeciesId, from: usize, to: Compartment) -> Result<ReactionEquation> {
    Ok(ReactionEquation::new(
        ReactionSide::new().with(1, a, Compartment::Ordinary(from))?,
        ReactionSide::new().with(1, a, to)?,
    ))
}

/// Corrected interface rate is plain * 2h / sqrt(pi D dt); unsetting restores
/// D times the Laplace coefficient.
#[test]
fn interface_rates_set_and_restored() -> Result<()> {
    let (mut nsm, a) = two_cells()?;
    let (d, dt) = (0.5, 0.01);
    let plain = transfer(a, 0, Compartment::Ordinary(1))?;
    let interface = transfer(a, 0, Compartment::InterfaceTo(1))?;
    let plain_rate = nsm.get_reactions(0)?.get_rate(&plain).unwrap_or(0.0);
    let h = nsm.grid().get_distance_between(0, 1)?;
    assert!((plain_rate - d / (h * h)).abs() < 1e-12);

    nsm.set_interface_reactions(&[0], &[1], a, dt, true)?;
    let list = nsm.get_reactions(0)?;
    assert_eq!(list.get_rate(&plain), None);
    let expected = plain_rate * 2.0 * h / (PI * d * dt).sqrt();
    let got = list.get_rate(&interface).unwrap_or(0.0);
    assert!((got - expected).abs() < 1e-12, "got {got}, expected {expected}");
    // The reverse direction is untouched.
    assert!(nsm.get_reactions(1)?.get_rate(&transfer(a, 1, Compartment::Ordinary(0))?).is_some());

    nsm.unset_interface_reactions(&[0], &[1], a)?;
    let list = nsm.get_reactions(0)?;
    assert_eq!(list.get_rate(&interface), None);
    let restored = list.get_rate(&plain).unwrap_or(0.0);
    assert!((restored - d * nsm.grid().get_laplace_coefficient(0, 1)?).abs() < 1e-12);
    Ok(())
}

/// Setting then unsetting an interface deletes the diffusion reaction and
/// adds it back, leaving both reaction lists as they were.
#[test]
fn interface_round_trip_restores_reaction_lists() -> Result<()> {
    let (mut nsm, a) = two_cells()?;
    let before = [nsm.get_reactions(0)?.clone(), nsm.get_reactions(1)?.clone()];
    nsm.set_interface_reactions(&[0, 1], &[1, 0], a, 0.01, true)?;
    assert_ne!(nsm.get_reactions(0)?, &before[0]);
    nsm.unset_interface_reactions(&[0, 1], &[1, 0], a)?;
    assert_eq!(nsm.get_reactions(0)?, &before[0]);
    assert_eq!(nsm.get_reactions(1)?, &before[1]);
    Ok(())
}

/// Uncorrected interface rate has no factor of two.
#[test]
fn uncorrected_interface_rate() -> Result<()> {
    let (mut nsm, a) = two_cells()?;
    nsm.set_interface_reactions(&[0], &[1], a, 0.04, false)?;
    let rate = nsm
        .get_reactions(0)?
        .get_rate(&transfer(a, 0, Compartment::InterfaceTo(1))?)
        .unwrap_or(0.0);
    let expected = 0.5 * 1.0 / (PI * 0.5 * 0.04).sqrt();
    assert!((rate - expected).abs() < 1e-12);
    Ok(())
}

/// Molecules leaving through an absorbing interface end up off-lattice on
/// the far side of the shared face; lattice + particles stays constant.
#[test]
fn absorbing_interface_emits_particles() -> Result<()> {
    let (mut nsm, a) = two_cells()?;
    nsm.get_species_mut(a)?.set_copy_numbers(&[200, 0])?;
    nsm.set_interface_reactions(&[0, 1], &[1, 0], a, 0.01, true)?;
    nsm.reset_all_priorities()?;

    nsm.integrate(50.0)?;
    let s = nsm.get_species(a)?;
    assert_eq!(s.total_copy_number() + s.particles.len() as u64, 200);
    assert!(!s.particles.is_empty());
    assert_eq!(s.particles.len(), s.reference_particles.len());
    for (p, r) in s.particles.iter().zip(&s.reference_particles) {
        // Came from cell 0 => placed at x >= 1; from cell 1 => x <= 1.
        if r[0] < 1.0 {
            assert!(p[0] >= 1.0);
        } else {
            assert!(p[0] <= 1.0);
        }
    }
    Ok(())
}

#[test]
fn interface_between_non_adjacent_cells_fails() -> Result<()> {
    let grid = StructuredGrid::new([0.0; 3], [3.0, 1.0, 1.0], [1.0; 3])?;
    let mut nsm = NextSubvolumeMethod::new(grid, Some(2))?;
    let a = nsm.add_species(Species::new("A", 1.0)?);
    nsm.add_diffusion(a)?;
    assert!(nsm.set_interface_reactions(&[0], &[2], a, 0.1, false).is_err());
    assert!(nsm.set_interface_reactions(&[0], &[1, 2], a, 0.1, false).is_err());
    Ok(())
}
