use nsmsim::core::{Compartment, NextSubvolumeMethod, ReactionEquation, ReactionSide, Species, StructuredGrid};
use nsmsim::error::Result;
use nsmsim::geometry::AxisAlignedPlane;

fn cube(cell: f64, seed: u64) -> Result<NextSubvolumeMethod> {
    let grid = StructuredGrid::with_cell_size([0.0; 3], [2.0; 3], cell)?;
    NextSubvolumeMethod::new(grid, Some(seed))
}

/// Zero-order production at rate k in a cell of volume V has propensity
/// exactly k * V, whatever the counts are.
#[test]
fn zero_order_propensity_is_rate_times_volume() -> Result<()> {
    let mut nsm = cube(0.5, 3)?;
    let a = nsm.add_species(Species::new("A", 0.0)?);
    let volume = nsm.grid().cell_volume();
    let k = 2.5;
    let production = ReactionEquation::new(
        ReactionSide::new(),
        ReactionSide::new().with(1, a, Compartment::Ordinary(0))?,
    );
    nsm.add_reaction(k, &production)?;
    let p0 = nsm.get_reactions(0)?.total_propensity();
    assert!((p0 - k * volume).abs() < 1e-12);

    nsm.get_species_mut(a)?.copy_numbers[0] = 40;
    nsm.reset_priority(0)?;
    assert!((nsm.get_reactions(0)?.total_propensity() - k * volume).abs() < 1e-12);
    Ok(())
}

/// Birth-death: production k*V, degradation g per molecule. The mean count
/// per cell settles near k*V/g.
#[test]
fn birth_death_reaches_steady_state() -> Result<()> {
    let mut nsm = cube(1.0, 99)?;
    let a = nsm.add_species(Species::new("A", 0.0)?);
    let (k, g) = (10.0, 1.0);
    let here = Compartment::Ordinary(0);
    nsm.add_reaction(
        k,
        &ReactionEquation::new(ReactionSide::new(), ReactionSide::new().with(1, a, here)?),
    )?;
    nsm.add_reaction(
        g,
        &ReactionEquation::new(ReactionSide::new().with(1, a, here)?, ReactionSide::new()),
    )?;
    nsm.integrate(10.0)?;

    let mut samples = 0.0;
    let mut total = 0.0;
    for _ in 0..50 {
        nsm.integrate(1.0)?;
        let s = nsm.get_species(a)?;
        total += s.total_copy_number() as f64 / s.copy_numbers.len() as f64;
        samples += 1.0;
    }
    let mean = total / samples;
    assert!((mean - 10.0).abs() < 1.5, "mean {mean} far from 10");
    Ok(())
}

/// Same seed, same construction, same calls: identical trajectories.
#[test]
fn fixed_seed_reproduces_trajectory() -> Result<()> {
    let run = || -> Result<Vec<u32>> {
        let mut nsm = cube(0.5, 12345)?;
        let a = nsm.add_species(Species::new("A", 0.3)?);
        nsm.fill_uniform(a, &[0.0; 3], &[1.0; 3], 500)?;
        nsm.add_diffusion(a)?;
        nsm.integrate(2.0)?;
        Ok(nsm.get_species(a)?.copy_numbers.clone())
    };
    assert_eq!(run()?, run()?);
    Ok(())
}

/// Reactions sharing rate and reactants land in one group with one
/// alternative per product side.
#[test]
fn same_rate_and_reactants_share_a_group() -> Result<()> {
    let mut nsm = cube(2.0, 5)?;
    let a = nsm.add_species(Species::new("A", 0.0)?);
    let b = nsm.add_species(Species::new("B", 0.0)?);
    let here = Compartment::Ordinary(0);
    let to_b = ReactionEquation::new(ReactionSide::new().with(1, a, here)?, ReactionSide::new().with(1, b, here)?);
    let to_nothing = ReactionEquation::new(ReactionSide::new().with(1, a, here)?, ReactionSide::new());
    nsm.add_reaction(1.0, &to_b)?;
    nsm.add_reaction(1.0, &to_nothing)?;
    let list = nsm.get_reactions(0)?;
    assert_eq!(list.size(), 1);
    assert_eq!(list.groups()[0].get_num_of_alternatives(), 2);
    assert_eq!(list.get_rate(&to_b), Some(1.0));
    Ok(())
}

/// A dimerisation in one slice of the domain only consumes molecules there.
#[test]
fn slice_reaction_is_local() -> Result<()> {
    let mut nsm = cube(1.0, 8)?;
    let a = nsm.add_species(Species::new("A", 0.0)?);
    let n = nsm.grid().size();
    nsm.get_species_mut(a)?.set_copy_numbers(&vec![20; n])?;
    let here = Compartment::Ordinary(0);
    let dimer = ReactionEquation::new(ReactionSide::new().with(2, a, here)?, ReactionSide::new());
    let plane = AxisAlignedPlane::new(0, 0.5, 1)?;
    nsm.add_reaction_on_slice(5.0, &dimer, &plane)?;

    nsm.integrate(5.0)?;
    let grid = nsm.grid();
    let s = nsm.get_species(a)?;
    for (i, &c) in s.copy_numbers.iter().enumerate() {
        if grid.get_cell_coord(i)[0] == 0 {
            assert!(c < 20 && c % 2 == 0, "slice cell {i} kept {c}");
        } else {
            assert_eq!(c, 20);
        }
    }
    Ok(())
}
