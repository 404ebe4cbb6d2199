use rand::Rng;
use tracing::debug;

use crate::grid::{TissueState, wrapped_index};
use crate::lifecycle::draw_base_senescence;
use crate::{CellType, Morphogen, TissueConfig, TissueError};

/// Builds the seed state: a disk of STEM cells at the grid centre sharing
/// `total_energy`, plus a short AP gradient north of centre.
pub fn initialize<R: Rng + ?Sized>(
    config: &TissueConfig,
    rng: &mut R,
) -> Result<TissueState, TissueError> {
    let (width, height) = config.validate()?;
    let mut state = TissueState::empty(width, height);
    let cx = width / 2;
    let cy = height / 2;

    let radius = config.seed_radius as isize;
    let offsets: Vec<(isize, isize)> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx * dx + dy * dy <= radius * radius)
        .collect();
    let share = config.total_energy / offsets.len() as f64;

    for &(dx, dy) in &offsets {
        let idx = wrapped_index(cx, cy, dx, dy, width, height);
        state.cells[idx] = CellType::Stem;
        state.energy[idx] = share;
        state.morphogens.channel_mut(Morphogen::Activator)[idx] =
            config.seed_activator_base + rng.random::<f32>() * config.seed_activator_spread;
        state.senescence[idx] = draw_base_senescence(config, rng);
    }

    for r in 1..=config.ap_seed_length {
        let idx = wrapped_index(cx, cy, 0, -(r as isize), width, height);
        state
            .morphogens
            .add(Morphogen::AnteriorPosterior, idx, config.ap_seed_step * r as f32);
    }

    state.refresh_stats();
    debug!(
        width,
        height,
        seeds = offsets.len(),
        energy_per_cell = share,
        "seeded tissue"
    );
    Ok(state)
}
