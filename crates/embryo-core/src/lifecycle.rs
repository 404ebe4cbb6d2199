//! One tick of the tissue: field update, depth classification, energy
//! sharing, then the shuffled death/division/differentiation pass.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::{RecycleMode, TissueConfig};
use crate::depth::DepthMap;
use crate::grid::{ANTERIOR, TissueState, neighbors4};
use crate::{CellType, Morphogen, TissueError};

/// Draws a senescence budget for a cell that just became `cell_type`.
pub fn draw_senescence<R: Rng + ?Sized>(
    config: &TissueConfig,
    cell_type: CellType,
    rng: &mut R,
) -> u32 {
    debug_assert!(cell_type.is_occupied());
    draw_scaled_senescence(config, cell_type.senescence_multiplier(), rng)
}

/// Draws an unscaled budget from the base distribution, used for seed cells.
pub fn draw_base_senescence<R: Rng + ?Sized>(config: &TissueConfig, rng: &mut R) -> u32 {
    draw_scaled_senescence(config, 1.0, rng)
}

fn draw_scaled_senescence<R: Rng + ?Sized>(
    config: &TissueConfig,
    multiplier: f32,
    rng: &mut R,
) -> u32 {
    let base = f64::from(config.senescence) * f64::from(multiplier);
    let jitter = (rng.random::<f64>() - 0.5) * f64::from(config.senescence_spread);
    (base + jitter).floor().max(0.0) as u32
}

/// Advances `state` by exactly one tick and returns the new snapshot.
///
/// Fails with a [`TissueError`] before touching the state when `config` is
/// invalid, when the state's lattice does not match the configured size, or
/// when the state itself violates an invariant (see [`TissueState::validate`]).
pub fn step<R: Rng + ?Sized>(
    config: &TissueConfig,
    state: &TissueState,
    rng: &mut R,
) -> Result<TissueState, TissueError> {
    let (width, height) = config.validate()?;
    if state.width() != width || state.height() != height {
        return Err(TissueError::DimensionMismatch {
            expected: width * height,
            actual: state.width() * state.height(),
        });
    }
    state.validate()?;
    Ok(advance(config, state, rng))
}

/// Unchecked tick used by [`crate::Embryo`], whose state is validated on entry.
pub(crate) fn advance<R: Rng + ?Sized>(
    config: &TissueConfig,
    state: &TissueState,
    rng: &mut R,
) -> TissueState {
    let width = state.width();
    let height = state.height();

    let mut next = state.successor(state.morphogens().diffused(&config.morphogen));
    next.morphogens.react(state.cells(), &config.morphogen, &mut *rng);

    let depth = state.depth_map();
    share_energy(config.share_rate, state.cells(), &mut next.energy, width, height);

    let mut order = state.occupied_indices();
    order.shuffle(&mut *rng);
    let centroid = state
        .centroid()
        .unwrap_or((width as f64 / 2.0, height as f64 / 2.0));

    let mut pass = LifecyclePass {
        config,
        prev: state,
        depth: &depth,
        next: &mut next,
        rng,
        centroid,
        births: 0,
        deaths: 0,
        energy_lost: 0.0,
        deferred: Vec::new(),
    };
    for idx in order {
        pass.visit(idx);
    }
    pass.flush_deferred();

    let births = pass.births;
    let deaths = pass.deaths;
    let energy_lost = pass.energy_lost;
    next.stats.births = births;
    next.stats.deaths = deaths;
    next.stats.energy_lost = energy_lost;
    next.stats.cumulative_births += births as u64;
    next.stats.cumulative_deaths += deaths as u64;
    next.refresh_stats();
    next
}

/// Moves `share_rate` of the energy difference across every occupied
/// east and south edge, in raster order.
fn share_energy(
    share_rate: f64,
    cells: &[CellType],
    energy: &mut [f64],
    width: usize,
    height: usize,
) {
    if share_rate <= 0.0 {
        return;
    }
    for idx in 0..cells.len() {
        if cells[idx].is_empty() {
            continue;
        }
        let [east, _, south, _] = neighbors4(idx, width, height);
        for other in [east, south] {
            if cells[other].is_occupied() {
                let flow = (energy[idx] - energy[other]) * share_rate;
                energy[idx] -= flow;
                energy[other] += flow;
            }
        }
    }
}

struct LifecyclePass<'a, R: Rng + ?Sized> {
    config: &'a TissueConfig,
    prev: &'a TissueState,
    depth: &'a DepthMap,
    next: &'a mut TissueState,
    rng: &'a mut R,
    centroid: (f64, f64),
    births: usize,
    deaths: usize,
    energy_lost: f64,
    deferred: Vec<(usize, f64)>,
}

impl<R: Rng + ?Sized> LifecyclePass<'_, R> {
    fn visit(&mut self, idx: usize) {
        let prev_type = self.prev.cells[idx];
        let prev_age = self.prev.ages[idx];
        let age = prev_age.saturating_add(1);
        self.next.ages[idx] = age;

        if self.should_die(idx, prev_type, age) {
            self.kill(idx);
            return;
        }
        self.try_divide(idx, prev_type, age);
        self.deposit_feedback(idx, prev_type);
        self.differentiate(idx, prev_type, prev_age);
    }

    fn should_die(&mut self, idx: usize, prev_type: CellType, age: u32) -> bool {
        let config = self.config;
        let mut die = age > self.next.senescence[idx];
        if prev_type == CellType::Stem
            && self.next.morphogens.get(Morphogen::Inhibitor, idx)
                > config.stem_inhibitor_death_threshold
            && self.rng.random_bool(config.stem_inhibitor_death_chance)
        {
            die = true;
        }
        if !die {
            match self.prev.occupied_neighbors(idx) {
                0 => die = true,
                1 => die = self.rng.random_bool(config.dangling_death_chance),
                _ => {}
            }
        }
        die
    }

    fn kill(&mut self, idx: usize) {
        let energy = self.next.energy[idx];
        self.next.cells[idx] = CellType::Empty;
        self.next.energy[idx] = 0.0;
        self.next.ages[idx] = 0;
        self.next.senescence[idx] = 0;
        self.next
            .morphogens
            .add(Morphogen::Inhibitor, idx, self.config.death_inhibitor_bump);
        self.deaths += 1;

        match self.config.recycle_mode {
            RecycleMode::InPass => self.recycle(idx, energy),
            RecycleMode::Deferred => self.deferred.push((idx, energy)),
        }
    }

    /// Splits `energy` evenly across the occupied neighbours of `idx` in the
    /// next-state buffer.
    fn recycle(&mut self, idx: usize, energy: f64) {
        let mut recipients = [0usize; 4];
        let mut count = 0;
        for n in neighbors4(idx, self.next.width(), self.next.height()) {
            if self.next.cells[n].is_occupied() {
                recipients[count] = n;
                count += 1;
            }
        }
        if count == 0 {
            if energy > 0.0 {
                debug!(site = idx, energy, "dying cell had no neighbour to recycle into");
            }
            self.energy_lost += energy;
            return;
        }
        let share = energy / count as f64;
        for &n in &recipients[..count] {
            self.next.energy[n] += share;
        }
    }

    fn flush_deferred(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        for (idx, energy) in deferred {
            self.recycle(idx, energy);
        }
    }

    fn try_divide(&mut self, idx: usize, prev_type: CellType, age: u32) {
        let config = self.config;
        let threshold = config.division_threshold_for(prev_type == CellType::Stem);
        if self.next.energy[idx] <= threshold || age <= config.division_cooldown {
            return;
        }

        let neighbors = neighbors4(idx, self.next.width(), self.next.height());
        let anterior_signal = self.next.morphogens.get(Morphogen::AnteriorPosterior, idx);
        if anterior_signal > config.anterior_bias_threshold
            && self.rng.random_bool(config.anterior_bias_chance)
        {
            let target = neighbors[ANTERIOR];
            if self.next.cells[target].is_empty() {
                self.place_daughter(idx, target);
                return;
            }
        }

        let mut directions = [0usize, 1, 2, 3];
        directions.shuffle(&mut *self.rng);
        let open = directions
            .iter()
            .map(|&d| neighbors[d])
            .find(|&n| self.next.cells[n].is_empty());
        if let Some(target) = open {
            self.place_daughter(idx, target);
        }
    }

    fn place_daughter(&mut self, parent: usize, target: usize) {
        let half = self.next.energy[parent] * 0.5;
        self.next.energy[parent] = half;
        self.next.energy[target] = half;
        self.next.cells[target] = CellType::Stem;
        self.next.ages[parent] = 0;
        self.next.ages[target] = 0;
        self.next.senescence[target] =
            draw_senescence(self.config, CellType::Stem, &mut *self.rng);
        self.next.morphogens.add(
            Morphogen::Activator,
            target,
            self.config.daughter_activator_bump,
        );
        self.births += 1;
    }

    fn deposit_feedback(&mut self, idx: usize, prev_type: CellType) {
        let feedback = &self.config.feedback;
        let width = self.next.width();
        let x = (idx % width) as f64;
        let y = (idx / width) as f64;
        let (cx, cy) = self.centroid;

        let dx = x - cx;
        let sigma = f64::from(feedback.midline_width);
        let midline = (-(dx * dx) / (2.0 * sigma * sigma)).exp() as f32;
        let ap_span = self.next.height() as f64 * f64::from(feedback.ap_scale);
        let ap_factor = ((cy - y) / ap_span).max(0.0) as f32;

        let field = &mut self.next.morphogens;
        field.add(Morphogen::Midline, idx, midline * feedback.midline_gain);
        field.add(Morphogen::AnteriorPosterior, idx, ap_factor * feedback.ap_gain);

        match prev_type {
            CellType::Ectoderm => field.add(Morphogen::Midline, idx, feedback.ectoderm_midline),
            CellType::Neural => {
                field.add(Morphogen::Midline, idx, feedback.neural_midline);
                field.add(Morphogen::AnteriorPosterior, idx, feedback.neural_ap);
            }
            CellType::Mesoderm | CellType::Muscle => {
                field.add(Morphogen::AnteriorPosterior, idx, feedback.mesoderm_ap);
            }
            CellType::Endoderm => field.add(Morphogen::Activator, idx, feedback.endoderm_activator),
            _ => {}
        }
    }

    fn differentiate(&mut self, idx: usize, prev_type: CellType, prev_age: u32) {
        let settings = &self.config.differentiation;
        let field = &self.next.morphogens;
        let fate = match prev_type {
            CellType::Stem if prev_age > settings.min_age => CellType::primary_fate(
                self.depth.get(idx),
                field.get(Morphogen::Midline, idx),
                field.get(Morphogen::AnteriorPosterior, idx),
                settings,
            ),
            CellType::Mesoderm if prev_age > settings.mesoderm_min_age => CellType::secondary_fate(
                field.get(Morphogen::Activator, idx),
                field.get(Morphogen::Inhibitor, idx),
                settings,
            ),
            _ => return,
        };
        if fate == prev_type {
            return;
        }
        debug_assert!(prev_type.can_become(fate));
        self.next.cells[idx] = fate;
        self.next.ages[idx] = 0;
        self.next.senescence[idx] = draw_senescence(self.config, fate, &mut *self.rng);
    }
}
