use std::collections::VecDeque;

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::grid::TissueState;
use crate::{CellType, Tick, TissueConfig, TissueError, lifecycle, seed};

/// Aggregate statistics emitted after each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub population: usize,
    pub births: usize,
    pub deaths: usize,
    pub total_energy: f64,
    /// Energy destroyed this tick by deaths with no occupied neighbour.
    pub energy_lost: f64,
    pub type_counts: [usize; CellType::COUNT],
}

impl TickSummary {
    fn from_state(state: &TissueState) -> Self {
        let stats = state.stats();
        Self {
            tick: state.tick(),
            population: stats.population,
            births: stats.births,
            deaths: stats.deaths,
            total_energy: stats.total_energy,
            energy_lost: stats.energy_lost,
            type_counts: stats.type_counts,
        }
    }

    /// Number of occupied sites of `cell_type` at the end of the tick.
    #[must_use]
    pub fn count(&self, cell_type: CellType) -> usize {
        if cell_type.is_empty() {
            0
        } else {
            self.type_counts[cell_type.index()]
        }
    }
}

/// A running simulation: configuration, RNG stream, current snapshot and
/// a bounded ring of recent tick summaries.
#[derive(Debug)]
pub struct Embryo {
    config: TissueConfig,
    rng: SmallRng,
    state: TissueState,
    history: VecDeque<TickSummary>,
}

impl Embryo {
    /// Validates `config` and places the seed disk.
    pub fn new(config: TissueConfig) -> Result<Self, TissueError> {
        let mut rng = config.seeded_rng();
        let state = seed::initialize(&config, &mut rng)?;
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            rng,
            state,
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Resumes from a caller-supplied snapshot, e.g. one built with
    /// [`TissueState::place_cell`].
    pub fn with_state(config: TissueConfig, state: TissueState) -> Result<Self, TissueError> {
        let (width, height) = config.validate()?;
        if state.width() != width || state.height() != height {
            return Err(TissueError::DimensionMismatch {
                expected: width * height,
                actual: state.width() * state.height(),
            });
        }
        state.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            rng,
            state,
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Runs one tick and records its summary.
    pub fn step(&mut self) -> TickSummary {
        let next = lifecycle::advance(&self.config, &self.state, &mut self.rng);
        self.state = next;

        let summary = TickSummary::from_state(&self.state);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        debug!(
            tick = summary.tick.0,
            population = summary.population,
            births = summary.births,
            deaths = summary.deaths,
            total_energy = summary.total_energy,
            "tick complete"
        );
        summary
    }

    /// Discards the tissue, restarts the RNG stream and re-seeds tick zero.
    pub fn reset(&mut self) -> Result<(), TissueError> {
        let mut rng = self.config.seeded_rng();
        let state = seed::initialize(&self.config, &mut rng)?;
        info!(from_tick = self.state.tick().0, "resetting tissue");
        self.rng = rng;
        self.state = state;
        self.history.clear();
        Ok(())
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.state.tick()
    }

    #[must_use]
    pub fn state(&self) -> &TissueState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &TissueConfig {
        &self.config
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> TissueConfig {
        TissueConfig {
            width: 48,
            height: 48,
            total_energy: 5_000.0,
            rng_seed: Some(seed),
            history_capacity: 4,
            ..TissueConfig::default()
        }
    }

    #[test]
    fn history_is_bounded_and_ordered() {
        let mut embryo = Embryo::new(small_config(3)).expect("embryo");
        for _ in 0..10 {
            embryo.step();
        }
        let ticks: Vec<u64> = embryo.history().map(|s| s.tick.0).collect();
        assert_eq!(ticks, vec![7, 8, 9, 10]);
        assert_eq!(embryo.tick(), Tick(10));
    }

    #[test]
    fn summaries_mirror_state_stats() {
        let mut embryo = Embryo::new(small_config(8)).expect("embryo");
        let summary = embryo.step();
        let stats = embryo.state().stats();
        assert_eq!(summary.population, stats.population);
        assert_eq!(summary.births, stats.births);
        assert_eq!(summary.deaths, stats.deaths);
        assert_eq!(summary.type_counts, stats.type_counts);
        assert_eq!(
            summary.type_counts.iter().sum::<usize>(),
            summary.population
        );
        assert_eq!(summary.count(CellType::Empty), 0);
    }

    #[test]
    fn reset_replays_the_same_trajectory() {
        let mut embryo = Embryo::new(small_config(17)).expect("embryo");
        let first: Vec<TickSummary> = (0..25).map(|_| embryo.step()).collect();
        embryo.reset().expect("reset");
        assert_eq!(embryo.tick(), Tick::zero());
        assert_eq!(embryo.history().count(), 0);
        let second: Vec<TickSummary> = (0..25).map(|_| embryo.step()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn with_state_checks_dimensions_and_contents() {
        let config = small_config(1);
        let wrong = TissueState::empty(10, 10);
        assert!(matches!(
            Embryo::with_state(config.clone(), wrong),
            Err(TissueError::DimensionMismatch { .. })
        ));

        let mut state = TissueState::empty(48, 48);
        state.place_cell(10, 10, CellType::Stem, -1.0, 0, 100);
        assert!(matches!(
            Embryo::with_state(config.clone(), state),
            Err(TissueError::InvalidState(_))
        ));

        let mut state = TissueState::empty(48, 48);
        state.place_cell(10, 10, CellType::Stem, 40.0, 0, 100);
        state.place_cell(11, 10, CellType::Stem, 40.0, 0, 100);
        state.refresh_stats();
        let mut embryo = Embryo::with_state(config, state).expect("embryo");
        assert_eq!(embryo.state().stats().population, 2);
        embryo.step();
        assert_eq!(embryo.tick(), Tick(1));
    }
}
