//! Core types and tick engine for the embryo tissue simulation.
//!
//! A toroidal lattice of cells carries energy, age, a senescence budget and
//! four diffusible morphogen fields. Each tick diffuses the fields, measures
//! how deep every occupied cell sits inside the tissue, and then runs the
//! lifecycle pass (sharing, death, division, differentiation) into a fresh
//! buffer that replaces the previous state wholesale.
//!
//! External collaborators only need two operations: [`initialize`] and
//! [`step`]. [`Embryo`] bundles them with a seeded RNG and a bounded history
//! of [`TickSummary`] values.

mod config;
mod depth;
mod field;
mod grid;
mod lifecycle;
mod seed;
mod world;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::{
    DifferentiationSettings, FeedbackSettings, MorphogenSettings, RecycleMode, TissueConfig,
};
pub use depth::{DepthMap, UNREACHED_DEPTH};
pub use field::MorphogenField;
pub use grid::{TissueState, TissueStats};
pub use lifecycle::{draw_base_senescence, draw_senescence, step};
pub use seed::initialize;
pub use world::{Embryo, TickSummary};

/// High level simulation clock (ticks processed since the seed was placed).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Differentiation state of a lattice site. `Empty` marks an unoccupied site.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellType {
    #[default]
    Empty = 0,
    Stem = 1,
    Ectoderm = 2,
    Mesoderm = 3,
    Endoderm = 4,
    Neural = 5,
    Muscle = 6,
    Vessel = 7,
}

impl CellType {
    /// Number of variants, including `Empty`.
    pub const COUNT: usize = 8;

    /// Every variant in discriminant order.
    pub const ALL: [CellType; Self::COUNT] = [
        CellType::Empty,
        CellType::Stem,
        CellType::Ectoderm,
        CellType::Mesoderm,
        CellType::Endoderm,
        CellType::Neural,
        CellType::Muscle,
        CellType::Vessel,
    ];

    /// Slot used by per-type counters.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        matches!(self, CellType::Empty)
    }

    #[must_use]
    pub const fn is_occupied(self) -> bool {
        !self.is_empty()
    }

    /// Short display label.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CellType::Empty => "empty",
            CellType::Stem => "stem",
            CellType::Ectoderm => "ectoderm",
            CellType::Mesoderm => "mesoderm",
            CellType::Endoderm => "endoderm",
            CellType::Neural => "neural",
            CellType::Muscle => "muscle",
            CellType::Vessel => "vessel",
        }
    }

    /// Lifetime multiplier applied to the base senescence budget.
    ///
    /// Unoccupied sites have no lifetime, so `Empty` maps to zero.
    #[must_use]
    pub const fn senescence_multiplier(self) -> f32 {
        match self {
            CellType::Empty => 0.0,
            CellType::Stem => 0.6,
            CellType::Ectoderm => 1.3,
            CellType::Mesoderm => 0.9,
            CellType::Endoderm => 1.4,
            CellType::Neural => 2.5,
            CellType::Muscle => 1.6,
            CellType::Vessel => 1.8,
        }
    }

    /// Whether a cell of this type may turn into `next` through differentiation.
    #[must_use]
    pub const fn can_become(self, next: CellType) -> bool {
        matches!(
            (self, next),
            (
                CellType::Stem,
                CellType::Ectoderm | CellType::Neural | CellType::Mesoderm | CellType::Endoderm
            ) | (CellType::Mesoderm, CellType::Muscle | CellType::Vessel)
        )
    }

    /// Germ-layer fate for a STEM cell at `depth` given its midline and AP signals.
    ///
    /// Returns `Stem` for the interior niche (depth 6 and beyond).
    #[must_use]
    pub fn primary_fate(
        depth: u32,
        midline: f32,
        anterior: f32,
        settings: &DifferentiationSettings,
    ) -> CellType {
        match depth {
            0 | 1 => {
                if midline > settings.neural_midline && anterior > settings.neural_ap {
                    CellType::Neural
                } else {
                    CellType::Ectoderm
                }
            }
            2 => CellType::Mesoderm,
            3..=5 => CellType::Endoderm,
            _ => CellType::Stem,
        }
    }

    /// Secondary fate for a MESODERM cell given its activator/inhibitor levels.
    #[must_use]
    pub fn secondary_fate(
        activator: f32,
        inhibitor: f32,
        settings: &DifferentiationSettings,
    ) -> CellType {
        if activator > settings.muscle_activator && inhibitor > settings.muscle_inhibitor {
            CellType::Muscle
        } else if activator < settings.vessel_activator && inhibitor > settings.vessel_inhibitor {
            CellType::Vessel
        } else {
            CellType::Mesoderm
        }
    }
}

/// The four morphogen channels carried by every lattice site.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Morphogen {
    Activator = 0,
    Inhibitor = 1,
    Midline = 2,
    AnteriorPosterior = 3,
}

impl Morphogen {
    pub const COUNT: usize = 4;

    pub const ALL: [Morphogen; Self::COUNT] = [
        Morphogen::Activator,
        Morphogen::Inhibitor,
        Morphogen::Midline,
        Morphogen::AnteriorPosterior,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Errors raised while building or validating simulation state.
#[derive(Debug, Error, PartialEq)]
pub enum TissueError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A supplied state does not match the expected lattice size.
    #[error("dimension mismatch: expected {expected} cells, found {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A supplied state violates a per-cell invariant.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Commands accepted from an external controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControlCommand {
    /// Advance exactly one tick.
    Step,
    /// Discard the tissue and re-seed it from the configuration.
    Reset,
}

/// Apply a controller command, returning the summary when a tick ran.
pub fn apply_control_command(
    embryo: &mut Embryo,
    command: ControlCommand,
) -> Result<Option<TickSummary>, TissueError> {
    match command {
        ControlCommand::Step => Ok(Some(embryo.step())),
        ControlCommand::Reset => embryo.reset().map(|()| None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_allows_only_documented_edges() {
        let legal: Vec<(CellType, CellType)> = CellType::ALL
            .iter()
            .flat_map(|&from| CellType::ALL.iter().map(move |&to| (from, to)))
            .filter(|&(from, to)| from.can_become(to))
            .collect();
        assert_eq!(
            legal,
            vec![
                (CellType::Stem, CellType::Ectoderm),
                (CellType::Stem, CellType::Mesoderm),
                (CellType::Stem, CellType::Endoderm),
                (CellType::Stem, CellType::Neural),
                (CellType::Mesoderm, CellType::Muscle),
                (CellType::Mesoderm, CellType::Vessel),
            ]
        );
    }

    #[test]
    fn primary_fate_follows_depth_bands() {
        let settings = DifferentiationSettings::default();
        assert_eq!(CellType::primary_fate(1, 0.0, 0.0, &settings), CellType::Ectoderm);
        assert_eq!(CellType::primary_fate(1, 0.5, 0.5, &settings), CellType::Neural);
        assert_eq!(CellType::primary_fate(1, 0.5, 0.1, &settings), CellType::Ectoderm);
        assert_eq!(CellType::primary_fate(2, 0.5, 0.5, &settings), CellType::Mesoderm);
        for depth in 3..=5 {
            assert_eq!(CellType::primary_fate(depth, 0.0, 0.0, &settings), CellType::Endoderm);
        }
        assert_eq!(CellType::primary_fate(6, 0.5, 0.5, &settings), CellType::Stem);
        assert_eq!(
            CellType::primary_fate(UNREACHED_DEPTH, 0.0, 0.0, &settings),
            CellType::Stem
        );
    }

    #[test]
    fn secondary_fate_thresholds() {
        let settings = DifferentiationSettings::default();
        assert_eq!(CellType::secondary_fate(0.3, 0.15, &settings), CellType::Muscle);
        assert_eq!(CellType::secondary_fate(0.05, 0.2, &settings), CellType::Vessel);
        assert_eq!(CellType::secondary_fate(0.15, 0.15, &settings), CellType::Mesoderm);
        assert_eq!(CellType::secondary_fate(0.3, 0.05, &settings), CellType::Mesoderm);
    }

    #[test]
    fn control_commands_drive_the_engine() {
        let config = TissueConfig {
            width: 32,
            height: 32,
            total_energy: 2_000.0,
            rng_seed: Some(5),
            ..TissueConfig::default()
        };
        let mut embryo = Embryo::new(config).expect("embryo");
        let summary = apply_control_command(&mut embryo, ControlCommand::Step)
            .expect("step")
            .expect("summary");
        assert_eq!(summary.tick, Tick(1));
        assert_eq!(embryo.tick(), Tick(1));

        let reset = apply_control_command(&mut embryo, ControlCommand::Reset).expect("reset");
        assert!(reset.is_none());
        assert_eq!(embryo.tick(), Tick::zero());
        assert_eq!(embryo.state().stats().population, 29);
    }
}
