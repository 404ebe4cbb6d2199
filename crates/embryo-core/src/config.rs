use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::{Morphogen, TissueError};

/// How a dying cell's energy is handed to its neighbours.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecycleMode {
    /// Recycle immediately into the in-progress next-state buffer, so the
    /// recipients depend on which cells were already processed this tick.
    #[default]
    InPass,
    /// Queue the energy and distribute it after the pass against the
    /// finished occupancy.
    Deferred,
}

/// Diffusion and reaction parameters for the four morphogen channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MorphogenSettings {
    /// Laplacian rate per channel, indexed by [`Morphogen::index`].
    pub diffusion_rates: [f32; Morphogen::COUNT],
    /// Multiplicative decay applied after each diffusion step.
    pub decay: f32,
    /// Upper clamp for every channel.
    pub max: f32,
    /// Values below this snap to zero.
    pub epsilon: f32,
    /// Step size of the activator/inhibitor kinetics.
    pub reaction_rate: f32,
    /// Basal activator production.
    pub reaction_basal: f32,
    /// Width of the symmetric uniform noise added to the activator.
    pub reaction_noise: f32,
}

impl Default for MorphogenSettings {
    fn default() -> Self {
        let base = 0.13;
        Self {
            diffusion_rates: [base, base * 2.5, base * 1.8, base * 1.6],
            decay: 0.96,
            max: 8.0,
            epsilon: 0.0003,
            reaction_rate: 0.02,
            reaction_basal: 0.04,
            reaction_noise: 0.02,
        }
    }
}

/// Positional signal deposition performed by every surviving cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedbackSettings {
    /// Standard deviation (columns) of the midline Gaussian around the centroid.
    pub midline_width: f32,
    pub midline_gain: f32,
    /// Fraction of the grid height that normalises distance above the centroid.
    pub ap_scale: f32,
    pub ap_gain: f32,
    pub ectoderm_midline: f32,
    pub neural_midline: f32,
    pub neural_ap: f32,
    pub mesoderm_ap: f32,
    pub endoderm_activator: f32,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            midline_width: 14.0,
            midline_gain: 0.01,
            ap_scale: 0.1,
            ap_gain: 0.01,
            ectoderm_midline: 0.002,
            neural_midline: 0.012,
            neural_ap: 0.008,
            mesoderm_ap: 0.004,
            endoderm_activator: 0.006,
        }
    }
}

/// Age gates and field thresholds for fate decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DifferentiationSettings {
    /// STEM cells differentiate once their age exceeds this.
    pub min_age: u32,
    pub neural_midline: f32,
    pub neural_ap: f32,
    /// MESODERM cells specialise once their age exceeds this.
    pub mesoderm_min_age: u32,
    pub muscle_activator: f32,
    pub muscle_inhibitor: f32,
    pub vessel_activator: f32,
    pub vessel_inhibitor: f32,
}

impl Default for DifferentiationSettings {
    fn default() -> Self {
        Self {
            min_age: 12,
            neural_midline: 0.18,
            neural_ap: 0.18,
            mesoderm_min_age: 40,
            muscle_activator: 0.25,
            muscle_inhibitor: 0.12,
            vessel_activator: 0.08,
            vessel_inhibitor: 0.18,
        }
    }
}

/// Static configuration for a tissue simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TissueConfig {
    /// Lattice width in cells.
    pub width: u32,
    /// Lattice height in cells.
    pub height: u32,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Energy injected by the initializer and split across the seed disk.
    pub total_energy: f64,
    /// Seed disk radius; sites with `dx² + dy² <= r²` are seeded.
    pub seed_radius: u32,
    pub seed_activator_base: f32,
    pub seed_activator_spread: f32,
    /// Number of sites north of centre that receive the AP seed gradient.
    pub ap_seed_length: u32,
    pub ap_seed_step: f32,
    /// Energy a STEM cell must exceed before dividing.
    pub division_threshold: f64,
    /// Threshold multiplier for differentiated cells.
    pub differentiated_division_multiplier: f64,
    /// Age a cell must exceed before dividing again.
    pub division_cooldown: u32,
    /// Base lifetime in ticks.
    pub senescence: u32,
    /// Width of the uniform jitter around the scaled lifetime.
    pub senescence_spread: u32,
    /// Fraction of the energy difference exchanged with east/south neighbours.
    pub share_rate: f64,
    pub stem_inhibitor_death_threshold: f32,
    pub stem_inhibitor_death_chance: f64,
    /// Death probability for a cell with exactly one occupied neighbour.
    pub dangling_death_chance: f64,
    /// Inhibitor deposited where a cell died.
    pub death_inhibitor_bump: f32,
    /// AP level above which division prefers the anterior (north) site.
    pub anterior_bias_threshold: f32,
    pub anterior_bias_chance: f64,
    pub daughter_activator_bump: f32,
    pub morphogen: MorphogenSettings,
    pub feedback: FeedbackSettings,
    pub differentiation: DifferentiationSettings,
    pub recycle_mode: RecycleMode,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for TissueConfig {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            rng_seed: None,
            total_energy: 250_000.0,
            seed_radius: 3,
            seed_activator_base: 0.3,
            seed_activator_spread: 0.3,
            ap_seed_length: 6,
            ap_seed_step: 0.08,
            division_threshold: 30.0,
            differentiated_division_multiplier: 1.4,
            division_cooldown: 14,
            senescence: 500,
            senescence_spread: 150,
            share_rate: 0.05,
            stem_inhibitor_death_threshold: 1.8,
            stem_inhibitor_death_chance: 0.01,
            dangling_death_chance: 0.08,
            death_inhibitor_bump: 0.06,
            anterior_bias_threshold: 0.06,
            anterior_bias_chance: 0.3,
            daughter_activator_bump: 0.1,
            morphogen: MorphogenSettings::default(),
            feedback: FeedbackSettings::default(),
            differentiation: DifferentiationSettings::default(),
            recycle_mode: RecycleMode::default(),
            history_capacity: 256,
        }
    }
}

fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn is_non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

impl TissueConfig {
    /// Number of lattice sites.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates the configuration, returning the lattice dimensions.
    pub fn validate(&self) -> Result<(usize, usize), TissueError> {
        if self.width == 0 || self.height == 0 {
            return Err(TissueError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        if self.width < 3 || self.height < 3 {
            return Err(TissueError::InvalidConfig(
                "grid must be at least 3x3 so neighbours are distinct",
            ));
        }
        let diameter = self
            .seed_radius
            .checked_mul(2)
            .and_then(|d| d.checked_add(1))
            .ok_or(TissueError::InvalidConfig("seed_radius is too large"))?;
        if diameter > self.width || diameter > self.height {
            return Err(TissueError::InvalidConfig(
                "seed disk does not fit inside the grid",
            ));
        }
        if !self.total_energy.is_finite() || self.total_energy < 0.0 {
            return Err(TissueError::InvalidConfig(
                "total_energy must be finite and non-negative",
            ));
        }
        if !self.division_threshold.is_finite()
            || self.division_threshold < 0.0
            || !self.differentiated_division_multiplier.is_finite()
            || self.differentiated_division_multiplier < 0.0
        {
            return Err(TissueError::InvalidConfig(
                "division threshold and multiplier must be finite and non-negative",
            ));
        }
        if !(0.0..=0.5).contains(&self.share_rate) {
            return Err(TissueError::InvalidConfig("share_rate must be in [0, 0.5]"));
        }
        if !is_probability(self.stem_inhibitor_death_chance)
            || !is_probability(self.dangling_death_chance)
            || !is_probability(self.anterior_bias_chance)
        {
            return Err(TissueError::InvalidConfig(
                "death and bias chances must be probabilities in [0, 1]",
            ));
        }
        if !is_non_negative(self.seed_activator_base)
            || !is_non_negative(self.seed_activator_spread)
            || !is_non_negative(self.ap_seed_step)
            || !is_non_negative(self.death_inhibitor_bump)
            || !is_non_negative(self.daughter_activator_bump)
            || !is_non_negative(self.anterior_bias_threshold)
            || !is_non_negative(self.stem_inhibitor_death_threshold)
        {
            return Err(TissueError::InvalidConfig(
                "seed, bump and threshold values must be finite and non-negative",
            ));
        }

        let morphogen = &self.morphogen;
        if morphogen
            .diffusion_rates
            .iter()
            .any(|&rate| !is_non_negative(rate) || rate > 1.0)
        {
            return Err(TissueError::InvalidConfig(
                "diffusion rates must be in [0, 1]",
            ));
        }
        if !(morphogen.decay > 0.0 && morphogen.decay <= 1.0) {
            return Err(TissueError::InvalidConfig("morphogen decay must be in (0, 1]"));
        }
        if !(morphogen.max.is_finite() && morphogen.max > 0.0) {
            return Err(TissueError::InvalidConfig("morphogen max must be positive"));
        }
        if !is_non_negative(morphogen.epsilon)
            || !is_non_negative(morphogen.reaction_rate)
            || !is_non_negative(morphogen.reaction_basal)
            || !is_non_negative(morphogen.reaction_noise)
        {
            return Err(TissueError::InvalidConfig(
                "reaction parameters must be finite and non-negative",
            ));
        }

        let feedback = &self.feedback;
        if !(feedback.midline_width.is_finite() && feedback.midline_width > 0.0)
            || !(feedback.ap_scale.is_finite() && feedback.ap_scale > 0.0)
        {
            return Err(TissueError::InvalidConfig(
                "midline_width and ap_scale must be positive",
            ));
        }
        if [
            feedback.midline_gain,
            feedback.ap_gain,
            feedback.ectoderm_midline,
            feedback.neural_midline,
            feedback.neural_ap,
            feedback.mesoderm_ap,
            feedback.endoderm_activator,
        ]
        .iter()
        .any(|&gain| !is_non_negative(gain))
        {
            return Err(TissueError::InvalidConfig(
                "feedback gains must be finite and non-negative",
            ));
        }

        if self.history_capacity == 0 {
            return Err(TissueError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok((self.width as usize, self.height as usize))
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Energy a cell of the given pre-tick type must exceed to divide.
    #[must_use]
    pub(crate) fn division_threshold_for(&self, is_stem: bool) -> f64 {
        if is_stem {
            self.division_threshold
        } else {
            self.division_threshold * self.differentiated_division_multiplier
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = TissueConfig::default();
        assert_eq!(config.validate(), Ok((200, 200)));
        assert_eq!(config.cell_count(), 40_000);
        let rates = config.morphogen.diffusion_rates;
        assert!((rates[Morphogen::Inhibitor.index()] - 0.325).abs() < 1e-6);
        assert!((rates[Morphogen::AnteriorPosterior.index()] - 0.208).abs() < 1e-6);
    }

    #[test]
    fn rejects_degenerate_grids() {
        let config = TissueConfig {
            width: 0,
            ..TissueConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(TissueError::InvalidConfig("grid dimensions must be non-zero"))
        );

        let config = TissueConfig {
            width: 5,
            height: 5,
            ..TissueConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(TissueError::InvalidConfig("seed disk does not fit inside the grid"))
        );

        let config = TissueConfig {
            seed_radius: u32::MAX - 1,
            ..TissueConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(TissueError::InvalidConfig("seed_radius is too large"))
        );
        let config: TissueConfig =
            serde_json::from_str(r#"{"seed_radius": 4294967295}"#).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_nan_and_out_of_range_values() {
        let config = TissueConfig {
            total_energy: f64::NAN,
            ..TissueConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TissueConfig {
            dangling_death_chance: 1.5,
            ..TissueConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = TissueConfig::default();
        config.morphogen.decay = 0.0;
        assert!(config.validate().is_err());

        let mut config = TissueConfig::default();
        config.morphogen.diffusion_rates[2] = -0.1;
        assert!(config.validate().is_err());

        let config = TissueConfig {
            history_capacity: 0,
            ..TissueConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json_with_partial_input() {
        let config: TissueConfig =
            serde_json::from_str(r#"{"width": 64, "height": 48, "recycle_mode": "deferred"}"#)
                .expect("partial config");
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 48);
        assert_eq!(config.recycle_mode, RecycleMode::Deferred);
        assert_eq!(config.senescence, 500);
        assert_eq!(config.morphogen, MorphogenSettings::default());
    }

    #[test]
    fn differentiated_cells_need_more_energy() {
        let config = TissueConfig::default();
        assert!((config.division_threshold_for(true) - 30.0).abs() < 1e-9);
        assert!((config.division_threshold_for(false) - 42.0).abs() < 1e-9);
    }
}
