use serde::{Deserialize, Serialize};

use crate::depth::DepthMap;
use crate::field::MorphogenField;
use crate::{CellType, Morphogen, Tick, TissueError};

/// Neighbour offsets in east, west, south, north order. North is `y - 1`.
pub(crate) const DIRECTIONS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Slot of the anterior (north) neighbour in [`DIRECTIONS`].
pub(crate) const ANTERIOR: usize = 3;

/// Flat index of `(x + dx, y + dy)` with wrap-around on both axes.
#[inline]
pub(crate) fn wrapped_index(
    x: usize,
    y: usize,
    dx: isize,
    dy: isize,
    width: usize,
    height: usize,
) -> usize {
    let nx = (x as isize + dx).rem_euclid(width as isize) as usize;
    let ny = (y as isize + dy).rem_euclid(height as isize) as usize;
    ny * width + nx
}

/// The four toroidal neighbours of `idx` in [`DIRECTIONS`] order.
#[inline]
pub(crate) fn neighbors4(idx: usize, width: usize, height: usize) -> [usize; 4] {
    let x = idx % width;
    let y = idx / width;
    DIRECTIONS.map(|(dx, dy)| wrapped_index(x, y, dx, dy, width, height))
}

/// Aggregate counters recomputed after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueStats {
    /// Occupied sites.
    pub population: usize,
    /// Occupied sites per [`CellType::index`]; the `Empty` slot stays zero.
    pub type_counts: [usize; CellType::COUNT],
    /// Energy summed over the whole lattice.
    pub total_energy: f64,
    /// Divisions during the tick that produced this state.
    pub births: usize,
    /// Deaths during the tick that produced this state.
    pub deaths: usize,
    /// Energy destroyed because a dying cell had no occupied neighbour.
    pub energy_lost: f64,
    pub cumulative_births: u64,
    pub cumulative_deaths: u64,
}

impl Default for TissueStats {
    fn default() -> Self {
        Self {
            population: 0,
            type_counts: [0; CellType::COUNT],
            total_energy: 0.0,
            births: 0,
            deaths: 0,
            energy_lost: 0.0,
            cumulative_births: 0,
            cumulative_deaths: 0,
        }
    }
}

impl TissueStats {
    /// Number of occupied sites of `cell_type`.
    #[must_use]
    pub fn count(&self, cell_type: CellType) -> usize {
        if cell_type.is_empty() {
            0
        } else {
            self.type_counts[cell_type.index()]
        }
    }
}

/// Authoritative per-site data over a `width x height` toroidal lattice.
///
/// Every column is indexed by `y * width + x`. A value of this type is one
/// immutable tick snapshot; [`crate::step`] produces the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct TissueState {
    width: usize,
    height: usize,
    tick: Tick,
    pub(crate) cells: Vec<CellType>,
    pub(crate) energy: Vec<f64>,
    pub(crate) ages: Vec<u32>,
    pub(crate) senescence: Vec<u32>,
    pub(crate) morphogens: MorphogenField,
    pub(crate) stats: TissueStats,
}

impl TissueState {
    /// An unoccupied lattice with zeroed fields.
    #[must_use]
    pub fn empty(width: usize, height: usize) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            tick: Tick::zero(),
            cells: vec![CellType::Empty; len],
            energy: vec![0.0; len],
            ages: vec![0; len],
            senescence: vec![0; len],
            morphogens: MorphogenField::new(width, height),
            stats: TissueStats::default(),
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Number of lattice sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Next-state buffers seeded with this tick's values and the given field.
    pub(crate) fn successor(&self, morphogens: MorphogenField) -> Self {
        Self {
            width: self.width,
            height: self.height,
            tick: self.tick.next(),
            cells: self.cells.clone(),
            energy: self.energy.clone(),
            ages: self.ages.clone(),
            senescence: self.senescence.clone(),
            morphogens,
            stats: TissueStats {
                cumulative_births: self.stats.cumulative_births,
                cumulative_deaths: self.stats.cumulative_deaths,
                ..TissueStats::default()
            },
        }
    }

    #[must_use]
    pub fn stats(&self) -> &TissueStats {
        &self.stats
    }

    #[must_use]
    pub fn cells(&self) -> &[CellType] {
        &self.cells
    }

    #[must_use]
    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    #[must_use]
    pub fn ages(&self) -> &[u32] {
        &self.ages
    }

    #[must_use]
    pub fn senescence(&self) -> &[u32] {
        &self.senescence
    }

    #[must_use]
    pub fn morphogens(&self) -> &MorphogenField {
        &self.morphogens
    }

    /// Read-only view of one morphogen channel.
    #[must_use]
    pub fn morphogen(&self, channel: Morphogen) -> &[f32] {
        self.morphogens.channel(channel)
    }

    /// Returns the flat index for `(x, y)` without bounds checks.
    #[inline]
    #[must_use]
    pub const fn offset(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Cell type at `(x, y)`, or `None` outside the lattice.
    #[must_use]
    pub fn cell_at(&self, x: usize, y: usize) -> Option<CellType> {
        (x < self.width && y < self.height).then(|| self.cells[self.offset(x, y)])
    }

    /// Flat index for `(x, y)` wrapped onto the torus.
    #[inline]
    #[must_use]
    pub fn wrapped_offset(&self, x: usize, y: usize) -> usize {
        wrapped_index(x % self.width, y % self.height, 0, 0, self.width, self.height)
    }

    /// Occupies `(x, y)` with the given attributes; coordinates wrap around
    /// the torus. Call [`Self::refresh_stats`] once all edits are done.
    pub fn place_cell(
        &mut self,
        x: usize,
        y: usize,
        cell_type: CellType,
        energy: f64,
        age: u32,
        senescence: u32,
    ) {
        let idx = self.wrapped_offset(x, y);
        self.cells[idx] = cell_type;
        if cell_type.is_empty() {
            self.energy[idx] = 0.0;
            self.ages[idx] = 0;
            self.senescence[idx] = 0;
        } else {
            self.energy[idx] = energy;
            self.ages[idx] = age;
            self.senescence[idx] = senescence;
        }
    }

    /// Vacates `(x, y)`.
    pub fn clear_cell(&mut self, x: usize, y: usize) {
        self.place_cell(x, y, CellType::Empty, 0.0, 0, 0);
    }

    /// Overwrites one morphogen value at `(x, y)`, wrapping the coordinates.
    pub fn set_morphogen(&mut self, channel: Morphogen, x: usize, y: usize, value: f32) {
        let idx = self.wrapped_offset(x, y);
        self.morphogens.channel_mut(channel)[idx] = value;
    }

    /// Fills an entire morphogen channel with `value`.
    pub fn fill_morphogen(&mut self, channel: Morphogen, value: f32) {
        self.morphogens.channel_mut(channel).fill(value);
    }

    /// Recomputes population, per-type counts and total energy.
    pub fn refresh_stats(&mut self) {
        let mut population = 0;
        let mut type_counts = [0usize; CellType::COUNT];
        for &cell in &self.cells {
            if cell.is_occupied() {
                population += 1;
                type_counts[cell.index()] += 1;
            }
        }
        self.stats.population = population;
        self.stats.type_counts = type_counts;
        self.stats.total_energy = self.energy.iter().sum();
    }

    /// Indices of every occupied site in raster order.
    #[must_use]
    pub fn occupied_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| cell.is_occupied().then_some(idx))
            .collect()
    }

    /// Mean lattice coordinate of occupied sites (no wrap-around).
    #[must_use]
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut count = 0usize;
        for (idx, cell) in self.cells.iter().enumerate() {
            if cell.is_occupied() {
                sum_x += (idx % self.width) as f64;
                sum_y += (idx / self.width) as f64;
                count += 1;
            }
        }
        (count > 0).then(|| (sum_x / count as f64, sum_y / count as f64))
    }

    /// Number of occupied 4-neighbours of `idx`.
    #[must_use]
    pub fn occupied_neighbors(&self, idx: usize) -> usize {
        neighbors4(idx, self.width, self.height)
            .iter()
            .filter(|&&n| self.cells[n].is_occupied())
            .count()
    }

    /// Distance of every site to the nearest unoccupied site.
    #[must_use]
    pub fn depth_map(&self) -> DepthMap {
        DepthMap::compute(&self.cells, self.width, self.height)
    }

    /// Checks array lengths and per-site invariants.
    pub fn validate(&self) -> Result<(), TissueError> {
        if self.width == 0 || self.height == 0 {
            return Err(TissueError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        let expected = self.width * self.height;
        for actual in [
            self.cells.len(),
            self.energy.len(),
            self.ages.len(),
            self.senescence.len(),
        ] {
            if actual != expected {
                return Err(TissueError::DimensionMismatch { expected, actual });
            }
        }
        for channel in Morphogen::ALL {
            let actual = self.morphogens.channel(channel).len();
            if actual != expected {
                return Err(TissueError::DimensionMismatch { expected, actual });
            }
        }

        for idx in 0..expected {
            let energy = self.energy[idx];
            if !energy.is_finite() || energy < 0.0 {
                return Err(TissueError::InvalidState(format!(
                    "energy at site {idx} is {energy}"
                )));
            }
            if self.cells[idx].is_empty() && (energy != 0.0 || self.ages[idx] != 0) {
                return Err(TissueError::InvalidState(format!(
                    "empty site {idx} carries energy or age"
                )));
            }
        }
        for channel in Morphogen::ALL {
            if let Some(idx) = self
                .morphogens
                .channel(channel)
                .iter()
                .position(|value| !value.is_finite() || *value < 0.0)
            {
                return Err(TissueError::InvalidState(format!(
                    "{channel:?} concentration at site {idx} is not a finite non-negative value"
                )));
            }
        }
        Ok(())
    }
}
