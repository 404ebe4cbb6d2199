//! Morphogen fields: Laplacian diffusion over the whole lattice followed by
//! activator/inhibitor kinetics on occupied sites.

use rand::Rng;
use rayon::prelude::*;

use crate::config::MorphogenSettings;
use crate::{CellType, Morphogen};

/// Four scalar concentration channels over every lattice site.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphogenField {
    width: usize,
    height: usize,
    channels: [Vec<f32>; Morphogen::COUNT],
}

impl MorphogenField {
    /// Zeroed channels over a `width x height` lattice.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            channels: std::array::from_fn(|_| vec![0.0; len]),
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

    #[must_use]
    pub fn channel(&self, channel: Morphogen) -> &[f32] {
        &self.channels[channel.index()]
    }

    #[must_use]
    pub fn channel_mut(&mut self, channel: Morphogen) -> &mut [f32] {
        &mut self.channels[channel.index()]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, channel: Morphogen, idx: usize) -> f32 {
        self.channels[channel.index()][idx]
    }

    #[inline]
    pub fn add(&mut self, channel: Morphogen, idx: usize, delta: f32) {
        self.channels[channel.index()][idx] += delta;
    }

    /// Returns the next field after one diffusion step.
    #[must_use]
    pub fn diffused(&self, settings: &MorphogenSettings) -> Self {
        let mut next = Self::new(self.width, self.height);
        self.diffuse_into(&mut next, settings);
        next
    }

    /// Writes one diffusion step of `self` into `next`.
    ///
    /// Every stencil reads only from `self`, so rows are evaluated in parallel.
    pub fn diffuse_into(&self, next: &mut Self, settings: &MorphogenSettings) {
        debug_assert_eq!(self.width, next.width);
        debug_assert_eq!(self.height, next.height);
        let width = self.width;
        let height = self.height;
        let decay = settings.decay;
        let max = settings.max;
        let epsilon = settings.epsilon;

        for channel in Morphogen::ALL {
            let rate = settings.diffusion_rates[channel.index()];
            let src = &self.channels[channel.index()];
            next.channels[channel.index()]
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    let up_row = if y == 0 { height - 1 } else { y - 1 };
                    let down_row = if y + 1 == height { 0 } else { y + 1 };
                    for (x, out) in row.iter_mut().enumerate() {
                        let left_col = if x == 0 { width - 1 } else { x - 1 };
                        let right_col = if x + 1 == width { 0 } else { x + 1 };
                        let center = src[y * width + x];
                        let laplacian = src[y * width + left_col]
                            + src[y * width + right_col]
                            + src[up_row * width + x]
                            + src[down_row * width + x]
                            - 4.0 * center;
                        let value = (center + rate * laplacian) * decay;
                        *out = if value < epsilon { 0.0 } else { value.min(max) };
                    }
                });
        }
    }

    /// One step of activator/inhibitor kinetics on occupied sites.
    pub fn react<R: Rng + ?Sized>(
        &mut self,
        cells: &[CellType],
        settings: &MorphogenSettings,
        rng: &mut R,
    ) {
        let k = settings.reaction_rate;
        let basal = settings.reaction_basal;
        let noise = settings.reaction_noise;
        let [activator, inhibitor, _, _] = &mut self.channels;

        for (idx, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let a = activator[idx];
            let b = inhibitor[idx];
            let jitter = (rng.random::<f32>() - 0.5) * noise;
            activator[idx] = (a + k * (a * a / (1.0 + b) - a + basal) + jitter).max(0.0);
            inhibitor[idx] = (b + k * (a * a - b)).max(0.0);
        }
    }
}
