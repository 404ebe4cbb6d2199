use std::collections::VecDeque;

use crate::CellType;
use crate::grid::neighbors4;

/// Depth assigned to occupied sites that no unoccupied site can reach,
/// which only happens when the whole lattice is full.
pub const UNREACHED_DEPTH: u32 = u32::MAX;

/// Per-site graph distance (4-neighbour, toroidal) to the nearest unoccupied site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthMap {
    width: usize,
    height: usize,
    depth: Vec<u32>,
}

impl DepthMap {
    /// Multi-source breadth-first search seeded from the tissue boundary.
    #[must_use]
    pub fn compute(cells: &[CellType], width: usize, height: usize) -> Self {
        let mut depth: Vec<u32> = cells
            .iter()
            .map(|cell| if cell.is_empty() { 0 } else { UNREACHED_DEPTH })
            .collect();
        let mut frontier = VecDeque::new();

        for (idx, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            if neighbors4(idx, width, height)
                .iter()
                .any(|&n| cells[n].is_empty())
            {
                depth[idx] = 1;
                frontier.push_back(idx);
            }
        }

        while let Some(idx) = frontier.pop_front() {
            let next = depth[idx] + 1;
            for n in neighbors4(idx, width, height) {
                if depth[n] == UNREACHED_DEPTH {
                    depth[n] = next;
                    frontier.push_back(n);
                }
            }
        }

        Self {
            width,
            height,
            depth,
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
    pub fn values(&self) -> &[u32] {
        &self.depth
    }

    #[inline]
    #[must_use]
    pub fn get(&self, idx: usize) -> u32 {
        self.depth[idx]
    }

    /// Largest finite depth on the lattice.
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.depth
            .iter()
            .copied()
            .filter(|&d| d != UNREACHED_DEPTH)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    fn block(width: usize, height: usize, x0: usize, y0: usize, side: usize) -> Vec<CellType> {
        let mut cells = vec![CellType::Empty; width * height];
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                cells[y * width + x] = CellType::Stem;
            }
        }
        cells
    }

    #[test]
    fn square_block_has_concentric_depths() {
        let (width, height) = (16, 16);
        let cells = block(width, height, 2, 3, 7);
        let map = DepthMap::compute(&cells, width, height);
        for y in 3..10 {
            for x in 2..9 {
                let ring = (x - 2).min(8 - x).min(y - 3).min(9 - y) as u32;
                assert_eq!(map.get(y * width + x), ring + 1, "site ({x}, {y})");
            }
        }
        assert_eq!(map.get(0), 0);
        assert_eq!(map.max_depth(), 4);
    }

    #[test]
    fn depth_wraps_around_the_torus() {
        let (width, height) = (8, 8);
        let mut cells = vec![CellType::Empty; width * height];
        for y in 0..height {
            for x in [7, 0, 1] {
                cells[y * width + x] = CellType::Ectoderm;
            }
        }
        let map = DepthMap::compute(&cells, width, height);
        for y in 0..height {
            assert_eq!(map.get(y * width + 7), 1);
            assert_eq!(map.get(y * width), 2);
            assert_eq!(map.get(y * width + 1), 1);
        }
    }

    #[test]
    fn full_lattice_is_unreached() {
        let cells = vec![CellType::Stem; 9];
        let map = DepthMap::compute(&cells, 3, 3);
        assert!(map.values().iter().all(|&d| d == UNREACHED_DEPTH));
        assert_eq!(map.max_depth(), 0);
    }

    #[test]
    fn random_masks_respect_boundary_properties() {
        let (width, height) = (20, 14);
        let mut rng = SmallRng::seed_from_u64(0xD3F7);
        for _ in 0..40 {
            let fill: f64 = rng.random_range(0.2..0.95);
            let cells: Vec<CellType> = (0..width * height)
                .map(|_| {
                    if rng.random_bool(fill) {
                        CellType::Stem
                    } else {
                        CellType::Empty
                    }
                })
                .collect();
            if cells.iter().all(|c| c.is_occupied()) {
                continue;
            }
            let map = DepthMap::compute(&cells, width, height);
            for idx in 0..cells.len() {
                let depth = map.get(idx);
                let neighbors = neighbors4(idx, width, height);
                if cells[idx].is_empty() {
                    assert_eq!(depth, 0);
                    continue;
                }
                assert!(depth >= 1 && depth != UNREACHED_DEPTH);
                let touches_empty = neighbors.iter().any(|&n| cells[n].is_empty());
                assert_eq!(depth == 1, touches_empty);
                if depth > 1 {
                    assert!(neighbors.iter().any(|&n| map.get(n) == depth - 1));
                }
                assert!(neighbors.iter().all(|&n| map.get(n) + 1 >= depth));
            }
        }
    }
}
