//! Ephemeral spatial grid for merge candidate generation.
//!
//! Rebuilt every step; partitions active bodies into fixed-size square cells
//! so the merge pass only examines pairs sharing a cell. Bodies in different
//! cells never collide even when geometrically close across a cell boundary,
//! which is acceptable because the cell size exceeds typical body radii.

use nalgebra::Vector2;
use std::collections::HashMap;

/// Per-step partition of body indices into square cells.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Inserts a body index at its position.
    pub fn insert(&mut self, index: usize, position: Vector2<f64>) {
        let key = (
            (position.x / self.cell_size).floor() as i64,
            (position.y / self.cell_size).floor() as i64,
        );
        self.cells.entry(key).or_default().push(index);
    }

    /// Iterates over cells holding at least two occupants.
    pub fn crowded_cells(&self) -> impl Iterator<Item = &[usize]> {
        self.cells
            .values()
            .filter(|c| c.len() >= 2)
            .map(|c| c.as_slice())
    }

    /// Number of occupied cells.
    pub fn occupied(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bodies_in_same_cell_are_candidates() {
        let mut grid = SpatialGrid::new(50.0);
        grid.insert(0, Vector2::new(10.0, 10.0));
        grid.insert(1, Vector2::new(40.0, 40.0));
        grid.insert(2, Vector2::new(120.0, 10.0));

        let crowded: Vec<&[usize]> = grid.crowded_cells().collect();
        assert_eq!(crowded.len(), 1);
        assert_eq!(crowded[0], &[0, 1]);
        assert_eq!(grid.occupied(), 2);
    }

    #[test]
    fn test_negative_coordinates_floor_into_their_own_cell() {
        let mut grid = SpatialGrid::new(50.0);
        // floor(-10/50) = -1, floor(10/50) = 0: distinct cells despite
        // being only 20 units apart
        grid.insert(0, Vector2::new(-10.0, 0.0));
        grid.insert(1, Vector2::new(10.0, 0.0));

        assert_eq!(grid.crowded_cells().count(), 0);
        assert_eq!(grid.occupied(), 2);
    }

    #[test]
    fn test_lone_bodies_are_not_candidates() {
        let mut grid = SpatialGrid::new(50.0);
        grid.insert(0, Vector2::new(0.0, 0.0));

        assert_eq!(grid.crowded_cells().count(), 0);
    }
}
