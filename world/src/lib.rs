#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative grid state and pathfinding for Gate Defence.
//!
//! The [`Grid`] owns every cell's state bits and the world↔grid coordinate
//! mapping. Placement and preview systems mutate cells through the state
//! surface; the navigation and scheduling core only ever reads. Pathfinding
//! lives in [`pathing`] and consumes the grid through the same read-only
//! queries it offers everyone else.

use gate_defence_core::{CellCoord, CellState};
use glam::Vec3;

pub mod pathing;

const DEFAULT_CELL_LENGTH: f32 = 1.0;

/// Dense cell-state grid anchored at a world-space origin.
///
/// Cells are square with edge `cell_length`; columns advance along +X and
/// rows along +Z. The grid surface sits at the origin's Y height, which is
/// the height every reconstructed path is sampled at.
#[derive(Clone, Debug)]
pub struct Grid {
    columns: u32,
    rows: u32,
    cell_length: f32,
    origin: Vec3,
    cells: Vec<CellState>,
    revision: u64,
}

impl Grid {
    /// Creates a grid with every cell walkable.
    #[must_use]
    pub fn new(columns: u32, rows: u32, cell_length: f32, origin: Vec3) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cell_length,
            origin,
            cells: vec![CellState::WALKABLE; capacity],
            revision: 0,
        }
    }

    /// Creates a grid with unit-length cells anchored at the world origin.
    #[must_use]
    pub fn with_dimensions(columns: u32, rows: u32) -> Self {
        Self::new(columns, rows, DEFAULT_CELL_LENGTH, Vec3::ZERO)
    }

    /// Number of columns contained in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows contained in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Side length of a single square cell expressed in world units.
    #[must_use]
    pub const fn cell_length(&self) -> f32 {
        self.cell_length
    }

    /// World-space anchor of the cell at column 0, row 0.
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Counter bumped on every cell mutation; pathfinding caches key on it.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// State bits of the provided cell, if it lies within bounds.
    #[must_use]
    pub fn state(&self, cell: CellCoord) -> Option<CellState> {
        self.index(cell).map(|index| self.cells[index])
    }

    /// Replaces the state of a cell. Returns `false` when out of bounds.
    pub fn set_state(&mut self, cell: CellCoord, state: CellState) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        if self.cells[index] != state {
            self.cells[index] = state;
            self.revision = self.revision.wrapping_add(1);
        }
        true
    }

    /// Adds state bits to a cell. Returns `false` when out of bounds.
    pub fn insert_state(&mut self, cell: CellCoord, state: CellState) -> bool {
        let Some(current) = self.state(cell) else {
            return false;
        };
        self.set_state(cell, current | state)
    }

    /// Removes state bits from a cell. Returns `false` when out of bounds.
    pub fn remove_state(&mut self, cell: CellCoord, state: CellState) -> bool {
        let Some(current) = self.state(cell) else {
            return false;
        };
        self.set_state(cell, current & !state)
    }

    /// Reports whether agents may traverse the cell.
    #[must_use]
    pub fn is_walkable(&self, cell: CellCoord) -> bool {
        self.state(cell).is_some_and(|state| {
            state.contains(CellState::WALKABLE) && !state.contains(CellState::BLOCKED)
        })
    }

    /// Maps a world point to its containing cell; fails outside the bounds.
    #[must_use]
    pub fn try_world_to_cell(&self, position: Vec3) -> Option<CellCoord> {
        if self.cell_length <= 0.0 {
            return None;
        }

        let relative = position - self.origin;
        let column = (relative.x / self.cell_length).floor();
        let row = (relative.z / self.cell_length).floor();
        if column < 0.0 || row < 0.0 {
            return None;
        }

        let column = column as u32;
        let row = row as u32;
        if column >= self.columns || row >= self.rows {
            return None;
        }

        Some(CellCoord::new(column, row))
    }

    /// Deterministic inverse mapping to the centre of a cell at surface
    /// height.
    #[must_use]
    pub fn cell_to_world(&self, cell: CellCoord) -> Vec3 {
        let x = (cell.column() as f32 + 0.5) * self.cell_length;
        let z = (cell.row() as f32 + 0.5) * self.cell_length;
        self.origin + Vec3::new(x, 0.0, z)
    }

    /// All cells flagged as enemy spawn points, in row-major order.
    #[must_use]
    pub fn enemy_spawn_cells(&self) -> Vec<CellCoord> {
        self.cells_with(CellState::SPAWN)
    }

    /// All cells flagged as pathfinding goals, in row-major order.
    #[must_use]
    pub fn goal_cells(&self) -> Vec<CellCoord> {
        self.cells_with(CellState::GOAL)
    }

    fn cells_with(&self, state: CellState) -> Vec<CellCoord> {
        let mut matches = Vec::new();
        for row in 0..self.rows {
            for column in 0..self.columns {
                let cell = CellCoord::new(column, row);
                if self
                    .state(cell)
                    .is_some_and(|bits| bits.contains(state))
                {
                    matches.push(cell);
                }
            }
        }
        matches
    }

    pub(crate) fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_to_cell_maps_interior_points() {
        let grid = Grid::new(4, 3, 2.0, Vec3::new(10.0, 0.0, -4.0));

        let cell = grid.try_world_to_cell(Vec3::new(10.1, 0.0, -3.9));
        assert_eq!(cell, Some(CellCoord::new(0, 0)));

        let cell = grid.try_world_to_cell(Vec3::new(15.0, 0.0, 1.5));
        assert_eq!(cell, Some(CellCoord::new(2, 2)));
    }

    #[test]
    fn world_to_cell_rejects_points_outside_bounds() {
        let grid = Grid::with_dimensions(4, 3);

        assert_eq!(grid.try_world_to_cell(Vec3::new(-0.1, 0.0, 1.0)), None);
        assert_eq!(grid.try_world_to_cell(Vec3::new(4.1, 0.0, 1.0)), None);
        assert_eq!(grid.try_world_to_cell(Vec3::new(1.0, 0.0, 3.5)), None);
    }

    #[test]
    fn cell_to_world_round_trips_through_mapping() {
        let grid = Grid::new(6, 6, 1.5, Vec3::new(-3.0, 2.0, 7.0));
        let cell = CellCoord::new(4, 2);

        let world = grid.cell_to_world(cell);
        assert_eq!(grid.try_world_to_cell(world), Some(cell));
        assert!((world.y - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn mutations_bump_the_revision() {
        let mut grid = Grid::with_dimensions(3, 3);
        let before = grid.revision();

        assert!(grid.insert_state(CellCoord::new(1, 1), CellState::BLOCKED));
        assert!(grid.revision() > before);

        // Writing the same state again is not a topology change.
        let unchanged = grid.revision();
        assert!(grid.insert_state(CellCoord::new(1, 1), CellState::BLOCKED));
        assert_eq!(grid.revision(), unchanged);
    }

    #[test]
    fn spawn_and_goal_queries_scan_in_row_major_order() {
        let mut grid = Grid::with_dimensions(3, 3);
        assert!(grid.insert_state(CellCoord::new(2, 0), CellState::SPAWN));
        assert!(grid.insert_state(CellCoord::new(0, 2), CellState::SPAWN));
        assert!(grid.insert_state(CellCoord::new(1, 1), CellState::GOAL));

        assert_eq!(
            grid.enemy_spawn_cells(),
            vec![CellCoord::new(2, 0), CellCoord::new(0, 2)]
        );
        assert_eq!(grid.goal_cells(), vec![CellCoord::new(1, 1)]);
    }

    #[test]
    fn blocked_cells_are_not_walkable() {
        let mut grid = Grid::with_dimensions(2, 2);
        let cell = CellCoord::new(0, 1);
        assert!(grid.is_walkable(cell));

        assert!(grid.insert_state(cell, CellState::BLOCKED));
        assert!(!grid.is_walkable(cell));

        assert!(grid.remove_state(cell, CellState::BLOCKED));
        assert!(grid.is_walkable(cell));
    }
}
