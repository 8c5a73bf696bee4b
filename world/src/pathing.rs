//! Dijkstra-based path planning over the cell grid.
//!
//! The field is seeded from every goal cell at distance zero and relaxed
//! outward over 4-connected unit-weight edges, so one computation answers
//! shortest-path queries for every source cell. Ties are broken by cell
//! index order, which keeps repeated runs over identical grids identical.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use gate_defence_core::CellCoord;
use glam::Vec3;

use crate::Grid;

/// Sentinel distance stored for cells no goal can reach.
pub const UNREACHABLE: u32 = u32::MAX;

/// Immutable world-space path from a source cell to the nearest goal.
///
/// Produced fresh per request and owned exclusively by the requesting
/// agent; the planner never hands the same path out twice.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    waypoints: Vec<Vec3>,
}

impl Path {
    /// Builds a path from pre-computed waypoints.
    #[must_use]
    pub fn from_waypoints(waypoints: Vec<Vec3>) -> Self {
        Self { waypoints }
    }

    /// Ordered world-space waypoints, source first, goal last.
    #[must_use]
    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    /// Number of waypoints contained in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Reports whether the path contains no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Dense distance/predecessor tables over all grid cells.
#[derive(Clone, Debug)]
pub struct DijkstraField {
    columns: u32,
    rows: u32,
    distances: Vec<u32>,
    predecessors: Vec<Option<u32>>,
}

impl DijkstraField {
    /// Runs multi-source Dijkstra seeded from every walkable goal cell.
    #[must_use]
    pub fn compute(grid: &Grid) -> Self {
        let cell_count = grid.cell_count();
        let mut field = Self {
            columns: grid.columns(),
            rows: grid.rows(),
            distances: vec![UNREACHABLE; cell_count],
            predecessors: vec![None; cell_count],
        };

        if cell_count == 0 {
            return field;
        }

        let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();
        for goal in grid.goal_cells() {
            if !grid.is_walkable(goal) {
                continue;
            }
            let Some(index) = grid.index(goal) else {
                continue;
            };
            if field.distances[index] == 0 {
                continue;
            }
            field.distances[index] = 0;
            heap.push(Reverse((0, index as u32)));
        }

        while let Some(Reverse((distance, index))) = heap.pop() {
            let index_usize = index as usize;
            if distance > field.distances[index_usize] {
                continue;
            }

            let cell = field.cell_at(index_usize);
            let next_distance = distance.saturating_add(1);

            for neighbor in cardinal_neighbors(cell, field.columns, field.rows) {
                if !grid.is_walkable(neighbor) {
                    continue;
                }
                let Some(neighbor_index) = grid.index(neighbor) else {
                    continue;
                };
                if field.distances[neighbor_index] <= next_distance {
                    continue;
                }

                field.distances[neighbor_index] = next_distance;
                field.predecessors[neighbor_index] = Some(index);
                heap.push(Reverse((next_distance, neighbor_index as u32)));
            }
        }

        field
    }

    /// Hop distance from the cell to its nearest goal, if within bounds.
    #[must_use]
    pub fn distance(&self, cell: CellCoord) -> Option<u32> {
        self.index(cell).map(|index| self.distances[index])
    }

    /// Neighbor one hop closer to the nearest goal, if any.
    #[must_use]
    pub fn next_hop(&self, cell: CellCoord) -> Option<CellCoord> {
        let index = self.index(cell)?;
        self.predecessors[index].map(|p| self.cell_at(p as usize))
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }

    fn cell_at(&self, index: usize) -> CellCoord {
        let width = self.columns.max(1) as usize;
        CellCoord::new((index % width) as u32, (index / width) as u32)
    }
}

/// Shortest-path query surface consumed by navigation agents.
///
/// The planner memoizes the last computed field keyed on the grid revision;
/// the cache is an internal optimization, not part of the contract.
#[derive(Debug, Default)]
pub struct PathPlanner {
    cached: Option<CachedField>,
}

#[derive(Debug)]
struct CachedField {
    revision: u64,
    field: DijkstraField,
}

impl PathPlanner {
    /// Creates a planner with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance field for the grid's current topology.
    pub fn field(&mut self, grid: &Grid) -> &DijkstraField {
        let stale = self
            .cached
            .as_ref()
            .map_or(true, |cached| cached.revision != grid.revision());
        if stale {
            self.cached = Some(CachedField {
                revision: grid.revision(),
                field: DijkstraField::compute(grid),
            });
        }

        &self
            .cached
            .as_ref()
            .expect("cache populated above")
            .field
    }

    /// Computes the shortest-hop world-space path from the cell containing
    /// `from` to whichever goal cell lies closest.
    ///
    /// Returns `None` when the point lies outside the grid, the source cell
    /// is not walkable, or no goal is reachable. An absent path is a valid
    /// "cannot currently reach any goal" outcome, not an error.
    pub fn try_build_path_to_closest_goal(&mut self, grid: &Grid, from: Vec3) -> Option<Path> {
        let source = grid.try_world_to_cell(from)?;
        if !grid.is_walkable(source) {
            return None;
        }

        let field = self.field(grid);
        let mut distance = field.distance(source)?;
        if distance == UNREACHABLE {
            return None;
        }

        let mut waypoints = Vec::with_capacity(distance as usize + 1);
        let mut cell = source;
        waypoints.push(grid.cell_to_world(cell));

        while distance > 0 {
            let Some(next) = field.next_hop(cell) else {
                // Predecessor chains always terminate at a goal seed.
                return None;
            };
            cell = next;
            waypoints.push(grid.cell_to_world(cell));
            distance -= 1;
        }

        Some(Path::from_waypoints(waypoints))
    }
}

fn cardinal_neighbors(cell: CellCoord, columns: u32, rows: u32) -> impl Iterator<Item = CellCoord> {
    let mut candidates = [None; 4];
    let mut count = 0;

    if let Some(row) = cell.row().checked_sub(1) {
        candidates[count] = Some(CellCoord::new(cell.column(), row));
        count += 1;
    }

    if let Some(column) = cell.column().checked_sub(1) {
        candidates[count] = Some(CellCoord::new(column, cell.row()));
        count += 1;
    }

    if cell.column() + 1 < columns {
        candidates[count] = Some(CellCoord::new(cell.column() + 1, cell.row()));
        count += 1;
    }

    if cell.row() + 1 < rows {
        candidates[count] = Some(CellCoord::new(cell.column(), cell.row() + 1));
        count += 1;
    }

    candidates.into_iter().take(count).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_defence_core::CellState;

    fn grid_with_goal(columns: u32, rows: u32, goal: CellCoord) -> Grid {
        let mut grid = Grid::with_dimensions(columns, rows);
        assert!(grid.insert_state(goal, CellState::GOAL));
        grid
    }

    #[test]
    fn field_seeds_goal_cells_at_zero() {
        let grid = grid_with_goal(3, 4, CellCoord::new(1, 2));
        let field = DijkstraField::compute(&grid);

        assert_eq!(field.distance(CellCoord::new(1, 2)), Some(0));
        assert_eq!(field.distance(CellCoord::new(1, 1)), Some(1));
        assert_eq!(field.distance(CellCoord::new(1, 0)), Some(2));
        assert_eq!(field.distance(CellCoord::new(0, 0)), Some(3));
    }

    #[test]
    fn field_routes_around_blocked_cells() {
        let mut grid = grid_with_goal(3, 4, CellCoord::new(1, 2));
        assert!(grid.insert_state(CellCoord::new(1, 1), CellState::BLOCKED));

        let field = DijkstraField::compute(&grid);
        assert_eq!(field.distance(CellCoord::new(1, 1)), Some(UNREACHABLE));
        assert_eq!(field.distance(CellCoord::new(1, 0)), Some(4));
        assert_eq!(field.distance(CellCoord::new(0, 1)), Some(2));
    }

    #[test]
    fn next_hops_descend_toward_the_goal() {
        let grid = grid_with_goal(3, 3, CellCoord::new(2, 2));
        let field = DijkstraField::compute(&grid);

        let mut cell = CellCoord::new(0, 0);
        let mut previous = field.distance(cell).expect("in bounds");
        while previous > 0 {
            cell = field.next_hop(cell).expect("chain reaches the goal");
            let next = field.distance(cell).expect("in bounds");
            assert_eq!(next + 1, previous);
            previous = next;
        }
        assert_eq!(cell, CellCoord::new(2, 2));
    }

    #[test]
    fn planner_reuses_the_field_until_the_grid_changes() {
        let mut grid = grid_with_goal(4, 4, CellCoord::new(3, 3));
        let mut planner = PathPlanner::new();

        let from = grid.cell_to_world(CellCoord::new(0, 0));
        let first = planner
            .try_build_path_to_closest_goal(&grid, from)
            .expect("path exists");
        assert_eq!(first.len(), 7);

        assert!(grid.insert_state(CellCoord::new(1, 0), CellState::BLOCKED));
        let detoured = planner
            .try_build_path_to_closest_goal(&grid, from)
            .expect("path exists after mutation");
        assert!(!detoured
            .waypoints()
            .contains(&grid.cell_to_world(CellCoord::new(1, 0))));
    }

    #[test]
    fn source_on_goal_yields_single_waypoint() {
        let grid = grid_with_goal(2, 2, CellCoord::new(1, 1));
        let mut planner = PathPlanner::new();

        let from = grid.cell_to_world(CellCoord::new(1, 1));
        let path = planner
            .try_build_path_to_closest_goal(&grid, from)
            .expect("goal cell is its own path");
        assert_eq!(path.len(), 1);
    }
}
