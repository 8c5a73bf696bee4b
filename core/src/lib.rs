#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gate Defence engine.
//!
//! This crate defines the vocabulary that connects the authoritative grid
//! world, the pure systems, and the adapters: coordinate and identifier
//! newtypes, the cell-state bitmask, horde configuration, session-scoped
//! counters, and the collaborator traits behind which the engine-facing
//! capabilities (pooling, spatial queries, phase control, player health)
//! are injected. Systems consume these contracts and nothing else, so the
//! gameplay core stays testable without an engine.

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod counters;
pub mod error;

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Gate Defence.";

/// Describes the active gameplay phase for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GamePhase {
    /// Building phase where placement systems mutate the grid.
    Build,
    /// Defence phase where hordes spawn and advance toward the goals.
    Defence,
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }
}

bitflags::bitflags! {
    /// State bits attached to every grid cell.
    ///
    /// Placement and preview systems own the mutations; the navigation and
    /// scheduling core only ever reads these bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CellState: u8 {
        /// The cell accepts agent traversal.
        const WALKABLE = 1 << 0;
        /// The cell is obstructed by a structure and rejects traversal.
        const BLOCKED = 1 << 1;
        /// The cell is a spawn point that emits enemies during defence.
        const SPAWN = 1 << 2;
        /// The cell is a pathfinding destination.
        const GOAL = 1 << 3;
    }
}

/// Unique identifier assigned to a spawned agent instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of an enemy archetype referenced by wave configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyTypeId(u32);

impl EnemyTypeId {
    /// Creates a new enemy-type identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Monotonically increasing priority assigned to every navigating agent.
///
/// Earlier-spawned agents carry smaller orders and win every occupancy
/// contest, which gives the yielding rule a total order and rules out two
/// agents blocking each other forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpawnOrder(u64);

impl SpawnOrder {
    /// Creates a spawn order from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the order.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Placement details handed to the pooling collaborator for each spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnContext {
    /// World-space position the instance should appear at.
    pub position: Vec3,
    /// Initial facing expressed as a yaw angle in radians.
    pub yaw: f32,
    /// Grid cell the spawn was assigned to.
    pub spawn_cell: CellCoord,
    /// Additional offset applied on top of the sampled surface position.
    pub spawn_offset: Vec3,
}

/// Nearby-agent record returned by spatial occupancy probes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentContact {
    /// Identifier of the contacted agent.
    pub agent: AgentId,
    /// World-space position of the contacted agent.
    pub position: Vec3,
    /// Spawn order carried by the contacted agent.
    pub spawn_order: SpawnOrder,
}

/// Pooling collaborator that materializes enemy instances.
///
/// A `None` handle means the pool could not supply an instance; callers log
/// the drop and continue, they never crash the schedule.
pub trait SpawnPool {
    /// Acquires an instance of the requested enemy type.
    fn spawn(&mut self, enemy: EnemyTypeId, context: SpawnContext) -> Option<AgentId>;
}

/// Spatial collaborator answering radius queries over live agents.
pub trait SpatialQuery {
    /// Returns every agent within `radius` of `position`.
    fn query_nearby(&self, position: Vec3, radius: f32) -> Vec<AgentContact>;
}

/// External coordinator owning the build/defence phase transitions.
pub trait PhaseCoordinator {
    /// Phase currently active in the session.
    fn phase(&self) -> GamePhase;

    /// Forces the session back into the building phase.
    fn force_build_phase(&mut self);

    /// Signals that every horde has been defeated.
    fn declare_victory(&mut self);
}

/// Player-health collaborator notified when a horde runs its course.
pub trait PlayerHealth {
    /// Registers that one complete horde reached the end of its schedule.
    fn register_horde_defeat(&mut self);
}

#[cfg(test)]
mod tests {
    use super::{CellCoord, CellState, EnemyTypeId, SpawnOrder};
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn cell_state_bits_compose() {
        let mut state = CellState::WALKABLE | CellState::SPAWN;
        assert!(state.contains(CellState::WALKABLE));
        assert!(!state.contains(CellState::GOAL));

        state.insert(CellState::BLOCKED);
        state.remove(CellState::WALKABLE);
        assert_eq!(state, CellState::BLOCKED | CellState::SPAWN);
    }

    #[test]
    fn spawn_orders_sort_by_value() {
        let earlier = SpawnOrder::new(3);
        let later = SpawnOrder::new(7);
        assert!(earlier < later);
        assert_eq!(later.get(), 7);
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn cell_coord_round_trips_through_bincode() {
        assert_round_trip(&CellCoord::new(5, 7));
    }

    #[test]
    fn enemy_type_id_round_trips_through_bincode() {
        assert_round_trip(&EnemyTypeId::new(42));
    }
}
