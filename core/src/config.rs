//! Horde and wave configuration loaded before play begins.
//!
//! Definitions are immutable once constructed; the scheduler resolves them
//! into per-wave runtime state when a wave starts and never mutates the
//! originals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CellCoord, EnemyTypeId};

/// Ordered set of waves executed during one defence phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HordeDefinition {
    waves: Vec<WaveDefinition>,
}

impl HordeDefinition {
    /// Creates a horde from its ordered wave list.
    #[must_use]
    pub fn new(waves: Vec<WaveDefinition>) -> Self {
        Self { waves }
    }

    /// Waves scheduled for this horde, in execution order.
    #[must_use]
    pub fn waves(&self) -> &[WaveDefinition] {
        &self.waves
    }
}

/// One cadence-paced batch of enemy spawns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveDefinition {
    enemies: WaveEnemySource,
    assignments: Vec<SpawnAssignment>,
    cadence: Duration,
    advance: AdvanceMode,
    advance_delay: Duration,
}

impl WaveDefinition {
    /// Creates a wave definition from its spawn plan and pacing parameters.
    #[must_use]
    pub fn new(
        enemies: WaveEnemySource,
        assignments: Vec<SpawnAssignment>,
        cadence: Duration,
        advance: AdvanceMode,
        advance_delay: Duration,
    ) -> Self {
        Self {
            enemies,
            assignments,
            cadence,
            advance,
            advance_delay,
        }
    }

    /// Enemy quotas configured for the wave.
    #[must_use]
    pub fn enemies(&self) -> &WaveEnemySource {
        &self.enemies
    }

    /// Explicit spawn assignments; empty means one per grid spawn cell.
    #[must_use]
    pub fn assignments(&self) -> &[SpawnAssignment] {
        &self.assignments
    }

    /// Interval between successive spawn passes.
    #[must_use]
    pub const fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Condition gating the transition to the next wave.
    #[must_use]
    pub const fn advance(&self) -> AdvanceMode {
        self.advance
    }

    /// Delay applied after the advance condition is satisfied.
    #[must_use]
    pub const fn advance_delay(&self) -> Duration {
        self.advance_delay
    }
}

/// Enemy quotas for a wave, either the explicit list or the single-entry
/// form kept for older horde configurations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WaveEnemySource {
    /// Explicit per-type quota list.
    Explicit(Vec<EnemyQuota>),
    /// Single-quota form used by legacy wave configurations.
    Legacy(EnemyQuota),
}

impl WaveEnemySource {
    /// Resolves the source into the normalized quota list.
    #[must_use]
    pub fn normalized(&self) -> Vec<EnemyQuota> {
        match self {
            Self::Explicit(quotas) => quotas.clone(),
            Self::Legacy(quota) => vec![*quota],
        }
    }
}

/// Number of instances of one enemy type a wave must emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyQuota {
    enemy: EnemyTypeId,
    count: u32,
}

impl EnemyQuota {
    /// Creates a quota for the provided enemy type.
    #[must_use]
    pub const fn new(enemy: EnemyTypeId, count: u32) -> Self {
        Self { enemy, count }
    }

    /// Enemy type the quota applies to.
    #[must_use]
    pub const fn enemy(&self) -> EnemyTypeId {
        self.enemy
    }

    /// Number of instances to emit.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }
}

/// Binding from a spawn cell to the quota indices permitted to emerge there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnAssignment {
    spawn_cell: CellCoord,
    allowed_types: Vec<usize>,
}

impl SpawnAssignment {
    /// Creates an assignment; an empty index list permits every type.
    #[must_use]
    pub fn new(spawn_cell: CellCoord, allowed_types: Vec<usize>) -> Self {
        Self {
            spawn_cell,
            allowed_types,
        }
    }

    /// Grid cell the assignment emits from.
    #[must_use]
    pub const fn spawn_cell(&self) -> CellCoord {
        self.spawn_cell
    }

    /// Quota indices permitted at this cell; empty means unrestricted.
    #[must_use]
    pub fn allowed_types(&self) -> &[usize] {
        &self.allowed_types
    }
}

/// Condition that releases the scheduler into the next wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvanceMode {
    /// Apply the advance delay immediately after spawning finishes.
    FixedInterval,
    /// Wait for the active population to reach zero before the delay.
    AfterClear,
}
