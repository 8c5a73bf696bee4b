//! Failure taxonomy for the scheduling and navigation core.
//!
//! Everything here is handled locally by the emitting system; none of these
//! values escape as process-level faults.

use thiserror::Error;

/// Fatal-to-wave configuration failures raised by the spawn loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WaveError {
    /// A full pass over every spawn assignment emitted nothing while quota
    /// remained, so the demand can never be satisfied.
    #[error(
        "wave {wave_index} spawn demand exceeds assignable capacity: \
         {remaining} enemies have no eligible spawn assignment"
    )]
    SpawnCapacityExhausted {
        /// Index of the wave inside its horde.
        wave_index: usize,
        /// Enemies still owed when the loop aborted.
        remaining: u32,
    },
    /// The wave had no spawn assignments and the grid exposes no spawn
    /// cells to derive them from.
    #[error("wave {wave_index} has no spawn assignments and the grid has no spawn cells")]
    NoSpawnAssignments {
        /// Index of the wave inside its horde.
        wave_index: usize,
    },
}
