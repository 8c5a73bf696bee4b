#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Horde and wave spawn scheduling for the defence phase.
//!
//! The manager walks an ordered list of hordes, each an ordered list of
//! waves. Every wave resolves its enemy quotas and spawn assignments into
//! runtime state, emits cadence-paced spawn passes through the injected
//! pool, and gates the next wave on either a fixed delay or a full clear
//! of the active population. All waits are explicit state plus
//! time-remaining fields advanced by `tick(dt)`; halting mid-wave discards
//! them cleanly.

use std::sync::Arc;
use std::time::Duration;

use gate_defence_core::{
    config::{AdvanceMode, HordeDefinition, WaveDefinition},
    counters::SessionCounters,
    error::WaveError,
    AgentId, CellCoord, EnemyTypeId, PhaseCoordinator, PlayerHealth, SpawnContext, SpawnPool,
};
use gate_defence_world::Grid;
use glam::Vec3;

/// Externally observable progress of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HordeStatus {
    /// No horde is active; the scheduler waits for a defence start.
    NotStarted,
    /// A wave of the current horde is spawning or gating its advance.
    Running {
        /// Index of the active horde.
        horde_index: usize,
        /// Index of the active wave inside the horde.
        wave_index: usize,
    },
    /// The final wave finished spawning; waiting for the population to
    /// drain before finalizing the horde.
    Clearing {
        /// Index of the active horde.
        horde_index: usize,
    },
    /// Every configured horde ran to completion.
    Completed,
}

#[derive(Debug)]
struct QuotaState {
    enemy: EnemyTypeId,
    remaining: u32,
}

#[derive(Debug)]
struct ResolvedAssignment {
    cell: CellCoord,
    allowed: Vec<usize>,
}

#[derive(Clone, Copy, Debug)]
enum WaveStage {
    Spawning,
    AwaitingClear,
    Delay(Duration),
}

#[derive(Debug)]
struct WaveRuntime {
    wave_index: usize,
    quotas: Vec<QuotaState>,
    assignments: Vec<ResolvedAssignment>,
    total_remaining: u32,
    cadence: Duration,
    advance: AdvanceMode,
    advance_delay: Duration,
    cadence_remaining: Duration,
    stage: WaveStage,
}

#[derive(Debug)]
enum Stage {
    Idle,
    Wave(WaveRuntime),
    HordeClear,
    Done,
}

enum PassOutcome {
    Continue,
    Finished,
    Aborted(WaveError),
}

/// Scheduler that runs hordes of waves against the injected collaborators.
#[derive(Debug)]
pub struct HordesManager {
    hordes: Vec<HordeDefinition>,
    counters: Arc<SessionCounters>,
    horde_index: usize,
    stage: Stage,
    completed_hordes: u32,
    fallback_defeats: u32,
    dropped_spawns: u64,
    empty_warned: bool,
}

impl HordesManager {
    /// Creates a manager over the provided horde list and session counters.
    #[must_use]
    pub fn new(hordes: Vec<HordeDefinition>, counters: Arc<SessionCounters>) -> Self {
        Self {
            hordes,
            counters,
            horde_index: 0,
            stage: Stage::Idle,
            completed_hordes: 0,
            fallback_defeats: 0,
            dropped_spawns: 0,
            empty_warned: false,
        }
    }

    /// Begins the current horde in response to the defence-phase signal.
    ///
    /// Starting while a horde already runs, or after every horde
    /// completed, is a no-op.
    pub fn start_defence(&mut self, grid: &Grid) {
        if !matches!(self.stage, Stage::Idle) {
            return;
        }

        if self.hordes.is_empty() {
            if !self.empty_warned {
                tracing::warn!("no hordes configured, ignoring defence start");
                self.empty_warned = true;
            }
            return;
        }

        self.stage = self.begin_wave(0, grid);
    }

    /// Abandons the active horde mid-wave, discarding all pending waits.
    pub fn halt(&mut self) {
        if matches!(self.stage, Stage::Wave(_) | Stage::HordeClear) {
            tracing::debug!(horde = self.horde_index, "halting scheduler mid-horde");
            self.stage = Stage::Idle;
        }
    }

    /// Records a spawned entity in the active population.
    pub fn notify_spawned(&mut self, _agent: AgentId) {
        self.counters.increment_population();
    }

    /// Records a despawned entity; unmatched despawns are dropped.
    pub fn notify_despawned(&mut self, agent: AgentId) {
        if !self.counters.decrement_population() {
            tracing::warn!(
                agent = agent.get(),
                "despawn notification without matching spawn"
            );
        }
    }

    /// Current progress of the scheduler.
    #[must_use]
    pub fn status(&self) -> HordeStatus {
        match &self.stage {
            Stage::Idle => HordeStatus::NotStarted,
            Stage::Wave(runtime) => HordeStatus::Running {
                horde_index: self.horde_index,
                wave_index: runtime.wave_index,
            },
            Stage::HordeClear => HordeStatus::Clearing {
                horde_index: self.horde_index,
            },
            Stage::Done => HordeStatus::Completed,
        }
    }

    /// Number of hordes that ran to completion.
    #[must_use]
    pub const fn completed_hordes(&self) -> u32 {
        self.completed_hordes
    }

    /// Horde defeats counted locally because no health collaborator was
    /// available at finalization time.
    #[must_use]
    pub const fn fallback_defeats(&self) -> u32 {
        self.fallback_defeats
    }

    /// Spawns the pool failed to supply; each consumed its quota slot.
    #[must_use]
    pub const fn dropped_spawns(&self) -> u64 {
        self.dropped_spawns
    }

    /// Session counters shared with the navigation side.
    #[must_use]
    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    /// Advances the scheduler by one tick.
    pub fn tick<P>(
        &mut self,
        dt: Duration,
        grid: &Grid,
        pool: &mut P,
        phase: &mut dyn PhaseCoordinator,
        health: Option<&mut dyn PlayerHealth>,
    ) where
        P: SpawnPool,
    {
        let stage = std::mem::replace(&mut self.stage, Stage::Idle);
        self.stage = match stage {
            Stage::Idle => Stage::Idle,
            Stage::Done => Stage::Done,
            Stage::Wave(runtime) => self.tick_wave(runtime, dt, grid, pool),
            Stage::HordeClear => self.tick_horde_clear(phase, health),
        };
    }

    fn tick_wave<P>(
        &mut self,
        mut runtime: WaveRuntime,
        dt: Duration,
        grid: &Grid,
        pool: &mut P,
    ) -> Stage
    where
        P: SpawnPool,
    {
        match runtime.stage {
            WaveStage::Spawning => {
                let mut dt_left = dt;
                loop {
                    if runtime.cadence_remaining > dt_left {
                        runtime.cadence_remaining -= dt_left;
                        return Stage::Wave(runtime);
                    }
                    dt_left -= runtime.cadence_remaining;
                    runtime.cadence_remaining = Duration::ZERO;

                    match self.run_pass(&mut runtime, grid, pool) {
                        PassOutcome::Continue => runtime.cadence_remaining = runtime.cadence,
                        PassOutcome::Finished => return self.begin_advance(runtime),
                        PassOutcome::Aborted(error) => {
                            tracing::warn!(%error, "aborting wave spawn loop");
                            return self.begin_advance(runtime);
                        }
                    }
                }
            }
            WaveStage::AwaitingClear => {
                if self.counters.population() == 0 {
                    runtime.stage = WaveStage::Delay(runtime.advance_delay);
                }
                Stage::Wave(runtime)
            }
            WaveStage::Delay(remaining) => {
                let remaining = remaining.saturating_sub(dt);
                if remaining.is_zero() {
                    self.begin_wave(runtime.wave_index + 1, grid)
                } else {
                    runtime.stage = WaveStage::Delay(remaining);
                    Stage::Wave(runtime)
                }
            }
        }
    }

    /// One pass visits every assignment in order and spawns at most one
    /// instance per assignment: the first allowed type with quota left,
    /// allow-list order taking priority over global quota order.
    fn run_pass<P>(&mut self, runtime: &mut WaveRuntime, grid: &Grid, pool: &mut P) -> PassOutcome
    where
        P: SpawnPool,
    {
        let mut spawned_any = false;
        for assignment in &runtime.assignments {
            if runtime.total_remaining == 0 {
                break;
            }
            let Some(&quota_index) = assignment
                .allowed
                .iter()
                .find(|&&index| runtime.quotas[index].remaining > 0)
            else {
                continue;
            };

            let quota = &mut runtime.quotas[quota_index];
            let context = SpawnContext {
                position: grid.cell_to_world(assignment.cell),
                yaw: 0.0,
                spawn_cell: assignment.cell,
                spawn_offset: Vec3::ZERO,
            };
            if pool.spawn(quota.enemy, context).is_none() {
                self.dropped_spawns += 1;
                tracing::warn!(
                    enemy = quota.enemy.get(),
                    wave = runtime.wave_index,
                    "spawn pool returned no instance, dropping spawn"
                );
            }

            // A drop still consumes quota; retrying is a config decision
            // the scheduler does not make.
            quota.remaining -= 1;
            runtime.total_remaining -= 1;
            spawned_any = true;
        }

        if runtime.total_remaining == 0 {
            PassOutcome::Finished
        } else if !spawned_any {
            PassOutcome::Aborted(WaveError::SpawnCapacityExhausted {
                wave_index: runtime.wave_index,
                remaining: runtime.total_remaining,
            })
        } else {
            PassOutcome::Continue
        }
    }

    fn begin_advance(&self, mut runtime: WaveRuntime) -> Stage {
        if runtime.wave_index + 1 >= self.current_horde_wave_count() {
            // The horde-clear gate subsumes the last wave's advance wait.
            return Stage::HordeClear;
        }

        runtime.stage = match runtime.advance {
            AdvanceMode::AfterClear => WaveStage::AwaitingClear,
            AdvanceMode::FixedInterval => WaveStage::Delay(runtime.advance_delay),
        };
        Stage::Wave(runtime)
    }

    fn begin_wave(&mut self, wave_index: usize, grid: &Grid) -> Stage {
        let Some(horde) = self.hordes.get(self.horde_index) else {
            return Stage::Done;
        };
        let wave_count = horde.waves().len();
        let Some(wave) = horde.waves().get(wave_index).cloned() else {
            return Stage::HordeClear;
        };

        match resolve_wave(&wave, wave_index, grid) {
            Ok(runtime) => Stage::Wave(runtime),
            Err(error) => {
                tracing::warn!(%error, "wave could not start");
                if wave_index + 1 >= wave_count {
                    Stage::HordeClear
                } else {
                    self.begin_wave(wave_index + 1, grid)
                }
            }
        }
    }

    fn tick_horde_clear(
        &mut self,
        phase: &mut dyn PhaseCoordinator,
        health: Option<&mut dyn PlayerHealth>,
    ) -> Stage {
        if self.counters.population() != 0 {
            return Stage::HordeClear;
        }

        match health {
            Some(health) => health.register_horde_defeat(),
            None => self.fallback_defeats += 1,
        }
        self.completed_hordes += 1;

        if self.horde_index + 1 < self.hordes.len() {
            self.horde_index += 1;
            phase.force_build_phase();
            Stage::Idle
        } else {
            phase.declare_victory();
            Stage::Done
        }
    }

    fn current_horde_wave_count(&self) -> usize {
        self.hordes
            .get(self.horde_index)
            .map_or(0, |horde| horde.waves().len())
    }
}

/// Resolves a wave definition into runtime state.
///
/// Quotas normalize through the tagged enemy source. Explicit assignments
/// have their allowed-type indices clamped to the quota list bounds, with
/// an emptied list defaulting back to allow-all; a wave without explicit
/// assignments derives one unrestricted assignment per grid spawn cell.
fn resolve_wave(
    wave: &WaveDefinition,
    wave_index: usize,
    grid: &Grid,
) -> Result<WaveRuntime, WaveError> {
    let quotas: Vec<QuotaState> = wave
        .enemies()
        .normalized()
        .iter()
        .map(|quota| QuotaState {
            enemy: quota.enemy(),
            remaining: quota.count(),
        })
        .collect();
    let total_remaining = quotas.iter().map(|quota| quota.remaining).sum();

    let assignments: Vec<ResolvedAssignment> = if wave.assignments().is_empty() {
        grid.enemy_spawn_cells()
            .into_iter()
            .map(|cell| ResolvedAssignment {
                cell,
                allowed: (0..quotas.len()).collect(),
            })
            .collect()
    } else {
        wave.assignments()
            .iter()
            .map(|assignment| {
                let mut allowed: Vec<usize> = assignment
                    .allowed_types()
                    .iter()
                    .copied()
                    .filter(|&index| index < quotas.len())
                    .collect();
                if allowed.is_empty() {
                    allowed = (0..quotas.len()).collect();
                }
                ResolvedAssignment {
                    cell: assignment.spawn_cell(),
                    allowed,
                }
            })
            .collect()
    };

    if assignments.is_empty() && total_remaining > 0 {
        return Err(WaveError::NoSpawnAssignments { wave_index });
    }

    Ok(WaveRuntime {
        wave_index,
        quotas,
        assignments,
        total_remaining,
        cadence: wave.cadence(),
        advance: wave.advance(),
        advance_delay: wave.advance_delay(),
        cadence_remaining: Duration::ZERO,
        stage: WaveStage::Spawning,
    })
}
