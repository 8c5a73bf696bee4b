#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Gate Defence session.
//!
//! The adapter owns everything the core treats as external: it generates a
//! scenario (or decodes a transferred one), plays the pooling collaborator
//! by materializing navigation agents, relays lifecycle notifications, and
//! simulates the build/defence phase coordinator with a fixed build pause
//! between hordes.

mod scenario_transfer;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gate_defence_core::{
    config::{
        AdvanceMode, EnemyQuota, HordeDefinition, SpawnAssignment, WaveDefinition, WaveEnemySource,
    },
    counters::SessionCounters,
    AgentId, CellCoord, CellState, EnemyTypeId, GamePhase, PhaseCoordinator, PlayerHealth,
    SpawnContext, SpawnPool, WELCOME_BANNER,
};
use gate_defence_system_hordes::HordesManager;
use gate_defence_system_navigation::{AgentStats, NavAgent, Navigation};
use gate_defence_world::{
    pathing::{PathPlanner, UNREACHABLE},
    Grid,
};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use crate::scenario_transfer::ScenarioSnapshot;

const SWARMER: EnemyTypeId = EnemyTypeId::new(0);
const BRUTE: EnemyTypeId = EnemyTypeId::new(1);

const BUILD_PAUSE: Duration = Duration::from_secs(1);
const GENERATION_ATTEMPTS: u64 = 16;

/// Headless Gate Defence session runner.
#[derive(Debug, Parser)]
#[command(name = "gate-defence")]
struct Args {
    /// Number of grid columns.
    #[arg(long, default_value_t = 12)]
    columns: u32,
    /// Number of grid rows.
    #[arg(long, default_value_t = 8)]
    rows: u32,
    /// Fraction of interior cells blocked by obstacles.
    #[arg(long, default_value_t = 0.12)]
    obstacle_density: f64,
    /// Seed for deterministic scenario generation.
    #[arg(long, default_value_t = 0x4d59_5df4)]
    seed: u64,
    /// Number of hordes in the campaign.
    #[arg(long, default_value_t = 2)]
    hordes: usize,
    /// Simulated tick length in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
    /// Upper bound on simulated seconds before the session gives up.
    #[arg(long, default_value_t = 600)]
    max_seconds: u64,
    /// Encoded scenario string to run instead of generating one.
    #[arg(long)]
    scenario: Option<String>,
    /// Print the scenario as a transfer string and exit without running.
    #[arg(long, default_value_t = false)]
    export_scenario: bool,
}

/// Entry point for the Gate Defence command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    println!("{WELCOME_BANNER}");

    let scenario = match &args.scenario {
        Some(encoded) => {
            ScenarioSnapshot::decode(encoded).context("decoding the scenario string")?
        }
        None => generate_scenario(&args)?,
    };

    if args.export_scenario {
        println!("{}", scenario.encode());
        return Ok(());
    }

    run_session(&args, scenario)
}

#[derive(Default)]
struct QueuePool {
    next_id: u32,
    pending: Vec<(AgentId, EnemyTypeId, SpawnContext)>,
}

impl SpawnPool for QueuePool {
    fn spawn(&mut self, enemy: EnemyTypeId, context: SpawnContext) -> Option<AgentId> {
        self.next_id += 1;
        let id = AgentId::new(self.next_id);
        self.pending.push((id, enemy, context));
        Some(id)
    }
}

struct CliPhase {
    current: GamePhase,
    victory: bool,
}

impl PhaseCoordinator for CliPhase {
    fn phase(&self) -> GamePhase {
        self.current
    }

    fn force_build_phase(&mut self) {
        tracing::info!("horde cleared, returning to the build phase");
        self.current = GamePhase::Build;
    }

    fn declare_victory(&mut self) {
        tracing::info!("all hordes defeated");
        self.victory = true;
    }
}

#[derive(Default)]
struct CliHealth {
    defeats: u32,
}

impl PlayerHealth for CliHealth {
    fn register_horde_defeat(&mut self) {
        self.defeats += 1;
        tracing::info!(defeats = self.defeats, "horde ran its full course");
    }
}

fn run_session(args: &Args, scenario: ScenarioSnapshot) -> Result<()> {
    let grid = build_grid(&scenario)?;
    warn_on_unreachable_spawns(&grid);

    let counters = Arc::new(SessionCounters::new());
    let mut manager = HordesManager::new(scenario.hordes.clone(), Arc::clone(&counters));
    let mut navigation = Navigation::new();
    let mut planner = PathPlanner::new();
    let mut pool = QueuePool::default();
    let mut phase = CliPhase {
        current: GamePhase::Defence,
        victory: false,
    };
    let mut health = CliHealth::default();

    let tick = Duration::from_millis(args.tick_ms.max(1));
    let max_ticks = (args.max_seconds.max(1) * 1_000 / tick.as_millis() as u64) as usize;

    tracing::info!(
        columns = grid.columns(),
        rows = grid.rows(),
        hordes = scenario.hordes.len(),
        "defence begins"
    );
    manager.start_defence(&grid);

    let mut goals_reached: u64 = 0;
    let mut build_timer = Duration::ZERO;
    let mut last_status = manager.status();
    let mut elapsed_ticks = 0usize;

    for _ in 0..max_ticks {
        elapsed_ticks += 1;

        match phase.current {
            GamePhase::Build => {
                build_timer = build_timer.saturating_sub(tick);
                if build_timer.is_zero() {
                    tracing::info!("build phase over, defence begins");
                    phase.current = GamePhase::Defence;
                    manager.start_defence(&grid);
                }
            }
            GamePhase::Defence => {
                manager.tick(tick, &grid, &mut pool, &mut phase, Some(&mut health));
                if phase.current == GamePhase::Build {
                    build_timer = BUILD_PAUSE;
                }
                for (id, enemy, context) in pool.pending.drain(..) {
                    let mut agent = NavAgent::new(id, context.position, agent_stats(enemy));
                    agent.begin_movement(&grid, &mut planner, manager.counters());
                    navigation.insert(agent);
                    manager.notify_spawned(id);
                }
            }
        }

        navigation.tick(tick, &grid, &mut planner, None);
        for agent in navigation.drain_goal_reached() {
            goals_reached += 1;
            manager.notify_despawned(agent.id());
        }

        let status = manager.status();
        if status != last_status {
            tracing::info!(?status, population = counters.population(), "wave progress");
            last_status = status;
        }

        if phase.victory {
            break;
        }
    }

    if !phase.victory {
        tracing::warn!(
            status = ?manager.status(),
            "session reached the tick limit before the campaign finished"
        );
    }

    println!(
        "simulated {:.1}s: {} spawned, {} reached the gates, {} dropped, {} hordes finished",
        elapsed_ticks as f64 * tick.as_secs_f64(),
        pool.next_id,
        goals_reached,
        manager.dropped_spawns(),
        manager.completed_hordes(),
    );

    Ok(())
}

fn agent_stats(enemy: EnemyTypeId) -> AgentStats {
    let speed = if enemy == BRUTE { 1.1 } else { 1.8 };
    AgentStats {
        speed,
        ..AgentStats::default()
    }
}

fn build_grid(scenario: &ScenarioSnapshot) -> Result<Grid> {
    if scenario.goal_cells.is_empty() {
        bail!("scenario has no goal cells");
    }

    let mut grid = Grid::new(
        scenario.columns,
        scenario.rows,
        scenario.cell_length,
        Vec3::ZERO,
    );
    for (cells, state) in [
        (&scenario.spawn_cells, CellState::SPAWN),
        (&scenario.goal_cells, CellState::GOAL),
        (&scenario.blocked_cells, CellState::BLOCKED),
    ] {
        for &cell in cells.iter() {
            if !grid.insert_state(cell, state) {
                bail!(
                    "scenario cell ({}, {}) lies outside the {}x{} grid",
                    cell.column(),
                    cell.row(),
                    scenario.columns,
                    scenario.rows,
                );
            }
        }
    }

    Ok(grid)
}

fn warn_on_unreachable_spawns(grid: &Grid) {
    let mut planner = PathPlanner::new();
    let field = planner.field(grid);
    for spawn in grid.enemy_spawn_cells() {
        if field.distance(spawn) == Some(UNREACHABLE) {
            tracing::warn!(
                column = spawn.column(),
                row = spawn.row(),
                "spawn cell cannot reach any goal; its enemies will idle"
            );
        }
    }
}

fn generate_scenario(args: &Args) -> Result<ScenarioSnapshot> {
    if args.columns < 4 || args.rows < 2 {
        bail!("scenario generation needs a grid of at least 4x2");
    }
    if !(0.0..=0.6).contains(&args.obstacle_density) {
        bail!("obstacle density must lie within 0.0..=0.6");
    }

    for attempt in 0..GENERATION_ATTEMPTS {
        let seed = args.seed.wrapping_add(attempt);
        let scenario = generate_with_seed(args, seed);
        if scenario_is_reachable(&scenario)? {
            if attempt > 0 {
                tracing::debug!(attempt, seed, "regenerated scenario for reachability");
            }
            return Ok(scenario);
        }
    }

    bail!("could not generate a fully reachable scenario in {GENERATION_ATTEMPTS} attempts")
}

fn generate_with_seed(args: &Args, seed: u64) -> ScenarioSnapshot {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let spawn_cells: Vec<CellCoord> = (0..args.rows)
        .step_by(2)
        .map(|row| CellCoord::new(0, row))
        .collect();

    let middle = args.rows / 2;
    let mut goal_cells = vec![CellCoord::new(args.columns - 1, middle)];
    if middle > 0 {
        goal_cells.push(CellCoord::new(args.columns - 1, middle - 1));
    }

    let mut blocked_cells = Vec::new();
    for column in 1..args.columns.saturating_sub(1) {
        for row in 0..args.rows {
            if rng.gen_bool(args.obstacle_density) {
                blocked_cells.push(CellCoord::new(column, row));
            }
        }
    }

    ScenarioSnapshot {
        columns: args.columns,
        rows: args.rows,
        cell_length: 1.0,
        spawn_cells: spawn_cells.clone(),
        goal_cells,
        blocked_cells,
        hordes: campaign(args.hordes, &spawn_cells),
    }
}

fn scenario_is_reachable(scenario: &ScenarioSnapshot) -> Result<bool> {
    let grid = build_grid(scenario)?;
    let mut planner = PathPlanner::new();
    let field = planner.field(&grid);
    Ok(grid
        .enemy_spawn_cells()
        .iter()
        .all(|&spawn| field.distance(spawn) != Some(UNREACHABLE)))
}

fn campaign(hordes: usize, spawn_cells: &[CellCoord]) -> Vec<HordeDefinition> {
    (0..hordes)
        .map(|index| {
            let surge = index as u32;
            let opener = WaveDefinition::new(
                WaveEnemySource::Explicit(vec![
                    EnemyQuota::new(SWARMER, 4 + 2 * surge),
                    EnemyQuota::new(BRUTE, 1 + surge),
                ]),
                spawn_cells
                    .iter()
                    .enumerate()
                    .map(|(position, &cell)| {
                        // Alternate gates restricted to swarmers, the rest open.
                        let allowed = if position % 2 == 0 { vec![0] } else { Vec::new() };
                        SpawnAssignment::new(cell, allowed)
                    })
                    .collect(),
                Duration::from_millis(400),
                AdvanceMode::AfterClear,
                Duration::from_millis(800),
            );
            let closer = WaveDefinition::new(
                WaveEnemySource::Legacy(EnemyQuota::new(BRUTE, 2 + surge)),
                Vec::new(),
                Duration::from_millis(600),
                AdvanceMode::FixedInterval,
                Duration::from_millis(400),
            );
            HordeDefinition::new(vec![opener, closer])
        })
        .collect()
}
