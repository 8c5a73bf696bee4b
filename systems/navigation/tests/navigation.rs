use std::time::Duration;

use gate_defence_core::{
    counters::SessionCounters, AgentId, CellCoord, CellState, SpawnOrder,
};
use gate_defence_system_navigation::{AgentState, AgentStats, NavAgent, Navigation};
use gate_defence_world::{pathing::PathPlanner, Grid};
use glam::Vec3;

const TICK: Duration = Duration::from_millis(50);

fn grid_with_goal(columns: u32, rows: u32, goal: CellCoord) -> Grid {
    let mut grid = Grid::with_dimensions(columns, rows);
    assert!(grid.insert_state(goal, CellState::GOAL));
    grid
}

fn agent_at(id: u32, grid: &Grid, cell: CellCoord) -> NavAgent {
    NavAgent::new(
        AgentId::new(id),
        grid.cell_to_world(cell),
        AgentStats::default(),
    )
}

fn run_until_cleared(
    navigation: &mut Navigation,
    grid: &Grid,
    planner: &mut PathPlanner,
    max_ticks: usize,
) -> Vec<AgentId> {
    let mut reached = Vec::new();
    for _ in 0..max_ticks {
        navigation.tick(TICK, grid, planner, None);
        reached.extend(
            navigation
                .drain_goal_reached()
                .into_iter()
                .map(|agent| agent.id()),
        );
        if navigation.is_empty() {
            break;
        }
    }
    reached
}

#[test]
fn spawn_orders_stay_monotonic_across_external_assignments() {
    let grid = grid_with_goal(4, 1, CellCoord::new(3, 0));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();

    let mut first = agent_at(1, &grid, CellCoord::new(0, 0));
    first.begin_movement(&grid, &mut planner, &counters);
    assert_eq!(first.spawn_order(), Some(SpawnOrder::new(1)));

    // Externally assigned order ahead of the counter advances it.
    let mut second = agent_at(2, &grid, CellCoord::new(0, 0)).with_spawn_order(SpawnOrder::new(5));
    second.begin_movement(&grid, &mut planner, &counters);
    assert_eq!(second.spawn_order(), Some(SpawnOrder::new(5)));

    let mut third = agent_at(3, &grid, CellCoord::new(0, 0));
    third.begin_movement(&grid, &mut planner, &counters);
    assert_eq!(third.spawn_order(), Some(SpawnOrder::new(6)));

    // An external order behind the counter must not cause future draws to
    // collide with already-issued orders.
    let mut fourth = agent_at(4, &grid, CellCoord::new(0, 0)).with_spawn_order(SpawnOrder::new(2));
    fourth.begin_movement(&grid, &mut planner, &counters);

    let mut fifth = agent_at(5, &grid, CellCoord::new(0, 0));
    fifth.begin_movement(&grid, &mut planner, &counters);
    assert_eq!(fifth.spawn_order(), Some(SpawnOrder::new(7)));
}

#[test]
fn empty_path_leaves_the_agent_idle() {
    let mut grid = grid_with_goal(5, 1, CellCoord::new(4, 0));
    assert!(grid.insert_state(CellCoord::new(2, 0), CellState::BLOCKED));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();

    let mut agent = agent_at(1, &grid, CellCoord::new(0, 0));
    agent.begin_movement(&grid, &mut planner, &counters);

    assert_eq!(agent.state(), AgentState::Idle);
    assert!(agent.spawn_order().is_some(), "order assigned regardless");
}

#[test]
fn agent_walks_the_corridor_to_the_goal() {
    let grid = grid_with_goal(6, 1, CellCoord::new(5, 0));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();
    let mut navigation = Navigation::new();

    let mut agent = agent_at(1, &grid, CellCoord::new(0, 0));
    agent.begin_movement(&grid, &mut planner, &counters);
    assert_eq!(agent.state(), AgentState::Traveling);
    navigation.insert(agent);

    let reached = run_until_cleared(&mut navigation, &grid, &mut planner, 400);
    assert_eq!(reached, vec![AgentId::new(1)]);
}

#[test]
fn earlier_spawned_agent_wins_the_contested_cell() {
    let grid = grid_with_goal(3, 3, CellCoord::new(1, 1));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();
    let mut navigation = Navigation::new();

    let mut first = agent_at(1, &grid, CellCoord::new(0, 1));
    first.begin_movement(&grid, &mut planner, &counters);
    let mut second = agent_at(2, &grid, CellCoord::new(2, 1));
    second.begin_movement(&grid, &mut planner, &counters);
    navigation.insert(second);
    navigation.insert(first);

    let mut reached = Vec::new();
    for _ in 0..600 {
        navigation.tick(TICK, &grid, &mut planner, None);
        reached.extend(
            navigation
                .drain_goal_reached()
                .into_iter()
                .map(|agent| agent.id()),
        );
        if navigation.is_empty() {
            break;
        }
    }

    // Both agents eventually clear the contested cell; the earlier spawn
    // arrives first and the later one yields instead of deadlocking.
    assert_eq!(reached, vec![AgentId::new(1), AgentId::new(2)]);
}

#[test]
fn spawn_cells_are_exempt_from_occupancy_yielding() {
    let mut grid = grid_with_goal(4, 1, CellCoord::new(3, 0));
    assert!(grid.insert_state(CellCoord::new(1, 0), CellState::SPAWN));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();
    let mut navigation = Navigation::new();

    // An earlier-spawned agent squats on the spawn cell and never moves.
    let squatter =
        agent_at(1, &grid, CellCoord::new(1, 0)).with_spawn_order(SpawnOrder::new(1));
    counters.adopt_spawn_order(SpawnOrder::new(1));
    navigation.insert(squatter);

    let mut leaver = agent_at(2, &grid, CellCoord::new(0, 0));
    leaver.begin_movement(&grid, &mut planner, &counters);
    navigation.insert(leaver);

    let reached = run_until_cleared(&mut navigation, &grid, &mut planner, 400);
    assert!(
        reached.contains(&AgentId::new(2)),
        "a crowded spawn tile must not block agents leaving through it"
    );
}

#[test]
fn topology_change_replans_around_new_walls() {
    let mut grid = grid_with_goal(5, 2, CellCoord::new(4, 0));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();
    let mut navigation = Navigation::new();

    let mut agent = agent_at(1, &grid, CellCoord::new(0, 0));
    agent.begin_movement(&grid, &mut planner, &counters);
    navigation.insert(agent);

    // A wall lands on the straight route; the external placement system
    // triggers the replan.
    assert!(grid.insert_state(CellCoord::new(2, 0), CellState::BLOCKED));
    navigation
        .get_mut(AgentId::new(1))
        .expect("agent alive")
        .request_replan(&grid, &mut planner);

    let reached = run_until_cleared(&mut navigation, &grid, &mut planner, 600);
    assert_eq!(reached, vec![AgentId::new(1)]);
}

#[test]
fn spawn_height_offset_is_preserved_along_the_path() {
    let grid = grid_with_goal(5, 1, CellCoord::new(4, 0));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();

    let start = grid.cell_to_world(CellCoord::new(0, 0)) + Vec3::Y * 0.75;
    let mut agent = NavAgent::new(AgentId::new(1), start, AgentStats::default());
    agent.begin_movement(&grid, &mut planner, &counters);

    let mut navigation = Navigation::new();
    navigation.insert(agent);

    for _ in 0..40 {
        navigation.tick(TICK, &grid, &mut planner, None);
        if let Some(agent) = navigation.get(AgentId::new(1)) {
            assert!(
                (agent.position().y - 0.75).abs() < 1e-3,
                "flying offset must survive waypoint stepping"
            );
        }
        let _ = navigation.drain_goal_reached();
    }
}

#[test]
fn contact_lock_suspends_until_timer_and_range_clear() {
    let grid = grid_with_goal(6, 1, CellCoord::new(5, 0));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();
    let mut navigation = Navigation::new();

    let mut agent = agent_at(1, &grid, CellCoord::new(0, 0));
    agent.begin_movement(&grid, &mut planner, &counters);
    navigation.insert(agent);

    navigation.tick(TICK, &grid, &mut planner, None);
    let locked_position = {
        let agent = navigation.get_mut(AgentId::new(1)).expect("agent alive");
        agent.begin_contact_lock(Duration::from_millis(200));
        agent.position()
    };

    // Target parked on top of the agent: range keeps the lock alive long
    // after the timer has expired.
    for _ in 0..20 {
        navigation.tick(TICK, &grid, &mut planner, Some(locked_position));
    }
    let agent = navigation.get(AgentId::new(1)).expect("agent alive");
    assert_eq!(agent.state(), AgentState::ContactLocked);
    assert!(agent.position().distance(locked_position) < 1e-3);

    // Target retreats; the lock releases and travel resumes.
    for _ in 0..5 {
        navigation.tick(TICK, &grid, &mut planner, Some(Vec3::new(50.0, 0.0, 50.0)));
    }
    let agent = navigation.get(AgentId::new(1)).expect("agent alive");
    assert_eq!(agent.state(), AgentState::Traveling);
}

#[test]
fn removing_an_agent_mid_travel_leaves_nothing_behind() {
    let grid = grid_with_goal(6, 1, CellCoord::new(5, 0));
    let mut planner = PathPlanner::new();
    let counters = SessionCounters::new();
    let mut navigation = Navigation::new();

    let mut agent = agent_at(1, &grid, CellCoord::new(0, 0));
    agent.begin_movement(&grid, &mut planner, &counters);
    navigation.insert(agent);

    for _ in 0..5 {
        navigation.tick(TICK, &grid, &mut planner, None);
    }

    let removed = navigation.remove(AgentId::new(1)).expect("agent alive");
    assert!(!removed.has_reached_goal());
    assert!(navigation.is_empty());

    // Ticking an empty system after cancellation is a clean no-op.
    navigation.tick(TICK, &grid, &mut planner, None);
    assert!(navigation.drain_goal_reached().is_empty());
}
