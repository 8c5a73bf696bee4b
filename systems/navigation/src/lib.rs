#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Occupancy-aware navigation agents that walk planner paths.
//!
//! Every spawned enemy owns exactly one [`NavAgent`] with at most one
//! in-flight path. Agents advance autonomously each tick, yield occupied
//! waypoints to earlier-spawned agents, and replan locally when blocked.
//! The [`Navigation`] system ticks all agents against the occupancy
//! snapshot captured at the start of the tick, in ascending spawn order,
//! so no agent ever observes a partially updated position.

use std::time::Duration;

use gate_defence_core::{
    counters::SessionCounters, AgentContact, AgentId, CellState, SpawnOrder, SpatialQuery,
};
use gate_defence_world::{
    pathing::{Path, PathPlanner},
    Grid,
};
use glam::Vec3;

/// Movement parameters applied to one agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentStats {
    /// Base travel speed in world units per second.
    pub speed: f32,
    /// Exponential smoothing rate for speed changes.
    pub lerp_speed: f32,
    /// Maximum facing rotation rate in radians per second.
    pub angular_rate: f32,
    /// Distance at which a waypoint counts as reached.
    pub waypoint_tolerance: f32,
    /// Probe radius around the next waypoint for occupancy checks.
    pub occupancy_radius: f32,
    /// Minimum interval between successive replans.
    pub replan_cooldown: Duration,
    /// Distance at which an interactive target keeps the agent locked.
    pub contact_range: f32,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            speed: 1.6,
            lerp_speed: 8.0,
            angular_rate: std::f32::consts::TAU,
            waypoint_tolerance: 0.1,
            occupancy_radius: 0.35,
            replan_cooldown: Duration::from_millis(350),
            contact_range: 1.2,
        }
    }
}

/// Externally observable state of a navigation agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    /// No path is held; the agent waits for an external trigger.
    Idle,
    /// The agent advances along its path.
    Traveling,
    /// Movement is suspended near an interactive target.
    ContactLocked,
    /// The next waypoint was occupied; a fresh path is pending cooldown.
    Replanning,
}

#[derive(Clone, Copy, Debug)]
struct SlowEffect {
    multiplier: f32,
    remaining: Duration,
}

/// Per-enemy navigation state machine.
#[derive(Debug)]
pub struct NavAgent {
    id: AgentId,
    stats: AgentStats,
    position: Vec3,
    yaw: f32,
    current_speed: f32,
    height_offset: f32,
    spawn_order: Option<SpawnOrder>,
    state: AgentState,
    path: Option<Path>,
    cursor: usize,
    slow: Option<SlowEffect>,
    contact_remaining: Duration,
    replan_wait: Duration,
    reached_goal: bool,
}

impl NavAgent {
    /// Creates an idle agent at the provided world position.
    #[must_use]
    pub fn new(id: AgentId, position: Vec3, stats: AgentStats) -> Self {
        Self {
            id,
            stats,
            position,
            yaw: 0.0,
            current_speed: 0.0,
            height_offset: 0.0,
            spawn_order: None,
            state: AgentState::Idle,
            path: None,
            cursor: 0,
            slow: None,
            contact_remaining: Duration::ZERO,
            replan_wait: Duration::ZERO,
            reached_goal: false,
        }
    }

    /// Pre-assigns a spawn order issued by an external system.
    #[must_use]
    pub fn with_spawn_order(mut self, order: SpawnOrder) -> Self {
        self.spawn_order = Some(order);
        self
    }

    /// Identifier of the agent.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Current world-space position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Current facing expressed as yaw in radians.
    #[must_use]
    pub const fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Current state of the movement machine.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Spawn order held by the agent, once movement has begun.
    #[must_use]
    pub const fn spawn_order(&self) -> Option<SpawnOrder> {
        self.spawn_order
    }

    /// Reports whether the agent walked its path to the end.
    #[must_use]
    pub const fn has_reached_goal(&self) -> bool {
        self.reached_goal
    }

    /// Effective speed multiplier from active slow effects.
    #[must_use]
    pub fn slow_multiplier(&self) -> f32 {
        self.slow.map_or(1.0, |slow| slow.multiplier)
    }

    /// Starts the agent moving toward the nearest goal.
    ///
    /// Assigns the spawn order: a pre-assigned order is kept and folded
    /// into the shared counter so later draws stay ahead of it; otherwise
    /// a fresh order is drawn. An empty path leaves the agent idle, which
    /// is a valid "cannot currently reach any goal" outcome.
    pub fn begin_movement(
        &mut self,
        grid: &Grid,
        planner: &mut PathPlanner,
        counters: &SessionCounters,
    ) {
        match self.spawn_order {
            Some(order) => counters.adopt_spawn_order(order),
            None => self.spawn_order = Some(counters.next_spawn_order()),
        }

        match planner.try_build_path_to_closest_goal(grid, self.position) {
            Some(path) if !path.is_empty() => {
                self.height_offset = self.position.y - path.waypoints()[0].y;
                self.adopt_path(path);
            }
            _ => {
                tracing::debug!(agent = self.id.get(), "no goal reachable, staying idle");
                self.state = AgentState::Idle;
                self.path = None;
            }
        }
    }

    /// Externally triggered replan, used after grid topology changes.
    pub fn request_replan(&mut self, grid: &Grid, planner: &mut PathPlanner) {
        match planner.try_build_path_to_closest_goal(grid, self.position) {
            Some(path) if !path.is_empty() => self.adopt_path(path),
            _ => {
                self.state = AgentState::Idle;
                self.path = None;
            }
        }
    }

    /// Applies a temporary slow as a fraction of speed removed.
    ///
    /// Concurrent slows do not stack: the strongest multiplier wins, and a
    /// weaker request only extends the timer when its multiplier matches
    /// the active one.
    pub fn apply_slow(&mut self, percent: f32, duration: Duration) {
        let multiplier = (1.0 - percent).clamp(0.0, 1.0);
        match &mut self.slow {
            Some(active) => {
                if multiplier < active.multiplier {
                    active.multiplier = multiplier;
                    active.remaining = duration;
                } else if (multiplier - active.multiplier).abs() < f32::EPSILON {
                    active.remaining = active.remaining.max(duration);
                }
            }
            None => {
                self.slow = Some(SlowEffect {
                    multiplier,
                    remaining: duration,
                });
            }
        }
    }

    /// Suspends movement near an interactive target for at least
    /// `duration`; the lock is re-evaluated every tick and only releases
    /// once the timer elapsed and the target left contact range.
    pub fn begin_contact_lock(&mut self, duration: Duration) {
        self.contact_remaining = self.contact_remaining.max(duration);
        self.state = AgentState::ContactLocked;
        self.current_speed = 0.0;
    }

    /// Advances the agent by one tick.
    pub fn update<S>(
        &mut self,
        dt: Duration,
        grid: &Grid,
        planner: &mut PathPlanner,
        occupancy: &S,
        contact_target: Option<Vec3>,
    ) where
        S: SpatialQuery + ?Sized,
    {
        self.tick_slow(dt);
        self.replan_wait = self.replan_wait.saturating_sub(dt);

        match self.state {
            AgentState::Idle => {}
            AgentState::ContactLocked => self.update_contact_lock(dt, contact_target),
            AgentState::Replanning => self.update_replanning(grid, planner),
            AgentState::Traveling => self.update_traveling(dt, grid, planner, occupancy),
        }
    }

    fn tick_slow(&mut self, dt: Duration) {
        if let Some(slow) = &mut self.slow {
            slow.remaining = slow.remaining.saturating_sub(dt);
            if slow.remaining.is_zero() {
                self.slow = None;
            }
        }
    }

    fn update_contact_lock(&mut self, dt: Duration, contact_target: Option<Vec3>) {
        self.contact_remaining = self.contact_remaining.saturating_sub(dt);
        let target_in_range = contact_target.is_some_and(|target| {
            self.position.distance(target) <= self.stats.contact_range
        });
        if self.contact_remaining.is_zero() && !target_in_range {
            self.state = if self.path.is_some() {
                AgentState::Traveling
            } else {
                AgentState::Idle
            };
        }
    }

    fn update_replanning(&mut self, grid: &Grid, planner: &mut PathPlanner) {
        if !self.replan_wait.is_zero() {
            return;
        }

        self.replan_wait = self.stats.replan_cooldown;
        match planner.try_build_path_to_closest_goal(grid, self.position) {
            Some(path) if !path.is_empty() => self.adopt_path(path),
            _ => {
                tracing::debug!(agent = self.id.get(), "replan found no path, going idle");
                self.state = AgentState::Idle;
                self.path = None;
            }
        }
    }

    fn update_traveling<S>(
        &mut self,
        dt: Duration,
        grid: &Grid,
        planner: &mut PathPlanner,
        occupancy: &S,
    ) where
        S: SpatialQuery + ?Sized,
    {
        let Some(target) = self.advance_cursor() else {
            return;
        };

        if self.next_waypoint_blocked(grid, occupancy) {
            self.current_speed = 0.0;
            if self.replan_wait.is_zero() {
                self.update_replanning(grid, planner);
            } else {
                self.state = AgentState::Replanning;
            }
            return;
        }

        self.step_toward(target, dt);
    }

    /// Advances past reached waypoints and returns the current target,
    /// lifted by the agent's spawn-time height offset.
    fn advance_cursor(&mut self) -> Option<Vec3> {
        loop {
            let waypoint = self
                .path
                .as_ref()?
                .waypoints()
                .get(self.cursor)
                .copied();
            let Some(waypoint) = waypoint else {
                self.finish_path();
                return None;
            };

            let target = waypoint + Vec3::Y * self.height_offset;
            if self.position.distance(target) <= self.stats.waypoint_tolerance {
                self.cursor += 1;
                continue;
            }
            return Some(target);
        }
    }

    fn finish_path(&mut self) {
        self.path = None;
        self.cursor = 0;
        self.reached_goal = true;
        self.state = AgentState::Idle;
        self.current_speed = 0.0;
    }

    /// An agent yields the next waypoint only to earlier-spawned agents;
    /// spawn cells are exempt so crowded gates always drain.
    fn next_waypoint_blocked<S>(&self, grid: &Grid, occupancy: &S) -> bool
    where
        S: SpatialQuery + ?Sized,
    {
        let Some(path) = self.path.as_ref() else {
            return false;
        };
        let Some(&waypoint) = path.waypoints().get(self.cursor) else {
            return false;
        };

        if let Some(cell) = grid.try_world_to_cell(waypoint) {
            if grid
                .state(cell)
                .is_some_and(|state| state.contains(CellState::SPAWN))
            {
                return false;
            }
        }

        let Some(own_order) = self.spawn_order else {
            return false;
        };

        occupancy
            .query_nearby(waypoint, self.stats.occupancy_radius)
            .iter()
            .any(|contact| contact.agent != self.id && contact.spawn_order < own_order)
    }

    fn step_toward(&mut self, target: Vec3, dt: Duration) {
        let dt_secs = dt.as_secs_f32();
        if dt_secs <= 0.0 {
            return;
        }

        let target_speed = self.stats.speed * self.slow_multiplier();
        let factor = 1.0 - (-self.stats.lerp_speed * dt_secs).exp();
        self.current_speed += (target_speed - self.current_speed) * factor;

        let to_target = target - self.position;
        let distance = to_target.length();
        if distance <= f32::EPSILON {
            return;
        }

        let direction = to_target / distance;
        let step = self.current_speed * dt_secs;
        self.position = if step >= distance {
            target
        } else {
            self.position + direction * step
        };

        self.rotate_toward(direction, dt_secs);
    }

    fn rotate_toward(&mut self, direction: Vec3, dt_secs: f32) {
        if direction.x.abs() <= f32::EPSILON && direction.z.abs() <= f32::EPSILON {
            return;
        }

        let desired = direction.x.atan2(direction.z);
        let delta = wrap_angle(desired - self.yaw);
        let max_turn = self.stats.angular_rate * dt_secs;
        self.yaw = wrap_angle(self.yaw + delta.clamp(-max_turn, max_turn));
    }

    fn adopt_path(&mut self, path: Path) {
        self.path = Some(path);
        self.cursor = 0;
        self.state = AgentState::Traveling;
    }
}

/// System owning all live agents and the per-tick update order.
#[derive(Debug, Default)]
pub struct Navigation {
    agents: Vec<NavAgent>,
}

impl Navigation {
    /// Creates a system with no agents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Reports whether no agents are alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Inserts an agent into the system.
    pub fn insert(&mut self, agent: NavAgent) {
        self.agents.push(agent);
    }

    /// Removes and returns the agent with the provided identifier.
    pub fn remove(&mut self, id: AgentId) -> Option<NavAgent> {
        let index = self.agents.iter().position(|agent| agent.id() == id)?;
        Some(self.agents.remove(index))
    }

    /// Shared access to an agent by identifier.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&NavAgent> {
        self.agents.iter().find(|agent| agent.id() == id)
    }

    /// Mutable access to an agent by identifier.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut NavAgent> {
        self.agents.iter_mut().find(|agent| agent.id() == id)
    }

    /// Iterator over all live agents.
    pub fn iter(&self) -> impl Iterator<Item = &NavAgent> {
        self.agents.iter()
    }

    /// Captures the occupancy snapshot used for this tick's decisions.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        let contacts = self
            .agents
            .iter()
            .filter_map(|agent| {
                agent.spawn_order().map(|spawn_order| AgentContact {
                    agent: agent.id(),
                    position: agent.position(),
                    spawn_order,
                })
            })
            .collect();
        AgentSnapshot { contacts }
    }

    /// Ticks every agent against a consistent start-of-tick snapshot.
    ///
    /// Agents are processed in ascending spawn order so earlier-spawned
    /// agents commit their movement first; combined with the snapshot this
    /// keeps blocking decisions independent of insertion order.
    pub fn tick(
        &mut self,
        dt: Duration,
        grid: &Grid,
        planner: &mut PathPlanner,
        contact_target: Option<Vec3>,
    ) {
        self.agents
            .sort_by_key(|agent| (agent.spawn_order(), agent.id()));
        let snapshot = self.snapshot();

        for agent in &mut self.agents {
            agent.update(dt, grid, planner, &snapshot, contact_target);
        }
    }

    /// Removes and returns every agent that finished its path.
    ///
    /// Goal triggers, scoring, and despawn notifications belong to the
    /// external entity lifecycle; it consumes the drained agents.
    pub fn drain_goal_reached(&mut self) -> Vec<NavAgent> {
        let mut reached = Vec::new();
        let mut index = 0;
        while index < self.agents.len() {
            if self.agents[index].has_reached_goal() {
                reached.push(self.agents.remove(index));
            } else {
                index += 1;
            }
        }
        reached
    }
}

/// Brute-force occupancy index over the agents captured at tick start.
#[derive(Clone, Debug)]
pub struct AgentSnapshot {
    contacts: Vec<AgentContact>,
}

impl SpatialQuery for AgentSnapshot {
    fn query_nearby(&self, position: Vec3, radius: f32) -> Vec<AgentContact> {
        self.contacts
            .iter()
            .filter(|contact| contact.position.distance(position) <= radius)
            .copied()
            .collect()
    }
}

fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut wrapped = angle % TAU;
    if wrapped > PI {
        wrapped -= TAU;
    } else if wrapped < -PI {
        wrapped += TAU;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_agent() -> NavAgent {
        NavAgent::new(AgentId::new(1), Vec3::ZERO, AgentStats::default())
    }

    #[test]
    fn stronger_slow_replaces_weaker_one() {
        let mut agent = test_agent();
        agent.apply_slow(0.2, Duration::from_secs(5));
        assert!((agent.slow_multiplier() - 0.8).abs() < f32::EPSILON);

        agent.apply_slow(0.5, Duration::from_secs(2));
        assert!((agent.slow_multiplier() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn weaker_slow_neither_replaces_nor_extends() {
        let mut agent = test_agent();
        agent.apply_slow(0.5, Duration::from_secs(2));
        agent.apply_slow(0.3, Duration::from_secs(1));

        assert!((agent.slow_multiplier() - 0.5).abs() < f32::EPSILON);
        let slow = agent.slow.expect("slow active");
        assert_eq!(slow.remaining, Duration::from_secs(2));
    }

    #[test]
    fn equal_slow_extends_the_timer() {
        let mut agent = test_agent();
        agent.apply_slow(0.5, Duration::from_secs(2));
        agent.apply_slow(0.5, Duration::from_secs(6));

        let slow = agent.slow.expect("slow active");
        assert_eq!(slow.remaining, Duration::from_secs(6));
    }

    #[test]
    fn slow_expires_back_to_unit_multiplier() {
        let mut agent = test_agent();
        agent.apply_slow(0.4, Duration::from_millis(300));

        agent.tick_slow(Duration::from_millis(200));
        assert!((agent.slow_multiplier() - 0.6).abs() < f32::EPSILON);

        agent.tick_slow(Duration::from_millis(200));
        assert!((agent.slow_multiplier() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn wrap_angle_stays_within_half_turn() {
        use std::f32::consts::PI;
        assert!((wrap_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-5);
        assert!((wrap_angle(-2.5 * PI) + 0.5 * PI).abs() < 1e-5);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn contact_lock_holds_while_target_in_range() {
        let mut agent = test_agent();
        agent.begin_contact_lock(Duration::from_millis(500));
        assert_eq!(agent.state(), AgentState::ContactLocked);

        // Timer expires but the target is still inside contact range.
        agent.update_contact_lock(Duration::from_secs(1), Some(Vec3::new(0.5, 0.0, 0.0)));
        assert_eq!(agent.state(), AgentState::ContactLocked);

        // Target leaves; the lock releases on the next evaluation.
        agent.update_contact_lock(Duration::ZERO, Some(Vec3::new(9.0, 0.0, 0.0)));
        assert_eq!(agent.state(), AgentState::Idle);
    }
}
