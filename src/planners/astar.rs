//! Grid A* over an inflated occupancy grid.
//!
//! Nodes live in a flat arena addressed by integer index rather than as a
//! parent-linked pointer graph: the open set stores `(f_cost, index)` and
//! parents are `Option<usize>` into the same arena.

use crate::error::{PlannerError, Result as PlannerResult};
use crate::plugin::{Deadline, PlannerPlugin, PluginKind, PluginMetadata};
use crate::stats::{CallCounters, FailureCategory};
use crate::types::grid::DEFAULT_OCCUPIED_THRESHOLD;
use crate::types::{OccupancyGrid, PlanningContext, PlanningResult, Pose2d, TrajectoryPoint, Twist2d};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AStarConfig {
    pub time_step: f64,
    pub heuristic_weight: f64,
    pub step_size: f64,
    pub max_iterations: u32,
    pub goal_tolerance: f64,
    pub default_velocity: f64,
    pub occupied_threshold: u8,
    pub deadline_check_interval: u32,
}

impl Default for AStarConfig {
    fn default() -> Self {
        Self {
            time_step: 0.1,
            heuristic_weight: 1.0,
            step_size: 0.5,
            max_iterations: 10_000,
            goal_tolerance: 0.5,
            default_velocity: 1.0,
            occupied_threshold: DEFAULT_OCCUPIED_THRESHOLD,
            deadline_check_interval: 128,
        }
    }
}

struct Node {
    cell: (i64, i64),
    g_cost: f64,
    f_cost: f64,
    parent: Option<usize>,
}

#[derive(PartialEq)]
struct OpenEntry {
    f_cost: f64,
    insertion_order: u64,
    index: usize,
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on f_cost; ties broken by earlier insertion.
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.insertion_order.cmp(&self.insertion_order))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct AStarPlanner {
    config: AStarConfig,
    counters: CallCounters,
}

impl AStarPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn heuristic(&self, grid: &OccupancyGrid, cell: (i64, i64), goal_cell: (i64, i64)) -> f64 {
        let (wx, wy) = grid.cell_to_world(cell);
        let (gx, gy) = grid.cell_to_world(goal_cell);
        ((wx - gx).powi(2) + (wy - gy).powi(2)).sqrt() * self.config.heuristic_weight
    }

    const NEIGHBORS: [(i64, i64); 8] = [
        (1, 0),
        (-1, 0),
        (0, 1),
        (0, -1),
        (1, 1),
        (1, -1),
        (-1, 1),
        (-1, -1),
    ];

    /// Runs the A* search; returns the world-frame waypoint path, or the
    /// spec-mandated failure reason string.
    fn search(&self, grid: &OccupancyGrid, ego: Pose2d, goal: Pose2d, deadline: Deadline) -> std::result::Result<Vec<(f64, f64)>, String> {
        let start_cell = grid.world_to_cell(ego.x, ego.y);
        let goal_cell = grid.world_to_cell(goal.x, goal.y);

        if grid.is_occupied(start_cell, self.config.occupied_threshold)
            || grid.is_occupied(goal_cell, self.config.occupied_threshold)
        {
            return Err("start/goal occupied".into());
        }

        let mut arena: Vec<Node> = Vec::new();
        let mut open = BinaryHeap::new();
        let mut best_g: HashMap<(i64, i64), f64> = HashMap::new();
        let mut closed: std::collections::HashSet<(i64, i64)> = std::collections::HashSet::new();

        arena.push(Node {
            cell: start_cell,
            g_cost: 0.0,
            f_cost: self.heuristic(grid, start_cell, goal_cell),
            parent: None,
        });
        best_g.insert(start_cell, 0.0);
        open.push(OpenEntry {
            f_cost: arena[0].f_cost,
            insertion_order: 0,
            index: 0,
        });

        let mut insertion_counter: u64 = 1;
        let mut expansions: u32 = 0;

        while let Some(OpenEntry { index, .. }) = open.pop() {
            let current_cell = arena[index].cell;
            if closed.contains(&current_cell) {
                continue;
            }
            closed.insert(current_cell);

            let (wx, wy) = grid.cell_to_world(current_cell);
            if ((wx - goal.x).powi(2) + (wy - goal.y).powi(2)).sqrt() < self.config.goal_tolerance {
                return Ok(reconstruct_path(&arena, index, grid));
            }

            expansions += 1;
            if expansions >= self.config.max_iterations {
                return Err("No path found".into());
            }
            if expansions % self.config.deadline_check_interval.max(1) == 0 && deadline.is_expired() {
                return Err("deadline".into());
            }

            let current_g = arena[index].g_cost;
            for (dx, dy) in Self::NEIGHBORS {
                let neighbor_cell = (current_cell.0 + dx, current_cell.1 + dy);
                if closed.contains(&neighbor_cell) {
                    continue;
                }
                if grid.is_occupied(neighbor_cell, self.config.occupied_threshold) {
                    continue;
                }
                let step_cost = if dx != 0 && dy != 0 {
                    std::f64::consts::SQRT_2 * grid.config.resolution_m
                } else {
                    grid.config.resolution_m
                };
                let tentative_g = current_g + step_cost;
                let improves = best_g
                    .get(&neighbor_cell)
                    .map(|&g| tentative_g < g)
                    .unwrap_or(true);
                if improves {
                    best_g.insert(neighbor_cell, tentative_g);
                    let h = self.heuristic(grid, neighbor_cell, goal_cell);
                    let new_index = arena.len();
                    arena.push(Node {
                        cell: neighbor_cell,
                        g_cost: tentative_g,
                        f_cost: tentative_g + h,
                        parent: Some(index),
                    });
                    open.push(OpenEntry {
                        f_cost: tentative_g + h,
                        insertion_order: insertion_counter,
                        index: new_index,
                    });
                    insertion_counter += 1;
                }
            }
        }
        Err("No path found".into())
    }

    fn path_to_trajectory(&self, path: &[(f64, f64)], goal_yaw: f64) -> Vec<TrajectoryPoint> {
        let n = path.len();
        let mut trajectory = Vec::with_capacity(n);
        for i in 0..n {
            let yaw = if i + 1 < n {
                (path[i + 1].1 - path[i].1).atan2(path[i + 1].0 - path[i].0)
            } else {
                goal_yaw
            };
            let v = if i + 1 == n { 0.0 } else { self.config.default_velocity };
            trajectory.push(TrajectoryPoint {
                pose: Pose2d::new(path[i].0, path[i].1, yaw),
                twist: Twist2d::new(v, 0.0, 0.0),
                acceleration: 0.0,
                steering_angle: 0.0,
                curvature: 0.0,
                time_from_start_s: i as f64 * self.config.time_step,
                path_length_m: 0.0,
            });
        }
        PlanningResult::fill_arc_length(&mut trajectory);
        trajectory
    }
}

fn reconstruct_path(arena: &[Node], goal_index: usize, grid: &OccupancyGrid) -> Vec<(f64, f64)> {
    let mut cells = Vec::new();
    let mut cur = Some(goal_index);
    while let Some(idx) = cur {
        cells.push(arena[idx].cell);
        cur = arena[idx].parent;
    }
    cells.reverse();
    cells.into_iter().map(|c| grid.cell_to_world(c)).collect()
}

impl PlannerPlugin for AStarPlanner {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "AStarPlanner".into(),
            version: "1.0".into(),
            description: "8-connected weighted A* over an inflated occupancy grid".into(),
            kind: PluginKind::Planner,
            required_artifacts: vec!["occupancy_grid".into()],
            may_be_fallback: false,
        }
    }

    fn initialize(&mut self, config: &serde_json::Value) -> PlannerResult<()> {
        if !config.is_null() {
            self.config = serde_json::from_value(config.clone())?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.counters.reset();
    }

    fn statistics(&self) -> HashMap<String, f64> {
        self.counters.snapshot()
    }

    fn is_available(&self, context: &PlanningContext) -> (bool, String) {
        match &context.occupancy_grid {
            Some(_) => (true, String::new()),
            None => (false, PlannerError::NoOccupancyGrid.to_string()),
        }
    }

    fn plan(
        &mut self,
        context: &PlanningContext,
        deadline: Deadline,
        result: &mut PlanningResult,
    ) -> PlannerResult<()> {
        let start = std::time::Instant::now();
        let grid = match &context.occupancy_grid {
            Some(g) => g,
            None => {
                result.success = false;
                result.failure_reason = PlannerError::NoOccupancyGrid.to_string();
                self.counters.record_failure(FailureCategory::Invalid);
                return Ok(());
            }
        };

        match self.search(grid, context.ego.pose, context.task.goal, deadline) {
            Ok(path) => {
                result.trajectory = self.path_to_trajectory(&path, context.task.goal.yaw());
                result.success = true;
                result.failure_reason.clear();
                result.iterations = result.trajectory.len() as u32;
                self.counters.record_success();
            }
            Err(reason) => {
                result.success = false;
                let category = match reason.as_str() {
                    "deadline" => FailureCategory::Deadline,
                    "start/goal occupied" => FailureCategory::Invalid,
                    _ => FailureCategory::NoSolution,
                };
                self.counters.record_failure(category);
                result.failure_reason = reason;
            }
        }
        result.planner_name = self.metadata().name;
        result.computation_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chassis, EgoVehicle, GridConfig, PlanningTask, Twist2d};

    fn base_context(grid: OccupancyGrid) -> PlanningContext {
        let mut ctx = PlanningContext::new(
            0.0,
            5.0,
            EgoVehicle {
                pose: Pose2d::new(0.0, 0.0, 0.0),
                twist: Twist2d::default(),
                chassis: Chassis {
                    wheelbase: 2.8,
                    track_width: 1.6,
                    body_length: 4.5,
                    body_width: 1.8,
                    body_height: 1.5,
                    wheel_radius: 0.3,
                    wheel_width: 0.2,
                    v_max: 2.0,
                    a_max: 2.0,
                    omega_max: 1.0,
                    steer_max: 0.6,
                },
                timestamp: 0.0,
            },
            PlanningTask::goto(Pose2d::new(10.0, 0.0, 0.0)),
        );
        ctx.occupancy_grid = Some(grid);
        ctx
    }

    fn open_grid() -> OccupancyGrid {
        OccupancyGrid::new(GridConfig {
            origin: Pose2d::new(-5.0, -10.0, 0.0),
            resolution_m: 0.2,
            width_cells: 100,
            height_cells: 100,
        })
    }

    #[test]
    fn finds_direct_path_with_no_obstacles() {
        let mut planner = AStarPlanner::new();
        planner.initialize(&serde_json::json!({})).unwrap();
        let ctx = base_context(open_grid());
        let mut result = PlanningResult::empty("AStarPlanner");
        planner
            .plan(&ctx, Deadline::starting_now(std::time::Duration::from_millis(500)), &mut result)
            .unwrap();
        assert!(result.success);
        assert!(result.trajectory.len() > 1);
    }

    #[test]
    fn detours_around_wall_obstacle() {
        let mut grid = open_grid();
        // 5x5 obstacle centered at (5, 0).
        for y in -25..25 {
            for x in 0..50 {
                let (wx, wy) = grid.cell_to_world((x, y));
                if (wx - 5.0).abs() <= 2.5 && (wy).abs() <= 2.5 {
                    grid.set_cost((x, y), 100);
                }
            }
        }
        let mut planner = AStarPlanner::new();
        planner.initialize(&serde_json::json!({"max_iterations": 200000})).unwrap();
        let ctx = base_context(grid);
        let mut result = PlanningResult::empty("AStarPlanner");
        planner
            .plan(&ctx, Deadline::starting_now(std::time::Duration::from_secs(5)), &mut result)
            .unwrap();
        assert!(result.success, "reason: {}", result.failure_reason);
        let total_len = result.trajectory.last().unwrap().path_length_m;
        assert!(total_len > 10.0 && total_len < 20.0, "path length {total_len}");
        for p in &result.trajectory {
            assert!(
                !ctx.occupancy_grid.as_ref().unwrap().is_occupied_world(p.pose.x, p.pose.y, 50),
                "waypoint ({}, {}) occupied",
                p.pose.x,
                p.pose.y
            );
        }
    }

    #[test]
    fn declines_when_goal_occupied() {
        let mut grid = open_grid();
        let goal_cell = grid.world_to_cell(10.0, 0.0);
        grid.set_cost(goal_cell, 200);
        let mut planner = AStarPlanner::new();
        planner.initialize(&serde_json::json!({})).unwrap();
        let ctx = base_context(grid);
        let mut result = PlanningResult::empty("AStarPlanner");
        planner
            .plan(&ctx, Deadline::starting_now(std::time::Duration::from_millis(500)), &mut result)
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.failure_reason, "start/goal occupied");
    }

    #[test]
    fn reports_deadline_failure_under_tight_budget() {
        let mut planner = AStarPlanner::new();
        planner
            .initialize(&serde_json::json!({"max_iterations": 5000, "deadline_check_interval": 4}))
            .unwrap();
        let ctx = base_context(open_grid());
        let mut result = PlanningResult::empty("AStarPlanner");
        planner
            .plan(&ctx, Deadline::starting_now(std::time::Duration::from_nanos(1)), &mut result)
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.failure_reason, "deadline");
    }
}
