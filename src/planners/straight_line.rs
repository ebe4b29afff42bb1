//! Velocity-profiled straight-line fallback planner. Never blocks on
//! obstacles; always succeeds on valid input.

use crate::plugin::{Deadline, PlannerPlugin, PluginKind, PluginMetadata};
use crate::stats::CallCounters;
use crate::types::{PlanningContext, PlanningResult, Pose2d, TrajectoryPoint, Twist2d};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StraightLineConfig {
    pub default_velocity: f64,
    pub time_step: f64,
    pub planning_horizon: f64,
    pub use_trapezoidal_profile: bool,
    pub max_acceleration: f64,
    pub arrival_tolerance: f64,
}

impl Default for StraightLineConfig {
    fn default() -> Self {
        Self {
            default_velocity: 2.0,
            time_step: 0.1,
            planning_horizon: 6.0,
            use_trapezoidal_profile: true,
            max_acceleration: 2.0,
            arrival_tolerance: 0.5,
        }
    }
}

#[derive(Default)]
pub struct StraightLinePlanner {
    config: StraightLineConfig,
    counters: CallCounters,
}

impl StraightLinePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn horizon_s(&self, context: &PlanningContext) -> f64 {
        if context.planning_horizon_s > 0.0 {
            context.planning_horizon_s
        } else {
            self.config.planning_horizon
        }
    }

    fn build_trajectory(&self, context: &PlanningContext) -> Vec<TrajectoryPoint> {
        let ego = context.ego.pose;
        let goal = context.task.goal;
        let d = ego.distance_to(&goal);

        if d < self.config.arrival_tolerance {
            return vec![TrajectoryPoint::stationary(ego)];
        }

        let horizon = self.horizon_s(context);
        let n = (horizon / self.config.time_step).ceil() as usize;
        let n = n.max(1);

        let heading = (goal.y - ego.y).atan2(goal.x - ego.x);
        let v_max = context.ego.chassis.v_max;
        let a_max = self.config.max_acceleration.min(context.ego.chassis.a_max).max(1e-6);

        let (d_accel, peak_v, cruise_len) = if self.config.use_trapezoidal_profile {
            let t_accel = v_max / a_max;
            let d_accel_nominal = 0.5 * a_max * t_accel * t_accel;
            if 2.0 * d_accel_nominal >= d {
                // Triangular profile: no cruise segment, peak v = sqrt(a_max * d).
                let peak_v = (a_max * d).sqrt();
                (d / 2.0, peak_v, 0.0)
            } else {
                (d_accel_nominal, v_max, d - 2.0 * d_accel_nominal)
            }
        } else {
            (0.0, self.config.default_velocity, d)
        };

        let mut trajectory = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let t_param = i as f64 / n as f64;
            let s = t_param * d;
            let x = ego.x + t_param * (goal.x - ego.x);
            let y = ego.y + t_param * (goal.y - ego.y);
            let yaw = if i == n { goal.yaw() } else { heading };

            let (v, a) = if !self.config.use_trapezoidal_profile {
                (self.config.default_velocity, 0.0)
            } else if s < d_accel {
                (((2.0 * a_max * s).max(0.0)).sqrt().min(peak_v), a_max)
            } else if s < d_accel + cruise_len {
                (peak_v, 0.0)
            } else {
                let remaining = (d - s).max(0.0);
                (((2.0 * a_max * remaining).max(0.0)).sqrt().min(peak_v), -a_max)
            };
            let v = if i == n { 0.0 } else { v };

            trajectory.push(TrajectoryPoint {
                pose: Pose2d::new(x, y, yaw),
                twist: Twist2d::new(v, 0.0, 0.0),
                acceleration: a,
                steering_angle: 0.0,
                curvature: 0.0,
                time_from_start_s: i as f64 * self.config.time_step,
                path_length_m: s,
            });
        }
        trajectory
    }
}

impl PlannerPlugin for StraightLinePlanner {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "StraightLinePlanner".into(),
            version: "1.0".into(),
            description: "Velocity-profiled straight-line geometric fallback".into(),
            kind: PluginKind::Planner,
            required_artifacts: vec![],
            may_be_fallback: true,
        }
    }

    fn initialize(&mut self, config: &serde_json::Value) -> crate::error::Result<()> {
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

    fn is_available(&self, _context: &PlanningContext) -> (bool, String) {
        (true, String::new())
    }

    fn plan(
        &mut self,
        context: &PlanningContext,
        _deadline: Deadline,
        result: &mut PlanningResult,
    ) -> crate::error::Result<()> {
        let start = std::time::Instant::now();
        let trajectory = self.build_trajectory(context);
        result.success = true;
        result.failure_reason.clear();
        result.trajectory = trajectory;
        result.planner_name = self.metadata().name;
        result.computation_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.counters.record_success();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chassis, EgoVehicle, PlanningTask};
    use approx::assert_relative_eq;

    fn context(v_max: f64, a_max: f64, horizon: f64) -> PlanningContext {
        PlanningContext::new(
            0.0,
            horizon,
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
                    v_max,
                    a_max,
                    omega_max: 1.0,
                    steer_max: 0.6,
                },
                timestamp: 0.0,
            },
            PlanningTask::goto(Pose2d::new(10.0, 0.0, 0.0)),
        )
    }

    #[test]
    fn open_straight_run_scenario() {
        let mut planner = StraightLinePlanner::new();
        planner
            .initialize(&serde_json::json!({"time_step": 0.1, "use_trapezoidal_profile": true}))
            .unwrap();
        let ctx = context(2.0, 2.0, 6.0);
        let mut result = PlanningResult::empty("StraightLinePlanner");
        let deadline = Deadline::starting_now(std::time::Duration::from_millis(5));
        planner.plan(&ctx, deadline, &mut result).unwrap();
        assert!(result.success);
        assert!(result.trajectory.len() > 10);
        let first = &result.trajectory[0];
        assert_relative_eq!(first.twist.vx, 0.0, epsilon = 1e-6);
        let last = result.trajectory.last().unwrap();
        assert_relative_eq!(last.twist.vx, 0.0, epsilon = 1e-6);
        assert!(last.pose.distance_to(&Pose2d::new(10.0, 0.0, 0.0)) < 0.2);

        // Peak v should occur near s = d_accel = v_max / a_max ... v_max^2/(2*a_max) = 1m
        let peak_idx = result
            .trajectory
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.twist.vx.partial_cmp(&b.twist.vx).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let peak_point = &result.trajectory[peak_idx];
        assert!(peak_point.path_length_m > 0.5 && peak_point.path_length_m < 2.0);
    }

    #[test]
    fn within_arrival_tolerance_emits_single_stationary_point() {
        let mut planner = StraightLinePlanner::new();
        planner.initialize(&serde_json::json!({"arrival_tolerance": 0.5})).unwrap();
        let mut ctx = context(2.0, 2.0, 6.0);
        ctx.task.goal = Pose2d::new(0.1, 0.0, 0.0);
        let mut result = PlanningResult::empty("StraightLinePlanner");
        planner
            .plan(&ctx, Deadline::starting_now(std::time::Duration::from_millis(5)), &mut result)
            .unwrap();
        assert_eq!(result.trajectory.len(), 1);
        assert_relative_eq!(result.trajectory[0].twist.vx, 0.0);
    }

    #[test]
    fn monotonicity_and_arc_length_hold() {
        let mut planner = StraightLinePlanner::new();
        planner.initialize(&serde_json::json!({})).unwrap();
        let ctx = context(2.0, 2.0, 6.0);
        let mut result = PlanningResult::empty("StraightLinePlanner");
        planner
            .plan(&ctx, Deadline::starting_now(std::time::Duration::from_millis(5)), &mut result)
            .unwrap();
        PlanningResult::check_monotonicity(&result.trajectory).unwrap();
    }
}
