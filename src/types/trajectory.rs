//! Trajectory points and planning results.

use super::pose::{Pose2d, Twist2d};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub pose: Pose2d,
    pub twist: Twist2d,
    pub acceleration: f64,
    pub steering_angle: f64,
    pub curvature: f64,
    pub time_from_start_s: f64,
    pub path_length_m: f64,
}

impl TrajectoryPoint {
    pub fn stationary(pose: Pose2d) -> Self {
        Self {
            pose,
            twist: Twist2d::default(),
            acceleration: 0.0,
            steering_angle: 0.0,
            curvature: 0.0,
            time_from_start_s: 0.0,
            path_length_m: 0.0,
        }
    }
}

/// Replaces the source's process-global debug-path-by-integer-handle
/// pattern with a first-class field on `PlanningResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugPath {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningResult {
    pub success: bool,
    pub failure_reason: String,
    pub trajectory: Vec<TrajectoryPoint>,
    pub planner_name: String,
    pub computation_time_ms: f64,
    pub iterations: u32,
    pub metadata: HashMap<String, f64>,
    pub constraint_violations: HashMap<String, f64>,
    pub debug_paths: Option<Vec<DebugPath>>,
}

impl PlanningResult {
    pub fn empty(planner_name: impl Into<String>) -> Self {
        Self {
            success: false,
            failure_reason: String::new(),
            trajectory: Vec::new(),
            planner_name: planner_name.into(),
            computation_time_ms: 0.0,
            iterations: 0,
            metadata: HashMap::new(),
            constraint_violations: HashMap::new(),
            debug_paths: None,
        }
    }

    pub fn failure(planner_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut r = Self::empty(planner_name);
        r.success = false;
        r.failure_reason = reason.into();
        r
    }

    /// Fills cumulative arc length `s` on each trajectory point from
    /// consecutive Euclidean distances. Used by the encoder and by planners
    /// that don't already track `path_length_m` while building the path.
    pub fn fill_arc_length(trajectory: &mut [TrajectoryPoint]) {
        let mut s = 0.0;
        for i in 0..trajectory.len() {
            if i > 0 {
                s += trajectory[i - 1].pose.distance_to(&trajectory[i].pose);
            }
            trajectory[i].path_length_m = s;
        }
    }

    /// Checks monotonic time and arc length, and arc-length consistency
    /// with consecutive poses.
    pub fn check_monotonicity(trajectory: &[TrajectoryPoint]) -> Result<(), String> {
        for i in 1..trajectory.len() {
            let prev = &trajectory[i - 1];
            let cur = &trajectory[i];
            if cur.time_from_start_s < prev.time_from_start_s {
                return Err(format!(
                    "time_from_start_s decreased at index {i}: {} -> {}",
                    prev.time_from_start_s, cur.time_from_start_s
                ));
            }
            if cur.path_length_m < prev.path_length_m {
                return Err(format!(
                    "path_length_m decreased at index {i}: {} -> {}",
                    prev.path_length_m, cur.path_length_m
                ));
            }
            let expected_delta = prev.pose.distance_to(&cur.pose);
            let actual_delta = cur.path_length_m - prev.path_length_m;
            if (expected_delta - actual_delta).abs() > 1e-6 {
                return Err(format!(
                    "arc length inconsistent at index {i}: expected delta {expected_delta}, got {actual_delta}"
                ));
            }
        }
        Ok(())
    }
}
