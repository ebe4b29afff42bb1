//! Converts the raw wire snapshot into first-class ego/task/dynamic-obstacle
//! inputs.

use crate::types::obstacles::{DynamicExtent, PredictedTrajectory, ShapeKind};
use crate::types::{Chassis, DynamicObstacle, EgoVehicle, PlanningTask, Pose2d, Tolerance, Twist2d};
use crate::types::snapshot::WorldTickSnapshot;
use crate::types::task::TaskKind;

pub struct BasicDataConverter;

impl BasicDataConverter {
    pub fn convert_ego(snapshot: &WorldTickSnapshot) -> EgoVehicle {
        let w = &snapshot.chassis;
        EgoVehicle {
            pose: Pose2d::new(snapshot.ego.pose.x, snapshot.ego.pose.y, snapshot.ego.pose.yaw),
            twist: Twist2d::new(snapshot.ego.twist.vx, snapshot.ego.twist.vy, snapshot.ego.twist.omega),
            chassis: Chassis {
                wheelbase: w.wheelbase,
                track_width: w.geometry.track_width,
                body_length: w.geometry.body_length,
                body_width: w.geometry.body_width,
                body_height: w.geometry.body_height,
                wheel_radius: w.geometry.wheel_radius,
                wheel_width: w.geometry.wheel_width,
                v_max: w.limits.v_max,
                a_max: w.limits.a_max,
                omega_max: w.limits.omega_max,
                steer_max: w.limits.steer_max,
            },
            timestamp: snapshot.stamp,
        }
    }

    pub fn convert_task(snapshot: &WorldTickSnapshot) -> PlanningTask {
        PlanningTask {
            goal: Pose2d::new(snapshot.goal.pose.x, snapshot.goal.pose.y, snapshot.goal.pose.yaw),
            tolerance: Tolerance {
                position_m: snapshot.goal.tol.pos,
                yaw_rad: snapshot.goal.tol.yaw,
            },
            kind: TaskKind::GotoGoal,
        }
    }

    /// Converts wire dynamic obstacles, applying the breaking `w -> length`,
    /// `h -> width` mapping (a circle of radius `r` maps to
    /// `length == width == 2r`). Leaves `predicted_trajectories` empty --
    /// `DynamicObstaclePredictor` fills those in.
    pub fn convert_dynamic_obstacles(snapshot: &WorldTickSnapshot) -> Vec<DynamicObstacle> {
        snapshot
            .dynamic
            .iter()
            .map(|d| {
                let (shape, length, width) = match d.shape.as_str() {
                    "circle" => (ShapeKind::Circle, 2.0 * d.radius, 2.0 * d.radius),
                    _ => (ShapeKind::Rectangle, d.w, d.h),
                };
                DynamicObstacle {
                    id: d.id,
                    type_tag: d.type_tag.clone(),
                    pose: Pose2d::new(d.pose.x, d.pose.y, d.pose.yaw),
                    twist: Twist2d::new(d.twist.vx, d.twist.vy, d.twist.omega),
                    extent: DynamicExtent { shape, length, width },
                    predicted_trajectories: Vec::<PredictedTrajectory>::new(),
                }
            })
            .collect()
    }
}
