//! Planning task: goal pose, arrival tolerance, task kind.

use super::pose::Pose2d;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub position_m: f64,
    pub yaw_rad: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            position_m: 0.5,
            yaw_rad: 0.2,
        }
    }
}

/// Reserved tags beyond `GotoGoal` are carried for wire compatibility; the
/// core planners only act on `GotoGoal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    GotoGoal,
    LaneFollow,
    LaneChange,
    Park,
    EmergencyStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanningTask {
    pub goal: Pose2d,
    pub tolerance: Tolerance,
    pub kind: TaskKind,
}

impl PlanningTask {
    pub fn goto(goal: Pose2d) -> Self {
        Self {
            goal,
            tolerance: Tolerance::default(),
            kind: TaskKind::GotoGoal,
        }
    }
}
