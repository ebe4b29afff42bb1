//! Raw decoded wire shapes for `world_tick`. These mirror the JSON field
//! names on the wire; `perception::basic_converter` turns them into
//! first-class `PlanningContext` inputs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WirePose {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireTwist {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireEgo {
    pub pose: WirePose,
    pub twist: WireTwist,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireTolerance {
    pub pos: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireGoal {
    pub pose: WirePose,
    pub tol: WireTolerance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WireLimits {
    pub v_max: f64,
    pub a_max: f64,
    pub omega_max: f64,
    pub steer_max: f64,
}

impl Default for WireLimits {
    fn default() -> Self {
        Self {
            v_max: 5.0,
            a_max: 2.0,
            omega_max: 1.0,
            steer_max: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WireGeometry {
    pub wheelbase: f64,
    pub track_width: f64,
    pub body_length: f64,
    pub body_width: f64,
    pub body_height: f64,
    pub wheel_radius: f64,
    pub wheel_width: f64,
}

impl Default for WireGeometry {
    fn default() -> Self {
        Self {
            wheelbase: 2.8,
            track_width: 1.6,
            body_length: 4.5,
            body_width: 1.8,
            body_height: 1.5,
            wheel_radius: 0.3,
            wheel_width: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChassis {
    pub model: String,
    pub wheelbase: f64,
    pub limits: WireLimits,
    pub geometry: WireGeometry,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireCircle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePolygon {
    pub vertices: Vec<(f64, f64)>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireStaticMap {
    #[serde(default)]
    pub circles: Vec<WireCircle>,
    #[serde(default)]
    pub polygons: Vec<WirePolygon>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireMap {
    #[serde(rename = "static")]
    pub static_map: WireStaticMap,
}

/// Dynamic obstacle as it appears on the wire: `w` is the along-heading
/// extent, `h` the lateral extent -- see
/// `crate::types::obstacles::DynamicExtent` for the planning-side names
/// this maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDynamicObstacle {
    pub id: i64,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub pose: WirePose,
    pub twist: WireTwist,
    pub shape: String,
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
    #[serde(default)]
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldTickSnapshot {
    pub schema: String,
    pub tick_id: u64,
    pub stamp: f64,
    pub ego: WireEgo,
    pub goal: WireGoal,
    pub chassis: WireChassis,
    pub map: WireMap,
    #[serde(default)]
    pub dynamic: Vec<WireDynamicObstacle>,
}
