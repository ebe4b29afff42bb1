//! Bird's-eye obstacle decomposition and dynamic-obstacle prediction.

use super::pose::Pose2d;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: (f64, f64),
    pub radius: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub pose: Pose2d,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

/// Counter-clockwise ordered vertices; a duplicated first/last vertex is an
/// input error, not silently deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<(f64, f64)>,
    pub confidence: f64,
}

impl Polygon {
    pub fn validate(&self) -> Result<(), String> {
        if self.vertices.len() < 3 {
            return Err("polygon needs at least 3 vertices".into());
        }
        let first = self.vertices.first().unwrap();
        let last = self.vertices.last().unwrap();
        if (first.0 - last.0).abs() < 1e-12 && (first.1 - last.1).abs() < 1e-12 {
            return Err("polygon must not repeat the first vertex as the last".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BevObstacles {
    pub circles: Vec<Circle>,
    pub rectangles: Vec<Rectangle>,
    pub polygons: Vec<Polygon>,
}

impl BevObstacles {
    pub fn is_empty(&self) -> bool {
        self.circles.is_empty() && self.rectangles.is_empty() && self.polygons.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Circle,
    Rectangle,
}

/// Dynamic-obstacle extent in the planning frame.
///
/// The wire snapshot's protobuf-style `w`/`h` map onto `length` (along the
/// obstacle's heading) and `width` (lateral); a source circle of radius `r`
/// maps to `length == width == 2r`. See `crate::transport::codec`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicExtent {
    pub shape: ShapeKind,
    pub length: f64,
    pub width: f64,
}

/// One candidate future for a dynamic obstacle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedTrajectory {
    /// (pose, seconds-from-now), time-ordered.
    pub samples: Vec<(Pose2d, f64)>,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicObstacle {
    pub id: i64,
    pub type_tag: String,
    pub pose: Pose2d,
    pub twist: super::pose::Twist2d,
    pub extent: DynamicExtent,
    /// Sum of probabilities across trajectories is <= 1.0; the remainder is
    /// "no motion" mass.
    pub predicted_trajectories: Vec<PredictedTrajectory>,
}

impl DynamicObstacle {
    pub fn predicted_mass(&self) -> f64 {
        self.predicted_trajectories.iter().map(|t| t.probability).sum()
    }
}
