//! Extracts a bird's-eye obstacle decomposition from the wire snapshot.

use crate::types::obstacles::{Circle, Polygon, Rectangle};
use crate::types::snapshot::WorldTickSnapshot;
use crate::types::{BevObstacles, Pose2d};

#[derive(Debug, Clone, Copy)]
pub struct BevExtractorConfig {
    pub detection_range_m: f64,
    pub confidence_threshold: f64,
    /// Confidence assigned to dynamic-obstacle-derived shapes; static map
    /// obstacles are always confidence 1.0.
    pub dynamic_confidence: f64,
}

impl Default for BevExtractorConfig {
    fn default() -> Self {
        Self {
            detection_range_m: 50.0,
            confidence_threshold: 0.5,
            dynamic_confidence: 0.9,
        }
    }
}

pub struct BevObstacleExtractor {
    config: BevExtractorConfig,
}

impl BevObstacleExtractor {
    pub fn new(config: BevExtractorConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, snapshot: &WorldTickSnapshot) -> BevObstacles {
        let mut obstacles = BevObstacles::default();

        for c in &snapshot.map.static_map.circles {
            obstacles.circles.push(Circle {
                center: (c.x, c.y),
                radius: c.radius,
                confidence: 1.0,
            });
        }
        for p in &snapshot.map.static_map.polygons {
            obstacles.polygons.push(Polygon {
                vertices: p.vertices.clone(),
                confidence: 1.0,
            });
        }

        let ego = (snapshot.ego.pose.x, snapshot.ego.pose.y);
        for d in &snapshot.dynamic {
            let dx = d.pose.x - ego.0;
            let dy = d.pose.y - ego.1;
            if (dx * dx + dy * dy).sqrt() > self.config.detection_range_m {
                continue;
            }
            if self.config.dynamic_confidence < self.config.confidence_threshold {
                continue;
            }
            match d.shape.as_str() {
                "circle" => obstacles.circles.push(Circle {
                    center: (d.pose.x, d.pose.y),
                    radius: d.radius,
                    confidence: self.config.dynamic_confidence,
                }),
                _ => obstacles.rectangles.push(Rectangle {
                    pose: Pose2d::new(d.pose.x, d.pose.y, d.pose.yaw),
                    width: d.w,
                    height: d.h,
                    confidence: self.config.dynamic_confidence,
                }),
            };
        }

        obstacles
    }
}

impl Default for BevObstacleExtractor {
    fn default() -> Self {
        Self::new(BevExtractorConfig::default())
    }
}
