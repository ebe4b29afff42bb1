//! Builds a signed-distance field from the context's occupancy grid.

use crate::error::{PlannerError, Result};
use crate::plugin::{PerceptionPlugin, PluginKind, PluginMetadata};
use crate::stats::CallCounters;
use crate::types::grid::DEFAULT_OCCUPIED_THRESHOLD;
use crate::types::{PlanningContext, SignedDistanceField};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EsdfBuilderConfig {
    pub occupied_threshold: u8,
    pub max_distance: f64,
}

impl Default for EsdfBuilderConfig {
    fn default() -> Self {
        Self {
            occupied_threshold: DEFAULT_OCCUPIED_THRESHOLD,
            max_distance: 10.0,
        }
    }
}

#[derive(Default)]
pub struct EsdfBuilderPlugin {
    config: EsdfBuilderConfig,
    counters: CallCounters,
}

impl EsdfBuilderPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PerceptionPlugin for EsdfBuilderPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "EsdfBuilder".into(),
            version: "1.0".into(),
            description: "Computes a signed-distance field from the occupancy grid via a two-pass Euclidean distance transform".into(),
            kind: PluginKind::Perception,
            required_artifacts: vec!["occupancy_grid".into()],
            may_be_fallback: false,
        }
    }

    fn initialize(&mut self, config: &serde_json::Value) -> Result<()> {
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

    fn process(&mut self, context: &mut PlanningContext) -> Result<()> {
        let grid = context
            .occupancy_grid
            .as_ref()
            .ok_or(PlannerError::NoOccupancyGrid)?;
        let esdf = SignedDistanceField::from_occupancy_grid(grid, self.config.occupied_threshold, self.config.max_distance);
        context.esdf = Some(esdf);
        self.counters.record_success();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chassis, EgoVehicle, GridConfig, OccupancyGrid, PlanningTask, Pose2d, Twist2d};

    fn ctx() -> PlanningContext {
        PlanningContext::new(
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
        )
    }

    #[test]
    fn declines_without_occupancy_grid() {
        let mut plugin = EsdfBuilderPlugin::new();
        let mut c = ctx();
        assert!(plugin.process(&mut c).is_err());
    }

    #[test]
    fn builds_esdf_from_grid() {
        let mut plugin = EsdfBuilderPlugin::new();
        let mut c = ctx();
        c.occupancy_grid = Some(OccupancyGrid::new(GridConfig {
            origin: Pose2d::new(0.0, 0.0, 0.0),
            resolution_m: 0.5,
            width_cells: 20,
            height_cells: 20,
        }));
        plugin.process(&mut c).unwrap();
        assert!(c.esdf.is_some());
    }
}
