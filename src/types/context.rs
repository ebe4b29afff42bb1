//! The typed context plugins read from and write derived artifacts into.

use super::esdf::SignedDistanceField;
use super::grid::OccupancyGrid;
use super::obstacles::{BevObstacles, DynamicObstacle};
use super::task::PlanningTask;
use super::vehicle::EgoVehicle;
use std::collections::HashMap;

/// Plugin-produced artifacts not yet promoted to a first-class field land
/// here, keyed by plugin-chosen name.
#[derive(Debug, Clone, Default)]
pub struct ExtensionMap {
    values: HashMap<String, serde_json::Value>,
}

impl ExtensionMap {
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[derive(Debug, Clone)]
pub struct PlanningContext {
    pub timestamp: f64,
    pub planning_horizon_s: f64,
    pub ego: EgoVehicle,
    pub task: PlanningTask,
    pub occupancy_grid: Option<OccupancyGrid>,
    pub bev_obstacles: Option<BevObstacles>,
    pub esdf: Option<SignedDistanceField>,
    pub dynamic_obstacles: Vec<DynamicObstacle>,
    pub extensions: ExtensionMap,
}

impl PlanningContext {
    pub fn new(
        timestamp: f64,
        planning_horizon_s: f64,
        ego: EgoVehicle,
        task: PlanningTask,
    ) -> Self {
        Self {
            timestamp,
            planning_horizon_s,
            ego,
            task,
            occupancy_grid: None,
            bev_obstacles: None,
            esdf: None,
            dynamic_obstacles: Vec::new(),
            extensions: ExtensionMap::default(),
        }
    }

    /// Resets derived-artifact slots before a tick's perception chain runs,
    /// keeping ego/task/dynamic-obstacle inputs copied from the snapshot.
    pub fn reset_derived_artifacts(&mut self) {
        self.occupancy_grid = None;
        self.bev_obstacles = None;
        self.esdf = None;
        self.extensions.clear();
    }
}
