//! Explicit builtin plugin registration. `register_builtin_plugins` is
//! called once before any manager loads plugins, which keeps registration
//! order deterministic and testable rather than relying on static
//! initializers.

use super::registry::{PerceptionPluginRegistry, PlannerPluginRegistry};
use crate::perception_plugins::{EsdfBuilderPlugin, OccupancyGridBuilderPlugin};
use crate::planners::{AStarPlanner, StraightLinePlanner, TopologyGuidedPlanner};

pub fn register_builtin_perception_plugins(registry: &mut PerceptionPluginRegistry) {
    registry.register("OccupancyGridBuilder", Box::new(|| {
        Box::new(OccupancyGridBuilderPlugin::new()) as Box<dyn super::PerceptionPlugin>
    }));
    registry.register("EsdfBuilder", Box::new(|| {
        Box::new(EsdfBuilderPlugin::new()) as Box<dyn super::PerceptionPlugin>
    }));
}

pub fn register_builtin_planner_plugins(registry: &mut PlannerPluginRegistry) {
    registry.register("AStarPlanner", Box::new(|| {
        Box::new(AStarPlanner::new()) as Box<dyn super::PlannerPlugin>
    }));
    registry.register("StraightLinePlanner", Box::new(|| {
        Box::new(StraightLinePlanner::new()) as Box<dyn super::PlannerPlugin>
    }));
    registry.register("TopologyGuidedPlanner", Box::new(|| {
        Box::new(TopologyGuidedPlanner::new()) as Box<dyn super::PlannerPlugin>
    }));
}

/// Builds both process-wide registries with the builtin plugin set.
pub fn register_builtin_plugins() -> (PerceptionPluginRegistry, PlannerPluginRegistry) {
    let mut perception = PerceptionPluginRegistry::new();
    let mut planner = PlannerPluginRegistry::new();
    register_builtin_perception_plugins(&mut perception);
    register_builtin_planner_plugins(&mut planner);
    (perception, planner)
}
