//! Plugin framework: registries, lifecycle, and dispatch for perception and
//! planner plugins.

pub mod builtin;
pub mod deadline;
pub mod perception_plugin;
pub mod planner_plugin;
pub mod registry;

pub use deadline::Deadline;
pub use perception_plugin::{PerceptionPlugin, PerceptionPluginManager};
pub use planner_plugin::{PlannerPlugin, PlannerPluginManager};
pub use registry::{PerceptionPluginRegistry, PlannerPluginRegistry};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Perception,
    Planner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub kind: PluginKind,
    pub required_artifacts: Vec<String>,
    pub may_be_fallback: bool,
}
