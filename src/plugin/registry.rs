//! Name-indexed factory registries for perception and planner plugins.
//!
//! `register_builtin_plugins` (see `builtin.rs`) is an explicit call made
//! before any manager loads plugins, keeping registration order
//! deterministic and testable rather than relying on static initializers.

use super::perception_plugin::PerceptionPlugin;
use super::planner_plugin::PlannerPlugin;
use std::collections::HashMap;

type PerceptionFactory = Box<dyn Fn() -> Box<dyn PerceptionPlugin> + Send + Sync>;
type PlannerFactory = Box<dyn Fn() -> Box<dyn PlannerPlugin> + Send + Sync>;

#[derive(Default)]
pub struct PerceptionPluginRegistry {
    factories: HashMap<String, PerceptionFactory>,
}

impl PerceptionPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: PerceptionFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn PerceptionPlugin>> {
        self.factories.get(name).map(|f| f())
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

#[derive(Default)]
pub struct PlannerPluginRegistry {
    factories: HashMap<String, PlannerFactory>,
}

impl PlannerPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: PlannerFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn PlannerPlugin>> {
        self.factories.get(name).map(|f| f())
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}
