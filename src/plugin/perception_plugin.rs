//! Perception plugin trait and the manager that loads and dispatches them.

use super::registry::PerceptionPluginRegistry;
use super::PluginMetadata;
use crate::config::PerceptionPluginEntry;
use crate::error::{PlannerError, Result};
use crate::types::PlanningContext;
use std::collections::HashMap;

/// A perception plugin attaches exactly the derived artifacts it advertised
/// in `metadata().required_artifacts` -- read as "artifacts it produces"
/// when the plugin is a producer, or artifacts it depends on when acting as
/// a consumer further down the chain.
pub trait PerceptionPlugin: Send {
    fn metadata(&self) -> PluginMetadata;
    fn initialize(&mut self, config: &serde_json::Value) -> Result<()>;
    fn reset(&mut self);
    fn statistics(&self) -> HashMap<String, f64>;
    fn process(&mut self, context: &mut PlanningContext) -> Result<()>;
}

struct LoadedPerceptionPlugin {
    name: String,
    priority: i32,
    load_order: usize,
    plugin: Box<dyn PerceptionPlugin>,
}

/// Loads an ordered list of perception plugins from the registry and runs
/// them in priority order (ties broken by load order) over a context.
#[derive(Default)]
pub struct PerceptionPluginManager {
    plugins: Vec<LoadedPerceptionPlugin>,
}

impl PerceptionPluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves each configured entry via the registry, instantiates, and
    /// initializes it. A plugin whose `initialize` fails is dropped from the
    /// chain (logged as a warning); if every configured plugin fails to
    /// initialize, loading itself fails.
    pub fn load(
        &mut self,
        registry: &PerceptionPluginRegistry,
        entries: &[PerceptionPluginEntry],
    ) -> Result<()> {
        for (load_order, entry) in entries.iter().enumerate() {
            if !entry.enabled {
                continue;
            }
            let mut plugin = match registry.create(&entry.name) {
                Some(p) => p,
                None => {
                    log::warn!("perception plugin '{}' not found in registry, skipping", entry.name);
                    continue;
                }
            };
            match plugin.initialize(&entry.params) {
                Ok(()) => {
                    self.plugins.push(LoadedPerceptionPlugin {
                        name: entry.name.clone(),
                        priority: entry.priority,
                        load_order,
                        plugin,
                    });
                }
                Err(e) => {
                    log::warn!("perception plugin '{}' failed to initialize: {}", entry.name, e);
                }
            }
        }
        self.plugins
            .sort_by_key(|p| (std::cmp::Reverse(p.priority), p.load_order));

        if self.plugins.is_empty() && !entries.is_empty() {
            return Err(PlannerError::NoPluginsRemaining);
        }
        Ok(())
    }

    /// Runs enabled plugins in priority order, stopping at the first hard
    /// failure.
    pub fn process(&mut self, context: &mut PlanningContext) -> Result<()> {
        for loaded in &mut self.plugins {
            if let Err(e) = loaded.plugin.process(context) {
                log::warn!("perception plugin '{}' failed: {}", loaded.name, e);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        for loaded in &mut self.plugins {
            loaded.plugin.reset();
        }
    }

    pub fn statistics(&self) -> HashMap<String, HashMap<String, f64>> {
        self.plugins
            .iter()
            .map(|p| (p.name.clone(), p.plugin.statistics()))
            .collect()
    }

    pub fn loaded_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EgoVehicle, PlanningTask, Pose2d};

    struct AlwaysOk {
        calls: std::cell::Cell<u32>,
    }

    impl PerceptionPlugin for AlwaysOk {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata {
                name: "always_ok".into(),
                version: "1.0".into(),
                description: String::new(),
                kind: super::super::PluginKind::Perception,
                required_artifacts: vec![],
                may_be_fallback: false,
            }
        }
        fn initialize(&mut self, _config: &serde_json::Value) -> Result<()> {
            Ok(())
        }
        fn reset(&mut self) {
            self.calls.set(0);
        }
        fn statistics(&self) -> HashMap<String, f64> {
            HashMap::new()
        }
        fn process(&mut self, _context: &mut PlanningContext) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }
    }

    struct AlwaysFailsInit;
    impl PerceptionPlugin for AlwaysFailsInit {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata {
                name: "always_fails_init".into(),
                version: "1.0".into(),
                description: String::new(),
                kind: super::super::PluginKind::Perception,
                required_artifacts: vec![],
                may_be_fallback: false,
            }
        }
        fn initialize(&mut self, _config: &serde_json::Value) -> Result<()> {
            Err(PlannerError::Other("nope".into()))
        }
        fn reset(&mut self) {}
        fn statistics(&self) -> HashMap<String, f64> {
            HashMap::new()
        }
        fn process(&mut self, _context: &mut PlanningContext) -> Result<()> {
            Ok(())
        }
    }

    fn dummy_context() -> PlanningContext {
        PlanningContext::new(
            0.0,
            5.0,
            EgoVehicle {
                pose: Pose2d::new(0.0, 0.0, 0.0),
                twist: Default::default(),
                chassis: crate::types::Chassis {
                    wheelbase: 2.0,
                    track_width: 1.5,
                    body_length: 4.0,
                    body_width: 1.8,
                    body_height: 1.5,
                    wheel_radius: 0.3,
                    wheel_width: 0.2,
                    v_max: 5.0,
                    a_max: 2.0,
                    omega_max: 1.0,
                    steer_max: 0.5,
                },
                timestamp: 0.0,
            },
            PlanningTask::goto(Pose2d::new(10.0, 0.0, 0.0)),
        )
    }

    #[test]
    fn init_failure_drops_plugin_but_others_still_run() {
        let mut registry = PerceptionPluginRegistry::new();
        registry.register(
            "always_ok",
            Box::new(|| Box::new(AlwaysOk { calls: std::cell::Cell::new(0) }) as Box<dyn PerceptionPlugin>),
        );
        registry.register("always_fails_init", Box::new(|| Box::new(AlwaysFailsInit) as Box<dyn PerceptionPlugin>));

        let entries = vec![
            PerceptionPluginEntry {
                name: "always_fails_init".into(),
                enabled: true,
                priority: 1,
                params: serde_json::json!({}),
            },
            PerceptionPluginEntry {
                name: "always_ok".into(),
                enabled: true,
                priority: 0,
                params: serde_json::json!({}),
            },
        ];
        let mut manager = PerceptionPluginManager::new();
        manager.load(&registry, &entries).unwrap();
        assert_eq!(manager.loaded_names(), vec!["always_ok"]);

        let mut ctx = dummy_context();
        manager.process(&mut ctx).unwrap();
    }

    #[test]
    fn all_plugins_failing_init_is_an_error() {
        let mut registry = PerceptionPluginRegistry::new();
        registry.register("always_fails_init", Box::new(|| Box::new(AlwaysFailsInit) as Box<dyn PerceptionPlugin>));
        let entries = vec![PerceptionPluginEntry {
            name: "always_fails_init".into(),
            enabled: true,
            priority: 0,
            params: serde_json::json!({}),
        }];
        let mut manager = PerceptionPluginManager::new();
        assert!(manager.load(&registry, &entries).is_err());
    }

    #[test]
    fn priority_order_with_load_order_tiebreak() {
        let mut registry = PerceptionPluginRegistry::new();
        registry.register(
            "always_ok",
            Box::new(|| Box::new(AlwaysOk { calls: std::cell::Cell::new(0) }) as Box<dyn PerceptionPlugin>),
        );
        let entries = vec![
            PerceptionPluginEntry {
                name: "always_ok".into(),
                enabled: true,
                priority: 5,
                params: serde_json::json!({}),
            },
            PerceptionPluginEntry {
                name: "always_ok".into(),
                enabled: true,
                priority: 5,
                params: serde_json::json!({}),
            },
        ];
        let mut manager = PerceptionPluginManager::new();
        manager.load(&registry, &entries).unwrap();
        assert_eq!(manager.loaded_names().len(), 2);
    }
}
