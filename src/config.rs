//! Startup configuration, loaded once from a JSON or YAML document found by
//! a small search list rooted at the process working directory.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_search_list() -> Vec<PathBuf> {
    vec![
        PathBuf::from("navsim_planner.yaml"),
        PathBuf::from("navsim_planner.yml"),
        PathBuf::from("navsim_planner.json"),
        PathBuf::from("config/navsim_planner.yaml"),
        PathBuf::from("config/navsim_planner.json"),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionPluginEntry {
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub params: serde_json::Value,
}

impl Default for PerceptionPluginEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            priority: 0,
            params: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerPluginConfig {
    pub primary_name: String,
    pub fallback_name: String,
    pub enable_fallback: bool,
    pub fallback_time_ratio: f64,
    /// Recognized keys per plugin, keyed by plugin name so the same
    /// document can supply both the primary's and the fallback's tunables
    /// (e.g. `AStarPlanner: {time_step, ...}`).
    pub params: HashMap<String, serde_json::Value>,
}

impl Default for PlannerPluginConfig {
    fn default() -> Self {
        Self {
            primary_name: "AStarPlanner".into(),
            fallback_name: "StraightLinePlanner".into(),
            enable_fallback: true,
            fallback_time_ratio: 0.7,
            params: HashMap::new(),
        }
    }
}

impl PlannerPluginConfig {
    /// The configured params for `plugin_name`, or `null` (meaning "use the
    /// plugin's own defaults") if the document didn't mention it.
    pub fn params_for(&self, plugin_name: &str) -> &serde_json::Value {
        static NULL: serde_json::Value = serde_json::Value::Null;
        self.params.get(plugin_name).unwrap_or(&NULL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub deadline_ms: u64,
    pub heartbeat_interval_s: f64,
    pub latency_window: usize,
    pub planning_horizon_s: f64,
    pub use_plugin_system: bool,
    pub verbose: bool,
    pub perception_plugins: Vec<PerceptionPluginEntry>,
    pub planner: PlannerPluginConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 25,
            heartbeat_interval_s: 5.0,
            latency_window: 100,
            planning_horizon_s: 5.0,
            use_plugin_system: false,
            verbose: false,
            perception_plugins: vec![
                PerceptionPluginEntry {
                    name: "OccupancyGridBuilder".into(),
                    enabled: true,
                    priority: 0,
                    params: serde_json::json!({}),
                },
                PerceptionPluginEntry {
                    name: "EsdfBuilder".into(),
                    enabled: true,
                    priority: 1,
                    params: serde_json::json!({}),
                },
            ],
            planner: PlannerPluginConfig::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Walks the search list; the first existing file wins. No file found
    /// is not an error -- it yields built-in defaults.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(&default_search_list())
    }

    pub fn load_from(search_list: &[PathBuf]) -> Result<AppConfig> {
        for path in search_list {
            if path.exists() {
                return Self::load_file(path);
            }
        }
        log::info!("no configuration file found in search list, using defaults");
        Ok(AppConfig::default())
    }

    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)?;
        let cfg = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            other => {
                return Err(PlannerError::InvalidConfig(format!(
                    "unrecognized config extension: {other:?}"
                )))
            }
        };
        log::info!("loaded configuration from {}", path.display());
        Ok(cfg)
    }
}
