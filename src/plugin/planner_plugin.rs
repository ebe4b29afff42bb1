//! Planner plugin trait and the manager implementing the primary/fallback
//! dispatch policy.

use super::deadline::Deadline;
use super::registry::PlannerPluginRegistry;
use super::PluginMetadata;
use crate::config::PlannerPluginConfig;
use crate::error::{PlannerError, Result};
use crate::types::{PlanningContext, PlanningResult};
use std::collections::HashMap;

pub trait PlannerPlugin: Send {
    fn metadata(&self) -> PluginMetadata;
    fn initialize(&mut self, config: &serde_json::Value) -> Result<()>;
    fn reset(&mut self);
    fn statistics(&self) -> HashMap<String, f64>;

    /// Whether this planner can act on `context`, and if not, why.
    fn is_available(&self, context: &PlanningContext) -> (bool, String);

    /// Plans a trajectory. The planner must check `deadline` itself;
    /// exceeding it is reported as a non-fatal failure, not an `Err`.
    fn plan(&mut self, context: &PlanningContext, deadline: Deadline, result: &mut PlanningResult) -> Result<()>;
}

pub struct PlannerPluginManager {
    primary: Option<(String, Box<dyn PlannerPlugin>)>,
    fallback: Option<(String, Box<dyn PlannerPlugin>)>,
    config: PlannerPluginConfig,
}

impl PlannerPluginManager {
    pub fn new(config: PlannerPluginConfig) -> Self {
        Self {
            primary: None,
            fallback: None,
            config,
        }
    }

    pub fn load(&mut self, registry: &PlannerPluginRegistry) -> Result<()> {
        let mut primary = registry
            .create(&self.config.primary_name)
            .ok_or_else(|| PlannerError::PluginNotRegistered(self.config.primary_name.clone()))?;
        primary.initialize(self.config.params_for(&self.config.primary_name))?;
        self.primary = Some((self.config.primary_name.clone(), primary));

        if self.config.enable_fallback {
            let mut fallback = registry
                .create(&self.config.fallback_name)
                .ok_or_else(|| PlannerError::PluginNotRegistered(self.config.fallback_name.clone()))?;
            fallback.initialize(self.config.params_for(&self.config.fallback_name))?;
            self.fallback = Some((self.config.fallback_name.clone(), fallback));
        }
        Ok(())
    }

    /// Dispatches a planning call across primary and fallback:
    /// 1. If primary is unavailable, skip straight to fallback.
    /// 2. Otherwise call primary with the full deadline.
    /// 3. On success, return.
    /// 4. On failure with fallback enabled, call fallback with a
    ///    proportionally reduced deadline if it is available.
    /// Fails only when both primary and fallback decline.
    pub fn plan(&mut self, context: &PlanningContext, deadline: Deadline) -> Result<PlanningResult> {
        let (primary_name, primary) = self
            .primary
            .as_mut()
            .expect("PlannerPluginManager::load must be called before plan");

        let (primary_available, primary_unavailable_reason) = primary.is_available(context);

        let mut primary_reason = primary_unavailable_reason.clone();
        if primary_available {
            let mut result = PlanningResult::empty(primary_name.clone());
            primary.plan(context, deadline, &mut result)?;
            if result.success {
                return Ok(result);
            }
            primary_reason = result.failure_reason;
        }

        if !self.config.enable_fallback {
            return Err(PlannerError::BothPlannersDeclined {
                primary: primary_reason,
                fallback: "fallback disabled".into(),
            });
        }

        let (fallback_name, fallback) = match self.fallback.as_mut() {
            Some(f) => f,
            None => {
                return Err(PlannerError::BothPlannersDeclined {
                    primary: primary_reason,
                    fallback: "no fallback configured".into(),
                })
            }
        };

        let (fallback_available, fallback_unavailable_reason) = fallback.is_available(context);
        if !fallback_available {
            return Err(PlannerError::BothPlannersDeclined {
                primary: primary_reason,
                fallback: fallback_unavailable_reason,
            });
        }

        let fallback_deadline = deadline.scaled(self.config.fallback_time_ratio);
        let mut result = PlanningResult::empty(fallback_name.clone());
        fallback.plan(context, fallback_deadline, &mut result)?;
        if result.success {
            Ok(result)
        } else {
            Err(PlannerError::BothPlannersDeclined {
                primary: primary_reason,
                fallback: result.failure_reason,
            })
        }
    }

    pub fn reset(&mut self) {
        if let Some((_, p)) = self.primary.as_mut() {
            p.reset();
        }
        if let Some((_, f)) = self.fallback.as_mut() {
            f.reset();
        }
    }

    pub fn statistics(&self) -> HashMap<String, HashMap<String, f64>> {
        let mut out = HashMap::new();
        if let Some((name, p)) = &self.primary {
            out.insert(name.clone(), p.statistics());
        }
        if let Some((name, f)) = &self.fallback {
            out.insert(name.clone(), f.statistics());
        }
        out
    }
}
