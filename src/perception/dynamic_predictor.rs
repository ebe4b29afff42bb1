//! Predicts future trajectories for dynamic obstacles by forward-simulating
//! each one's current twist.

use crate::types::obstacles::PredictedTrajectory;
use crate::types::DynamicObstacle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionModel {
    ConstantVelocity,
    ConstantAcceleration,
}

#[derive(Debug, Clone, Copy)]
pub struct DynamicPredictorConfig {
    pub prediction_horizon_s: f64,
    pub time_step_s: f64,
    pub model: PredictionModel,
    /// Probability mass assigned to the single predicted trajectory; the
    /// remainder is "no motion" mass.
    pub trajectory_probability: f64,
}

impl Default for DynamicPredictorConfig {
    fn default() -> Self {
        Self {
            prediction_horizon_s: 3.0,
            time_step_s: 0.1,
            model: PredictionModel::ConstantVelocity,
            trajectory_probability: 0.9,
        }
    }
}

pub struct DynamicObstaclePredictor {
    config: DynamicPredictorConfig,
}

impl DynamicObstaclePredictor {
    pub fn new(config: DynamicPredictorConfig) -> Self {
        Self { config }
    }

    pub fn predict(&self, obstacles: &mut [DynamicObstacle]) {
        for obstacle in obstacles.iter_mut() {
            let samples = match self.config.model {
                PredictionModel::ConstantVelocity => self.predict_constant_velocity(obstacle),
                PredictionModel::ConstantAcceleration => self.predict_constant_velocity(obstacle),
            };
            obstacle.predicted_trajectories = vec![PredictedTrajectory {
                samples,
                probability: self.config.trajectory_probability,
            }];
        }
    }

    fn predict_constant_velocity(&self, obstacle: &DynamicObstacle) -> Vec<(crate::types::Pose2d, f64)> {
        let steps = (self.config.prediction_horizon_s / self.config.time_step_s).ceil() as usize;
        let mut pose = obstacle.pose;
        let mut samples = Vec::with_capacity(steps + 1);
        samples.push((pose, 0.0));
        for i in 1..=steps {
            pose = pose.advance(&obstacle.twist, self.config.time_step_s);
            let t = (i as f64 * self.config.time_step_s).min(self.config.prediction_horizon_s);
            samples.push((pose, t));
        }
        samples
    }
}

impl Default for DynamicObstaclePredictor {
    fn default() -> Self {
        Self::new(DynamicPredictorConfig::default())
    }
}
