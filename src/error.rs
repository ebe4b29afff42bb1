//! Crate-wide error type.
//!
//! Component APIs (plugin init, perception processing, planning) return
//! `Result<T, PlannerError>` instead of a boolean-plus-out-string pattern;
//! `PlannerError::Display` produces the wire-visible failure-reason strings
//! directly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("No occupancy grid available")]
    NoOccupancyGrid,

    #[error("No signed-distance field available")]
    NoSignedDistanceField,

    #[error("start/goal occupied")]
    StartOrGoalOccupied,

    #[error("No path found")]
    NoPathFound,

    #[error("deadline")]
    DeadlineExceeded,

    #[error("plugin '{0}' not registered")]
    PluginNotRegistered(String),

    #[error("plugin '{0}' initialization failed: {1}")]
    PluginInitFailed(String, String),

    #[error("no perception or planner plugins remain after initialization failures")]
    NoPluginsRemaining,

    #[error("primary planner declined ({primary}); fallback declined ({fallback})")]
    BothPlannersDeclined { primary: String, fallback: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
