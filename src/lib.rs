//! Planning and perception core for an autonomous ground-vehicle simulation
//! client: decodes world snapshots off a websocket, runs a deadline-bounded
//! perception-then-planning pipeline, and publishes trajectories and
//! heartbeats back onto the same connection.

pub mod config;
pub mod cycle;
pub mod error;
pub mod perception;
pub mod perception_plugins;
pub mod planners;
pub mod plugin;
pub mod stats;
pub mod transport;
pub mod types;

pub use config::{AppConfig, ConfigLoader};
pub use cycle::CycleController;
pub use error::{PlannerError, Result};
