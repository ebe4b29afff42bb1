//! Planning data model: poses, vehicle geometry, obstacle and map
//! representations, and the per-tick planning context and result types.

pub mod context;
pub mod esdf;
pub mod grid;
pub mod obstacles;
pub mod pose;
pub mod snapshot;
pub mod task;
pub mod trajectory;
pub mod vehicle;

pub use context::PlanningContext;
pub use esdf::SignedDistanceField;
pub use grid::{GridConfig, OccupancyGrid};
pub use obstacles::{BevObstacles, Circle, DynamicExtent, DynamicObstacle, Polygon, Rectangle, ShapeKind};
pub use pose::{Pose2d, Twist2d};
pub use snapshot::WorldTickSnapshot;
pub use task::{PlanningTask, TaskKind, Tolerance};
pub use trajectory::{DebugPath, PlanningResult, TrajectoryPoint};
pub use vehicle::{Chassis, EgoVehicle};
