//! Planner plugin implementations: the velocity-profiled straight-line
//! fallback, grid A*, and the topology-guided receding-horizon optimizer.

pub mod astar;
pub mod straight_line;
pub mod topology;

pub use astar::AStarPlanner;
pub use straight_line::StraightLinePlanner;
pub use topology::TopologyGuidedPlanner;
