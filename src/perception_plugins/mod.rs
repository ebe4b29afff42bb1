//! Perception plugins: derived-artifact producers registered through the
//! plugin framework rather than run in the fixed preprocessing chain.

pub mod esdf_builder;
pub mod occupancy_grid_builder;

pub use esdf_builder::EsdfBuilderPlugin;
pub use occupancy_grid_builder::OccupancyGridBuilderPlugin;
