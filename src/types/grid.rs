//! Row-major occupancy grid.

use super::pose::Pose2d;
use serde::{Deserialize, Serialize};

/// Cost read for a query outside the grid footprint, or at a cell whose cost
/// reaches the occupancy threshold.
pub const DEFAULT_OCCUPIED_THRESHOLD: u8 = 50;
pub const OBSTACLE_STAMP_COST: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub origin: Pose2d,
    pub resolution_m: f64,
    pub width_cells: usize,
    pub height_cells: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyGrid {
    pub config: GridConfig,
    /// Row-major: index = y * width + x.
    pub data: Vec<u8>,
}

impl OccupancyGrid {
    pub fn new(config: GridConfig) -> Self {
        let n = config.width_cells * config.height_cells;
        Self {
            config,
            data: vec![0u8; n],
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let expected = self.config.width_cells * self.config.height_cells;
        if self.data.len() != expected {
            return Err(format!(
                "occupancy grid data length {} does not match width*height {}",
                self.data.len(),
                expected
            ));
        }
        Ok(())
    }

    pub fn linear_index(&self, cell: (i64, i64)) -> Option<usize> {
        let (cx, cy) = cell;
        if cx < 0 || cy < 0 {
            return None;
        }
        let (cx, cy) = (cx as usize, cy as usize);
        if cx >= self.config.width_cells || cy >= self.config.height_cells {
            return None;
        }
        Some(cy * self.config.width_cells + cx)
    }

    /// World -> cell via `floor((world - origin) / resolution)`.
    pub fn world_to_cell(&self, x: f64, y: f64) -> (i64, i64) {
        let dx = x - self.config.origin.x;
        let dy = y - self.config.origin.y;
        (
            (dx / self.config.resolution_m).floor() as i64,
            (dy / self.config.resolution_m).floor() as i64,
        )
    }

    pub fn cell_to_world(&self, cell: (i64, i64)) -> (f64, f64) {
        let (cx, cy) = cell;
        (
            self.config.origin.x + (cx as f64 + 0.5) * self.config.resolution_m,
            self.config.origin.y + (cy as f64 + 0.5) * self.config.resolution_m,
        )
    }

    /// Reads the cost at a cell; out-of-range reads as occupied (the max cost).
    pub fn cost_at(&self, cell: (i64, i64)) -> u8 {
        match self.linear_index(cell) {
            Some(idx) => self.data[idx],
            None => u8::MAX,
        }
    }

    pub fn is_occupied(&self, cell: (i64, i64), threshold: u8) -> bool {
        self.cost_at(cell) >= threshold
    }

    pub fn is_occupied_world(&self, x: f64, y: f64, threshold: u8) -> bool {
        self.is_occupied(self.world_to_cell(x, y), threshold)
    }

    pub fn set_cost(&mut self, cell: (i64, i64), cost: u8) {
        if let Some(idx) = self.linear_index(cell) {
            self.data[idx] = self.data[idx].max(cost);
        }
    }
}
