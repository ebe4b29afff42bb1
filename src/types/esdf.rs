//! Signed-distance field (ESDF) sharing an occupancy grid's footprint.

use super::grid::{GridConfig, OccupancyGrid};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedDistanceField {
    pub config: GridConfig,
    /// Meters. Positive outside obstacles, negative inside, clamped to
    /// `+/- max_distance`.
    pub d: Vec<f64>,
    pub max_distance: f64,
}

impl SignedDistanceField {
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

    pub fn distance_at(&self, cell: (i64, i64)) -> f64 {
        match self.linear_index(cell) {
            Some(idx) => self.d[idx],
            None => -self.max_distance,
        }
    }

    pub fn world_to_cell(&self, x: f64, y: f64) -> (i64, i64) {
        let dx = x - self.config.origin.x;
        let dy = y - self.config.origin.y;
        (
            (dx / self.config.resolution_m).floor() as i64,
            (dy / self.config.resolution_m).floor() as i64,
        )
    }

    pub fn distance_at_world(&self, x: f64, y: f64) -> f64 {
        self.distance_at(self.world_to_cell(x, y))
    }

    /// Builds an ESDF from an occupancy grid using the two-pass squared
    /// Euclidean distance transform (Felzenszwalb & Huttenlocher), run once
    /// over the occupied mask and once over the free mask to obtain the
    /// signed result.
    pub fn from_occupancy_grid(grid: &OccupancyGrid, threshold: u8, max_distance: f64) -> Self {
        let w = grid.config.width_cells;
        let h = grid.config.height_cells;
        let res = grid.config.resolution_m;

        let occupied: Vec<bool> = grid.data.iter().map(|&c| c >= threshold).collect();

        let dist_to_occupied = edt_squared(&occupied, w, h);
        let free: Vec<bool> = occupied.iter().map(|&o| !o).collect();
        let dist_to_free = edt_squared(&free, w, h);

        let mut d = vec![0.0f64; w * h];
        for i in 0..w * h {
            let outside = (dist_to_occupied[i]).sqrt() * res;
            let inside = (dist_to_free[i]).sqrt() * res;
            let signed = if occupied[i] { -inside } else { outside };
            d[i] = signed.clamp(-max_distance, max_distance);
        }

        Self {
            config: grid.config,
            d,
            max_distance,
        }
    }
}

/// For each cell, squared Euclidean distance to the nearest `true` cell in
/// `mask` (row-major, width `w`, height `h`). Cells with no `true` cell in
/// the mask get `f64::INFINITY`.
fn edt_squared(mask: &[bool], w: usize, h: usize) -> Vec<f64> {
    const INF: f64 = 1e18;
    let mut f = vec![0.0f64; w * h];
    for i in 0..w * h {
        f[i] = if mask[i] { 0.0 } else { INF };
    }

    // Pass 1: along columns.
    let mut col_buf = vec![0.0f64; h];
    for x in 0..w {
        for y in 0..h {
            col_buf[y] = f[y * w + x];
        }
        let transformed = dt_1d(&col_buf);
        for y in 0..h {
            f[y * w + x] = transformed[y];
        }
    }

    // Pass 2: along rows.
    let mut row_buf = vec![0.0f64; w];
    for y in 0..h {
        for x in 0..w {
            row_buf[x] = f[y * w + x];
        }
        let transformed = dt_1d(&row_buf);
        for x in 0..w {
            f[y * w + x] = transformed[x];
        }
    }

    f
}

/// 1D lower-envelope-of-parabolas squared distance transform.
fn dt_1d(f: &[f64]) -> Vec<f64> {
    let n = f.len();
    let mut d = vec![0.0f64; n];
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        loop {
            let vk = v[k];
            let s = ((f[q] + (q * q) as f64) - (f[vk] + (vk * vk) as f64))
                / (2.0 * q as f64 - 2.0 * vk as f64);
            if s <= z[k] {
                if k == 0 {
                    break;
                }
                k -= 1;
                continue;
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = f64::INFINITY;
            break;
        }
    }
    k = 0;
    for q in 0..n {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let vk = v[k] as f64;
        d[q] = (q as f64 - vk) * (q as f64 - vk) + f[v[k]];
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::pose::Pose2d;

    fn config(w: usize, h: usize, res: f64) -> GridConfig {
        GridConfig {
            origin: Pose2d::new(0.0, 0.0, 0.0),
            resolution_m: res,
            width_cells: w,
            height_cells: h,
        }
    }

    #[test]
    fn free_cells_are_nonnegative_and_occupied_nonpositive() {
        let mut grid = OccupancyGrid::new(config(20, 20, 0.5));
        for y in 8..12 {
            for x in 8..12 {
                grid.set_cost((x, y), 200);
            }
        }
        let esdf = SignedDistanceField::from_occupancy_grid(&grid, 50, 10.0);
        for y in 0..20 {
            for x in 0..20 {
                let occupied = grid.is_occupied((x, y), 50);
                let d = esdf.distance_at((x, y));
                if occupied {
                    assert!(d <= 0.0, "expected occupied cell ({x},{y}) to have d<=0, got {d}");
                } else {
                    assert!(d >= 0.0, "expected free cell ({x},{y}) to have d>=0, got {d}");
                }
            }
        }
    }

    #[test]
    fn distance_matches_manual_nearest_neighbor_for_single_obstacle_cell() {
        let mut grid = OccupancyGrid::new(config(10, 10, 1.0));
        grid.set_cost((5, 5), 200);
        let esdf = SignedDistanceField::from_occupancy_grid(&grid, 50, 100.0);
        // Cell (5,7) is 2 cells away from the only occupied cell.
        let d = esdf.distance_at((5, 7));
        assert!((d - 2.0).abs() < 1e-6, "d={d}");
    }

    #[test]
    fn clamped_to_max_distance() {
        let grid = OccupancyGrid::new(config(5, 5, 1.0));
        let esdf = SignedDistanceField::from_occupancy_grid(&grid, 50, 1.5);
        for v in &esdf.d {
            assert!(*v <= 1.5 + 1e-9);
        }
    }
}
