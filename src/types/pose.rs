//! 2D pose and body-frame velocity.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Wraps `yaw` into `(-pi, pi]`.
fn normalize_yaw(yaw: f64) -> f64 {
    let mut y = (yaw + PI) % (2.0 * PI);
    if y <= 0.0 {
        y += 2.0 * PI;
    }
    y - PI
}

/// A 2D rigid-body pose in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,
    yaw: f64,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            yaw: normalize_yaw(yaw),
        }
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Sets yaw, re-normalizing to `(-pi, pi]`.
    pub fn set_yaw(&mut self, yaw: f64) {
        self.yaw = normalize_yaw(yaw);
    }

    pub fn distance_to(&self, other: &Pose2d) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// First-order advance by a body-frame twist over `dt` seconds: translate
    /// along the current heading, then rotate by `omega * dt`.
    pub fn advance(&self, twist: &Twist2d, dt: f64) -> Pose2d {
        let (s, c) = self.yaw.sin_cos();
        let dx = (twist.vx * c - twist.vy * s) * dt;
        let dy = (twist.vx * s + twist.vy * c) * dt;
        Pose2d::new(self.x + dx, self.y + dy, self.yaw + twist.omega * dt)
    }
}

/// Body-frame linear and angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist2d {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl Twist2d {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn yaw_normalizes_into_range() {
        let p = Pose2d::new(0.0, 0.0, 3.0 * PI);
        assert!(p.yaw() > -PI && p.yaw() <= PI);
    }

    #[test]
    fn yaw_boundary_stays_at_pi() {
        let p = Pose2d::new(0.0, 0.0, PI);
        assert_relative_eq!(p.yaw(), PI, epsilon = 1e-9);
    }

    #[test]
    fn advance_with_zero_dt_is_identity() {
        let p = Pose2d::new(1.0, 2.0, 0.3);
        let t = Twist2d::new(1.0, 0.0, 0.5);
        let p2 = p.advance(&t, 0.0);
        assert_relative_eq!(p.x, p2.x);
        assert_relative_eq!(p.y, p2.y);
        assert_relative_eq!(p.yaw(), p2.yaw());
    }

    #[test]
    fn advance_moves_along_heading() {
        let p = Pose2d::new(0.0, 0.0, 0.0);
        let t = Twist2d::new(2.0, 0.0, 0.0);
        let p2 = p.advance(&t, 1.0);
        assert_relative_eq!(p2.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(p2.y, 0.0, epsilon = 1e-9);
    }
}
