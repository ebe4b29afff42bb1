//! Ego vehicle descriptor: pose, twist, chassis geometry and limits.

use super::pose::{Pose2d, Twist2d};
use serde::{Deserialize, Serialize};

/// Static chassis geometry and actuation limits.
///
/// Invariant: all limits are strictly positive; `wheelbase >= body_length / 4`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chassis {
    pub wheelbase: f64,
    pub track_width: f64,
    pub body_length: f64,
    pub body_width: f64,
    pub body_height: f64,
    pub wheel_radius: f64,
    pub wheel_width: f64,
    pub v_max: f64,
    pub a_max: f64,
    pub omega_max: f64,
    pub steer_max: f64,
}

impl Chassis {
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("wheelbase", self.wheelbase),
            ("track_width", self.track_width),
            ("body_length", self.body_length),
            ("body_width", self.body_width),
            ("body_height", self.body_height),
            ("wheel_radius", self.wheel_radius),
            ("wheel_width", self.wheel_width),
            ("v_max", self.v_max),
            ("a_max", self.a_max),
            ("omega_max", self.omega_max),
            ("steer_max", self.steer_max),
        ] {
            if !(v > 0.0) {
                return Err(format!("chassis limit '{name}' must be strictly positive, got {v}"));
            }
        }
        if self.wheelbase < self.body_length / 4.0 {
            return Err(format!(
                "wheelbase ({}) must be >= body_length/4 ({})",
                self.wheelbase,
                self.body_length / 4.0
            ));
        }
        Ok(())
    }

    /// Maximum curvature reachable at `steer_max`, derived from the
    /// bicycle-model relation `kappa = tan(steer) / wheelbase`.
    pub fn max_curvature(&self) -> f64 {
        self.steer_max.tan().abs() / self.wheelbase
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgoVehicle {
    pub pose: Pose2d,
    pub twist: Twist2d,
    pub chassis: Chassis,
    /// Seconds since epoch.
    pub timestamp: f64,
}

impl EgoVehicle {
    pub fn validate(&self) -> Result<(), String> {
        self.chassis.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_chassis() -> Chassis {
        Chassis {
            wheelbase: 2.8,
            track_width: 1.6,
            body_length: 4.5,
            body_width: 1.8,
            body_height: 1.5,
            wheel_radius: 0.3,
            wheel_width: 0.2,
            v_max: 5.0,
            a_max: 2.0,
            omega_max: 1.0,
            steer_max: 0.6,
        }
    }

    #[test]
    fn valid_chassis_passes() {
        assert!(ok_chassis().validate().is_ok());
    }

    #[test]
    fn nonpositive_limit_rejected() {
        let mut c = ok_chassis();
        c.v_max = 0.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn wheelbase_too_short_rejected() {
        let mut c = ok_chassis();
        c.wheelbase = 0.1;
        assert!(c.validate().is_err());
    }
}
