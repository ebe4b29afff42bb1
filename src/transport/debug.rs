//! Debug-frame publisher: serializes the occupancy grid and obstacle
//! decomposition on demand, gated by the inbound
//! `perception/debug/control{enable}` toggle. No GUI attached here -- this
//! only emits the wire frame.

use super::codec;
use crate::error::Result;
use crate::types::PlanningContext;

#[derive(Debug, Default)]
pub struct DebugFramePublisher {
    enabled: bool,
}

impl DebugFramePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Builds the wire frame if enabled, otherwise returns `None` without
    /// touching the context.
    pub fn maybe_encode(&self, room_id: &str, stamp: f64, context: &PlanningContext) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }
        codec::encode_debug_frame(room_id, stamp, context).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chassis, EgoVehicle, PlanningTask, Pose2d, Twist2d};

    fn context() -> PlanningContext {
        PlanningContext::new(
            0.0,
            5.0,
            EgoVehicle {
                pose: Pose2d::new(0.0, 0.0, 0.0),
                twist: Twist2d::default(),
                chassis: Chassis {
                    wheelbase: 2.8,
                    track_width: 1.6,
                    body_length: 4.5,
                    body_width: 1.8,
                    body_height: 1.5,
                    wheel_radius: 0.3,
                    wheel_width: 0.2,
                    v_max: 2.0,
                    a_max: 2.0,
                    omega_max: 1.0,
                    steer_max: 0.6,
                },
                timestamp: 0.0,
            },
            PlanningTask::goto(Pose2d::new(10.0, 0.0, 0.0)),
        )
    }

    #[test]
    fn disabled_by_default_emits_nothing() {
        let publisher = DebugFramePublisher::new();
        assert!(publisher.maybe_encode("room1", 0.0, &context()).unwrap().is_none());
    }

    #[test]
    fn enabling_emits_a_frame() {
        let mut publisher = DebugFramePublisher::new();
        publisher.set_enabled(true);
        let frame = publisher.maybe_encode("room1", 0.0, &context()).unwrap();
        assert!(frame.is_some());
        assert!(frame.unwrap().contains("perception/debug"));
    }
}
