//! Wire envelope and message codec. Kept as a dedicated conversion boundary
//! between planning-result types and JSON wire frames, rather than inlining
//! JSON construction into the cycle controller.

use crate::error::{PlannerError, Result};
use crate::types::snapshot::WorldTickSnapshot;
use crate::types::{BevObstacles, DynamicObstacle, EgoVehicle, GridConfig, PlanningResult, PlanningTask};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "navsim.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub topic: String,
    pub data: serde_json::Value,
}

/// Builds the `/room/<room_id>/<kind>` topic string.
pub fn topic(room_id: &str, kind: &str) -> String {
    format!("/room/{room_id}/{kind}")
}

/// Strips the `/room/<room_id>/` prefix from a topic, returning the kind
/// suffix if it matches this room. Topics for other rooms or malformed
/// topics return `None` and are ignored by the caller.
fn kind_of(topic: &str, room_id: &str) -> Option<String> {
    let prefix = format!("/room/{room_id}/");
    topic.strip_prefix(&prefix).map(|s| s.to_string())
}

pub fn parse_envelope(text: &str) -> Result<WireEnvelope> {
    serde_json::from_str(text).map_err(PlannerError::from)
}

/// Decoded forms of the two inbound message kinds this adapter recognizes.
/// Any other topic is ignored at the call site rather than erroring.
pub enum InboundMessage {
    WorldTick(WorldTickSnapshot),
    DebugControl { enable: bool },
    Unrecognized,
}

/// Parses one inbound text frame. Malformed frames are reported as
/// `PlannerError::MalformedInput` so the caller can log and discard them
/// rather than treating them as fatal.
pub fn decode_inbound(text: &str, room_id: &str) -> Result<InboundMessage> {
    let envelope = parse_envelope(text).map_err(|e| PlannerError::MalformedInput(e.to_string()))?;
    let kind = match kind_of(&envelope.topic, room_id) {
        Some(k) => k,
        None => return Ok(InboundMessage::Unrecognized),
    };
    match kind.as_str() {
        "world_tick" => {
            let snapshot: WorldTickSnapshot = serde_json::from_value(envelope.data)
                .map_err(|e| PlannerError::MalformedInput(format!("world_tick: {e}")))?;
            if snapshot.schema != SCHEMA_VERSION {
                log::warn!(
                    "world_tick schema mismatch: expected {}, got {} (tick_id={})",
                    SCHEMA_VERSION,
                    snapshot.schema,
                    snapshot.tick_id
                );
            }
            Ok(InboundMessage::WorldTick(snapshot))
        }
        "perception/debug/control" => {
            let control: WireDebugControl = serde_json::from_value(envelope.data)
                .map_err(|e| PlannerError::MalformedInput(format!("perception/debug/control: {e}")))?;
            Ok(InboundMessage::DebugControl { enable: control.enable })
        }
        _ => Ok(InboundMessage::Unrecognized),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireDebugControl {
    pub enable: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireTrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub t: f64,
    pub s: f64,
    pub kappa: f64,
    pub v: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePlanUpdate {
    pub schema_ver: String,
    pub tick_id: u64,
    pub stamp: f64,
    pub status: String,
    pub n_points: usize,
    pub compute_ms: f64,
    pub trajectory: Vec<WireTrajectoryPoint>,
    pub summary: String,
}

/// Encodes a `plan_update` frame from a planning result. `status` is
/// `"ok"` or `"failed"`; on failure the trajectory is still whatever safe
/// fallback the controller built (a single stationary point).
pub fn encode_plan_update(room_id: &str, tick_id: u64, stamp: f64, status: &str, result: &PlanningResult) -> Result<String> {
    let trajectory: Vec<WireTrajectoryPoint> = result
        .trajectory
        .iter()
        .map(|p| WireTrajectoryPoint {
            x: p.pose.x,
            y: p.pose.y,
            yaw: p.pose.yaw(),
            t: p.time_from_start_s,
            s: p.path_length_m,
            kappa: p.curvature,
            v: p.twist.speed(),
        })
        .collect();
    let summary = if status == "ok" {
        format!("{} produced {} points", result.planner_name, trajectory.len())
    } else {
        format!("{}: {}", result.planner_name, result.failure_reason)
    };
    let update = WirePlanUpdate {
        schema_ver: SCHEMA_VERSION.into(),
        tick_id,
        stamp,
        status: status.into(),
        n_points: trajectory.len(),
        compute_ms: result.computation_time_ms,
        trajectory,
        summary,
    };
    let envelope = WireEnvelope {
        topic: topic(room_id, "plan_update"),
        data: serde_json::to_value(update)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireHeartbeat {
    pub schema_ver: String,
    pub stamp: f64,
    pub ws_rx: u64,
    pub ws_tx: u64,
    pub dropped_ticks: u64,
    pub loop_hz: f64,
    pub compute_ms_p50: f64,
}

pub fn encode_heartbeat(room_id: &str, heartbeat: WireHeartbeat) -> Result<String> {
    let envelope = WireEnvelope {
        topic: topic(room_id, "control/heartbeat"),
        data: serde_json::to_value(heartbeat)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireOccupancyGridFrame {
    config: GridConfig,
    grid_data: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireDebugFrame {
    schema_ver: String,
    stamp: f64,
    ego: EgoVehicle,
    task: PlanningTask,
    occupancy_grid: Option<WireOccupancyGridFrame>,
    bev_obstacles: Option<BevObstacles>,
    dynamic_obstacles: Vec<DynamicObstacle>,
}

/// Encodes a `perception/debug` frame from the current context: the
/// occupancy grid (row-major data reshaped into rows for readability on the
/// wire), the BEV obstacle decomposition, and dynamic obstacles. Only
/// published while the inbound `perception/debug/control{enable}` toggle is
/// on.
pub fn encode_debug_frame(room_id: &str, stamp: f64, context: &crate::types::PlanningContext) -> Result<String> {
    let occupancy_grid = context.occupancy_grid.as_ref().map(|grid| {
        let w = grid.config.width_cells;
        let rows = grid.data.chunks(w).map(|row| row.to_vec()).collect();
        WireOccupancyGridFrame {
            config: grid.config,
            grid_data: rows,
        }
    });
    let frame = WireDebugFrame {
        schema_ver: SCHEMA_VERSION.into(),
        stamp,
        ego: context.ego,
        task: context.task,
        occupancy_grid,
        bev_obstacles: context.bev_obstacles.clone(),
        dynamic_obstacles: context.dynamic_obstacles.clone(),
    };
    let envelope = WireEnvelope {
        topic: topic(room_id, "perception/debug"),
        data: serde_json::to_value(frame)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}
