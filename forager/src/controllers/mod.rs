pub mod patrol;
pub mod recruit;

pub use patrol::PatrolController;
pub use recruit::{RecruitController, RobotState};

use std::f32::consts::FRAC_PI_4;

use macroquad::prelude::Vec2;
use rand::seq::SliceRandom;
use shared::{Pid, normalize_angle, relative_bearing};

use crate::error::SimError;
use crate::simulation::actuators::Actuators;
use crate::simulation::sensors::SensorView;
use crate::simulation::waypoint::{Direction, WaypointGraph, WaypointId};

/// One robot behavior. Every species shares this single seam: the robot
/// entity hands over its refreshed sensor view and actuator block once per
/// tick, after the scheduler's sense phase. Controllers never touch another
/// robot directly; peers influence each other only through sensed signals.
pub trait Controller: Send {
    fn update(&mut self, view: &SensorView<'_>, actuators: &mut Actuators) -> Result<(), SimError>;
}

/// Pick the next exploration target among `from`'s neighbors: uniformly
/// among the not-yet-visited ones, falling back to visited neighbors. A node
/// with no neighbors at all is a graph-construction bug and fatal.
pub fn random_waypoint(
    graph: &WaypointGraph,
    from: WaypointId,
    visited: &[WaypointId],
) -> Result<WaypointId, SimError> {
    let waypoint = graph
        .get(from)
        .ok_or_else(|| SimError::Config(format!("unknown waypoint id {from}")))?;

    let mut unvisited = Vec::new();
    let mut fallback = Vec::new();
    for dir in Direction::ALL {
        if let Some(neighbor) = waypoint.neighbor(dir) {
            if visited.contains(&neighbor) {
                fallback.push(neighbor);
            } else {
                unvisited.push(neighbor);
            }
        }
    }

    let pool = if unvisited.is_empty() { fallback } else { unvisited };
    pool.choose(&mut rand::thread_rng())
        .copied()
        .ok_or(SimError::NoWaypointToTarget(from))
}

/// Resolve a global bearing into one of four 90° compass sectors (centered
/// right/up/left/down) and take that neighbor of `from`, falling back to a
/// random neighbor when the slot is empty.
pub fn waypoint_by_bearing(
    graph: &WaypointGraph,
    from: WaypointId,
    bearing: f32,
    visited: &[WaypointId],
) -> Result<WaypointId, SimError> {
    let angle = normalize_angle(bearing);
    let dir = if angle > FRAC_PI_4 && angle <= 3.0 * FRAC_PI_4 {
        Direction::Up
    } else if angle > 3.0 * FRAC_PI_4 && angle <= 5.0 * FRAC_PI_4 {
        Direction::Left
    } else if angle > 5.0 * FRAC_PI_4 && angle <= 7.0 * FRAC_PI_4 {
        Direction::Down
    } else {
        Direction::Right
    };

    let waypoint = graph
        .get(from)
        .ok_or_else(|| SimError::Config(format!("unknown waypoint id {from}")))?;
    match waypoint.neighbor(dir) {
        Some(neighbor) => Ok(neighbor),
        None => random_waypoint(graph, from, visited),
    }
}

/// PID steering on the relative bearing to `target`. The correction is
/// clamped to [-1, 1] and split across the differential drive as
/// base ∓ turn.
pub(crate) fn steer_toward(
    pid: &mut Pid,
    view: &SensorView<'_>,
    target: Vec2,
    base_speed: f32,
    actuators: &mut Actuators,
) {
    let bearing = relative_bearing(view.position.into(), view.heading, target.into());
    let turn = pid.compute(bearing, view.dt).clamp(-1.0, 1.0);
    actuators.set_motor_values(base_speed - turn, base_speed + turn);
}
