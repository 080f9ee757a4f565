use std::f32::consts::{PI, TAU};

use shared::{Pid, global_bearing, normalize_angle, relative_bearing};

use crate::error::SimError;
use crate::simulation::actuators::Actuators;
use crate::simulation::sensors::SensorView;
use crate::simulation::waypoint::WaypointId;

use super::Controller;

/// Counter bumped once per waypoint arrival.
pub const WAYPOINTS_REACHED: &str = "waypoints_reached";

/// Drives a fixed waypoint track forever, counting arrivals. Mostly useful
/// for tuning steering gains on a known course and as the second species
/// behind the controller seam.
pub struct PatrolController {
    pid: Pid,
    track: Vec<WaypointId>,
    index: usize,
    base_speed: f32,
    /// Scale of the pre-turn counter-steer taken from the lookahead leg;
    /// zero disables it.
    counter_steering: f32,
}

impl PatrolController {
    pub fn new(track: Vec<WaypointId>) -> Self {
        Self::with_gains(track, 3.0, 0.0, 0.3, 0.0)
    }

    pub fn with_gains(
        track: Vec<WaypointId>,
        kp: f32,
        ki: f32,
        kd: f32,
        counter_steering: f32,
    ) -> Self {
        Self {
            pid: Pid::new(kp, ki, kd),
            track,
            index: 0,
            base_speed: 0.5,
            counter_steering,
        }
    }
}

impl Controller for PatrolController {
    fn update(&mut self, view: &SensorView<'_>, actuators: &mut Actuators) -> Result<(), SimError> {
        if self.track.is_empty() {
            actuators.set_motor_values(0.0, 0.0);
            return Ok(());
        }

        let resolve = |id: WaypointId| {
            view.graph
                .get(id)
                .ok_or_else(|| SimError::Config(format!("patrol track references unknown waypoint {id}")))
        };

        let arrive = view.graph.spacing / 4.0;
        if view.position.distance(resolve(self.track[self.index])?.position) < arrive {
            self.index = (self.index + 1) % self.track.len();
            actuators.increment_counter(WAYPOINTS_REACHED);
        }

        let target = resolve(self.track[self.index])?;
        let lookahead = resolve(self.track[(self.index + 1) % self.track.len()])?;

        let bearing = relative_bearing(view.position.into(), view.heading, target.position.into());
        let distance_to_target = view.position.distance(target.position);

        // Lean into the upcoming leg while closing in on the turn.
        let mut adjusted = bearing;
        if distance_to_target < view.graph.spacing && distance_to_target > view.graph.spacing / 2.0 {
            let target_angle = global_bearing(view.position.into(), target.position.into());
            let lookahead_angle = global_bearing(target.position.into(), lookahead.position.into());
            let mut leg_change = normalize_angle(lookahead_angle - target_angle);
            if leg_change > PI {
                leg_change -= TAU;
            }
            adjusted += -leg_change * self.counter_steering;
        }

        let turn = self.pid.compute(adjusted, view.dt).clamp(-1.0, 1.0);
        actuators.set_motor_values(self.base_speed - turn, self.base_speed + turn);
        Ok(())
    }
}
