use std::collections::HashMap;
use std::f32::consts::TAU;

use macroquad::prelude::Vec2;
use rapier2d::prelude::{ImpulseJointHandle, RigidBodyHandle};
use slotmap::{Key, new_key_type};

use crate::config::SimulationConfig;
use crate::controllers::Controller;
use crate::error::SimError;
use crate::physics::{ColliderKind, ColliderTag, PhysicsWorld};

use super::actuators::Actuators;
use super::environment::{Environment, ResourceId};
use super::sensors::{LidarHit, LidarReading, SensorSuite, SensorView};

new_key_type! {
    /// Key for the robot slotmap.
    pub struct RobotKey;
}

/// Physical build of one robot, derived from its two component masses. The
/// chassis is a cube sized by the combined component volume; drive force and
/// power draw scale with the motor mass. No electromechanical detail beyond
/// these bounds.
#[derive(Debug, Clone, Copy)]
pub struct RobotSpec {
    pub battery_mass: f32,
    pub motor_mass: f32,
}

impl RobotSpec {
    const BATTERY_DENSITY: f32 = 0.5;
    const MOTOR_DENSITY: f32 = 0.5;
    const CAPACITY_PER_BATTERY_KG: f32 = 1000.0;
    const FORCE_PER_MOTOR_KG: f32 = 700.0;
    const POWER_PER_MOTOR_KG: f32 = 1.0;

    pub fn new(battery_mass: f32, motor_mass: f32) -> Self {
        Self {
            battery_mass,
            motor_mass,
        }
    }

    pub fn total_volume(&self) -> f32 {
        self.battery_mass / Self::BATTERY_DENSITY + self.motor_mass / Self::MOTOR_DENSITY
    }

    /// Chassis side length: cube root of the combined component volume.
    pub fn side_length(&self) -> f32 {
        self.total_volume().cbrt()
    }

    pub fn mass(&self) -> f32 {
        self.battery_mass + self.motor_mass
    }

    /// Peak force of one wheel motor at full command.
    pub fn max_force(&self) -> f32 {
        self.motor_mass * Self::FORCE_PER_MOTOR_KG
    }

    pub fn battery_capacity(&self) -> f32 {
        self.battery_mass * Self::CAPACITY_PER_BATTERY_KG
    }

    /// Power drawn by the drive at the given motor commands.
    pub fn drive_power(&self, left: f32, right: f32) -> f32 {
        (left.abs() + right.abs()) * self.motor_mass * Self::POWER_PER_MOTOR_KG
    }
}

/// The removable physical link between a robot and the resource it tows.
#[derive(Debug, Clone, Copy)]
pub struct Tether {
    pub resource: ResourceId,
    pub joint: ImpulseJointHandle,
}

/// One robot: a physics body, a sensor/actuator pair and a controller, plus
/// the per-tick lifecycle hooks the scheduler drives (sense, act, cleanup).
pub struct Robot {
    pub key: RobotKey,
    pub body: RigidBodyHandle,
    pub spec: RobotSpec,
    pub sensors: SensorSuite,
    pub actuators: Actuators,
    pub controller: Box<dyn Controller>,
    pub tether: Option<Tether>,

    pub battery_remaining: f32,
    pub ignore_battery: bool,

    pub num_lidar_rays: usize,
    pub lidar_range: f32,
    pub light_range: f32,
    pub comms_range: f32,
}

impl Robot {
    /// Create the robot and its physics body. Called from
    /// `SlotMap::insert_with_key` so the collider tag carries the final key.
    pub fn new(
        key: RobotKey,
        physics: &mut PhysicsWorld,
        config: &SimulationConfig,
        spec: RobotSpec,
        position: Vec2,
        angle: f32,
        controller: Box<dyn Controller>,
    ) -> Self {
        let tag = ColliderTag::new(ColliderKind::Robot, key.data().as_ffi());
        let body = physics.add_robot_body(
            position,
            angle,
            spec.side_length(),
            spec.mass(),
            config.robot_collision,
            tag,
        );
        Self {
            key,
            body,
            spec,
            sensors: SensorSuite::default(),
            actuators: Actuators::default(),
            controller,
            tether: None,
            battery_remaining: spec.battery_capacity(),
            ignore_battery: config.ignore_battery,
            num_lidar_rays: config.num_lidar_rays,
            lidar_range: config.lidar_range,
            light_range: config.light_range,
            comms_range: config.comms_range,
        }
    }

    /// Sense phase: recompute the lidar sweep. Rays are evenly spaced
    /// starting at the current heading, each a nearest-hit query that skips
    /// this robot's own body.
    pub fn sense(&mut self, physics: &PhysicsWorld) {
        let (position, heading) = physics.pose(self.body);
        self.sensors.lidar.clear();
        if self.num_lidar_rays == 0 {
            return;
        }
        let step = TAU / self.num_lidar_rays as f32;
        for ray in 0..self.num_lidar_rays {
            let offset = ray as f32 * step;
            let (distance, hit) =
                match physics.cast_ray(position, heading + offset, self.lidar_range, self.body) {
                    Some((tag, dist)) => (dist, lidar_hit_from_tag(tag)),
                    None => (self.lidar_range, None),
                };
            self.sensors.lidar.push(LidarReading {
                angle: offset,
                distance,
                hit,
            });
        }
    }

    /// Act phase: run the controller over this tick's sensor view, then
    /// apply tether requests, counter bumps, battery drain and wheel forces.
    pub fn act(
        &mut self,
        dt: f32,
        physics: &mut PhysicsWorld,
        env: &Environment,
        counters: &mut HashMap<String, f64>,
    ) -> Result<(), SimError> {
        let (position, heading) = physics.pose(self.body);
        let speed = physics.speed(self.body);

        self.actuators.begin_tick();
        let view = SensorView {
            position,
            heading,
            speed,
            dt,
            lidar: &self.sensors.lidar,
            lights: &self.sensors.lights,
            inbox: &self.sensors.inbox,
            graph: &env.waypoints,
        };
        self.controller.update(&view, &mut self.actuators)?;

        if self.actuators.take_detach_request() {
            self.detach(physics);
        }
        if let Some(resource) = self.actuators.take_attach_request() {
            self.attach(physics, env, resource);
        }
        for name in self.actuators.drain_counter_bumps() {
            *counters.entry(name).or_insert(0.0) += 1.0;
        }

        let (left, right) = self.actuators.motors();
        let mut left_force = left * self.spec.max_force();
        let mut right_force = right * self.spec.max_force();
        if !self.ignore_battery {
            self.battery_remaining -= self.spec.drive_power(left, right) * dt;
            if self.battery_remaining <= 0.0 {
                self.battery_remaining = 0.0;
                left_force = 0.0;
                right_force = 0.0;
            }
        }
        physics.apply_wheel_forces(
            self.body,
            left_force,
            right_force,
            self.spec.side_length() / 2.0,
        );
        Ok(())
    }

    /// Cleanup phase: drop this tick's detections and inbox.
    pub fn cleanup(&mut self) {
        self.sensors.clear_transient();
    }

    fn attach(&mut self, physics: &mut PhysicsWorld, env: &Environment, resource: ResourceId) {
        if let Some(tether) = &self.tether {
            if tether.resource == resource {
                // Already holding this one.
                return;
            }
            self.detach(physics);
        }
        // The resource can be gone by the time the request lands (collected
        // earlier this tick); that is not an error.
        let Some(res) = env.resource(resource) else {
            return;
        };
        let joint = physics.attach_tether(self.body, res.body, res.radius);
        self.tether = Some(Tether { resource, joint });
    }

    /// Release the tether if any. Safe to call when not attached.
    pub fn detach(&mut self, physics: &mut PhysicsWorld) {
        if let Some(tether) = self.tether.take() {
            physics.release_tether(tether.joint);
        }
    }
}

fn lidar_hit_from_tag(tag: ColliderTag) -> Option<LidarHit> {
    match tag.kind {
        ColliderKind::Robot => Some(LidarHit::Robot(RobotKey::from(slotmap::KeyData::from_ffi(
            tag.id,
        )))),
        ColliderKind::Resource => Some(LidarHit::Resource(tag.id as ResourceId)),
        ColliderKind::Homebase => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_chassis_from_component_volumes() {
        // 15 kg battery + 1 kg motor at density 0.5: volume 32, side 32^(1/3).
        let spec = RobotSpec::new(15.0, 1.0);
        assert!((spec.total_volume() - 32.0).abs() < 1e-4);
        assert!((spec.side_length() - 32.0f32.cbrt()).abs() < 1e-4);
        assert_eq!(spec.mass(), 16.0);
    }

    #[test]
    fn test_spec_battery_and_power_scale_with_masses() {
        let spec = RobotSpec::new(2.0, 0.5);
        assert_eq!(spec.battery_capacity(), 2000.0);
        // Power draw follows the commanded magnitudes.
        assert_eq!(spec.drive_power(1.0, 1.0), 1.0);
        assert_eq!(spec.drive_power(-1.0, 1.0), 1.0);
        assert_eq!(spec.drive_power(0.5, 0.0), 0.25);
        // Force scales with motor mass alone.
        assert_eq!(RobotSpec::new(10.0, 1.0).max_force(), RobotSpec::new(1.0, 1.0).max_force());
    }
}
