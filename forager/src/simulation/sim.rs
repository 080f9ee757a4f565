use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use macroquad::prelude::Vec2;
use rapier2d::prelude::RigidBodyHandle;
use shared::relative_bearing;
use slotmap::{KeyData, SlotMap};

use crate::config::SimulationConfig;
use crate::controllers::Controller;
use crate::error::SimError;
use crate::physics::PhysicsWorld;

use super::environment::{Environment, ResourceId};
use super::robot::{Robot, RobotKey, RobotSpec};
use super::sensors::LightDetection;

pub const COLLECTED_RESOURCES: &str = "collected_resources";
pub const FINISHED_EARLY_TIME: &str = "finished_early_time";

/// Idempotent cooperative stop request. Observed at tick boundaries by the
/// logic role and once per frame by the render role; nothing is preempted.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Named counters handed back to the caller of a batch run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub counters: HashMap<String, f64>,
}

impl RunReport {
    pub fn get(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }
}

/// The tick scheduler: owns the physics world, the environment and the
/// entity list, and advances them in lockstep. Each tick steps physics by
/// the fixed timestep, lets the environment consume the step's contact
/// events, then runs every robot's sense phase, then every act phase, then
/// every cleanup phase. The full-phase barriers mean each robot senses a
/// consistent, already-finalized previous tick regardless of entity order.
pub struct Simulation {
    pub config: SimulationConfig,
    pub physics: PhysicsWorld,
    pub environment: Environment,
    pub robots: SlotMap<RobotKey, Robot>,
    pub tick: u64,
    pub sim_time: f32,
    delta_time: f32,
    counters: HashMap<String, f64>,
    stop: StopHandle,
}

impl Simulation {
    pub fn new(config: &SimulationConfig) -> Result<Self, SimError> {
        let mut physics = PhysicsWorld::new();
        let environment = Environment::new(&mut physics, config)?;
        Ok(Self {
            config: config.clone(),
            physics,
            environment,
            robots: SlotMap::with_key(),
            tick: 0,
            sim_time: 0.0,
            delta_time: config.delta_time(),
            counters: HashMap::new(),
            stop: StopHandle::default(),
        })
    }

    /// Handle for requesting a cooperative stop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn add_robot(
        &mut self,
        spec: RobotSpec,
        position: Vec2,
        angle: f32,
        controller: Box<dyn Controller>,
    ) -> RobotKey {
        let physics = &mut self.physics;
        let config = &self.config;
        self.robots
            .insert_with_key(|key| Robot::new(key, physics, config, spec, position, angle, controller))
    }

    pub fn spawn_resource(&mut self, position: Vec2, radius: f32) -> ResourceId {
        self.environment
            .spawn_resource(&mut self.physics, position, radius)
    }

    /// Scatter the configured resource field.
    pub fn generate_resources(&mut self) {
        self.environment.generate_resources(
            &mut self.physics,
            self.config.resource_count,
            self.config.resource_radius,
            self.config.resource_min_dist,
            self.config.resource_max_dist,
        );
    }

    /// One logic tick: physics, environment events, then the three entity
    /// phases in lockstep.
    pub fn step(&mut self) -> Result<(), SimError> {
        let events = self.physics.step(self.delta_time);
        self.sim_time += self.delta_time;
        self.environment.process_contacts(
            &events,
            &mut self.physics,
            &mut self.robots,
            self.sim_time,
            &self.stop,
        );
        self.sense_phase();
        self.act_phase()?;
        self.cleanup_phase();
        self.tick += 1;
        Ok(())
    }

    /// Batch run for the optimizer path: unthrottled fixed-timestep loop
    /// until the simulated-time budget elapses or the environment requests
    /// an early stop.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        let started = Instant::now();
        let budget_ticks = self
            .config
            .max_sim_seconds
            .map(|secs| (secs * self.config.tick_rate as f32).ceil() as u64);
        while !self.stop.is_requested() {
            if let Some(budget) = budget_ticks {
                if self.tick >= budget {
                    break;
                }
            }
            self.step()?;
        }
        let wall = started.elapsed().as_secs_f32();
        if wall > 0.0 {
            println!(
                "Simulated {:.1}s in {:.2}s wall clock ({:.1}x real time)",
                self.sim_time,
                wall,
                self.sim_time / wall
            );
        }
        Ok(self.report())
    }

    pub fn report(&self) -> RunReport {
        let mut counters = self.counters.clone();
        counters.insert(
            COLLECTED_RESOURCES.to_string(),
            self.environment.collected_count as f64,
        );
        if let Some(t) = self.environment.finished_early_time {
            counters.insert(FINISHED_EARLY_TIME.to_string(), t as f64);
        }
        RunReport { counters }
    }

    fn sense_phase(&mut self) {
        // Lidar sweeps: every robot reads the same post-step world.
        for (_, robot) in self.robots.iter_mut() {
            robot.sense(&self.physics);
        }

        // Snapshot the signal state every robot finalized last tick, so
        // cross-robot delivery below is order-independent within the tick.
        struct Signal {
            key: RobotKey,
            body: RigidBodyHandle,
            position: Vec2,
            beacon: bool,
            light_range: f32,
            comms_range: f32,
            outbox: Option<String>,
        }
        let signals: Vec<Signal> = self
            .robots
            .iter()
            .map(|(key, robot)| {
                let (position, _) = self.physics.pose(robot.body);
                Signal {
                    key,
                    body: robot.body,
                    position,
                    beacon: robot.actuators.beacon(),
                    light_range: robot.light_range,
                    comms_range: robot.comms_range,
                    outbox: robot.actuators.message().map(str::to_string),
                }
            })
            .collect();

        // Light channel: every enabled beacon is discovered by the robots
        // whose bodies lie inside its radius.
        for signal in signals.iter().filter(|s| s.beacon) {
            for (tag, _) in
                self.physics
                    .robots_within(signal.position, signal.light_range, Some(signal.body))
            {
                let key = RobotKey::from(KeyData::from_ffi(tag.id));
                if let Some(robot) = self.robots.get_mut(key) {
                    let (position, heading) = self.physics.pose(robot.body);
                    robot.sensors.lights.push(LightDetection {
                        distance: position.distance(signal.position),
                        bearing: relative_bearing(position.into(), heading, signal.position.into()),
                    });
                }
            }
        }

        // Message channel. Discovery is gated by the receiver's own comms
        // radius (see sensors.rs for why this is kept receiver-side).
        for receiver in &signals {
            let nearby =
                self.physics
                    .robots_within(receiver.position, receiver.comms_range, Some(receiver.body));
            if nearby.is_empty() {
                continue;
            }
            let Some(robot) = self.robots.get_mut(receiver.key) else {
                continue;
            };
            for (tag, _) in nearby {
                let sender = RobotKey::from(KeyData::from_ffi(tag.id));
                if let Some(message) = signals
                    .iter()
                    .find(|s| s.key == sender)
                    .and_then(|s| s.outbox.clone())
                {
                    robot.sensors.inbox.push(message);
                }
            }
        }
    }

    fn act_phase(&mut self) -> Result<(), SimError> {
        for (_, robot) in self.robots.iter_mut() {
            robot.act(
                self.delta_time,
                &mut self.physics,
                &self.environment,
                &mut self.counters,
            )?;
        }
        Ok(())
    }

    fn cleanup_phase(&mut self) {
        for (_, robot) in self.robots.iter_mut() {
            robot.cleanup();
        }
    }
}
