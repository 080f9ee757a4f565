use std::f32::consts::TAU;

use macroquad::prelude::Vec2;
use rand::Rng;
use rapier2d::prelude::RigidBodyHandle;
use slotmap::SlotMap;

use crate::config::SimulationConfig;
use crate::error::SimError;
use crate::physics::{ColliderKind, ColliderTag, ContactStarted, PhysicsWorld};

use super::robot::{Robot, RobotKey};
use super::sim::StopHandle;
use super::waypoint::WaypointGraph;

pub type ResourceId = u32;

/// A collectible disc somewhere in the arena.
pub struct Resource {
    pub id: ResourceId,
    pub radius: f32,
    pub body: RigidBodyHandle,
}

/// The arena: waypoint grid, homebase drop-off region and the live resource
/// set, plus the collection rule applied after each physics step.
pub struct Environment {
    pub waypoints: WaypointGraph,
    pub resources: Vec<Resource>,
    pub collected_count: u32,
    /// Simulated time at which the last generated resource came home.
    pub finished_early_time: Option<f32>,
    pub homebase_body: RigidBodyHandle,
    pub homebase_size: f32,
    total_generated: u32,
    next_resource_id: ResourceId,
}

impl Environment {
    pub fn new(physics: &mut PhysicsWorld, config: &SimulationConfig) -> Result<Self, SimError> {
        let waypoints = WaypointGraph::generate_grid(
            config.waypoint_spacing,
            config.waypoint_cols,
            config.waypoint_rows,
            config.homebase_threshold,
        )?;
        let homebase_body = physics.add_homebase_body(
            Vec2::ZERO,
            config.homebase_size,
            ColliderTag::new(ColliderKind::Homebase, 0),
        );
        Ok(Self {
            waypoints,
            resources: Vec::new(),
            collected_count: 0,
            finished_early_time: None,
            homebase_body,
            homebase_size: config.homebase_size,
            total_generated: 0,
            next_resource_id: 0,
        })
    }

    /// Scatter `count` resources at a random angle and distance inside the
    /// annulus `[min_dist, max_dist]` around home.
    pub fn generate_resources(
        &mut self,
        physics: &mut PhysicsWorld,
        count: u32,
        radius: f32,
        min_dist: f32,
        max_dist: f32,
    ) {
        let mut rng = rand::thread_rng();
        for _ in 0..count {
            let angle = rng.gen_range(0.0..TAU);
            let dist = rng.gen_range(min_dist..=max_dist);
            let position = Vec2::new(angle.cos() * dist, angle.sin() * dist);
            self.spawn_resource(physics, position, radius);
        }
    }

    pub fn spawn_resource(
        &mut self,
        physics: &mut PhysicsWorld,
        position: Vec2,
        radius: f32,
    ) -> ResourceId {
        let id = self.next_resource_id;
        self.next_resource_id += 1;
        let body = physics.add_resource_body(
            position,
            radius,
            ColliderTag::new(ColliderKind::Resource, id as u64),
        );
        self.resources.push(Resource { id, radius, body });
        self.total_generated += 1;
        id
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn total_generated(&self) -> u32 {
        self.total_generated
    }

    pub fn all_collected(&self) -> bool {
        self.total_generated > 0 && self.collected_count == self.total_generated
    }

    /// Post-step pass over the contacts the physics step reported. A
    /// resource touching the homebase is collected: every tethered robot is
    /// detached, the body removed and the counter bumped. Once the last
    /// generated resource comes home the completion time is recorded and the
    /// scheduler asked to stop.
    pub fn process_contacts(
        &mut self,
        events: &[ContactStarted],
        physics: &mut PhysicsWorld,
        robots: &mut SlotMap<RobotKey, Robot>,
        sim_time: f32,
        stop: &StopHandle,
    ) {
        for event in events {
            if let Some(id) = event.homebase_resource() {
                self.collect_resource(id as ResourceId, physics, robots);
            }
        }
        if self.all_collected() && self.finished_early_time.is_none() {
            self.finished_early_time = Some(sim_time);
            println!("All {} resources collected at t={sim_time:.2}s", self.total_generated);
            stop.request();
        }
    }

    fn collect_resource(
        &mut self,
        id: ResourceId,
        physics: &mut PhysicsWorld,
        robots: &mut SlotMap<RobotKey, Robot>,
    ) {
        // A stale event for an already-collected resource is possible when
        // several contacts begin in one step; count each resource once.
        let Some(index) = self.resources.iter().position(|r| r.id == id) else {
            return;
        };
        for (_, robot) in robots.iter_mut() {
            if robot.tether.map(|t| t.resource) == Some(id) {
                robot.detach(physics);
            }
        }
        let resource = self.resources.remove(index);
        physics.remove_body(resource.body);
        self.collected_count += 1;
        println!(
            "Collected resource {id} ({} / {})",
            self.collected_count, self.total_generated
        );
    }
}
