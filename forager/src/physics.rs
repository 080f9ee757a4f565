//! Narrow facade over the rigid-body engine. The rest of the crate only ever
//! needs: step by a fixed dt and read back contact events, read a pose or
//! velocity, cast a lidar ray, run a range point query, and manage the
//! removable tether joint. No solver type leaks past this module except the
//! opaque handles.

use std::sync::Mutex;

use macroquad::prelude::Vec2;
use rapier2d::prelude::*;

/// Linear velocity bleed, matching the lossy top-down arena the controllers
/// were tuned against.
const LINEAR_DAMPING: f32 = 0.7;
const ANGULAR_DAMPING: f32 = 2.0;
/// Resources are light enough to tow but stop quickly once released.
const RESOURCE_DENSITY: f32 = 0.002;
const RESOURCE_DAMPING: f32 = 2.0;

const GROUP_ROBOT: Group = Group::GROUP_1;
const GROUP_RESOURCE: Group = Group::GROUP_2;
const GROUP_HOMEBASE: Group = Group::GROUP_3;

/// What a collider belongs to, recovered from its user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderKind {
    Robot,
    Resource,
    Homebase,
}

/// Entity tag stored in collider user data so queries and contact events can
/// be mapped back without keeping a side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColliderTag {
    pub kind: ColliderKind,
    pub id: u64,
}

impl ColliderTag {
    pub fn new(kind: ColliderKind, id: u64) -> Self {
        Self { kind, id }
    }

    fn encode(self) -> u128 {
        let kind = match self.kind {
            ColliderKind::Robot => 1u128,
            ColliderKind::Resource => 2u128,
            ColliderKind::Homebase => 3u128,
        };
        (kind << 64) | self.id as u128
    }

    fn decode(raw: u128) -> Option<Self> {
        let kind = match raw >> 64 {
            1 => ColliderKind::Robot,
            2 => ColliderKind::Resource,
            3 => ColliderKind::Homebase,
            _ => return None,
        };
        Some(Self { kind, id: raw as u64 })
    }
}

/// One contact that began during the last `step` call.
#[derive(Debug, Clone, Copy)]
pub struct ContactStarted {
    pub first: ColliderTag,
    pub second: ColliderTag,
}

impl ContactStarted {
    /// If this contact is a homebase/resource pair, the resource id.
    pub fn homebase_resource(&self) -> Option<u64> {
        match (self.first, self.second) {
            (a, b) if a.kind == ColliderKind::Homebase && b.kind == ColliderKind::Resource => {
                Some(b.id)
            }
            (a, b) if b.kind == ColliderKind::Homebase && a.kind == ColliderKind::Resource => {
                Some(a.id)
            }
            _ => None,
        }
    }
}

/// Collects collision events raised during a step so they can be consumed in
/// a single-threaded pass afterwards, instead of mutating simulation state
/// from inside engine callbacks.
#[derive(Default)]
struct EventSink {
    collisions: Mutex<Vec<CollisionEvent>>,
}

impl EventHandler for EventSink {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut collisions) = self.collisions.lock() {
            collisions.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    events: EventSink,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            // Top-down arena: no gravity, motion comes from the wheel forces.
            gravity: vector![0.0, 0.0],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            events: EventSink::default(),
        }
    }

    /// Advance the world by `dt` and return the contacts that began during
    /// the step.
    pub fn step(&mut self, dt: f32) -> Vec<ContactStarted> {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.events,
        );

        let mut started = Vec::new();
        let mut collisions = match self.events.collisions.lock() {
            Ok(collisions) => collisions,
            Err(poisoned) => poisoned.into_inner(),
        };
        for event in collisions.drain(..) {
            if let CollisionEvent::Started(a, b, _) = event {
                if let (Some(first), Some(second)) = (self.tag_of(a), self.tag_of(b)) {
                    started.push(ContactStarted { first, second });
                }
            }
        }
        started
    }

    /// Spawn a differential-drive chassis: a dynamic square body. When
    /// `collide_with_robots` is off, robot-robot contacts are still detected
    /// by queries but not resolved by the solver.
    pub fn add_robot_body(
        &mut self,
        position: Vec2,
        angle: f32,
        side_length: f32,
        mass: f32,
        collide_with_robots: bool,
        tag: ColliderTag,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y])
            .rotation(angle)
            .linear_damping(LINEAR_DAMPING)
            .angular_damping(ANGULAR_DAMPING)
            .can_sleep(false)
            .build();
        let handle = self.bodies.insert(body);

        let half = side_length / 2.0;
        let solver_filter = if collide_with_robots {
            Group::ALL
        } else {
            Group::ALL.difference(GROUP_ROBOT)
        };
        let collider = ColliderBuilder::cuboid(half, half)
            .density(mass / (side_length * side_length))
            .collision_groups(InteractionGroups::new(GROUP_ROBOT, Group::ALL))
            .solver_groups(InteractionGroups::new(GROUP_ROBOT, solver_filter))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(tag.encode())
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.query_pipeline.update(&self.colliders);
        handle
    }

    /// Spawn a towable resource disc.
    pub fn add_resource_body(&mut self, position: Vec2, radius: f32, tag: ColliderTag) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y])
            .linear_damping(RESOURCE_DAMPING)
            .angular_damping(RESOURCE_DAMPING)
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::ball(radius)
            .density(RESOURCE_DENSITY)
            .collision_groups(InteractionGroups::new(GROUP_RESOURCE, Group::ALL))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(tag.encode())
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.query_pipeline.update(&self.colliders);
        handle
    }

    /// Spawn the fixed homebase drop-off region: a sensor, so it reports
    /// contacts without pushing anything around.
    pub fn add_homebase_body(&mut self, position: Vec2, size: f32, tag: ColliderTag) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![position.x, position.y])
            .build();
        let handle = self.bodies.insert(body);
        let half = size / 2.0;
        let collider = ColliderBuilder::cuboid(half, half)
            .sensor(true)
            .collision_groups(InteractionGroups::new(GROUP_HOMEBASE, Group::ALL))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(tag.encode())
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.query_pipeline.update(&self.colliders);
        handle
    }

    /// Remove a body together with its colliders and any attached joints.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        self.query_pipeline.update(&self.colliders);
    }

    /// World position and heading of a body.
    pub fn pose(&self, handle: RigidBodyHandle) -> (Vec2, f32) {
        let body = &self.bodies[handle];
        let t = body.translation();
        (Vec2::new(t.x, t.y), body.rotation().angle())
    }

    pub fn speed(&self, handle: RigidBodyHandle) -> f32 {
        self.bodies[handle].linvel().norm()
    }

    /// Nearest hit along a ray, excluding the caster's own body and any
    /// sensor colliders. Returns the hit tag and distance.
    pub fn cast_ray(
        &self,
        origin: Vec2,
        angle: f32,
        max_dist: f32,
        exclude: RigidBodyHandle,
    ) -> Option<(ColliderTag, f32)> {
        let ray = Ray::new(point![origin.x, origin.y], vector![angle.cos(), angle.sin()]);
        let filter = QueryFilter::default()
            .exclude_sensors()
            .exclude_rigid_body(exclude);
        let (handle, toi) =
            self.query_pipeline
                .cast_ray(&self.bodies, &self.colliders, &ray, max_dist, true, filter)?;
        self.tag_of(handle).map(|tag| (tag, toi))
    }

    /// Range point query: robot bodies intersecting the disc at `center`.
    /// Returns each robot's tag and body position.
    pub fn robots_within(
        &self,
        center: Vec2,
        radius: f32,
        exclude: Option<RigidBodyHandle>,
    ) -> Vec<(ColliderTag, Vec2)> {
        let mut filter =
            QueryFilter::default().groups(InteractionGroups::new(Group::ALL, GROUP_ROBOT));
        if let Some(body) = exclude {
            filter = filter.exclude_rigid_body(body);
        }
        let mut found = Vec::new();
        self.query_pipeline.intersections_with_shape(
            &self.bodies,
            &self.colliders,
            &Isometry::translation(center.x, center.y),
            &Ball::new(radius),
            filter,
            |handle| {
                if let Some(tag) = self.tag_of(handle) {
                    let t = self.colliders[handle].translation();
                    found.push((tag, Vec2::new(t.x, t.y)));
                }
                true
            },
        );
        found
    }

    /// Pin a robot to a resource with a rope joint anchored at the robot's
    /// center and the closest point on the resource rim, holding the
    /// separation captured at attach time.
    pub fn attach_tether(
        &mut self,
        robot: RigidBodyHandle,
        resource: RigidBodyHandle,
        resource_radius: f32,
    ) -> ImpulseJointHandle {
        let (robot_pos, _) = self.pose(robot);
        let resource_iso = *self.bodies[resource].position();
        let resource_pos = Vec2::new(resource_iso.translation.x, resource_iso.translation.y);

        let to_robot = robot_pos - resource_pos;
        let dir = if to_robot.length() > f32::EPSILON {
            to_robot / to_robot.length()
        } else {
            Vec2::X
        };
        let rim_world = resource_pos + dir * resource_radius;
        let rim_local = resource_iso.inverse_transform_point(&point![rim_world.x, rim_world.y]);
        let length = (robot_pos - rim_world).length();

        let joint = RopeJointBuilder::new(length)
            .local_anchor1(point![0.0, 0.0])
            .local_anchor2(rim_local)
            .build();
        self.impulse_joints.insert(robot, resource, joint, true)
    }

    pub fn release_tether(&mut self, joint: ImpulseJointHandle) {
        self.impulse_joints.remove(joint, true);
    }

    /// Apply this tick's wheel forces. Forward is the body's local +x axis;
    /// the wheels sit at local (0, ±half_width).
    pub fn apply_wheel_forces(
        &mut self,
        handle: RigidBodyHandle,
        left_force: f32,
        right_force: f32,
        half_width: f32,
    ) {
        let body = &mut self.bodies[handle];
        body.reset_forces(true);
        let iso = *body.position();
        let forward = iso * vector![1.0, 0.0];
        let left_point = iso * point![0.0, half_width];
        let right_point = iso * point![0.0, -half_width];
        body.add_force_at_point(forward * left_force, left_point, true);
        body.add_force_at_point(forward * right_force, right_point, true);
    }

    fn tag_of(&self, handle: ColliderHandle) -> Option<ColliderTag> {
        self.colliders
            .get(handle)
            .and_then(|c| ColliderTag::decode(c.user_data))
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}
