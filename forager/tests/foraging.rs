//! Scheduler-level scenarios driven through the public API: attachment from
//! lidar contact, the homebase collection rule, signal-channel gating,
//! battery depletion, and a full batch foraging run.

use std::sync::{Arc, Mutex};

use macroquad::prelude::Vec2;

use forager::SimError;
use forager::config::SimulationConfig;
use forager::controllers::{Controller, RecruitController, RobotState};
use forager::physics::{ColliderKind, ColliderTag, ContactStarted};
use forager::simulation::{
    Actuators, COLLECTED_RESOURCES, FINISHED_EARLY_TIME, RobotSpec, SensorView, Simulation,
};

fn test_config() -> SimulationConfig {
    SimulationConfig {
        realtime: false,
        tick_rate: 60,
        max_sim_seconds: None,
        robot_count: 0,
        battery_mass: 15.0,
        motor_mass: 1.0,
        ignore_battery: true,
        robot_collision: false,
        num_lidar_rays: 8,
        lidar_range: 200.0,
        light_range: 300.0,
        comms_range: 300.0,
        waypoint_spacing: 100.0,
        waypoint_cols: 3,
        waypoint_rows: 3,
        homebase_threshold: 50.0,
        homebase_size: 75.0,
        resource_count: 0,
        ..SimulationConfig::default()
    }
}

fn parked() -> Box<RecruitController> {
    let mut controller = RecruitController::new();
    controller.state = RobotState::Wait;
    Box::new(controller)
}

#[test]
fn search_robot_attaches_within_one_tick() {
    let config = test_config();
    let mut sim = Simulation::new(&config).unwrap();
    let resource = sim.spawn_resource(Vec2::new(150.0, 0.0), 30.0);
    let spec = RobotSpec::new(config.battery_mass, config.motor_mass);
    let key = sim.add_robot(spec, Vec2::ZERO, 0.0, Box::new(RecruitController::new()));

    sim.step().unwrap();

    let tether = sim.robots[key].tether.expect("attached in the same tick");
    assert_eq!(tether.resource, resource);
}

#[test]
fn homebase_collision_detaches_all_holders_and_counts_once() {
    let config = test_config();
    let mut sim = Simulation::new(&config).unwrap();
    let resource = sim.spawn_resource(Vec2::new(150.0, 0.0), 30.0);
    let spec = RobotSpec::new(config.battery_mass, config.motor_mass);
    let a = sim.add_robot(spec, Vec2::new(100.0, 20.0), 0.0, parked());
    let b = sim.add_robot(spec, Vec2::new(100.0, -20.0), 0.0, parked());

    sim.robots[a].actuators.attach_to_resource(resource);
    sim.robots[b].actuators.attach_to_resource(resource);
    sim.step().unwrap();
    assert!(sim.robots[a].tether.is_some());
    assert!(sim.robots[b].tether.is_some());

    let contact = ContactStarted {
        first: ColliderTag::new(ColliderKind::Homebase, 0),
        second: ColliderTag::new(ColliderKind::Resource, resource as u64),
    };
    let stop = sim.stop_handle();
    sim.environment
        .process_contacts(&[contact], &mut sim.physics, &mut sim.robots, 1.0, &stop);

    assert!(sim.robots[a].tether.is_none());
    assert!(sim.robots[b].tether.is_none());
    assert_eq!(sim.environment.collected_count, 1);
    assert!(sim.environment.resource(resource).is_none());

    // A stale duplicate event must not double-count.
    sim.environment
        .process_contacts(&[contact], &mut sim.physics, &mut sim.robots, 2.0, &stop);
    assert_eq!(sim.environment.collected_count, 1);

    // That was the only generated resource, so the run is complete.
    assert_eq!(sim.environment.finished_early_time, Some(1.0));
    assert!(stop.is_requested());
}

#[test]
fn reattach_is_noop_and_switching_resources_swaps_tether() {
    let config = test_config();
    let mut sim = Simulation::new(&config).unwrap();
    let first = sim.spawn_resource(Vec2::new(150.0, 0.0), 30.0);
    let second = sim.spawn_resource(Vec2::new(-150.0, 0.0), 30.0);
    let spec = RobotSpec::new(config.battery_mass, config.motor_mass);
    let key = sim.add_robot(spec, Vec2::new(100.0, 0.0), 0.0, parked());

    sim.robots[key].actuators.attach_to_resource(first);
    sim.step().unwrap();
    let original = sim.robots[key].tether.unwrap();
    assert_eq!(original.resource, first);

    // Same resource again: silently ignored, the joint survives untouched.
    sim.robots[key].actuators.attach_to_resource(first);
    sim.step().unwrap();
    let unchanged = sim.robots[key].tether.unwrap();
    assert_eq!(unchanged.joint, original.joint);

    // A different resource detaches the old tether first.
    sim.robots[key].actuators.attach_to_resource(second);
    sim.step().unwrap();
    assert_eq!(sim.robots[key].tether.unwrap().resource, second);
}

/// Records what its robot saw each tick, since the cleanup phase wipes the
/// buffers before a test can inspect them.
struct ProbeController {
    seen: Arc<Mutex<(usize, Vec<String>)>>,
}

impl Controller for ProbeController {
    fn update(&mut self, view: &SensorView<'_>, _actuators: &mut Actuators) -> Result<(), SimError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.0 = view.lights.len();
            seen.1 = view.inbox.to_vec();
        }
        Ok(())
    }
}

#[test]
fn light_is_emitter_gated_and_messages_are_receiver_gated() {
    let config = test_config();
    let mut sim = Simulation::new(&config).unwrap();
    let spec = RobotSpec::new(config.battery_mass, config.motor_mass);

    let emitter = sim.add_robot(spec, Vec2::ZERO, 0.0, parked());

    let near = Arc::new(Mutex::new((0, Vec::new())));
    let near_key = sim.add_robot(
        spec,
        Vec2::new(100.0, 0.0),
        0.0,
        Box::new(ProbeController { seen: Arc::clone(&near) }),
    );
    let far = Arc::new(Mutex::new((0, Vec::new())));
    sim.add_robot(
        spec,
        Vec2::new(900.0, 0.0),
        0.0,
        Box::new(ProbeController { seen: Arc::clone(&far) }),
    );

    // Deaf robot: inside the emitter's comms radius, but its own receive
    // radius is too short. Discovery is gated by the receiver's radius.
    let deaf = Arc::new(Mutex::new((0, Vec::new())));
    let deaf_key = sim.add_robot(
        spec,
        Vec2::new(0.0, 100.0),
        0.0,
        Box::new(ProbeController { seen: Arc::clone(&deaf) }),
    );
    sim.robots[deaf_key].comms_range = 50.0;

    sim.robots[emitter].actuators.set_beacon(true);
    sim.robots[emitter]
        .actuators
        .set_message(Some("retrieve-path:7:4,5".to_string()));
    sim.step().unwrap();

    let near_seen = near.lock().unwrap().clone();
    assert_eq!(near_seen.0, 1, "beacon within range must be detected");
    assert_eq!(near_seen.1, vec!["retrieve-path:7:4,5".to_string()]);

    let far_seen = far.lock().unwrap().clone();
    assert_eq!(far_seen, (0, Vec::new()), "out of both radii");

    let deaf_seen = deaf.lock().unwrap().clone();
    assert_eq!(deaf_seen.0, 1, "light reaches anything inside the beacon radius");
    assert!(deaf_seen.1.is_empty(), "receiver radius gates the message channel");

    // Buffers are per-tick. The outbox was cleared by the emitter's own act
    // phase; switch the beacon off too and the next tick delivers nothing.
    sim.robots[emitter].actuators.set_beacon(false);
    sim.step().unwrap();
    let near_after = near.lock().unwrap().clone();
    assert_eq!(near_after.0, 0);
    assert!(near_after.1.is_empty());
    assert!(sim.robots[near_key].sensors.inbox.is_empty());
}

/// Drives both wheels flat out; for battery drain checks.
struct FullThrottle;

impl Controller for FullThrottle {
    fn update(&mut self, _view: &SensorView<'_>, actuators: &mut Actuators) -> Result<(), SimError> {
        actuators.set_motor_values(1.0, 1.0);
        Ok(())
    }
}

#[test]
fn empty_battery_cuts_drive_force() {
    let mut config = test_config();
    config.ignore_battery = false;
    let mut sim = Simulation::new(&config).unwrap();
    // Tiny battery: capacity 10, full-throttle drain 2/s.
    let spec = RobotSpec::new(0.01, 1.0);
    let key = sim.add_robot(spec, Vec2::ZERO, 0.0, Box::new(FullThrottle));
    assert!((sim.robots[key].battery_remaining - 10.0).abs() < 0.5);

    // 6 simulated seconds outlasts the 5-second charge.
    for _ in 0..360 {
        sim.step().unwrap();
    }
    assert_eq!(sim.robots[key].battery_remaining, 0.0);

    // With the motors dead, damping brings the chassis to a rest.
    for _ in 0..900 {
        sim.step().unwrap();
    }
    assert!(sim.physics.speed(sim.robots[key].body) < 1.0);
}

#[test]
fn single_robot_collects_adjacent_resource() {
    let mut config = test_config();
    config.max_sim_seconds = Some(600.0);
    config.lidar_range = 70.0;
    config.homebase_size = 100.0;
    let mut sim = Simulation::new(&config).unwrap();

    // One resource right next to a non-home grid node.
    sim.spawn_resource(Vec2::new(130.0, 0.0), 35.0);
    let spec = RobotSpec::new(config.battery_mass, config.motor_mass);
    sim.add_robot(spec, Vec2::ZERO, 0.0, Box::new(RecruitController::new()));

    let report = sim.run().unwrap();

    assert_eq!(report.get(COLLECTED_RESOURCES), 1.0);
    assert!(
        report.counters.contains_key(FINISHED_EARLY_TIME),
        "completion time must be recorded, counters: {:?}",
        report.counters
    );
    assert!(report.get(FINISHED_EARLY_TIME) > 0.0);
}
