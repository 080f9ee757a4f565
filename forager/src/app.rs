use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use macroquad::prelude::*;
use ::rand::Rng;

use crate::config::SimulationConfig;
use crate::controllers::RecruitController;
use crate::engine::Renderer;
use crate::simulation::{RobotSpec, RunReport, Simulation};

/// Pose snapshot published by the logic thread after every tick; the render
/// role reads nothing else.
#[derive(Clone, Default)]
pub struct RenderSnapshot {
    pub tick: u64,
    pub sim_time: f32,
    pub collected: u32,
    pub total: u32,
    pub robots: Vec<RobotView>,
    pub resources: Vec<ResourceView>,
    pub tethers: Vec<(Vec2, Vec2)>,
}

#[derive(Clone, Copy)]
pub struct RobotView {
    pub position: Vec2,
    pub heading: f32,
    pub side: f32,
    pub beacon: bool,
    pub light_range: f32,
}

#[derive(Clone, Copy)]
pub struct ResourceView {
    pub position: Vec2,
    pub radius: f32,
}

#[derive(Clone, Copy)]
pub struct WaypointView {
    pub position: Vec2,
    pub is_homebase: bool,
}

/// Build a simulation from the config: the resource field plus a colony of
/// recruit-foragers starting on the homebase with spread-out headings.
pub fn build_simulation(config: &SimulationConfig) -> Result<Simulation> {
    let mut sim = Simulation::new(config)?;
    sim.generate_resources();
    let spec = RobotSpec::new(config.battery_mass, config.motor_mass);
    let mut rng = ::rand::thread_rng();
    for _ in 0..config.robot_count {
        let angle = rng.gen_range(0.0..TAU);
        sim.add_robot(spec, Vec2::ZERO, angle, Box::new(RecruitController::new()));
    }
    Ok(sim)
}

/// Batch mode: no render role, logic runs unthrottled to completion.
pub fn run_batch(config: &SimulationConfig) -> Result<RunReport> {
    let mut sim = build_simulation(config)?;
    Ok(sim.run()?)
}

/// Real-time mode. The logic role runs on its own thread; this (main)
/// thread is the render role. The two meet on a zero-capacity rendezvous
/// channel: the render role offers one frame token per vsync'd frame and the
/// logic role takes exactly one token per tick, so neither side ever runs
/// ahead of the other.
pub async fn run_realtime(config: SimulationConfig) {
    let mut sim = match build_simulation(&config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Failed to set up simulation: {e}");
            return;
        }
    };

    let waypoints: Vec<WaypointView> = sim
        .environment
        .waypoints
        .waypoints()
        .iter()
        .map(|w| WaypointView {
            position: w.position,
            is_homebase: w.is_homebase,
        })
        .collect();

    let stop = sim.stop_handle();
    let snapshot = Arc::new(Mutex::new(make_snapshot(&sim)));
    let (frame_tx, frame_rx) = mpsc::sync_channel::<()>(0);

    let logic_stop = stop.clone();
    let logic_snapshot = Arc::clone(&snapshot);
    let delta_time = sim.delta_time();
    let budget_ticks = config
        .max_sim_seconds
        .map(|secs| (secs * config.tick_rate as f32).ceil() as u64);
    let logic = thread::spawn(move || {
        let tick_alert = Duration::from_secs_f32(delta_time * 1.2);
        while !logic_stop.is_requested() {
            // Wait for the render role to hand over this frame's tick.
            if frame_rx.recv().is_err() {
                break;
            }
            let tick_started = Instant::now();
            if let Err(e) = sim.step() {
                eprintln!("Simulation aborted: {e}");
                logic_stop.request();
                break;
            }
            let elapsed = tick_started.elapsed();
            if elapsed > tick_alert {
                eprintln!(
                    "Warning: tick {} took {:.1}ms, budget is {:.1}ms",
                    sim.tick,
                    elapsed.as_secs_f32() * 1000.0,
                    delta_time * 1000.0
                );
            }
            if let Some(budget) = budget_ticks {
                if sim.tick >= budget {
                    logic_stop.request();
                }
            }
            if let Ok(mut shared) = logic_snapshot.lock() {
                *shared = make_snapshot(&sim);
            }
        }
        sim.report()
    });

    let mut renderer = Renderer::new(config.arena_size, waypoints, config.homebase_size);
    while !stop.is_requested() {
        if is_key_pressed(KeyCode::Escape) {
            stop.request();
            break;
        }
        // Offer this frame's tick; blocks until the logic role takes it.
        if frame_tx.send(()).is_err() {
            break;
        }
        renderer.process_camera_input();
        let current = match snapshot.lock() {
            Ok(shared) => shared.clone(),
            Err(_) => break,
        };
        renderer.render(&current);
        next_frame().await;
    }

    // Dropping our end unblocks a logic role waiting on the rendezvous.
    drop(frame_tx);
    match logic.join() {
        Ok(report) => print_report(&report),
        Err(_) => eprintln!("Logic thread panicked"),
    }
}

pub fn print_report(report: &RunReport) {
    println!("Run counters:");
    let mut names: Vec<&String> = report.counters.keys().collect();
    names.sort();
    for name in names {
        println!("  {name}: {}", report.counters[name]);
    }
}

fn make_snapshot(sim: &Simulation) -> RenderSnapshot {
    let mut robots = Vec::with_capacity(sim.robots.len());
    let mut tethers = Vec::new();
    for (_, robot) in sim.robots.iter() {
        let (position, heading) = sim.physics.pose(robot.body);
        robots.push(RobotView {
            position,
            heading,
            side: robot.spec.side_length(),
            beacon: robot.actuators.beacon(),
            light_range: robot.light_range,
        });
        if let Some(tether) = &robot.tether {
            if let Some(resource) = sim.environment.resource(tether.resource) {
                let (resource_pos, _) = sim.physics.pose(resource.body);
                tethers.push((position, resource_pos));
            }
        }
    }
    let resources = sim
        .environment
        .resources
        .iter()
        .map(|resource| {
            let (position, _) = sim.physics.pose(resource.body);
            ResourceView {
                position,
                radius: resource.radius,
            }
        })
        .collect();
    RenderSnapshot {
        tick: sim.tick,
        sim_time: sim.sim_time,
        collected: sim.environment.collected_count,
        total: sim.environment.total_generated(),
        robots,
        resources,
        tethers,
    }
}
