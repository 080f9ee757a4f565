use macroquad::prelude::Conf;
use serde::Deserialize;

// Window constants
pub const DEFAULT_WINDOW_WIDTH: f32 = 1280.0;
pub const DEFAULT_WINDOW_HEIGHT: f32 = 720.0;

/// Full parameter set for one simulation instance. Loaded from a TOML file
/// with per-field defaults, then overridden by CLI flags.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    /// World extent hint used by the camera (the arena spans ±arena_size/2).
    pub arena_size: f32,
    /// Fixed logic/physics steps per second.
    pub tick_rate: u32,
    /// Render and throttle to the display, or run batch and unthrottled.
    pub realtime: bool,
    /// Simulated-seconds budget for batch runs. `None` runs until the
    /// environment signals completion.
    pub max_sim_seconds: Option<f32>,

    // Colony composition
    pub robot_count: u32,
    pub battery_mass: f32,
    pub motor_mass: f32,
    pub ignore_battery: bool,
    pub robot_collision: bool,

    // Sensor ranges
    pub num_lidar_rays: usize,
    pub lidar_range: f32,
    pub light_range: f32,
    pub comms_range: f32,

    // Waypoint grid
    pub waypoint_spacing: f32,
    pub waypoint_cols: u32,
    pub waypoint_rows: u32,
    /// Nodes within this distance of the origin are flagged homebase.
    pub homebase_threshold: f32,
    /// Side length of the homebase drop-off region at the origin.
    pub homebase_size: f32,

    // Resource field (annulus around home)
    pub resource_count: u32,
    pub resource_radius: f32,
    pub resource_min_dist: f32,
    pub resource_max_dist: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            arena_size: 2200.0,
            tick_rate: 60,
            realtime: true,
            max_sim_seconds: None,
            robot_count: 10,
            battery_mass: 15.0,
            motor_mass: 1.0,
            ignore_battery: true,
            robot_collision: false,
            num_lidar_rays: 8,
            lidar_range: 50.0,
            light_range: 300.0,
            comms_range: 300.0,
            waypoint_spacing: 90.0,
            waypoint_cols: 21,
            waypoint_rows: 21,
            homebase_threshold: 80.0,
            homebase_size: 75.0,
            resource_count: 10,
            resource_radius: 50.0,
            resource_min_dist: 400.0,
            resource_max_dist: 800.0,
        }
    }
}

impl SimulationConfig {
    /// Seconds per logic tick.
    pub fn delta_time(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

pub fn window_conf() -> Conf {
    Conf {
        window_title: "Forager".to_owned(),
        window_width: DEFAULT_WINDOW_WIDTH as i32,
        window_height: DEFAULT_WINDOW_HEIGHT as i32,
        high_dpi: true,
        ..Default::default()
    }
}
