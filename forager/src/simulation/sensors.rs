use macroquad::prelude::Vec2;

use super::environment::ResourceId;
use super::robot::RobotKey;
use super::waypoint::WaypointGraph;

/// What a lidar ray ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LidarHit {
    Robot(RobotKey),
    Resource(ResourceId),
}

/// One lidar ray reading. `angle` is the ray's offset from the heading.
#[derive(Debug, Clone, Copy)]
pub struct LidarReading {
    pub angle: f32,
    pub distance: f32,
    pub hit: Option<LidarHit>,
}

/// A beacon seen this tick: distance and bearing relative to the robot that
/// discovered it.
#[derive(Debug, Clone, Copy)]
pub struct LightDetection {
    pub distance: f32,
    pub bearing: f32,
}

/// Per-robot sensor buffers. Lidar is recomputed every sense phase; light
/// detections and the inbox accumulate during sensing and are cleared in the
/// cleanup phase, so a controller always reads exactly one tick's worth.
///
/// Note on the message channel: delivery is gated by the *receiver's* comms
/// radius, not the sender's. That is how the system behaves in the field and
/// is kept as-is rather than silently "fixed" to sender-gated broadcast.
#[derive(Default)]
pub struct SensorSuite {
    pub lidar: Vec<LidarReading>,
    pub lights: Vec<LightDetection>,
    pub inbox: Vec<String>,
}

impl SensorSuite {
    /// End-of-tick clear of the per-tick channels.
    pub fn clear_transient(&mut self) {
        self.lights.clear();
        self.inbox.clear();
    }
}

/// Everything a controller may observe for one tick: the robot's own pose
/// and speed, the refreshed sensor buffers, and the shared waypoint graph.
pub struct SensorView<'a> {
    pub position: Vec2,
    pub heading: f32,
    pub speed: f32,
    /// Seconds covered by this tick, for PID integration.
    pub dt: f32,
    pub lidar: &'a [LidarReading],
    pub lights: &'a [LightDetection],
    pub inbox: &'a [String],
    pub graph: &'a WaypointGraph,
}
