pub mod actuators;
pub mod environment;
pub mod robot;
pub mod sensors;
pub mod sim;
pub mod waypoint;

// Re-export key types for easier imports
pub use actuators::Actuators;
pub use environment::{Environment, Resource, ResourceId};
pub use robot::{Robot, RobotKey, RobotSpec, Tether};
pub use sensors::{LidarHit, LidarReading, LightDetection, SensorSuite, SensorView};
pub use sim::{COLLECTED_RESOURCES, FINISHED_EARLY_TIME, RunReport, Simulation, StopHandle};
pub use waypoint::{Direction, Waypoint, WaypointGraph, WaypointId};
