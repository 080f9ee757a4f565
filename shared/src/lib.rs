pub mod angles;
pub mod pid;

pub use angles::{global_bearing, normalize_angle, relative_bearing};
pub use pid::Pid;
