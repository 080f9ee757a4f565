use macroquad::prelude::Vec2;

use crate::error::SimError;

pub type WaypointId = u32;

/// Cardinal neighbor slots of a grid node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }
}

/// One fixed navigation node of the arena's patrol grid. Created once at
/// environment setup and immutable afterwards; neighbors are ids into the
/// owning [`WaypointGraph`].
#[derive(Debug, Clone)]
pub struct Waypoint {
    pub id: WaypointId,
    pub position: Vec2,
    pub neighbors: [Option<WaypointId>; 4],
    pub is_homebase: bool,
}

impl Waypoint {
    pub fn neighbor(&self, dir: Direction) -> Option<WaypointId> {
        self.neighbors[dir.index()]
    }

    pub fn has_neighbors(&self) -> bool {
        self.neighbors.iter().any(|n| n.is_some())
    }

    /// Wire form `<id>,<x>,<y>,<True|False>`.
    pub fn to_message(&self) -> String {
        format!(
            "{},{},{},{}",
            self.id,
            self.position.x,
            self.position.y,
            if self.is_homebase { "True" } else { "False" }
        )
    }

    /// Parse the wire form back into a detached waypoint: id, position and
    /// homebase flag survive, neighbor links never do.
    pub fn from_message(message: &str) -> Result<Waypoint, SimError> {
        let malformed = || SimError::WaypointMessage(message.to_string());
        let mut parts = message.split(',');
        let id = parts
            .next()
            .and_then(|p| p.trim().parse::<WaypointId>().ok())
            .ok_or_else(malformed)?;
        let x = parts
            .next()
            .and_then(|p| p.trim().parse::<f32>().ok())
            .ok_or_else(malformed)?;
        let y = parts
            .next()
            .and_then(|p| p.trim().parse::<f32>().ok())
            .ok_or_else(malformed)?;
        let is_homebase = match parts.next().map(str::trim) {
            Some("True") => true,
            Some("False") => false,
            _ => return Err(malformed()),
        };
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(Waypoint {
            id,
            position: Vec2::new(x, y),
            neighbors: [None; 4],
            is_homebase,
        })
    }
}

/// The fixed four-neighbor grid the robots patrol. One connected component
/// with at least one homebase-flagged node near the origin.
pub struct WaypointGraph {
    waypoints: Vec<Waypoint>,
    pub spacing: f32,
}

impl WaypointGraph {
    /// Build a `cols`×`rows` grid centered on the origin. Nodes within
    /// `homebase_threshold` of the origin are flagged homebase.
    pub fn generate_grid(
        spacing: f32,
        cols: u32,
        rows: u32,
        homebase_threshold: f32,
    ) -> Result<Self, SimError> {
        if cols == 0 || rows == 0 {
            return Err(SimError::Config(format!(
                "waypoint grid must be non-empty, got {cols}x{rows}"
            )));
        }
        if spacing <= 0.0 {
            return Err(SimError::Config(format!(
                "waypoint spacing must be positive, got {spacing}"
            )));
        }

        let x_offset = (cols - 1) as f32 / 2.0;
        let y_offset = (rows - 1) as f32 / 2.0;
        let node_id = |col: u32, row: u32| row * cols + col;

        let mut waypoints = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let position = Vec2::new(
                    (col as f32 - x_offset) * spacing,
                    (row as f32 - y_offset) * spacing,
                );
                let mut neighbors = [None; 4];
                if row + 1 < rows {
                    neighbors[Direction::Up.index()] = Some(node_id(col, row + 1));
                }
                if row > 0 {
                    neighbors[Direction::Down.index()] = Some(node_id(col, row - 1));
                }
                if col > 0 {
                    neighbors[Direction::Left.index()] = Some(node_id(col - 1, row));
                }
                if col + 1 < cols {
                    neighbors[Direction::Right.index()] = Some(node_id(col + 1, row));
                }
                waypoints.push(Waypoint {
                    id: node_id(col, row),
                    position,
                    neighbors,
                    is_homebase: position.length() <= homebase_threshold,
                });
            }
        }

        let graph = Self { waypoints, spacing };
        if graph.homebase().is_none() {
            return Err(SimError::Config(format!(
                "no waypoint within {homebase_threshold} of the origin to flag as homebase"
            )));
        }
        Ok(graph)
    }

    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.get(id as usize)
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// The first homebase-flagged node.
    pub fn homebase(&self) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.is_homebase)
    }
}
