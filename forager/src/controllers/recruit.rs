use std::cmp::Ordering;

use macroquad::prelude::Vec2;
use rand::Rng;
use shared::Pid;

use crate::error::SimError;
use crate::simulation::actuators::Actuators;
use crate::simulation::environment::ResourceId;
use crate::simulation::sensors::{LidarHit, SensorView};
use crate::simulation::waypoint::WaypointId;

use super::{Controller, random_waypoint, steer_toward, waypoint_by_bearing};

/// Prefix of the broadcast return path:
/// `retrieve-path:<qualifier>:<comma-separated waypoint ids>`.
pub const PATH_PREFIX: &str = "retrieve-path:";

/// Fraction of the running max speed below which a carrier starts
/// recruiting.
const RECRUITMENT_THRESHOLD: f32 = 0.2;
const BASE_SPEED: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotState {
    /// Random walk over the waypoint grid, watching for resources and
    /// recruitment lights.
    Search,
    /// Tow the held resource home along the visited stack, broadcasting the
    /// return path and adopting shorter ones.
    Retrieve,
    /// Rendezvous toward the closest recruitment light.
    Join,
    /// Parked. Never entered automatically; flip `state` by hand when
    /// debugging.
    Wait,
}

/// The foraging species: explore at random, tow finds home, call for help
/// when stalled and answer calls from peers.
pub struct RecruitController {
    pub state: RobotState,
    pid: Pid,
    /// Current target node, if any.
    pub target: Option<WaypointId>,
    /// Visited nodes in order; read backwards it is the path home.
    pub visited: Vec<WaypointId>,
    /// Running maximum of the robot's own speed, the stall reference.
    max_speed: f32,
    /// Tie-break token carried on broadcasts; regenerated on adoption.
    qualifier: u32,
}

impl RecruitController {
    pub fn new() -> Self {
        Self {
            state: RobotState::Search,
            pid: Pid::new(7.0, 0.2, 0.4),
            target: None,
            visited: Vec::new(),
            max_speed: 0.0,
            qualifier: fresh_qualifier(),
        }
    }

    fn search(&mut self, view: &SensorView<'_>, actuators: &mut Actuators) -> Result<(), SimError> {
        actuators.set_beacon(false);

        // An empty stack means a fresh start: home is both the first target
        // and the root of every return path.
        if self.visited.is_empty() {
            let home = view
                .graph
                .homebase()
                .ok_or_else(|| SimError::Config("no homebase waypoint in graph".into()))?;
            self.visited.push(home.id);
            self.target = Some(home.id);
        }
        if self.target.is_none() {
            self.target = self.visited.last().copied();
        }
        let Some(target_id) = self.target else {
            return Err(SimError::Config("search state without a target".into()));
        };
        let target = view
            .graph
            .get(target_id)
            .ok_or_else(|| SimError::Config(format!("unknown waypoint id {target_id}")))?;

        if let Some(resource) = detect_resource(view) {
            actuators.attach_to_resource(resource);
            self.state = RobotState::Retrieve;
            self.target = None;
            self.qualifier = fresh_qualifier();
        } else if view.position.distance(target.position) < view.graph.spacing / 4.0 {
            if self.visited.last() != Some(&target_id) {
                self.visited.push(target_id);
            }
            self.target = Some(random_waypoint(view.graph, target_id, &self.visited)?);
        } else if !view.lights.is_empty() && !self.visited.is_empty() {
            self.state = RobotState::Join;
        } else {
            self.steer(view, target.position, actuators);
        }
        Ok(())
    }

    fn retrieve(&mut self, view: &SensorView<'_>, actuators: &mut Actuators) -> Result<(), SimError> {
        if self.target.is_none() {
            match self.visited.pop() {
                Some(next) => self.target = Some(next),
                None => {
                    // Attached while standing on home; nothing to walk back.
                    self.state = RobotState::Search;
                    return Ok(());
                }
            }
        }

        // A stalled carrier calls for help.
        actuators.set_beacon(view.speed < self.max_speed * RECRUITMENT_THRESHOLD);

        // Share the best-known return path.
        let own = encode_path(self.qualifier, &self.visited);
        actuators.set_message(Some(own.clone()));

        // Consensus over everything heard this tick: strictly shorter paths
        // win outright, equal-length paths win on the lower qualifier.
        let mut adopted = false;
        for message in view.inbox {
            if message == &own {
                continue;
            }
            let Some((qualifier, ids)) = decode_path(message) else {
                continue;
            };
            // A peer that already made it home broadcasts an empty path;
            // nothing to adopt there.
            if ids.is_empty() || !ids.iter().all(|id| view.graph.get(*id).is_some()) {
                continue;
            }
            match ids.len().cmp(&self.visited.len()) {
                Ordering::Greater => {}
                Ordering::Less => {
                    self.visited = ids;
                    adopted = true;
                }
                Ordering::Equal => {
                    if qualifier < self.qualifier {
                        self.visited = ids;
                        adopted = true;
                    }
                }
            }
        }
        if adopted {
            self.qualifier = fresh_qualifier();
            // The old target belonged to the old path; re-pop from the
            // adopted one.
            self.target = self.visited.pop();
        }

        let Some(target_id) = self.target else {
            self.state = RobotState::Search;
            return Ok(());
        };
        let target = view
            .graph
            .get(target_id)
            .ok_or_else(|| SimError::Config(format!("unknown waypoint id {target_id}")))?;
        if view.position.distance(target.position) < view.graph.spacing / 4.0 {
            match self.visited.pop() {
                Some(next) => self.target = Some(next),
                None => {
                    // Walked the whole path back: drop into exploration.
                    self.state = RobotState::Search;
                    self.target = None;
                    return Ok(());
                }
            }
        }

        if let Some(id) = self.target {
            if let Some(waypoint) = view.graph.get(id) {
                self.steer(view, waypoint.position, actuators);
            }
        }
        Ok(())
    }

    fn join(&mut self, view: &SensorView<'_>, actuators: &mut Actuators) -> Result<(), SimError> {
        if let Some(resource) = detect_resource(view) {
            actuators.attach_to_resource(resource);
            self.state = RobotState::Retrieve;
            self.target = None;
            self.qualifier = fresh_qualifier();
            return Ok(());
        }
        if view.lights.is_empty() {
            // The caller went quiet; back to exploring.
            self.state = RobotState::Search;
            return Ok(());
        }

        let Some(&last_visited) = self.visited.last() else {
            self.state = RobotState::Search;
            return Ok(());
        };
        let Some(closest) = view
            .lights
            .iter()
            .min_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
        else {
            self.state = RobotState::Search;
            return Ok(());
        };
        let global_bearing = view.heading + closest.bearing;
        let target_id = waypoint_by_bearing(view.graph, last_visited, global_bearing, &self.visited)?;
        self.target = Some(target_id);
        let target = view
            .graph
            .get(target_id)
            .ok_or_else(|| SimError::Config(format!("unknown waypoint id {target_id}")))?;

        if view.position.distance(target.position) < view.graph.spacing / 4.0 {
            // Keep extending the path home while closing in on the light;
            // the next tick resolves against the new stack top.
            if self.visited.last() != Some(&target_id) {
                self.visited.push(target_id);
            }
        } else {
            self.steer(view, target.position, actuators);
        }
        Ok(())
    }

    fn steer(&mut self, view: &SensorView<'_>, target: Vec2, actuators: &mut Actuators) {
        steer_toward(&mut self.pid, view, target, BASE_SPEED, actuators);
    }
}

impl Default for RecruitController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for RecruitController {
    fn update(&mut self, view: &SensorView<'_>, actuators: &mut Actuators) -> Result<(), SimError> {
        if view.speed > self.max_speed {
            self.max_speed = view.speed;
        }
        match self.state {
            RobotState::Search => self.search(view, actuators),
            RobotState::Retrieve => self.retrieve(view, actuators),
            RobotState::Join => self.join(view, actuators),
            RobotState::Wait => {
                actuators.set_motor_values(0.0, 0.0);
                Ok(())
            }
        }
    }
}

fn fresh_qualifier() -> u32 {
    rand::thread_rng().gen_range(0..=u32::MAX)
}

/// First resource visible on the lidar sweep, if any.
fn detect_resource(view: &SensorView<'_>) -> Option<ResourceId> {
    view.lidar.iter().find_map(|reading| match reading.hit {
        Some(LidarHit::Resource(id)) => Some(id),
        _ => None,
    })
}

/// `retrieve-path:<qualifier>:<id,id,...>` (ids may be empty).
pub fn encode_path(qualifier: u32, ids: &[WaypointId]) -> String {
    let ids = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{PATH_PREFIX}{qualifier}:{ids}")
}

/// Parse a broadcast path. Returns `None` for anything that is not a
/// well-formed path message; foreign chatter is simply ignored.
pub fn decode_path(message: &str) -> Option<(u32, Vec<WaypointId>)> {
    let rest = message.strip_prefix(PATH_PREFIX)?;
    let (qualifier, ids) = rest.split_once(':')?;
    let qualifier = qualifier.parse::<u32>().ok()?;
    if ids.is_empty() {
        return Some((qualifier, Vec::new()));
    }
    let ids = ids
        .split(',')
        .map(|id| id.parse::<WaypointId>().ok())
        .collect::<Option<Vec<_>>>()?;
    Some((qualifier, ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::sensors::{LidarReading, LightDetection};
    use crate::simulation::waypoint::WaypointGraph;

    fn graph() -> WaypointGraph {
        WaypointGraph::generate_grid(100.0, 3, 3, 50.0).unwrap()
    }

    fn view<'a>(
        graph: &'a WaypointGraph,
        position: Vec2,
        lidar: &'a [LidarReading],
        lights: &'a [LightDetection],
        inbox: &'a [String],
    ) -> SensorView<'a> {
        SensorView {
            position,
            heading: 0.0,
            speed: 0.0,
            dt: 1.0 / 60.0,
            lidar,
            lights,
            inbox,
            graph,
        }
    }

    fn resource_ping(id: ResourceId) -> LidarReading {
        LidarReading {
            angle: 0.0,
            distance: 12.0,
            hit: Some(LidarHit::Resource(id)),
        }
    }

    #[test]
    fn test_path_round_trip() {
        let encoded = encode_path(42, &[4, 5, 8]);
        assert_eq!(encoded, "retrieve-path:42:4,5,8");
        assert_eq!(decode_path(&encoded), Some((42, vec![4, 5, 8])));
        assert_eq!(decode_path("retrieve-path:7:"), Some((7, vec![])));
        assert_eq!(decode_path("weather:sunny"), None);
        assert_eq!(decode_path("retrieve-path:x:1,2"), None);
    }

    #[test]
    fn test_search_attaches_and_switches_to_retrieve_same_tick() {
        let graph = graph();
        let mut controller = RecruitController::new();
        let lidar = [resource_ping(3)];
        let mut actuators = Actuators::default();

        controller
            .update(&view(&graph, Vec2::new(500.0, 500.0), &lidar, &[], &[]), &mut actuators)
            .unwrap();

        assert_eq!(controller.state, RobotState::Retrieve);
        assert_eq!(controller.target, None);
        assert_eq!(actuators.take_attach_request(), Some(3));
    }

    #[test]
    fn test_search_joins_on_light() {
        let graph = graph();
        let mut controller = RecruitController::new();
        let lights = [LightDetection { distance: 80.0, bearing: 0.5 }];
        let mut actuators = Actuators::default();

        // Far from the initial home target so the arrival branch stays cold.
        controller
            .update(&view(&graph, Vec2::new(500.0, 500.0), &[], &lights, &[]), &mut actuators)
            .unwrap();

        assert_eq!(controller.state, RobotState::Join);
    }

    #[test]
    fn test_retrieve_pops_home_and_returns_to_search_when_stack_empties() {
        let graph = graph();
        let mut controller = RecruitController::new();
        controller.state = RobotState::Retrieve;
        controller.visited = vec![4];
        controller.target = None;
        let home = graph.get(4).unwrap().position;
        let mut actuators = Actuators::default();

        controller
            .update(&view(&graph, home, &[], &[], &[]), &mut actuators)
            .unwrap();

        assert_eq!(controller.state, RobotState::Search);
        assert_eq!(controller.target, None);
        assert!(controller.visited.is_empty());
    }

    #[test]
    fn test_shorter_path_adopted_regardless_of_qualifier() {
        let graph = graph();
        let mut controller = RecruitController::new();
        controller.state = RobotState::Retrieve;
        controller.visited = vec![4, 5, 2];
        controller.target = Some(8);
        controller.qualifier = 50;
        let inbox = [encode_path(99, &[4, 1])];
        let mut actuators = Actuators::default();

        controller
            .update(&view(&graph, Vec2::new(500.0, 500.0), &[], &[], &inbox), &mut actuators)
            .unwrap();

        // Adoption replaced the stack and forced a re-pop.
        assert_eq!(controller.visited, vec![4]);
        assert_eq!(controller.target, Some(1));
        assert_ne!(controller.qualifier, 50);
    }

    #[test]
    fn test_equal_length_tie_breaks_on_lower_qualifier() {
        let graph = graph();
        let inbox_low = [encode_path(10, &[4, 3, 6])];
        let inbox_high = [encode_path(50, &[4, 3, 6])];

        // Holder of qualifier 50 adopts the path carried by 10.
        let mut holder_50 = RecruitController::new();
        holder_50.state = RobotState::Retrieve;
        holder_50.visited = vec![4, 5, 2];
        holder_50.target = Some(8);
        holder_50.qualifier = 50;
        let mut actuators = Actuators::default();
        holder_50
            .update(&view(&graph, Vec2::new(500.0, 500.0), &[], &[], &inbox_low), &mut actuators)
            .unwrap();
        assert_eq!(holder_50.visited, vec![4, 3]);
        assert_eq!(holder_50.target, Some(6));

        // Holder of qualifier 10 ignores the path carried by 50.
        let mut holder_10 = RecruitController::new();
        holder_10.state = RobotState::Retrieve;
        holder_10.visited = vec![4, 5, 2];
        holder_10.target = Some(8);
        holder_10.qualifier = 10;
        let mut actuators = Actuators::default();
        holder_10
            .update(&view(&graph, Vec2::new(500.0, 500.0), &[], &[], &inbox_high), &mut actuators)
            .unwrap();
        assert_eq!(holder_10.visited, vec![4, 5, 2]);
        assert_eq!(holder_10.target, Some(8));
        assert_eq!(holder_10.qualifier, 10);
    }

    #[test]
    fn test_longer_and_empty_paths_ignored() {
        let graph = graph();
        let mut controller = RecruitController::new();
        controller.state = RobotState::Retrieve;
        controller.visited = vec![4, 5];
        controller.target = Some(2);
        controller.qualifier = 50;
        let inbox = [encode_path(1, &[4, 3, 6, 7]), encode_path(1, &[])];
        let mut actuators = Actuators::default();

        controller
            .update(&view(&graph, Vec2::new(500.0, 500.0), &[], &[], &inbox), &mut actuators)
            .unwrap();

        assert_eq!(controller.visited, vec![4, 5]);
        assert_eq!(controller.target, Some(2));
    }

    #[test]
    fn test_retrieve_beacon_follows_stall_threshold() {
        let graph = graph();
        let mut controller = RecruitController::new();
        controller.state = RobotState::Retrieve;
        controller.visited = vec![4];
        controller.target = Some(5);
        controller.max_speed = 100.0;
        let mut actuators = Actuators::default();

        // Crawling at a tenth of max speed: recruit.
        let mut slow = view(&graph, Vec2::new(500.0, 500.0), &[], &[], &[]);
        slow.speed = 10.0;
        controller.update(&slow, &mut actuators).unwrap();
        assert!(actuators.beacon());

        // Back up to speed: beacon off.
        let mut fast = view(&graph, Vec2::new(500.0, 500.0), &[], &[], &[]);
        fast.speed = 90.0;
        controller.update(&fast, &mut actuators).unwrap();
        assert!(!actuators.beacon());
    }

    #[test]
    fn test_join_resolves_light_bearing_to_neighbor() {
        let graph = graph();
        let mut controller = RecruitController::new();
        controller.state = RobotState::Join;
        controller.visited = vec![4];
        // Two lights; the closer one sits dead ahead with heading 0, so the
        // rendezvous target is the right-hand neighbor of node 4.
        let lights = [
            LightDetection { distance: 200.0, bearing: 3.0 },
            LightDetection { distance: 60.0, bearing: 0.0 },
        ];
        let mut actuators = Actuators::default();

        controller
            .update(&view(&graph, Vec2::new(500.0, 500.0), &[], &lights, &[]), &mut actuators)
            .unwrap();

        assert_eq!(controller.state, RobotState::Join);
        assert_eq!(controller.target, Some(5));
    }

    #[test]
    fn test_join_without_lights_returns_to_search() {
        let graph = graph();
        let mut controller = RecruitController::new();
        controller.state = RobotState::Join;
        controller.visited = vec![4];
        let mut actuators = Actuators::default();

        controller
            .update(&view(&graph, Vec2::new(500.0, 500.0), &[], &[], &[]), &mut actuators)
            .unwrap();

        assert_eq!(controller.state, RobotState::Search);
    }

    #[test]
    fn test_wait_zeroes_motors() {
        let graph = graph();
        let mut controller = RecruitController::new();
        controller.state = RobotState::Wait;
        let mut actuators = Actuators::default();
        actuators.set_motor_values(1.0, 1.0);

        controller
            .update(&view(&graph, Vec2::ZERO, &[], &[], &[]), &mut actuators)
            .unwrap();

        assert_eq!(actuators.motors(), (0.0, 0.0));
    }
}
