use macroquad::prelude::*;

use crate::app::{RenderSnapshot, WaypointView};

use super::GameCamera;

const BACKGROUND: Color = Color::new(0.22, 0.22, 0.24, 1.0);
const WAYPOINT_RADIUS: f32 = 4.0;

/// Draws the arena for the render role: waypoint grid, homebase, resources,
/// tethers and robots, from the pose snapshot the logic thread publishes.
pub struct Renderer {
    pub game_camera: GameCamera,
    waypoints: Vec<WaypointView>,
    homebase_size: f32,
    /// Flag indicating if the camera is currently being dragged.
    is_dragging: bool,
    /// World position where the camera drag started.
    drag_start_world_pos: Vec2,
}

impl Renderer {
    pub fn new(arena_size: f32, waypoints: Vec<WaypointView>, homebase_size: f32) -> Self {
        Self {
            game_camera: GameCamera::new(arena_size),
            waypoints,
            homebase_size,
            is_dragging: false,
            drag_start_world_pos: Vec2::ZERO,
        }
    }

    /// Mouse wheel zoom and left-drag pan.
    pub fn process_camera_input(&mut self) {
        self.game_camera.handle_resize();

        let wheel_movement = mouse_wheel().1;
        if wheel_movement != 0.0 {
            self.game_camera.adjust_zoom(-wheel_movement);
        }

        let current_mouse_pos = Vec2::from(mouse_position());
        if is_mouse_button_pressed(MouseButton::Left) {
            self.is_dragging = true;
            self.drag_start_world_pos = self.game_camera.camera.screen_to_world(current_mouse_pos);
        }
        if self.is_dragging {
            if is_mouse_button_down(MouseButton::Left) {
                let current_world_pos =
                    self.game_camera.camera.screen_to_world(current_mouse_pos);
                let offset = current_world_pos - self.drag_start_world_pos;
                if offset.length_squared() > 0.01 {
                    self.game_camera.move_by(-offset);
                }
            }
            if is_mouse_button_released(MouseButton::Left) {
                self.is_dragging = false;
            }
        }
    }

    pub fn render(&mut self, snapshot: &RenderSnapshot) {
        set_camera(&self.game_camera.camera);
        clear_background(BACKGROUND);

        self.draw_waypoints();
        self.draw_homebase();
        self.draw_resources(snapshot);
        self.draw_tethers(snapshot);
        self.draw_robots(snapshot);

        set_default_camera();
        self.draw_hud(snapshot);
    }

    fn draw_waypoints(&self) {
        for waypoint in &self.waypoints {
            let color = if waypoint.is_homebase { GREEN } else { GRAY };
            draw_circle(waypoint.position.x, waypoint.position.y, WAYPOINT_RADIUS, color);
        }
    }

    fn draw_homebase(&self) {
        let half = self.homebase_size / 2.0;
        draw_rectangle_lines(-half, -half, self.homebase_size, self.homebase_size, 3.0, GREEN);
    }

    fn draw_resources(&self, snapshot: &RenderSnapshot) {
        for resource in &snapshot.resources {
            draw_circle(resource.position.x, resource.position.y, resource.radius, GOLD);
        }
    }

    fn draw_tethers(&self, snapshot: &RenderSnapshot) {
        for (from, to) in &snapshot.tethers {
            draw_line(from.x, from.y, to.x, to.y, 2.0, LIGHTGRAY);
        }
    }

    fn draw_robots(&self, snapshot: &RenderSnapshot) {
        for robot in &snapshot.robots {
            let half = robot.side / 2.0;
            draw_circle(robot.position.x, robot.position.y, half, RED);
            // Heading tick.
            let nose = robot.position
                + Vec2::new(robot.heading.cos(), robot.heading.sin()) * robot.side;
            draw_line(robot.position.x, robot.position.y, nose.x, nose.y, 2.0, BLACK);
            if robot.beacon {
                draw_circle_lines(robot.position.x, robot.position.y, robot.light_range, 1.0, YELLOW);
            }
        }
    }

    fn draw_hud(&self, snapshot: &RenderSnapshot) {
        let line = format!(
            "tick {}  t={:.1}s  collected {}/{}  robots {}",
            snapshot.tick,
            snapshot.sim_time,
            snapshot.collected,
            snapshot.total,
            snapshot.robots.len()
        );
        draw_text(&line, 12.0, 24.0, 24.0, WHITE);
    }
}
