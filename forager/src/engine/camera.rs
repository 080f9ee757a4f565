use macroquad::prelude::*;

// Camera configuration constants
/// Minimum zoom level allowed (1.0 = full arena view)
const MIN_ZOOM: f32 = 1.0;
/// Maximum zoom level allowed
const MAX_ZOOM: f32 = 50.0;
/// Speed multiplier for zoom operations
const ZOOM_SPEED: f32 = 0.1;

/// A camera over the origin-centered arena that handles zooming and panning.
pub struct GameCamera {
    /// Zoom level (minimum 1.0, higher values zoom in)
    zoom: f32,

    /// Arena span; the world covers ±arena_size/2 on both axes.
    pub arena_size: f32,

    /// The actual macroquad camera object
    pub camera: Camera2D,
}

impl GameCamera {
    pub fn new(arena_size: f32) -> Self {
        let mut camera = Self {
            zoom: 1.0,
            arena_size,
            camera: Camera2D {
                target: Vec2::ZERO,
                ..Default::default()
            },
        };
        camera.update_camera_zoom();
        camera
    }

    pub fn adjust_zoom(&mut self, wheel_movement: f32) {
        let old_zoom = self.zoom;

        // World position under the cursor before the zoom change.
        let mouse_screen_pos = Vec2::from(mouse_position());
        let mouse_world_pos = self.camera.screen_to_world(mouse_screen_pos);

        self.zoom = (self.zoom - wheel_movement * self.zoom * ZOOM_SPEED).clamp(MIN_ZOOM, MAX_ZOOM);

        if old_zoom != self.zoom {
            self.update_camera_zoom();

            // Keep the point under the cursor fixed while zooming.
            let new_mouse_world_pos = self.camera.screen_to_world(mouse_screen_pos);
            self.move_by(mouse_world_pos - new_mouse_world_pos);
        }
    }

    pub fn move_by(&mut self, movement: Vec2) {
        self.camera.target += movement;
        self.adjust_camera_bounds();
    }

    fn update_camera_zoom(&mut self) {
        // Square arena: correct the wider screen axis to avoid distortion.
        let screen_ratio = screen_width() / screen_height();
        let (horizontal_adjustment, vertical_adjustment) = if screen_ratio >= 1.0 {
            (1.0 / screen_ratio, 1.0)
        } else {
            (1.0, screen_ratio)
        };

        // Negative y: the physics world is y-up.
        self.camera.zoom = vec2(
            2.0 / self.arena_size * self.zoom * horizontal_adjustment,
            -2.0 / self.arena_size * self.zoom * vertical_adjustment,
        );
    }

    // Keep the view inside the arena.
    fn adjust_camera_bounds(&mut self) {
        let half_view = self.arena_size / (2.0 * self.zoom);
        let limit = (self.arena_size / 2.0 - half_view).max(0.0);
        self.camera.target.x = self.camera.target.x.clamp(-limit, limit);
        self.camera.target.y = self.camera.target.y.clamp(-limit, limit);
    }

    /// Converts the current mouse screen position to world coordinates
    pub fn get_mouse_world_pos(&self) -> Vec2 {
        self.camera.screen_to_world(Vec2::from(mouse_position()))
    }

    /// Resets the camera to its default position and zoom
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.camera.target = Vec2::ZERO;
        self.update_camera_zoom();
        self.adjust_camera_bounds();
    }

    /// Handles window resize events.
    pub fn handle_resize(&mut self) {
        self.update_camera_zoom();
        self.adjust_camera_bounds();
    }
}
