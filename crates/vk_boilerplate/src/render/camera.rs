//! Fly camera driven by input events
//!
//! The camera subscribes to key, mouse and resize events and recomputes its
//! basis and matrices when one arrives. Nothing is recomputed in the render
//! loop; a frame just reads the current matrices.

use crate::config::CameraConfig;
use crate::events::{Event, EventBus, EventHandler, EventKind};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::input::{Key, MouseButton, MouseButtons};
use crate::render::scene::CameraUbo;

/// Pitch is kept strictly inside ±90° so the basis never degenerates
pub const PITCH_LIMIT_DEGREES: f32 = 89.0;

/// Yaw that looks down -Z
pub const DEFAULT_YAW_DEGREES: f32 = -90.0;

/// Events a [`FlyCamera`] subscribes to
pub const FLY_CAMERA_EVENTS: [EventKind; 5] = [
    EventKind::KeyDown,
    EventKind::KeyUp,
    EventKind::MouseButtonDown,
    EventKind::MouseMove,
    EventKind::Resize,
];

/// Yaw/pitch camera with WASD movement and mouse look
///
/// Yaw and pitch are in degrees; yaw -90° looks down -Z. Mouse look is active
/// while the left button is held.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,

    fov_degrees: f32,
    near: f32,
    far: f32,
    aspect: f32,
    move_speed: f32,
    mouse_sensitivity: f32,

    last_cursor: Option<(f64, f64)>,
    view: Mat4,
    projection: Mat4,
}

impl FlyCamera {
    /// Camera at `position` with angles in degrees; pitch is clamped
    pub fn new(config: &CameraConfig, position: Vec3, yaw: f32, pitch: f32, width: u32, height: u32) -> Self {
        let mut camera = Self {
            position,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES),
            front: -Vec3::z(),
            right: Vec3::x(),
            up: Vec3::y(),
            fov_degrees: config.fov_degrees,
            near: config.near,
            far: config.far,
            aspect: aspect_ratio(width, height),
            move_speed: config.move_speed,
            mouse_sensitivity: config.mouse_sensitivity,
            last_cursor: None,
            view: Mat4::identity(),
            projection: Mat4::identity(),
        };
        camera.update_basis();
        camera.update_projection();
        camera
    }

    /// Point the camera from `position` towards `target`
    ///
    /// A target on top of the position has no direction; the camera then
    /// keeps the default orientation down -Z.
    pub fn looking_at(config: &CameraConfig, position: Vec3, target: Vec3, width: u32, height: u32) -> Self {
        let Some(dir) = (target - position).try_normalize(f32::EPSILON) else {
            return Self::new(config, position, DEFAULT_YAW_DEGREES, 0.0, width, height);
        };
        let pitch = utils::rad_to_deg(dir.y.clamp(-1.0, 1.0).asin());
        let yaw = utils::rad_to_deg(dir.z.atan2(dir.x));
        Self::new(config, position, yaw, pitch, width, height)
    }

    /// Turn by the given angles in degrees; pitch saturates at the limit
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);
        self.update_basis();
    }

    /// Move along the camera basis
    pub fn translate(&mut self, forward: f32, right: f32, up: f32) {
        self.position += self.front * forward + self.right * right + Vec3::y() * up;
        self.update_view();
    }

    /// Adopt a new framebuffer size
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
        self.update_projection();
    }

    /// Eye position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Yaw in degrees
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Unit view direction
    pub fn front(&self) -> Vec3 {
        self.front
    }

    /// Unit right vector
    pub fn right(&self) -> Vec3 {
        self.right
    }

    /// Unit up vector
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Width over height
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// World to view matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Projection including the flip into Vulkan clip space
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Projection times view
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Camera block for the shaders
    pub fn ubo(&self) -> CameraUbo {
        CameraUbo::new(&self.view, &self.projection, self.position)
    }

    fn update_basis(&mut self) {
        let yaw = utils::deg_to_rad(self.yaw);
        let pitch = utils::deg_to_rad(self.pitch);
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(&Vec3::y()).normalize();
        self.up = self.right.cross(&self.front).normalize();
        self.update_view();
    }

    fn update_view(&mut self) {
        self.view = Mat4::look_at(self.position, self.position + self.front, self.up);
    }

    fn update_projection(&mut self) {
        // P × X: perspective after the Y/Z flip into Vulkan conventions
        self.projection = Mat4::perspective(utils::deg_to_rad(self.fov_degrees), self.aspect, self.near, self.far)
            * Mat4::vulkan_coordinate_transform();
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

impl EventHandler for FlyCamera {
    fn on_event(&mut self, event: &Event, _bus: &EventBus) {
        match *event {
            Event::KeyDown { key, .. } => {
                let step = self.move_speed;
                match key {
                    Key::W | Key::Up => self.translate(step, 0.0, 0.0),
                    Key::S | Key::Down => self.translate(-step, 0.0, 0.0),
                    Key::D | Key::Right => self.translate(0.0, step, 0.0),
                    Key::A | Key::Left => self.translate(0.0, -step, 0.0),
                    Key::E => self.translate(0.0, 0.0, step),
                    Key::Q => self.translate(0.0, 0.0, -step),
                    _ => {}
                }
            }
            Event::MouseButtonDown { button: MouseButton::Left, x, y } => {
                self.last_cursor = Some((x, y));
            }
            Event::MouseMove { x, y, buttons } => {
                if buttons.contains(MouseButtons::LEFT) {
                    if let Some((last_x, last_y)) = self.last_cursor {
                        let dx = (x - last_x) as f32 * self.mouse_sensitivity;
                        let dy = (y - last_y) as f32 * self.mouse_sensitivity;
                        // Screen y grows downwards
                        self.rotate(dx, -dy);
                    }
                }
                self.last_cursor = Some((x, y));
            }
            Event::Resize { width, height } => self.set_viewport(width, height),
            Event::KeyUp { .. } | Event::MouseButtonDown { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn camera() -> FlyCamera {
        FlyCamera::new(&CameraConfig::default(), Vec3::new(0.0, 0.0, 5.0), -90.0, 0.0, 800, 600)
    }

    #[test]
    fn test_initial_basis_looks_down_negative_z() {
        let cam = camera();
        assert_relative_eq!(cam.front(), -Vec3::z(), epsilon = 1e-5);
        assert_relative_eq!(cam.right(), Vec3::x(), epsilon = 1e-5);
        assert_relative_eq!(cam.up(), Vec3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut cam = camera();
        for _ in 0..100 {
            cam.rotate(0.0, 10.0);
        }
        assert_relative_eq!(cam.pitch(), PITCH_LIMIT_DEGREES);
        assert!(cam.up().y > 0.0);

        cam.rotate(0.0, -1000.0);
        assert_relative_eq!(cam.pitch(), -PITCH_LIMIT_DEGREES);
        assert!(cam.front().norm() > 0.999);
    }

    #[test]
    fn test_mouse_drag_pitch_clamped_through_bus() {
        let bus = EventBus::new();
        let cam = Rc::new(RefCell::new(camera()));
        bus.subscribe_all(&FLY_CAMERA_EVENTS, &cam);

        bus.notify(&Event::MouseButtonDown {
            button: MouseButton::Left,
            x: 0.0,
            y: 0.0,
        });
        // Drag far upwards
        for step in 1..=50 {
            bus.notify(&Event::MouseMove {
                x: 0.0,
                y: -100.0 * f64::from(step),
                buttons: MouseButtons::LEFT,
            });
        }
        assert!(cam.borrow().pitch() <= PITCH_LIMIT_DEGREES);
        assert_relative_eq!(cam.borrow().pitch(), PITCH_LIMIT_DEGREES);
    }

    #[test]
    fn test_mouse_move_without_button_does_not_rotate() {
        let bus = EventBus::new();
        let cam = Rc::new(RefCell::new(camera()));
        bus.subscribe_all(&FLY_CAMERA_EVENTS, &cam);

        bus.notify(&Event::MouseMove {
            x: 10.0,
            y: 10.0,
            buttons: MouseButtons::empty(),
        });
        bus.notify(&Event::MouseMove {
            x: 300.0,
            y: 200.0,
            buttons: MouseButtons::empty(),
        });
        assert_relative_eq!(cam.borrow().yaw(), -90.0);
        assert_relative_eq!(cam.borrow().pitch(), 0.0);
    }

    #[test]
    fn test_movement_keys() {
        let bus = EventBus::new();
        let cam = Rc::new(RefCell::new(camera()));
        bus.subscribe_all(&FLY_CAMERA_EVENTS, &cam);
        let speed = CameraConfig::default().move_speed;

        bus.notify(&Event::KeyDown {
            key: Key::W,
            modifiers: Modifiers::empty(),
        });
        assert_relative_eq!(cam.borrow().position(), Vec3::new(0.0, 0.0, 5.0 - speed), epsilon = 1e-5);

        bus.notify(&Event::KeyDown {
            key: Key::D,
            modifiers: Modifiers::empty(),
        });
        bus.notify(&Event::KeyDown {
            key: Key::E,
            modifiers: Modifiers::empty(),
        });
        assert_relative_eq!(cam.borrow().position(), Vec3::new(speed, speed, 5.0 - speed), epsilon = 1e-5);
    }

    #[test]
    fn test_resize_updates_projection_only() {
        let mut cam = camera();
        let view_before = *cam.view();
        cam.set_viewport(1600, 400);
        assert_relative_eq!(cam.aspect(), 4.0);
        assert_relative_eq!(*cam.view(), view_before);

        cam.set_viewport(0, 0);
        assert_relative_eq!(cam.aspect(), 1.0);
    }

    #[test]
    fn test_view_puts_target_in_front() {
        let cam = camera();
        let p = cam.view().transform_point(&nalgebra::Point3::origin());
        assert_relative_eq!(p.coords, Vec3::new(0.0, 0.0, -5.0), epsilon = 1e-5);

        // Origin ends up inside the depth range after projection
        let clip = cam.view_projection() * nalgebra::Vector4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_looking_at() {
        let cam = FlyCamera::looking_at(&CameraConfig::default(), Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), 800, 600);
        assert_relative_eq!(cam.yaw(), -90.0, epsilon = 1e-4);
        assert_relative_eq!(cam.front(), -Vec3::z(), epsilon = 1e-5);
    }

    #[test]
    fn test_looking_at_own_position_keeps_default_orientation() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let cam = FlyCamera::looking_at(&CameraConfig::default(), eye, eye, 800, 600);
        assert_relative_eq!(cam.yaw(), DEFAULT_YAW_DEGREES);
        assert_relative_eq!(cam.pitch(), 0.0);
        assert_relative_eq!(cam.front(), -Vec3::z(), epsilon = 1e-5);
        assert!(cam.view_projection().iter().all(|v| v.is_finite()));
    }
}
