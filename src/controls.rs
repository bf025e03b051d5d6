//! Damped orbit controls.
//!
//! The camera orbits its target on a sphere. Input never moves the camera
//! directly; it accumulates a pending rotation, pan and dolly that
//! [`OrbitControls::update`] consumes once per frame. With damping enabled only
//! `damping_factor` of the pending motion is applied each frame and the rest
//! decays geometrically, which gives the camera its inertia.
//!
//! Mouse mapping: left-drag rotates, right-drag pans, the wheel dollies.
//! The world up axis is assumed to be +Y.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::{camera::Camera, config::ControlsConfig};

const EPS: f32 = 1e-6;

/// Radius, polar angle from +Y (`phi`) and azimuth around +Y from +Z (`theta`).
#[derive(Clone, Copy, Debug, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius < EPS {
            return Self {
                radius: 0.0,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Drag {
    #[default]
    None,
    Rotate,
    Pan,
}

#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub screen_space_panning: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,

    // pending motion, consumed by `update`
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vector3<f32>,

    drag: Drag,
    cursor: Option<(f64, f64)>,
    viewport_height: f32,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig) -> Self {
        Self {
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            screen_space_panning: config.screen_space_panning,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            drag: Drag::None,
            cursor: None,
            viewport_height: 1.0,
        }
    }

    /// Pixel height used to turn cursor motion into angles and pan distances.
    pub fn set_viewport(&mut self, _width: u32, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    pub fn drag(&self) -> Drag {
        self.drag
    }

    /// Feed a window event. Returns `true` if the event was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent, camera: &Camera) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => self.begin_drag(Drag::Rotate),
                    (MouseButton::Right, ElementState::Pressed) => self.begin_drag(Drag::Pan),
                    (MouseButton::Left | MouseButton::Right, ElementState::Released) => {
                        self.end_drag()
                    }
                    _ => return false,
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer_moved(position.x, position.y, camera)
            }
            WindowEvent::CursorLeft { .. } => {
                self.end_drag();
                self.cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                self.wheel(lines)
            }
            _ => false,
        }
    }

    pub fn begin_drag(&mut self, drag: Drag) {
        self.drag = drag;
    }

    pub fn end_drag(&mut self) {
        self.drag = Drag::None;
    }

    /// Track the cursor and turn motion during a drag into pending rotation or pan.
    pub fn pointer_moved(&mut self, x: f64, y: f64, camera: &Camera) -> bool {
        let previous = self.cursor.replace((x, y));
        let Some((px, py)) = previous else {
            return false;
        };
        let (dx, dy) = ((x - px) as f32, (y - py) as f32);
        match self.drag {
            Drag::None => false,
            Drag::Rotate => {
                self.rotate_left(TAU * dx / self.viewport_height * self.rotate_speed);
                self.rotate_up(TAU * dy / self.viewport_height * self.rotate_speed);
                true
            }
            Drag::Pan => {
                self.pan(dx * self.pan_speed, dy * self.pan_speed, camera);
                true
            }
        }
    }

    /// Positive `delta_y` (scrolling away from the user) moves the camera closer.
    pub fn wheel(&mut self, delta_y: f32) -> bool {
        if delta_y > 0.0 {
            self.dolly_in(self.zoom_scale());
            true
        } else if delta_y < 0.0 {
            self.dolly_out(self.zoom_scale());
            true
        } else {
            false
        }
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Shrink the orbit radius by `dolly_scale` (< 1).
    pub fn dolly_in(&mut self, dolly_scale: f32) {
        self.scale *= dolly_scale;
    }

    /// Grow the orbit radius by `1 / dolly_scale`.
    pub fn dolly_out(&mut self, dolly_scale: f32) {
        self.scale /= dolly_scale;
    }

    /// Queue a pan by a cursor delta in pixels.
    ///
    /// The distance is scaled so the point under the cursor at the target's
    /// depth follows the cursor. Vertical motion moves along the camera's up
    /// axis in screen-space mode, otherwise along the ground plane.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32, camera: &Camera) {
        let target_distance = camera.distance() * (camera.projection.fovy.0 * 0.5).tan();
        let right = camera.right();

        let left = right * (-2.0 * delta_x * target_distance / self.viewport_height);
        let up_axis = if self.screen_space_panning {
            right.cross(camera.forward())
        } else {
            camera.up.cross(right)
        };
        let up = up_axis * (2.0 * delta_y * target_distance / self.viewport_height);
        self.pan_offset += left + up;
    }

    fn is_settled(&self) -> bool {
        self.delta_theta == 0.0
            && self.delta_phi == 0.0
            && self.scale == 1.0
            && self.pan_offset == Vector3::new(0.0, 0.0, 0.0)
    }

    /// Apply one frame of pending motion to `camera`.
    ///
    /// Returns `true` if the camera moved. The orbit radius always ends up in
    /// `[min_distance, max_distance]`.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let distance = camera.distance();
        if self.is_settled() && distance >= self.min_distance && distance <= self.max_distance {
            return false;
        }

        let before = camera.position;
        let factor = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        let mut spherical = Spherical::from_offset(camera.position - camera.target);
        spherical.theta += self.delta_theta * factor;
        spherical.phi += self.delta_phi * factor;
        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);

        camera.target = camera.target + self.pan_offset * factor;
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);
        camera.position = camera.target + spherical.to_offset();

        if self.enable_damping {
            self.delta_theta *= 1.0 - factor;
            self.delta_phi *= 1.0 - factor;
            self.pan_offset *= 1.0 - factor;
            self.settle();
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        (camera.position - before).magnitude2() > EPS * EPS
    }

    // drop residual motion too small to see
    fn settle(&mut self) {
        if self.delta_theta.abs() < EPS {
            self.delta_theta = 0.0;
        }
        if self.delta_phi.abs() < EPS {
            self.delta_phi = 0.0;
        }
        if self.pan_offset.magnitude2() < EPS * EPS {
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
    }
}
