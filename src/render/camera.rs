use glam::{Mat4, Vec2, Vec3};

/// Fraction of the viewport the backdrop should fill on the limiting axis.
pub const FIT_FRACTION: f32 = 0.9;

const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
const MIN_DISTANCE: f32 = 0.2;
// Bounds wheel zoom only; a fitted distance may exceed it for very tall
// walls and must not be clamped back.
const MAX_DISTANCE: f32 = 50.0;
const MAX_PITCH: f32 = 1.45;
// Radians per second of orbit velocity per pixel of pointer delta.
const ORBIT_SENSITIVITY: f32 = 0.3;
const DAMPING_PER_SECOND: f32 = 8.0;

/// Distance at which a `width` x `height` rectangle fills `FIT_FRACTION` of
/// the viewport on whichever axis limits first.
pub fn fit_distance(width: f32, height: f32, fov_y: f32, aspect: f32) -> f32 {
    let half_tan_y = (fov_y * 0.5).tan();
    let d_vertical = (height / FIT_FRACTION) / (2.0 * half_tan_y);
    let fov_x = 2.0 * (half_tan_y * aspect).atan();
    let d_horizontal = (width / FIT_FRACTION) / (2.0 * (fov_x * 0.5).tan());
    d_vertical.max(d_horizontal)
}

/// Perspective orbit camera pivoting around a target point. Left-button input
/// never reaches the camera; orbit is driven by the secondary button and zoom
/// by the wheel, both with short damped tails.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    aspect: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: DEFAULT_FOV_Y,
            aspect: 16.0 / 9.0,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
        }
    }

    /// Re-center on the origin and back off far enough that the backdrop
    /// fills the target fraction of the viewport. Called on every rebuild.
    pub fn fit_to_backdrop(&mut self, backdrop_size: Vec2) {
        self.target = Vec3::ZERO;
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.yaw_velocity = 0.0;
        self.pitch_velocity = 0.0;
        self.distance =
            fit_distance(backdrop_size.x, backdrop_size.y, self.fov_y, self.aspect)
                .max(MIN_DISTANCE);
    }

    /// Skipped for zero-sized viewports so a mid-resize event can never
    /// produce a NaN aspect.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw_velocity += delta_x * ORBIT_SENSITIVITY;
        self.pitch_velocity += delta_y * ORBIT_SENSITIVITY;
    }

    pub fn zoom(&mut self, scroll: f32) {
        self.distance = (self.distance * (1.0 - scroll * 0.1)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Advance orbit damping; returns true while the camera is still moving.
    /// Both the applied delta and the decay scale with `dt`, so total orbit
    /// per pointer delta does not depend on refresh rate.
    pub fn update(&mut self, dt: f32) -> bool {
        let moving = self.yaw_velocity.abs() > 1e-5 || self.pitch_velocity.abs() > 1e-5;
        if moving {
            self.yaw += self.yaw_velocity * dt;
            self.pitch = (self.pitch + self.pitch_velocity * dt).clamp(-MAX_PITCH, MAX_PITCH);
            let decay = (-DAMPING_PER_SECOND * dt).exp();
            self.yaw_velocity *= decay;
            self.pitch_velocity *= decay;
        }
        moving
    }

    pub fn eye(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        let offset = Vec3::new(
            self.yaw.sin() * cos_pitch,
            self.pitch.sin(),
            self.yaw.cos() * cos_pitch,
        );
        self.target + offset * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, 0.01, 100.0)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}
