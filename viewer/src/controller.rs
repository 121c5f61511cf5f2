use std::f32::consts::FRAC_PI_2;

use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::input::mouse::{MouseButton, MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::Input;
use bevy::prelude::*;
use bevy::render::camera::Projection;
use bevy_egui::EguiContexts;
use diorama_engine::schedule::CameraRig;

use crate::frame::FrameSet;

pub const CAMERA_START: Vec3 = Vec3::new(-10.0, 6.0, -2.0);
pub const CAMERA_FOV_DEGREES: f32 = 35.0;

/// Damping factors are tuned per frame at this rate.
const REFERENCE_FPS: f32 = 60.0;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

pub struct ControllerPlugin;

impl Plugin for ControllerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera)
            .add_systems(Update, orbit_input.before(FrameSet::Drive));
    }
}

/// Orbit camera with inertia. Input adds velocity; [`OrbitController::advance`]
/// spends it.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct OrbitController {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,
    pub yaw_velocity: f32,
    pub pitch_velocity: f32,
    /// Pending change in `ln(radius)`.
    pub zoom_velocity: f32,
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_radius: f32,
    pub max_radius: f32,
}

impl OrbitController {
    pub fn looking_from(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let radius = offset.length().max(1e-3);
        Self {
            target,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / radius).clamp(-1.0, 1.0).asin(),
            radius,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
            damping: 0.05,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
            min_radius: 2.0,
            max_radius: 40.0,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + self.radius * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    /// Mouse drag in pixels.
    pub fn push_rotation(&mut self, delta: Vec2) {
        self.yaw_velocity -= delta.x * self.rotate_speed;
        self.pitch_velocity += delta.y * self.rotate_speed;
    }

    /// Wheel lines; positive zooms in.
    pub fn push_zoom(&mut self, lines: f32) {
        self.zoom_velocity -= lines * self.zoom_speed;
    }

    /// Applies the share of pending motion due after `dt` seconds. The total
    /// motion from one input does not depend on the frame rate.
    pub fn advance(&mut self, dt: f32) {
        let keep = (1.0 - self.damping).powf(dt.max(0.0) * REFERENCE_FPS);
        let applied = 1.0 - keep;

        self.yaw += self.yaw_velocity * applied;
        self.pitch = (self.pitch + self.pitch_velocity * applied).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let radius = self.radius * (self.zoom_velocity * applied).exp();
        self.radius = radius.clamp(self.min_radius, self.max_radius);

        self.yaw_velocity *= keep;
        self.pitch_velocity *= keep;
        self.zoom_velocity *= keep;
    }
}

/// Lets the frame scheduler drive an orbit camera entity.
pub struct OrbitRig<'a> {
    pub controller: &'a mut OrbitController,
    pub transform: &'a mut Transform,
}

impl CameraRig for OrbitRig<'_> {
    fn world_position(&self) -> Vec3 {
        self.transform.translation
    }

    fn advance(&mut self, dt: f32) {
        self.controller.advance(dt);
        *self.transform = Transform::from_translation(self.controller.eye())
            .looking_at(self.controller.target, Vec3::Y);
    }
}

fn spawn_camera(mut commands: Commands) {
    let controller = OrbitController::looking_from(CAMERA_START, Vec3::ZERO);
    commands.spawn((
        Camera3dBundle {
            camera: Camera {
                hdr: true,
                ..default()
            },
            projection: Projection::Perspective(PerspectiveProjection {
                fov: CAMERA_FOV_DEGREES.to_radians(),
                near: 0.1,
                far: 100.0,
                ..default()
            }),
            tonemapping: Tonemapping::AcesFitted,
            transform: Transform::from_translation(controller.eye())
                .looking_at(Vec3::ZERO, Vec3::Y),
            ..default()
        },
        controller,
    ));
}

fn orbit_input(
    mut motion: EventReader<MouseMotion>,
    mut wheel: EventReader<MouseWheel>,
    buttons: Res<Input<MouseButton>>,
    mut contexts: EguiContexts,
    mut query: Query<&mut OrbitController>,
) {
    if contexts.ctx_mut().wants_pointer_input() {
        motion.clear();
        wheel.clear();
        return;
    }

    let drag: Vec2 = motion.read().map(|m| m.delta).sum();
    let lines: f32 = wheel
        .read()
        .map(|w| match w.unit {
            MouseScrollUnit::Line => w.y,
            MouseScrollUnit::Pixel => w.y / 100.0,
        })
        .sum();

    for mut controller in query.iter_mut() {
        if buttons.pressed(MouseButton::Left) {
            controller.push_rotation(drag);
        }
        if lines != 0.0 {
            controller.push_zoom(lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_round_trips_start_position() {
        let controller = OrbitController::looking_from(CAMERA_START, Vec3::ZERO);
        assert!((controller.eye() - CAMERA_START).length() < 1e-4);
    }

    #[test]
    fn damping_is_frame_rate_independent() {
        let mut fast = OrbitController::looking_from(CAMERA_START, Vec3::ZERO);
        fast.push_rotation(Vec2::new(100.0, 0.0));
        let mut slow = fast.clone();

        for _ in 0..120 {
            fast.advance(1.0 / 60.0);
        }
        for _ in 0..60 {
            slow.advance(1.0 / 30.0);
        }
        assert!((fast.yaw - slow.yaw).abs() < 1e-4);
    }

    #[test]
    fn motion_settles_at_the_pushed_amount() {
        let mut controller = OrbitController::looking_from(CAMERA_START, Vec3::ZERO);
        let start = controller.yaw;
        controller.push_rotation(Vec2::new(-40.0, 0.0));
        for _ in 0..2000 {
            controller.advance(1.0 / 60.0);
        }
        assert!((controller.yaw - start - 40.0 * controller.rotate_speed).abs() < 1e-4);
    }

    #[test]
    fn zoom_and_pitch_stay_in_bounds() {
        let mut controller = OrbitController::looking_from(CAMERA_START, Vec3::ZERO);
        controller.push_zoom(1000.0);
        controller.push_rotation(Vec2::new(0.0, 1.0e5));
        for _ in 0..600 {
            controller.advance(1.0 / 60.0);
        }
        assert_eq!(controller.radius, controller.min_radius);
        assert!(controller.pitch <= PITCH_LIMIT);
    }

    #[test]
    fn rig_reads_position_before_advance() {
        let mut controller = OrbitController::looking_from(CAMERA_START, Vec3::ZERO);
        controller.push_rotation(Vec2::new(50.0, 0.0));
        let mut transform = Transform::from_translation(CAMERA_START);
        let mut rig = OrbitRig { controller: &mut controller, transform: &mut transform };

        assert_eq!(rig.world_position(), CAMERA_START);
        rig.advance(1.0 / 60.0);
        assert_ne!(rig.world_position(), CAMERA_START);
    }
}
