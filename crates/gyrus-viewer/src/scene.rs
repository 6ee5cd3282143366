//! Camera, lighting, and orbit navigation

use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::prelude::*;
use bevy_egui::EguiContexts;

use crate::app::Session;
use crate::marker::Marker;
use crate::model::{LoadedModel, ModelRoot, ModelScale};
use crate::ui::UiReadouts;

/// Orbit camera state and tuning. The target_* fields let zoom and
/// re-centering ease in instead of snapping.
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    pub distance: f32,
    pub target_distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub target_focus: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 3.0,
            target_distance: 3.0,
            azimuth: 0.0,
            elevation: 0.0,
            target: Vec3::ZERO,
            target_focus: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
        }
    }
}

/// Tags the viewer's single orbiting camera
#[derive(Component)]
pub struct MainCamera;

/// Set by the UI's Reset View button, consumed next frame
#[derive(Resource, Default)]
pub struct PendingReset(pub bool);

/// Plugin for camera controls and lighting
pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraSettings>()
            .init_resource::<PendingReset>()
            .add_systems(Startup, setup_scene)
            .add_systems(Update, (apply_view_reset, update_camera).chain());
    }
}

fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: 75.0_f32.to_radians(),
            near: 0.01,
            far: 20.0,
            ..default()
        }),
        Transform::from_xyz(0.0, 0.0, 3.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 500.0,
        ..default()
    });

    commands.spawn((
        DirectionalLight {
            color: Color::WHITE,
            illuminance: 5_000.0,
            ..default()
        },
        Transform::from_xyz(1.0, 1.0, 1.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut settings: ResMut<CameraSettings>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    session: Res<Session>,
    time: Res<Time>,
    mut contexts: EguiContexts,
) {
    // Pointer input over the panel belongs to egui, not the camera
    let Ok(ctx) = contexts.ctx_mut() else { return };
    let egui_wants_pointer = ctx.wants_pointer_input();

    let total_motion = mouse_motion.delta;

    // Orbit with left mouse drag. Disabled while marking so the marking
    // click doesn't also swing the camera.
    if mouse_button.pressed(MouseButton::Left) && !egui_wants_pointer && session.0.can_orbit() {
        settings.azimuth -= total_motion.x * settings.sensitivity;
        settings.elevation =
            (settings.elevation - total_motion.y * settings.sensitivity).clamp(-1.5, 1.5);
    }

    // Scroll zooms by easing target_distance
    if !egui_wants_pointer {
        let scroll = mouse_scroll.delta.y;
        if scroll != 0.0 {
            let zoom_factor = 1.0 - scroll * settings.zoom_speed * 0.3;
            settings.target_distance = (settings.target_distance * zoom_factor).clamp(1.0, 10.0);
        }
    }

    // Ease distance and target toward their goals
    let dt = time.delta_secs();
    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.distance =
        settings.distance + (settings.target_distance - settings.distance) * lerp_factor;
    settings.target = settings.target + (settings.target_focus - settings.target) * lerp_factor;

    // Update camera position (Y up; azimuth 0, elevation 0 looks down -Z)
    if let Ok(mut transform) = camera_query.single_mut() {
        let x = settings.distance * settings.elevation.cos() * settings.azimuth.sin();
        let y = settings.distance * settings.elevation.sin();
        let z = settings.distance * settings.elevation.cos() * settings.azimuth.cos();

        transform.translation = settings.target + Vec3::new(x, y, z);
        transform.look_at(settings.target, Vec3::Y);
    }
}

/// Restores the home view: camera back to its start pose, model back to its
/// fitted transform, marker hidden (it keeps its position), readouts cleared.
fn apply_view_reset(
    mut reset: ResMut<PendingReset>,
    mut settings: ResMut<CameraSettings>,
    mut session: ResMut<Session>,
    mut marker: ResMut<Marker>,
    mut readouts: ResMut<UiReadouts>,
    loaded: Res<LoadedModel>,
    scale: Res<ModelScale>,
    mut roots: Query<&mut Transform, With<ModelRoot>>,
) {
    if !reset.0 {
        return;
    }
    reset.0 = false;

    marker.0.reset();
    readouts.marked_position = None;
    readouts.analysis = "No tumor marked.".to_string();
    session.0.reset_view();

    *settings = CameraSettings::default();

    if loaded.ready {
        if let Ok(mut transform) = roots.single_mut() {
            let fit = loaded.fit.with_user_scale(scale.factor);
            *transform = Transform::from_translation(fit.translation)
                .with_scale(Vec3::splat(fit.scale));
        }
    }
}
