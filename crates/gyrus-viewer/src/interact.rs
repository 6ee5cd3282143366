//! Marking clicks and analysis results

use bevy::prelude::*;
use bevy_egui::EguiContexts;
use tracing::{debug, info};

use gyrus_core::{cast, pointer_ndc, CameraFrame, Ray, SelectAction};

use crate::app::{DescribeService, Session};
use crate::marker::Marker;
use crate::model::{LoadedModel, ModelRoot};
use crate::scene::MainCamera;
use crate::speech::SpeechSink;
use crate::tasks::{self, DescribeFlow, DescribeResult, TokioRuntime};
use crate::ui::UiReadouts;

pub struct InteractPlugin;

impl Plugin for InteractPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (handle_mark_click, apply_describe_results));
    }
}

/// While marking, a click on the model places the marker at the hit point
/// and kicks off an analysis request for it.
fn handle_mark_click(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut contexts: EguiContexts,
    windows: Query<&Window>,
    camera_query: Query<(&GlobalTransform, &Projection), With<MainCamera>>,
    root_query: Query<&GlobalTransform, With<ModelRoot>>,
    loaded: Res<LoadedModel>,
    mut session: ResMut<Session>,
    mut marker: ResMut<Marker>,
    mut readouts: ResMut<UiReadouts>,
    runtime: Res<TokioRuntime>,
    describe: Res<DescribeService>,
    flow: Res<DescribeFlow>,
) {
    if !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }
    if !matches!(session.0.select_action(), SelectAction::CastForMark) {
        return;
    }
    if !loaded.ready {
        return;
    }

    let Ok(ctx) = contexts.ctx_mut() else { return };
    if ctx.wants_pointer_input() {
        return;
    }

    let Ok(window) = windows.single() else { return };
    let Some(cursor) = window.cursor_position() else {
        return;
    };

    let Ok((camera_transform, projection)) = camera_query.single() else {
        return;
    };
    let Projection::Perspective(perspective) = projection else {
        return;
    };

    let ndc = pointer_ndc(cursor, window.width(), window.height());
    let frame = CameraFrame {
        world_from_camera: Mat4::from(camera_transform.affine()),
        fov_y: perspective.fov,
        aspect: perspective.aspect_ratio,
    };
    let world_ray = frame.ray_from_ndc(ndc);

    // Cast in the model's local space so the extracted geometry never needs
    // rebuilding when the root transform changes.
    let Ok(root_transform) = root_query.single() else {
        return;
    };
    let root_affine = root_transform.affine();
    let inverse = root_affine.inverse();
    let local_ray = Ray {
        origin: inverse.transform_point3(world_ray.origin),
        direction: inverse.transform_vector3(world_ray.direction).normalize(),
    };

    let Some(hit) = cast(&local_ray, &loaded.parts) else {
        // Clicked past the model; stay in marking mode
        return;
    };

    let world_point = root_affine.transform_point3(hit.point);
    marker.0.place(world_point);
    readouts.marked_position = Some(world_point);
    readouts.analysis = "Analyzing...".to_string();
    session.0.finish_mark();

    let generation = session.0.begin_describe();
    tasks::start_describe(
        &runtime.0,
        &flow,
        describe.0.clone(),
        generation,
        world_point,
        hit.part_name.clone(),
    );

    info!(
        x = world_point.x,
        y = world_point.y,
        z = world_point.z,
        part = hit.part_name.as_deref().unwrap_or("unnamed"),
        "Tumor marked"
    );
}

/// Drain finished analysis requests into the UI
fn apply_describe_results(
    flow: Res<DescribeFlow>,
    session: Res<Session>,
    mut readouts: ResMut<UiReadouts>,
    mut speech: ResMut<SpeechSink>,
) {
    let drained: Vec<DescribeResult> = {
        let Ok(mut results) = flow.results.try_lock() else {
            return;
        };
        results.drain(..).collect()
    };

    for result in drained {
        // A newer mark supersedes any in-flight request
        if !session.0.is_current_describe(result.generation) {
            debug!(generation = result.generation, "Dropping stale analysis");
            continue;
        }
        match result.outcome {
            Ok(text) => {
                speech.speak(&text);
                readouts.analysis = text;
            }
            Err(message) => {
                readouts.analysis = message;
            }
        }
    }
}
