//! Model loading and fit normalization
//!
//! Converted scans arrive as glTF files on disk. Loading goes through three
//! stages, each driven by a system here: queue the file with the asset
//! server, spawn its scene once the asset is in, then walk the spawned
//! hierarchy to pull out triangle geometry and size the model for display.

use std::path::PathBuf;

use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::math::Affine3A;
use bevy::mesh::{Indices, PrimitiveTopology, VertexAttributeValues};
use bevy::prelude::*;
use tracing::{error, info};

use gyrus_core::{Aabb, FitTransform, MeshPart};

use crate::app::StartupModel;
use crate::config::Config;
use crate::tasks::{ConversionEvent, ConversionFlow};
use crate::ui::UiReadouts;

/// Root entity of the currently displayed model
#[derive(Component)]
pub struct ModelRoot;

/// The active model: its scene root, extracted geometry, and fit transform
#[derive(Resource)]
pub struct LoadedModel {
    pub root: Option<Entity>,
    /// Triangle geometry in the root's local space, used for ray casting
    pub parts: Vec<MeshPart>,
    /// Normalization transform, before the user scale multiplier
    pub fit: FitTransform,
    /// True once geometry is extracted and the fit transform applied
    pub ready: bool,
}

impl Default for LoadedModel {
    fn default() -> Self {
        Self {
            root: None,
            parts: Vec::new(),
            fit: FitTransform {
                scale: 1.0,
                translation: Vec3::ZERO,
            },
            ready: false,
        }
    }
}

/// A glTF file handed to the asset server, waiting to finish loading
#[derive(Resource, Default)]
pub struct PendingGltf {
    handle: Option<(PathBuf, Handle<Gltf>)>,
}

/// User scale multiplier from the UI slider
#[derive(Resource)]
pub struct ModelScale {
    pub factor: f32,
}

impl Default for ModelScale {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

/// Plugin for model loading and display sizing
pub struct ModelPlugin;

impl Plugin for ModelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LoadedModel>()
            .init_resource::<PendingGltf>()
            .init_resource::<ModelScale>()
            .add_systems(Startup, load_startup_model)
            .add_systems(
                Update,
                (
                    apply_conversion_events,
                    spawn_loaded_scene,
                    prepare_model_parts,
                    apply_user_scale,
                )
                    .chain(),
            );
    }
}

/// Hand a glTF file to the asset server and remember the handle.
///
/// Paths are canonicalized because relative paths would be resolved against
/// the asset root instead of the working directory.
fn queue_model_load(path: PathBuf, asset_server: &AssetServer, pending: &mut PendingGltf) {
    let absolute = path.canonicalize().unwrap_or(path);
    let handle = asset_server.load(absolute.clone());
    pending.handle = Some((absolute, handle));
}

fn load_startup_model(
    startup: Res<StartupModel>,
    asset_server: Res<AssetServer>,
    mut pending: ResMut<PendingGltf>,
    mut readouts: ResMut<UiReadouts>,
) {
    let Some(path) = startup.0.clone() else { return };
    info!(path = %path.display(), "Loading model from command line");
    readouts.convert_status = "Loading model...".to_string();
    queue_model_load(path, &asset_server, &mut pending);
}

/// Drain events from the conversion task and reflect them in the UI
fn apply_conversion_events(
    flow: Res<ConversionFlow>,
    asset_server: Res<AssetServer>,
    mut pending: ResMut<PendingGltf>,
    mut readouts: ResMut<UiReadouts>,
) {
    let drained: Vec<ConversionEvent> = {
        let Ok(mut events) = flow.events.try_lock() else {
            return;
        };
        events.drain(..).collect()
    };

    for event in drained {
        match event {
            ConversionEvent::Submitted { job_id } => {
                readouts.convert_status = format!("Job: {job_id}");
            }
            ConversionEvent::StatusChanged(status) => {
                readouts.convert_status = format!("Status: {status}");
            }
            ConversionEvent::Downloading => {
                readouts.convert_status = "Loading model...".to_string();
            }
            ConversionEvent::ModelReady(path) => {
                readouts.convert_status = "Loading model...".to_string();
                queue_model_load(path, &asset_server, &mut pending);
            }
            ConversionEvent::Failed(message) => {
                readouts.convert_status = message;
            }
        }
    }
}

/// Once the pending glTF finishes loading, swap its scene in for the old model
fn spawn_loaded_scene(
    mut commands: Commands,
    mut pending: ResMut<PendingGltf>,
    mut loaded: ResMut<LoadedModel>,
    mut readouts: ResMut<UiReadouts>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
) {
    let Some((path, handle)) = pending.handle.clone() else {
        return;
    };

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {}
        Some(LoadState::Failed(_)) => {
            error!(path = %path.display(), "Failed to load model");
            readouts.convert_status = "Error: model load failed".to_string();
            pending.handle = None;
            return;
        }
        _ => {
            // Still loading
            return;
        }
    }

    let Some(gltf) = gltf_assets.get(&handle) else {
        return;
    };
    let Some(scene) = gltf
        .default_scene
        .clone()
        .or_else(|| gltf.scenes.first().cloned())
    else {
        error!(path = %path.display(), "Model file contains no scenes");
        readouts.convert_status = "Error: model has no scenes".to_string();
        pending.handle = None;
        return;
    };

    // Replace any previously shown model
    if let Some(previous) = loaded.root.take() {
        commands.entity(previous).despawn();
    }

    let root = commands
        .spawn((
            SceneRoot(scene),
            Transform::default(),
            Visibility::default(),
            ModelRoot,
        ))
        .id();

    info!(path = %path.display(), "Model scene spawned");
    *loaded = LoadedModel {
        root: Some(root),
        ..LoadedModel::default()
    };
    pending.handle = None;
}

/// Walk the spawned scene, extract triangle geometry, and fit the model
/// into view.
///
/// Node transforms are accumulated top-down so the extracted vertices land
/// in the root's local space regardless of how the file nests its nodes.
fn prepare_model_parts(
    mut loaded: ResMut<LoadedModel>,
    config: Res<Config>,
    scale: Res<ModelScale>,
    mut readouts: ResMut<UiReadouts>,
    meshes: Res<Assets<Mesh>>,
    children_query: Query<&Children>,
    node_query: Query<(Option<&Name>, Option<&Transform>, Option<&Mesh3d>), Without<ModelRoot>>,
    mut root_query: Query<&mut Transform, With<ModelRoot>>,
) {
    if loaded.ready {
        return;
    }
    let Some(root) = loaded.root else { return };

    // The scene spawner inserts the whole hierarchy in one command flush,
    // so children under the root mean the instance is in place.
    let Ok(root_children) = children_query.get(root) else {
        return;
    };

    // Recursively gather mesh geometry under an entity
    fn collect_parts(
        entity: Entity,
        parent: Affine3A,
        inherited_name: Option<&str>,
        children_query: &Query<&Children>,
        node_query: &Query<
            (Option<&Name>, Option<&Transform>, Option<&Mesh3d>),
            Without<ModelRoot>,
        >,
        mesh_assets: &Assets<Mesh>,
        parts: &mut Vec<MeshPart>,
        incomplete: &mut bool,
    ) {
        let Ok((name, transform, mesh_handle)) = node_query.get(entity) else {
            return;
        };

        let affine = parent * transform.copied().unwrap_or_default().compute_affine();
        // Unnamed primitives report the nearest named ancestor
        let name = name.map(|n| n.as_str()).or(inherited_name);

        if let Some(mesh_handle) = mesh_handle {
            match mesh_assets.get(&mesh_handle.0) {
                Some(mesh) => {
                    if let Some(part) = extract_part(mesh, &affine, name) {
                        parts.push(part);
                    }
                }
                // Mesh asset still streaming in; retry next frame
                None => *incomplete = true,
            }
        }

        if let Ok(children) = children_query.get(entity) {
            for &child in children.iter() {
                collect_parts(
                    child,
                    affine,
                    name,
                    children_query,
                    node_query,
                    mesh_assets,
                    parts,
                    incomplete,
                );
            }
        }
    }

    let mut parts = Vec::new();
    let mut incomplete = false;
    for &child in root_children.iter() {
        collect_parts(
            child,
            Affine3A::IDENTITY,
            None,
            &children_query,
            &node_query,
            meshes.as_ref(),
            &mut parts,
            &mut incomplete,
        );
    }
    if incomplete {
        return;
    }

    // A model with no triangles still gets a valid identity-ish fit
    let aabb = Aabb::from_points(parts.iter().flat_map(|part| part.positions.iter().copied()))
        .unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO));
    let fit = FitTransform::normalize(&aabb, config.viewer.target_size);
    let scaled = fit.with_user_scale(scale.factor);

    if let Ok(mut transform) = root_query.single_mut() {
        *transform =
            Transform::from_translation(scaled.translation).with_scale(Vec3::splat(scaled.scale));
    }

    let triangles: usize = parts.iter().map(MeshPart::triangle_count).sum();
    info!(
        parts = parts.len(),
        triangles,
        fit_scale = fit.scale,
        "Model ready"
    );

    loaded.parts = parts;
    loaded.fit = fit;
    loaded.ready = true;
    readouts.convert_status = "Loaded".to_string();
}

/// Pull transformed triangle geometry out of a mesh asset
fn extract_part(mesh: &Mesh, affine: &Affine3A, name: Option<&str>) -> Option<MeshPart> {
    if mesh.primitive_topology() != PrimitiveTopology::TriangleList {
        return None;
    }

    let positions = match mesh.attribute(Mesh::ATTRIBUTE_POSITION)? {
        VertexAttributeValues::Float32x3(values) => values
            .iter()
            .map(|&[x, y, z]| affine.transform_point3(Vec3::new(x, y, z)))
            .collect::<Vec<_>>(),
        _ => return None,
    };

    let indices = match mesh.indices() {
        Some(Indices::U32(indices)) => indices.clone(),
        Some(Indices::U16(indices)) => indices.iter().map(|&i| u32::from(i)).collect(),
        None => (0..positions.len() as u32).collect(),
    };

    Some(MeshPart {
        name: name.map(str::to_string),
        positions,
        indices,
    })
}

/// Reapply the display transform when the scale slider moves
fn apply_user_scale(
    scale: Res<ModelScale>,
    loaded: Res<LoadedModel>,
    mut roots: Query<&mut Transform, With<ModelRoot>>,
) {
    if !scale.is_changed() || !loaded.ready {
        return;
    }
    let Ok(mut transform) = roots.single_mut() else {
        return;
    };
    let fit = loaded.fit.with_user_scale(scale.factor);
    *transform = Transform::from_translation(fit.translation).with_scale(Vec3::splat(fit.scale));
}
