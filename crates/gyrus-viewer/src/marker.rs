//! The annotation marker entity

use bevy::prelude::*;

use gyrus_core::{pulse_intensity, MarkerState};

/// Marker sphere radius in world units
const MARKER_RADIUS: f32 = 0.05;

/// Logical marker state, mirrored into the scene each frame it changes
#[derive(Resource, Default)]
pub struct Marker(pub MarkerState);

/// Tag for the marker's scene entity
#[derive(Component)]
struct MarkerEntity;

pub struct MarkerPlugin;

impl Plugin for MarkerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Marker>()
            .add_systems(Update, (sync_marker_entity, pulse_marker));
    }
}

fn sync_marker_entity(
    marker: Res<Marker>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut existing: Query<(&mut Transform, &mut Visibility), With<MarkerEntity>>,
) {
    if !marker.is_changed() {
        return;
    }
    let Some(position) = marker.0.position else {
        // Cleared state (reset) hides the entity, it is reused on the next placement
        if let Ok((_, mut visibility)) = existing.single_mut() {
            *visibility = Visibility::Hidden;
        }
        return;
    };

    if let Ok((mut transform, mut visibility)) = existing.single_mut() {
        transform.translation = position;
        *visibility = if marker.0.visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
        return;
    }

    // Lazily created on the first placement, then only moved
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(MARKER_RADIUS))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgba(1.0, 0.0, 0.0, 0.9),
            emissive: LinearRgba::rgb(0.5, 0.0, 0.0),
            alpha_mode: AlphaMode::Blend,
            ..default()
        })),
        Transform::from_translation(position),
        MarkerEntity,
    ));
}

/// Drive the emissive pulse while the marker is shown
fn pulse_marker(
    marker: Res<Marker>,
    time: Res<Time>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    handles: Query<&MeshMaterial3d<StandardMaterial>, With<MarkerEntity>>,
) {
    if !marker.0.visible {
        return;
    }
    let Ok(handle) = handles.single() else { return };
    if let Some(material) = materials.get_mut(&handle.0) {
        material.emissive = LinearRgba::rgb(pulse_intensity(time.elapsed_secs()), 0.0, 0.0);
    }
}
