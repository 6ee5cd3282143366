//! Pointer and pose ray casting against extracted triangle meshes
//!
//! The viewer extracts every mesh of the loaded scene graph once, into flat
//! triangle lists expressed in the model root's local space, each carrying
//! the display name of its nearest named ancestor node. Casting is then a
//! pure function over those lists: build a ray (from a pointer coordinate
//! unprojected through the camera, or directly from a world pose), intersect
//! every triangle, and keep the closest hit. Fixed inputs always produce the
//! same hit point, since the result feeds prompt text sent to an external
//! service.

use bevy_math::{Mat4, Vec2, Vec3};

/// Rejection threshold for near-parallel rays
const EPSILON: f32 = 1e-7;

/// Inclusive slack on barycentric bounds so rays through a shared edge or
/// vertex of adjacent triangles still report the surface hit
const BARY_SLACK: f32 = 1e-6;

/// A world-space ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray from a pose: a world position and a forward vector
    pub fn from_pose(origin: Vec3, forward: Vec3) -> Self {
        Self {
            origin,
            direction: forward.normalize(),
        }
    }

    /// Point at parameter `t` along the ray
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Convert a window-space pointer position to normalized device coordinates
///
/// Both axes map to [-1, 1], with y pointing up.
pub fn pointer_ndc(pointer: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new(
        (pointer.x / width) * 2.0 - 1.0,
        -(pointer.y / height) * 2.0 + 1.0,
    )
}

/// Camera pose and projection parameters needed to unproject a pointer
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    /// Camera-to-world transform
    pub world_from_camera: Mat4,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Viewport width / height
    pub aspect: f32,
}

impl CameraFrame {
    /// Unproject a normalized device coordinate into a world-space ray
    ///
    /// The ray is built pinhole-style on the camera's z = -1 plane and
    /// rotated into world space, so it is independent of any particular
    /// projection-matrix depth convention.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let half_height = (self.fov_y * 0.5).tan();
        let dir_camera = Vec3::new(
            ndc.x * half_height * self.aspect,
            ndc.y * half_height,
            -1.0,
        );
        let origin = self.world_from_camera.transform_point3(Vec3::ZERO);
        let direction = self
            .world_from_camera
            .transform_vector3(dir_camera)
            .normalize();
        Ray { origin, direction }
    }
}

/// Triangle list extracted from one mesh of the scene graph
#[derive(Debug, Clone, Default)]
pub struct MeshPart {
    /// Display name of the nearest named ancestor node, if any
    pub name: Option<String>,
    /// Vertex positions in the model root's local space
    pub positions: Vec<Vec3>,
    /// Triangle indices into `positions`, three per triangle
    pub indices: Vec<u32>,
}

impl MeshPart {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Result of a successful cast
#[derive(Debug, Clone, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit (distance, since directions are unit length)
    pub distance: f32,
    /// Intersection point, in the space the parts are expressed in
    pub point: Vec3,
    /// Display name of the hit part's nearest named ancestor, if any
    pub part_name: Option<String>,
}

/// Möller-Trumbore ray/triangle intersection
///
/// Both faces are accepted. Returns the ray parameter of the intersection,
/// or None when the ray misses or the triangle lies behind the origin.
pub fn intersect_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let edge_ab = b - a;
    let edge_ac = c - a;
    let p = ray.direction.cross(edge_ac);
    let det = edge_ab.dot(p);
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let to_origin = ray.origin - a;
    let u = to_origin.dot(p) * inv_det;
    if u < -BARY_SLACK || u > 1.0 + BARY_SLACK {
        return None;
    }

    let q = to_origin.cross(edge_ab);
    let v = ray.direction.dot(q) * inv_det;
    if v < -BARY_SLACK || u + v > 1.0 + BARY_SLACK {
        return None;
    }

    let t = edge_ac.dot(q) * inv_det;
    if t < 0.0 {
        return None;
    }
    Some(t)
}

/// Intersect a ray against every part and return the closest hit
///
/// An empty part list yields None; casting with no model loaded is a no-op,
/// not an error.
pub fn cast(ray: &Ray, parts: &[MeshPart]) -> Option<RayHit> {
    let mut best: Option<RayHit> = None;

    for part in parts {
        for triangle in part.indices.chunks_exact(3) {
            let (Some(&a), Some(&b), Some(&c)) = (
                part.positions.get(triangle[0] as usize),
                part.positions.get(triangle[1] as usize),
                part.positions.get(triangle[2] as usize),
            ) else {
                continue;
            };

            if let Some(t) = intersect_triangle(ray, a, b, c) {
                let closer = best.as_ref().map(|hit| t < hit.distance).unwrap_or(true);
                if closer {
                    best = Some(RayHit {
                        distance: t,
                        point: ray.at(t),
                        part_name: part.name.clone(),
                    });
                }
            }
        }
    }

    best
}

/// Cast from a pointer coordinate unprojected through the camera
pub fn cast_from_pointer(ndc: Vec2, camera: &CameraFrame, parts: &[MeshPart]) -> Option<RayHit> {
    cast(&camera.ray_from_ndc(ndc), parts)
}

/// Cast from a world position along a forward direction
pub fn cast_from_pose(origin: Vec3, forward: Vec3, parts: &[MeshPart]) -> Option<RayHit> {
    cast(&Ray::from_pose(origin, forward), parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facing_triangle() -> MeshPart {
        MeshPart {
            name: Some("Cerebellum".to_string()),
            positions: vec![
                Vec3::new(-1.0, -1.0, -5.0),
                Vec3::new(1.0, -1.0, -5.0),
                Vec3::new(0.0, 1.0, -5.0),
            ],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_pointer_ndc() {
        assert_eq!(pointer_ndc(Vec2::new(400.0, 300.0), 800.0, 600.0), Vec2::ZERO);
        assert_eq!(pointer_ndc(Vec2::ZERO, 800.0, 600.0), Vec2::new(-1.0, 1.0));
        assert_eq!(
            pointer_ndc(Vec2::new(800.0, 600.0), 800.0, 600.0),
            Vec2::new(1.0, -1.0)
        );
    }

    #[test]
    fn test_triangle_hit_distance() {
        let ray = Ray::from_pose(Vec3::ZERO, Vec3::NEG_Z);
        let t = intersect_triangle(
            &ray,
            Vec3::new(-1.0, -1.0, -5.0),
            Vec3::new(1.0, -1.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
        )
        .unwrap();
        assert!((t - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_triangle_back_face_accepted() {
        let ray = Ray::from_pose(Vec3::ZERO, Vec3::NEG_Z);
        // Reversed winding: the ray sees the back of the triangle
        let t = intersect_triangle(
            &ray,
            Vec3::new(-1.0, -1.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
            Vec3::new(1.0, -1.0, -5.0),
        )
        .unwrap();
        assert!((t - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_triangle_behind_origin_rejected() {
        let ray = Ray::from_pose(Vec3::ZERO, Vec3::NEG_Z);
        let hit = intersect_triangle(
            &ray,
            Vec3::new(-1.0, -1.0, 5.0),
            Vec3::new(1.0, -1.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_triangle_parallel_ray_rejected() {
        let ray = Ray::from_pose(Vec3::ZERO, Vec3::X);
        let hit = intersect_triangle(
            &ray,
            Vec3::new(-1.0, -1.0, -5.0),
            Vec3::new(1.0, -1.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_cast_with_no_parts_is_no_hit() {
        let ray = Ray::from_pose(Vec3::ZERO, Vec3::NEG_Z);
        assert!(cast(&ray, &[]).is_none());
    }

    #[test]
    fn test_cast_returns_closest_hit_with_name() {
        let near = MeshPart {
            name: Some("Cortex".to_string()),
            positions: vec![
                Vec3::new(-1.0, -1.0, -2.0),
                Vec3::new(1.0, -1.0, -2.0),
                Vec3::new(0.0, 1.0, -2.0),
            ],
            indices: vec![0, 1, 2],
        };
        let far = facing_triangle();

        let ray = Ray::from_pose(Vec3::ZERO, Vec3::NEG_Z);
        let hit = cast(&ray, &[far, near]).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-5);
        assert_eq!(hit.part_name.as_deref(), Some("Cortex"));
    }

    #[test]
    fn test_cast_from_pose_normalizes_forward() {
        let hit = cast_from_pose(Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), &[facing_triangle()])
            .unwrap();
        assert!((hit.distance - 5.0).abs() < 1e-5);
        assert!((hit.point - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn test_cast_from_pointer_hits_projected_vertex() {
        // Camera at (0,0,3) looking down -Z, matching the viewer's start pose
        let fov_y = 75f32.to_radians();
        let aspect = 800.0 / 600.0;
        let frame = CameraFrame {
            world_from_camera: Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)),
            fov_y,
            aspect,
        };

        let vertex = Vec3::new(0.5, 0.5, 0.5);
        let part = MeshPart {
            name: None,
            positions: vec![vertex, Vec3::new(1.5, 0.7, 0.5), Vec3::new(0.7, 1.5, 0.5)],
            indices: vec![0, 1, 2],
        };

        // Screen-space projection of the vertex through the same pinhole model
        let in_camera = vertex - Vec3::new(0.0, 0.0, 3.0);
        let half_height = (fov_y * 0.5).tan();
        let ndc = Vec2::new(
            in_camera.x / (-in_camera.z * half_height * aspect),
            in_camera.y / (-in_camera.z * half_height),
        );

        let hit = cast_from_pointer(ndc, &frame, &[part]).unwrap();
        assert!((hit.point - vertex).length() < 1e-4);
    }

    #[test]
    fn test_cast_is_deterministic() {
        let parts = vec![facing_triangle()];
        let ndc = Vec2::new(0.123, -0.456);
        let frame = CameraFrame {
            world_from_camera: Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)),
            fov_y: 75f32.to_radians(),
            aspect: 1.5,
        };

        let first = cast_from_pointer(ndc, &frame, &parts);
        let second = cast_from_pointer(ndc, &frame, &parts);
        assert_eq!(first, second);
    }
}
