//! Fit-to-view normalization
//!
//! Loaded models arrive in arbitrary native units and arbitrary positions.
//! This module computes the canonical display transform for a model: a
//! uniform scale that brings the largest bounding-box dimension to a fixed
//! target size, combined with a translation that puts the bounding-box
//! center at the local origin. The transform is recomputed from scratch on
//! every load (and whenever the user scale factor changes), never updated
//! incrementally.

use bevy_math::Vec3;

/// Default apparent size of a normalized model, in world units
pub const DEFAULT_TARGET_SIZE: f32 = 0.3;

/// Axis-aligned bounding box in a single coordinate space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from explicit corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest box around a set of points, or None when the set is empty
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in iter {
            aabb.include(p);
        }
        Some(aabb)
    }

    /// Expand the box to contain a point
    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest edge length
    pub fn max_extent(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }

    /// True when the box cannot produce a usable scale factor
    pub fn is_degenerate(&self) -> bool {
        let extent = self.max_extent();
        !extent.is_finite() || extent <= 0.0
    }
}

/// Canonical display transform for a loaded model
///
/// Applying `W(p) = scale * p + translation` to every point of the model
/// puts the bounding-box center at the origin with the largest dimension
/// equal to the target size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
    /// Uniform scale factor
    pub scale: f32,
    /// Translation applied after scaling
    pub translation: Vec3,
}

impl FitTransform {
    /// Compute the normalization transform for a model bounding box
    ///
    /// A zero or non-finite largest extent falls back to an extent of 1 so
    /// the scale is always finite; callers can check [`Aabb::is_degenerate`]
    /// to report the condition.
    pub fn normalize(aabb: &Aabb, target_size: f32) -> Self {
        let center = aabb.center();
        let mut max_dim = aabb.max_extent();
        if !max_dim.is_finite() || max_dim <= 0.0 {
            max_dim = 1.0;
        }
        let scale = target_size / max_dim;
        Self {
            scale,
            translation: -center * scale,
        }
    }

    /// Compose with a user-selected scale factor
    ///
    /// The factor multiplies the fitted scale; the translation is rescaled
    /// so the bounding-box center stays at the origin.
    pub fn with_user_scale(&self, factor: f32) -> Self {
        Self {
            scale: self.scale * factor,
            translation: self.translation * factor,
        }
    }

    /// Apply the transform to a point
    pub fn apply(&self, point: Vec3) -> Vec3 {
        point * self.scale + self.translation
    }
}
