//! Gyrus Core - geometry, annotation state, and asset caching
//!
//! This crate provides the foundational types for the Gyrus viewer:
//! - Fit-to-view normalization (bounding boxes and the canonical display transform)
//! - Pointer/pose ray construction and triangle-mesh picking
//! - Annotation marker state and its pulse curve
//! - Application mode state machine (viewing / placement / session)
//! - Content-addressed disk cache for downloaded model files

pub mod cache;
pub mod fit;
pub mod marker;
pub mod pick;
pub mod state;

pub use cache::{AssetCache, CacheError, CachedAsset, sha256_hex};
pub use fit::{Aabb, FitTransform, DEFAULT_TARGET_SIZE};
pub use marker::{pulse_intensity, MarkerState};
pub use pick::{
    cast, cast_from_pointer, cast_from_pose, pointer_ndc, CameraFrame, MeshPart, Ray, RayHit,
};
pub use state::{AppState, PlacementMode, SelectAction, SessionMode, ViewingMode};
