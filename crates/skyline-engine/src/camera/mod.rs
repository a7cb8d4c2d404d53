//! Camera state and matrix derivation.
//!
//! `TransformState` is what the UI controls mutate; `CameraConfig` turns it plus
//! the scene bounds into model/view/projection matrices once per drawn layer.

mod matrices;
mod transform;

pub use matrices::{model_matrix, CameraConfig, Matrices, SceneBounds};
pub use transform::{ProjectionMode, TransformState, MAX_ZOOM, MIN_ZOOM};
