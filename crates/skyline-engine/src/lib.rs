//! Skyline engine crate.
//!
//! Turns a heightmap into a layered 3D city mesh and renders it:
//! - `geometry`: heightmap decoding and city mesh synthesis (CPU only)
//! - `render`: shader programs, GPU-resident layers and the layer set, behind
//!   an explicit `RenderContext` (wgpu or headless)
//! - `camera` + `frame`: transform state, matrices and the per-frame loop
//! - `device`, `window`, `input`, `time`, `core`: platform + GPU runtime

pub mod error;

pub mod coords;
pub mod geometry;
pub mod camera;
pub mod render;
pub mod frame;

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;

pub use error::{Error, Result};
