//! Small value types shared by the renderer and its callers.
//!
//! Viewport sizes are physical pixels; colors are linear straight-alpha RGBA.

mod color;
mod viewport;

pub use color::ColorRgba;
pub use viewport::Viewport;
