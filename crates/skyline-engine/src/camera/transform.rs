use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Smallest accepted zoom factor.
pub const MIN_ZOOM: f32 = 0.1;
/// Largest accepted zoom factor.
pub const MAX_ZOOM: f32 = 10.0;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ProjectionMode {
    #[default]
    Perspective,
    Orthographic,
}

impl ProjectionMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Perspective => Self::Orthographic,
            Self::Orthographic => Self::Perspective,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Perspective => "perspective",
            Self::Orthographic => "orthographic",
        }
    }
}

impl fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perspective" => Ok(Self::Perspective),
            "orthographic" | "ortho" => Ok(Self::Orthographic),
            other => Err(Error::InvalidInput(format!("unknown projection mode `{other}`"))),
        }
    }
}

/// Camera/projection state driven by UI controls and read once per drawn layer.
///
/// The renderer never writes it. Single-threaded: the UI handlers and the frame
/// loop run on the same thread, so no synchronization is involved.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformState {
    rotation_degrees: i32,
    zoom: f32,
    projection: ProjectionMode,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            rotation_degrees: 0,
            zoom: 1.0,
            projection: ProjectionMode::Perspective,
        }
    }
}

impl TransformState {
    pub fn new(rotation_degrees: i32, zoom: f32, projection: ProjectionMode) -> Self {
        let mut state = Self::default();
        state.set_rotation_degrees(rotation_degrees);
        state.set_zoom(zoom);
        state.set_projection(projection);
        state
    }

    #[inline]
    pub fn rotation_degrees(&self) -> i32 {
        self.rotation_degrees
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[inline]
    pub fn projection(&self) -> ProjectionMode {
        self.projection
    }

    /// Sets the rotation about the vertical axis, wrapped into `[0, 360)`.
    pub fn set_rotation_degrees(&mut self, degrees: i32) {
        self.rotation_degrees = degrees.rem_euclid(360);
    }

    /// Sets the zoom factor, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if !zoom.is_finite() {
            log::warn!("ignoring non-finite zoom {zoom}");
            return;
        }
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn set_projection(&mut self, projection: ProjectionMode) {
        self.projection = projection;
    }

    /// Applies a projection mode given by name (`"perspective"` / `"orthographic"`).
    pub fn set_projection_str(&mut self, name: &str) -> crate::error::Result<()> {
        self.projection = name.parse()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_wraps() {
        let mut t = TransformState::default();
        t.set_rotation_degrees(370);
        assert_eq!(t.rotation_degrees(), 10);
        t.set_rotation_degrees(-5);
        assert_eq!(t.rotation_degrees(), 355);
    }

    #[test]
    fn zoom_is_clamped_and_never_zero() {
        let mut t = TransformState::default();
        t.set_zoom(0.0);
        assert_eq!(t.zoom(), MIN_ZOOM);
        t.set_zoom(1e6);
        assert_eq!(t.zoom(), MAX_ZOOM);
        t.set_zoom(f32::NAN);
        assert_eq!(t.zoom(), MAX_ZOOM);
    }

    #[test]
    fn projection_parses_ui_strings() {
        let mut t = TransformState::default();
        t.set_projection_str("orthographic").unwrap();
        assert_eq!(t.projection(), ProjectionMode::Orthographic);
        t.set_projection_str(" Perspective ").unwrap();
        assert_eq!(t.projection(), ProjectionMode::Perspective);
        assert!(t.set_projection_str("fisheye").is_err());
        assert_eq!(t.projection(), ProjectionMode::Perspective);
    }
}
