use std::path::PathBuf;

use clap::Parser;
use skyline_engine::camera::{ProjectionMode, TransformState};

/// Command-line arguments for the city viewer.
#[derive(Parser, Debug)]
#[command(name = "skyline")]
#[command(about = "Renders a heightmap image as an extruded 3D city")]
#[command(long_about = "Every pixel of the heightmap becomes a box whose height follows the \
red channel. Arrow keys or left-drag rotate, the wheel or +/- zoom, P toggles \
the projection and Escape quits.")]
#[command(version)]
pub struct Args {
    /// Heightmap image (PNG, JPEG, BMP, GIF or TIFF).
    pub heightmap: PathBuf,

    /// Window width in logical pixels.
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Window height in logical pixels.
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Initial projection: perspective or orthographic.
    #[arg(long, default_value = "perspective")]
    pub projection: ProjectionMode,

    /// Initial zoom factor.
    #[arg(long, default_value = "1.0")]
    pub zoom: f32,

    /// Initial rotation about the vertical axis, in degrees.
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub rotate: i32,

    /// Emit per-face normals and shade buildings with a directional light.
    #[arg(long)]
    pub normals: bool,

    /// Run without a window against the recording backend.
    #[arg(long)]
    pub headless: bool,

    /// Frames to run in headless mode.
    #[arg(long, default_value = "1", requires = "headless")]
    pub frames: u64,

    /// Log filter in env_logger syntax (overrides RUST_LOG).
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl Args {
    /// Transform state the viewer starts from.
    pub fn initial_transform(&self) -> TransformState {
        TransformState::new(self.rotate, self.zoom, self.projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["skyline", "city.png"]).unwrap();
        assert_eq!(args.heightmap, PathBuf::from("city.png"));
        assert_eq!((args.width, args.height), (1280, 720));
        assert_eq!(args.projection, ProjectionMode::Perspective);
        assert!(!args.normals);
        assert!(!args.headless);
        assert_eq!(args.frames, 1);
        assert!(args.log_filter.is_none());
        assert_eq!(args.initial_transform(), TransformState::default());
    }

    #[test]
    fn transform_flags_build_the_initial_state() {
        let args = Args::try_parse_from([
            "skyline",
            "city.png",
            "--projection",
            "ortho",
            "--zoom",
            "2.5",
            "--rotate",
            "-90",
        ])
        .unwrap();

        let t = args.initial_transform();
        assert_eq!(t.projection(), ProjectionMode::Orthographic);
        assert_eq!(t.zoom(), 2.5);
        assert_eq!(t.rotation_degrees(), 270);
    }

    #[test]
    fn unknown_projection_is_rejected() {
        assert!(Args::try_parse_from(["skyline", "city.png", "--projection", "fisheye"]).is_err());
    }

    #[test]
    fn frames_requires_headless() {
        assert!(Args::try_parse_from(["skyline", "city.png", "--frames", "3"]).is_err());

        let args =
            Args::try_parse_from(["skyline", "city.png", "--headless", "--frames", "3"]).unwrap();
        assert!(args.headless);
        assert_eq!(args.frames, 3);
    }

    #[test]
    fn heightmap_is_required() {
        assert!(Args::try_parse_from(["skyline"]).is_err());
    }
}
