use anyhow::{bail, Context, Result};
use skyline_engine::camera::{CameraConfig, TransformState};
use skyline_engine::coords::Viewport;
use skyline_engine::frame::{FrameLoop, TickOutcome};
use skyline_engine::geometry::LayerMeshes;
use skyline_engine::render::{reflect_program, HeadlessContext, RenderContext};

use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

/// Size of one uploaded layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub name: String,
    pub vertices: usize,
    pub triangles: u32,
    pub normals: bool,
}

/// What a headless run did.
#[derive(Debug, Default, PartialEq)]
pub struct HeadlessReport {
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub draws: usize,
    /// In draw order.
    pub layers: Vec<LayerSummary>,
    /// Resources still alive after shutdown; zero unless something leaked.
    pub leaked: usize,
}

/// Runs `frames` ticks of the frame loop against the recording backend.
///
/// The bundled WGSL is still compiled and linked on the CPU first, so shader
/// regressions fail here the same way they would on a GPU.
pub fn run(
    meshes: LayerMeshes,
    transform: TransformState,
    viewport: Viewport,
    frames: u64,
) -> Result<HeadlessReport> {
    let layout = reflect_program(VERTEX_SHADER, FRAGMENT_SHADER).context("bundled shaders are invalid")?;
    log::debug!(
        "shader interface: inputs {:?}, {} uniform bytes",
        layout.vertex_inputs,
        layout.uniform_size
    );

    let mut ctx = HeadlessContext::new(viewport);
    let mut frame_loop = FrameLoop::new(&mut ctx, VERTEX_SHADER, FRAGMENT_SHADER, CameraConfig::default())?
        .with_transform(transform);
    frame_loop.queue_layers(meshes);

    let result = drive(&mut ctx, &mut frame_loop, frames);

    let layers = frame_loop
        .layers()
        .names()
        .filter_map(|name| {
            let layer = frame_loop.layers().get(name)?;
            Some(LayerSummary {
                name: name.to_string(),
                vertices: layer.stats().count,
                triangles: layer.index_count() / 3,
                normals: layer.has_normals(),
            })
        })
        .collect();

    frame_loop.shutdown(&mut ctx);
    let mut report = result?;
    report.layers = layers;
    report.leaked = ctx.live_resources().total();
    Ok(report)
}

fn drive(ctx: &mut HeadlessContext, frame_loop: &mut FrameLoop, frames: u64) -> Result<HeadlessReport> {
    let mut report = HeadlessReport::default();
    for _ in 0..frames {
        ctx.clear_commands();
        match frame_loop.tick(ctx)? {
            TickOutcome::Presented => report.frames_presented += 1,
            TickOutcome::Skipped => report.frames_skipped += 1,
            TickOutcome::Halted => bail!("render context lost after {} frames", report.frames_presented),
        }
        report.draws += ctx.draw_count();
    }
    Ok(report)
}

/// One line per layer plus a totals line.
pub fn summarize(report: &HeadlessReport) -> String {
    let mut out = String::new();
    for layer in &report.layers {
        out.push_str(&format!(
            "{}: {} vertices, {} triangles{}\n",
            layer.name,
            layer.vertices,
            layer.triangles,
            if layer.normals { ", normals" } else { "" }
        ));
    }
    out.push_str(&format!(
        "{} frames presented, {} skipped, {} draws, {} leaked resources",
        report.frames_presented, report.frames_skipped, report.draws, report.leaked
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyline_engine::geometry::{synthesize, CityParams, BUILDINGS_LAYER, SURFACE_LAYER};

    fn city(with_normals: bool) -> LayerMeshes {
        // 2x2: two buildings, one of them zero height.
        let reds = [255u8, 0, 128, 0];
        let pixels: Vec<u8> = reds.iter().flat_map(|&r| [r, 0, 0, 255]).collect();
        let params = CityParams {
            with_normals,
            ..CityParams::default()
        };
        synthesize(&pixels, 2, 2, &params).unwrap()
    }

    #[test]
    fn runs_requested_frames_and_cleans_up() {
        let report = run(city(false), TransformState::default(), Viewport::new(640.0, 480.0), 3).unwrap();

        assert_eq!(report.frames_presented, 3);
        assert_eq!(report.frames_skipped, 0);
        assert_eq!(report.draws, 6);
        assert_eq!(report.leaked, 0);

        let names: Vec<&str> = report.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, [BUILDINGS_LAYER, SURFACE_LAYER]);
        let surface = &report.layers[1];
        assert_eq!((surface.vertices, surface.triangles, surface.normals), (4, 2, false));
    }

    #[test]
    fn zero_frames_uploads_nothing() {
        let report = run(city(true), TransformState::default(), Viewport::new(64.0, 64.0), 0).unwrap();
        assert_eq!(report.frames_presented, 0);
        assert_eq!(report.draws, 0);
        assert!(report.layers.is_empty());
        assert_eq!(report.leaked, 0);
    }

    #[test]
    fn summary_lists_layers_and_totals() {
        let report = HeadlessReport {
            frames_presented: 2,
            frames_skipped: 0,
            draws: 4,
            layers: vec![
                LayerSummary {
                    name: "buildings".to_string(),
                    vertices: 48,
                    triangles: 24,
                    normals: true,
                },
                LayerSummary {
                    name: "surface".to_string(),
                    vertices: 4,
                    triangles: 2,
                    normals: false,
                },
            ],
            leaked: 0,
        };
        assert_eq!(
            summarize(&report),
            "buildings: 48 vertices, 24 triangles, normals\n\
             surface: 4 vertices, 2 triangles\n\
             2 frames presented, 0 skipped, 4 draws, 0 leaked resources"
        );
    }
}
