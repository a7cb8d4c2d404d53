use skyline_engine::camera::{CameraConfig, TransformState};
use skyline_engine::core::{App, AppControl, FrameCtx};
use skyline_engine::device::Gpu;
use skyline_engine::frame::{FrameLoop, TickOutcome};
use skyline_engine::geometry::LayerMeshes;
use skyline_engine::render::WgpuRenderer;
use skyline_engine::window::{CursorIcon, WindowId};

use crate::controls::{title_for, OrbitControls};
use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

/// Interactive viewer: one window, one frame loop.
///
/// The frame loop needs a live GPU context to compile its program, so it is
/// built on the first frame rather than up front.
pub struct CityViewer {
    renderer: WgpuRenderer,
    frame_loop: Option<FrameLoop>,
    meshes: Option<LayerMeshes>,
    initial_transform: TransformState,
    camera: CameraConfig,
    controls: OrbitControls,
    dragging: bool,
    title: String,
}

impl CityViewer {
    pub fn new(meshes: LayerMeshes, initial_transform: TransformState) -> Self {
        Self {
            renderer: WgpuRenderer::new(),
            frame_loop: None,
            meshes: Some(meshes),
            initial_transform,
            camera: CameraConfig::default(),
            controls: OrbitControls::new(),
            dragging: false,
            title: String::new(),
        }
    }

    fn build_frame_loop(&mut self, gpu: &mut Gpu<'_>) -> skyline_engine::Result<FrameLoop> {
        let adapter = gpu.adapter_info().name;
        let mut ctx = self.renderer.context(gpu);
        let mut frame_loop = FrameLoop::new(&mut ctx, VERTEX_SHADER, FRAGMENT_SHADER, self.camera.clone())?
            .with_transform(self.initial_transform);
        if let Some(meshes) = self.meshes.take() {
            frame_loop.queue_layers(meshes);
        }
        log::info!("frame loop ready on {adapter}");
        Ok(frame_loop)
    }
}

impl App for CityViewer {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if OrbitControls::wants_exit(ctx.input_frame) {
            log::info!("escape pressed; exiting");
            return AppControl::Exit;
        }

        if self.frame_loop.is_none() {
            match self.build_frame_loop(ctx.gpu) {
                Ok(frame_loop) => self.frame_loop = Some(frame_loop),
                Err(e) => {
                    log::error!("failed to set up rendering: {e}");
                    return AppControl::Exit;
                }
            }
        }
        let Some(frame_loop) = self.frame_loop.as_mut() else {
            return AppControl::Exit;
        };

        self.controls.apply(ctx.input, ctx.input_frame, frame_loop.transform_mut());

        let title = title_for(frame_loop.transform());
        if title != self.title {
            ctx.window.set_title(&title);
            self.title = title;
        }

        let dragging = self.controls.is_dragging(ctx.input);
        if dragging != self.dragging {
            ctx.window.set_cursor(if dragging { CursorIcon::Grabbing } else { CursorIcon::Default });
            self.dragging = dragging;
        }

        ctx.window.pre_present_notify();
        let mut render_ctx = self.renderer.context(ctx.gpu);
        match frame_loop.tick(&mut render_ctx) {
            Ok(TickOutcome::Presented | TickOutcome::Skipped) => AppControl::Continue,
            Ok(TickOutcome::Halted) => AppControl::Exit,
            Err(e) => {
                log::error!("frame failed: {e}");
                AppControl::Exit
            }
        }
    }

    fn on_exit(&mut self, window_id: WindowId, gpu: &mut Gpu<'_>) {
        if let Some(mut frame_loop) = self.frame_loop.take() {
            let mut ctx = self.renderer.context(gpu);
            frame_loop.shutdown(&mut ctx);
            log::debug!("released render resources for {window_id:?}");
        }
    }
}
