use crate::camera::{CameraConfig, TransformState};
use crate::coords::ColorRgba;
use crate::error::{Error, Result};
use crate::geometry::{LayerMeshes, Mesh};
use crate::render::{FrameStatus, LayerSet, RenderContext, ShaderProgram};
use crate::time::{FrameClock, FrameTime};

/// Sky color behind the city.
pub const DEFAULT_CLEAR: ColorRgba = ColorRgba::new(190.0 / 255.0, 210.0 / 255.0, 215.0 / 255.0, 1.0);

/// What the host should do after a tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TickOutcome {
    /// A frame was submitted.
    Presented,
    /// Nothing was submitted this tick (transient surface problem); keep going.
    Skipped,
    /// The context is lost; stop scheduling ticks.
    Halted,
}

/// Layer membership change queued by a collaborator outside the draw path.
#[derive(Debug)]
enum PendingChange {
    Add { name: String, mesh: Mesh },
    Remove { name: String },
}

/// Drives one frame per `tick`: apply queued layer changes, clear, set viewport,
/// draw all layers, present.
///
/// Owns the layer set and the transform state, so membership changes and draws
/// are serialized on the thread calling `tick`.
#[derive(Debug)]
pub struct FrameLoop {
    layers: LayerSet,
    transform: TransformState,
    camera: CameraConfig,
    clear_color: ColorRgba,
    clock: FrameClock,
    pending: Vec<PendingChange>,
    halted: bool,
}

impl FrameLoop {
    /// Builds the shared layer program and an empty layer set.
    pub fn new(
        ctx: &mut dyn RenderContext,
        vertex_source: &str,
        fragment_source: &str,
        camera: CameraConfig,
    ) -> Result<Self> {
        let program = ShaderProgram::build(ctx, vertex_source, fragment_source)?;
        Ok(Self {
            layers: LayerSet::new(program),
            transform: TransformState::default(),
            camera,
            clear_color: DEFAULT_CLEAR,
            clock: FrameClock::new(),
            pending: Vec::new(),
            halted: false,
        })
    }

    pub fn with_transform(mut self, transform: TransformState) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    /// UI controls mutate the transform through this.
    #[inline]
    pub fn transform_mut(&mut self) -> &mut TransformState {
        &mut self.transform
    }

    #[inline]
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queues a layer upload; applied at the start of the next tick.
    pub fn queue_layer(&mut self, name: impl Into<String>, mesh: Mesh) {
        self.pending.push(PendingChange::Add { name: name.into(), mesh });
    }

    /// Queues every mesh of a synthesized city.
    pub fn queue_layers(&mut self, meshes: LayerMeshes) {
        for (name, mesh) in meshes {
            self.queue_layer(name, mesh);
        }
    }

    pub fn queue_removal(&mut self, name: impl Into<String>) {
        self.pending.push(PendingChange::Remove { name: name.into() });
    }

    /// Applies queued membership changes in order.
    ///
    /// Stops at the first failing upload; the failed change and everything after
    /// it are discarded and the error is returned.
    pub fn apply_pending(&mut self, ctx: &mut dyn RenderContext) -> Result<()> {
        for change in std::mem::take(&mut self.pending) {
            match change {
                PendingChange::Add { name, mesh } => self.layers.add_layer(ctx, &name, &mesh)?,
                PendingChange::Remove { name } => self.layers.remove_layer(ctx, &name),
            }
        }
        Ok(())
    }

    /// Runs one frame.
    ///
    /// Layer upload errors surface as `Err`; context loss halts the loop and
    /// every later tick returns `Halted` without touching the context.
    pub fn tick(&mut self, ctx: &mut dyn RenderContext) -> Result<TickOutcome> {
        if self.halted {
            return Ok(TickOutcome::Halted);
        }

        self.apply_pending(ctx)?;

        let time = self.clock.tick();

        match ctx.begin_frame(self.clear_color) {
            FrameStatus::Ready => {}
            FrameStatus::Skipped => {
                log::debug!("frame {} skipped", time.frame_index);
                return Ok(TickOutcome::Skipped);
            }
            FrameStatus::ContextLost => return Ok(self.halt(time)),
        }

        ctx.set_viewport(ctx.viewport());
        self.layers.draw(ctx, &self.transform, &self.camera);

        match ctx.end_frame() {
            FrameStatus::ContextLost => Ok(self.halt(time)),
            FrameStatus::Skipped => Ok(TickOutcome::Skipped),
            FrameStatus::Ready => {
                if time.frame_index % 600 == 0 {
                    log::debug!(
                        "frame {} ({:.2} ms), {} layers, {:?}",
                        time.frame_index,
                        time.dt * 1000.0,
                        self.layers.len(),
                        ctx.live_resources()
                    );
                }
                Ok(TickOutcome::Presented)
            }
        }
    }

    fn halt(&mut self, time: FrameTime) -> TickOutcome {
        log::error!("{} at frame {}; halting frame loop", Error::ContextLost, time.frame_index);
        self.halted = true;
        TickOutcome::Halted
    }

    /// Releases every layer and the shared program. Queued changes are dropped.
    pub fn shutdown(&mut self, ctx: &mut dyn RenderContext) {
        self.pending.clear();
        if self.halted {
            // Handles on a lost context are already gone; release only bookkeeping.
            log::debug!("shutting down after context loss");
        }
        self.layers.release(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::geometry::{synthesize, CityParams, BUILDINGS_LAYER, SURFACE_LAYER};
    use crate::render::{Command, FaultPlan, HeadlessContext};

    fn setup() -> (HeadlessContext, FrameLoop) {
        let mut ctx = HeadlessContext::new(Viewport::new(1280.0, 720.0));
        let frame_loop = FrameLoop::new(&mut ctx, "vs", "fs", CameraConfig::default()).unwrap();
        (ctx, frame_loop)
    }

    fn city() -> LayerMeshes {
        let pixels: Vec<u8> = [255u8, 0].iter().flat_map(|&r| [r, 0, 0, 255]).collect();
        synthesize(&pixels, 2, 1, &CityParams::default()).unwrap()
    }

    #[test]
    fn empty_loop_clears_and_presents() {
        let (mut ctx, mut fl) = setup();
        assert_eq!(fl.tick(&mut ctx).unwrap(), TickOutcome::Presented);

        assert_eq!(
            ctx.commands(),
            &[
                Command::BeginFrame(DEFAULT_CLEAR),
                Command::SetViewport(Viewport::new(1280.0, 720.0)),
                Command::EndFrame,
            ]
        );
        fl.shutdown(&mut ctx);
        assert_eq!(ctx.live_resources().total(), 0);
    }

    #[test]
    fn queued_city_is_applied_before_drawing() {
        let (mut ctx, mut fl) = setup();
        fl.queue_layers(city());
        assert!(fl.has_pending());

        assert_eq!(fl.tick(&mut ctx).unwrap(), TickOutcome::Presented);
        assert!(!fl.has_pending());
        assert!(fl.layers().contains(SURFACE_LAYER));
        assert!(fl.layers().contains(BUILDINGS_LAYER));
        assert_eq!(ctx.draw_count(), 2);

        fl.shutdown(&mut ctx);
        assert_eq!(ctx.live_resources().total(), 0);
    }

    #[test]
    fn queued_removal_applies_in_order() {
        let (mut ctx, mut fl) = setup();
        fl.queue_layers(city());
        fl.queue_removal(BUILDINGS_LAYER);
        fl.tick(&mut ctx).unwrap();

        assert_eq!(fl.layers().len(), 1);
        assert_eq!(ctx.draw_count(), 1);
        fl.shutdown(&mut ctx);
    }

    #[test]
    fn upload_failure_surfaces_and_leaks_nothing() {
        let (mut ctx, mut fl) = setup();
        ctx.faults_mut().fail_buffer_at = Some(1);
        fl.queue_layers(city());

        assert!(matches!(fl.tick(&mut ctx), Err(Error::ResourceAllocation(_))));
        assert!(fl.layers().is_empty());
        assert!(!fl.has_pending());
        assert_eq!(ctx.live_resources().buffers, 0);

        fl.shutdown(&mut ctx);
        assert_eq!(ctx.live_resources().total(), 0);
    }

    #[test]
    fn context_loss_halts_the_loop() {
        let (mut ctx, mut fl) = setup();
        *ctx.faults_mut() = FaultPlan {
            lose_context_at_frame: Some(2),
            ..FaultPlan::default()
        };

        assert_eq!(fl.tick(&mut ctx).unwrap(), TickOutcome::Presented);
        assert_eq!(fl.tick(&mut ctx).unwrap(), TickOutcome::Presented);
        assert_eq!(fl.tick(&mut ctx).unwrap(), TickOutcome::Halted);
        assert!(fl.is_halted());

        ctx.clear_commands();
        assert_eq!(fl.tick(&mut ctx).unwrap(), TickOutcome::Halted);
        assert!(ctx.commands().is_empty());
        fl.shutdown(&mut ctx);
    }

    #[test]
    fn transform_changes_reach_the_next_draw() {
        let (mut ctx, mut fl) = setup();
        fl.queue_layers(city());
        fl.tick(&mut ctx).unwrap();

        let model_of = |ctx: &HeadlessContext, fl: &FrameLoop| {
            let slot = fl.layers().program().slots().model;
            ctx.commands()
                .iter()
                .find_map(|c| match c {
                    Command::UniformMat4(s, m) if *s == slot => Some(*m),
                    _ => None,
                })
                .unwrap()
        };

        ctx.clear_commands();
        fl.tick(&mut ctx).unwrap();
        let before = model_of(&ctx, &fl);

        fl.transform_mut().set_rotation_degrees(45);
        ctx.clear_commands();
        fl.tick(&mut ctx).unwrap();
        let after = model_of(&ctx, &fl);

        assert_ne!(before, after);
        fl.shutdown(&mut ctx);
    }
}
