use std::rc::Rc;

use glam::{DVec3, Vec3};

use crate::camera::{CameraConfig, SceneBounds, TransformState};
use crate::coords::ColorRgba;
use crate::error::{Error, Result};
use crate::geometry::Mesh;

use super::context::{
    BindingHandle, BufferHandle, BufferKind, RenderContext, VertexAttribute,
};
use super::program::ShaderProgram;

/// Vertex statistics kept after upload so the set can recompute its centroid
/// without holding on to CPU copies of the geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VertexStats {
    pub count: usize,
    /// Sum of all positions, in f64 to keep large cities exact.
    pub sum: DVec3,
    pub min: Vec3,
    pub max: Vec3,
}

impl VertexStats {
    pub fn of(vertices: &[[f32; 3]]) -> Self {
        let mut stats = Self {
            count: vertices.len(),
            sum: DVec3::ZERO,
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        };
        for &v in vertices {
            let v = Vec3::from(v);
            stats.sum += v.as_dvec3();
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
        }
        stats
    }
}

/// One named mesh resident on the GPU.
///
/// Owns its vertex, index and optional normal buffers plus the vertex binding.
/// `destroy` must be called before the layer is dropped; dropping a live layer
/// leaks its GPU handles and logs a warning.
#[derive(Debug)]
pub struct Layer {
    program: Rc<ShaderProgram>,

    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    normal_buffer: Option<BufferHandle>,
    binding: Option<BindingHandle>,

    index_count: u32,
    color: ColorRgba,
    has_normals: bool,
    stats: VertexStats,
}

impl Layer {
    /// Uploads `mesh` and builds its vertex binding.
    ///
    /// All-or-nothing: if any allocation fails, the ones that succeeded are
    /// released before the error is returned.
    pub fn create(ctx: &mut dyn RenderContext, mesh: &Mesh, program: Rc<ShaderProgram>) -> Result<Self> {
        mesh.validate()?;
        if mesh.has_normals() && program.slots().normal.is_none() {
            return Err(Error::InvalidInput(
                "mesh has normals but the program has no `normal` attribute".to_string(),
            ));
        }
        let index_count = u32::try_from(mesh.index_count())
            .map_err(|_| Error::InvalidInput("too many indices for one draw".to_string()))?;

        let mut layer = Self {
            program,
            vertex_buffer: None,
            index_buffer: None,
            normal_buffer: None,
            binding: None,
            index_count,
            color: mesh.color,
            has_normals: mesh.has_normals(),
            stats: VertexStats::of(&mesh.vertices),
        };

        if let Err(e) = layer.upload(ctx, mesh) {
            layer.destroy(ctx);
            return Err(e);
        }
        Ok(layer)
    }

    fn upload(&mut self, ctx: &mut dyn RenderContext, mesh: &Mesh) -> Result<()> {
        let slots = *self.program.slots();

        let vertex_buffer = ctx.create_buffer(BufferKind::Vertex, mesh.vertex_bytes())?;
        self.vertex_buffer = Some(vertex_buffer);

        self.index_buffer = Some(ctx.create_buffer(BufferKind::Index, mesh.index_bytes())?);

        let mut attributes = vec![VertexAttribute {
            slot: slots.position,
            buffer: vertex_buffer,
        }];

        if let (Some(bytes), Some(slot)) = (mesh.normal_bytes(), slots.normal) {
            let normal_buffer = ctx.create_buffer(BufferKind::Vertex, bytes)?;
            self.normal_buffer = Some(normal_buffer);
            attributes.push(VertexAttribute {
                slot,
                buffer: normal_buffer,
            });
        }

        self.binding = Some(ctx.create_vertex_binding(self.program.handle(), &attributes)?);
        Ok(())
    }

    /// Issues this layer's draw: program, matrices, color, normals flag, one indexed draw.
    pub fn draw(
        &self,
        ctx: &mut dyn RenderContext,
        bounds: &SceneBounds,
        transform: &TransformState,
        camera: &CameraConfig,
    ) {
        let (Some(binding), Some(index_buffer)) = (self.binding, self.index_buffer) else {
            log::debug!("skipping draw of a released layer");
            return;
        };
        if self.index_count == 0 {
            return;
        }

        let slots = self.program.slots();
        let m = camera.matrices(bounds, transform, ctx.viewport().aspect());

        self.program.use_program(ctx);
        ctx.set_uniform_mat4(slots.model, &m.model.to_cols_array());
        ctx.set_uniform_mat4(slots.view, &m.view.to_cols_array());
        ctx.set_uniform_mat4(slots.projection, &m.projection.to_cols_array());
        ctx.set_uniform_vec4(slots.color, self.color.to_array());
        ctx.set_uniform_bool(slots.has_normals, self.has_normals);

        ctx.bind_vertex_binding(binding);
        ctx.bind_index_buffer(index_buffer);
        ctx.draw_indexed(self.index_count);
    }

    /// Releases every GPU handle this layer owns. Safe to call more than once.
    pub fn destroy(&mut self, ctx: &mut dyn RenderContext) {
        if let Some(binding) = self.binding.take() {
            ctx.destroy_vertex_binding(binding);
        }
        for buffer in [
            self.normal_buffer.take(),
            self.index_buffer.take(),
            self.vertex_buffer.take(),
        ]
        .into_iter()
        .flatten()
        {
            ctx.destroy_buffer(buffer);
        }
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.vertex_buffer.is_none()
            && self.index_buffer.is_none()
            && self.normal_buffer.is_none()
            && self.binding.is_none()
    }

    #[inline]
    pub fn stats(&self) -> &VertexStats {
        &self.stats
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        self.has_normals
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!("layer dropped with live GPU resources; call destroy() first");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::render::{Command, FaultPlan, HeadlessContext};

    fn setup(faults: FaultPlan) -> (HeadlessContext, Rc<ShaderProgram>) {
        let mut ctx = HeadlessContext::new(Viewport::new(800.0, 600.0));
        let program = ShaderProgram::build(&mut ctx, "vs", "fs").unwrap();
        *ctx.faults_mut() = faults;
        (ctx, Rc::new(program))
    }

    fn teardown(ctx: &mut HeadlessContext, program: Rc<ShaderProgram>) {
        let mut program = Rc::try_unwrap(program).expect("program still shared");
        program.destroy(ctx);
    }

    fn triangle(with_normals: bool) -> Mesh {
        Mesh {
            vertices: vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [1.0, 3.0, 0.0]],
            indices: vec![0, 1, 2],
            normals: with_normals.then(|| vec![[0.0, 0.0, 1.0]; 3]),
            color: ColorRgba::new(0.5, 0.6, 0.9, 1.0),
        }
    }

    #[test]
    fn create_allocates_and_destroy_releases() {
        let (mut ctx, program) = setup(FaultPlan::default());

        let mut layer = Layer::create(&mut ctx, &triangle(true), program.clone()).unwrap();
        let live = ctx.live_resources();
        assert_eq!(live.buffers, 3);
        assert_eq!(live.bindings, 1);

        layer.destroy(&mut ctx);
        layer.destroy(&mut ctx);
        assert_eq!(ctx.live_resources().buffers, 0);
        assert_eq!(ctx.live_resources().bindings, 0);
        assert_eq!(ctx.buffer_churn(), (3, 3));

        drop(layer);
        teardown(&mut ctx, program);
    }

    #[test]
    fn no_normal_buffer_without_normals() {
        let (mut ctx, program) = setup(FaultPlan::default());
        let mut layer = Layer::create(&mut ctx, &triangle(false), program.clone()).unwrap();
        assert_eq!(ctx.live_resources().buffers, 2);
        assert!(!layer.has_normals());
        layer.destroy(&mut ctx);
        drop(layer);
        teardown(&mut ctx, program);
    }

    #[test]
    fn partial_allocation_failure_releases_everything() {
        // Third buffer is the normal buffer.
        for faults in [
            FaultPlan { fail_buffer_at: Some(0), ..FaultPlan::default() },
            FaultPlan { fail_buffer_at: Some(1), ..FaultPlan::default() },
            FaultPlan { fail_buffer_at: Some(2), ..FaultPlan::default() },
            FaultPlan { fail_bindings: true, ..FaultPlan::default() },
        ] {
            let (mut ctx, program) = setup(faults.clone());
            let err = Layer::create(&mut ctx, &triangle(true), program.clone()).unwrap_err();
            assert!(matches!(err, Error::ResourceAllocation(_)), "{faults:?}");
            assert_eq!(ctx.live_resources().buffers, 0, "{faults:?}");
            assert_eq!(ctx.live_resources().bindings, 0, "{faults:?}");
            teardown(&mut ctx, program);
        }
    }

    #[test]
    fn invalid_mesh_allocates_nothing() {
        let (mut ctx, program) = setup(FaultPlan::default());
        let mut mesh = triangle(false);
        mesh.indices.push(7);
        assert!(matches!(
            Layer::create(&mut ctx, &mesh, program.clone()),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(ctx.buffer_churn(), (0, 0));
        teardown(&mut ctx, program);
    }

    #[test]
    fn draw_uploads_uniforms_then_draws_all_indices() {
        let (mut ctx, program) = setup(FaultPlan::default());
        let mut layer = Layer::create(&mut ctx, &triangle(false), program.clone()).unwrap();
        ctx.clear_commands();

        let bounds = SceneBounds { centroid: Vec3::new(1.0, 1.0, 0.0), radius: 2.0 };
        layer.draw(&mut ctx, &bounds, &TransformState::default(), &CameraConfig::default());

        let cmds = ctx.commands();
        assert_eq!(cmds.first(), Some(&Command::UseProgram(program.handle())));
        assert!(cmds.contains(&Command::UniformVec4(
            program.slots().color,
            [0.5, 0.6, 0.9, 1.0]
        )));
        assert!(cmds.contains(&Command::UniformBool(program.slots().has_normals, false)));
        assert_eq!(
            cmds.last(),
            Some(&Command::DrawIndexed { program: Some(program.handle()), index_count: 3 })
        );

        layer.destroy(&mut ctx);
        drop(layer);
        teardown(&mut ctx, program);
    }

    #[test]
    fn stats_track_sum_and_extent() {
        let stats = VertexStats::of(&triangle(false).vertices);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, DVec3::new(3.0, 3.0, 0.0));
        assert_eq!(stats.min, Vec3::ZERO);
        assert_eq!(stats.max, Vec3::new(2.0, 3.0, 0.0));
    }
}
