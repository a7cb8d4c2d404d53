use crate::error::{Error, Result};

use super::context::{
    AttributeSlot, ProgramHandle, RenderContext, ShaderHandle, ShaderStage, UniformSlot,
};

/// Slot handles every layer program must expose.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProgramSlots {
    pub position: AttributeSlot,
    /// Optional: a program without a `normal` input can only draw unshaded layers.
    pub normal: Option<AttributeSlot>,
    pub color: UniformSlot,
    pub model: UniformSlot,
    pub view: UniformSlot,
    pub projection: UniformSlot,
    pub has_normals: UniformSlot,
}

/// Compiled + linked layer program with resolved slots.
///
/// Immutable once built. Owns its shader and program handles; `destroy` releases
/// them and is idempotent.
#[derive(Debug)]
pub struct ShaderProgram {
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    program: ProgramHandle,
    slots: ProgramSlots,
    released: bool,
}

impl ShaderProgram {
    /// Compiles both stages, links them and resolves the layer slots.
    ///
    /// On any failure every handle acquired so far is released before returning.
    pub fn build(
        ctx: &mut dyn RenderContext,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self> {
        let vertex = ctx.compile_shader(ShaderStage::Vertex, vertex_source)?;

        let fragment = match ctx.compile_shader(ShaderStage::Fragment, fragment_source) {
            Ok(f) => f,
            Err(e) => {
                ctx.destroy_shader(vertex);
                return Err(e);
            }
        };

        let program = match ctx.link_program(vertex, fragment) {
            Ok(p) => p,
            Err(e) => {
                ctx.destroy_shader(fragment);
                ctx.destroy_shader(vertex);
                return Err(e);
            }
        };

        let slots = match resolve_slots(ctx, program) {
            Ok(s) => s,
            Err(e) => {
                ctx.destroy_program(program);
                ctx.destroy_shader(fragment);
                ctx.destroy_shader(vertex);
                return Err(e);
            }
        };

        log::debug!("built layer program {program:?} with slots {slots:?}");

        Ok(Self {
            vertex,
            fragment,
            program,
            slots,
            released: false,
        })
    }

    /// Binds the program for subsequent uniform updates and draws.
    #[inline]
    pub fn use_program(&self, ctx: &mut dyn RenderContext) {
        debug_assert!(!self.released, "using a destroyed program");
        ctx.use_program(self.program);
    }

    #[inline]
    pub fn handle(&self) -> ProgramHandle {
        self.program
    }

    #[inline]
    pub fn slots(&self) -> &ProgramSlots {
        &self.slots
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Releases the program and both shader stages.
    pub fn destroy(&mut self, ctx: &mut dyn RenderContext) {
        if self.released {
            return;
        }
        ctx.destroy_program(self.program);
        ctx.destroy_shader(self.fragment);
        ctx.destroy_shader(self.vertex);
        self.released = true;
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("shader program {:?} dropped without being destroyed", self.program);
        }
    }
}

fn resolve_slots(ctx: &dyn RenderContext, program: ProgramHandle) -> Result<ProgramSlots> {
    let attribute = |name: &str| {
        ctx.attribute_slot(program, name)
            .ok_or_else(|| Error::Link(format!("program has no `{name}` attribute")))
    };
    let uniform = |name: &str| {
        ctx.uniform_slot(program, name)
            .ok_or_else(|| Error::Link(format!("program has no `{name}` uniform")))
    };

    Ok(ProgramSlots {
        position: attribute("position")?,
        normal: ctx.attribute_slot(program, "normal"),
        color: uniform("color")?,
        model: uniform("model")?,
        view: uniform("view")?,
        projection: uniform("projection")?,
        has_normals: uniform("has_normals")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::render::{FaultPlan, HeadlessContext};

    fn ctx() -> HeadlessContext {
        HeadlessContext::new(Viewport::new(640.0, 480.0))
    }

    #[test]
    fn build_resolves_all_slots() {
        let mut ctx = ctx();
        let mut program = ShaderProgram::build(&mut ctx, "vs", "fs").unwrap();

        let slots = program.slots();
        assert_eq!(slots.position, AttributeSlot(0));
        assert_eq!(slots.normal, Some(AttributeSlot(1)));
        assert_ne!(slots.model, slots.view);

        assert_eq!(ctx.live_resources().programs, 1);
        assert_eq!(ctx.live_resources().shaders, 2);

        program.destroy(&mut ctx);
        program.destroy(&mut ctx);
        assert_eq!(ctx.live_resources().total(), 0);
    }

    #[test]
    fn compile_error_carries_diagnostic_and_leaks_nothing() {
        let mut ctx = ctx().with_faults(FaultPlan {
            compile_error_marker: Some("@@".to_string()),
            ..FaultPlan::default()
        });

        let err = ShaderProgram::build(&mut ctx, "vs", "fs @@").unwrap_err();
        match err {
            Error::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("@@"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ctx.live_resources().total(), 0);
    }

    #[test]
    fn link_error_releases_both_stages() {
        let mut ctx = ctx().with_faults(FaultPlan {
            fail_link: true,
            ..FaultPlan::default()
        });

        assert!(matches!(
            ShaderProgram::build(&mut ctx, "vs", "fs"),
            Err(Error::Link(_))
        ));
        assert_eq!(ctx.live_resources().total(), 0);
    }

    #[test]
    fn use_program_records_binding() {
        let mut ctx = ctx();
        let mut program = ShaderProgram::build(&mut ctx, "vs", "fs").unwrap();
        program.use_program(&mut ctx);
        assert_eq!(
            ctx.commands().last(),
            Some(&crate::render::Command::UseProgram(program.handle()))
        );
        program.destroy(&mut ctx);
    }
}
