use std::collections::{HashMap, HashSet};

use crate::coords::{ColorRgba, Viewport};
use crate::error::{Error, Result};

use super::context::{
    AttributeSlot, BindingHandle, BufferHandle, BufferKind, FrameStatus, ProgramHandle,
    RenderContext, ResourceCounts, ShaderHandle, ShaderStage, UniformSlot, VertexAttribute,
};

/// Uniform names the headless context resolves, in slot order.
const UNIFORM_NAMES: [&str; 5] = ["color", "model", "view", "projection", "has_normals"];
/// Attribute names the headless context resolves, in location order.
const ATTRIBUTE_NAMES: [&str; 2] = ["position", "normal"];

/// A recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame(ColorRgba),
    SetViewport(Viewport),
    UseProgram(ProgramHandle),
    UniformMat4(UniformSlot, [f32; 16]),
    UniformVec4(UniformSlot, [f32; 4]),
    UniformBool(UniformSlot, bool),
    BindVertexBinding(BindingHandle),
    BindIndexBuffer(BufferHandle),
    DrawIndexed { program: Option<ProgramHandle>, index_count: u32 },
    EndFrame,
}

/// Injected failures.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Fail the buffer allocation attempt with this zero-based ordinal.
    pub fail_buffer_at: Option<usize>,
    /// Fail binding creation.
    pub fail_bindings: bool,
    /// Fail compilation of any source containing this marker.
    pub compile_error_marker: Option<String>,
    /// Fail every link.
    pub fail_link: bool,
    /// Report context loss from the given frame index on.
    pub lose_context_at_frame: Option<u64>,
}

/// GPU-less render context.
///
/// Assigns handles, tracks live resources and records every command. Used as the
/// test double for the renderer and by the viewer's `--headless` mode.
#[derive(Debug)]
pub struct HeadlessContext {
    next_id: u64,
    buffers: HashMap<BufferHandle, (BufferKind, usize)>,
    shaders: HashMap<ShaderHandle, ShaderStage>,
    programs: HashSet<ProgramHandle>,
    bindings: HashSet<BindingHandle>,

    buffer_attempts: usize,
    buffers_created: usize,
    buffers_destroyed: usize,

    viewport: Viewport,
    current_program: Option<ProgramHandle>,
    frames_begun: u64,
    commands: Vec<Command>,

    faults: FaultPlan,
}

impl HeadlessContext {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            next_id: 1,
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashSet::new(),
            bindings: HashSet::new(),
            buffer_attempts: 0,
            buffers_created: 0,
            buffers_destroyed: 0,
            viewport,
            current_program: None,
            frames_begun: 0,
            commands: Vec::new(),
            faults: FaultPlan::default(),
        }
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    pub fn faults_mut(&mut self) -> &mut FaultPlan {
        &mut self.faults
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of draw calls recorded since the last `clear_commands`.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count()
    }

    /// Total buffer allocations and releases over the context's life.
    pub fn buffer_churn(&self) -> (usize, usize) {
        (self.buffers_created, self.buffers_destroyed)
    }

    pub fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(&buffer).map(|(_, len)| *len)
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn lost(&self) -> bool {
        self.faults
            .lose_context_at_frame
            .is_some_and(|at| self.frames_begun > at)
    }
}

impl RenderContext for HeadlessContext {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferHandle> {
        let ordinal = self.buffer_attempts;
        self.buffer_attempts += 1;
        if self.faults.fail_buffer_at == Some(ordinal) {
            return Err(Error::ResourceAllocation(format!(
                "injected failure allocating buffer #{ordinal}"
            )));
        }

        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, (kind, contents.len()));
        self.buffers_created += 1;
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            self.buffers_destroyed += 1;
        }
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle> {
        if let Some(marker) = self.faults.compile_error_marker.as_deref() {
            if source.contains(marker) {
                return Err(Error::Compile {
                    stage,
                    log: format!("unexpected token `{marker}`"),
                });
            }
        }

        let handle = ShaderHandle(self.next());
        self.shaders.insert(handle, stage);
        Ok(handle)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> Result<ProgramHandle> {
        if self.faults.fail_link {
            return Err(Error::Link("injected link failure".to_string()));
        }
        match (self.shaders.get(&vertex), self.shaders.get(&fragment)) {
            (Some(ShaderStage::Vertex), Some(ShaderStage::Fragment)) => {}
            _ => return Err(Error::Link("stage mismatch or unknown shader".to_string())),
        }

        let handle = ProgramHandle(self.next());
        self.programs.insert(handle);
        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn attribute_slot(&self, program: ProgramHandle, name: &str) -> Option<AttributeSlot> {
        if !self.programs.contains(&program) {
            return None;
        }
        ATTRIBUTE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| AttributeSlot(i as u32))
    }

    fn uniform_slot(&self, program: ProgramHandle, name: &str) -> Option<UniformSlot> {
        if !self.programs.contains(&program) {
            return None;
        }
        UNIFORM_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| UniformSlot(i as u32))
    }

    fn create_vertex_binding(
        &mut self,
        program: ProgramHandle,
        attributes: &[VertexAttribute],
    ) -> Result<BindingHandle> {
        if self.faults.fail_bindings {
            return Err(Error::ResourceAllocation("injected binding failure".to_string()));
        }
        if !self.programs.contains(&program) {
            return Err(Error::ResourceAllocation(format!("unknown program {program:?}")));
        }
        if let Some(a) = attributes.iter().find(|a| !self.buffers.contains_key(&a.buffer)) {
            return Err(Error::ResourceAllocation(format!(
                "attribute {:?} references unknown buffer {:?}",
                a.slot, a.buffer
            )));
        }

        let handle = BindingHandle(self.next());
        self.bindings.insert(handle);
        Ok(handle)
    }

    fn destroy_vertex_binding(&mut self, binding: BindingHandle) {
        self.bindings.remove(&binding);
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform_mat4(&mut self, slot: UniformSlot, value: &[f32; 16]) {
        self.commands.push(Command::UniformMat4(slot, *value));
    }

    fn set_uniform_vec4(&mut self, slot: UniformSlot, value: [f32; 4]) {
        self.commands.push(Command::UniformVec4(slot, value));
    }

    fn set_uniform_bool(&mut self, slot: UniformSlot, value: bool) {
        self.commands.push(Command::UniformBool(slot, value));
    }

    fn bind_vertex_binding(&mut self, binding: BindingHandle) {
        self.commands.push(Command::BindVertexBinding(binding));
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.commands.push(Command::BindIndexBuffer(buffer));
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.commands.push(Command::DrawIndexed {
            program: self.current_program,
            index_count,
        });
    }

    fn begin_frame(&mut self, clear: ColorRgba) -> FrameStatus {
        self.frames_begun += 1;
        if self.lost() {
            return FrameStatus::ContextLost;
        }
        self.commands.push(Command::BeginFrame(clear));
        FrameStatus::Ready
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    fn end_frame(&mut self) -> FrameStatus {
        self.commands.push(Command::EndFrame);
        if self.lost() {
            FrameStatus::ContextLost
        } else {
            FrameStatus::Ready
        }
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            buffers: self.buffers.len(),
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            bindings: self.bindings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(ctx: &mut HeadlessContext) -> ProgramHandle {
        let vs = ctx.compile_shader(ShaderStage::Vertex, "vs").unwrap();
        let fs = ctx.compile_shader(ShaderStage::Fragment, "fs").unwrap();
        ctx.link_program(vs, fs).unwrap()
    }

    #[test]
    fn tracks_live_resources() {
        let mut ctx = HeadlessContext::new(Viewport::new(10.0, 10.0));
        let program = linked(&mut ctx);
        let buffer = ctx.create_buffer(BufferKind::Vertex, &[0u8; 36]).unwrap();
        assert_eq!(ctx.buffer_len(buffer), Some(36));

        let slot = ctx.attribute_slot(program, "position").unwrap();
        let binding = ctx
            .create_vertex_binding(program, &[VertexAttribute { slot, buffer }])
            .unwrap();

        let live = ctx.live_resources();
        assert_eq!((live.buffers, live.shaders, live.programs, live.bindings), (1, 2, 1, 1));

        ctx.destroy_vertex_binding(binding);
        ctx.destroy_buffer(buffer);
        ctx.destroy_buffer(buffer);
        assert_eq!(ctx.buffer_churn(), (1, 1));
    }

    #[test]
    fn swapped_stages_do_not_link() {
        let mut ctx = HeadlessContext::new(Viewport::new(10.0, 10.0));
        let vs = ctx.compile_shader(ShaderStage::Vertex, "vs").unwrap();
        let fs = ctx.compile_shader(ShaderStage::Fragment, "fs").unwrap();
        assert!(matches!(ctx.link_program(fs, vs), Err(Error::Link(_))));
    }

    #[test]
    fn slots_resolve_only_on_live_programs() {
        let mut ctx = HeadlessContext::new(Viewport::new(10.0, 10.0));
        let program = linked(&mut ctx);
        assert!(ctx.uniform_slot(program, "model").is_some());
        assert!(ctx.uniform_slot(program, "nope").is_none());

        ctx.destroy_program(program);
        assert!(ctx.uniform_slot(program, "model").is_none());
        assert!(ctx.attribute_slot(program, "position").is_none());
    }

    #[test]
    fn binding_rejects_unknown_buffers() {
        let mut ctx = HeadlessContext::new(Viewport::new(10.0, 10.0));
        let program = linked(&mut ctx);
        let attr = VertexAttribute {
            slot: AttributeSlot(0),
            buffer: BufferHandle(999),
        };
        assert!(matches!(
            ctx.create_vertex_binding(program, &[attr]),
            Err(Error::ResourceAllocation(_))
        ));
        assert_eq!(ctx.live_resources().bindings, 0);
    }

    #[test]
    fn compile_marker_injects_diagnostics() {
        let mut ctx = HeadlessContext::new(Viewport::new(10.0, 10.0)).with_faults(FaultPlan {
            compile_error_marker: Some("@@".to_string()),
            ..FaultPlan::default()
        });
        let err = ctx.compile_shader(ShaderStage::Fragment, "fn main() { @@ }").unwrap_err();
        match err {
            Error::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("@@"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ctx.live_resources().shaders, 0);
    }

    #[test]
    fn draws_record_the_current_program() {
        let mut ctx = HeadlessContext::new(Viewport::new(10.0, 10.0));
        let program = linked(&mut ctx);
        assert_eq!(ctx.begin_frame(ColorRgba::new(0.0, 0.0, 0.0, 1.0)), FrameStatus::Ready);
        ctx.use_program(program);
        ctx.draw_indexed(6);
        ctx.destroy_program(program);
        ctx.draw_indexed(3);

        assert_eq!(ctx.draw_count(), 2);
        assert!(ctx.commands().contains(&Command::DrawIndexed { program: Some(program), index_count: 6 }));
        assert!(ctx.commands().contains(&Command::DrawIndexed { program: None, index_count: 3 }));
    }
}
