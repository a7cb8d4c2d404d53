use crate::coords::{ColorRgba, Viewport};
use crate::error::Result;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub u64);
    };
}

handle!(
    /// GPU buffer (vertex or index data).
    BufferHandle
);
handle!(
    /// Compiled, unlinked shader stage.
    ShaderHandle
);
handle!(
    /// Linked vertex + fragment program.
    ProgramHandle
);
handle!(
    /// Vertex-attribute binding: which buffer feeds which attribute slot.
    BindingHandle
);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Resolved vertex attribute location.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AttributeSlot(pub u32);

/// Resolved uniform location. Backends define what the number means.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformSlot(pub u32);

/// One attribute of a vertex binding. Attributes are always tightly packed `f32 x 3`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub slot: AttributeSlot,
    pub buffer: BufferHandle,
}

/// Result of starting a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameStatus {
    /// Commands may be recorded.
    Ready,
    /// Transient surface problem; record nothing this tick.
    Skipped,
    /// The context is unusable; stop submitting.
    ContextLost,
}

/// Live resource counts, used to check for leaks.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ResourceCounts {
    pub buffers: usize,
    pub shaders: usize,
    pub programs: usize,
    pub bindings: usize,
}

impl ResourceCounts {
    #[inline]
    pub fn total(&self) -> usize {
        self.buffers + self.shaders + self.programs + self.bindings
    }
}

/// Explicit render context handed to every resource constructor and draw call.
///
/// The interface is deliberately immediate-mode: bind state, set uniforms, draw.
/// Implementations may record and replay (wgpu) or only record (headless).
///
/// Resource rules:
/// - every `create_*`/`compile_*`/`link_*` handle is owned by the caller
/// - `destroy_*` on an unknown or already destroyed handle is ignored
pub trait RenderContext {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferHandle>;
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Compiles a single stage. Fails with `Error::Compile` carrying the diagnostic.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle>;
    fn destroy_shader(&mut self, shader: ShaderHandle);

    /// Links two compiled stages. Fails with `Error::Link` carrying the diagnostic.
    fn link_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> Result<ProgramHandle>;
    fn destroy_program(&mut self, program: ProgramHandle);

    fn attribute_slot(&self, program: ProgramHandle, name: &str) -> Option<AttributeSlot>;
    fn uniform_slot(&self, program: ProgramHandle, name: &str) -> Option<UniformSlot>;

    fn create_vertex_binding(
        &mut self,
        program: ProgramHandle,
        attributes: &[VertexAttribute],
    ) -> Result<BindingHandle>;
    fn destroy_vertex_binding(&mut self, binding: BindingHandle);

    /// Makes `program` the target of subsequent uniform updates and draws.
    fn use_program(&mut self, program: ProgramHandle);
    fn set_uniform_mat4(&mut self, slot: UniformSlot, value: &[f32; 16]);
    fn set_uniform_vec4(&mut self, slot: UniformSlot, value: [f32; 4]);
    fn set_uniform_bool(&mut self, slot: UniformSlot, value: bool);

    fn bind_vertex_binding(&mut self, binding: BindingHandle);
    fn bind_index_buffer(&mut self, buffer: BufferHandle);

    /// Indexed triangle-list draw of `index_count` `u32` indices from the bound index buffer.
    fn draw_indexed(&mut self, index_count: u32);

    /// Starts a frame: clears color and depth to `clear`/1.0.
    fn begin_frame(&mut self, clear: ColorRgba) -> FrameStatus;
    fn set_viewport(&mut self, viewport: Viewport);
    /// Submits and presents everything recorded since `begin_frame`.
    fn end_frame(&mut self) -> FrameStatus;

    /// Current drawable size.
    fn viewport(&self) -> Viewport;

    fn live_resources(&self) -> ResourceCounts;
}
