//! GPU rendering subsystem.
//!
//! Layers draw through an explicit [`RenderContext`]: an immediate-mode
//! interface (bind program, set uniforms, bind buffers, draw) with two
//! implementations:
//! - [`WgpuContext`] renders into the window surface
//! - [`HeadlessContext`] records commands without a GPU
//!
//! Convention:
//! - world space is right-handed, Z up
//! - every layer of a [`LayerSet`] shares one [`ShaderProgram`]

mod context;
mod headless;
mod layer;
mod layer_set;
mod program;
mod wgpu_backend;

pub use context::{
    AttributeSlot, BindingHandle, BufferHandle, BufferKind, FrameStatus, ProgramHandle,
    RenderContext, ResourceCounts, ShaderHandle, ShaderStage, UniformSlot, VertexAttribute,
};
pub use headless::{Command, FaultPlan, HeadlessContext};
pub use layer::{Layer, VertexStats};
pub use layer_set::LayerSet;
pub use program::{ProgramSlots, ShaderProgram};
pub use wgpu_backend::{
    reflect_program, ProgramLayout, UniformKind, UniformMember, WgpuContext, WgpuRenderer,
};
