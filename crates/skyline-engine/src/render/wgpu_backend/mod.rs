//! wgpu implementation of [`RenderContext`](crate::render::RenderContext).
//!
//! Shaders are WGSL. Each stage is parsed and validated with naga when compiled,
//! and linking reflects the program interface:
//! - attribute slots are the `@location`s of the vertex inputs
//! - uniform slots are byte offsets into the struct bound at `@group(0) @binding(0)`

mod reflect;
mod renderer;

pub use reflect::{ProgramLayout, UniformKind, UniformMember};
pub use renderer::{WgpuContext, WgpuRenderer};

use crate::error::Result;
use crate::render::ShaderStage;

/// Compiles and links a WGSL pair on the CPU only, returning the reflected interface.
///
/// Reports the same errors `WgpuContext` would, without needing a device.
pub fn reflect_program(vertex_source: &str, fragment_source: &str) -> Result<ProgramLayout> {
    let vertex = reflect::compile_stage(ShaderStage::Vertex, vertex_source)?;
    let fragment = reflect::compile_stage(ShaderStage::Fragment, fragment_source)?;
    reflect::link(&vertex, &fragment)
}
