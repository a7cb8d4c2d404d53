use thiserror::Error;

use crate::render::ShaderStage;

/// Errors surfaced by geometry synthesis and render-resource construction.
///
/// Platform bootstrap (window, adapter, device) reports through `anyhow` instead;
/// this type covers the operations a caller can reasonably recover from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed heightmap dimensions, pixel buffer size, or mesh data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A shader stage failed to compile. `log` carries the backend diagnostic.
    #[error("{stage:?} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    /// Vertex and fragment stages could not be linked into a program.
    #[error("program link failed: {0}")]
    Link(String),

    /// The backend rejected a buffer, binding or program allocation.
    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),

    /// The render context is gone; nothing further may be submitted to it.
    #[error("render context lost")]
    ContextLost,
}

pub type Result<T> = std::result::Result<T, Error>;
