//! WGSL sources compiled into the binary.

pub const VERTEX_SHADER: &str = include_str!("../shaders/city.vert.wgsl");
pub const FRAGMENT_SHADER: &str = include_str!("../shaders/city.frag.wgsl");
