//! Geometry synthesis.
//!
//! Pure CPU code: turns a decoded heightmap into per-layer indexed meshes.
//! Nothing here touches the GPU.
//!
//! World convention: Z is up, the ground lies on `z = 0`, one heightmap pixel
//! covers `cell_size` world units along X and Y.

mod city;
mod heightmap;
mod mesh;

pub use city::{
    building_box, cell_center, surface_quad, synthesize, CityParams, LayerMeshes, BUILDINGS_LAYER,
    SURFACE_LAYER,
};
pub use heightmap::{Heightmap, BYTES_PER_PIXEL};
pub use mesh::{Mesh, MeshPart};
