use std::collections::BTreeMap;

use crate::coords::ColorRgba;
use crate::error::Result;

use super::heightmap::Heightmap;
use super::mesh::{Mesh, MeshPart};

/// Layer name of the ground quad.
pub const SURFACE_LAYER: &str = "surface";
/// Layer name of the extruded building boxes.
pub const BUILDINGS_LAYER: &str = "buildings";

/// Synthesized geometry keyed by layer name.
pub type LayerMeshes = BTreeMap<String, Mesh>;

/// City synthesis parameters (world units).
#[derive(Debug, Clone, PartialEq)]
pub struct CityParams {
    /// World units covered by one heightmap pixel.
    pub cell_size: f32,
    /// Height of a building whose red channel is 255.
    pub max_height: f32,
    /// Footprint edge length of each building.
    pub building_size: f32,
    pub surface_color: ColorRgba,
    pub building_color: ColorRgba,
    /// Emit flat per-face normals for buildings (24 vertices per box instead of 8).
    pub with_normals: bool,
}

impl Default for CityParams {
    fn default() -> Self {
        Self {
            cell_size: 100.0,
            max_height: 500.0,
            building_size: 75.0,
            surface_color: ColorRgba::new(238.0 / 255.0, 238.0 / 255.0, 238.0 / 255.0, 1.0),
            building_color: ColorRgba::new(0.5, 0.6, 0.9, 1.0),
            with_normals: false,
        }
    }
}

// ── box topology ──────────────────────────────────────────────────────────
//
// Corners 0..4 are the bottom ring, 4..8 the top ring, both counter-clockwise
// seen from +Z. Every face lists its corners counter-clockwise seen from outside.

const BOX_FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1], // bottom
    [4, 5, 6, 7], // top
    [0, 1, 5, 4], // -Y
    [1, 2, 6, 5], // +X
    [2, 3, 7, 6], // +Y
    [3, 0, 4, 7], // -X
];

const FACE_NORMALS: [[f32; 3]; 6] = [
    [0.0, 0.0, -1.0],
    [0.0, 0.0, 1.0],
    [0.0, -1.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [-1.0, 0.0, 0.0],
];

const QUAD_TRIANGLES: [usize; 6] = [0, 1, 2, 0, 2, 3];

/// Builds one axis-aligned building box standing on `z = 0`.
///
/// Without normals the 8 corners are shared by all faces (36 indices). Flat shading
/// needs a distinct vertex per face corner, so `with_normals` emits 24 vertices.
pub fn building_box(center: [f32; 2], size: f32, height: f32, with_normals: bool) -> MeshPart {
    let half = size / 2.0;
    let [cx, cy] = center;

    let ring = [
        [cx - half, cy - half],
        [cx + half, cy - half],
        [cx + half, cy + half],
        [cx - half, cy + half],
    ];
    let corners: Vec<[f32; 3]> = [0.0, height]
        .iter()
        .flat_map(|&z| ring.iter().map(move |&[x, y]| [x, y, z]))
        .collect();

    if !with_normals {
        let indices = BOX_FACES
            .iter()
            .flat_map(|face| QUAD_TRIANGLES.iter().map(move |&k| face[k] as u32))
            .collect();
        return MeshPart {
            vertices: corners,
            indices,
            normals: None,
        };
    }

    let mut part = MeshPart {
        vertices: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
        normals: Some(Vec::with_capacity(24)),
    };
    for (face, normal) in BOX_FACES.iter().zip(FACE_NORMALS) {
        let base = part.vertices.len() as u32;
        part.vertices.extend(face.iter().map(|&c| corners[c]));
        if let Some(normals) = part.normals.as_mut() {
            normals.extend([normal; 4]);
        }
        part.indices
            .extend(QUAD_TRIANGLES.iter().map(|&k| base + k as u32));
    }
    part
}

/// Ground quad spanning the whole raster at `z = 0`.
pub fn surface_quad(width: u32, height: u32, cell_size: f32, color: ColorRgba) -> Mesh {
    let hx = width as f32 * cell_size / 2.0;
    let hy = height as f32 * cell_size / 2.0;

    Mesh {
        vertices: vec![[-hx, -hy, 0.0], [hx, -hy, 0.0], [hx, hy, 0.0], [-hx, hy, 0.0]],
        indices: vec![0, 1, 2, 0, 2, 3],
        normals: None,
        color,
    }
}

/// World-space center of cell `(x, y)`.
#[inline]
pub fn cell_center(x: u32, y: u32, width: u32, height: u32, cell_size: f32) -> [f32; 2] {
    [
        (x as f32 - width as f32 / 2.0) * cell_size,
        (y as f32 - height as f32 / 2.0) * cell_size,
    ]
}

/// Turns a decoded RGBA heightmap into the `surface` and `buildings` meshes.
///
/// Every pixel yields one box, including pixels with red = 0, which produce
/// zero-height boxes rather than being culled.
pub fn synthesize(pixels: &[u8], width: u32, height: u32, params: &CityParams) -> Result<LayerMeshes> {
    let heightmap = Heightmap::from_rgba(width, height, pixels)?;

    let mut buildings = Mesh::new(params.building_color, params.with_normals);
    let boxes = width as usize * height as usize;
    let per_box = if params.with_normals { 24 } else { 8 };
    buildings.vertices.reserve(boxes * per_box);
    buildings.indices.reserve(boxes * 36);

    for (x, y, red) in heightmap.cells() {
        let h = red as f32 / 255.0 * params.max_height;
        let center = cell_center(x, y, width, height, params.cell_size);
        buildings.append(&building_box(center, params.building_size, h, params.with_normals))?;
    }

    log::debug!(
        "synthesized {}x{} city: {} building vertices, {} indices",
        width,
        height,
        buildings.vertex_count(),
        buildings.index_count()
    );

    let mut layers = LayerMeshes::new();
    layers.insert(
        SURFACE_LAYER.to_string(),
        surface_quad(width, height, params.cell_size, params.surface_color),
    );
    layers.insert(BUILDINGS_LAYER.to_string(), buildings);
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn rgba(reds: &[u8]) -> Vec<u8> {
        reds.iter().flat_map(|&r| [r, 0, 0, 255]).collect()
    }

    fn building_heights(mesh: &Mesh, per_box: usize) -> Vec<f32> {
        mesh.vertices
            .chunks(per_box)
            .map(|b| b.iter().map(|v| v[2]).fold(0.0, f32::max))
            .collect()
    }

    #[test]
    fn zero_red_gives_flat_buildings_and_fixed_surface() {
        let (w, h) = (3, 2);
        let layers = synthesize(&rgba(&[0; 6]), w, h, &CityParams::default()).unwrap();

        let buildings = &layers[BUILDINGS_LAYER];
        assert_eq!(buildings.vertex_count(), 6 * 8);
        assert!(buildings.vertices.iter().all(|v| v[2] == 0.0));

        let surface = &layers[SURFACE_LAYER];
        let xs: Vec<f32> = surface.vertices.iter().map(|v| v[0]).collect();
        let ys: Vec<f32> = surface.vertices.iter().map(|v| v[1]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -150.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 150.0);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -100.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 100.0);
        assert_eq!(surface.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn surface_ignores_pixel_content() {
        let a = synthesize(&rgba(&[0, 0, 0, 0]), 2, 2, &CityParams::default()).unwrap();
        let b = synthesize(&rgba(&[9, 200, 255, 17]), 2, 2, &CityParams::default()).unwrap();
        assert_eq!(a[SURFACE_LAYER], b[SURFACE_LAYER]);
    }

    #[test]
    fn every_index_is_in_range() {
        let reds: Vec<u8> = (0..20u8).map(|i| i.wrapping_mul(37)).collect();
        for with_normals in [false, true] {
            let params = CityParams { with_normals, ..CityParams::default() };
            let layers = synthesize(&rgba(&reds), 5, 4, &params).unwrap();
            for mesh in layers.values() {
                assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
                assert!(mesh.validate().is_ok());
            }
        }
    }

    #[test]
    fn rebased_boxes_do_not_share_vertices() {
        let mut mesh = Mesh::new(ColorRgba::new(1.0, 1.0, 1.0, 1.0), false);
        mesh.append(&building_box([0.0, 0.0], 75.0, 10.0, false)).unwrap();
        mesh.append(&building_box([100.0, 0.0], 75.0, 20.0, false)).unwrap();

        let (first, second) = mesh.indices.split_at(36);
        assert!(first.iter().all(|&i| i < 8));
        assert!(second.iter().all(|&i| (8..16).contains(&i)));
    }

    #[test]
    fn two_by_one_heightmap_end_to_end() {
        let params = CityParams::default();
        let layers = synthesize(&rgba(&[255, 0]), 2, 1, &params).unwrap();
        let buildings = &layers[BUILDINGS_LAYER];

        assert_eq!(buildings.vertex_count(), 16);
        assert_eq!(buildings.index_count(), 72);
        assert_eq!(building_heights(buildings, 8), vec![500.0, 0.0]);

        // Cell centers: ((x - 1) * 100, (0 - 0.5) * 100).
        let center = |b: &[[f32; 3]]| {
            let n = b.len() as f32;
            let sx: f32 = b.iter().map(|v| v[0]).sum();
            let sy: f32 = b.iter().map(|v| v[1]).sum();
            (sx / n, sy / n)
        };
        assert_eq!(center(&buildings.vertices[..8]), (-100.0, -50.0));
        assert_eq!(center(&buildings.vertices[8..]), (0.0, -50.0));

        // 75-unit footprint.
        let xs: Vec<f32> = buildings.vertices[..8].iter().map(|v| v[0]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -137.5);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), -62.5);
    }

    #[test]
    fn flat_normals_are_per_face() {
        let part = building_box([0.0, 0.0], 2.0, 4.0, true);
        let normals = part.normals.as_ref().unwrap();

        assert_eq!(part.vertices.len(), 24);
        assert_eq!(normals.len(), 24);
        assert_eq!(part.indices.len(), 36);

        // Top face: four vertices at full height, all facing +Z.
        assert!(part.vertices[4..8].iter().all(|v| v[2] == 4.0));
        assert!(normals[4..8].iter().all(|n| *n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn faces_wind_outward() {
        let part = building_box([0.0, 0.0], 2.0, 2.0, false);
        let v = |i: u32| glam::Vec3::from(part.vertices[i as usize]);

        for (tri, expected) in part.indices.chunks(3).step_by(2).zip(FACE_NORMALS) {
            let n = (v(tri[1]) - v(tri[0])).cross(v(tri[2]) - v(tri[0])).normalize();
            assert!(n.abs_diff_eq(glam::Vec3::from(expected), 1e-6), "{n:?} vs {expected:?}");
        }
    }

    #[test]
    fn zero_height_box_is_still_emitted() {
        let layers = synthesize(&rgba(&[0]), 1, 1, &CityParams::default()).unwrap();
        let buildings = &layers[BUILDINGS_LAYER];
        assert_eq!(buildings.vertex_count(), 8);
        assert_eq!(buildings.index_count(), 36);
    }

    #[test]
    fn buildings_have_no_normals_by_default() {
        let layers = synthesize(&rgba(&[128]), 1, 1, &CityParams::default()).unwrap();
        assert!(!layers[BUILDINGS_LAYER].has_normals());
    }

    #[test]
    fn invalid_input_is_rejected() {
        let params = CityParams::default();
        assert!(matches!(synthesize(&[], 0, 1, &params), Err(Error::InvalidInput(_))));
        assert!(matches!(
            synthesize(&rgba(&[1, 2, 3]), 2, 2, &params),
            Err(Error::InvalidInput(_))
        ));
    }
}
