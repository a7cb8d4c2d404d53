use crate::coords::ColorRgba;
use crate::error::{Error, Result};

/// Indexed triangle mesh with a flat color.
///
/// Invariants (checked by [`Mesh::validate`]):
/// - every index addresses an entry of `vertices`
/// - `indices.len()` is a multiple of 3 (triangle list)
/// - when present, `normals` has exactly one entry per vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub color: ColorRgba,
}

/// Locally indexed geometry fragment (indices start at 0) waiting to be appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPart {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f32; 3]>>,
}

impl Mesh {
    /// Creates an empty mesh. `with_normals` decides whether the normal stream exists at all.
    pub fn new(color: ColorRgba, with_normals: bool) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            normals: with_normals.then(Vec::new),
            color,
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Appends a locally indexed part, re-basing its indices onto the current vertex count.
    ///
    /// The offset is captured before any vertex of `part` is pushed. Fails, leaving the
    /// mesh unchanged, when the combined vertex count no longer fits a `u32` index.
    pub fn append(&mut self, part: &MeshPart) -> Result<()> {
        let base = index_base(self.vertices.len(), part.vertices.len())?;

        // Out-of-range part indices saturate and are caught by `validate`.
        self.indices
            .extend(part.indices.iter().map(|i| i.saturating_add(base)));
        self.vertices.extend_from_slice(&part.vertices);

        if let Some(normals) = self.normals.as_mut() {
            match part.normals.as_ref() {
                Some(n) => normals.extend_from_slice(n),
                // Keep the stream aligned with the vertex stream.
                None => normals.extend(std::iter::repeat_n([0.0; 3], part.vertices.len())),
            }
        }
        Ok(())
    }

    /// Checks the structural invariants of the mesh.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(Error::InvalidInput(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }

        let count = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(Error::InvalidInput(format!(
                "index {bad} out of range for {count} vertices"
            )));
        }

        if let Some(normals) = &self.normals {
            if normals.len() != count {
                return Err(Error::InvalidInput(format!(
                    "{} normals for {count} vertices",
                    normals.len()
                )));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    #[inline]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn normal_bytes(&self) -> Option<&[u8]> {
        self.normals.as_deref().map(bytemuck::cast_slice)
    }
}

/// Index offset for `added` vertices appended after `current` ones.
fn index_base(current: usize, added: usize) -> Result<u32> {
    let fits = current
        .checked_add(added)
        .is_some_and(|total| u32::try_from(total).is_ok());
    match u32::try_from(current) {
        Ok(base) if fits => Ok(base),
        _ => Err(Error::InvalidInput(format!(
            "{current} + {added} vertices exceed the u32 index range"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshPart {
        MeshPart {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            indices: vec![0, 1, 2],
            normals: None,
        }
    }

    #[test]
    fn append_rebases_second_part() {
        let mut mesh = Mesh::new(ColorRgba::new(1.0, 1.0, 1.0, 1.0), false);
        mesh.append(&triangle()).unwrap();
        mesh.append(&triangle()).unwrap();

        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.vertex_count(), 6);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn index_base_rejects_overflowing_vertex_counts() {
        let max = u32::MAX as usize;
        assert_eq!(index_base(10, 5).unwrap(), 10);
        assert_eq!(index_base(max - 1, 1).unwrap(), u32::MAX - 1);
        assert!(matches!(index_base(max, 1), Err(Error::InvalidInput(_))));
        assert!(matches!(index_base(max - 1, 2), Err(Error::InvalidInput(_))));
        assert!(matches!(index_base(usize::MAX, 1), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn append_pads_missing_normals() {
        let mut mesh = Mesh::new(ColorRgba::new(1.0, 1.0, 1.0, 1.0), true);
        mesh.append(&triangle()).unwrap();
        assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(3));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let mesh = Mesh {
            vertices: vec![[0.0; 3]; 3],
            indices: vec![0, 1, 3],
            ..Mesh::default()
        };
        assert!(matches!(mesh.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn validate_rejects_partial_triangle() {
        let mesh = Mesh {
            vertices: vec![[0.0; 3]; 3],
            indices: vec![0, 1],
            ..Mesh::default()
        };
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn validate_rejects_normal_count_mismatch() {
        let mesh = Mesh {
            vertices: vec![[0.0; 3]; 3],
            indices: vec![0, 1, 2],
            normals: Some(vec![[0.0, 0.0, 1.0]]),
            ..Mesh::default()
        };
        assert!(mesh.validate().is_err());
    }
}
