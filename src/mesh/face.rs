use crate::math::{Point2, Vector3};

use super::VertexId;

slotmap::new_key_type! {
    /// Unique identifier for a face in the mesh.
    pub struct FaceId;
}

/// Data associated with a polygon face.
///
/// The vertex loop runs counter-clockwise when viewed from the outside.
/// `uvs` and `normals` are per-corner layers parallel to `vertices`; each is
/// either empty or the same length as the loop.
#[derive(Debug, Clone)]
pub struct FaceData {
    /// Ordered vertex loop.
    pub vertices: Vec<VertexId>,
    /// Per-corner UV coordinates.
    pub uvs: Vec<Point2>,
    /// Per-corner custom normals.
    pub normals: Vec<Vector3>,
    /// Material index.
    pub material: u16,
    /// Selection flag.
    pub selected: bool,
}

impl FaceData {
    /// Creates a face over the given vertex loop.
    #[must_use]
    pub fn new(vertices: Vec<VertexId>) -> Self {
        Self {
            vertices,
            uvs: Vec::new(),
            normals: Vec::new(),
            material: 0,
            selected: false,
        }
    }

    /// Sets per-corner UVs.
    #[must_use]
    pub fn with_uvs(mut self, uvs: Vec<Point2>) -> Self {
        self.uvs = uvs;
        self
    }

    /// Sets the material index.
    #[must_use]
    pub fn with_material(mut self, material: u16) -> Self {
        self.material = material;
        self
    }

    /// Marks the face as selected.
    #[must_use]
    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Number of corners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// `true` if the loop is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Corner index of `v` in the loop.
    #[must_use]
    pub fn corner_of(&self, v: VertexId) -> Option<usize> {
        self.vertices.iter().position(|&x| x == v)
    }

    /// Vertex following `v` in the loop.
    #[must_use]
    pub fn next_vertex(&self, v: VertexId) -> Option<VertexId> {
        let i = self.corner_of(v)?;
        Some(self.vertices[(i + 1) % self.vertices.len()])
    }

    /// Vertex preceding `v` in the loop.
    #[must_use]
    pub fn prev_vertex(&self, v: VertexId) -> Option<VertexId> {
        let i = self.corner_of(v)?;
        let n = self.vertices.len();
        Some(self.vertices[(i + n - 1) % n])
    }

    /// `true` if the loop walks directly from `a` to `b`.
    #[must_use]
    pub fn has_directed_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.next_vertex(a) == Some(b)
    }

    /// Directed edges of the loop.
    pub fn directed_edges(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}
