use super::{FaceId, VertexId};

slotmap::new_key_type! {
    /// Unique identifier for an edge in the mesh.
    pub struct EdgeId;
}

/// Per-edge flags that survive when an edge is re-attached to new vertices.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeFlags {
    /// UV seam marker.
    pub seam: bool,
    /// Sharp-shading marker.
    pub sharp: bool,
    /// Bevel weight.
    pub weight: f64,
    /// Selection flag.
    pub selected: bool,
}

/// Data associated with a mesh edge.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// First endpoint.
    pub v1: VertexId,
    /// Second endpoint.
    pub v2: VertexId,
    /// Markers and weight.
    pub flags: EdgeFlags,
    pub(crate) faces: Vec<FaceId>,
}

impl EdgeData {
    pub(crate) fn new(v1: VertexId, v2: VertexId) -> Self {
        Self {
            v1,
            v2,
            flags: EdgeFlags::default(),
            faces: Vec::new(),
        }
    }

    /// Returns the endpoint opposite `v`, or `None` if `v` is not an endpoint.
    #[must_use]
    pub fn other(&self, v: VertexId) -> Option<VertexId> {
        if self.v1 == v {
            Some(self.v2)
        } else if self.v2 == v {
            Some(self.v1)
        } else {
            None
        }
    }

    /// Faces bordering this edge.
    #[must_use]
    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    /// `true` when the edge borders exactly two faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.faces.len() == 2
    }

    /// `true` when no face uses the edge.
    #[must_use]
    pub fn is_wire(&self) -> bool {
        self.faces.is_empty()
    }
}
