use crate::math::Point3;

use super::EdgeId;

slotmap::new_key_type! {
    /// Unique identifier for a vertex in the mesh.
    pub struct VertexId;
}

/// Data associated with a mesh vertex.
#[derive(Debug, Clone)]
pub struct VertexData {
    /// The 3D position of the vertex.
    pub point: Point3,
    /// Bevel weight, used when beveling vertices with weights enabled.
    pub weight: f64,
    /// Selection flag.
    pub selected: bool,
    pub(crate) edges: Vec<EdgeId>,
}

impl VertexData {
    /// Creates a new, unselected vertex at the given point.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self {
            point,
            weight: 0.0,
            selected: false,
            edges: Vec::new(),
        }
    }

    /// Marks the vertex as selected.
    #[must_use]
    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Edges incident to this vertex, in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}
