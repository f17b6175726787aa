use crate::error::Result;
use crate::mesh::Mesh;

/// Checks that a mesh is a consistently oriented two-manifold.
///
/// Every edge that borders a face must border exactly two faces, and those
/// two faces must traverse it in opposite directions. Wire edges are ignored.
/// With [`allow_boundary`](Self::allow_boundary), edges bordering a single
/// face are accepted as well.
#[derive(Debug, Default)]
pub struct IsManifold {
    allow_boundary: bool,
}

impl IsManifold {
    /// Creates a new `IsManifold` query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts open meshes whose border edges have one face.
    #[must_use]
    pub fn allow_boundary(mut self) -> Self {
        self.allow_boundary = true;
        self
    }

    /// Executes the validation, returning `true` if the mesh is manifold.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh references missing elements.
    pub fn execute(&self, mesh: &Mesh) -> Result<bool> {
        for e in mesh.edge_ids() {
            let edge = mesh.edge(e)?;
            match edge.faces() {
                [] => {}
                [_] if self.allow_boundary => {}
                [f1, f2] => {
                    let a = mesh.face(*f1)?;
                    let b = mesh.face(*f2)?;
                    let forward_a = a.has_directed_edge(edge.v1, edge.v2);
                    let forward_b = b.has_directed_edge(edge.v1, edge.v2);
                    if forward_a == forward_b {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}
