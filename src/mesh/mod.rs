pub mod attribute;
pub mod edge;
pub mod face;
pub mod vertex;

pub use edge::{EdgeData, EdgeFlags, EdgeId};
pub use face::{FaceData, FaceId};
pub use vertex::{VertexData, VertexId};

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TopologyError};
use crate::math::polygon_3d::{bounds_center, newell_normal};
use crate::math::{Point2, Point3, Vector3};
use slotmap::SlotMap;

/// Result of an ID lookup in the mesh arenas.
pub type Lookup<T> = std::result::Result<T, TopologyError>;

/// Elements flagged by the last operation for external selection.
#[derive(Debug, Default, Clone)]
pub struct ElementTags {
    /// Tagged vertices.
    pub vertices: HashSet<VertexId>,
    /// Tagged edges.
    pub edges: HashSet<EdgeId>,
    /// Tagged faces.
    pub faces: HashSet<FaceId>,
}

impl ElementTags {
    /// Removes every tag.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.faces.clear();
    }
}

fn edge_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Polygon mesh arena.
///
/// Vertices, edges and faces live in generational arenas and reference each
/// other by typed IDs. Vertex→edge and edge→face adjacency is maintained on
/// every insertion and removal.
#[derive(Debug, Default)]
pub struct Mesh {
    vertices: SlotMap<VertexId, VertexData>,
    edges: SlotMap<EdgeId, EdgeData>,
    faces: SlotMap<FaceId, FaceData>,
    edge_lookup: HashMap<(VertexId, VertexId), EdgeId>,
    uv_layer: bool,
    tags: ElementTags,
}

impl Mesh {
    /// Creates a new, empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Vertex operations ---

    /// Inserts a vertex and returns its ID.
    pub fn add_vertex(&mut self, data: VertexData) -> VertexId {
        self.vertices.insert(VertexData {
            edges: Vec::new(),
            ..data
        })
    }

    /// Returns a reference to the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn vertex(&self, id: VertexId) -> Lookup<&VertexData> {
        self.vertices
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()))
    }

    /// Returns a mutable reference to the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn vertex_mut(&mut self, id: VertexId) -> Lookup<&mut VertexData> {
        self.vertices
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()))
    }

    /// Position of a vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex is not found.
    pub fn point(&self, id: VertexId) -> Lookup<Point3> {
        Ok(self.vertex(id)?.point)
    }

    /// Iterates over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Removes a vertex that has no incident edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex is missing or still has edges.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<VertexData> {
        if !self.vertex(id)?.edges.is_empty() {
            return Err(
                TopologyError::InvalidTopology("vertex still has incident edges".into()).into(),
            );
        }
        self.tags.vertices.remove(&id);
        self.vertices
            .remove(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()).into())
    }

    // --- Edge operations ---

    /// Returns a reference to the edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn edge(&self, id: EdgeId) -> Lookup<&EdgeData> {
        self.edges
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("edge".into()))
    }

    /// Returns a mutable reference to the edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn edge_mut(&mut self, id: EdgeId) -> Lookup<&mut EdgeData> {
        self.edges
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("edge".into()))
    }

    /// Iterates over all edge IDs.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Looks up the edge joining `a` and `b`.
    #[must_use]
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.edge_lookup.get(&edge_key(a, b)).copied()
    }

    /// Returns the edge joining `a` and `b`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if either vertex is missing or `a == b`.
    pub fn ensure_edge(&mut self, a: VertexId, b: VertexId) -> Result<EdgeId> {
        if a == b {
            return Err(TopologyError::InvalidTopology("edge endpoints coincide".into()).into());
        }
        self.vertex(a)?;
        self.vertex(b)?;
        if let Some(id) = self.find_edge(a, b) {
            return Ok(id);
        }
        let id = self.edges.insert(EdgeData::new(a, b));
        self.edge_lookup.insert(edge_key(a, b), id);
        self.vertex_mut(a)?.edges.push(id);
        self.vertex_mut(b)?.edges.push(id);
        Ok(id)
    }

    /// Removes an edge that no face uses.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge is missing or still bordered by a face.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<EdgeData> {
        let edge = self.edge(id)?;
        if !edge.faces.is_empty() {
            return Err(TopologyError::InvalidTopology("edge still has faces".into()).into());
        }
        let (v1, v2) = (edge.v1, edge.v2);
        self.edge_lookup.remove(&edge_key(v1, v2));
        for v in [v1, v2] {
            self.vertex_mut(v)?.edges.retain(|&e| e != id);
        }
        self.tags.edges.remove(&id);
        self.edges
            .remove(id)
            .ok_or_else(|| TopologyError::EntityNotFound("edge".into()).into())
    }

    // --- Face operations ---

    /// Inserts a face and links it into the edge adjacency.
    ///
    /// Missing edges are created. Per-corner layers are padded to the loop
    /// length when the UV layer is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop has fewer than three distinct vertices,
    /// references a missing vertex, or repeats a directed edge already used
    /// by another face.
    pub fn add_face(&mut self, data: FaceData) -> Result<FaceId> {
        let data = self.validate_face(data, None)?;
        let id = self.faces.insert(data);
        self.link_face(id)?;
        Ok(id)
    }

    /// Replaces the vertex loop of an existing face, keeping its ID and
    /// face-level attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is missing or the new loop is invalid.
    pub fn rebuild_face(
        &mut self,
        id: FaceId,
        vertices: Vec<VertexId>,
        uvs: Vec<Point2>,
    ) -> Result<()> {
        let old = self.face(id)?.clone();
        let candidate = FaceData {
            vertices,
            uvs,
            normals: Vec::new(),
            ..old
        };
        let candidate = self.validate_face(candidate, Some(id))?;
        self.unlink_face(id)?;
        *self.face_mut(id)? = candidate;
        self.link_face(id)
    }

    /// Returns a reference to the face data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn face(&self, id: FaceId) -> Lookup<&FaceData> {
        self.faces
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()))
    }

    /// Returns a mutable reference to the face data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn face_mut(&mut self, id: FaceId) -> Lookup<&mut FaceData> {
        self.faces
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()))
    }

    /// Iterates over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys()
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Vertex positions of a face loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn face_points(&self, id: FaceId) -> Result<Vec<Point3>> {
        self.face(id)?
            .vertices
            .iter()
            .map(|&v| self.point(v).map_err(Into::into))
            .collect()
    }

    /// Outward unit normal of a face; the zero vector for degenerate faces.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn face_normal(&self, id: FaceId) -> Result<Vector3> {
        Ok(newell_normal(&self.face_points(id)?).unwrap_or_else(Vector3::zeros))
    }

    /// Center of the face's axis-aligned bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn face_center_bounds(&self, id: FaceId) -> Result<Point3> {
        Ok(bounds_center(&self.face_points(id)?))
    }

    /// Faces using vertex `v`, gathered through its incident edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex or an incident edge is missing.
    pub fn vertex_faces(&self, v: VertexId) -> Result<Vec<FaceId>> {
        let mut out = Vec::new();
        for &e in &self.vertex(v)?.edges {
            for &f in &self.edge(e)?.faces {
                if !out.contains(&f) {
                    out.push(f);
                }
            }
        }
        Ok(out)
    }

    /// Normalized average of the normals of the faces around `v`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex or an incident element is missing.
    pub fn vertex_normal(&self, v: VertexId) -> Result<Vector3> {
        let mut sum = Vector3::zeros();
        for f in self.vertex_faces(v)? {
            sum += self.face_normal(f)?;
        }
        Ok(crate::math::try_normalize(&sum).unwrap_or(sum))
    }

    // --- Layers and tags ---

    /// Enables the per-corner UV layer, zero-filling existing faces.
    pub fn enable_uv_layer(&mut self) {
        self.uv_layer = true;
        for face in self.faces.values_mut() {
            if face.uvs.len() != face.vertices.len() {
                face.uvs = vec![Point2::origin(); face.vertices.len()];
            }
        }
    }

    /// `true` when faces carry per-corner UVs.
    #[must_use]
    pub fn has_uv_layer(&self) -> bool {
        self.uv_layer
    }

    /// Elements tagged by the last operation.
    #[must_use]
    pub fn tags(&self) -> &ElementTags {
        &self.tags
    }

    /// Mutable access to element tags.
    pub fn tags_mut(&mut self) -> &mut ElementTags {
        &mut self.tags
    }

    // --- Internal helpers ---

    fn validate_face(&self, mut data: FaceData, replacing: Option<FaceId>) -> Result<FaceData> {
        let n = data.vertices.len();
        if n < 3 {
            return Err(
                TopologyError::InvalidTopology("face needs at least 3 vertices".into()).into(),
            );
        }
        let distinct: HashSet<VertexId> = data.vertices.iter().copied().collect();
        if distinct.len() != n {
            return Err(TopologyError::InvalidTopology("face repeats a vertex".into()).into());
        }
        for &v in &data.vertices {
            self.vertex(v)?;
        }
        for (a, b) in data.directed_edges() {
            let Some(e) = self.find_edge(a, b) else {
                continue;
            };
            for &f in &self.edge(e)?.faces {
                if Some(f) != replacing && self.face(f)?.has_directed_edge(a, b) {
                    return Err(TopologyError::InvalidTopology(
                        "directed edge already used by another face".into(),
                    )
                    .into());
                }
            }
        }
        if self.uv_layer {
            if data.uvs.len() != n {
                data.uvs = vec![Point2::origin(); n];
            }
        } else {
            data.uvs.clear();
        }
        if !data.normals.is_empty() && data.normals.len() != n {
            data.normals.clear();
        }
        Ok(data)
    }

    fn link_face(&mut self, id: FaceId) -> Result<()> {
        let edges: Vec<(VertexId, VertexId)> = self.face(id)?.directed_edges().collect();
        for (a, b) in edges {
            let e = self.ensure_edge(a, b)?;
            let faces = &mut self.edge_mut(e)?.faces;
            if !faces.contains(&id) {
                faces.push(id);
            }
        }
        Ok(())
    }

    fn unlink_face(&mut self, id: FaceId) -> Result<()> {
        let edges: Vec<(VertexId, VertexId)> = self.face(id)?.directed_edges().collect();
        for (a, b) in edges {
            if let Some(e) = self.find_edge(a, b) {
                self.edge_mut(e)?.faces.retain(|&f| f != id);
            }
        }
        Ok(())
    }
}
