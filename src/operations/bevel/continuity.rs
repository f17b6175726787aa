//! Components of faces whose UVs join without a break.

use std::collections::HashMap;

use crate::error::Result;
use crate::mesh::{FaceId, Mesh, VertexId};

/// Two UVs closer than this are the same.
const UV_TOLERANCE: f64 = 1e-6;

/// Groups faces into components connected across edges where both
/// corners' UVs agree and no seam is marked.
///
/// Component ids are assigned in face iteration order, so the map is
/// deterministic for a given mesh.
#[derive(Debug, Clone, Default)]
pub struct ContinuityMap {
    components: HashMap<FaceId, usize>,
    count: usize,
}

impl ContinuityMap {
    /// Builds the map for every face of `mesh`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh references missing elements.
    pub fn build(mesh: &Mesh) -> Result<Self> {
        let mut components = HashMap::new();
        let mut count = 0;
        for start in mesh.face_ids() {
            if components.contains_key(&start) {
                continue;
            }
            flood(mesh, start, count, &mut components)?;
            count += 1;
        }
        tracing::debug!(faces = components.len(), components = count, "continuity map built");
        Ok(Self { components, count })
    }

    /// Component of `face`, if the face was present when the map was built.
    #[must_use]
    pub fn component(&self, face: FaceId) -> Option<usize> {
        self.components.get(&face).copied()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Assigns `id` to every face reachable from `start`.
fn flood(
    mesh: &Mesh,
    start: FaceId,
    id: usize,
    visited: &mut HashMap<FaceId, usize>,
) -> Result<()> {
    visited.insert(start, id);
    let mut stack = vec![start];
    while let Some(f) = stack.pop() {
        let edges: Vec<(VertexId, VertexId)> = mesh.face(f)?.directed_edges().collect();
        for (a, b) in edges {
            let Some(e) = mesh.find_edge(a, b) else {
                continue;
            };
            let edge = mesh.edge(e)?;
            if edge.flags.seam {
                continue;
            }
            for &g in edge.faces() {
                if g == f || visited.contains_key(&g) {
                    continue;
                }
                if uv_continuous(mesh, f, g, a, b)? {
                    visited.insert(g, id);
                    stack.push(g);
                }
            }
        }
    }
    Ok(())
}

fn uv_continuous(mesh: &Mesh, f: FaceId, g: FaceId, a: VertexId, b: VertexId) -> Result<bool> {
    let (fd, gd) = (mesh.face(f)?, mesh.face(g)?);
    for v in [a, b] {
        let uf = fd.corner_of(v).and_then(|i| fd.uvs.get(i));
        let ug = gd.corner_of(v).and_then(|i| gd.uvs.get(i));
        match (uf, ug) {
            (Some(p), Some(q)) if (p - q).norm() <= UV_TOLERANCE => {}
            (None, None) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}
