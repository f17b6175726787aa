//! Per-call state shared by every bevel stage.

use std::collections::HashMap;

use crate::error::Result;
use crate::math::{angle_between, try_normalize, Vector3};
use crate::mesh::{EdgeId, Mesh, VertexId};

use super::continuity::ContinuityMap;
use super::params::{AffectMode, BevelParams};
use super::patch::InteriorPatch;
use super::profile::ProfileCache;
use super::ring::{walk_fan, CornerRecord, EdgeSide, FanSide};

/// Length tolerance.
pub const EPSILON: f64 = 1e-6;
/// Coarser length tolerance for containment tests.
pub const EPSILON_BIG: f64 = 1e-4;
/// Angles below this count as parallel.
pub const EPSILON_ANG: f64 = 2.0 * std::f64::consts::PI / 180.0;
/// Angles below this are small enough to prefer the face normal.
pub const SMALL_ANG: f64 = 10.0 * std::f64::consts::PI / 180.0;
/// Angle tolerance for the edge-meeting tests.
pub const GOOD_ANGLE: f64 = 1e-4;
/// Maximum change of a point's offsets in one relaxation sweep, in percent.
pub const MAX_ADJUST_PCT: f64 = 10.0;

/// Origin of a face after the bevel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceKind {
    /// Untouched original face.
    Orig,
    /// Fills the interior of a corner ring.
    Vert,
    /// Part of a strip along a beveled edge.
    Edge,
    /// Original face rebuilt around new boundary points.
    Recon,
}

/// A side addressed across corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SideRef {
    pub corner: usize,
    pub side: usize,
}

/// Configuration, lookup tables and scratch storage for one bevel call.
///
/// Built at the start of a call and dropped at its end; nothing in here is
/// shared between calls.
#[derive(Debug)]
pub struct OperationContext {
    pub(crate) params: BevelParams,
    /// Uniform factor applied to every requested offset by offset limiting.
    pub(crate) offset_scale: f64,
    pub(crate) corners: Vec<CornerRecord>,
    pub(crate) corner_index: HashMap<VertexId, usize>,
    pub(crate) beveled_edges: Vec<EdgeId>,
    /// Both ends of every beveled edge.
    pub(crate) edge_ends: HashMap<EdgeId, [SideRef; 2]>,
    pub(crate) degraded: Vec<VertexId>,
    pub(crate) continuity: Option<ContinuityMap>,
    pub(crate) profiles: ProfileCache,
}

impl OperationContext {
    /// Creates an empty context for `params`.
    #[must_use]
    pub fn new(params: BevelParams) -> Self {
        let profiles = ProfileCache::new(params.custom_profile().cloned());
        Self {
            params,
            offset_scale: 1.0,
            corners: Vec::new(),
            corner_index: HashMap::new(),
            beveled_edges: Vec::new(),
            edge_ends: HashMap::new(),
            degraded: Vec::new(),
            continuity: None,
            profiles,
        }
    }

    #[must_use]
    pub fn params(&self) -> &BevelParams {
        &self.params
    }

    /// Every corner, in discovery order.
    #[must_use]
    pub fn corners(&self) -> &[CornerRecord] {
        &self.corners
    }

    /// Corner built for `v`, if `v` is beveled.
    #[must_use]
    pub fn corner(&self, v: VertexId) -> Option<&CornerRecord> {
        self.corner_index.get(&v).map(|&i| &self.corners[i])
    }

    /// Edges that end up beveled.
    #[must_use]
    pub fn beveled_edges(&self) -> &[EdgeId] {
        &self.beveled_edges
    }

    /// Selected vertices left unbeveled because of their topology.
    #[must_use]
    pub fn degraded(&self) -> &[VertexId] {
        &self.degraded
    }

    /// Factor applied to all offsets by offset limiting.
    #[must_use]
    pub fn offset_scale(&self) -> f64 {
        self.offset_scale
    }

    #[must_use]
    pub fn continuity(&self) -> Option<&ContinuityMap> {
        self.continuity.as_ref()
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    /// Finds the corners to bevel from the mesh selection.
    ///
    /// Vertices whose faces do not form a single closed fan are recorded as
    /// degraded and skipped, together with any selected edge touching them.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh references missing elements.
    pub fn discover(&mut self, mesh: &Mesh) -> Result<()> {
        if self.params.offset <= 0.0 {
            return Ok(());
        }
        match self.params.affect {
            AffectMode::Edges => self.discover_edges(mesh),
            AffectMode::Vertices => self.discover_vertices(mesh),
        }
    }

    fn discover_edges(&mut self, mesh: &Mesh) -> Result<()> {
        let mut selected = Vec::new();
        for e in mesh.edge_ids() {
            let edge = mesh.edge(e)?;
            if !edge.flags.selected {
                continue;
            }
            if self.params.use_weights && edge.flags.weight <= 0.0 {
                continue;
            }
            if !edge.is_manifold() {
                tracing::debug!(
                    edge = ?e,
                    faces = edge.faces().len(),
                    "skipping edge without two faces"
                );
                continue;
            }
            selected.push(e);
        }

        let mut fans: HashMap<VertexId, (Vec<FanSide>, Vec<EdgeId>)> = HashMap::new();
        let mut order = Vec::new();
        for &e in &selected {
            let edge = mesh.edge(e)?;
            for v in [edge.v1, edge.v2] {
                if fans.contains_key(&v) || self.degraded.contains(&v) {
                    continue;
                }
                match walk_fan(mesh, v) {
                    Ok(fan) => {
                        fans.insert(v, fan);
                        order.push(v);
                    }
                    Err(reason) => {
                        tracing::debug!(vertex = ?v, %reason, "vertex left unbeveled");
                        self.degraded.push(v);
                    }
                }
            }
        }

        for &e in &selected {
            let edge = mesh.edge(e)?;
            if fans.contains_key(&edge.v1) && fans.contains_key(&edge.v2) {
                self.beveled_edges.push(e);
            } else {
                tracing::debug!(edge = ?e, "edge dropped because an endpoint was left unbeveled");
            }
        }

        for v in order {
            let Some((fan, wires)) = fans.remove(&v) else {
                continue;
            };
            if !fan.iter().any(|s| self.beveled_edges.contains(&s.edge)) {
                continue;
            }
            let corner = self.build_corner(mesh, v, &fan, wires, false)?;
            self.corner_index.insert(v, self.corners.len());
            self.corners.push(corner);
        }

        for &e in &self.beveled_edges {
            let edge = mesh.edge(e)?;
            let mut ends = [SideRef { corner: 0, side: 0 }; 2];
            for (slot, v) in ends.iter_mut().zip([edge.v1, edge.v2]) {
                let corner = self.corner_index[&v];
                let side = self.corners[corner]
                    .side_of_edge(e)
                    .ok_or_else(|| {
                        crate::error::TopologyError::InvalidTopology(
                            "beveled edge missing from its corner".into(),
                        )
                    })?;
                *slot = SideRef { corner, side };
            }
            self.edge_ends.insert(e, ends);
        }
        Ok(())
    }

    fn discover_vertices(&mut self, mesh: &Mesh) -> Result<()> {
        let selected: Vec<VertexId> = mesh
            .vertex_ids()
            .filter(|&v| mesh.vertex(v).is_ok_and(|d| d.selected))
            .collect();
        for v in selected {
            let weight = self.vertex_weight(mesh, v)?;
            if weight <= 0.0 {
                continue;
            }
            match walk_fan(mesh, v) {
                Ok((fan, wires)) => {
                    let mut corner = self.build_corner(mesh, v, &fan, wires, true)?;
                    corner.vertex_offset = self.params.offset * weight;
                    self.corner_index.insert(v, self.corners.len());
                    self.corners.push(corner);
                }
                Err(reason) => {
                    tracing::debug!(vertex = ?v, %reason, "vertex left unbeveled");
                    self.degraded.push(v);
                }
            }
        }
        Ok(())
    }

    fn vertex_weight(&self, mesh: &Mesh, v: VertexId) -> Result<f64> {
        let mut weight = 1.0;
        if self.params.use_weights {
            weight *= mesh.vertex(v)?.weight;
        }
        if let Some(map) = &self.params.vertex_weights {
            weight *= map.get(&v).copied().unwrap_or(1.0);
        }
        Ok(weight)
    }

    fn build_corner(
        &self,
        mesh: &Mesh,
        v: VertexId,
        fan: &[FanSide],
        wire_edges: Vec<EdgeId>,
        vertex_only: bool,
    ) -> Result<CornerRecord> {
        let co = mesh.point(v)?;
        let n = fan.len();
        let mut sides = Vec::with_capacity(n);
        for (i, f) in fan.iter().enumerate() {
            let edge = mesh.edge(f.edge)?;
            let far = mesh.point(f.other)?;
            let length = (far - co).norm();
            let dir = try_normalize(&(far - co)).unwrap_or_else(Vector3::zeros);
            let beveled = !vertex_only && self.beveled_edges.contains(&f.edge);
            let in_plane = match (f.fprev, f.fnext) {
                (Some(fp), Some(fnx)) if !beveled => {
                    let a = mesh.face_normal(fp)?;
                    let b = mesh.face_normal(fnx)?;
                    angle_between(&a, &b) < EPSILON_ANG
                }
                _ => false,
            };
            let weight = if self.params.use_weights && !vertex_only {
                edge.flags.weight
            } else {
                1.0
            };
            sides.push(EdgeSide {
                edge: f.edge,
                other: f.other,
                far,
                dir,
                length,
                fprev: f.fprev,
                fnext: f.fnext,
                next: (i + 1) % n,
                prev: (i + n - 1) % n,
                beveled,
                reversed: edge.v1 != v,
                seam: edge.flags.seam,
                sharp: edge.flags.sharp,
                in_plane,
                weight,
                seg: self.params.segments,
                offset_l_spec: 0.0,
                offset_r_spec: 0.0,
                offset_l: 0.0,
                offset_r: 0.0,
                left_point: None,
                right_point: None,
            });
        }
        if let Some(first) = sides.iter().position(|s| s.beveled) {
            sides.rotate_left(first);
            for (i, s) in sides.iter_mut().enumerate() {
                s.next = (i + 1) % n;
                s.prev = (i + n - 1) % n;
            }
        }
        let beveled_count = sides.iter().filter(|s| s.beveled).count();
        let any_seam = sides.iter().any(|s| s.seam);
        Ok(CornerRecord {
            vertex: v,
            co,
            normal: mesh.vertex_normal(v)?,
            sides,
            points: Vec::new(),
            slot_polylines: Vec::new(),
            patch: InteriorPatch::None,
            wire_edges,
            any_seam,
            seg: self.params.segments,
            beveled_count,
            vertex_only,
            vertex_offset: 0.0,
        })
    }

    /// Side at the far end of a beveled side.
    pub(crate) fn partner(&self, at: SideRef) -> Option<SideRef> {
        let edge = self.corners[at.corner].sides[at.side].edge;
        let ends = self.edge_ends.get(&edge)?;
        ends.iter().copied().find(|r| *r != at)
    }
}
