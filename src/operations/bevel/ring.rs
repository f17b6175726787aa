//! Per-vertex ring data: edge sides, boundary points and the corner record.

use std::fmt;

use crate::math::{Point3, Vector3};
use crate::mesh::{EdgeId, FaceId, Mesh, VertexId};

use super::patch::InteriorPatch;
use super::profile::ProfileCurve;

/// One mesh edge as seen from one of its endpoints.
///
/// Sides of a corner form a cycle through `next`/`prev` that runs
/// counter-clockwise around the outward vertex normal. `fnext` is the face
/// whose loop walks from the corner along this edge; it lies between this
/// side and `next`. The left offset is measured in `fnext`, the right one in
/// `fprev`.
///
/// On a mesh border the fan is open: exactly one side has no `fnext` and the
/// side after it has no `fprev`. Beveled sides always have both faces.
#[derive(Debug, Clone)]
pub struct EdgeSide {
    pub edge: EdgeId,
    /// Far endpoint of the edge.
    pub other: VertexId,
    pub far: Point3,
    /// Unit direction from the corner toward `far`.
    pub dir: Vector3,
    pub length: f64,
    pub fprev: Option<FaceId>,
    pub fnext: Option<FaceId>,
    pub next: usize,
    pub prev: usize,
    pub beveled: bool,
    /// The edge is stored pointing into the corner.
    pub reversed: bool,
    pub seam: bool,
    pub sharp: bool,
    /// Unbeveled edge whose two faces are coplanar.
    pub in_plane: bool,
    /// Bevel weight factor (1 unless weights are in use).
    pub weight: f64,
    pub seg: usize,
    pub offset_l_spec: f64,
    pub offset_r_spec: f64,
    /// Offsets actually realised by the boundary points.
    pub offset_l: f64,
    pub offset_r: f64,
    /// Boundary point on the `fnext` side.
    pub left_point: Option<usize>,
    /// Boundary point on the `fprev` side.
    pub right_point: Option<usize>,
}

/// What lies between a boundary point and the next one on the ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotKind {
    /// The cross-section profile of a beveled edge side.
    Beveled { side: usize },
    /// A run inside `sides[side].fnext`, or across the border gap when that
    /// face is missing.
    Face { side: usize },
    /// An arc miter inside `sides[side].fnext` bulging toward `middle`.
    Miter { side: usize, middle: Point3 },
}

impl SlotKind {
    /// Side the slot is attached to.
    #[must_use]
    pub fn side(&self) -> usize {
        match *self {
            Self::Beveled { side } | Self::Face { side } | Self::Miter { side, .. } => side,
        }
    }
}

/// A new vertex on the ring around a corner.
#[derive(Debug, Clone)]
pub struct BoundaryPoint {
    pub co: Point3,
    /// First side whose offset boundary the point lies on.
    pub efirst: usize,
    /// Last side whose offset boundary the point lies on.
    pub elast: usize,
    /// Unbeveled side the point slides along, if any.
    pub eon: Option<usize>,
    /// Slot from this point to the next one.
    pub slot: SlotKind,
    /// Curve for curved slots, set once the ring is final.
    pub profile: Option<ProfileCurve>,
    /// Unmarked slots from this point to the next seam-marked beveled slot,
    /// when this point ends a seam-marked one.
    pub seam_len: usize,
    /// Same as `seam_len` for sharp-marked slots.
    pub sharp_len: usize,
}

impl BoundaryPoint {
    pub(crate) fn new(co: Point3, efirst: usize, elast: usize, slot: SlotKind) -> Self {
        Self {
            co,
            efirst,
            elast,
            eon: None,
            slot,
            profile: None,
            seam_len: 0,
            sharp_len: 0,
        }
    }
}

/// Everything the bevel knows about one original vertex.
#[derive(Debug, Clone)]
pub struct CornerRecord {
    pub vertex: VertexId,
    pub co: Point3,
    /// Outward vertex normal.
    pub normal: Vector3,
    pub sides: Vec<EdgeSide>,
    pub points: Vec<BoundaryPoint>,
    /// `seg + 1` positions per slot, in ring order.
    pub slot_polylines: Vec<Vec<Point3>>,
    pub patch: InteriorPatch,
    /// Faceless edges at the vertex, reattached after the bevel.
    pub wire_edges: Vec<EdgeId>,
    pub any_seam: bool,
    pub seg: usize,
    pub beveled_count: usize,
    pub vertex_only: bool,
    /// Slide distance for vertex-only bevels.
    pub vertex_offset: f64,
}

impl CornerRecord {
    /// Number of boundary points.
    #[must_use]
    pub fn ring_len(&self) -> usize {
        self.points.len()
    }

    /// Index of the side for `edge`.
    #[must_use]
    pub fn side_of_edge(&self, edge: EdgeId) -> Option<usize> {
        self.sides.iter().position(|s| s.edge == edge)
    }

    /// Ring index following `i`.
    #[must_use]
    pub fn next_point(&self, i: usize) -> usize {
        (i + 1) % self.points.len()
    }

    /// Ring index preceding `i`.
    #[must_use]
    pub fn prev_point(&self, i: usize) -> usize {
        (i + self.points.len() - 1) % self.points.len()
    }

    /// Sides strictly after `from` up to and including `to`, walking `next`.
    pub(crate) fn sides_between(&self, from: usize, to: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut s = self.sides[from].next;
        loop {
            out.push(s);
            if s == to || out.len() > self.sides.len() {
                break;
            }
            s = self.sides[s].next;
        }
        out
    }

    /// Faces the point at ring index `i` lies on or between.
    #[must_use]
    pub fn point_faces(&self, i: usize) -> Vec<FaceId> {
        let bp = &self.points[i];
        if bp.efirst == bp.elast {
            let s = &self.sides[bp.efirst];
            return s.fprev.into_iter().chain(s.fnext).collect();
        }
        let mut faces = Vec::new();
        let mut s = bp.efirst;
        for _ in 0..self.sides.len() {
            faces.extend(self.sides[s].fnext);
            s = self.sides[s].next;
            if s == bp.elast {
                break;
            }
        }
        faces
    }

    /// Whether the fan around the corner is open at a mesh border.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.sides.iter().any(|s| s.fnext.is_none())
    }

    /// Faces a slot borders: both faces of a beveled side, or the face the
    /// slot runs inside.
    #[must_use]
    pub fn slot_faces(&self, i: usize) -> Vec<FaceId> {
        match self.points[i].slot {
            SlotKind::Beveled { side } => {
                let s = &self.sides[side];
                s.fprev.into_iter().chain(s.fnext).collect()
            }
            SlotKind::Face { side } | SlotKind::Miter { side, .. } => {
                self.sides[side].fnext.into_iter().collect()
            }
        }
    }

    /// Mean of the boundary point positions.
    #[must_use]
    pub fn boundary_centroid(&self) -> Point3 {
        let pts: Vec<Point3> = self.points.iter().map(|bp| bp.co).collect();
        crate::math::polygon_3d::centroid(&pts)
    }
}

/// Why a vertex was left unbeveled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    TooFewEdges,
    NonManifoldEdge,
    InconsistentWinding,
    BrokenFan,
    MultipleFans,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::TooFewEdges => "too few face edges to form a fan",
            Self::NonManifoldEdge => "incident edge borders more than two faces",
            Self::InconsistentWinding => "adjacent faces disagree on orientation",
            Self::BrokenFan => "faces around the vertex cannot be walked in order",
            Self::MultipleFans => "vertex joins more than one face fan",
        };
        f.write_str(text)
    }
}

/// One step of the rotational walk around a vertex.
#[derive(Debug, Clone, Copy)]
pub struct FanSide {
    pub edge: EdgeId,
    pub other: VertexId,
    pub fprev: Option<FaceId>,
    pub fnext: Option<FaceId>,
}

/// Walks the faces around `v` in rotational order.
///
/// Returns the face edges in counter-clockwise order around the outward
/// normal together with the vertex's wire edges. A vertex on a mesh border
/// gives an open fan that starts at the border edge without `fprev` and ends
/// at the one without `fnext`.
///
/// # Errors
///
/// Returns the [`DegradeReason`] when an incident edge borders three or more
/// faces, or when the faces around `v` do not form a single consistently
/// oriented fan (closed with at least three edges, or open with at least
/// two).
pub fn walk_fan(
    mesh: &Mesh,
    v: VertexId,
) -> std::result::Result<(Vec<FanSide>, Vec<EdgeId>), DegradeReason> {
    let vertex = mesh.vertex(v).map_err(|_| DegradeReason::BrokenFan)?;
    let mut face_edges = Vec::new();
    let mut wire_edges = Vec::new();
    for &e in vertex.edges() {
        let edge = mesh.edge(e).map_err(|_| DegradeReason::BrokenFan)?;
        match edge.faces().len() {
            0 => wire_edges.push(e),
            1 | 2 => face_edges.push(e),
            _ => return Err(DegradeReason::NonManifoldEdge),
        }
    }

    let side_of = |e: EdgeId| -> std::result::Result<FanSide, DegradeReason> {
        let edge = mesh.edge(e).map_err(|_| DegradeReason::BrokenFan)?;
        let other = edge.other(v).ok_or(DegradeReason::BrokenFan)?;
        let mut fprev = None;
        let mut fnext = None;
        for &f in edge.faces() {
            let face = mesh.face(f).map_err(|_| DegradeReason::BrokenFan)?;
            if face.has_directed_edge(v, other) {
                fnext = Some(f);
            } else if face.has_directed_edge(other, v) {
                fprev = Some(f);
            }
        }
        let found = usize::from(fprev.is_some()) + usize::from(fnext.is_some());
        if found != edge.faces().len() || (fprev.is_some() && fprev == fnext) {
            return Err(DegradeReason::InconsistentWinding);
        }
        Ok(FanSide {
            edge: e,
            other,
            fprev,
            fnext,
        })
    };
    let fan = face_edges
        .iter()
        .map(|&e| side_of(e))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut starts = fan.iter().filter(|s| s.fprev.is_none());
    let first = starts.next().copied();
    if starts.next().is_some() {
        return Err(DegradeReason::MultipleFans);
    }
    let closed = first.is_none();
    if fan.len() < if closed { 3 } else { 2 } {
        return Err(DegradeReason::TooFewEdges);
    }
    let Some(start) = first.or_else(|| fan.first().copied()) else {
        return Err(DegradeReason::TooFewEdges);
    };

    let mut sides = vec![start];
    loop {
        let Some(cur) = sides.last().copied() else {
            return Err(DegradeReason::BrokenFan);
        };
        let Some(f) = cur.fnext else {
            break;
        };
        let face = mesh.face(f).map_err(|_| DegradeReason::BrokenFan)?;
        let prev = face.prev_vertex(v).ok_or(DegradeReason::BrokenFan)?;
        let next_edge = mesh.find_edge(prev, v).ok_or(DegradeReason::BrokenFan)?;
        if next_edge == start.edge {
            if closed {
                break;
            }
            return Err(DegradeReason::InconsistentWinding);
        }
        if sides.len() >= fan.len() || sides.iter().any(|s| s.edge == next_edge) {
            return Err(DegradeReason::BrokenFan);
        }
        let Some(next) = fan.iter().find(|s| s.edge == next_edge).copied() else {
            return Err(DegradeReason::BrokenFan);
        };
        if next.fprev != cur.fnext {
            return Err(DegradeReason::InconsistentWinding);
        }
        sides.push(next);
    }
    if sides.len() != fan.len() {
        return Err(DegradeReason::MultipleFans);
    }
    Ok((sides, wire_edges))
}
