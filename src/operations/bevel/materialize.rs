//! Staging the bevel result and committing it to the mesh.
//!
//! Every new position, face loop, attribute and edge mark is computed
//! against the untouched mesh first. The staged result is validated as a
//! whole; only then is the mesh mutated.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::error::{OperationError, Result, TopologyError};
use crate::math::{try_normalize, Point2, Point3, Vector3};
use crate::mesh::{EdgeFlags, EdgeId, FaceData, FaceId, Mesh, VertexData, VertexId};

use super::context::{FaceKind, OperationContext, SideRef};
use super::patch::InteriorPatch;
use super::rep_face::choose_rep_face;
use super::ring::{CornerRecord, SlotKind};

/// A vertex of the result: kept from the mesh or created by the bevel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertRef {
    Original(VertexId),
    /// Index into [`BevelPlan::new_points`].
    New(usize),
}

/// A face to be created.
#[derive(Debug, Clone)]
pub struct StagedFace {
    pub vertices: Vec<VertRef>,
    /// Per-corner UVs; empty without a UV layer.
    pub uvs: Vec<Point2>,
    /// Original face the new face inherits from.
    pub rep: Option<FaceId>,
    pub kind: FaceKind,
}

/// New loop of an original face that touched a beveled vertex.
#[derive(Debug, Clone)]
pub struct RebuiltFace {
    pub face: FaceId,
    pub vertices: Vec<VertRef>,
    pub uvs: Vec<Point2>,
}

/// An edge of the result and the flags it should carry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StagedEdge {
    a: VertRef,
    b: VertRef,
    flags: EdgeFlags,
}

/// Patch-interior vertices of one corner and the staged faces around them.
#[derive(Debug, Clone)]
struct UvMerge {
    vertices: Vec<VertRef>,
    faces: Range<usize>,
}

/// Vertex references of one corner's ring and patch.
#[derive(Debug, Default)]
struct CornerVerts {
    /// `seg + 1` references per slot; the ends are boundary points.
    slots: Vec<Vec<VertRef>>,
    /// Adjacent-patch rings, ring 0 first.
    rings: Vec<Vec<VertRef>>,
    center: Option<VertRef>,
    bottoms: Vec<VertRef>,
}

impl CornerVerts {
    /// Slot polylines without their closing point, one after another.
    fn flat_ring(&self, seg: usize) -> Vec<VertRef> {
        self.slots
            .iter()
            .flat_map(|s| s.iter().take(seg).copied())
            .collect()
    }

    fn interior(&self) -> Vec<VertRef> {
        self.rings
            .iter()
            .skip(1)
            .flatten()
            .copied()
            .chain(self.center)
            .chain(self.bottoms.iter().copied())
            .collect()
    }
}

/// The complete result of a bevel, ready to be committed.
#[derive(Debug)]
pub struct BevelPlan {
    context: OperationContext,
    new_points: Vec<Point3>,
    rebuilt: Vec<RebuiltFace>,
    faces: Vec<StagedFace>,
    flagged_edges: Vec<StagedEdge>,
    wires: Vec<StagedEdge>,
    marks: Vec<StagedEdge>,
    removed: Vec<VertexId>,
    merges: Vec<UvMerge>,
}

impl BevelPlan {
    /// State the plan was computed from.
    #[must_use]
    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    /// Positions of the vertices to create.
    #[must_use]
    pub fn new_points(&self) -> &[Point3] {
        &self.new_points
    }

    /// Faces to create.
    #[must_use]
    pub fn faces(&self) -> &[StagedFace] {
        &self.faces
    }

    /// Original faces whose loops change.
    #[must_use]
    pub fn rebuilt_faces(&self) -> &[RebuiltFace] {
        &self.rebuilt
    }

    /// Original vertices the bevel replaces.
    #[must_use]
    pub fn removed_vertices(&self) -> &[VertexId] {
        &self.removed
    }

    /// `true` when the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// What a committed bevel did.
#[derive(Debug, Clone, Default)]
pub struct BevelOutcome {
    /// Kind of every new or rebuilt face.
    pub face_kinds: HashMap<FaceId, FaceKind>,
    pub new_faces: Vec<FaceId>,
    pub new_vertices: Vec<VertexId>,
    /// Selected vertices left unbeveled because of their topology.
    pub degraded: Vec<VertexId>,
    /// Factor offset limiting applied to every offset.
    pub offset_scale: f64,
}

impl BevelOutcome {
    /// Kind of `face` after the bevel; faces the bevel never touched are
    /// [`FaceKind::Orig`].
    #[must_use]
    pub fn face_kind(&self, face: FaceId) -> FaceKind {
        self.face_kinds.get(&face).copied().unwrap_or(FaceKind::Orig)
    }
}

struct Stager<'a> {
    mesh: &'a Mesh,
    ctx: &'a OperationContext,
    uv: bool,
    points: Vec<Point3>,
    faces: Vec<StagedFace>,
}

impl Stager<'_> {
    fn add(&mut self, co: Point3) -> VertRef {
        self.points.push(co);
        VertRef::New(self.points.len() - 1)
    }

    fn position(&self, r: VertRef) -> Result<Point3> {
        match r {
            VertRef::Original(v) => Ok(self.mesh.point(v)?),
            VertRef::New(i) => self
                .points
                .get(i)
                .copied()
                .ok_or_else(|| OperationError::Failed("staged vertex out of range".into()).into()),
        }
    }

    fn allocate(&mut self, corner: &CornerRecord) -> CornerVerts {
        let n = corner.ring_len();
        let seg = corner.seg;
        let mut out = CornerVerts::default();
        if n == 0 {
            return out;
        }
        let pts: Vec<VertRef> = corner.points.iter().map(|bp| self.add(bp.co)).collect();
        for i in 0..n {
            let mut refs = Vec::with_capacity(seg + 1);
            refs.push(pts[i]);
            if n == 2 && i == 1 {
                for k in 1..seg {
                    refs.push(out.slots[0][seg - k]);
                }
            } else {
                for k in 1..seg {
                    let co = corner.slot_polylines[i][k];
                    refs.push(self.add(co));
                }
            }
            refs.push(pts[(i + 1) % n]);
            out.slots.push(refs);
        }
        match &corner.patch {
            InteriorPatch::Adjacent { rings, center, .. } => {
                let outer = out.flat_ring(seg);
                out.rings.push(outer);
                for ring in rings.iter().skip(1) {
                    let refs = ring.iter().map(|&co| self.add(co)).collect();
                    out.rings.push(refs);
                }
                out.center = center.map(|co| self.add(co));
            }
            InteriorPatch::TriFan { center } => out.center = Some(self.add(*center)),
            InteriorPatch::Cutoff { bottoms } => {
                out.bottoms = bottoms.iter().map(|&co| self.add(co)).collect();
            }
            InteriorPatch::None | InteriorPatch::Poly => {}
        }
        out
    }

    fn rep(&self, faces: &[FaceId]) -> Option<FaceId> {
        choose_rep_face(self.mesh, faces, self.ctx.continuity.as_ref())
    }

    fn push_face(
        &mut self,
        vertices: Vec<VertRef>,
        rep: Option<FaceId>,
        kind: FaceKind,
    ) -> Result<()> {
        let mut uvs = Vec::new();
        if self.uv {
            for &r in &vertices {
                let co = self.position(r)?;
                let uv = match rep {
                    Some(f) => self.mesh.interpolate_uv(f, &co)?,
                    None => None,
                };
                uvs.push(uv.unwrap_or_else(Point2::origin));
            }
        }
        self.faces.push(StagedFace {
            vertices,
            uvs,
            rep,
            kind,
        });
        Ok(())
    }

    /// Replacement loop for original face `f`.
    fn rebuild(&self, f: FaceId, verts: &[CornerVerts]) -> Result<RebuiltFace> {
        let data = self.mesh.face(f)?;
        let mut vertices = Vec::new();
        let mut uvs = Vec::new();
        for (idx, &u) in data.vertices.iter().enumerate() {
            let Some(&ci) = self.ctx.corner_index.get(&u) else {
                vertices.push(VertRef::Original(u));
                if self.uv {
                    uvs.push(data.uvs.get(idx).copied().unwrap_or_else(Point2::origin));
                }
                continue;
            };
            let corner = &self.ctx.corners[ci];
            let cv = &verts[ci];
            let side = corner.sides.iter().position(|s| s.fnext == Some(f)).ok_or_else(|| {
                TopologyError::InvalidTopology("face missing from the fan of its vertex".into())
            })?;
            let next = corner.sides[side].next;
            let (Some(from), Some(to)) =
                (corner.sides[next].right_point, corner.sides[side].left_point)
            else {
                return Err(OperationError::Failed("side without boundary point".into()).into());
            };
            let n = corner.ring_len();
            let seg = corner.seg;
            let mut p = from;
            let mut chain = vec![cv.slots[p][0]];
            let mut guard = 0;
            while p != to && guard < n {
                let prev = (p + n - 1) % n;
                for k in (1..seg).rev() {
                    chain.push(cv.slots[prev][k]);
                }
                chain.push(cv.slots[prev][0]);
                p = prev;
                guard += 1;
            }
            for r in chain {
                if self.uv {
                    let co = self.position(r)?;
                    uvs.push(self.mesh.interpolate_uv(f, &co)?.unwrap_or_else(Point2::origin));
                }
                vertices.push(r);
            }
        }
        Ok(RebuiltFace {
            face: f,
            vertices,
            uvs,
        })
    }

    /// Quads along every beveled edge, between the slots at its two ends.
    fn strips(&mut self, verts: &[CornerVerts]) -> Result<Vec<StagedEdge>> {
        let mut marks = Vec::new();
        let ctx = self.ctx;
        let mesh = self.mesh;
        let params = &ctx.params;
        for &e in &ctx.beveled_edges {
            let Some([a, b]) = ctx.edge_ends.get(&e).copied() else {
                continue;
            };
            let slot_of = |r: SideRef| {
                ctx.corners[r.corner]
                    .points
                    .iter()
                    .position(|bp| bp.slot == SlotKind::Beveled { side: r.side })
            };
            let (Some(ia), Some(ib)) = (slot_of(a), slot_of(b)) else {
                return Err(
                    OperationError::Failed("beveled side without a profile slot".into()).into(),
                );
            };
            let p1 = verts[a.corner].slots[ia].clone();
            let p2 = verts[b.corner].slots[ib].clone();
            if p1.len() != p2.len() {
                return Err(
                    OperationError::Failed("segment counts differ along an edge".into()).into(),
                );
            }
            let seg = p1.len() - 1;
            let side = &ctx.corners[a.corner].sides[a.side];
            let (f_right, f_left) = (side.fprev, side.fnext);
            let pair: Vec<FaceId> = f_right.into_iter().chain(f_left).collect();
            for k in 0..seg {
                let rep = if seg % 2 == 1 && k == seg / 2 {
                    self.rep(&pair)
                } else if 2 * k < seg {
                    f_right
                } else {
                    f_left
                };
                let quad = vec![p1[k + 1], p1[k], p2[seg - k], p2[seg - k - 1]];
                self.push_face(quad, rep, FaceKind::Edge)?;
            }
            let edge_flags = mesh.edge(e)?.flags;
            let seam = params.mark_seam && edge_flags.seam;
            let sharp = params.mark_sharp && edge_flags.sharp;
            if seam || sharp {
                let flags = EdgeFlags {
                    seam,
                    sharp,
                    ..EdgeFlags::default()
                };
                marks.push(StagedEdge {
                    a: p1[0],
                    b: p2[seg],
                    flags,
                });
                marks.push(StagedEdge {
                    a: p1[seg],
                    b: p2[0],
                    flags,
                });
            }
        }
        Ok(marks)
    }

    /// Marks along the ring slots that join two seam (or sharp) beveled
    /// slots, so the marked run continues around the corner.
    fn ring_marks(&self, corner: &CornerRecord, cv: &CornerVerts) -> Vec<StagedEdge> {
        let params = &self.ctx.params;
        let n = corner.ring_len();
        let mut marks = Vec::new();
        for (i, bp) in corner.points.iter().enumerate() {
            let runs = [
                (params.mark_seam, bp.seam_len, true),
                (params.mark_sharp, bp.sharp_len, false),
            ];
            for (enabled, len, seam) in runs {
                if !enabled {
                    continue;
                }
                let flags = EdgeFlags {
                    seam,
                    sharp: !seam,
                    ..EdgeFlags::default()
                };
                for slot in (i..i + len).map(|j| j % n) {
                    for pair in cv.slots[slot].windows(2) {
                        marks.push(StagedEdge {
                            a: pair[0],
                            b: pair[1],
                            flags,
                        });
                    }
                }
            }
        }
        marks
    }

    /// Faces filling the ring of one corner.
    fn patch(&mut self, corner: &CornerRecord, cv: &CornerVerts) -> Result<()> {
        let n = corner.ring_len();
        let seg = corner.seg;
        let point_reps: Vec<Option<FaceId>> =
            (0..n).map(|i| self.rep(&corner.point_faces(i))).collect();
        let any_rep =
            |reps: &[Option<FaceId>]| -> Vec<FaceId> { reps.iter().flatten().copied().collect() };
        match &corner.patch {
            InteriorPatch::None => {}
            InteriorPatch::Poly => {
                let rep = self.rep(&any_rep(&point_reps));
                self.push_face(cv.flat_ring(seg), rep, FaceKind::Vert)?;
            }
            InteriorPatch::TriFan { .. } => {
                let ring = cv.flat_ring(seg);
                let Some(center) = cv.center else {
                    return Ok(());
                };
                for q in 0..ring.len() {
                    let slot = q / seg.max(1);
                    let side = corner.points[slot].slot.side();
                    let rep = corner.sides[side]
                        .fnext
                        .or_else(|| self.rep(&corner.point_faces(slot)));
                    let tri = vec![ring[q], ring[(q + 1) % ring.len()], center];
                    self.push_face(tri, rep, FaceKind::Vert)?;
                }
            }
            InteriorPatch::Adjacent { ns, .. } => {
                self.adjacent_faces(*ns, n, cv, &point_reps)?;
            }
            InteriorPatch::Cutoff { .. } => {
                for i in 0..n {
                    let mut cap: Vec<VertRef> = cv.slots[i].clone();
                    cap.push(cv.bottoms[(i + 1) % n]);
                    cap.push(cv.bottoms[i]);
                    let rep = self.rep(&corner.slot_faces(i));
                    self.push_face(cap, rep, FaceKind::Vert)?;
                }
                let rep = self.rep(&any_rep(&point_reps));
                self.push_face(cv.bottoms.clone(), rep, FaceKind::Vert)?;
            }
        }
        Ok(())
    }

    fn adjacent_faces(
        &mut self,
        ns: usize,
        n: usize,
        cv: &CornerVerts,
        point_reps: &[Option<FaceId>],
    ) -> Result<()> {
        let at = |j: usize, i: usize, k: usize| -> Option<VertRef> {
            match cv.rings.get(j) {
                Some(ring) => {
                    let m = ns - 2 * j;
                    Some(ring[(i * m + k) % ring.len()])
                }
                None => cv.center,
            }
        };
        let missing = || OperationError::Failed("adjacent patch grid is incomplete".into());
        for j in 0..cv.rings.len() {
            let m = ns - 2 * j;
            if m == 1 {
                let ngon: Vec<VertRef> = (0..n).filter_map(|i| at(j, i, 0)).collect();
                let reps: Vec<FaceId> = point_reps.iter().flatten().copied().collect();
                let rep = self.rep(&reps);
                self.push_face(ngon, rep, FaceKind::Vert)?;
                continue;
            }
            for i in 0..n {
                let ip = (i + n - 1) % n;
                let i1 = (i + 1) % n;
                let quad = vec![
                    at(j, ip, m - 1).ok_or_else(missing)?,
                    at(j, i, 0).ok_or_else(missing)?,
                    at(j, i, 1).ok_or_else(missing)?,
                    at(j + 1, i, 0).ok_or_else(missing)?,
                ];
                self.push_face(quad, point_reps[i], FaceKind::Vert)?;
                for k in 0..m.saturating_sub(2) {
                    let quad = vec![
                        at(j, i, k + 1).ok_or_else(missing)?,
                        at(j, i, k + 2).ok_or_else(missing)?,
                        at(j + 1, i, k + 1).ok_or_else(missing)?,
                        at(j + 1, i, k).ok_or_else(missing)?,
                    ];
                    let rep = match (2 * k + 3).cmp(&m) {
                        std::cmp::Ordering::Less => point_reps[i],
                        std::cmp::Ordering::Greater => point_reps[i1],
                        std::cmp::Ordering::Equal => {
                            let pair: Vec<FaceId> =
                                [point_reps[i], point_reps[i1]].into_iter().flatten().collect();
                            self.rep(&pair)
                        }
                    };
                    self.push_face(quad, rep, FaceKind::Vert)?;
                }
            }
        }
        Ok(())
    }
}

/// Boundary point a side's edge continues from after the bevel.
fn side_image(ctx: &OperationContext, verts: &[CornerVerts], v: VertexId, edge: EdgeId) -> VertRef {
    let Some(&ci) = ctx.corner_index.get(&v) else {
        return VertRef::Original(v);
    };
    let corner = &ctx.corners[ci];
    corner
        .side_of_edge(edge)
        .and_then(|s| corner.sides[s].left_point)
        .and_then(|p| verts[ci].slots.get(p))
        .map_or(VertRef::Original(v), |slot| slot[0])
}

/// Computes the whole result of the bevel described by `ctx`.
///
/// # Errors
///
/// Returns an error if the mesh and the context disagree, or if the result
/// would not be a valid mesh.
pub(crate) fn stage(ctx: OperationContext, mesh: &Mesh) -> Result<BevelPlan> {
    let (points, rebuilt, faces, flagged_edges, wires, marks, merges) = {
        let mut st = Stager {
            mesh,
            ctx: &ctx,
            uv: mesh.has_uv_layer(),
            points: Vec::new(),
            faces: Vec::new(),
        };
        let verts: Vec<CornerVerts> = ctx.corners.iter().map(|c| st.allocate(c)).collect();

        let touched: HashSet<FaceId> = ctx
            .corners
            .iter()
            .flat_map(|c| c.sides.iter().filter_map(|s| s.fnext))
            .collect();
        let mut rebuilt = Vec::new();
        for f in mesh.face_ids().filter(|f| touched.contains(f)) {
            rebuilt.push(st.rebuild(f, &verts)?);
        }

        let mut marks = st.strips(&verts)?;

        let mut merges = Vec::new();
        for (corner, cv) in ctx.corners.iter().zip(&verts) {
            let first = st.faces.len();
            st.patch(corner, cv)?;
            marks.extend(st.ring_marks(corner, cv));
            if st.uv && !corner.any_seam {
                let vertices = cv.interior();
                if !vertices.is_empty() {
                    merges.push(UvMerge {
                        vertices,
                        faces: first..st.faces.len(),
                    });
                }
            }
        }

        let mut flagged_edges = Vec::new();
        let mut wires = Vec::new();
        let mut seen = HashSet::new();
        for corner in &ctx.corners {
            for s in corner.sides.iter().filter(|s| !s.beveled) {
                if !seen.insert(s.edge) {
                    continue;
                }
                let edge = mesh.edge(s.edge)?;
                flagged_edges.push(StagedEdge {
                    a: side_image(&ctx, &verts, edge.v1, s.edge),
                    b: side_image(&ctx, &verts, edge.v2, s.edge),
                    flags: edge.flags,
                });
            }
            for &w in &corner.wire_edges {
                if !seen.insert(w) {
                    continue;
                }
                let edge = mesh.edge(w)?;
                let ends = [edge.v1, edge.v2].map(|u| {
                    let toward = edge.other(u).and_then(|o| mesh.point(o).ok());
                    nearest_point(&ctx, &verts, u, toward)
                });
                wires.push(StagedEdge {
                    a: ends[0],
                    b: ends[1],
                    flags: edge.flags,
                });
            }
        }
        (st.points, rebuilt, st.faces, flagged_edges, wires, marks, merges)
    };
    let removed = ctx.corners.iter().map(|c| c.vertex).collect();
    let plan = BevelPlan {
        context: ctx,
        new_points: points,
        rebuilt,
        faces,
        flagged_edges,
        wires,
        marks,
        removed,
        merges,
    };
    plan.validate(mesh)?;
    Ok(plan)
}

/// Boundary point of `v`'s corner closest to `toward`, or `v` itself when it
/// is not beveled.
fn nearest_point(
    ctx: &OperationContext,
    verts: &[CornerVerts],
    v: VertexId,
    toward: Option<Point3>,
) -> VertRef {
    let Some(&ci) = ctx.corner_index.get(&v) else {
        return VertRef::Original(v);
    };
    let corner = &ctx.corners[ci];
    let target = toward.unwrap_or(corner.co);
    corner
        .points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.co - target).norm().total_cmp(&(b.co - target).norm()))
        .and_then(|(i, _)| verts[ci].slots.get(i))
        .map_or(VertRef::Original(v), |slot| slot[0])
}

impl BevelPlan {
    /// Checks that committing would leave every face with at least three
    /// distinct vertices and no directed edge used twice.
    fn validate(&self, mesh: &Mesh) -> Result<()> {
        if self.new_points.iter().any(|p| p.iter().any(|c| !c.is_finite())) {
            return Err(OperationError::Failed("non-finite bevel vertex".into()).into());
        }
        let rebuilt: HashSet<FaceId> = self.rebuilt.iter().map(|r| r.face).collect();
        let removed: HashSet<VertexId> = self.removed.iter().copied().collect();
        let mut directed: HashSet<(VertRef, VertRef)> = HashSet::new();
        for f in mesh.face_ids().filter(|f| !rebuilt.contains(f)) {
            let data = mesh.face(f)?;
            if data.vertices.iter().any(|v| removed.contains(v)) {
                return Err(
                    OperationError::Failed("untouched face uses a beveled vertex".into()).into(),
                );
            }
            for (a, b) in data.directed_edges() {
                directed.insert((VertRef::Original(a), VertRef::Original(b)));
            }
        }
        let loops = self
            .rebuilt
            .iter()
            .map(|r| &r.vertices)
            .chain(self.faces.iter().map(|f| &f.vertices));
        for verts in loops {
            let distinct: HashSet<VertRef> = verts.iter().copied().collect();
            if verts.len() < 3 || distinct.len() != verts.len() {
                return Err(
                    OperationError::Failed("bevel would create a degenerate face".into()).into(),
                );
            }
            for i in 0..verts.len() {
                let edge = (verts[i], verts[(i + 1) % verts.len()]);
                if !directed.insert(edge) {
                    return Err(OperationError::Failed(
                        "bevel would create a non-manifold edge".into(),
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Applies the plan to `mesh`.
    ///
    /// Every step is checked by [`validate`](Self::validate) against the
    /// mesh the plan was computed from, so on that mesh none of the fallible
    /// calls below can fail.
    ///
    /// # Errors
    ///
    /// Returns an error only if `mesh` is not the mesh the plan was computed
    /// from; the mesh may then be partly modified.
    pub(crate) fn commit(self, mesh: &mut Mesh) -> Result<BevelOutcome> {
        let params = self.context.params.clone();
        let new_vertices: Vec<VertexId> = self
            .new_points
            .iter()
            .map(|&co| mesh.add_vertex(VertexData::new(co)))
            .collect();
        let resolve = |r: VertRef| -> VertexId {
            match r {
                VertRef::Original(v) => v,
                VertRef::New(i) => new_vertices[i],
            }
        };

        let mut face_kinds = HashMap::new();
        for r in &self.rebuilt {
            let verts = r.vertices.iter().map(|&v| resolve(v)).collect();
            mesh.rebuild_face(r.face, verts, r.uvs.clone())?;
            face_kinds.insert(r.face, FaceKind::Recon);
        }

        let mut new_faces = Vec::with_capacity(self.faces.len());
        for staged in &self.faces {
            let material = match (params.material, staged.rep) {
                (Some(m), _) => m,
                (None, Some(rep)) => mesh.face(rep)?.material,
                (None, None) => 0,
            };
            let data = FaceData::new(staged.vertices.iter().map(|&v| resolve(v)).collect())
                .with_uvs(staged.uvs.clone())
                .with_material(material);
            let id = mesh.add_face(data)?;
            face_kinds.insert(id, staged.kind);
            new_faces.push(id);
        }

        for e in &self.flagged_edges {
            if let Some(id) = mesh.find_edge(resolve(e.a), resolve(e.b)) {
                let flags = &mut mesh.edge_mut(id)?.flags;
                flags.seam = e.flags.seam;
                flags.sharp = e.flags.sharp;
                flags.weight = e.flags.weight;
            }
        }
        for w in &self.wires {
            let (a, b) = (resolve(w.a), resolve(w.b));
            if a == b {
                continue;
            }
            let id = mesh.ensure_edge(a, b)?;
            mesh.edge_mut(id)?.flags = w.flags;
        }

        for &v in &self.removed {
            let edges = mesh.vertex(v)?.edges().to_vec();
            for e in edges {
                mesh.remove_edge(e)?;
            }
            mesh.remove_vertex(v)?;
        }

        for m in &self.marks {
            if let Some(id) = mesh.find_edge(resolve(m.a), resolve(m.b)) {
                let flags = &mut mesh.edge_mut(id)?.flags;
                flags.seam |= m.flags.seam;
                flags.sharp |= m.flags.sharp;
            }
        }

        if params.harden_normals {
            harden_normals(mesh, &self.rebuilt, &new_faces)?;
        }

        for merge in &self.merges {
            let faces = &new_faces[merge.faces.clone()];
            for &r in &merge.vertices {
                mesh.merge_corner_uvs(resolve(r), faces)?;
            }
        }

        let tags = mesh.tags_mut();
        tags.clear();
        tags.vertices.extend(new_vertices.iter().copied());
        tags.faces.extend(new_faces.iter().copied());
        let mut edges = Vec::new();
        for &f in &new_faces {
            for (a, b) in mesh.face(f)?.directed_edges() {
                edges.extend(mesh.find_edge(a, b));
            }
        }
        mesh.tags_mut().edges.extend(edges);

        tracing::info!(
            vertices = new_vertices.len(),
            faces = new_faces.len(),
            rebuilt = self.rebuilt.len(),
            "bevel committed"
        );
        Ok(BevelOutcome {
            face_kinds,
            new_faces,
            new_vertices,
            degraded: self.context.degraded.clone(),
            offset_scale: self.context.offset_scale,
        })
    }
}

/// Flat normals on rebuilt faces; on bevel faces, each corner gets the mean
/// normal of the bevel faces meeting at its vertex.
fn harden_normals(mesh: &mut Mesh, rebuilt: &[RebuiltFace], new_faces: &[FaceId]) -> Result<()> {
    for r in rebuilt {
        let n = mesh.face_normal(r.face)?;
        mesh.set_flat_corner_normals(r.face, n)?;
    }
    let mut sums: HashMap<VertexId, Vector3> = HashMap::new();
    for &f in new_faces {
        let n = mesh.face_normal(f)?;
        for &v in &mesh.face(f)?.vertices {
            *sums.entry(v).or_insert_with(Vector3::zeros) += n;
        }
    }
    for &f in new_faces {
        let flat = mesh.face_normal(f)?;
        let face = mesh.face_mut(f)?;
        face.normals = face
            .vertices
            .iter()
            .map(|v| sums.get(v).and_then(try_normalize).unwrap_or(flat))
            .collect();
    }
    Ok(())
}
