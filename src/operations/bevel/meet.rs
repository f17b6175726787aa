//! Where the offset boundaries of neighbouring edge sides meet.

use std::f64::consts::PI;

use crate::math::intersect_3d::{line_line_intersect, LineLineRelation};
use crate::math::{angle_between, try_normalize, Point3, Vector3};
use crate::mesh::{FaceId, Mesh, VertexId};

use super::context::{EPSILON, EPSILON_ANG, EPSILON_BIG, GOOD_ANGLE, SMALL_ANG};
use super::params::{BevelParams, OffsetMode};
use super::ring::CornerRecord;

/// Turn between two consecutive sides, seen from outside the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleKind {
    /// Convex corner, less than 180 degrees inside the face.
    Smaller,
    /// Collinear (or folded back) edges.
    Straight,
    /// Reflex corner, more than 180 degrees inside the face.
    Larger,
}

/// Meet-point geometry for one corner.
///
/// Side offsets must be assigned before any meet is computed.
pub(crate) struct Meet<'a> {
    mesh: &'a Mesh,
    params: &'a BevelParams,
    corner: &'a CornerRecord,
    scale: f64,
}

impl<'a> Meet<'a> {
    pub(crate) fn new(
        mesh: &'a Mesh,
        params: &'a BevelParams,
        corner: &'a CornerRecord,
        scale: f64,
    ) -> Self {
        Self {
            mesh,
            params,
            corner,
            scale,
        }
    }

    /// Normal of `f`, or the vertex normal across a border gap.
    fn face_normal(&self, f: Option<FaceId>) -> Vector3 {
        f.and_then(|f| self.mesh.face_normal(f).ok())
            .unwrap_or(self.corner.normal)
    }

    /// Point `d` along side `s` from the corner, kept short of the far end.
    pub(crate) fn slide_dist(&self, s: usize, d: f64) -> Point3 {
        let side = &self.corner.sides[s];
        let d = if d > side.length {
            side.length - 50.0 * EPSILON
        } else {
            d
        };
        self.corner.co + side.dir * d
    }

    /// Foot of the offset line of side `s` level with the corner, on its
    /// left (`fnext`) or right (`fprev`) face.
    ///
    /// A side without that face keeps the corner position.
    pub(crate) fn offset_foot(&self, s: usize, left: bool) -> Point3 {
        let side = &self.corner.sides[s];
        let face = if left { side.fnext } else { side.fprev };
        if face.is_none() {
            return self.corner.co;
        }
        let (perp, off) = if left {
            (self.face_normal(face).cross(&side.dir), side.offset_l)
        } else {
            (side.dir.cross(&self.face_normal(face)), side.offset_r)
        };
        self.corner.co + try_normalize(&perp).unwrap_or_else(Vector3::zeros) * off
    }

    /// Classifies the turn from side `s1` to side `s2`.
    pub(crate) fn angle_kind(&self, s1: usize, s2: usize) -> AngleKind {
        let d1 = self.corner.sides[s1].dir;
        let d2 = self.corner.sides[s2].dir;
        if d1.dot(&d2).abs() >= EPSILON_ANG.cos() {
            return AngleKind::Straight;
        }
        let Some(cross) = try_normalize(&d1.cross(&d2)) else {
            return AngleKind::Straight;
        };
        let no = self.face_normal(self.corner.sides[s1].fnext);
        let dot = cross.dot(&no);
        if dot < -EPSILON_BIG {
            AngleKind::Larger
        } else if dot > EPSILON_BIG {
            AngleKind::Smaller
        } else {
            AngleKind::Straight
        }
    }

    /// Meeting point of the offset lines of `s1` (left side) and `s2` (right
    /// side), where `s2` follows `s1` counter-clockwise.
    ///
    /// `face` is the face between them when they are adjacent.
    /// `edges_between` means unbeveled sides lie between them; `e_in_plane`
    /// names one of those whose faces are coplanar. An offset measured in a
    /// missing border face counts as zero.
    pub(crate) fn offset_meet(
        &self,
        s1: usize,
        s2: usize,
        face: Option<FaceId>,
        edges_between: bool,
        e_in_plane: Option<usize>,
    ) -> Point3 {
        let v = self.corner.co;
        let sides = &self.corner.sides;
        let (e1, e2) = (&sides[s1], &sides[s2]);
        let (d1, d2) = (e1.dir, e2.dir);
        let off1 = if e1.fnext.is_some() { e1.offset_l } else { 0.0 };
        let off2 = if e2.fprev.is_some() { e2.offset_r } else { 0.0 };
        let ang = angle_between(&d1, &d2);

        if ang < EPSILON_ANG {
            // Folded back onto each other.
            return self.slide_dist(s2, off1.max(off2));
        }
        if PI - ang < EPSILON_ANG {
            // Straight through: bisector perpendicular to the common line.
            let no = if face.is_some() {
                self.face_normal(face)
            } else {
                self.mean_fnext_normal(s1, s2)
            };
            let Some(perp) = try_normalize(&no.cross(&(d1 - d2))) else {
                return v;
            };
            return v + perp * (off1.max(off2) / (ang / 2.0).sin());
        }

        let (n1, n2) = match face {
            Some(_) if PI - ang < SMALL_ANG => {
                let no = self.face_normal(face);
                (no, no)
            }
            _ if !edges_between => {
                let reference = self.face_normal(face);
                let n = orient(d1.cross(&d2), &reference);
                (n, n)
            }
            _ => {
                let dn1 = sides[e1.next].dir;
                let dp2 = sides[e2.prev].dir;
                (
                    orient(d1.cross(&dn1), &self.face_normal(e1.fnext)),
                    orient(dp2.cross(&d2), &self.face_normal(e2.fprev)),
                )
            }
        };
        let perp1 = try_normalize(&n1.cross(&d1)).unwrap_or_else(Vector3::zeros);
        let perp2 = try_normalize(&d2.cross(&n2)).unwrap_or_else(Vector3::zeros);

        let [l1a, l1b, l2a, l2b] = if self.params.offset_mode.slides_along_edges() {
            self.slide_lines(s1, s2)
                .unwrap_or([v, e1.far, v, e2.far])
        } else {
            let l1a = v + perp1 * off1;
            let l2a = v + perp2 * off2;
            [l1a, l1a + d1, l2a, l2a + d2]
        };

        let (mut co, skew) = match line_line_intersect(&l1a, &l1b, &l2a, &l2b) {
            LineLineRelation::Parallel => return l1a,
            LineLineRelation::Point { point } => (point, None),
            LineLineRelation::Skew { on_a, on_b } => (on_a, Some(on_b)),
        };

        if off1 == 0.0 {
            if let Some(closer) = self.outside_edge(s1, &co) {
                co = closer;
            }
        }
        if off2 == 0.0 {
            if let Some(closer) = self.outside_edge(s2, &co) {
                co = closer;
            }
        }
        if edges_between && off1 > 0.0 && off2 > 0.0 {
            if let Some(other) = skew {
                co = nalgebra::center(&co, &other);
            }
            if let Some(dropped) = self.drop_to_face_between(s1, s2, &co, e_in_plane) {
                co = dropped;
            }
        }
        co
    }

    fn mean_fnext_normal(&self, s1: usize, s2: usize) -> Vector3 {
        let mut sum = Vector3::zeros();
        let mut s = s1;
        let mut guard = 0;
        while s != s2 && guard < self.corner.sides.len() {
            let f = self.corner.sides[s].fnext;
            if f.is_some() {
                sum += self.face_normal(f);
            }
            s = self.corner.sides[s].next;
            guard += 1;
        }
        try_normalize(&sum).unwrap_or(self.corner.normal)
    }

    /// Projects `co` onto the first face between `s1` and `s2` whose wedge
    /// contains the projection.
    fn drop_to_face_between(
        &self,
        s1: usize,
        s2: usize,
        co: &Point3,
        e_in_plane: Option<usize>,
    ) -> Option<Point3> {
        let sides = &self.corner.sides;
        let v = self.corner.co;
        let in_plane_no = e_in_plane.map(|e| self.face_normal(sides[e].fnext));
        let mut s = s1;
        let mut guard = 0;
        while s != s2 && guard < sides.len() {
            guard += 1;
            let f = sides[s].fnext;
            let next = sides[s].next;
            let no = self.face_normal(f);
            let skip = f.is_none()
                || in_plane_no.is_some_and(|ipn| {
                    let ang = angle_between(&no, &ipn);
                    ang < SMALL_ANG || (ang - PI).abs() < SMALL_ANG
                });
            if !skip {
                let dropped = co - no * (co - v).dot(&no);
                if self.point_between_edges(&dropped, &no, s, next) {
                    return Some(dropped);
                }
            }
            s = next;
        }
        None
    }

    /// Whether `co` lies in the counter-clockwise wedge from side `sa` to
    /// side `sb`, measured around `no`.
    fn point_between_edges(&self, co: &Point3, no: &Vector3, sa: usize, sb: usize) -> bool {
        let da = self.corner.sides[sa].dir;
        let db = self.corner.sides[sb].dir;
        let Some(dco) = try_normalize(&(co - self.corner.co)) else {
            return false;
        };
        let full = |a: &Vector3, b: &Vector3| {
            let ang = angle_between(a, b);
            if a.cross(b).dot(no) < 0.0 {
                2.0 * PI - ang
            } else {
                ang
            }
        };
        full(&da, &db) - full(&da, &dco) > -EPSILON_ANG
    }

    /// Nearer endpoint of side `s` when `co` projects outside the edge.
    fn outside_edge(&self, s: usize, co: &Point3) -> Option<Point3> {
        let side = &self.corner.sides[s];
        let lambda = (co - self.corner.co).dot(&side.dir);
        if lambda <= -EPSILON_BIG * side.length {
            Some(self.corner.co)
        } else if lambda >= (1.0 + EPSILON_BIG) * side.length {
            Some(side.far)
        } else {
            None
        }
    }

    /// Two lines for edge-length-relative and absolute offsets, built by
    /// sliding along the edges one step further around the two faces.
    ///
    /// Returns `None` when any corner involved is reflex or a face is
    /// missing at a border.
    fn slide_lines(&self, s1: usize, s2: usize) -> Option<[Point3; 4]> {
        let sides = &self.corner.sides;
        let v = self.corner.vertex;
        let (e1, e2) = (&sides[s1], &sides[s2]);
        let (fa, fb) = (e1.fnext?, e2.fprev?);
        let f1 = self.mesh.face(fa).ok()?;
        let f2 = self.mesh.face(fb).ok()?;
        let n0 = f1.next_vertex(e1.other)?;
        let n4 = f1.prev_vertex(v)?;
        let n3 = f2.prev_vertex(e2.other)?;
        let n5 = f2.next_vertex(v)?;

        let visible = self.corner_convex(fa, e1.other)
            && self.corner_convex(fa, v)
            && self.corner_convex(fb, e2.other)
            && self.corner_convex(fb, v);
        if !visible {
            return None;
        }

        let co = |id: VertexId| self.mesh.point(id).ok();
        let (p0, p3, p4, p5) = (co(n0)?, co(n3)?, co(n4)?, co(n5)?);
        let vco = self.corner.co;
        let amount = self.params.offset * self.scale;
        let dist = |a: &Point3, b: &Point3| match self.params.offset_mode {
            OffsetMode::Percent => amount * (b - a).norm() / 100.0,
            _ => amount,
        };
        Some([
            slide_toward(&vco, &p4, dist(&vco, &p4) * e1.weight),
            slide_toward(&e1.far, &p0, dist(&e1.far, &p0) * e1.weight),
            slide_toward(&vco, &p5, dist(&vco, &p5) * e2.weight),
            slide_toward(&e2.far, &p3, dist(&e2.far, &p3) * e2.weight),
        ])
    }

    fn corner_convex(&self, f: FaceId, c: VertexId) -> bool {
        let Ok(face) = self.mesh.face(f) else {
            return false;
        };
        let (Some(p), Some(q)) = (face.prev_vertex(c), face.next_vertex(c)) else {
            return false;
        };
        let (Ok(pc), Ok(cc), Ok(qc)) = (self.mesh.point(p), self.mesh.point(c), self.mesh.point(q))
        else {
            return false;
        };
        (qc - cc).cross(&(pc - cc)).dot(&self.face_normal(Some(f))) > 0.0
    }

    /// Where the offset line of the beveled one of `s1`/`s2` crosses the
    /// other, unbeveled side, with the angle from `s1` to `s2`.
    ///
    /// Returns no point when the angle is zero, straight or reflex.
    pub(crate) fn offset_meet_edge(&self, s1: usize, s2: usize) -> (Option<Point3>, f64) {
        let sides = &self.corner.sides;
        let (e1, e2) = (&sides[s1], &sides[s2]);
        let ang = angle_between(&e1.dir, &e2.dir);
        if ang < GOOD_ANGLE {
            return (None, 0.0);
        }
        if e1.dir.cross(&e2.dir).dot(&self.corner.normal) < 0.0 {
            return (None, 2.0 * PI - ang);
        }
        if (ang - PI).abs() < GOOD_ANGLE {
            return (None, ang);
        }
        let sinang = ang.sin();
        let co = if e1.offset_l == 0.0 {
            self.corner.co + e1.dir * (e2.offset_r / sinang)
        } else {
            self.corner.co + e2.dir * (e1.offset_l / sinang)
        };
        (Some(co), ang)
    }

    /// Both beveled sides meet the single unbeveled side `emid` at convex
    /// angles.
    pub(crate) fn good_offset_on_edge_between(&self, s1: usize, s2: usize, emid: usize) -> bool {
        self.offset_meet_edge(s1, emid).0.is_some() && self.offset_meet_edge(emid, s2).0.is_some()
    }

    /// Boundary point on the unbeveled side `emid` between beveled sides
    /// `s1` and `s2`.
    pub(crate) fn offset_on_edge_between(&self, s1: usize, s2: usize, emid: usize) -> Point3 {
        let sides = &self.corner.sides;
        let (meet1, _) = self.offset_meet_edge(s1, emid);
        let (meet2, _) = self.offset_meet_edge(emid, s2);
        if self.params.offset_mode.slides_along_edges() {
            let wt = if self.params.use_weights {
                0.5 * (sides[s1].weight + sides[s2].weight)
            } else {
                1.0
            };
            let mid = &sides[emid];
            let amount = self.params.offset * self.scale * wt;
            let frac = match self.params.offset_mode {
                OffsetMode::Percent => amount / 100.0,
                _ if mid.length > EPSILON => amount / mid.length,
                _ => 0.0,
            };
            return self.corner.co + (mid.far - self.corner.co) * frac;
        }
        match (meet1, meet2) {
            (Some(a), Some(b)) => nalgebra::center(&a, &b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => self.slide_dist(emid, sides[s1].offset_l),
        }
    }
}

fn orient(n: Vector3, reference: &Vector3) -> Vector3 {
    let n = try_normalize(&n).unwrap_or_else(Vector3::zeros);
    if n.dot(reference) < 0.0 {
        -n
    } else {
        n
    }
}

/// Point `d` from `from` toward `to`, kept short of `to`.
fn slide_toward(from: &Point3, to: &Point3, d: f64) -> Point3 {
    let len = (to - from).norm();
    let Some(dir) = try_normalize(&(to - from)) else {
        return *from;
    };
    let d = if d > len { len - 50.0 * EPSILON } else { d };
    from + dir * d
}
