//! Boundary rings: side offsets, boundary points and their slot profiles.

use std::f64::consts::PI;

use crate::error::Result;
use crate::math::intersect_3d::{distance_to_line, line_line_intersect, LineLineRelation};
use crate::math::{angle_between, Point3};
use crate::mesh::Mesh;

use super::context::EPSILON;
use super::meet::{AngleKind, Meet};
use super::params::{BevelParams, MiterPattern, OffsetMode};
use super::profile::{ProfileCache, ProfileCurve, ProfileKind};
use super::ring::{BoundaryPoint, CornerRecord, EdgeSide, SlotKind};

/// Points plus the left/right point of every side, before they are written
/// back into the corner.
struct RingDraft {
    points: Vec<BoundaryPoint>,
    left: Vec<Option<usize>>,
    right: Vec<Option<usize>>,
}

impl RingDraft {
    fn new(sides: usize) -> Self {
        Self {
            points: Vec::new(),
            left: vec![None; sides],
            right: vec![None; sides],
        }
    }

    fn push(&mut self, bp: BoundaryPoint) -> usize {
        self.points.push(bp);
        self.points.len() - 1
    }
}

/// Rebuilds the boundary ring of `corner` for offsets scaled by `scale`.
///
/// # Errors
///
/// Returns an error if a face around the corner is missing.
pub(crate) fn build_boundary(
    mesh: &Mesh,
    params: &BevelParams,
    corner: &mut CornerRecord,
    scale: f64,
) -> Result<()> {
    corner.points.clear();
    corner.slot_polylines.clear();
    for s in &mut corner.sides {
        s.left_point = None;
        s.right_point = None;
    }

    let draft = if corner.vertex_only {
        vertex_ring(mesh, params, corner, scale)
    } else {
        assign_offsets(mesh, params, corner, scale)?;
        if corner.beveled_count == 1 {
            terminal_ring(mesh, params, corner, scale)
        } else {
            edge_ring(mesh, params, corner, scale)
        }
    };

    corner.points = draft.points;
    for (i, s) in corner.sides.iter_mut().enumerate() {
        s.left_point = draft.left[i];
        s.right_point = draft.right[i];
    }
    update_resolved_offsets(corner);
    Ok(())
}

/// Requested offsets of every beveled side, before any meet.
fn assign_offsets(
    mesh: &Mesh,
    params: &BevelParams,
    corner: &mut CornerRecord,
    scale: f64,
) -> Result<()> {
    let base = params.offset * scale;
    for i in 0..corner.sides.len() {
        if !corner.sides[i].beveled {
            let side = &mut corner.sides[i];
            side.offset_l_spec = 0.0;
            side.offset_r_spec = 0.0;
            side.offset_l = 0.0;
            side.offset_r = 0.0;
            continue;
        }
        let s = &corner.sides[i];
        let (next, prev) = (s.next, s.prev);
        let (l, r) = match params.offset_mode {
            OffsetMode::Offset => (base, base),
            OffsetMode::Width | OffsetMode::Depth => match (s.fprev, s.fnext) {
                (Some(fp), Some(fnx)) => {
                    let a = mesh.face_normal(fp)?;
                    let b = mesh.face_normal(fnx)?;
                    let face_angle = PI - angle_between(&a, &b);
                    let z = if params.offset_mode == OffsetMode::Width {
                        (2.0 * (face_angle / 2.0).sin()).abs()
                    } else {
                        (face_angle / 2.0).cos().abs()
                    };
                    let off = if z < EPSILON { 0.01 * base } else { base / z };
                    (off, off)
                }
                _ => (base, base),
            },
            OffsetMode::Percent => {
                let sin_next = angle_between(&s.dir, &corner.sides[next].dir).sin();
                let sin_prev = angle_between(&s.dir, &corner.sides[prev].dir).sin();
                (
                    corner.sides[next].length * base / 100.0 * sin_next,
                    corner.sides[prev].length * base / 100.0 * sin_prev,
                )
            }
            OffsetMode::Absolute => {
                let sin_next = angle_between(&s.dir, &corner.sides[next].dir).sin();
                let sin_prev = angle_between(&s.dir, &corner.sides[prev].dir).sin();
                (base * sin_next, base * sin_prev)
            }
        };
        let w = s.weight;
        let side = &mut corner.sides[i];
        side.offset_l_spec = l * w;
        side.offset_r_spec = r * w;
        side.offset_l = side.offset_l_spec;
        side.offset_r = side.offset_r_spec;
    }
    Ok(())
}

/// Ring of a corner with two or more beveled sides: one group of points
/// between each beveled side and the next.
fn edge_ring(mesh: &Mesh, params: &BevelParams, corner: &CornerRecord, scale: f64) -> RingDraft {
    let meet = Meet::new(mesh, params, corner, scale);
    let sides = &corner.sides;
    let beveled: Vec<usize> = (0..sides.len()).filter(|&s| sides[s].beveled).collect();
    let mut draft = RingDraft::new(sides.len());

    for (g, &s) in beveled.iter().enumerate() {
        let s2 = beveled[(g + 1) % beveled.len()];
        let mut between = corner.sides_between(s, s2);
        between.pop();

        let first = draft.points.len();
        if between.is_empty() {
            let co = meet.offset_meet(s, s2, sides[s].fnext, false, None);
            let kind = meet.angle_kind(s, s2);
            let pattern = match kind {
                AngleKind::Larger => params.miter_outer,
                AngleKind::Smaller => params.miter_inner,
                AngleKind::Straight => MiterPattern::Sharp,
            };
            match pattern {
                MiterPattern::Sharp => {
                    draft.push(BoundaryPoint::new(co, s, s2, SlotKind::Beveled { side: s2 }));
                }
                MiterPattern::Patch => {
                    let a = meet.offset_foot(s, true);
                    let b = meet.offset_foot(s2, false);
                    draft.push(BoundaryPoint::new(a, s, s, SlotKind::Face { side: s }));
                    draft.push(BoundaryPoint::new(co, s, s2, SlotKind::Face { side: s }));
                    draft.push(BoundaryPoint::new(b, s2, s2, SlotKind::Beveled { side: s2 }));
                }
                MiterPattern::Arc => {
                    let (a, b) = if kind == AngleKind::Larger {
                        (meet.offset_foot(s, true), meet.offset_foot(s2, false))
                    } else {
                        (
                            co + sides[s].dir * params.spread,
                            co + sides[s2].dir * params.spread,
                        )
                    };
                    let slot = SlotKind::Miter {
                        side: s,
                        middle: co,
                    };
                    draft.push(BoundaryPoint::new(a, s, s, slot));
                    draft.push(BoundaryPoint::new(b, s2, s2, SlotKind::Beveled { side: s2 }));
                }
            }
        } else if let Some(cut) = between.iter().position(|&b| sides[b].fnext.is_none()) {
            // The run crosses the border gap: one point on each border side.
            let (before, after) = between.split_at(cut + 1);
            let gap = between[cut];
            let resume = after.first().copied().unwrap_or(s2);
            let a = (sides[s].next == gap)
                .then(|| meet.offset_meet_edge(s, gap).0)
                .flatten()
                .unwrap_or_else(|| meet.slide_dist(gap, sides[s].offset_l));
            let b = (sides[resume].next == s2)
                .then(|| meet.offset_meet_edge(resume, s2).0)
                .flatten()
                .unwrap_or_else(|| meet.slide_dist(resume, sides[s2].offset_r));
            let mut pa = BoundaryPoint::new(a, s, gap, SlotKind::Face { side: gap });
            pa.eon = Some(gap);
            let ia = draft.push(pa);
            let mut pb = BoundaryPoint::new(b, resume, s2, SlotKind::Beveled { side: s2 });
            pb.eon = Some(resume);
            let ib = draft.push(pb);
            for &b in before {
                draft.left[b] = Some(ia);
                draft.right[b] = Some(ia);
            }
            for &b in after {
                draft.left[b] = Some(ib);
                draft.right[b] = Some(ib);
            }
        } else {
            let in_plane: Vec<usize> =
                between.iter().copied().filter(|&b| sides[b].in_plane).collect();
            let not_in_plane: Vec<usize> =
                between.iter().copied().filter(|&b| !sides[b].in_plane).collect();
            let e_in_plane = in_plane.first().copied();
            let mut bp = if not_in_plane.is_empty() {
                let co = meet.offset_meet(s, s2, sides[s].fnext, true, e_in_plane);
                BoundaryPoint::new(co, s, s2, SlotKind::Beveled { side: s2 })
            } else if params.loop_slide
                && not_in_plane.len() == 1
                && meet.good_offset_on_edge_between(s, s2, not_in_plane[0])
            {
                let emid = not_in_plane[0];
                let co = meet.offset_on_edge_between(s, s2, emid);
                let mut bp = BoundaryPoint::new(co, s, s2, SlotKind::Beveled { side: s2 });
                bp.eon = Some(emid);
                bp
            } else {
                let co = meet.offset_meet(s, s2, None, true, e_in_plane);
                BoundaryPoint::new(co, s, s2, SlotKind::Beveled { side: s2 })
            };
            if bp.eon.is_none() && between.len() == 1 {
                bp.eon = Some(between[0]);
            }
            let idx = draft.push(bp);
            for &b in &between {
                draft.left[b] = Some(idx);
                draft.right[b] = Some(idx);
            }
        }
        draft.left[s] = Some(first);
        draft.right[s2] = Some(draft.points.len() - 1);
    }
    draft
}

/// Ring of a corner where a single beveled edge ends: one point on every
/// other side.
fn terminal_ring(
    mesh: &Mesh,
    params: &BevelParams,
    corner: &CornerRecord,
    scale: f64,
) -> RingDraft {
    let meet = Meet::new(mesh, params, corner, scale);
    let sides = &corner.sides;
    let n = sides.len();
    let e = &sides[0];
    let mut draft = RingDraft::new(n);
    for k in 1..n {
        let co = if k == 1 {
            meet.offset_meet_edge(0, 1)
                .0
                .unwrap_or_else(|| meet.slide_dist(1, e.offset_l))
        } else if k == n - 1 {
            meet.offset_meet_edge(n - 1, 0)
                .0
                .unwrap_or_else(|| meet.slide_dist(n - 1, e.offset_r))
        } else {
            meet.slide_dist(k, e.offset_l)
        };
        let slot = if k == n - 1 {
            SlotKind::Beveled { side: 0 }
        } else {
            SlotKind::Face { side: k }
        };
        let mut bp = BoundaryPoint::new(co, k, k, slot);
        bp.eon = Some(k);
        let idx = draft.push(bp);
        draft.left[k] = Some(idx);
        draft.right[k] = Some(idx);
    }
    draft.left[0] = Some(0);
    draft.right[0] = Some(n - 2);
    draft
}

/// Ring of a vertex-only bevel: every side is cut at the same slide
/// distance.
fn vertex_ring(mesh: &Mesh, params: &BevelParams, corner: &CornerRecord, scale: f64) -> RingDraft {
    let meet = Meet::new(mesh, params, corner, scale);
    let n = corner.sides.len();
    let mut draft = RingDraft::new(n);
    for k in 0..n {
        let d = match params.offset_mode {
            OffsetMode::Percent => corner.vertex_offset * corner.sides[k].length / 100.0,
            _ => corner.vertex_offset,
        } * scale;
        let mut bp = BoundaryPoint::new(meet.slide_dist(k, d), k, k, SlotKind::Face { side: k });
        bp.eon = Some(k);
        let idx = draft.push(bp);
        draft.left[k] = Some(idx);
        draft.right[k] = Some(idx);
    }
    draft
}

/// Stores the achieved distances of the boundary points from each beveled
/// edge as the side's resolved offsets.
pub(crate) fn update_resolved_offsets(corner: &mut CornerRecord) {
    let co = corner.co;
    for i in 0..corner.sides.len() {
        let side = &corner.sides[i];
        if !side.beveled {
            continue;
        }
        let far = side.far;
        let dist = |p: Option<usize>| {
            p.and_then(|p| corner.points.get(p))
                .map_or(0.0, |bp| distance_to_line(&bp.co, &co, &far))
        };
        let (l, r) = (dist(side.left_point), dist(side.right_point));
        corner.sides[i].offset_l = l;
        corner.sides[i].offset_r = r;
    }
}

/// Places a profile on every slot of the ring, samples it, and fills the
/// slot polylines.
pub(crate) fn build_profiles(
    params: &BevelParams,
    corner: &mut CornerRecord,
    cache: &mut ProfileCache,
) {
    let kind = params.profile_kind();
    let seg = corner.seg;
    let terminal = !corner.vertex_only && corner.beveled_count == 1;
    let n = corner.points.len();
    if n == 0 {
        return;
    }
    for i in 0..n {
        let start = corner.points[i].co;
        let end = corner.points[(i + 1) % n].co;
        let mut pro = match corner.points[i].slot {
            SlotKind::Beveled { side } => {
                let s = &corner.sides[side];
                let middle = match line_line_intersect(&start, &end, &corner.co, &s.far) {
                    LineLineRelation::Point { point } => point,
                    LineLineRelation::Skew { on_b, .. } => on_b,
                    LineLineRelation::Parallel => corner.co,
                };
                let mut pro = ProfileCurve::new(kind, start, middle, end).with_projection(s.dir);
                if terminal {
                    pro.move_plane(&corner.co);
                }
                pro
            }
            SlotKind::Miter { middle, .. } => {
                ProfileCurve::new(ProfileKind::CIRCLE, start, middle, end)
            }
            SlotKind::Face { .. } if corner.vertex_only => {
                ProfileCurve::new(kind, start, corner.co, end)
            }
            SlotKind::Face { .. } => {
                ProfileCurve::new(ProfileKind::LINE, start, nalgebra::center(&start, &end), end)
            }
        };
        pro.evaluate(seg, cache);
        corner.points[i].profile = Some(pro);
    }

    corner.slot_polylines = corner
        .points
        .iter()
        .map(|bp| bp.profile.as_ref().map(|p| p.points().to_vec()).unwrap_or_default())
        .collect();
    if n == 2 {
        weld_two_point_ring(corner);
    }
    mark_runs(corner);
}

/// Makes both slots of a two-point ring trace the same curve in opposite
/// directions.
fn weld_two_point_ring(corner: &mut CornerRecord) {
    let beveled = |bp: &BoundaryPoint| matches!(bp.slot, SlotKind::Beveled { .. });
    let (b0, b1) = (beveled(&corner.points[0]), beveled(&corner.points[1]));
    let p0 = corner.slot_polylines[0].clone();
    let p1 = corner.slot_polylines[1].clone();
    if p0.len() != p1.len() {
        return;
    }
    let seg = p0.len() - 1;
    let welded: Vec<Point3> = match (b0, b1) {
        (true, true) => (0..=seg)
            .map(|k| nalgebra::center(&p0[k], &p1[seg - k]))
            .collect(),
        (false, true) => p1.iter().rev().copied().collect(),
        (true, false) | (false, false) => p0,
    };
    corner.slot_polylines[1] = welded.iter().rev().copied().collect();
    corner.slot_polylines[0] = welded;
}

/// For every point that ends a seam (or sharp) beveled slot, counts the
/// unmarked slots up to the next marked one. Corners with fewer than two
/// marked slots get no runs.
fn mark_runs(corner: &mut CornerRecord) {
    let n = corner.points.len();
    let marked = |corner: &CornerRecord, i: usize, pick: fn(&EdgeSide) -> bool| {
        match corner.points[i % n].slot {
            SlotKind::Beveled { side } => pick(&corner.sides[side]),
            _ => false,
        }
    };
    let run = |corner: &CornerRecord, start: usize, pick: fn(&EdgeSide) -> bool| {
        let count = (0..n).filter(|&i| marked(corner, i, pick)).count();
        if count < 2 || marked(corner, start, pick) || !marked(corner, start + n - 1, pick) {
            return 0;
        }
        (0..n).take_while(|&k| !marked(corner, start + k, pick)).count()
    };
    for i in 0..n {
        let seam = run(corner, i, |s| s.seam);
        let sharp = run(corner, i, |s| s.sharp);
        let bp = &mut corner.points[i];
        bp.seam_len = seam;
        bp.sharp_len = sharp;
    }
}
