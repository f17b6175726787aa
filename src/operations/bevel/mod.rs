//! Edge and vertex bevel.
//!
//! A bevel runs in stages over an [`OperationContext`]: the selection is
//! turned into corner records, each corner gets a ring of boundary points,
//! offsets are limited and relaxed, profiles and interior patches are
//! evaluated, and the result is staged as a [`BevelPlan`]. Only a fully
//! staged and validated plan touches the mesh.

mod adjust;
mod boundary;
mod context;
mod continuity;
mod limit;
mod materialize;
mod meet;
mod params;
mod patch;
mod profile;
mod rep_face;
mod ring;

pub use context::{FaceKind, OperationContext, SideRef};
pub use continuity::ContinuityMap;
pub use materialize::{BevelOutcome, BevelPlan, RebuiltFace, StagedFace, VertRef};
pub use params::{
    fullness_to_exponent, AffectMode, BevelParams, CustomProfile, MiterPattern, OffsetMode,
    ProfileShape, VmeshMethod,
};
pub use patch::InteriorPatch;
pub use profile::{ProfileCache, ProfileCurve, ProfileKind, ProfileSpacing};
pub use rep_face::choose_rep_face;
pub use ring::{BoundaryPoint, CornerRecord, DegradeReason, EdgeSide, SlotKind};

use crate::error::Result;
use crate::mesh::Mesh;

use boundary::build_profiles;
use patch::build_patch;

/// Bevels the selected edges or vertices of a mesh.
///
/// Selected edges (or vertices, with [`AffectMode::Vertices`]) are replaced
/// by strips of faces following the configured profile, and every affected
/// vertex by a patch filling the gap between the strips.
#[derive(Debug, Clone)]
pub struct Bevel {
    params: BevelParams,
}

impl Bevel {
    /// Creates a new `Bevel` operation.
    #[must_use]
    pub fn new(params: BevelParams) -> Self {
        Self { params }
    }

    /// Computes the bevel without modifying the mesh.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid parameters, and an
    /// operation error if the result would not be a valid mesh.
    pub fn plan(&self, mesh: &Mesh) -> Result<BevelPlan> {
        self.params.validate()?;
        let span = tracing::info_span!(
            "bevel",
            offset = self.params.offset,
            segments = self.params.segments,
            affect = ?self.params.affect,
        );
        let _guard = span.enter();

        let mut ctx = OperationContext::new(self.params.clone());
        ctx.discover(mesh)?;
        tracing::debug!(
            corners = ctx.corners.len(),
            edges = ctx.beveled_edges.len(),
            degraded = ctx.degraded.len(),
            "selection resolved"
        );
        if ctx.corners.is_empty() {
            return materialize::stage(ctx, mesh);
        }

        ctx.build_rings(mesh)?;
        ctx.relax_offsets();
        ctx.clamp_to_midpoints();

        let params = ctx.params.clone();
        for corner in &mut ctx.corners {
            build_profiles(&params, corner, &mut ctx.profiles);
            corner.patch = build_patch(&params, corner, &mut ctx.profiles);
        }

        if mesh.has_uv_layer() && params.segments % 2 == 1 {
            ctx.continuity = Some(ContinuityMap::build(mesh)?);
        }
        materialize::stage(ctx, mesh)
    }

    /// Applies the bevel to `mesh`.
    ///
    /// The result is planned and validated against the untouched mesh
    /// before anything is written. A validated plan cannot fail to commit
    /// on the mesh it was planned from, so an error always leaves the mesh
    /// as it was.
    ///
    /// # Errors
    ///
    /// See [`Bevel::plan`].
    pub fn execute(&self, mesh: &mut Mesh) -> Result<BevelOutcome> {
        let plan = self.plan(mesh)?;
        if plan.is_empty() {
            let degraded = plan.context().degraded().to_vec();
            return Ok(BevelOutcome {
                degraded,
                offset_scale: plan.context().offset_scale(),
                ..BevelOutcome::default()
            });
        }
        plan.commit(mesh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, KernelError};
    use crate::math::intersect_3d::distance_to_line;
    use crate::math::{Point2, Point3};
    use crate::mesh::{EdgeFlags, EdgeId, FaceData, VertexData, VertexId};
    use crate::operations::creation::{BoxGrid, MakeBox};
    use crate::operations::query::IsManifold;
    use approx::assert_relative_eq;
    use std::collections::{HashMap, HashSet};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn cube(size: f64) -> (Mesh, BoxGrid) {
        let mut mesh = Mesh::new();
        let g = MakeBox::new(p(0.0, 0.0, 0.0), p(size, size, size))
            .execute(&mut mesh)
            .unwrap();
        (mesh, g)
    }

    fn select(mesh: &mut Mesh, a: VertexId, b: VertexId) -> EdgeId {
        let e = mesh.find_edge(a, b).unwrap();
        mesh.edge_mut(e).unwrap().flags.selected = true;
        e
    }

    fn select_all_edges(mesh: &mut Mesh) {
        let ids: Vec<_> = mesh.edge_ids().collect();
        for e in ids {
            mesh.edge_mut(e).unwrap().flags.selected = true;
        }
    }

    fn count_kind(outcome: &BevelOutcome, kind: FaceKind) -> usize {
        outcome.face_kinds.values().filter(|k| **k == kind).count()
    }

    fn manifold(mesh: &Mesh) -> bool {
        IsManifold::new().execute(mesh).unwrap()
    }

    fn euler(mesh: &Mesh) -> i64 {
        let count = |n: usize| i64::try_from(n).unwrap();
        count(mesh.vertex_count()) - count(mesh.edge_count()) + count(mesh.face_count())
    }

    /// Flat `n` x `n` grid of unit quads facing +Z; `at[i][j]` sits at (i, j).
    fn plane_grid(n: usize) -> (Mesh, Vec<Vec<VertexId>>) {
        let mut mesh = Mesh::new();
        let mut at = Vec::new();
        for i in 0..=n {
            let mut column = Vec::new();
            for j in 0..=n {
                column.push(mesh.add_vertex(VertexData::new(p(i as f64, j as f64, 0.0))));
            }
            at.push(column);
        }
        for i in 0..n {
            for j in 0..n {
                let quad = vec![at[i][j], at[i + 1][j], at[i + 1][j + 1], at[i][j + 1]];
                mesh.add_face(FaceData::new(quad)).unwrap();
            }
        }
        (mesh, at)
    }

    /// L-shaped prism of height 1. Returns the top outline; its fourth
    /// vertex (1, 1, 1) is the reflex corner.
    fn l_prism() -> (Mesh, Vec<VertexId>) {
        let outline = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)];
        let mut mesh = Mesh::new();
        let bottom: Vec<VertexId> = outline
            .iter()
            .map(|&(x, y)| mesh.add_vertex(VertexData::new(p(x, y, 0.0))))
            .collect();
        let top: Vec<VertexId> = outline
            .iter()
            .map(|&(x, y)| mesh.add_vertex(VertexData::new(p(x, y, 1.0))))
            .collect();
        let floor: Vec<VertexId> = bottom.iter().rev().copied().collect();
        mesh.add_face(FaceData::new(floor)).unwrap();
        mesh.add_face(FaceData::new(top.clone())).unwrap();
        for i in 0..6 {
            let j = (i + 1) % 6;
            let wall = vec![bottom[i], bottom[j], top[j], top[i]];
            mesh.add_face(FaceData::new(wall)).unwrap();
        }
        (mesh, top)
    }

    /// Three triangles fanned over the upper half of a unit disk. Returns the
    /// hub and the rim from (1, 0, 0) round to (-1, 0, 0).
    fn half_fan() -> (Mesh, VertexId, Vec<VertexId>) {
        let s = 0.5_f64.sqrt();
        let mut mesh = Mesh::new();
        let hub = mesh.add_vertex(VertexData::new(p(0.0, 0.0, 0.0)));
        let rim: Vec<VertexId> = [p(1.0, 0.0, 0.0), p(s, s, 0.0), p(-s, s, 0.0), p(-1.0, 0.0, 0.0)]
            .into_iter()
            .map(|q| mesh.add_vertex(VertexData::new(q)))
            .collect();
        for w in rim.windows(2) {
            mesh.add_face(FaceData::new(vec![hub, w[0], w[1]])).unwrap();
        }
        (mesh, hub, rim)
    }

    fn open_manifold(mesh: &Mesh) -> bool {
        IsManifold::new().allow_boundary().execute(mesh).unwrap()
    }

    fn count_flagged(mesh: &Mesh, pick: impl Fn(&EdgeFlags) -> bool) -> usize {
        mesh.edge_ids()
            .filter(|&e| pick(&mesh.edge(e).unwrap().flags))
            .count()
    }

    /// Largest UV disagreement at a new vertex that only new faces use.
    fn interior_uv_spread(mesh: &Mesh, outcome: &BevelOutcome) -> f64 {
        let mut uvs: HashMap<VertexId, Vec<Point2>> = HashMap::new();
        let mut on_recon = HashSet::new();
        for (&f, &kind) in &outcome.face_kinds {
            let face = mesh.face(f).unwrap();
            for (i, &v) in face.vertices.iter().enumerate() {
                if kind == FaceKind::Recon {
                    on_recon.insert(v);
                } else {
                    uvs.entry(v).or_default().push(face.uvs[i]);
                }
            }
        }
        uvs.iter()
            .filter(|(v, _)| !on_recon.contains(*v))
            .flat_map(|(_, list)| list.iter().map(move |uv| (*uv - list[0]).norm()))
            .fold(0.0, f64::max)
    }

    // ── vertex bevels ──

    #[test]
    fn vertex_bevel_cuts_cube_corner_with_one_triangle() {
        init_tracing();
        let (mut mesh, g) = cube(4.0);
        let o = g.at(0, 0, 0);
        mesh.vertex_mut(o).unwrap().selected = true;
        let params = BevelParams::new(1.0).with_affect(AffectMode::Vertices);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();

        assert_eq!(mesh.vertex_count(), 10);
        assert_eq!(mesh.face_count(), 7);
        assert_eq!(outcome.new_faces.len(), 1);
        assert_eq!(count_kind(&outcome, FaceKind::Recon), 3);
        let tri = mesh.face(outcome.new_faces[0]).unwrap();
        assert_eq!(tri.len(), 3);
        let pts = mesh.face_points(outcome.new_faces[0]).unwrap();
        for q in &pts {
            assert_relative_eq!(q.coords.norm(), 1.0, epsilon = 1e-9);
        }
        // The cap faces away from the removed corner.
        let n = mesh.face_normal(outcome.new_faces[0]).unwrap();
        assert!(n.x < 0.0 && n.y < 0.0 && n.z < 0.0);
        assert!(mesh.vertex(o).is_err());
        assert!(manifold(&mesh));
    }

    #[test]
    fn four_segment_vertex_bevel_fills_with_rings() {
        let (mut mesh, g) = cube(4.0);
        let o = g.at(0, 0, 0);
        mesh.vertex_mut(o).unwrap().selected = true;
        let params = BevelParams::new(1.0)
            .with_affect(AffectMode::Vertices)
            .with_segments(4);
        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        let corner = plan.context().corner(o).unwrap();
        assert!(matches!(corner.patch, InteriorPatch::Adjacent { .. }));
        assert_eq!(corner.patch.ring_count(), 3);
        for bp in &corner.points {
            assert_relative_eq!((bp.co - corner.co).norm(), 1.0, epsilon = 1e-9);
        }

        Bevel::new(params).execute(&mut mesh).unwrap();
        assert!(manifold(&mesh));
    }

    // ── edge bevels ──

    #[test]
    fn single_edge_chamfer_adds_one_quad() {
        let (mut mesh, g) = cube(4.0);
        select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        let outcome = Bevel::new(BevelParams::new(0.5)).execute(&mut mesh).unwrap();

        assert_eq!(mesh.vertex_count(), 10);
        assert_eq!(mesh.face_count(), 7);
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 1);
        assert_eq!(count_kind(&outcome, FaceKind::Vert), 0);
        assert!(manifold(&mesh));
        assert_eq!(mesh.tags().faces.len(), 1);
        assert_eq!(mesh.tags().vertices.len(), 4);
    }

    #[test]
    fn four_segment_corner_has_three_rings() {
        init_tracing();
        let (mut mesh, g) = cube(4.0);
        select_all_edges(&mut mesh);
        let params = BevelParams::new(0.5).with_segments(4);
        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        let corner = plan.context().corner(g.at(0, 0, 0)).unwrap();
        assert_eq!(corner.ring_len(), 3);
        assert_eq!(corner.patch.ring_count(), 3);

        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert_eq!(count_kind(&outcome, FaceKind::Recon), 6);
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 12 * 4);
        assert_eq!(count_kind(&outcome, FaceKind::Vert), 8 * 12);
        assert_eq!(mesh.vertex_count(), 8 * 19);
        assert!(manifold(&mesh));
        assert_eq!(euler(&mesh), 2);
    }

    #[test]
    fn rounded_cube_stays_within_the_original_box() {
        let (mut mesh, _) = cube(2.0);
        select_all_edges(&mut mesh);
        Bevel::new(BevelParams::new(0.4).with_segments(3))
            .execute(&mut mesh)
            .unwrap();
        for v in mesh.vertex_ids() {
            let q = mesh.point(v).unwrap();
            for c in q.iter() {
                assert!((-1e-9..=2.0 + 1e-9).contains(c));
            }
        }
        assert!(manifold(&mesh));
    }

    #[test]
    fn cutoff_corners_get_caps_and_a_center_polygon() {
        let (mut mesh, _) = cube(4.0);
        select_all_edges(&mut mesh);
        let params = BevelParams::new(0.5)
            .with_segments(2)
            .with_vmesh_method(VmeshMethod::Cutoff);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        // Three caps and one center triangle per corner.
        assert_eq!(count_kind(&outcome, FaceKind::Vert), 8 * 4);
        assert!(manifold(&mesh));
    }

    #[test]
    fn collinear_edges_pass_through_without_a_patch() {
        let mut mesh = Mesh::new();
        let g = MakeBox::new(p(0.0, 0.0, 0.0), p(4.0, 4.0, 4.0))
            .with_divisions(2)
            .execute(&mut mesh)
            .unwrap();
        let mid = g.at(1, 0, 0);
        select(&mut mesh, g.at(0, 0, 0), mid);
        select(&mut mesh, mid, g.at(2, 0, 0));
        let params = BevelParams::new(0.5).with_segments(2);

        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        let corner = plan.context().corner(mid).unwrap();
        assert_eq!(corner.ring_len(), 2);
        assert!(matches!(corner.patch, InteriorPatch::None));
        for bp in &corner.points {
            assert_relative_eq!(bp.co.x, 2.0, epsilon = 1e-9);
        }

        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 2 * 2);
        assert!(manifold(&mesh));
    }

    #[test]
    fn limited_offsets_stop_at_edge_midpoints() {
        let (mut mesh, g) = cube(1.0);
        select_all_edges(&mut mesh);
        let params = BevelParams::new(0.8).with_limit_offset(true);
        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        assert!(plan.context().offset_scale() < 1.0);
        let corner = plan.context().corner(g.at(0, 0, 0)).unwrap();
        for bp in &corner.points {
            assert!((bp.co - corner.co).norm() <= 0.5 * 2.0_f64.sqrt() + 1e-9);
        }
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert!(outcome.offset_scale < 1.0);
        assert!(manifold(&mesh));
    }

    #[test]
    fn odd_segment_middle_faces_pick_the_same_face_every_time() {
        let build = || {
            let mut mesh = Mesh::new();
            let g = MakeBox::new(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0))
                .with_uvs()
                .execute(&mut mesh)
                .unwrap();
            let fs: Vec<_> = mesh.face_ids().collect();
            for (i, f) in fs.into_iter().enumerate() {
                mesh.face_mut(f).unwrap().material = u16::try_from(i).unwrap();
            }
            select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
            let outcome = Bevel::new(BevelParams::new(0.3).with_segments(3))
                .execute(&mut mesh)
                .unwrap();
            let mut mats: Vec<(i64, u16)> = outcome
                .new_faces
                .iter()
                .filter(|f| outcome.face_kinds[*f] == FaceKind::Edge)
                .map(|&f| {
                    let c = mesh.face_center_bounds(f).unwrap();
                    let key = (c.y * 1e6).round() as i64 - (c.z * 1e6).round() as i64;
                    (key, mesh.face(f).unwrap().material)
                })
                .collect();
            mats.sort_unstable();
            mats
        };
        let first = build();
        assert_eq!(first.len(), 3);
        assert_eq!(first, build());
        // Outer faces follow the face they border.
        assert_ne!(first[0].1, first[2].1);
    }

    #[test]
    fn loop_slide_keeps_the_corner_point_on_the_unbeveled_edge() {
        let (mut mesh, g) = cube(4.0);
        let o = g.at(0, 0, 0);
        select(&mut mesh, o, g.at(1, 0, 0));
        select(&mut mesh, o, g.at(0, 1, 0));
        let on_z_edge = |params: BevelParams| {
            let plan = Bevel::new(params).plan(&mesh).unwrap();
            let corner = plan.context().corner(o).unwrap();
            let slid: Vec<Point3> = corner
                .points
                .iter()
                .filter(|bp| bp.eon.is_some_and(|k| corner.sides[k].other == g.at(0, 0, 1)))
                .map(|bp| bp.co)
                .collect();
            assert_eq!(slid.len(), 1);
            slid[0]
        };

        let q = on_z_edge(BevelParams::new(0.5));
        assert_relative_eq!(q, p(0.0, 0.0, 0.5), epsilon = 1e-9);
        let q = on_z_edge(BevelParams::new(25.0).with_offset_mode(OffsetMode::Percent));
        assert_relative_eq!(q, p(0.0, 0.0, 1.0), epsilon = 1e-9);

        Bevel::new(BevelParams::new(0.5).with_segments(2))
            .execute(&mut mesh)
            .unwrap();
        assert!(manifold(&mesh));
    }

    #[test]
    fn depth_mode_sets_the_distance_from_edge_to_new_face() {
        let (mut mesh, g) = cube(4.0);
        let (a, b) = (g.at(0, 0, 0), g.at(1, 0, 0));
        select(&mut mesh, a, b);
        let params = BevelParams::new(0.5).with_offset_mode(OffsetMode::Depth);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 1);
        let strip = outcome.new_faces[0];
        let pts = mesh.face_points(strip).unwrap();
        let center = nalgebra::center(&pts[0], &pts[2]);
        assert_relative_eq!(
            distance_to_line(&center, &p(0.0, 0.0, 0.0), &p(4.0, 0.0, 0.0)),
            0.5,
            epsilon = 1e-9
        );
        assert!(manifold(&mesh));
    }

    #[test]
    fn absolute_mode_slides_the_exact_offset_along_neighbor_edges() {
        let (mut mesh, c, rim) = half_fan();
        select(&mut mesh, c, rim[1]);
        let on_x_axis = |params: BevelParams| {
            let plan = Bevel::new(params).plan(&mesh).unwrap();
            let corner = plan.context().corner(c).unwrap();
            let xs: Vec<f64> = corner
                .points
                .iter()
                .filter(|bp| bp.co.y.abs() < 1e-9 && bp.co.x > 0.0)
                .map(|bp| bp.co.x)
                .collect();
            assert_eq!(xs.len(), 1);
            xs[0]
        };
        // The neighbor edge leaves at 45 degrees.
        let x = on_x_axis(BevelParams::new(0.1));
        assert_relative_eq!(x, 0.1 * 2.0_f64.sqrt(), epsilon = 1e-9);
        let x = on_x_axis(BevelParams::new(0.1).with_offset_mode(OffsetMode::Absolute));
        assert_relative_eq!(x, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn custom_profile_is_traced_across_the_strip() {
        let (mut mesh, g) = cube(4.0);
        select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        let step = CustomProfile::new(vec![
            Point2::new(0.0, 1.0),
            Point2::new(0.0, 0.5),
            Point2::new(0.5, 0.5),
            Point2::new(0.5, 0.0),
            Point2::new(1.0, 0.0),
        ]);
        let params = BevelParams::new(0.5)
            .with_segments(4)
            .with_custom_profile(step);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 4);
        let new_points: Vec<Point3> = outcome
            .new_vertices
            .iter()
            .map(|&v| mesh.point(v).unwrap())
            .collect();
        for expected in [p(0.0, 0.5, 0.25), p(0.0, 0.25, 0.25), p(0.0, 0.25, 0.5)] {
            assert!(
                new_points.iter().any(|q| (q - expected).norm() < 1e-6),
                "no step vertex at {expected:?}"
            );
        }
        assert!(manifold(&mesh));
    }

    // ── miters ──

    #[test]
    fn patch_miter_fills_the_reflex_corner() {
        let (mut mesh, top) = l_prism();
        let reflex = top[3];
        select(&mut mesh, top[2], reflex);
        select(&mut mesh, reflex, top[4]);
        let params =
            BevelParams::new(0.25).with_miters(MiterPattern::Patch, MiterPattern::Sharp);

        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        let corner = plan.context().corner(reflex).unwrap();
        assert_eq!(corner.ring_len(), 4);
        for expected in [
            p(0.75, 0.75, 1.0),
            p(0.75, 1.0, 1.0),
            p(1.0, 0.75, 1.0),
            p(1.0, 1.0, 0.75),
        ] {
            assert!(corner.points.iter().any(|bp| (bp.co - expected).norm() < 1e-9));
        }

        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 2);
        assert!(manifold(&mesh));
        assert_eq!(euler(&mesh), 2);
    }

    #[test]
    fn arc_miter_rounds_the_reflex_corner() {
        let (mut mesh, top) = l_prism();
        let reflex = top[3];
        select(&mut mesh, top[2], reflex);
        select(&mut mesh, reflex, top[4]);
        let params = BevelParams::new(0.25)
            .with_segments(2)
            .with_miters(MiterPattern::Arc, MiterPattern::Sharp);

        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        let corner = plan.context().corner(reflex).unwrap();
        assert_eq!(corner.ring_len(), 3);
        let miter = corner
            .points
            .iter()
            .position(|bp| matches!(bp.slot, SlotKind::Miter { .. }))
            .unwrap();
        let arc = &corner.slot_polylines[miter];
        assert_eq!(arc.len(), 3);
        for q in arc {
            assert_relative_eq!((q - corner.co).norm(), 0.25, epsilon = 1e-6);
        }

        Bevel::new(params).execute(&mut mesh).unwrap();
        assert!(manifold(&mesh));
        assert_eq!(euler(&mesh), 2);
    }

    // ── open meshes ──

    #[test]
    fn interior_edge_of_open_grid_bevels_out_to_the_border() {
        init_tracing();
        let (mut mesh, at) = plane_grid(2);
        select(&mut mesh, at[1][1], at[1][0]);
        let outcome = Bevel::new(BevelParams::new(0.2)).execute(&mut mesh).unwrap();

        assert!(outcome.degraded.is_empty());
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 1);
        assert_eq!(count_kind(&outcome, FaceKind::Vert), 1);
        assert_eq!(count_kind(&outcome, FaceKind::Recon), 4);
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertex_count(), 12);
        let mut on_border: Vec<f64> = outcome
            .new_vertices
            .iter()
            .map(|&v| mesh.point(v).unwrap())
            .filter(|q| q.y.abs() < 1e-9)
            .map(|q| q.x)
            .collect();
        on_border.sort_by(f64::total_cmp);
        assert_eq!(on_border.len(), 2);
        assert_relative_eq!(on_border[0], 0.8, epsilon = 1e-9);
        assert_relative_eq!(on_border[1], 1.2, epsilon = 1e-9);
        assert!(open_manifold(&mesh));
        assert_eq!(euler(&mesh), 1);
    }

    #[test]
    fn border_vertex_bevel_caps_with_one_triangle() {
        let (mut mesh, at) = plane_grid(2);
        let v = at[1][0];
        mesh.vertex_mut(v).unwrap().selected = true;
        let params = BevelParams::new(0.25).with_affect(AffectMode::Vertices);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();

        assert!(outcome.degraded.is_empty());
        assert_eq!(outcome.new_faces.len(), 1);
        assert_eq!(mesh.face(outcome.new_faces[0]).unwrap().len(), 3);
        for q in mesh.face_points(outcome.new_faces[0]).unwrap() {
            assert_relative_eq!((q - p(1.0, 0.0, 0.0)).norm(), 0.25, epsilon = 1e-9);
        }
        assert_eq!(mesh.face_count(), 5);
        assert_eq!(mesh.vertex_count(), 11);
        assert!(open_manifold(&mesh));
        assert_eq!(euler(&mesh), 1);
    }

    #[test]
    fn grid_corner_vertex_bevel_clips_its_only_face() {
        let (mut mesh, at) = plane_grid(2);
        mesh.vertex_mut(at[0][0]).unwrap().selected = true;
        let params = BevelParams::new(0.25).with_affect(AffectMode::Vertices);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();

        assert!(outcome.degraded.is_empty());
        assert!(outcome.new_faces.is_empty());
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.vertex_count(), 10);
        let clipped: Vec<_> = outcome
            .face_kinds
            .iter()
            .filter(|(_, k)| **k == FaceKind::Recon)
            .map(|(f, _)| *f)
            .collect();
        assert_eq!(clipped.len(), 1);
        assert_eq!(mesh.face(clipped[0]).unwrap().len(), 5);
        assert!(open_manifold(&mesh));
    }

    #[test]
    fn run_across_the_border_gap_lands_on_both_border_edges() {
        let (mut mesh, c, rim) = half_fan();
        select(&mut mesh, c, rim[1]);
        select(&mut mesh, c, rim[2]);
        let params = BevelParams::new(0.1);

        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        let corner = plan.context().corner(c).unwrap();
        assert!(corner.is_open());
        assert_eq!(corner.ring_len(), 3);

        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert!(outcome.degraded.is_empty());
        assert_eq!(count_kind(&outcome, FaceKind::Edge), 2);
        assert_eq!(count_kind(&outcome, FaceKind::Vert), 1);
        let mut on_border: Vec<f64> = outcome
            .new_vertices
            .iter()
            .map(|&v| mesh.point(v).unwrap())
            .filter(|q| q.y.abs() < 1e-9)
            .map(|q| q.x)
            .collect();
        on_border.sort_by(f64::total_cmp);
        // Both border edges leave the beveled ones at 45 degrees.
        let d = 0.1 * 2.0_f64.sqrt();
        assert_eq!(on_border.len(), 2);
        assert_relative_eq!(on_border[0], -d, epsilon = 1e-9);
        assert_relative_eq!(on_border[1], d, epsilon = 1e-9);
        assert!(open_manifold(&mesh));
        assert_eq!(euler(&mesh), 1);
    }

    // ── attributes and flags ──

    #[test]
    fn material_override_applies_to_new_faces_only() {
        let (mut mesh, g) = cube(4.0);
        select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        let params = BevelParams::new(0.5).with_material(7);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        for f in &outcome.new_faces {
            assert_eq!(mesh.face(*f).unwrap().material, 7);
        }
        let recon = outcome
            .face_kinds
            .iter()
            .find(|(_, k)| **k == FaceKind::Recon)
            .map(|(f, _)| *f)
            .unwrap();
        assert_eq!(mesh.face(recon).unwrap().material, 0);
    }

    #[test]
    fn seam_marks_carry_onto_strip_borders() {
        let (mut mesh, g) = cube(4.0);
        let e = select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        mesh.edge_mut(e).unwrap().flags.seam = true;
        let params = BevelParams::new(0.5).with_segments(2).with_mark_seam(true);
        Bevel::new(params).execute(&mut mesh).unwrap();
        let seams = mesh
            .edge_ids()
            .filter(|&e| mesh.edge(e).unwrap().flags.seam)
            .count();
        assert_eq!(seams, 2);
    }

    #[test]
    fn hardened_normals_fill_every_corner() {
        let (mut mesh, g) = cube(4.0);
        select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        let params = BevelParams::new(0.5).with_segments(3).with_harden_normals(true);
        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        for f in outcome.face_kinds.keys() {
            let face = mesh.face(*f).unwrap();
            assert_eq!(face.normals.len(), face.len());
            for n in &face.normals {
                assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn sharp_marks_continue_around_the_corner() {
        let (mut mesh, g) = cube(4.0);
        let o = g.at(0, 0, 0);
        let ex = select(&mut mesh, o, g.at(1, 0, 0));
        let ey = select(&mut mesh, o, g.at(0, 1, 0));
        select(&mut mesh, o, g.at(0, 0, 1));
        for e in [ex, ey] {
            mesh.edge_mut(e).unwrap().flags.sharp = true;
        }
        let params = BevelParams::new(0.5).with_segments(2).with_mark_sharp(true);
        Bevel::new(params).execute(&mut mesh).unwrap();
        // Two strip borders per sharp edge, plus the profile of the unmarked
        // strip end that bridges them at the corner.
        assert_eq!(count_flagged(&mesh, |f| f.sharp), 2 * 2 + 2);
        assert_eq!(count_flagged(&mesh, |f| f.seam), 0);
    }

    #[test]
    fn sharp_marks_are_dropped_unless_requested() {
        let (mut mesh, g) = cube(4.0);
        let e = select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        mesh.edge_mut(e).unwrap().flags.sharp = true;
        Bevel::new(BevelParams::new(0.5).with_segments(2))
            .execute(&mut mesh)
            .unwrap();
        assert_eq!(count_flagged(&mesh, |f| f.sharp), 0);
    }

    #[test]
    fn vertex_weight_map_scales_each_corner() {
        let (mut mesh, g) = cube(4.0);
        let (half, skipped, full) = (g.at(0, 0, 0), g.at(1, 0, 0), g.at(1, 1, 1));
        for v in [half, skipped, full] {
            mesh.vertex_mut(v).unwrap().selected = true;
        }
        let weights = HashMap::from([(half, 0.5), (skipped, 0.0)]);
        let params = BevelParams::new(1.0)
            .with_affect(AffectMode::Vertices)
            .with_vertex_weights(weights);

        let plan = Bevel::new(params.clone()).plan(&mesh).unwrap();
        assert!(plan.context().corner(skipped).is_none());
        for (v, dist) in [(half, 0.5), (full, 1.0)] {
            let corner = plan.context().corner(v).unwrap();
            for bp in &corner.points {
                assert_relative_eq!((bp.co - corner.co).norm(), dist, epsilon = 1e-9);
            }
        }

        let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
        assert_eq!(outcome.new_faces.len(), 2);
        assert!(mesh.vertex(skipped).is_ok());
        assert!(manifold(&mesh));
    }

    #[test]
    fn wire_edge_follows_the_nearest_ring_point() {
        let (mut mesh, g) = cube(4.0);
        let o = g.at(0, 0, 0);
        let tip = mesh.add_vertex(VertexData::new(p(-1.0, 2.0, -1.0)));
        let wire = mesh.ensure_edge(o, tip).unwrap();
        mesh.edge_mut(wire).unwrap().flags.sharp = true;
        mesh.vertex_mut(o).unwrap().selected = true;
        let params = BevelParams::new(1.0).with_affect(AffectMode::Vertices);
        Bevel::new(params).execute(&mut mesh).unwrap();

        let edges = mesh.vertex(tip).unwrap().edges().to_vec();
        assert_eq!(edges.len(), 1);
        let edge = mesh.edge(edges[0]).unwrap();
        assert!(edge.is_wire());
        assert!(edge.flags.sharp);
        let end = mesh.point(edge.other(tip).unwrap()).unwrap();
        assert_relative_eq!(end, p(0.0, 1.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn corner_uvs_are_averaged_inside_the_patch() {
        let build = |seam: bool| {
            let mut mesh = Mesh::new();
            let g = MakeBox::new(p(0.0, 0.0, 0.0), p(4.0, 2.0, 1.0))
                .with_uvs()
                .execute(&mut mesh)
                .unwrap();
            let o = g.at(0, 0, 0);
            mesh.vertex_mut(o).unwrap().selected = true;
            if seam {
                let e = mesh.find_edge(o, g.at(1, 0, 0)).unwrap();
                mesh.edge_mut(e).unwrap().flags.seam = true;
            }
            let params = BevelParams::new(0.4)
                .with_affect(AffectMode::Vertices)
                .with_segments(4);
            let outcome = Bevel::new(params).execute(&mut mesh).unwrap();
            interior_uv_spread(&mesh, &outcome)
        };
        assert!(build(false) < 1e-12);
        // A seam at the corner keeps each face's own UVs.
        assert!(build(true) > 1e-4);
    }

    // ── failure and no-op paths ──

    #[test]
    fn invalid_parameters_leave_the_mesh_untouched() {
        let (mut mesh, g) = cube(4.0);
        select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        let err = Bevel::new(BevelParams::new(0.5).with_segments(0))
            .execute(&mut mesh)
            .unwrap_err();
        assert!(matches!(err, KernelError::Config(ConfigError::InvalidSegments(0))));
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 6);
    }

    #[test]
    fn zero_offset_changes_nothing() {
        let (mut mesh, g) = cube(4.0);
        select(&mut mesh, g.at(0, 0, 0), g.at(1, 0, 0));
        let outcome = Bevel::new(BevelParams::new(0.0)).execute(&mut mesh).unwrap();
        assert!(outcome.new_faces.is_empty());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 6);
    }

    #[test]
    fn empty_selection_plans_nothing() {
        let (mesh, _) = cube(4.0);
        let plan = Bevel::new(BevelParams::new(0.5)).plan(&mesh).unwrap();
        assert!(plan.is_empty());
        assert!(plan.faces().is_empty());
        assert!(plan.new_points().is_empty());
    }
}
