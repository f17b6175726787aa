//! Interior patches filling the boundary ring of a corner.

use crate::math::{try_normalize, Point3};

use super::params::{BevelParams, VmeshMethod};
use super::profile::ProfileCache;
use super::ring::CornerRecord;

/// Geometry filling a corner ring, one variant per construction.
#[derive(Debug, Clone, Default)]
pub enum InteriorPatch {
    /// Nothing to fill; the ring points join the neighbouring faces
    /// directly.
    #[default]
    None,
    /// One n-gon through every ring polyline point.
    Poly,
    /// Triangles from every ring segment to a center point.
    TriFan { center: Point3 },
    /// Concentric rings shrinking toward the center.
    ///
    /// `rings[j]` holds `ns - 2j` points per slot, slot after slot; ring 0 is
    /// the boundary itself. An even `ns` closes with the center point, an
    /// odd one with a small n-gon (the last ring).
    Adjacent {
        ns: usize,
        rings: Vec<Vec<Point3>>,
        center: Option<Point3>,
    },
    /// One cap per slot dropping to a bottom point under each boundary
    /// point, and an n-gon joining the bottoms.
    Cutoff { bottoms: Vec<Point3> },
}

impl InteriorPatch {
    /// Number of concentric rings, counting the closing center point as one.
    #[must_use]
    pub fn ring_count(&self) -> usize {
        match self {
            Self::Adjacent { rings, center, .. } => rings.len() + usize::from(center.is_some()),
            Self::None => 0,
            Self::Poly | Self::Cutoff { .. } => 1,
            Self::TriFan { .. } => 2,
        }
    }

    /// Grid point `k` of slot `i` on ring `j` of an adjacent patch.
    ///
    /// Indices wrap around the ring; the ring past the last one is the
    /// center.
    #[must_use]
    pub fn point(&self, i: usize, j: usize, k: usize) -> Option<Point3> {
        let Self::Adjacent { ns, rings, center } = self else {
            return None;
        };
        match rings.get(j) {
            Some(ring) => {
                let m = ns.checked_sub(2 * j)?;
                if ring.is_empty() || m == 0 {
                    return None;
                }
                Some(ring[(i * m + k) % ring.len()])
            }
            None if j == rings.len() => *center,
            None => None,
        }
    }
}

/// Picks and builds the patch for a corner whose profiles are evaluated.
pub(crate) fn build_patch(
    params: &BevelParams,
    corner: &CornerRecord,
    cache: &mut ProfileCache,
) -> InteriorPatch {
    let n = corner.ring_len();
    if n < 3 {
        return InteriorPatch::None;
    }
    if corner.seg == 1 {
        return InteriorPatch::Poly;
    }
    let terminal = !corner.vertex_only && corner.beveled_count == 1;
    if terminal {
        return if n == 3 {
            InteriorPatch::TriFan {
                center: patch_center(params, corner, cache),
            }
        } else {
            InteriorPatch::Poly
        };
    }
    if params.vmesh_method == VmeshMethod::Cutoff && !corner.vertex_only {
        return InteriorPatch::Cutoff {
            bottoms: cutoff_bottoms(corner),
        };
    }
    let center = patch_center(params, corner, cache);
    InteriorPatch::Adjacent {
        ns: corner.seg,
        rings: adjacent_rings(corner, &center),
        center: (corner.seg % 2 == 0).then_some(center),
    }
}

/// The ring centroid pulled toward the original vertex by the profile's
/// fullness.
fn patch_center(params: &BevelParams, corner: &CornerRecord, cache: &mut ProfileCache) -> Point3 {
    let fullness = cache.spacing(corner.seg, params.profile_kind()).fullness;
    let mean = corner.boundary_centroid();
    mean + (corner.co - mean) * fullness
}

/// Point at arc-length fraction `t` along slot `i`.
fn slot_at(corner: &CornerRecord, i: usize, t: f64) -> Point3 {
    let n = corner.ring_len();
    let i = i % n;
    match &corner.points[i].profile {
        Some(pro) => pro.sample(t),
        None => {
            let a = corner.points[i].co;
            let b = corner.points[(i + 1) % n].co;
            a + (b - a) * t
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn adjacent_rings(corner: &CornerRecord, center: &Point3) -> Vec<Vec<Point3>> {
    let n = corner.ring_len();
    let ns = corner.seg;
    let h = ns / 2;
    let half = ns as f64 / 2.0;
    let nsf = ns as f64;
    let mids: Vec<Point3> = (0..n).map(|i| slot_at(corner, i, 0.5)).collect();

    // Coons patch over the sector around boundary point `i`, bounded by the
    // halves of slots `i - 1` and `i` and the lines from their midpoints to
    // the center.
    let coons = |i: usize, a: usize, b: usize| -> Point3 {
        let i = i % n;
        let ip = (i + n - 1) % n;
        let (u, w) = (a as f64 / half, b as f64 / half);
        let pa = slot_at(corner, i, a as f64 / nsf).coords;
        let pb = slot_at(corner, ip, (nsf - b as f64) / nsf).coords;
        let s_prev = mids[ip].coords.lerp(&center.coords, u);
        let s_cur = mids[i].coords.lerp(&center.coords, w);
        let bilinear = corner.points[i].co.coords * ((1.0 - u) * (1.0 - w))
            + mids[i].coords * (u * (1.0 - w))
            + mids[ip].coords * ((1.0 - u) * w)
            + center.coords * (u * w);
        Point3::from(
            pa * (1.0 - w) + s_prev * w + pb * (1.0 - u) + s_cur * u - bilinear,
        )
    };

    let mut rings = Vec::with_capacity(h + 1);
    rings.push(
        corner
            .slot_polylines
            .iter()
            .flat_map(|poly| poly.iter().take(ns).copied())
            .collect::<Vec<_>>(),
    );
    let last = if ns % 2 == 0 { h.saturating_sub(1) } else { h };
    for j in 1..=last {
        let m = ns - 2 * j;
        let mut ring = Vec::with_capacity(n * m);
        for i in 0..n {
            for k in 0..m {
                ring.push(if j + k <= h {
                    coons(i, j + k, j)
                } else {
                    coons(i + 1, j, ns - j - k)
                });
            }
        }
        rings.push(ring);
    }
    rings
}

/// Bottom points under each boundary point, dropped by the mean height of
/// the two adjoining profiles.
fn cutoff_bottoms(corner: &CornerRecord) -> Vec<Point3> {
    let n = corner.ring_len();
    let height = |i: usize| corner.points[i].profile.as_ref().map_or(0.0, |p| p.height());
    let plane_no = |i: usize| {
        corner.points[i]
            .profile
            .as_ref()
            .map_or_else(|| corner.normal, |p| p.plane_no)
    };
    (0..n)
        .map(|i| {
            let ip = (i + n - 1) % n;
            let down = try_normalize(&plane_no(i).cross(&plane_no(ip)))
                .map_or(-corner.normal, |d| {
                    if d.dot(&corner.normal) > 0.0 {
                        -d
                    } else {
                        d
                    }
                });
            let depth = (height(i) + height(ip)) / (2.0 * std::f64::consts::SQRT_2);
            corner.points[i].co + down * depth
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::{Mesh, VertexId};
    use crate::operations::bevel::boundary::{build_boundary, build_profiles};
    use crate::operations::bevel::context::OperationContext;
    use crate::operations::bevel::params::AffectMode;
    use crate::operations::creation::{BoxGrid, MakeBox};
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn cube() -> (Mesh, BoxGrid) {
        let mut mesh = Mesh::new();
        let g = MakeBox::new(p(0.0, 0.0, 0.0), p(4.0, 4.0, 4.0))
            .execute(&mut mesh)
            .unwrap();
        (mesh, g)
    }

    fn select_corner_edges(mesh: &mut Mesh, g: &BoxGrid) -> VertexId {
        let o = g.at(0, 0, 0);
        for other in [g.at(1, 0, 0), g.at(0, 1, 0), g.at(0, 0, 1)] {
            let e = mesh.find_edge(o, other).unwrap();
            mesh.edge_mut(e).unwrap().flags.selected = true;
        }
        o
    }

    fn patch_for(mesh: &Mesh, params: BevelParams, v: VertexId) -> (InteriorPatch, CornerRecord) {
        let mut ctx = OperationContext::new(params.clone());
        ctx.discover(mesh).unwrap();
        let idx = ctx.corner_index[&v];
        let corner = &mut ctx.corners[idx];
        build_boundary(mesh, &params, corner, 1.0).unwrap();
        build_profiles(&params, corner, &mut ctx.profiles);
        let patch = build_patch(&params, corner, &mut ctx.profiles);
        (patch, corner.clone())
    }

    // ── strategy choice ──

    #[test]
    fn single_segment_rings_become_one_polygon() {
        let (mut mesh, g) = cube();
        let o = select_corner_edges(&mut mesh, &g);
        let (patch, corner) = patch_for(&mesh, BevelParams::new(1.0), o);
        assert!(matches!(patch, InteriorPatch::Poly));
        assert_eq!(corner.ring_len(), 3);
    }

    #[test]
    fn two_point_rings_need_no_patch() {
        let (mut mesh, g) = cube();
        let o = g.at(0, 0, 0);
        let e = mesh.find_edge(o, g.at(1, 0, 0)).unwrap();
        mesh.edge_mut(e).unwrap().flags.selected = true;
        let (patch, _) = patch_for(&mesh, BevelParams::new(1.0).with_segments(3), o);
        assert!(matches!(patch, InteriorPatch::None));
    }

    #[test]
    fn three_point_terminal_ring_is_fanned() {
        let mut mesh = Mesh::new();
        let g = MakeBox::new(p(0.0, 0.0, 0.0), p(4.0, 2.0, 2.0))
            .with_divisions(2)
            .execute(&mut mesh)
            .unwrap();
        let v = g.at(1, 0, 0);
        let e = mesh.find_edge(v, g.at(1, 1, 0)).unwrap();
        mesh.edge_mut(e).unwrap().flags.selected = true;
        let (patch, corner) = patch_for(&mesh, BevelParams::new(0.5).with_segments(2), v);
        assert_eq!(corner.ring_len(), 3);
        assert!(matches!(patch, InteriorPatch::TriFan { .. }));
    }

    // ── adjacent rings ──

    #[test]
    fn even_segments_close_with_center_point() {
        let (mut mesh, g) = cube();
        let o = select_corner_edges(&mut mesh, &g);
        let params = BevelParams::new(1.0).with_segments(4);
        let (patch, _) = patch_for(&mesh, params, o);
        let InteriorPatch::Adjacent { ns, rings, center } = &patch else {
            panic!("expected adjacent rings, got {patch:?}");
        };
        assert_eq!(*ns, 4);
        assert_eq!(patch.ring_count(), 3);
        assert_eq!(rings[0].len(), 12);
        assert_eq!(rings[1].len(), 6);
        assert!(center.is_some());
        // Outer ring traces quarter circles of radius one.
        for q in &rings[0] {
            assert_relative_eq!((q - p(1.0, 1.0, 1.0)).norm(), 1.0, epsilon = 1e-6);
        }
        assert_eq!(patch.point(0, 2, 0), *center);
        assert_eq!(patch.point(3, 1, 0), patch.point(0, 1, 0));
    }

    #[test]
    fn odd_segments_close_with_small_polygon() {
        let (mut mesh, g) = cube();
        let o = select_corner_edges(&mut mesh, &g);
        let params = BevelParams::new(1.0).with_segments(3);
        let (patch, _) = patch_for(&mesh, params, o);
        let InteriorPatch::Adjacent { rings, center, .. } = &patch else {
            panic!("expected adjacent rings, got {patch:?}");
        };
        assert_eq!(patch.ring_count(), 2);
        assert_eq!(rings[1].len(), 3);
        assert!(center.is_none());
    }

    #[test]
    fn inner_rings_lie_inside_the_boundary() {
        let (mut mesh, g) = cube();
        let o = select_corner_edges(&mut mesh, &g);
        let params = BevelParams::new(1.0).with_segments(6);
        let (patch, corner) = patch_for(&mesh, params, o);
        let InteriorPatch::Adjacent { rings, center, .. } = &patch else {
            panic!("expected adjacent rings, got {patch:?}");
        };
        let c = center.unwrap();
        let hub = p(1.0, 1.0, 1.0);
        for ring in rings.iter().skip(1) {
            for q in ring {
                // Between the corner's rounding center and the old vertex.
                assert!((q - hub).norm() < (corner.co - hub).norm());
                assert!(q.iter().all(|x| *x > -1e-9));
            }
        }
        assert!((c - hub).norm() < (corner.co - hub).norm());
    }

    #[test]
    fn vertex_only_multi_segment_uses_adjacent_rings() {
        let (mut mesh, g) = cube();
        let o = g.at(0, 0, 0);
        mesh.vertex_mut(o).unwrap().selected = true;
        let params = BevelParams::new(1.0)
            .with_affect(AffectMode::Vertices)
            .with_segments(4);
        let (patch, _) = patch_for(&mesh, params, o);
        assert!(matches!(patch, InteriorPatch::Adjacent { .. }));
        assert_eq!(patch.ring_count(), 3);
    }

    // ── cutoff ──

    #[test]
    fn cutoff_bottoms_sink_below_the_ring() {
        let (mut mesh, g) = cube();
        let o = select_corner_edges(&mut mesh, &g);
        let params = BevelParams::new(1.0)
            .with_segments(2)
            .with_vmesh_method(VmeshMethod::Cutoff);
        let (patch, corner) = patch_for(&mesh, params, o);
        let InteriorPatch::Cutoff { bottoms } = &patch else {
            panic!("expected cutoff, got {patch:?}");
        };
        assert_eq!(bottoms.len(), 3);
        for (b, bp) in bottoms.iter().zip(&corner.points) {
            assert!((b - bp.co).dot(&corner.normal) < 0.0);
        }
    }
}
