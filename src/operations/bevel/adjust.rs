//! Evenness relaxation.
//!
//! Each beveled edge wants the boundary points at its two ends to sit at the
//! same distance from it on each side. The pass walks the chains of points
//! linked by those wishes and scales each point toward or away from its
//! corner, a bounded amount per sweep.

use std::collections::{HashMap, HashSet};

use crate::math::intersect_3d::distance_to_line;

use super::boundary::update_resolved_offsets;
use super::context::{OperationContext, EPSILON, MAX_ADJUST_PCT};
use super::params::AffectMode;

/// Sweeps over each chain before the result is accepted as it is.
const MAX_SWEEPS: usize = 5;

/// A boundary point addressed across corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointRef {
    corner: usize,
    point: usize,
}

/// Wish that the distance of one point from `side` equals the distance of
/// `other` from `other_side` at the far corner.
#[derive(Debug, Clone, Copy)]
struct Link {
    side: usize,
    other: PointRef,
    other_side: usize,
}

impl OperationContext {
    /// Evens out the offsets at both ends of every beveled edge.
    ///
    /// Skipped when disabled and for the edge-sliding offset modes, whose
    /// points are already pinned to fixed distances along the edges.
    pub(crate) fn relax_offsets(&mut self) {
        if !self.params.offset_adjust
            || self.params.offset_mode.slides_along_edges()
            || self.params.affect == AffectMode::Vertices
        {
            return;
        }
        let links = self.offset_links();
        let mut visited = HashSet::new();
        let mut starts: Vec<PointRef> = links.keys().copied().collect();
        starts.sort_by_key(|r| (r.corner, r.point));
        for start in starts {
            if visited.contains(&start) {
                continue;
            }
            let chain = collect_chain(start, &links, &mut visited);
            self.relax_chain(&chain, &links);
        }
        for corner in &mut self.corners {
            update_resolved_offsets(corner);
        }
    }

    fn offset_links(&self) -> HashMap<PointRef, Vec<Link>> {
        let mut links: HashMap<PointRef, Vec<Link>> = HashMap::new();
        for ends in self.edge_ends.values() {
            let [a, b] = *ends;
            let sa = &self.corners[a.corner].sides[a.side];
            let sb = &self.corners[b.corner].sides[b.side];
            for (pa, pb) in [(sa.left_point, sb.right_point), (sa.right_point, sb.left_point)] {
                let (Some(pa), Some(pb)) = (pa, pb) else {
                    continue;
                };
                let ra = PointRef {
                    corner: a.corner,
                    point: pa,
                };
                let rb = PointRef {
                    corner: b.corner,
                    point: pb,
                };
                links.entry(ra).or_default().push(Link {
                    side: a.side,
                    other: rb,
                    other_side: b.side,
                });
                links.entry(rb).or_default().push(Link {
                    side: b.side,
                    other: ra,
                    other_side: a.side,
                });
            }
        }
        links
    }

    fn distance(&self, at: PointRef, side: usize) -> f64 {
        let corner = &self.corners[at.corner];
        let s = &corner.sides[side];
        distance_to_line(&corner.points[at.point].co, &corner.co, &s.far)
    }

    fn relax_chain(&mut self, chain: &[PointRef], links: &HashMap<PointRef, Vec<Link>>) {
        let limit = MAX_ADJUST_PCT / 100.0;
        for sweep in 0..MAX_SWEEPS {
            let scales: Vec<f64> = chain
                .iter()
                .map(|&r| {
                    let Some(ls) = links.get(&r) else {
                        return 1.0;
                    };
                    let mut sum = 0.0;
                    let mut count = 0_u32;
                    for l in ls {
                        let cur = self.distance(r, l.side);
                        if cur < EPSILON {
                            continue;
                        }
                        let target = 0.5 * (cur + self.distance(l.other, l.other_side));
                        sum += target / cur;
                        count += 1;
                    }
                    if count == 0 {
                        1.0
                    } else {
                        (sum / f64::from(count)).clamp(1.0 - limit, 1.0 + limit)
                    }
                })
                .collect();
            let worst = scales.iter().map(|s| (s - 1.0).abs()).fold(0.0, f64::max);
            if worst < 1e-9 {
                return;
            }
            for (&r, f) in chain.iter().zip(scales) {
                let corner = &mut self.corners[r.corner];
                let co = corner.co;
                let bp = &mut corner.points[r.point];
                bp.co = co + (bp.co - co) * f;
            }
            if sweep + 1 == MAX_SWEEPS {
                tracing::debug!(
                    points = chain.len(),
                    residual = worst,
                    "offset relaxation stopped before converging"
                );
            }
        }
    }
}

/// Every point reachable from `start` through links, depth first.
fn collect_chain(
    start: PointRef,
    links: &HashMap<PointRef, Vec<Link>>,
    visited: &mut HashSet<PointRef>,
) -> Vec<PointRef> {
    let mut chain = Vec::new();
    let mut stack = vec![start];
    visited.insert(start);
    while let Some(r) = stack.pop() {
        chain.push(r);
        for l in links.get(&r).into_iter().flatten() {
            if visited.insert(l.other) {
                stack.push(l.other);
            }
        }
    }
    chain
}
