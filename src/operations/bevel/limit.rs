//! Offset limiting.
//!
//! Boundary points must not pass the middle of any edge they lie along, or
//! the rings of the two ends would overlap.

use crate::error::Result;
use crate::mesh::Mesh;

use super::boundary::{build_boundary, update_resolved_offsets};
use super::context::OperationContext;
use super::ring::{BoundaryPoint, CornerRecord};

/// Shrink passes before the remaining overshoot is clamped.
const LIMIT_PASSES: usize = 3;

/// Sides from `efirst` to `elast` inclusive.
fn span(corner: &CornerRecord, bp: &BoundaryPoint) -> Vec<usize> {
    let mut out = vec![bp.efirst];
    let mut s = bp.efirst;
    while s != bp.elast && out.len() <= corner.sides.len() {
        s = corner.sides[s].next;
        out.push(s);
    }
    out
}

/// Factor that brings `bp` back to the edge midpoints, or `1.0` when it is
/// already within them.
fn overshoot(corner: &CornerRecord, bp: &BoundaryPoint) -> f64 {
    span(corner, bp)
        .into_iter()
        .map(|s| {
            let side = &corner.sides[s];
            let t = (bp.co - corner.co).dot(&side.dir);
            let half = side.length / 2.0;
            if t > half {
                half / t
            } else {
                1.0
            }
        })
        .fold(1.0, f64::min)
}

impl OperationContext {
    /// Builds the boundary ring of every corner.
    ///
    /// With offset limiting, the uniform offset scale shrinks until no point
    /// passes an edge midpoint, for a bounded number of passes.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh references missing elements.
    pub(crate) fn build_rings(&mut self, mesh: &Mesh) -> Result<()> {
        for pass in 0..=LIMIT_PASSES {
            for corner in &mut self.corners {
                build_boundary(mesh, &self.params, corner, self.offset_scale)?;
            }
            if !self.params.limit_offset || pass == LIMIT_PASSES {
                break;
            }
            let factor = self
                .corners
                .iter()
                .flat_map(|c| c.points.iter().map(move |bp| overshoot(c, bp)))
                .fold(1.0, f64::min);
            if factor >= 1.0 {
                break;
            }
            self.offset_scale *= factor * 0.99;
            tracing::debug!(scale = self.offset_scale, pass, "offsets limited");
        }
        Ok(())
    }

    /// Pulls any point still past an edge midpoint straight back toward its
    /// corner.
    pub(crate) fn clamp_to_midpoints(&mut self) {
        if !self.params.limit_offset {
            return;
        }
        for corner in &mut self.corners {
            let factors: Vec<f64> = corner.points.iter().map(|bp| overshoot(corner, bp)).collect();
            let mut moved = false;
            for (bp, f) in corner.points.iter_mut().zip(factors) {
                if f < 1.0 {
                    bp.co = corner.co + (bp.co - corner.co) * f;
                    moved = true;
                }
            }
            if moved {
                tracing::debug!(
                    vertex = ?corner.vertex,
                    "boundary points clamped to edge midpoints"
                );
                update_resolved_offsets(corner);
            }
        }
    }
}
