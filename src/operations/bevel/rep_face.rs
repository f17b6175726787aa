//! Representative-face choice for new faces.

use crate::mesh::{FaceId, Mesh};

use super::continuity::ContinuityMap;

/// Coordinates closer than this tie.
const TIE: f64 = 1e-9;

/// Picks the face whose attributes a new face inherits.
///
/// Candidates are narrowed by, in order: lower continuity component,
/// selected before unselected, lower material, then lower bounds-center Z,
/// X and Y. Narrowing stops as soon as one candidate is left; if several
/// survive every criterion the first listed wins. Missing faces are
/// skipped.
#[must_use]
pub fn choose_rep_face(
    mesh: &Mesh,
    faces: &[FaceId],
    continuity: Option<&ContinuityMap>,
) -> Option<FaceId> {
    let mut candidates: Vec<(FaceId, [f64; 6])> = Vec::with_capacity(faces.len());
    for &f in faces {
        if candidates.iter().any(|(g, _)| *g == f) {
            continue;
        }
        let (Ok(data), Ok(center)) = (mesh.face(f), mesh.face_center_bounds(f)) else {
            continue;
        };
        #[allow(clippy::cast_precision_loss)]
        let component = continuity
            .and_then(|m| m.component(f))
            .map_or(0.0, |c| c as f64);
        let selected = if data.selected { 0.0 } else { 1.0 };
        let keys = [
            component,
            selected,
            f64::from(data.material),
            center.z,
            center.x,
            center.y,
        ];
        candidates.push((f, keys));
    }
    for criterion in 0..6 {
        if candidates.len() <= 1 {
            break;
        }
        let best = candidates
            .iter()
            .map(|(_, k)| k[criterion])
            .fold(f64::INFINITY, f64::min);
        candidates.retain(|(_, k)| k[criterion] <= best + TIE);
    }
    candidates.first().map(|(f, _)| *f)
}
