use super::{Point2, Point3, Vector3, TOLERANCE};

/// Unit normal of a (possibly non-planar) polygon by Newell's method.
///
/// Returns `None` for degenerate polygons with no enclosed area.
#[must_use]
pub fn newell_normal(polygon: &[Point3]) -> Option<Vector3> {
    let n = polygon.len();
    if n < 3 {
        return None;
    }
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let cur = &polygon[i];
        let next = &polygon[(i + 1) % n];
        normal.x += (cur.y - next.y) * (cur.z + next.z);
        normal.y += (cur.z - next.z) * (cur.x + next.x);
        normal.z += (cur.x - next.x) * (cur.y + next.y);
    }
    let len = normal.norm();
    if len < TOLERANCE {
        None
    } else {
        Some(normal / len)
    }
}

/// Arithmetic mean of the polygon vertices.
#[must_use]
pub fn centroid(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return Point3::origin();
    }
    #[allow(clippy::cast_precision_loss)]
    let inv = 1.0 / points.len() as f64;
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum * inv)
}

/// Center of the axis-aligned bounds of the points.
#[must_use]
pub fn bounds_center(points: &[Point3]) -> Point3 {
    let Some(first) = points.first() else {
        return Point3::origin();
    };
    let mut min = first.coords;
    let mut max = first.coords;
    for p in &points[1..] {
        min = min.inf(&p.coords);
        max = max.sup(&p.coords);
    }
    Point3::from((min + max) * 0.5)
}

/// Mean value coordinates of `point` with respect to a 2D polygon.
///
/// The weights sum to one and reproduce linear functions. A point on a vertex
/// gets weight one there; a point on an edge interpolates that edge linearly.
#[must_use]
pub fn mean_value_weights(point: &Point2, polygon: &[Point2]) -> Vec<f64> {
    let n = polygon.len();
    let mut weights = vec![0.0; n];
    if n == 0 {
        return weights;
    }

    let d: Vec<_> = polygon.iter().map(|v| v - point).collect();
    let r: Vec<f64> = d.iter().map(nalgebra::Vector2::norm).collect();

    for i in 0..n {
        if r[i] < TOLERANCE {
            weights[i] = 1.0;
            return weights;
        }
    }

    let mut tan_half = vec![0.0; n];
    for i in 0..n {
        let j = (i + 1) % n;
        let cross = d[i].x * d[j].y - d[i].y * d[j].x;
        let dot = d[i].dot(&d[j]);
        if cross.abs() < TOLERANCE * r[i] * r[j] && dot < 0.0 {
            let t = r[i] / (r[i] + r[j]);
            weights[i] = 1.0 - t;
            weights[j] = t;
            return weights;
        }
        tan_half[i] = cross / (r[i] * r[j] + dot);
    }

    let mut total = 0.0;
    for i in 0..n {
        let prev = (i + n - 1) % n;
        weights[i] = (tan_half[prev] + tan_half[i]) / r[i];
        total += weights[i];
    }
    if total.abs() < TOLERANCE {
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / n as f64;
        weights.iter_mut().for_each(|w| *w = uniform);
    } else {
        weights.iter_mut().for_each(|w| *w /= total);
    }
    weights
}
