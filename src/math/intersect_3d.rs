use super::{Plane, Point3, Vector3, TOLERANCE};

/// Relationship between two infinite lines.
#[derive(Debug, Clone, Copy)]
pub enum LineLineRelation {
    /// Lines cross at a single point.
    Point { point: Point3 },
    /// Lines do not meet; closest points on each line.
    Skew { on_a: Point3, on_b: Point3 },
    /// Lines are parallel (or one of them is degenerate).
    Parallel,
}

/// Intersects the line through `a0`, `a1` with the line through `b0`, `b1`.
///
/// Lines whose closest approach is within a small, scale-relative distance are
/// reported as a [`Point`](LineLineRelation::Point) located on line `a`.
#[must_use]
pub fn line_line_intersect(a0: &Point3, a1: &Point3, b0: &Point3, b1: &Point3) -> LineLineRelation {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let r = a0 - b0;

    let a = d1.dot(&d1);
    let b = d1.dot(&d2);
    let c = d2.dot(&d2);
    if a < TOLERANCE || c < TOLERANCE {
        return LineLineRelation::Parallel;
    }

    let denom = a * c - b * b;
    // Relative test: sin^2 of the angle between the lines.
    if denom <= a * c * 1e-12 {
        return LineLineRelation::Parallel;
    }

    let d = d1.dot(&r);
    let e = d2.dot(&r);
    let s = (b * e - c * d) / denom;
    let t = (a * e - b * d) / denom;

    let on_a = a0 + d1 * s;
    let on_b = b0 + d2 * t;

    let scale = 1.0_f64.max(a.sqrt()).max(c.sqrt());
    if (on_a - on_b).norm() <= 1e-8 * scale {
        LineLineRelation::Point { point: on_a }
    } else {
        LineLineRelation::Skew { on_a, on_b }
    }
}

/// Relationship of a line with a plane.
#[derive(Debug)]
pub enum LinePlaneRelation {
    /// Line intersects the plane at a single point.
    Point { point: Point3, t: f64 },
    /// Line is parallel to the plane (does not intersect).
    Parallel,
    /// Line lies entirely on the plane.
    OnPlane,
}

/// Computes the intersection of a line `origin + t * dir` with a plane.
#[must_use]
pub fn line_plane_intersect(origin: &Point3, dir: &Vector3, plane: &Plane) -> LinePlaneRelation {
    let normal = plane.plane_normal();
    let denom = normal.dot(dir);

    let diff = plane.origin() - origin;
    let numer = normal.dot(&diff);

    if denom.abs() < TOLERANCE {
        if numer.abs() < TOLERANCE {
            LinePlaneRelation::OnPlane
        } else {
            LinePlaneRelation::Parallel
        }
    } else {
        let t = numer / denom;
        let point = origin + dir * t;
        LinePlaneRelation::Point { point, t }
    }
}

/// Closest point to `point` on the infinite line through `a` and `b`.
///
/// Falls back to `a` when the line is degenerate.
#[must_use]
pub fn closest_point_on_line(point: &Point3, a: &Point3, b: &Point3) -> Point3 {
    let dir = b - a;
    let len_sq = dir.norm_squared();
    if len_sq < TOLERANCE {
        return *a;
    }
    let t = (point - a).dot(&dir) / len_sq;
    a + dir * t
}

/// Distance from `point` to the infinite line through `a` and `b`.
#[must_use]
pub fn distance_to_line(point: &Point3, a: &Point3, b: &Point3) -> f64 {
    (point - closest_point_on_line(point, a, b)).norm()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn v(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3::new(x, y, z)
    }

    // ── line_line_intersect ──

    #[test]
    fn crossing_lines_meet() {
        let r = line_line_intersect(
            &p(0.0, 1.0, 0.0),
            &p(1.0, 1.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(1.0, 1.0, 0.0),
        );
        match r {
            LineLineRelation::Point { point } => {
                assert_relative_eq!(point.x, 1.0, epsilon = 1e-12);
                assert_relative_eq!(point.y, 1.0, epsilon = 1e-12);
            }
            other => panic!("expected Point, got {other:?}"),
        }
    }

    #[test]
    fn skew_lines_report_closest_points() {
        let r = line_line_intersect(
            &p(0.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(0.0, 0.0, 1.0),
            &p(0.0, 1.0, 1.0),
        );
        match r {
            LineLineRelation::Skew { on_a, on_b } => {
                assert!((on_a - p(0.0, 0.0, 0.0)).norm() < 1e-12);
                assert!((on_b - p(0.0, 0.0, 1.0)).norm() < 1e-12);
            }
            other => panic!("expected Skew, got {other:?}"),
        }
    }

    #[test]
    fn parallel_lines() {
        let r = line_line_intersect(
            &p(0.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(0.0, 1.0, 0.0),
            &p(2.0, 1.0, 0.0),
        );
        assert!(matches!(r, LineLineRelation::Parallel));
    }

    // ── line_plane_intersect ──

    #[test]
    fn line_hits_plane() {
        let plane = Plane::from_normal(p(0.0, 0.0, 5.0), v(0.0, 0.0, 1.0)).unwrap();
        match line_plane_intersect(&p(1.0, 2.0, 0.0), &v(0.0, 0.0, 1.0), &plane) {
            LinePlaneRelation::Point { point, t } => {
                assert_relative_eq!(t, 5.0, epsilon = 1e-12);
                assert_relative_eq!(point.z, 5.0, epsilon = 1e-12);
            }
            other => panic!("expected Point, got {other:?}"),
        }
    }

    #[test]
    fn line_in_plane() {
        let plane = Plane::from_normal(p(0.0, 0.0, 0.0), v(0.0, 0.0, 1.0)).unwrap();
        let r = line_plane_intersect(&p(1.0, 0.0, 0.0), &v(0.0, 1.0, 0.0), &plane);
        assert!(matches!(r, LinePlaneRelation::OnPlane));
    }

    // ── closest points ──

    #[test]
    fn distance_to_infinite_line() {
        let q = closest_point_on_line(&p(5.0, 1.0, 0.0), &p(0.0, 0.0, 0.0), &p(2.0, 0.0, 0.0));
        assert!((q - p(5.0, 0.0, 0.0)).norm() < 1e-12);
        let d = distance_to_line(&p(5.0, 1.0, 0.0), &p(0.0, 0.0, 0.0), &p(2.0, 0.0, 0.0));
        assert_relative_eq!(d, 1.0, epsilon = 1e-12);
    }
}
