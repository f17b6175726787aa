pub mod intersect_3d;
pub mod plane;
pub mod polygon_3d;

pub use plane::Plane;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Angle between two vectors in `[0, pi]`, or `0` when either is zero-length.
#[must_use]
pub fn angle_between(a: &Vector3, b: &Vector3) -> f64 {
    let la = a.norm();
    let lb = b.norm();
    if la < TOLERANCE || lb < TOLERANCE {
        return 0.0;
    }
    (a.dot(b) / (la * lb)).clamp(-1.0, 1.0).acos()
}

/// Normalizes `v`, returning `None` when it is shorter than [`TOLERANCE`].
#[must_use]
pub fn try_normalize(v: &Vector3) -> Option<Vector3> {
    let len = v.norm();
    if len < TOLERANCE {
        None
    } else {
        Some(v / len)
    }
}
