//! Profile shapes, their arc-length sampling, and the sample cache.
//!
//! A profile is first sampled in the unit square, from `(0, 1)` to `(1, 0)`,
//! and then mapped into 3D by the affine map sending `(0, 1)` to the start
//! point, `(1, 1)` to the middle point and `(1, 0)` to the end point.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;
use std::rc::Rc;

use crate::math::intersect_3d::{line_plane_intersect, LinePlaneRelation};
use crate::math::{try_normalize, Plane, Point2, Point3, Vector3};

use super::context::EPSILON;
use super::params::CustomProfile;

/// Exponent at and above which the profile is the square sentinel.
pub const PRO_SQUARE_R: f64 = 1e4;
/// Exponent of a circular arc.
pub const PRO_CIRCLE_R: f64 = 2.0;
/// Exponent of a straight chamfer.
pub const PRO_LINE_R: f64 = 1.0;
/// Exponent of the inward square sentinel.
pub const PRO_SQUARE_IN_R: f64 = 0.0;

const SQUARE_IN_LIMIT: f64 = 1e-4;
const ARC_TABLE_SIZE: usize = 1024;

/// Shape family of a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfileKind {
    /// Superellipse `x^r + y^r = 1` with the given exponent.
    Superellipse(f64),
    /// The call's custom profile.
    Custom,
}

impl ProfileKind {
    /// The straight chamfer.
    pub const LINE: Self = Self::Superellipse(PRO_LINE_R);
    /// The circular arc.
    pub const CIRCLE: Self = Self::Superellipse(PRO_CIRCLE_R);
}

/// Unit-square samples of a profile, evenly spaced by arc length.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSpacing {
    /// `seg + 1` x coordinates.
    pub xvals: Vec<f64>,
    /// `seg + 1` y coordinates.
    pub yvals: Vec<f64>,
    /// `seg_2 + 1` x coordinates at the power-of-two resolution.
    pub xvals_2: Vec<f64>,
    /// `seg_2 + 1` y coordinates at the power-of-two resolution.
    pub yvals_2: Vec<f64>,
    /// Smallest power of two (at least 2) not below `seg`.
    pub seg_2: usize,
    /// How far the arc-length midpoint bulges toward the `(1, 1)` corner:
    /// `-1` at `(0, 0)`, `0` on the chamfer line, `1` at the corner.
    pub fullness: f64,
}

impl ProfileSpacing {
    fn build(seg: usize, curve: &UnitCurve) -> Self {
        let seg_2 = seg.next_power_of_two().max(2);
        let (xvals, yvals) = curve.sample(seg);
        let (xvals_2, yvals_2) = curve.sample(seg_2);
        let mid = curve.at_fraction(0.5);
        Self {
            xvals,
            yvals,
            xvals_2,
            yvals_2,
            seg_2,
            fullness: mid.x + mid.y - 1.0,
        }
    }

    /// Native segment count.
    #[must_use]
    pub fn seg(&self) -> usize {
        self.xvals.len() - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SpacingKey {
    Superellipse { seg: usize, r_bits: u64 },
    Custom { seg: usize },
}

/// Shared per-call cache of profile spacings keyed by segment count and shape.
#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: HashMap<SpacingKey, Rc<ProfileSpacing>>,
    custom: Option<CustomProfile>,
}

impl ProfileCache {
    /// Creates an empty cache. `custom` backs [`ProfileKind::Custom`].
    #[must_use]
    pub fn new(custom: Option<CustomProfile>) -> Self {
        Self {
            entries: HashMap::new(),
            custom,
        }
    }

    /// Spacing for `seg` segments of `kind`, computed on first use.
    ///
    /// A custom kind without a configured custom profile falls back to the
    /// circular arc.
    pub fn spacing(&mut self, seg: usize, kind: ProfileKind) -> Rc<ProfileSpacing> {
        let seg = seg.max(1);
        let key = match (kind, &self.custom) {
            (ProfileKind::Custom, Some(_)) => SpacingKey::Custom { seg },
            (ProfileKind::Custom, None) => SpacingKey::Superellipse {
                seg,
                r_bits: PRO_CIRCLE_R.to_bits(),
            },
            (ProfileKind::Superellipse(r), _) => SpacingKey::Superellipse {
                seg,
                r_bits: r.to_bits(),
            },
        };
        if let Some(found) = self.entries.get(&key) {
            return Rc::clone(found);
        }
        let curve = match (key, &self.custom) {
            (SpacingKey::Custom { .. }, Some(custom)) => UnitCurve::polyline(custom.points()),
            (SpacingKey::Superellipse { r_bits, .. }, _) => {
                UnitCurve::superellipse(f64::from_bits(r_bits))
            }
            (SpacingKey::Custom { .. }, None) => UnitCurve::superellipse(PRO_CIRCLE_R),
        };
        let spacing = Rc::new(ProfileSpacing::build(seg, &curve));
        self.entries.insert(key, Rc::clone(&spacing));
        spacing
    }

    /// Number of cached spacings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A profile curve in the unit square, parametrized by arc length.
enum UnitCurve {
    /// Superellipse evaluated exactly at parameters looked up from a
    /// cumulative arc-length table.
    Exact {
        r: f64,
        params: Vec<f64>,
        lengths: Vec<f64>,
    },
    /// Polyline with cumulative lengths.
    Polyline {
        points: Vec<Point2>,
        lengths: Vec<f64>,
    },
}

impl UnitCurve {
    fn superellipse(r: f64) -> Self {
        if r < SQUARE_IN_LIMIT {
            return Self::polyline(&[
                Point2::new(0.0, 1.0),
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
            ]);
        }
        if r >= PRO_SQUARE_R {
            return Self::polyline(&[
                Point2::new(0.0, 1.0),
                Point2::new(1.0, 1.0),
                Point2::new(1.0, 0.0),
            ]);
        }
        #[allow(clippy::cast_precision_loss)]
        let params: Vec<f64> = (0..=ARC_TABLE_SIZE)
            .map(|i| FRAC_PI_2 * (1.0 - i as f64 / ARC_TABLE_SIZE as f64))
            .collect();
        let mut lengths = Vec::with_capacity(params.len());
        let mut total = 0.0;
        let mut prev = superellipse_point(r, params[0]);
        for &t in &params {
            let p = superellipse_point(r, t);
            total += (p - prev).norm();
            lengths.push(total);
            prev = p;
        }
        Self::Exact { r, params, lengths }
    }

    fn polyline(points: &[Point2]) -> Self {
        let mut lengths = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                total += (p - points[i - 1]).norm();
            }
            lengths.push(total);
        }
        Self::Polyline {
            points: points.to_vec(),
            lengths,
        }
    }

    fn total_length(&self) -> f64 {
        let lengths = match self {
            Self::Exact { lengths, .. } | Self::Polyline { lengths, .. } => lengths,
        };
        lengths.last().copied().unwrap_or(0.0)
    }

    /// Point at the given fraction of the total arc length.
    fn at_fraction(&self, fraction: f64) -> Point2 {
        let target = fraction.clamp(0.0, 1.0) * self.total_length();
        match self {
            Self::Exact { r, params, lengths } => {
                let (i, frac) = locate(lengths, target);
                let t = params[i] + (params[(i + 1).min(params.len() - 1)] - params[i]) * frac;
                superellipse_point(*r, t)
            }
            Self::Polyline { points, lengths } => {
                if points.len() == 1 {
                    return points[0];
                }
                let (i, frac) = locate(lengths, target);
                let j = (i + 1).min(points.len() - 1);
                points[i] + (points[j] - points[i]) * frac
            }
        }
    }

    fn sample(&self, seg: usize) -> (Vec<f64>, Vec<f64>) {
        let mut xs = Vec::with_capacity(seg + 1);
        let mut ys = Vec::with_capacity(seg + 1);
        for k in 0..=seg {
            #[allow(clippy::cast_precision_loss)]
            let p = self.at_fraction(k as f64 / seg as f64);
            xs.push(p.x);
            ys.push(p.y);
        }
        (xs, ys)
    }
}

fn superellipse_point(r: f64, t: f64) -> Point2 {
    let e = 2.0 / r;
    Point2::new(t.cos().max(0.0).powf(e), t.sin().max(0.0).powf(e))
}

/// Finds the table segment containing `target` and the fraction along it.
fn locate(lengths: &[f64], target: f64) -> (usize, f64) {
    if lengths.len() < 2 {
        return (0, 0.0);
    }
    let last_seg = lengths.len() - 2;
    let i = lengths
        .partition_point(|&l| l <= target)
        .saturating_sub(1)
        .min(last_seg);
    let span = lengths[i + 1] - lengths[i];
    if span <= 0.0 {
        (i, if target >= lengths[i + 1] { 1.0 } else { 0.0 })
    } else {
        (i, ((target - lengths[i]) / span).clamp(0.0, 1.0))
    }
}

/// A profile placed in 3D between two boundary points.
#[derive(Debug, Clone)]
pub struct ProfileCurve {
    pub kind: ProfileKind,
    pub start: Point3,
    pub middle: Point3,
    pub end: Point3,
    /// Normal of the plane the samples are projected onto.
    pub plane_no: Vector3,
    /// A point on the projection plane.
    pub plane_co: Point3,
    /// Direction samples travel when projected; zero disables projection.
    pub proj_dir: Vector3,
    points: Vec<Point3>,
    dense: Vec<Point3>,
}

impl ProfileCurve {
    /// Creates a profile whose plane passes through the three control points.
    ///
    /// When the control points are collinear the plane is undefined and the
    /// samples are not projected.
    #[must_use]
    pub fn new(kind: ProfileKind, start: Point3, middle: Point3, end: Point3) -> Self {
        let plane_no = try_normalize(&(middle - start).cross(&(middle - end)))
            .unwrap_or_else(Vector3::zeros);
        Self {
            kind,
            start,
            middle,
            end,
            plane_no,
            plane_co: start,
            proj_dir: plane_no,
            points: Vec::new(),
            dense: Vec::new(),
        }
    }

    /// Sets the projection direction.
    #[must_use]
    pub fn with_projection(mut self, proj_dir: Vector3) -> Self {
        self.proj_dir = try_normalize(&proj_dir).unwrap_or_else(Vector3::zeros);
        self
    }

    /// Moves the projection plane so it contains `pivot` and both end points.
    ///
    /// Skipped when that plane is undefined or the projection direction
    /// runs inside it.
    pub fn move_plane(&mut self, pivot: &Point3) {
        if self.proj_dir.norm() < EPSILON {
            return;
        }
        let Some(d1) = try_normalize(&(pivot - self.start)) else {
            return;
        };
        let Some(d2) = try_normalize(&(pivot - self.end)) else {
            return;
        };
        let Some(no) = try_normalize(&d1.cross(&d2)) else {
            return;
        };
        if no.dot(&self.proj_dir).abs() < EPSILON {
            return;
        }
        self.plane_no = no;
        self.plane_co = *pivot;
    }

    /// Distance from the middle point to the start-end chord.
    #[must_use]
    pub fn height(&self) -> f64 {
        crate::math::intersect_3d::distance_to_line(&self.middle, &self.start, &self.end)
    }

    /// Samples the profile at `seg` segments, filling both resolutions.
    pub fn evaluate(&mut self, seg: usize, cache: &mut ProfileCache) {
        let spacing = cache.spacing(seg, self.kind);
        self.points = self.map_samples(&spacing.xvals, &spacing.yvals);
        self.dense = self.map_samples(&spacing.xvals_2, &spacing.yvals_2);
    }

    fn map_samples(&self, xs: &[f64], ys: &[f64]) -> Vec<Point3> {
        let n = xs.len();
        let Some((vo, ex, ey)) = unit_square_map(&self.start, &self.middle, &self.end) else {
            #[allow(clippy::cast_precision_loss)]
            return (0..n)
                .map(|k| self.start + (self.end - self.start) * (k as f64 / (n - 1).max(1) as f64))
                .collect();
        };
        let plane = if self.plane_no.norm() > EPSILON && self.proj_dir.norm() > EPSILON {
            Plane::from_normal(self.plane_co, self.plane_no).ok()
        } else {
            None
        };
        let mut out: Vec<Point3> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| {
                let p = vo + ex * x + ey * y;
                match &plane {
                    Some(plane) => match line_plane_intersect(&p, &self.proj_dir, plane) {
                        LinePlaneRelation::Point { point, .. } => point,
                        _ => p,
                    },
                    None => p,
                }
            })
            .collect();
        if let Some(first) = out.first_mut() {
            *first = self.start;
        }
        if let Some(last) = out.last_mut() {
            *last = self.end;
        }
        out
    }

    /// `seg + 1` samples from start to end; empty before evaluation.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Samples at the power-of-two resolution.
    #[must_use]
    pub fn dense_points(&self) -> &[Point3] {
        &self.dense
    }

    /// Point at arc-length fraction `t` in `[0, 1]`.
    ///
    /// Exact at sample positions; between samples it interpolates the dense
    /// set.
    #[must_use]
    pub fn sample(&self, t: f64) -> Point3 {
        let t = t.clamp(0.0, 1.0);
        if self.points.len() < 2 {
            return self.start + (self.end - self.start) * t;
        }
        #[allow(clippy::cast_precision_loss)]
        let seg = (self.points.len() - 1) as f64;
        let x = t * seg;
        if (x - x.round()).abs() < 1e-9 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return self.points[x.round() as usize];
        }
        let dense = if self.dense.len() >= 2 {
            &self.dense
        } else {
            &self.points
        };
        #[allow(clippy::cast_precision_loss)]
        let y = t * (dense.len() - 1) as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lo = (y.floor() as usize).min(dense.len() - 2);
        #[allow(clippy::cast_precision_loss)]
        let frac = y - lo as f64;
        dense[lo] + (dense[lo + 1] - dense[lo]) * frac
    }
}

/// Affine map of the unit square onto the parallelogram spanned by the three
/// control points, as `(origin, x_axis, y_axis)`.
///
/// Returns `None` when the points are collinear.
fn unit_square_map(
    start: &Point3,
    middle: &Point3,
    end: &Point3,
) -> Option<(Point3, Vector3, Vector3)> {
    let vo = start + (end - middle);
    let ex = end - vo;
    let ey = start - vo;
    let scale = ex.norm().max(ey.norm());
    if scale < EPSILON || ex.cross(&ey).norm() < EPSILON * scale * scale {
        return None;
    }
    Some((vo, ex, ey))
}
