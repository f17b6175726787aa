//! User-facing bevel configuration.

use std::collections::HashMap;

use crate::error::{ConfigError, Result};
use crate::math::Point2;
use crate::mesh::VertexId;

use super::profile::{ProfileKind, PRO_SQUARE_IN_R, PRO_SQUARE_R};

/// How the offset amount is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetMode {
    /// Perpendicular distance from the edge to the new boundary, in each face.
    #[default]
    Offset,
    /// Width of the new bevel face.
    Width,
    /// Depth of the bevel measured from the original edge.
    Depth,
    /// Percentage of the length of the adjacent edges.
    Percent,
    /// Fixed distance along the adjacent edges.
    Absolute,
}

impl OffsetMode {
    fn name(self) -> &'static str {
        match self {
            Self::Offset => "offset",
            Self::Width => "width",
            Self::Depth => "depth",
            Self::Percent => "percent",
            Self::Absolute => "absolute",
        }
    }

    /// `true` for the modes that place points by sliding along neighbour edges.
    #[must_use]
    pub fn slides_along_edges(self) -> bool {
        matches!(self, Self::Percent | Self::Absolute)
    }
}

/// Which elements the bevel rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AffectMode {
    /// Round the selected vertices only.
    Vertices,
    /// Round the selected edges.
    #[default]
    Edges,
}

/// Geometry inserted where two beveled edges meet at a corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiterPattern {
    /// No extra geometry; the offset lines meet in a single point.
    #[default]
    Sharp,
    /// Three points with a flat patch between them (reflex corners only).
    Patch,
    /// Two points joined by a circular arc.
    Arc,
}

/// Fill strategy for vertices where three or more beveled edges meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmeshMethod {
    /// Grid of concentric rings blended between neighbouring profiles.
    #[default]
    Adjacent,
    /// One flat cap per profile plus a center polygon.
    Cutoff,
}

/// A user-drawn profile in the unit square.
///
/// The polyline runs from the start side `(0, 1)` to the end side `(1, 0)`.
/// The square corner `(1, 1)` maps onto the original edge and `(0, 0)` onto
/// the point the straight chamfer would cut through.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomProfile {
    points: Vec<Point2>,
}

impl CustomProfile {
    /// Creates a custom profile from its control polyline.
    #[must_use]
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Control polyline.
    #[must_use]
    pub fn points(&self) -> &[Point2] {
        &self.points
    }
}

/// Cross-section shape of the bevel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileShape {
    /// Superellipse controlled by a fullness in `[0, 1]`. `0.5` gives a
    /// circular arc, `0.25` a straight chamfer, `1` a square corner.
    Superellipse { fullness: f64 },
    /// User-drawn profile.
    Custom(CustomProfile),
}

impl Default for ProfileShape {
    fn default() -> Self {
        Self::Superellipse { fullness: 0.5 }
    }
}

/// Bevel configuration.
#[derive(Debug, Clone)]
pub struct BevelParams {
    /// Offset amount, interpreted according to `offset_mode`.
    pub offset: f64,
    pub offset_mode: OffsetMode,
    pub affect: AffectMode,
    /// Segments across each bevel profile.
    pub segments: usize,
    pub profile: ProfileShape,
    /// Scale offsets by the edge (or vertex) bevel weight.
    pub use_weights: bool,
    /// Extra per-vertex offset factor for vertex bevels; missing vertices use 1.
    pub vertex_weights: Option<HashMap<VertexId, f64>>,
    /// Slide boundary points along a single unbeveled edge between two beveled ones.
    pub loop_slide: bool,
    /// Keep boundary points from passing the midpoint of their edges.
    pub limit_offset: bool,
    /// Relax boundary points so both ends of a strip have equal width.
    pub offset_adjust: bool,
    pub mark_seam: bool,
    pub mark_sharp: bool,
    pub harden_normals: bool,
    /// Material for new faces; `None` inherits from the representative face.
    pub material: Option<u16>,
    /// Miter at reflex corners.
    pub miter_outer: MiterPattern,
    /// Miter at convex corners.
    pub miter_inner: MiterPattern,
    /// Distance the two inner arc miter points are spread apart.
    pub spread: f64,
    pub vmesh_method: VmeshMethod,
}

impl Default for BevelParams {
    fn default() -> Self {
        Self {
            offset: 0.1,
            offset_mode: OffsetMode::Offset,
            affect: AffectMode::Edges,
            segments: 1,
            profile: ProfileShape::default(),
            use_weights: false,
            vertex_weights: None,
            loop_slide: true,
            limit_offset: true,
            offset_adjust: true,
            mark_seam: false,
            mark_sharp: false,
            harden_normals: false,
            material: None,
            miter_outer: MiterPattern::Sharp,
            miter_inner: MiterPattern::Sharp,
            spread: 0.1,
            vmesh_method: VmeshMethod::Adjacent,
        }
    }
}

impl BevelParams {
    /// Creates the default configuration with the given offset.
    #[must_use]
    pub fn new(offset: f64) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_offset_mode(mut self, mode: OffsetMode) -> Self {
        self.offset_mode = mode;
        self
    }

    #[must_use]
    pub fn with_affect(mut self, affect: AffectMode) -> Self {
        self.affect = affect;
        self
    }

    #[must_use]
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    /// Uses a superellipse profile of the given fullness.
    #[must_use]
    pub fn with_fullness(mut self, fullness: f64) -> Self {
        self.profile = ProfileShape::Superellipse { fullness };
        self
    }

    #[must_use]
    pub fn with_custom_profile(mut self, profile: CustomProfile) -> Self {
        self.profile = ProfileShape::Custom(profile);
        self
    }

    #[must_use]
    pub fn with_weights(mut self, use_weights: bool) -> Self {
        self.use_weights = use_weights;
        self
    }

    #[must_use]
    pub fn with_vertex_weights(mut self, weights: HashMap<VertexId, f64>) -> Self {
        self.vertex_weights = Some(weights);
        self
    }

    #[must_use]
    pub fn with_loop_slide(mut self, loop_slide: bool) -> Self {
        self.loop_slide = loop_slide;
        self
    }

    #[must_use]
    pub fn with_limit_offset(mut self, limit_offset: bool) -> Self {
        self.limit_offset = limit_offset;
        self
    }

    #[must_use]
    pub fn with_offset_adjust(mut self, offset_adjust: bool) -> Self {
        self.offset_adjust = offset_adjust;
        self
    }

    #[must_use]
    pub fn with_mark_seam(mut self, mark_seam: bool) -> Self {
        self.mark_seam = mark_seam;
        self
    }

    #[must_use]
    pub fn with_mark_sharp(mut self, mark_sharp: bool) -> Self {
        self.mark_sharp = mark_sharp;
        self
    }

    #[must_use]
    pub fn with_harden_normals(mut self, harden_normals: bool) -> Self {
        self.harden_normals = harden_normals;
        self
    }

    #[must_use]
    pub fn with_material(mut self, material: u16) -> Self {
        self.material = Some(material);
        self
    }

    #[must_use]
    pub fn with_miters(mut self, outer: MiterPattern, inner: MiterPattern) -> Self {
        self.miter_outer = outer;
        self.miter_inner = inner;
        self
    }

    #[must_use]
    pub fn with_spread(mut self, spread: f64) -> Self {
        self.spread = spread;
        self
    }

    #[must_use]
    pub fn with_vmesh_method(mut self, method: VmeshMethod) -> Self {
        self.vmesh_method = method;
        self
    }

    /// Checks the configuration without touching any mesh.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for zero segments, a negative, non-finite or
    /// out-of-range offset, an invalid profile, a patch inner miter, or an
    /// invalid spread.
    pub fn validate(&self) -> Result<()> {
        if self.segments == 0 {
            return Err(ConfigError::InvalidSegments(self.segments).into());
        }
        let mode = self.offset_mode.name();
        if !self.offset.is_finite() || self.offset < 0.0 {
            return Err(ConfigError::InvalidOffset {
                value: self.offset,
                mode,
            }
            .into());
        }
        if self.offset_mode == OffsetMode::Percent && self.offset > 100.0 {
            return Err(ConfigError::InvalidOffset {
                value: self.offset,
                mode,
            }
            .into());
        }
        if let Some(weights) = &self.vertex_weights {
            if let Some(&w) = weights.values().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(ConfigError::InvalidOffset {
                    value: w,
                    mode: "vertex weight",
                }
                .into());
            }
        }
        match &self.profile {
            ProfileShape::Superellipse { fullness } => {
                if !(0.0..=1.0).contains(fullness) {
                    return Err(ConfigError::InvalidProfile(format!(
                        "fullness {fullness} is outside [0, 1]"
                    ))
                    .into());
                }
            }
            ProfileShape::Custom(custom) => {
                if custom.points.len() < 2 {
                    return Err(ConfigError::InvalidProfile(
                        "custom profile needs at least 2 points".into(),
                    )
                    .into());
                }
                if custom
                    .points
                    .iter()
                    .any(|p| !p.x.is_finite() || !p.y.is_finite())
                {
                    return Err(ConfigError::InvalidProfile(
                        "custom profile has non-finite points".into(),
                    )
                    .into());
                }
            }
        }
        if self.miter_inner == MiterPattern::Patch {
            return Err(ConfigError::UnsupportedMiter(
                "patch miters are only available for outer corners".into(),
            )
            .into());
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(ConfigError::InvalidSpread(self.spread).into());
        }
        Ok(())
    }

    /// Profile kind used for beveled edges.
    pub(crate) fn profile_kind(&self) -> ProfileKind {
        match &self.profile {
            ProfileShape::Superellipse { fullness } => {
                ProfileKind::Superellipse(fullness_to_exponent(*fullness))
            }
            ProfileShape::Custom(_) => ProfileKind::Custom,
        }
    }

    /// The custom profile, when one is configured.
    pub(crate) fn custom_profile(&self) -> Option<&CustomProfile> {
        match &self.profile {
            ProfileShape::Custom(custom) => Some(custom),
            ProfileShape::Superellipse { .. } => None,
        }
    }
}

/// Maps a fullness in `[0, 1]` to a superellipse exponent.
///
/// The exponent `r` puts the profile midpoint at `(sqrt(p), sqrt(p))` of the
/// unit square's diagonal, so `0.5 -> 2` (circle) and `0.25 -> 1` (line).
#[must_use]
pub fn fullness_to_exponent(fullness: f64) -> f64 {
    if fullness >= 1.0 - 1e-6 {
        PRO_SQUARE_R
    } else if fullness <= 1e-6 {
        PRO_SQUARE_IN_R
    } else {
        -std::f64::consts::LN_2 / fullness.sqrt().ln()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use approx::assert_relative_eq;

    #[test]
    fn default_params_are_valid() {
        BevelParams::default().validate().unwrap();
        BevelParams::new(0.0).validate().unwrap();
    }

    #[test]
    fn zero_segments_rejected() {
        let err = BevelParams::new(0.1).with_segments(0).validate().unwrap_err();
        assert!(matches!(
            err,
            KernelError::Config(ConfigError::InvalidSegments(0))
        ));
    }

    #[test]
    fn bad_offsets_rejected() {
        assert!(BevelParams::new(-1.0).validate().is_err());
        assert!(BevelParams::new(f64::NAN).validate().is_err());
        assert!(BevelParams::new(150.0)
            .with_offset_mode(OffsetMode::Percent)
            .validate()
            .is_err());
        BevelParams::new(150.0)
            .with_offset_mode(OffsetMode::Absolute)
            .validate()
            .unwrap();
    }

    #[test]
    fn profile_checks() {
        assert!(BevelParams::new(0.1).with_fullness(1.5).validate().is_err());
        let single = CustomProfile::new(vec![Point2::new(0.0, 1.0)]);
        assert!(BevelParams::new(0.1)
            .with_custom_profile(single)
            .validate()
            .is_err());
        let bad = CustomProfile::new(vec![Point2::new(0.0, 1.0), Point2::new(f64::INFINITY, 0.0)]);
        assert!(BevelParams::new(0.1)
            .with_custom_profile(bad)
            .validate()
            .is_err());
    }

    #[test]
    fn inner_patch_miter_rejected() {
        let err = BevelParams::new(0.1)
            .with_miters(MiterPattern::Patch, MiterPattern::Patch)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Config(ConfigError::UnsupportedMiter(_))
        ));
        BevelParams::new(0.1)
            .with_miters(MiterPattern::Patch, MiterPattern::Arc)
            .validate()
            .unwrap();
    }

    #[test]
    fn negative_spread_rejected() {
        assert!(BevelParams::new(0.1).with_spread(-0.5).validate().is_err());
    }

    #[test]
    fn fullness_maps_to_exponent() {
        assert_relative_eq!(fullness_to_exponent(0.5), 2.0, epsilon = 1e-12);
        assert_relative_eq!(fullness_to_exponent(0.25), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fullness_to_exponent(1.0), PRO_SQUARE_R);
        assert_relative_eq!(fullness_to_exponent(0.0), PRO_SQUARE_IN_R);
    }
}
