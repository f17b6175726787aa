//! Per-corner attribute interpolation.

use crate::error::Result;
use crate::math::polygon_3d::mean_value_weights;
use crate::math::{Plane, Point2, Point3, Vector3};

use super::{FaceId, Mesh, VertexId};

impl Mesh {
    /// Interpolates the face's UV field at `point`.
    ///
    /// The point and the face loop are projected into the face plane and
    /// blended with mean value coordinates. Returns `None` when the mesh has
    /// no UV layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn interpolate_uv(&self, face: FaceId, point: &Point3) -> Result<Option<Point2>> {
        if !self.has_uv_layer() {
            return Ok(None);
        }
        let data = self.face(face)?;
        if data.uvs.len() != data.vertices.len() {
            return Ok(None);
        }
        let points = self.face_points(face)?;
        let normal = self.face_normal(face)?;
        let Ok(plane) = Plane::from_normal(points[0], normal) else {
            return Ok(Some(data.uvs[0]));
        };
        let poly: Vec<Point2> = points.iter().map(|p| plane.to_uv(p)).collect();
        let weights = mean_value_weights(&plane.to_uv(point), &poly);
        let uv = weights
            .iter()
            .zip(&data.uvs)
            .fold(Point2::origin().coords, |acc, (w, uv)| acc + uv.coords * *w);
        Ok(Some(Point2::from(uv)))
    }

    /// Averages the UVs of the corners at `vertex` across `faces`.
    ///
    /// Faces that do not use the vertex are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a face is missing.
    pub fn merge_corner_uvs(&mut self, vertex: VertexId, faces: &[FaceId]) -> Result<()> {
        if !self.has_uv_layer() {
            return Ok(());
        }
        let mut sum = Point2::origin().coords;
        let mut count = 0_u32;
        for &f in faces {
            let data = self.face(f)?;
            if let Some(i) = data.corner_of(vertex) {
                if let Some(uv) = data.uvs.get(i) {
                    sum += uv.coords;
                    count += 1;
                }
            }
        }
        if count < 2 {
            return Ok(());
        }
        let mean = Point2::from(sum / f64::from(count));
        for &f in faces {
            let data = self.face_mut(f)?;
            if let Some(i) = data.corner_of(vertex) {
                if let Some(uv) = data.uvs.get_mut(i) {
                    *uv = mean;
                }
            }
        }
        Ok(())
    }

    /// Sets every corner normal of `face` to `normal`.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is missing.
    pub fn set_flat_corner_normals(&mut self, face: FaceId, normal: Vector3) -> Result<()> {
        let data = self.face_mut(face)?;
        data.normals = vec![normal; data.vertices.len()];
        Ok(())
    }
}
