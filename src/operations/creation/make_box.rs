use crate::error::{OperationError, Result};
use crate::math::{Point2, Point3, TOLERANCE};
use crate::mesh::{FaceData, Mesh, VertexData, VertexId};

/// Vertices of a box created by [`MakeBox`], addressed by lattice index.
#[derive(Debug, Clone)]
pub struct BoxGrid {
    vertices: Vec<VertexId>,
}

impl BoxGrid {
    /// Vertex at lattice position `(i, j, k)`: `i` along X (`0..=divisions`),
    /// `j` along Y and `k` along Z (each `0..=1`).
    #[must_use]
    pub fn at(&self, i: usize, j: usize, k: usize) -> VertexId {
        self.vertices[i * 4 + j * 2 + k]
    }

    /// All vertices in lattice order.
    #[must_use]
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }
}

/// Creates an axis-aligned quad box from two corner points.
///
/// The box can be split into several cells along X, which yields chains of
/// collinear edges on the four long sides. Faces are wound counter-clockwise
/// seen from outside.
pub struct MakeBox {
    min_corner: Point3,
    max_corner: Point3,
    divisions: usize,
    uvs: bool,
}

impl MakeBox {
    /// Creates a new `MakeBox` operation.
    #[must_use]
    pub fn new(min_corner: Point3, max_corner: Point3) -> Self {
        Self {
            min_corner,
            max_corner,
            divisions: 1,
            uvs: false,
        }
    }

    /// Splits the box into `divisions` cells along X.
    #[must_use]
    pub fn with_divisions(mut self, divisions: usize) -> Self {
        self.divisions = divisions;
        self
    }

    /// Gives every face its own planar UV projection, so UVs are
    /// discontinuous across every edge between differently oriented faces.
    #[must_use]
    pub fn with_uvs(mut self) -> Self {
        self.uvs = true;
        self
    }

    /// Executes the operation, adding the box to the mesh.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidInput`] if the box has no volume or
    /// `divisions` is zero.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<BoxGrid> {
        let size = self.max_corner - self.min_corner;
        if size.x < TOLERANCE || size.y < TOLERANCE || size.z < TOLERANCE {
            return Err(OperationError::InvalidInput("box must have positive size".into()).into());
        }
        if self.divisions == 0 {
            return Err(OperationError::InvalidInput("divisions must be at least 1".into()).into());
        }
        if self.uvs {
            mesh.enable_uv_layer();
        }

        let n = self.divisions;
        let mut vertices = Vec::with_capacity((n + 1) * 4);
        for i in 0..=n {
            #[allow(clippy::cast_precision_loss)]
            let x = self.min_corner.x + size.x * (i as f64) / (n as f64);
            for y in [self.min_corner.y, self.max_corner.y] {
                for z in [self.min_corner.z, self.max_corner.z] {
                    vertices.push(mesh.add_vertex(VertexData::new(Point3::new(x, y, z))));
                }
            }
        }
        let grid = BoxGrid { vertices };
        let g = |i, j, k| grid.at(i, j, k);

        let mut loops: Vec<[VertexId; 4]> = Vec::new();
        for i in 0..n {
            loops.push([g(i, 0, 0), g(i, 1, 0), g(i + 1, 1, 0), g(i + 1, 0, 0)]);
            loops.push([g(i, 0, 1), g(i + 1, 0, 1), g(i + 1, 1, 1), g(i, 1, 1)]);
            loops.push([g(i, 0, 0), g(i + 1, 0, 0), g(i + 1, 0, 1), g(i, 0, 1)]);
            loops.push([g(i, 1, 0), g(i, 1, 1), g(i + 1, 1, 1), g(i + 1, 1, 0)]);
        }
        loops.push([g(0, 0, 0), g(0, 0, 1), g(0, 1, 1), g(0, 1, 0)]);
        loops.push([g(n, 0, 0), g(n, 1, 0), g(n, 1, 1), g(n, 0, 1)]);

        for corners in loops {
            let mut data = FaceData::new(corners.to_vec());
            if self.uvs {
                data = data.with_uvs(self.project_uvs(mesh, &corners)?);
            }
            mesh.add_face(data)?;
        }
        Ok(grid)
    }

    fn project_uvs(&self, mesh: &Mesh, corners: &[VertexId; 4]) -> Result<Vec<Point2>> {
        let pts: Vec<Point3> = corners
            .iter()
            .map(|&v| mesh.point(v))
            .collect::<std::result::Result<_, _>>()?;
        let normal = (pts[1] - pts[0]).cross(&(pts[2] - pts[1]));
        let size = self.max_corner - self.min_corner;
        let rel: Vec<Point3> = pts
            .iter()
            .map(|p| Point3::from((p - self.min_corner).component_div(&size)))
            .collect();
        let uvs = rel
            .iter()
            .map(|r| {
                if normal.x.abs() > 0.5 * normal.norm() {
                    Point2::new(r.y, r.z)
                } else if normal.y.abs() > 0.5 * normal.norm() {
                    Point2::new(r.x, r.z)
                } else {
                    Point2::new(r.x, r.y)
                }
            })
            .collect();
        Ok(uvs)
    }
}
