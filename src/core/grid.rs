use crate::error::{Error, Result};
use crate::geometry::{Geometry, Rectangle, Vect3, DIM};
use crate::random::UniformSampler;
use std::fmt;

/// Uniform Cartesian partition of an axis-aligned domain into `nx * ny * nz`
/// cells.
///
/// Cells are numbered row-major: the last axis varies fastest, so the cell at
/// coordinate `(i, j, k)` has index `(i * ny + j) * nz + k`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredGrid {
    low: Vect3,
    high: Vect3,
    num_cells: [usize; DIM],
    cell_size: Vect3,
    inv_cell_size: Vect3,
    tolerance: Vect3,
    strides: [usize; DIM],
}

impl StructuredGrid {
    /// Partition `[low, high)` into cells of roughly `max_cell_size` per side.
    ///
    /// The cell count per axis is the rounded ratio of domain length to the
    /// target size (at least one), and the actual cell size is then chosen
    /// so the cells tile the domain exactly.
    pub fn new(low: Vect3, high: Vect3, max_cell_size: Vect3) -> Result<Self> {
        let mut num_cells = [0usize; DIM];
        let mut cell_size = [0.0; DIM];
        for k in 0..DIM {
            if !low[k].is_finite() || !high[k].is_finite() || low[k] >= high[k] {
                return Err(Error::InvalidParam(
                    "grid bounds must be finite with low < high".into(),
                ));
            }
            if !max_cell_size[k].is_finite() || max_cell_size[k] <= 0.0 {
                return Err(Error::InvalidParam("cell size must be finite and > 0".into()));
            }
            let length = high[k] - low[k];
            num_cells[k] = ((length / max_cell_size[k]).round() as usize).max(1);
            cell_size[k] = length / num_cells[k] as f64;
        }
        let strides = [num_cells[1] * num_cells[2], num_cells[2], 1];
        Ok(Self {
            low,
            high,
            num_cells,
            cell_size,
            inv_cell_size: cell_size.map(|h| 1.0 / h),
            tolerance: cell_size.map(|h| h / 1e5),
            strides,
        })
    }

    /// Cubic target cell size on every axis.
    pub fn with_cell_size(low: Vect3, high: Vect3, cell_size: f64) -> Result<Self> {
        Self::new(low, high, [cell_size; DIM])
    }

    /// Total number of cells.
    pub fn size(&self) -> usize {
        self.num_cells.iter().product()
    }

    /// Low corner of the domain.
    pub fn get_low(&self) -> &Vect3 {
        &self.low
    }

    /// High corner of the domain.
    pub fn get_high(&self) -> &Vect3 {
        &self.high
    }

    /// Actual cell edge lengths after rounding.
    pub fn get_cell_size(&self) -> &Vect3 {
        &self.cell_size
    }

    /// Cell counts per axis.
    pub fn get_num_cells(&self) -> &[usize; DIM] {
        &self.num_cells
    }

    /// Per-axis slack for points on the domain boundary (`h / 1e5`).
    pub fn get_tolerance(&self) -> &Vect3 {
        &self.tolerance
    }

    /// Volume of a single cell; all cells are the same size.
    pub fn cell_volume(&self) -> f64 {
        self.cell_size.iter().product()
    }

    /// Row-major index of the cell at integer coordinate `coord`.
    pub fn get_cell_index(&self, coord: &[usize; DIM]) -> usize {
        coord
            .iter()
            .zip(self.strides.iter())
            .map(|(c, s)| c * s)
            .sum()
    }

    /// Integer coordinate of cell `index`; inverse of
    /// [`get_cell_index`](Self::get_cell_index).
    pub fn get_cell_coord(&self, index: usize) -> [usize; DIM] {
        let mut coord = [0usize; DIM];
        let mut rest = index;
        for k in 0..DIM {
            coord[k] = rest / self.strides[k];
            rest %= self.strides[k];
        }
        coord
    }

    /// Index of the cell containing `point`.
    ///
    /// Points within the boundary tolerance of the high face are assigned to
    /// the last cell; anything further out is an error.
    pub fn get_cell_index_of_point(&self, point: &Vect3) -> Result<usize> {
        let mut coord = [0usize; DIM];
        for k in 0..DIM {
            if point[k] < self.low[k] - self.tolerance[k]
                || point[k] > self.high[k] + self.tolerance[k]
                || point[k].is_nan()
            {
                return Err(Error::OutOfDomain(format!(
                    "point {point:?} lies outside [{:?}, {:?}]",
                    self.low, self.high
                )));
            }
            let c = ((point[k] - self.low[k]) * self.inv_cell_size[k]).floor();
            coord[k] = (c.max(0.0) as usize).min(self.num_cells[k] - 1);
        }
        Ok(self.get_cell_index(&coord))
    }

    /// Low corner of cell `index`.
    pub fn get_low_point(&self, index: usize) -> Vect3 {
        let coord = self.get_cell_coord(index);
        let mut p = [0.0; DIM];
        for k in 0..DIM {
            p[k] = self.low[k] + coord[k] as f64 * self.cell_size[k];
        }
        p
    }

    /// High corner of cell `index`.
    pub fn get_high_point(&self, index: usize) -> Vect3 {
        let mut p = self.get_low_point(index);
        for k in 0..DIM {
            p[k] += self.cell_size[k];
        }
        p
    }

    /// Centre of cell `index`.
    pub fn get_cell_centre(&self, index: usize) -> Vect3 {
        let mut p = self.get_low_point(index);
        for k in 0..DIM {
            p[k] += 0.5 * self.cell_size[k];
        }
        p
    }

    /// Uniformly distributed point inside cell `index`.
    pub fn get_random_point<R: UniformSampler>(&self, index: usize, rng: &mut R) -> Vect3 {
        let mut p = self.get_low_point(index);
        for k in 0..DIM {
            p[k] += rng.closed_open() * self.cell_size[k];
        }
        p
    }

    /// Face-adjacent neighbours, in the order -x, +x, -y, +y, -z, +z.
    /// There is no wraparound at the domain boundary.
    pub fn get_neighbour_indicies(&self, index: usize) -> Vec<usize> {
        let coord = self.get_cell_coord(index);
        let mut out = Vec::with_capacity(2 * DIM);
        for k in 0..DIM {
            if coord[k] > 0 {
                out.push(index - self.strides[k]);
            }
            if coord[k] + 1 < self.num_cells[k] {
                out.push(index + self.strides[k]);
            }
        }
        out
    }

    /// Axis along which `i` and `j` touch and whether `j` lies on the high side.
    fn shared_axis(&self, i: usize, j: usize) -> Result<(usize, bool)> {
        let a = self.get_cell_coord(i);
        let b = self.get_cell_coord(j);
        let mut axis = None;
        for k in 0..DIM {
            if a[k] == b[k] {
                continue;
            }
            if axis.is_some() || a[k].abs_diff(b[k]) != 1 {
                return Err(Error::NotAdjacent { from: i, to: j });
            }
            axis = Some((k, b[k] > a[k]));
        }
        axis.ok_or(Error::NotAdjacent { from: i, to: j })
    }

    /// Centre-to-centre distance between face-adjacent cells.
    pub fn get_distance_between(&self, i: usize, j: usize) -> Result<f64> {
        let (k, _) = self.shared_axis(i, j)?;
        Ok(self.cell_size[k])
    }

    /// Coefficient of the discrete Laplacian between face-adjacent cells,
    /// `1 / h^2` along the shared axis.
    pub fn get_laplace_coefficient(&self, i: usize, j: usize) -> Result<f64> {
        let (k, _) = self.shared_axis(i, j)?;
        Ok(self.inv_cell_size[k] * self.inv_cell_size[k])
    }

    /// The face shared by `i` and `j`, oriented so its normal points from
    /// `i` into `j`.
    pub fn get_face_between(&self, i: usize, j: usize) -> Result<Rectangle> {
        let (k, toward_high) = self.shared_axis(i, j)?;
        let mut corner = self.get_low_point(i);
        if toward_high {
            corner[k] += self.cell_size[k];
        }
        let a = (k + 1) % DIM;
        let b = (k + 2) % DIM;
        let mut ea = [0.0; DIM];
        let mut eb = [0.0; DIM];
        ea[a] = self.cell_size[a];
        eb[b] = self.cell_size[b];
        // (k+1) x (k+2) points along +k.
        if toward_high {
            Rectangle::new(corner, ea, eb)
        } else {
            Rectangle::new(corner, eb, ea)
        }
    }

    /// The 12 edges of cell `index`. Edges ending on the domain boundary are
    /// stretched outward by the tolerance so a geometry lying exactly on the
    /// low face still selects the first layer, as one on the high face
    /// selects the last.
    fn cell_edges(&self, index: usize) -> Vec<(Vect3, Vect3)> {
        let low = self.get_low_point(index);
        let coord = self.get_cell_coord(index);
        let mut edges = Vec::with_capacity(12);
        for k in 0..DIM {
            let a = (k + 1) % DIM;
            let b = (k + 2) % DIM;
            for (da, db) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
                let mut start = low;
                start[a] += da * self.cell_size[a];
                start[b] += db * self.cell_size[b];
                let mut end = start;
                end[k] += self.cell_size[k];
                if coord[k] == 0 {
                    start[k] -= self.tolerance[k];
                }
                if coord[k] + 1 == self.num_cells[k] {
                    end[k] += self.tolerance[k];
                }
                edges.push((start, end));
            }
        }
        edges
    }

    /// Cells with at least one edge crossing the boundary of `geometry`.
    pub fn get_slice(&self, geometry: &dyn Geometry, indices: &mut Vec<usize>) {
        indices.clear();
        for i in 0..self.size() {
            if self
                .cell_edges(i)
                .iter()
                .any(|(a, b)| geometry.segment_crosses(a, b))
            {
                indices.push(i);
            }
        }
    }

    /// Cells whose centre lies inside `geometry`.
    pub fn get_region(&self, geometry: &dyn Geometry, indices: &mut Vec<usize>) {
        indices.clear();
        indices.extend((0..self.size()).filter(|&i| geometry.is_in(&self.get_cell_centre(i))));
    }

    /// Cells overlapped by the box `[low, high]`, with the fraction of each
    /// cell's volume that the box covers.
    pub fn get_overlap(
        &self,
        low: &Vect3,
        high: &Vect3,
        indices: &mut Vec<usize>,
        fractions: &mut Vec<f64>,
    ) -> Result<()> {
        indices.clear();
        fractions.clear();
        let mut first = [0usize; DIM];
        let mut last = [0usize; DIM];
        for k in 0..DIM {
            if !(low[k] <= high[k]) {
                return Err(Error::InvalidParam("overlap box must have low <= high".into()));
            }
            if high[k] < self.low[k] || low[k] > self.high[k] {
                return Err(Error::OutOfDomain(format!(
                    "box [{low:?}, {high:?}] does not intersect the grid"
                )));
            }
            let lo = ((low[k].max(self.low[k]) - self.low[k]) * self.inv_cell_size[k]).floor();
            let hi = ((high[k].min(self.high[k]) - self.low[k]) * self.inv_cell_size[k]).ceil();
            first[k] = (lo.max(0.0) as usize).min(self.num_cells[k] - 1);
            last[k] = (hi.max(1.0) as usize).min(self.num_cells[k]);
        }
        let cell_volume = self.cell_volume();
        for i in first[0]..last[0] {
            for j in first[1]..last[1] {
                for k in first[2]..last[2] {
                    let index = self.get_cell_index(&[i, j, k]);
                    let cell_low = self.get_low_point(index);
                    let mut volume = 1.0;
                    for d in 0..DIM {
                        let lo = low[d].max(cell_low[d]);
                        let hi = high[d].min(cell_low[d] + self.cell_size[d]);
                        volume *= (hi - lo).max(0.0);
                    }
                    if volume > 0.0 {
                        indices.push(index);
                        fractions.push(volume / cell_volume);
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for StructuredGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StructuredGrid: low = {:?} high = {:?} cells = {:?} cell size = {:?}",
            self.low, self.high, self.num_cells, self.cell_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{AxisAlignedPlane, Sphere};

    fn grid_4x3x2() -> Result<StructuredGrid> {
        StructuredGrid::new([0.0; 3], [4.0, 3.0, 2.0], [1.0; 3])
    }

    #[test]
    fn construction_rounds_cell_counts() -> Result<()> {
        let g = StructuredGrid::with_cell_size([0.0; 3], [1.0, 1.0, 1.0], 0.3)?;
        assert_eq!(*g.get_num_cells(), [3, 3, 3]);
        assert!((g.get_cell_size()[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((g.get_tolerance()[0] - 1.0 / 3.0e5).abs() < 1e-15);
        assert_eq!(g.size(), 27);
        assert!(StructuredGrid::with_cell_size([0.0; 3], [1.0; 3], 0.0).is_err());
        assert!(StructuredGrid::with_cell_size([1.0; 3], [0.0; 3], 0.1).is_err());
        Ok(())
    }

    #[test]
    fn index_coord_round_trip() -> Result<()> {
        let g = grid_4x3x2()?;
        assert_eq!(g.get_cell_index(&[1, 2, 1]), (1 * 3 + 2) * 2 + 1);
        for i in 0..g.size() {
            assert_eq!(g.get_cell_index(&g.get_cell_coord(i)), i);
        }
        Ok(())
    }

    #[test]
    fn point_lookup_and_domain_check() -> Result<()> {
        let g = grid_4x3x2()?;
        assert_eq!(g.get_cell_index_of_point(&[0.5, 0.5, 0.5])?, 0);
        assert_eq!(g.get_cell_index_of_point(&[4.0, 3.0, 2.0])?, g.size() - 1);
        let err = g.get_cell_index_of_point(&[5.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::OutOfDomain(_)));
        Ok(())
    }

    #[test]
    fn neighbours_do_not_wrap() -> Result<()> {
        let g = grid_4x3x2()?;
        let corner = g.get_neighbour_indicies(0);
        assert_eq!(corner.len(), 3);
        let inner = g.get_cell_index(&[1, 1, 0]);
        assert_eq!(g.get_neighbour_indicies(inner).len(), 5);
        for n in g.get_neighbour_indicies(inner) {
            assert!(g.get_distance_between(inner, n).is_ok());
        }
        Ok(())
    }

    #[test]
    fn distance_requires_adjacency() -> Result<()> {
        let g = StructuredGrid::new([0.0; 3], [4.0, 1.0, 1.0], [0.5, 1.0, 1.0])?;
        assert_eq!(g.get_distance_between(0, 1)?, 0.5);
        assert_eq!(g.get_laplace_coefficient(1, 0)?, 4.0);
        assert!(matches!(
            g.get_distance_between(0, 2),
            Err(Error::NotAdjacent { from: 0, to: 2 })
        ));
        assert!(g.get_distance_between(3, 3).is_err());
        Ok(())
    }

    #[test]
    fn face_points_from_origin_to_target() -> Result<()> {
        let g = grid_4x3x2()?;
        let i = g.get_cell_index(&[1, 1, 0]);
        for j in g.get_neighbour_indicies(i) {
            let face = g.get_face_between(i, j)?;
            let toward = crate::geometry::sub(&g.get_cell_centre(j), &g.get_cell_centre(i));
            assert!(crate::geometry::dot(face.get_normal(), &toward) > 0.0);
            let c = face.centre();
            let mid = crate::geometry::scale(
                &crate::geometry::add(&g.get_cell_centre(i), &g.get_cell_centre(j)),
                0.5,
            );
            for k in 0..DIM {
                assert!((c[k] - mid[k]).abs() < 1e-12);
            }
        }
        assert!(g.get_face_between(0, 5).is_err());
        Ok(())
    }

    #[test]
    fn slice_picks_one_layer() -> Result<()> {
        let g = grid_4x3x2()?;
        let plane = AxisAlignedPlane::new(0, 1.5, 1)?;
        let mut indices = Vec::new();
        g.get_slice(&plane, &mut indices);
        assert_eq!(indices.len(), 3 * 2);
        assert!(indices.iter().all(|&i| g.get_cell_coord(i)[0] == 1));

        // A plane on a cell boundary selects the layer below it.
        let plane = AxisAlignedPlane::new(0, 2.0, 1)?;
        g.get_slice(&plane, &mut indices);
        assert_eq!(indices.len(), 6);
        assert!(indices.iter().all(|&i| g.get_cell_coord(i)[0] == 1));
        Ok(())
    }

    #[test]
    fn slice_on_domain_faces_picks_outer_layers() -> Result<()> {
        let g = grid_4x3x2()?;
        let mut indices = Vec::new();
        for normal in [1, -1] {
            g.get_slice(&AxisAlignedPlane::new(0, 0.0, normal)?, &mut indices);
            assert_eq!(indices.len(), 6, "low face, normal {normal}");
            assert!(indices.iter().all(|&i| g.get_cell_coord(i)[0] == 0));

            g.get_slice(&AxisAlignedPlane::new(0, 4.0, normal)?, &mut indices);
            assert_eq!(indices.len(), 6, "high face, normal {normal}");
            assert!(indices.iter().all(|&i| g.get_cell_coord(i)[0] == 3));
        }
        Ok(())
    }

    #[test]
    fn region_uses_cell_centres() -> Result<()> {
        let g = grid_4x3x2()?;
        let sphere = Sphere::new([0.5, 0.5, 0.5], 0.6)?;
        let mut indices = Vec::new();
        g.get_region(&sphere, &mut indices);
        assert_eq!(indices, vec![0]);
        Ok(())
    }

    #[test]
    fn overlap_fractions_cover_box_volume() -> Result<()> {
        let g = grid_4x3x2()?;
        let mut indices = Vec::new();
        let mut fractions = Vec::new();
        g.get_overlap(&[0.5, 0.5, 0.0], &[1.5, 1.0, 1.0], &mut indices, &mut fractions)?;
        assert_eq!(indices.len(), 2);
        for f in &fractions {
            assert!((f - 0.25).abs() < 1e-12);
        }
        let covered: f64 = fractions.iter().sum::<f64>() * g.cell_volume();
        assert!((covered - 0.5).abs() < 1e-12);

        g.get_overlap(&[0.0; 3], &[4.0, 3.0, 2.0], &mut indices, &mut fractions)?;
        assert_eq!(indices.len(), g.size());
        assert!(fractions.iter().all(|f| (f - 1.0).abs() < 1e-12));

        assert!(g
            .get_overlap(&[10.0; 3], &[11.0; 3], &mut indices, &mut fractions)
            .is_err());
        Ok(())
    }
}
