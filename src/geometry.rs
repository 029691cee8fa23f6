//! Geometry primitives used to slice the grid and to place molecules that
//! leave the lattice.

use crate::error::{Error, Result};
use crate::random::{triangular, UniformSampler};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// A point or vector in 3D.
pub type Vect3 = [f64; DIM];

/// Scalar product.
#[inline]
pub fn dot(a: &Vect3, b: &Vect3) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Component-wise `a + b`.
#[inline]
pub fn add(a: &Vect3, b: &Vect3) -> Vect3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Component-wise `a - b`.
#[inline]
pub fn sub(a: &Vect3, b: &Vect3) -> Vect3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// `a` multiplied by `s`.
#[inline]
pub fn scale(a: &Vect3, s: f64) -> Vect3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Cross product `a x b`.
#[inline]
pub fn cross(a: &Vect3, b: &Vect3) -> Vect3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Euclidean length.
#[inline]
pub fn norm(a: &Vect3) -> f64 {
    dot(a, a).sqrt()
}

/// Anything the grid can be intersected with.
///
/// `is_in` classifies points as inside the shape; `segment_crosses` decides
/// whether a cell edge from `a` to `b` passes through its boundary. The
/// default crossing test compares the two endpoint classifications, which is
/// enough for closed shapes and half-spaces.
pub trait Geometry {
    fn is_in(&self, p: &Vect3) -> bool;

    fn segment_crosses(&self, a: &Vect3, b: &Vect3) -> bool {
        self.is_in(a) != self.is_in(b)
    }
}

/// Infinite plane perpendicular to axis `dim`, located at `coord`.
///
/// `normal` is +1 or -1 and picks which side counts as "inside": points with
/// `normal * (p[dim] - coord) < 0` lie behind the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedPlane {
    dim: usize,
    coord: f64,
    normal: f64,
}

impl AxisAlignedPlane {
    pub fn new(dim: usize, coord: f64, normal: i8) -> Result<Self> {
        if dim >= DIM {
            return Err(Error::InvalidParam(format!("plane axis {dim} out of range")));
        }
        if !coord.is_finite() {
            return Err(Error::InvalidParam("plane coordinate must be finite".into()));
        }
        if normal != 1 && normal != -1 {
            return Err(Error::InvalidParam("plane normal must be +1 or -1".into()));
        }
        Ok(Self {
            dim,
            coord,
            normal: f64::from(normal),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn coord(&self) -> f64 {
        self.coord
    }

    /// Signed distance from the plane along its normal.
    pub fn distance_to(&self, p: &Vect3) -> f64 {
        self.normal * (p[self.dim] - self.coord)
    }

    pub fn get_normal(&self) -> Vect3 {
        let mut n = [0.0; DIM];
        n[self.dim] = self.normal;
        n
    }
}

impl Geometry for AxisAlignedPlane {
    fn is_in(&self, p: &Vect3) -> bool {
        self.distance_to(p) < 0.0
    }
}

/// Axis-aligned rectangle lying in an [`AxisAlignedPlane`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedRectangle {
    plane: AxisAlignedPlane,
    low: Vect3,
    high: Vect3,
}

impl AxisAlignedRectangle {
    /// `low` and `high` must agree on exactly one coordinate, which fixes
    /// the plane axis.
    pub fn new(low: Vect3, high: Vect3, normal: i8) -> Result<Self> {
        let flat: Vec<usize> = (0..DIM).filter(|&k| low[k] == high[k]).collect();
        if flat.len() != 1 {
            return Err(Error::InvalidParam(
                "rectangle corners must share exactly one coordinate".into(),
            ));
        }
        let dim = flat[0];
        for k in 0..DIM {
            if k != dim && low[k] >= high[k] {
                return Err(Error::InvalidParam(
                    "rectangle low corner must be below high corner".into(),
                ));
            }
        }
        let plane = AxisAlignedPlane::new(dim, low[dim], normal)?;
        Ok(Self { plane, low, high })
    }

    pub fn plane(&self) -> &AxisAlignedPlane {
        &self.plane
    }

    pub fn get_normal(&self) -> Vect3 {
        self.plane.get_normal()
    }

    pub fn get_random_point<R: UniformSampler>(&self, rng: &mut R) -> Vect3 {
        let mut p = self.low;
        for (k, pk) in p.iter_mut().enumerate() {
            if k != self.plane.dim {
                *pk = self.low[k] + rng.closed_open() * (self.high[k] - self.low[k]);
            }
        }
        p
    }

    fn within_bounds(&self, p: &Vect3) -> bool {
        (0..DIM)
            .filter(|&k| k != self.plane.dim)
            .all(|k| p[k] >= self.low[k] && p[k] <= self.high[k])
    }
}

impl Geometry for AxisAlignedRectangle {
    fn is_in(&self, _p: &Vect3) -> bool {
        false
    }

    fn segment_crosses(&self, a: &Vect3, b: &Vect3) -> bool {
        if self.plane.is_in(a) == self.plane.is_in(b) {
            return false;
        }
        let da = self.plane.distance_to(a);
        let db = self.plane.distance_to(b);
        let t = da / (da - db);
        let x = add(a, &scale(&sub(b, a), t));
        self.within_bounds(&x)
    }
}

/// General rectangle: a corner plus two perpendicular edge vectors.
///
/// The normal is `edge1 x edge2` normalised, so edge order fixes orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    corner: Vect3,
    edge1: Vect3,
    edge2: Vect3,
    normal: Vect3,
}

impl Rectangle {
    pub fn new(corner: Vect3, edge1: Vect3, edge2: Vect3) -> Result<Self> {
        let n = cross(&edge1, &edge2);
        let len = norm(&n);
        if !len.is_finite() || len <= 0.0 {
            return Err(Error::MathError("degenerate rectangle edges".into()));
        }
        Ok(Self {
            corner,
            edge1,
            edge2,
            normal: scale(&n, 1.0 / len),
        })
    }

    pub fn corner(&self) -> &Vect3 {
        &self.corner
    }

    pub fn get_normal(&self) -> &Vect3 {
        &self.normal
    }

    pub fn centre(&self) -> Vect3 {
        add(
            &self.corner,
            &add(&scale(&self.edge1, 0.5), &scale(&self.edge2, 0.5)),
        )
    }

    pub fn area(&self) -> f64 {
        norm(&cross(&self.edge1, &self.edge2))
    }

    /// Uniform point on the rectangle.
    pub fn get_random_point<R: UniformSampler>(&self, rng: &mut R) -> Vect3 {
        let u1 = rng.closed_open();
        let u2 = rng.closed_open();
        self.point_at(u1, u2)
    }

    /// Point biased toward the centre by independent triangular draws along
    /// each edge, together with the rectangle normal.
    pub fn get_random_point_and_normal_triangle<R: UniformSampler>(
        &self,
        rng: &mut R,
    ) -> (Vect3, Vect3) {
        let t1 = triangular(rng.closed_open());
        let t2 = triangular(rng.closed_open());
        (self.point_at(t1, t2), self.normal)
    }

    fn point_at(&self, s: f64, t: f64) -> Vect3 {
        add(
            &self.corner,
            &add(&scale(&self.edge1, s), &scale(&self.edge2, t)),
        )
    }
}

impl Geometry for Rectangle {
    fn is_in(&self, _p: &Vect3) -> bool {
        false
    }

    fn segment_crosses(&self, a: &Vect3, b: &Vect3) -> bool {
        let da = dot(&sub(a, &self.corner), &self.normal);
        let db = dot(&sub(b, &self.corner), &self.normal);
        if (da < 0.0) == (db < 0.0) {
            return false;
        }
        let t = da / (da - db);
        let x = sub(&add(a, &scale(&sub(b, a), t)), &self.corner);
        let s1 = dot(&x, &self.edge1) / dot(&self.edge1, &self.edge1);
        let s2 = dot(&x, &self.edge2) / dot(&self.edge2, &self.edge2);
        (0.0..=1.0).contains(&s1) && (0.0..=1.0).contains(&s2)
    }
}

/// Solid axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cuboid {
    pub low: Vect3,
    pub high: Vect3,
}

impl Cuboid {
    pub fn new(low: Vect3, high: Vect3) -> Result<Self> {
        if (0..DIM).any(|k| !(low[k] < high[k])) {
            return Err(Error::InvalidParam("box low corner must be below high corner".into()));
        }
        Ok(Self { low, high })
    }
}

impl Geometry for Cuboid {
    fn is_in(&self, p: &Vect3) -> bool {
        (0..DIM).all(|k| p[k] >= self.low[k] && p[k] < self.high[k])
    }
}

/// Solid sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub centre: Vect3,
    pub radius: f64,
}

impl Sphere {
    pub fn new(centre: Vect3, radius: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        Ok(Self { centre, radius })
    }
}

impl Geometry for Sphere {
    fn is_in(&self, p: &Vect3) -> bool {
        let d = sub(p, &self.centre);
        dot(&d, &d) < self.radius * self.radius
    }
}
