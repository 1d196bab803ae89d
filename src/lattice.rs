//! Coordinate mapping between plane parametrisations and fractional lattice coordinates.

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::SliceError;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    fn xy_plane(shift: [f64; 3]) -> Plane {
        Plane::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], shift)
    }

    #[test]
    fn wrap_into_half_open_interval() {
        let w = wrap_unit(Vector3::new(1.25, -0.25, 3.0));
        assert_abs_diff_eq!(w, Vector3::new(0.25, 0.75, 0.0), epsilon = 1e-15);
        // tiny negatives round to 1.0 under rem_euclid and must fold back to 0
        let w = wrap_unit(Vector3::new(-1e-18, 0.0, 0.0));
        assert!(w.x >= 0.0 && w.x < 1.0);
    }

    #[test]
    fn map_applies_transform_before_wrap() {
        let t = LatticeTransform::new([[0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]]);
        let q = map_point(&Vector3::new(0.5, 0.5, 0.5), Some(&t));
        // T p = (1, 1, 1) wraps to the origin; wrapping first would not
        assert_abs_diff_eq!(q, Vector3::zeros(), epsilon = 1e-15);
    }

    #[test]
    fn crossing_in_shifted_plane_projects() {
        let plane = xy_plane([0.0, 0.0, 0.5]);
        let ab = plane
            .project(&Vector3::new(0.5, 0.5, 0.5), None, PLANE_TOLERANCE)
            .unwrap();
        assert_abs_diff_eq!(ab, Vector2::new(0.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn crossing_off_plane_fails() {
        let plane = xy_plane([0.0, 0.0, 0.0]);
        let err = plane
            .project(&Vector3::new(0.5, 0.5, 0.5), None, PLANE_TOLERANCE)
            .unwrap_err();
        assert!(matches!(err, SliceError::NotInPlane { .. }));
    }

    #[test]
    fn round_trip_random_planes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let k1: [f64; 3] = [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)];
            let k2: [f64; 3] = [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)];
            let shift: [f64; 3] = [rng.random_range(0.0..1.0), rng.random_range(0.0..1.0), rng.random_range(0.0..1.0)];
            let plane = Plane::new(k1, k2, shift);
            if plane.normal().norm() < 1e-3 {
                continue;
            }
            let (a, b) = (rng.random_range(0.0..1.0), rng.random_range(0.0..1.0));
            let ab = plane
                .project(&plane.point(a, b), None, 1e-9)
                .unwrap();
            assert_abs_diff_eq!(ab, Vector2::new(a, b), epsilon = 1e-9);

            let off = plane.point(a, b) + plane.normal() * 1e-6;
            assert!(matches!(
                plane.project(&off, None, PLANE_TOLERANCE),
                Err(SliceError::NotInPlane { .. })
            ));
        }
    }

    #[test]
    fn projection_undoes_transform() {
        let t = LatticeTransform::new([[0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]]);
        let plane = Plane::new([1.0, 0.0, 0.0], [0.0, 1.0, 1.0], [0.0, 0.0, 0.0]);
        let p = t.apply(&plane.point(0.3, 0.6));
        let ab = plane.project(&p, Some(&t), 1e-12).unwrap();
        assert_abs_diff_eq!(ab, Vector2::new(0.3, 0.6), epsilon = 1e-12);
    }

    #[test]
    fn off_plane_error_names_input_point() {
        let t = LatticeTransform::new([[0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]]);
        // T⁻¹ (1, 1, 1) = (0.5, 0.5, 0.5), off the z = 0 plane
        let err = xy_plane([0.0, 0.0, 0.0])
            .project(&Vector3::new(1.0, 1.0, 1.0), Some(&t), PLANE_TOLERANCE)
            .unwrap_err();
        match err {
            SliceError::NotInPlane { point, residual, .. } => {
                assert_eq!(point, [1.0, 1.0, 1.0]);
                assert_abs_diff_eq!(residual, 0.5, epsilon = 1e-12);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn parallel_basis_is_degenerate() {
        let plane = Plane::new([1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        assert_eq!(
            plane.project(&Vector3::zeros(), None, PLANE_TOLERANCE),
            Err(SliceError::DegeneratePlane)
        );
        assert!(plane.validate().is_err());
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        let t = LatticeTransform::new([[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(t.inverse().unwrap_err(), SliceError::SingularTransform);
    }

    #[test]
    fn reciprocal_of_cubic() {
        let a = 2.0;
        let b = Matrix3::from_diagonal_element(a);
        let g = reciprocal_lattice(&b).unwrap();
        assert_abs_diff_eq!(g, Matrix3::from_diagonal_element(2.0 * PI / a), epsilon = 1e-12);
        // a_i . b_j = 2 pi delta_ij
        let fcc = Matrix3::new(0.0, 0.5, 0.5, 0.5, 0.0, 0.5, 0.5, 0.5, 0.0);
        let g = reciprocal_lattice(&fcc).unwrap();
        assert_abs_diff_eq!(
            fcc.transpose() * g,
            Matrix3::identity() * 2.0 * PI,
            epsilon = 1e-12
        );
    }
}

pub use crate::config::PLANE_TOLERANCE;

/// Wraps every component into `[0, 1)`.
pub fn wrap_unit(v: Vector3<f64>) -> Vector3<f64> {
    v.map(|x| {
        let r = x.rem_euclid(1.0);
        if r >= 1.0 {
            0.0
        } else {
            r
        }
    })
}

/// Linear map between two fractional-coordinate bases, e.g. primitive to conventional cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeTransform(pub Matrix3<f64>);

impl LatticeTransform {
    /// Builds the transform from row-major entries.
    pub fn new(rows: [[f64; 3]; 3]) -> Self {
        Self(Matrix3::from_fn(|i, j| rows[i][j]))
    }

    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn apply(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.0 * p
    }

    pub fn inverse(&self) -> Result<Self, SliceError> {
        self.0
            .try_inverse()
            .map(Self)
            .ok_or(SliceError::SingularTransform)
    }
}

/// Maps a point to the fractional coordinate used to query the interpolant.
/// The transform is applied before wrapping, never after.
pub fn map_point(p: &Vector3<f64>, transform: Option<&LatticeTransform>) -> Vector3<f64> {
    let q = match transform {
        Some(t) => t.apply(p),
        None => *p,
    };
    wrap_unit(q)
}

/// Two basis vectors and a shift spanning an affine plane through the cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub k1: Vector3<f64>,
    pub k2: Vector3<f64>,
    pub shift: Vector3<f64>,
}

impl Plane {
    pub fn new(k1: [f64; 3], k2: [f64; 3], shift: [f64; 3]) -> Self {
        Self {
            k1: Vector3::from(k1),
            k2: Vector3::from(k2),
            shift: Vector3::from(shift),
        }
    }

    /// `a·k1 + b·k2 + shift`
    pub fn point(&self, a: f64, b: f64) -> Vector3<f64> {
        self.k1 * a + self.k2 * b + self.shift
    }

    pub fn normal(&self) -> Vector3<f64> {
        self.k1.cross(&self.k2)
    }

    pub fn validate(&self) -> Result<(), SliceError> {
        self.basis().try_inverse().map(|_| ()).ok_or(SliceError::DegeneratePlane)
    }

    fn basis(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.k1, self.k2, self.normal()])
    }

    /// Solves `[k1 | k2 | k1×k2] c = p - shift` and returns `(c0, c1)`.
    ///
    /// With a transform, `p` is taken in the transformed basis and mapped back
    /// with `T⁻¹` first. Fails if `|c2|` exceeds `tolerance`.
    pub fn project(
        &self,
        p: &Vector3<f64>,
        transform: Option<&LatticeTransform>,
        tolerance: f64,
    ) -> Result<Vector2<f64>, SliceError> {
        let q = match transform {
            Some(t) => t.inverse()?.apply(p),
            None => *p,
        };
        let c = self
            .basis()
            .lu()
            .solve(&(q - self.shift))
            .ok_or(SliceError::DegeneratePlane)?;
        if c.z.abs() > tolerance || c.z.is_nan() {
            return Err(SliceError::NotInPlane {
                point: [p.x, p.y, p.z],
                residual: c.z,
                tolerance,
            });
        }
        Ok(Vector2::new(c.x, c.y))
    }
}

/// Reciprocal lattice vectors (columns) of the direct lattice `b` (columns),
/// with the `2π` convention.
pub fn reciprocal_lattice(b: &Matrix3<f64>) -> Result<Matrix3<f64>, SliceError> {
    let (a1, a2, a3) = (b.column(0), b.column(1), b.column(2));
    let volume = a1.dot(&a2.cross(&a3));
    if volume.abs() < f64::EPSILON {
        return Err(SliceError::SingularTransform);
    }
    let scale = 2.0 * std::f64::consts::PI / volume;
    Ok(Matrix3::from_columns(&[
        a2.cross(&a3) * scale,
        a3.cross(&a1) * scale,
        a1.cross(&a2) * scale,
    ]))
}
