//! Multilinear interpolation over a periodically padded field.
//!
//! The interpolant lives on the closed unit cube `[0,1]^3` with nodes at
//! `linspace(0, 1, N + 1)` along every axis. Queries outside the cube are an
//! error; callers wrap coordinates first (see [`crate::lattice::wrap_unit`]).

use nalgebra::Vector3;
use ndarray::{Array1, Array3, ArrayView2};

use crate::error::SliceError;
use crate::field::{FieldValue, ScalarField};


/// Read-only multilinear interpolant over the padded field.
#[derive(Debug, Clone)]
pub struct GridInterpolator<T = f64> {
    grid: Array3<T>,
    axis: Array1<f64>,
}

fn lerp<T: FieldValue>(a: T, b: T, t: f64) -> T {
    a * (1.0 - t) + b * t
}

impl<T: FieldValue> GridInterpolator<T> {
    /// Pads the field periodically and builds the interpolant on `[0,1]^3`.
    pub fn new(field: &ScalarField<T>) -> Self {
        let grid = field.pad_periodic();
        let axis = Array1::linspace(0.0, 1.0, field.n() + 1);
        Self { grid, axis }
    }

    /// Node coordinates along each axis.
    pub fn axis(&self) -> &Array1<f64> {
        &self.axis
    }

    /// Number of cells along each axis.
    pub fn cells(&self) -> usize {
        self.axis.len() - 1
    }

    // lower node index and offset within the cell
    fn locate(&self, x: f64) -> (usize, f64) {
        let n = self.cells();
        let s = x * n as f64;
        let i = (s.floor() as usize).min(n - 1);
        (i, s - i as f64)
    }

    pub fn eval(&self, q: &Vector3<f64>) -> Result<T, SliceError> {
        if !q.iter().all(|x| (0.0..=1.0).contains(x)) {
            return Err(SliceError::OutOfBounds {
                point: [q.x, q.y, q.z],
            });
        }

        let (i, tx) = self.locate(q.x);
        let (j, ty) = self.locate(q.y);
        let (k, tz) = self.locate(q.z);
        let g = &self.grid;

        let c00 = lerp(g[[i, j, k]], g[[i + 1, j, k]], tx);
        let c10 = lerp(g[[i, j + 1, k]], g[[i + 1, j + 1, k]], tx);
        let c01 = lerp(g[[i, j, k + 1]], g[[i + 1, j, k + 1]], tx);
        let c11 = lerp(g[[i, j + 1, k + 1]], g[[i + 1, j + 1, k + 1]], tx);

        let c0 = lerp(c00, c10, ty);
        let c1 = lerp(c01, c11, ty);

        Ok(lerp(c0, c1, tz))
    }

    /// Evaluates an `M×3` batch of points. Fails on the first point outside the cube.
    pub fn eval_batch(&self, points: ArrayView2<f64>) -> Result<Array1<T>, SliceError> {
        if points.ncols() != 3 {
            return Err(SliceError::BadPointBatch {
                cols: points.ncols(),
            });
        }
        points
            .outer_iter()
            .map(|row| self.eval(&Vector3::new(row[0], row[1], row[2])))
            .collect::<Result<Vec<T>, _>>()
            .map(Array1::from)
    }
}
