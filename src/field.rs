//! Periodic scalar fields sampled on a regular grid over the unit cell.
//!
//! A field of shape `N×N×N` holds values at fractional coordinates
//! `(i, j, k) / N`. The cell is periodic, so index `N` along any axis is the
//! same point as index `0`. [`ScalarField::pad_periodic`] materialises that
//! extra layer so that an interpolant built on `linspace(0, 1, N + 1)` is
//! continuous across the cell boundary.

use std::ops::{Add, Mul};

use ndarray::{Array3, ArrayD, Ix3};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::SliceError;


/// Element types a field can hold. Real and complex values both qualify.
pub trait FieldValue:
    Copy + Add<Output = Self> + Mul<f64, Output = Self> + Send + Sync + 'static
{
}

impl<T> FieldValue for T where
    T: Copy + Add<Output = T> + Mul<f64, Output = T> + Send + Sync + 'static
{
}

/// A cubic, non-empty 3D array of values on the periodic unit cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField<T = f64> {
    values: Array3<T>,
}

impl<T: FieldValue> ScalarField<T> {
    pub fn new(values: Array3<T>) -> Result<Self, SliceError> {
        let (a, b, c) = values.dim();
        if a == 0 || b == 0 || c == 0 {
            return Err(SliceError::EmptyField);
        }
        if a != b || b != c {
            return Err(SliceError::NonCubic {
                shape: vec![a, b, c],
            });
        }
        Ok(Self { values })
    }

    /// Builds a field from an array of unknown rank.
    pub fn from_dyn(values: ArrayD<T>) -> Result<Self, SliceError> {
        let rank = values.ndim();
        let values = values
            .into_dimensionality::<Ix3>()
            .map_err(|_| SliceError::WrongRank { rank })?;
        Self::new(values)
    }

    /// Builds an `n×n×n` field from row-major data.
    pub fn from_flat(n: usize, data: Vec<T>) -> Result<Self, SliceError> {
        if n == 0 {
            return Err(SliceError::EmptyField);
        }
        let expected = n * n * n;
        if data.len() != expected {
            return Err(SliceError::FlatLength {
                expected,
                got: data.len(),
            });
        }
        let values = Array3::from_shape_vec((n, n, n), data).map_err(|_| {
            SliceError::FlatLength {
                expected,
                got: expected,
            }
        })?;
        Self::new(values)
    }

    /// Number of grid points along each axis.
    pub fn n(&self) -> usize {
        self.values.dim().0
    }

    pub fn values(&self) -> &Array3<T> {
        &self.values
    }

    pub fn into_values(self) -> Array3<T> {
        self.values
    }

    pub fn map<U: FieldValue>(&self, f: impl Fn(T) -> U) -> ScalarField<U> {
        ScalarField {
            values: self.values.mapv(f),
        }
    }

    /// Returns the `(N+1)^3` array with `F'[i,j,k] = F[i mod N, j mod N, k mod N]`.
    pub fn pad_periodic(&self) -> Array3<T> {
        let n = self.n();
        Array3::from_shape_fn((n + 1, n + 1, n + 1), |(i, j, k)| {
            self.values[[i % n, j % n, k % n]]
        })
    }
}

/// Real quantity sliced out of a complex field snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldComponent {
    #[default]
    Real,
    Imag,
    Abs,
}

impl FieldComponent {
    pub fn of(self, z: Complex64) -> f64 {
        match self {
            FieldComponent::Real => z.re,
            FieldComponent::Imag => z.im,
            FieldComponent::Abs => z.norm(),
        }
    }
}
