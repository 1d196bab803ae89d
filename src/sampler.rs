//! Resampling of an interpolated field on planes, volumes and k-paths.
//!
//! Plane and volume meshes use parameters `i/nk` for `i = 0..nk`, so the
//! right-hand endpoint `1.0` is never part of the mesh and no mesh point is
//! duplicated by periodicity. Line profiles and surface meshes are for
//! display and include both endpoints.

use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array3};

use crate::error::SliceError;
use crate::field::FieldValue;
use crate::interp::GridInterpolator;
use crate::lattice::{map_point, LatticeTransform, Plane};


/// Mesh parameters `{0, 1/nk, …, (nk-1)/nk}`.
pub fn mesh(nk: usize) -> Result<Array1<f64>, SliceError> {
    if nk == 0 {
        return Err(SliceError::BadResolution);
    }
    Ok(Array1::from_shape_fn(nk, |i| i as f64 / nk as f64))
}

fn points_to_batch(points: &[Vector3<f64>]) -> Array2<f64> {
    Array2::from_shape_fn((points.len(), 3), |(i, c)| points[i][c])
}

/// Resamples the field on a plane into an `nk×nk` array indexed `[i, j]`
/// for the point `(i/nk)·k1 + (j/nk)·k2 + shift`.
pub fn sample_plane<T: FieldValue>(
    intp: &GridInterpolator<T>,
    plane: &Plane,
    transform: Option<&LatticeTransform>,
    nk: usize,
) -> Result<Array2<T>, SliceError> {
    let m = mesh(nk)?;
    let mut points = Vec::with_capacity(nk * nk);
    for &a in m.iter() {
        for &b in m.iter() {
            points.push(map_point(&plane.point(a, b), transform));
        }
    }

    let values = intp.eval_batch(points_to_batch(&points).view())?;
    values
        .into_shape_with_order((nk, nk))
        .map_err(|_| SliceError::BadResolution)
}

/// Resamples the whole cell into an `nk×nk×nk` array. With a transform, entry
/// `[i, j, l]` holds the field at `T·(i, j, l)/nk`.
pub fn sample_volume<T: FieldValue>(
    intp: &GridInterpolator<T>,
    transform: Option<&LatticeTransform>,
    nk: usize,
) -> Result<Array3<T>, SliceError> {
    let m = mesh(nk)?;
    let mut points = Vec::with_capacity(nk * nk * nk);
    for &x in m.iter() {
        for &y in m.iter() {
            for &z in m.iter() {
                points.push(map_point(&Vector3::new(x, y, z), transform));
            }
        }
    }

    let values = intp.eval_batch(points_to_batch(&points).view())?;
    values
        .into_shape_with_order((nk, nk, nk))
        .map_err(|_| SliceError::BadResolution)
}

/// Evaluates the field along an arbitrary sequence of k-points.
pub fn sample_path<T: FieldValue>(
    intp: &GridInterpolator<T>,
    points: &[Vector3<f64>],
    transform: Option<&LatticeTransform>,
) -> Result<Array1<T>, SliceError> {
    let mapped: Vec<_> = points.iter().map(|p| map_point(p, transform)).collect();
    intp.eval_batch(points_to_batch(&mapped).view())
}

/// `n` points along the in-plane line at fixed `b`, running `a` from 0 to 1 inclusive.
pub fn plane_line(plane: &Plane, b: f64, n: usize) -> Result<Vec<Vector3<f64>>, SliceError> {
    if n < 2 {
        return Err(SliceError::BadResolution);
    }
    Ok(Array1::linspace(0.0, 1.0, n)
        .iter()
        .map(|&a| plane.point(a, b))
        .collect())
}

/// `nps×nps` grid of Cartesian fractional points spanning the plane patch,
/// for overlaying planes on a 3D view. Entry `[i, j, :]` is the point at
/// `(a_i, b_j)` with `a, b = linspace(0, 1, nps)`.
pub fn surface_mesh(plane: &Plane, nps: usize) -> Array3<f64> {
    let ps = Array1::linspace(0.0, 1.0, nps);
    Array3::from_shape_fn((nps, nps, 3), |(i, j, c)| plane.point(ps[i], ps[j])[c])
}
