use std::collections::HashMap;

use kslice::{
    crossings::{self, CrossingSet},
    error::{DataError, SliceError},
    field::ScalarField,
    interp::GridInterpolator,
    lattice::{LatticeTransform, Plane, PLANE_TOLERANCE},
    linres::{ConvergenceReport, LinresTensor},
    report::{LinresReport, CONVERGENCE_COMPONENT},
    sampler,
};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn to_py_err(e: SliceError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn data_err(e: DataError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn interpolator(field_flat: Vec<f64>, n: usize) -> PyResult<GridInterpolator> {
    let field = ScalarField::from_flat(n, field_flat).map_err(to_py_err)?;
    Ok(GridInterpolator::new(&field))
}

fn plane(k1: [f64; 3], k2: [f64; 3], shift: [f64; 3]) -> PyResult<Plane> {
    let plane = Plane::new(k1, k2, shift);
    plane.validate().map_err(to_py_err)?;
    Ok(plane)
}

/// Resample a flattened `n×n×n` periodic field on a plane.
/// Returns `nk` rows of `nk` values, row `i` at `a = i/nk`.
#[pyfunction]
#[pyo3(signature = (field_flat, n, k1, k2, shift, nk, transform = None))]
fn sample_plane(
    field_flat: Vec<f64>,
    n: usize,
    k1: [f64; 3],
    k2: [f64; 3],
    shift: [f64; 3],
    nk: usize,
    transform: Option<[[f64; 3]; 3]>,
) -> PyResult<Vec<Vec<f64>>> {
    let intp = interpolator(field_flat, n)?;
    let plane = plane(k1, k2, shift)?;
    let transform = transform.map(LatticeTransform::new);
    let values =
        sampler::sample_plane(&intp, &plane, transform.as_ref(), nk).map_err(to_py_err)?;
    Ok(values.outer_iter().map(|row| row.to_vec()).collect())
}

/// Resample a flattened `n×n×n` periodic field on an `nk×nk×nk` mesh, returned flattened.
#[pyfunction]
#[pyo3(signature = (field_flat, n, nk, transform = None))]
fn sample_volume(
    field_flat: Vec<f64>,
    n: usize,
    nk: usize,
    transform: Option<[[f64; 3]; 3]>,
) -> PyResult<Vec<f64>> {
    let intp = interpolator(field_flat, n)?;
    let transform = transform.map(LatticeTransform::new);
    let values = sampler::sample_volume(&intp, transform.as_ref(), nk).map_err(to_py_err)?;
    Ok(values.iter().copied().collect())
}

/// Project crossing bands onto a plane. Any point off the plane raises `ValueError`.
#[pyfunction]
#[pyo3(signature = (bands, k1, k2, shift, transform = None, tol = PLANE_TOLERANCE))]
fn project_crossings(
    bands: Vec<Vec<[f64; 3]>>,
    k1: [f64; 3],
    k2: [f64; 3],
    shift: [f64; 3],
    transform: Option<[[f64; 3]; 3]>,
    tol: f64,
) -> PyResult<Vec<Vec<[f64; 2]>>> {
    let plane = plane(k1, k2, shift)?;
    let transform = transform.map(LatticeTransform::new);
    let set = CrossingSet::from_bands(bands);
    let projected = crossings::project_crossings(&set, &plane, transform.as_ref(), tol)
        .map_err(to_py_err)?;
    Ok(projected
        .into_iter()
        .map(|band| {
            band.coords
                .outer_iter()
                .map(|row| [row[0], row[1]])
                .collect()
        })
        .collect())
}

/// Derived quantities of a flattened linear-response tensor of shape `(2, n_gamma, n_spin, 3, 3)`.
/// Quantities the tensor cannot provide map to `None`.
#[pyfunction]
fn derived_fields(shape: Vec<usize>, data: Vec<f64>) -> PyResult<HashMap<String, Option<f64>>> {
    let tensor = LinresTensor::from_flat(&shape, data).map_err(data_err)?;
    let report = LinresReport::new(&tensor, None).map_err(data_err)?;
    Ok(report
        .derived
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect())
}

/// k-mesh and smearing convergence of one anomalous Hall component, in percent.
/// Returns `(k_percent, gamma_percent, converged)`.
#[pyfunction]
#[pyo3(signature = (shape, coarse, fine, component = CONVERGENCE_COMPONENT))]
fn convergence(
    shape: Vec<usize>,
    coarse: Vec<f64>,
    fine: Vec<f64>,
    component: (usize, usize),
) -> PyResult<(Vec<f64>, Vec<f64>, Vec<bool>)> {
    let coarse = LinresTensor::from_flat(&shape, coarse).map_err(data_err)?;
    let fine = LinresTensor::from_flat(&shape, fine).map_err(data_err)?;
    let report = ConvergenceReport::between(&coarse, &fine, component.0, component.1)
        .map_err(data_err)?;
    Ok((report.k_percent, report.gamma_percent, report.converged))
}

#[pymodule]
fn _kslice_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(sample_plane, m)?)?;
    m.add_function(wrap_pyfunction!(sample_volume, m)?)?;
    m.add_function(wrap_pyfunction!(project_crossings, m)?)?;
    m.add_function(wrap_pyfunction!(derived_fields, m)?)?;
    m.add_function(wrap_pyfunction!(convergence, m)?)?;
    Ok(())
}
