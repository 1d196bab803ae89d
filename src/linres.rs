//! Linear-response results: conductivity and anomalous Hall tensors as a
//! function of smearing, the scalar quantities derived from them, and
//! convergence checks between two k-meshes.
//!
//! A result tensor is indexed `X[q, g, s, i, j]`:
//! - `q`: 0 for the symmetric conductivity, 1 for the anomalous Hall part
//! - `g`: smearing index into [`GAMMAS`](crate::config::GAMMAS)
//! - `s`: spin channel
//! - `i, j`: Cartesian components

use ndarray::{Array1, Array5};
use serde::Serialize;

use crate::config::{CONVERGENCE_TOLERANCE, GAMMAS};
use crate::error::DataError;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tensor(ahe_xy: &[f64], cond_xx: f64) -> LinresTensor {
        let n = ahe_xy.len();
        let mut values = Array5::<f64>::zeros((2, n, 1, 3, 3));
        for (g, &v) in ahe_xy.iter().enumerate() {
            values[[1, g, 0, 0, 1]] = v;
            values[[0, g, 0, 0, 0]] = cond_xx;
        }
        values[[1, 0, 0, 0, 2]] = 3.0;
        values[[1, 0, 0, 1, 2]] = 4.0;
        LinresTensor::new(values).unwrap()
    }

    #[test]
    fn derived_fields() {
        let x = tensor(&[12.0, 11.0, 10.0, 9.0, 8.0], 200.0);
        assert_eq!(DerivedField::AheXy.extract(&x).unwrap(), 12.0);
        assert_eq!(DerivedField::AheXz.extract(&x).unwrap(), 3.0);
        assert_eq!(DerivedField::AheYz.extract(&x).unwrap(), 4.0);
        assert_abs_diff_eq!(DerivedField::AheTot.extract(&x).unwrap(), 13.0, epsilon = 1e-12);
        assert_eq!(DerivedField::CondXx.extract(&x).unwrap(), 200.0);
        assert_abs_diff_eq!(DerivedField::HallAngle.extract(&x).unwrap(), 0.065, epsilon = 1e-12);
    }

    #[test]
    fn standard_smearing_axis() {
        assert_eq!(tensor(&[1.0; 5], 1.0).gammas(), Some(&GAMMAS[..]));
        assert_eq!(tensor(&[1.0; 3], 1.0).gammas(), None);
    }

    #[test]
    fn field_names_round_trip() {
        for field in DerivedField::ALL {
            assert_eq!(DerivedField::from_name(field.name()), Some(field));
        }
        assert_eq!(DerivedField::from_name("ahe-zz"), None);
    }

    #[test]
    fn hall_angle_needs_conductivity() {
        let x = tensor(&[1.0, 1.0, 1.0], 0.0);
        assert!(matches!(
            DerivedField::HallAngle.extract(&x),
            Err(DataError::Malformed { .. })
        ));
    }

    #[test]
    fn conductivity_needs_third_smearing() {
        let x = tensor(&[1.0, 1.0], 5.0);
        assert!(matches!(
            DerivedField::CondXx.extract(&x),
            Err(DataError::Missing { .. })
        ));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(LinresTensor::new(Array5::zeros((1, 5, 1, 3, 3))).is_err());
        assert!(LinresTensor::new(Array5::zeros((2, 5, 1, 2, 3))).is_err());
        assert!(LinresTensor::new(Array5::zeros((2, 0, 1, 3, 3))).is_err());
        assert!(LinresTensor::from_flat(&[2, 5, 1, 3], vec![0.0; 90]).is_err());
        assert!(LinresTensor::from_flat(&[2, 5, 1, 3, 3], vec![0.0; 89]).is_err());
        assert!(LinresTensor::from_flat(&[2, 5, 1, 3, 3], vec![0.0; 90]).is_ok());
    }

    #[test]
    fn relative_differences() {
        let coarse = [100.0, 100.0, 100.0, 100.0, 100.0];
        let fine = [100.0, 101.0, 100.0, 50.0, 100.0];
        let k = k_convergence(&coarse, &fine).unwrap();
        assert_abs_diff_eq!(k[1], 1.0 / 101.0, epsilon = 1e-12);
        assert_abs_diff_eq!(k[3], -1.0, epsilon = 1e-12);
        let g = gamma_convergence(&fine);
        assert_eq!(g.len(), 4);
        assert_abs_diff_eq!(g[0], -0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(g[2], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn converged_requires_both_meshes_and_neighbouring_smearing() {
        let coarse = [100.0, 100.0, 99.95, 90.0, 90.0];
        let fine = [100.0, 100.0, 100.0, 100.0, 100.0];
        let conv = is_converged(&coarse, &fine, 0.01, 0.01).unwrap();
        // k-mesh fails at g = 3 and 4, so windows touching them fail
        assert_eq!(conv, vec![true, true, false, false]);

        let fine = [100.0, 95.0, 95.0, 95.0, 95.0];
        let coarse = fine;
        let conv = is_converged(&coarse, &fine, 0.01, 0.01).unwrap();
        assert_eq!(conv, vec![false, true, true, true]);
    }

    #[test]
    fn mismatched_series() {
        assert!(k_convergence(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn percent_report() {
        let coarse = tensor(&[99.0, 100.0, 100.0, 100.0, 100.0], 1.0);
        let fine = tensor(&[100.0, 100.0, 100.0, 100.0, 100.0], 1.0);
        let report = ConvergenceReport::between(&coarse, &fine, 0, 1).unwrap();
        assert_abs_diff_eq!(report.k_percent[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(report.gamma_percent[0], 0.0, epsilon = 1e-12);
        // a 1% k-mesh difference is not below the 1% tolerance
        assert_eq!(report.converged, vec![false, true, true, true]);
    }

    #[test]
    fn report_rejects_bad_component() {
        let x = LinresTensor::new(Array5::zeros((2, 5, 1, 3, 3))).unwrap();
        assert!(matches!(
            ConvergenceReport::between(&x, &x, 3, 0),
            Err(DataError::Missing { .. })
        ));
        assert!(ConvergenceReport::between(&x, &x, 0, 3).is_err());
        assert!(x.ahe_series(3, 0).is_err());
        assert_eq!(x.ahe_series(0, 1).unwrap().len(), 5);
    }
}

/// A validated `2 × n_gamma × n_spin × 3 × 3` linear-response result.
#[derive(Debug, Clone, PartialEq)]
pub struct LinresTensor {
    values: Array5<f64>,
}

impl LinresTensor {
    pub fn new(values: Array5<f64>) -> Result<Self, DataError> {
        let (q, g, s, i, j) = values.dim();
        if q != 2 || g == 0 || s == 0 || i != 3 || j != 3 {
            return Err(DataError::malformed(
                "linear-response tensor",
                format!("unexpected shape {:?}", values.shape()),
            ));
        }
        Ok(Self { values })
    }

    pub fn from_flat(shape: &[usize], data: Vec<f64>) -> Result<Self, DataError> {
        let dims: [usize; 5] = shape.try_into().map_err(|_| {
            DataError::malformed(
                "linear-response tensor",
                format!("expected rank 5, got shape {:?}", shape),
            )
        })?;
        let values = Array5::from_shape_vec(dims, data)
            .map_err(|e| DataError::malformed("linear-response tensor", e))?;
        Self::new(values)
    }

    pub fn num_gammas(&self) -> usize {
        self.values.dim().1
    }

    /// Smearing values of the `g` axis, when the tensor uses the standard set.
    pub fn gammas(&self) -> Option<&'static [f64]> {
        (self.num_gammas() == GAMMAS.len()).then_some(&GAMMAS[..])
    }

    fn get(&self, q: usize, g: usize, i: usize, j: usize) -> Result<f64, DataError> {
        self.values
            .get([q, g, 0, i, j])
            .copied()
            .ok_or_else(|| DataError::Missing {
                what: format!("smearing index {} of linear-response tensor", g),
            })
    }

    pub fn conductivity(&self, g: usize, i: usize, j: usize) -> Result<f64, DataError> {
        self.get(0, g, i, j)
    }

    pub fn ahe(&self, g: usize, i: usize, j: usize) -> Result<f64, DataError> {
        self.get(1, g, i, j)
    }

    /// Anomalous Hall component `(i, j)` at every smearing, spin channel 0.
    pub fn ahe_series(&self, i: usize, j: usize) -> Result<Array1<f64>, DataError> {
        if i >= 3 || j >= 3 {
            return Err(DataError::Missing {
                what: format!("component ({}, {}) of linear-response tensor", i, j),
            });
        }
        Ok(self.values.slice(ndarray::s![1, .., 0, i, j]).to_owned())
    }
}

/// Scalar summaries of a result tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DerivedField {
    AheXy,
    AheXz,
    AheYz,
    AheTot,
    CondXx,
    HallAngle,
}

fn ahe_xy(x: &LinresTensor) -> Result<f64, DataError> {
    x.ahe(0, 0, 1)
}

fn ahe_xz(x: &LinresTensor) -> Result<f64, DataError> {
    x.ahe(0, 0, 2)
}

fn ahe_yz(x: &LinresTensor) -> Result<f64, DataError> {
    x.ahe(0, 1, 2)
}

fn ahe_tot(x: &LinresTensor) -> Result<f64, DataError> {
    let (xy, xz, yz) = (ahe_xy(x)?, ahe_xz(x)?, ahe_yz(x)?);
    Ok((xy * xy + xz * xz + yz * yz).sqrt())
}

fn cond_xx(x: &LinresTensor) -> Result<f64, DataError> {
    x.conductivity(2, 0, 0)
}

fn hall_angle(x: &LinresTensor) -> Result<f64, DataError> {
    let cond = cond_xx(x)?;
    if cond == 0.0 {
        return Err(DataError::malformed(
            "Hall angle",
            "longitudinal conductivity is zero",
        ));
    }
    Ok(ahe_tot(x)? / cond)
}

impl DerivedField {
    pub const ALL: [DerivedField; 6] = [
        DerivedField::AheXy,
        DerivedField::AheXz,
        DerivedField::AheYz,
        DerivedField::AheTot,
        DerivedField::CondXx,
        DerivedField::HallAngle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DerivedField::AheXy => "ahe-xy",
            DerivedField::AheXz => "ahe-xz",
            DerivedField::AheYz => "ahe-yz",
            DerivedField::AheTot => "ahe-tot",
            DerivedField::CondXx => "cond_xx",
            DerivedField::HallAngle => "hall_angle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn extractor(&self) -> fn(&LinresTensor) -> Result<f64, DataError> {
        match self {
            DerivedField::AheXy => ahe_xy,
            DerivedField::AheXz => ahe_xz,
            DerivedField::AheYz => ahe_yz,
            DerivedField::AheTot => ahe_tot,
            DerivedField::CondXx => cond_xx,
            DerivedField::HallAngle => hall_angle,
        }
    }

    pub fn extract(&self, x: &LinresTensor) -> Result<f64, DataError> {
        (self.extractor())(x)
    }
}

fn check_lengths(coarse: &[f64], fine: &[f64]) -> Result<(), DataError> {
    if coarse.len() != fine.len() {
        return Err(DataError::malformed(
            "convergence series",
            format!("{} coarse values but {} fine values", coarse.len(), fine.len()),
        ));
    }
    Ok(())
}

/// `(fine[g] - coarse[g]) / fine[g]` for every smearing.
pub fn k_convergence(coarse: &[f64], fine: &[f64]) -> Result<Vec<f64>, DataError> {
    check_lengths(coarse, fine)?;
    Ok(coarse
        .iter()
        .zip(fine)
        .map(|(c, f)| (f - c) / f)
        .collect())
}

/// `(fine[g] - fine[g+1]) / fine[g]` between neighbouring smearings.
pub fn gamma_convergence(fine: &[f64]) -> Vec<f64> {
    fine.windows(2).map(|w| (w[0] - w[1]) / w[0]).collect()
}

/// Per smearing window `g`: converged in k at `g` and `g+1` and converged in smearing from `g` to `g+1`.
pub fn is_converged(
    coarse: &[f64],
    fine: &[f64],
    k_tol: f64,
    g_tol: f64,
) -> Result<Vec<bool>, DataError> {
    let k_ok: Vec<bool> = k_convergence(coarse, fine)?
        .into_iter()
        .map(|d| d.abs() < k_tol)
        .collect();
    let g_ok = gamma_convergence(fine).into_iter().map(|d| d.abs() < g_tol);

    Ok(g_ok
        .enumerate()
        .map(|(g, ok)| k_ok[g] && k_ok[g + 1] && ok)
        .collect())
}

/// Convergence of one anomalous Hall component between a coarse and a fine k-mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    /// `|k_convergence| * 100`
    pub k_percent: Vec<f64>,
    /// `|gamma_convergence| * 100` of the fine mesh
    pub gamma_percent: Vec<f64>,
    pub converged: Vec<bool>,
}

impl ConvergenceReport {
    pub fn between(
        coarse: &LinresTensor,
        fine: &LinresTensor,
        i: usize,
        j: usize,
    ) -> Result<Self, DataError> {
        Self::with_tolerances(coarse, fine, i, j, CONVERGENCE_TOLERANCE, CONVERGENCE_TOLERANCE)
    }

    pub fn with_tolerances(
        coarse: &LinresTensor,
        fine: &LinresTensor,
        i: usize,
        j: usize,
        k_tol: f64,
        g_tol: f64,
    ) -> Result<Self, DataError> {
        let coarse = coarse.ahe_series(i, j)?.to_vec();
        let fine = fine.ahe_series(i, j)?.to_vec();

        let k_percent = k_convergence(&coarse, &fine)?
            .into_iter()
            .map(|d| d.abs() * 100.0)
            .collect();
        let gamma_percent = gamma_convergence(&fine)
            .into_iter()
            .map(|d| d.abs() * 100.0)
            .collect();
        let converged = is_converged(&coarse, &fine, k_tol, g_tol)?;

        Ok(Self {
            k_percent,
            gamma_percent,
            converged,
        })
    }
}
