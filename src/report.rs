//! Material-level reports written next to the plane slices: the derived
//! linear-response quantities of one material, and binned statistics over the
//! material catalog.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::catalog::{Catalog, Column, Histogram, Histogram2d};
use crate::config::TOP_MATERIALS;
use crate::error::DataError;
use crate::linres::{ConvergenceReport, DerivedField, LinresTensor};


/// Anomalous Hall component whose k-mesh and smearing convergence is reported.
pub const CONVERGENCE_COMPONENT: (usize, usize) = (0, 1);

/// Derived quantities of one linear-response result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinresReport {
    /// smearing values, when the tensor uses the standard set
    pub gammas: Option<&'static [f64]>,
    /// `None` where the tensor lacks the data for a quantity
    pub derived: BTreeMap<&'static str, Option<f64>>,
    /// present when a coarse k-mesh result is given
    pub convergence: Option<ConvergenceReport>,
}

impl LinresReport {
    pub fn new(fine: &LinresTensor, coarse: Option<&LinresTensor>) -> Result<Self, DataError> {
        let derived = DerivedField::ALL
            .into_iter()
            .map(|field| {
                let value = field
                    .extract(fine)
                    .map_err(|e| debug!("{} unavailable: {}", field.name(), e))
                    .ok();
                (field.name(), value)
            })
            .collect();

        let (i, j) = CONVERGENCE_COMPONENT;
        let convergence = coarse
            .map(|coarse| ConvergenceReport::between(coarse, fine, i, j))
            .transpose()?;

        Ok(Self {
            gammas: fine.gammas(),
            derived,
            convergence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMaterial {
    pub formula: Option<String>,
    pub id: Option<String>,
    pub norm_g: f64,
}

/// Summary statistics of the material catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogReport {
    pub materials: usize,
    /// records left after the Hall vector norm filter
    pub selected: usize,
    /// largest anomalous Hall magnitude first
    pub top: Vec<RankedMaterial>,
    /// total magnetization, averaging the Hall vector norm when present
    pub magnetization: Histogram,
    /// total magnetization against the maximum atomic number
    pub magnetization_z: Histogram2d,
}

impl CatalogReport {
    pub fn new(
        catalog: &Catalog,
        norm_h_range: Option<[f64; 2]>,
        bins: usize,
    ) -> Result<Self, DataError> {
        let filtered;
        let selected = match norm_h_range {
            Some([lo, hi]) => {
                filtered = catalog.filter_range(Column::NormH, lo, hi)?;
                &filtered
            }
            None => catalog,
        };

        let top = selected
            .sorted_desc(Column::NormG)
            .into_iter()
            .take(TOP_MATERIALS)
            .filter_map(|r| {
                Some(RankedMaterial {
                    formula: r.formula.clone(),
                    id: r.id.clone(),
                    norm_g: r.norm_g?,
                })
            })
            .collect();

        let avg = selected
            .records()
            .iter()
            .any(|r| r.norm_h.is_some())
            .then_some(Column::NormH);
        let magnetization = selected.histogram(Column::TotalMagnetization, avg, bins)?;
        let magnetization_z =
            selected.histogram2d(Column::TotalMagnetization, Column::MaxZ, avg, bins)?;

        Ok(Self {
            materials: catalog.len(),
            selected: selected.len(),
            top,
            magnetization,
            magnetization_z,
        })
    }
}
