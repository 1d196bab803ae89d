//! Band-crossing loci and their projection into plane coordinates.

use nalgebra::Vector3;
use ndarray::Array2;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::SliceError;
use crate::lattice::{LatticeTransform, Plane};


/// An ordered sequence of k-points where one pair of bands is degenerate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub label: String,
    pub points: Vec<Vector3<f64>>,
}

/// Labelled crossing loci supplied by upstream analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrossingSet {
    pub bands: Vec<Band>,
}

impl CrossingSet {
    /// Builds a set from unlabelled bands, naming them `band <index>`.
    pub fn from_bands(bands: Vec<Vec<[f64; 3]>>) -> Self {
        Self {
            bands: bands
                .into_iter()
                .enumerate()
                .map(|(i, points)| Band {
                    label: format!("band {}", i),
                    points: points.into_iter().map(Vector3::from).collect(),
                })
                .collect(),
        }
    }

    /// Keeps the bands at the given indices, in the given order. Unknown indices are skipped.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            bands: indices
                .iter()
                .filter_map(|&i| self.bands.get(i).cloned())
                .collect(),
        }
    }

    pub fn num_points(&self) -> usize {
        self.bands.iter().map(|b| b.points.len()).sum()
    }
}

/// In-plane coordinates of one band, one `(a, b)` row per crossing point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedBand {
    pub label: String,
    #[serde(serialize_with = "as_rows")]
    pub coords: Array2<f64>,
}

fn as_rows<S: Serializer>(coords: &Array2<f64>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(coords.outer_iter().map(|row| row.to_vec()))
}

/// Projects every crossing point onto the plane.
///
/// The first point farther than `tolerance` from the plane aborts the whole
/// projection; no point is ever dropped or moved.
pub fn project_crossings(
    set: &CrossingSet,
    plane: &Plane,
    transform: Option<&LatticeTransform>,
    tolerance: f64,
) -> Result<Vec<ProjectedBand>, SliceError> {
    set.bands
        .iter()
        .map(|band| {
            let mut coords = Array2::zeros((band.points.len(), 2));
            for (row, p) in band.points.iter().enumerate() {
                let ab = plane.project(p, transform, tolerance)?;
                coords[[row, 0]] = ab.x;
                coords[[row, 1]] = ab.y;
            }
            Ok(ProjectedBand {
                label: band.label.clone(),
                coords,
            })
        })
        .collect()
}
