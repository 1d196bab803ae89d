//! Loading of serialized numeric snapshots: fields, crossings, linear-response
//! tensors and material catalogs.
//!
//! Every loader separates three failure modes: the file is not there
//! ([`DataError::Missing`]), it could not be read ([`DataError::Unavailable`]),
//! or it was read but does not hold what it should ([`DataError::Malformed`]).

use std::{fs::File, io::BufReader, io::ErrorKind, path::Path};

use itertools::Itertools;
use num_complex::Complex64;
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    catalog::{Catalog, MaterialRecord},
    crossings::{Band, CrossingSet},
    error::DataError,
    field::ScalarField,
    linres::LinresTensor,
};


/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataError::Missing {
            what: path.display().to_string(),
        },
        _ => DataError::Unavailable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| DataError::malformed(path.display().to_string(), e))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldSnapshot {
    Flat { shape: Vec<usize>, data: Vec<f64> },
    Complex {
        shape: Vec<usize>,
        re: Vec<f64>,
        im: Vec<f64>,
    },
    Nested(Vec<Vec<Vec<f64>>>),
}

fn cubic_n(shape: &[usize], what: &str) -> Result<usize, DataError> {
    match shape {
        [a, b, c] if a == b && b == c => Ok(*a),
        _ => Err(DataError::malformed(
            what,
            format!("expected a cubic rank-3 shape, got {:?}", shape),
        )),
    }
}

fn flatten_nested(nested: Vec<Vec<Vec<f64>>>, what: &str) -> Result<(usize, Vec<f64>), DataError> {
    let n = nested.len();
    let regular = nested
        .iter()
        .all(|plane| plane.len() == n && plane.iter().all(|row| row.len() == n));
    if !regular {
        return Err(DataError::malformed(what, "nested field is ragged or not cubic"));
    }
    Ok((n, nested.into_iter().flatten().flatten().collect()))
}

/// Loads a real-valued field snapshot.
pub fn load_field(path: &Path) -> Result<ScalarField<f64>, DataError> {
    let what = path.display().to_string();
    let (n, data) = match read_json::<FieldSnapshot>(path)? {
        FieldSnapshot::Flat { shape, data } => (cubic_n(&shape, &what)?, data),
        FieldSnapshot::Nested(nested) => flatten_nested(nested, &what)?,
        FieldSnapshot::Complex { .. } => {
            return Err(DataError::malformed(
                what,
                "complex field where a real field was expected",
            ))
        }
    };
    ScalarField::from_flat(n, data).map_err(|e| DataError::malformed(what, e))
}

/// Loads a complex-valued field snapshot. Real snapshots get a zero imaginary part.
pub fn load_complex_field(path: &Path) -> Result<ScalarField<Complex64>, DataError> {
    let what = path.display().to_string();
    let (n, data) = match read_json::<FieldSnapshot>(path)? {
        FieldSnapshot::Complex { shape, re, im } => {
            if re.len() != im.len() {
                return Err(DataError::malformed(
                    what,
                    format!("{} real parts but {} imaginary parts", re.len(), im.len()),
                ));
            }
            let data = re
                .into_iter()
                .zip_eq(im)
                .map(|(re, im)| Complex64::new(re, im))
                .collect();
            (cubic_n(&shape, &what)?, data)
        }
        FieldSnapshot::Flat { shape, data } => (
            cubic_n(&shape, &what)?,
            data.into_iter().map(|re| Complex64::new(re, 0.0)).collect(),
        ),
        FieldSnapshot::Nested(nested) => {
            let (n, data) = flatten_nested(nested, &what)?;
            (n, data.into_iter().map(|re| Complex64::new(re, 0.0)).collect())
        }
    };
    ScalarField::from_flat(n, data).map_err(|e| DataError::malformed(what, e))
}

#[derive(Deserialize)]
struct LabelledBand {
    label: String,
    points: Vec<[f64; 3]>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CrossingSnapshot {
    Plain(Vec<Vec<[f64; 3]>>),
    Labelled(Vec<LabelledBand>),
}

/// Loads a crossing point set, either as bare nested arrays or as labelled bands.
pub fn load_crossings(path: &Path) -> Result<CrossingSet, DataError> {
    Ok(match read_json::<CrossingSnapshot>(path)? {
        CrossingSnapshot::Plain(bands) => CrossingSet::from_bands(bands),
        CrossingSnapshot::Labelled(bands) => CrossingSet {
            bands: bands
                .into_iter()
                .map(|b| Band {
                    label: b.label,
                    points: b.points.into_iter().map(Into::into).collect(),
                })
                .collect(),
        },
    })
}

#[derive(Deserialize)]
struct TensorSnapshot {
    shape: Vec<usize>,
    data: Vec<f64>,
}

/// Loads a linear-response result tensor.
pub fn load_linres(path: &Path) -> Result<LinresTensor, DataError> {
    let snap: TensorSnapshot = read_json(path)?;
    LinresTensor::from_flat(&snap.shape, snap.data)
}

/// Loads a material summary table stored as a list of records.
pub fn load_catalog(path: &Path) -> Result<Catalog, DataError> {
    let records: Vec<MaterialRecord> = read_json(path)?;
    Ok(Catalog::new(records))
}
