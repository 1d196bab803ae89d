//! Material summary table: one record per computed material, typed columns,
//! filtering and binned statistics.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DataError;


/// One row of the material summary table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialRecord {
    pub formula: Option<String>,
    pub id: Option<String>,
    /// magnitude of the anomalous Hall vector
    pub norm_g: Option<f64>,
    /// magnitude of the Hall vector used for filtering and averaging
    pub norm_h: Option<f64>,
    #[serde(rename = "Hall_angle")]
    pub hall_angle: Option<f64>,
    pub spacegroup: Option<u32>,
    pub magnetic_symmetry: Option<String>,
    pub cond_xx: Option<f64>,
    pub gamma_convergence: Option<f64>,
    pub k_convergence: Option<f64>,
    pub total_magnetization: Option<f64>,
    pub average_magnetization: Option<f64>,
    #[serde(rename = "maxZ")]
    pub max_z: Option<u32>,
    #[serde(rename = "n_ms")]
    pub n_mirrors: Option<u32>,
    #[serde(rename = "n_syms")]
    pub n_symmetries: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Formula,
    Id,
    NormG,
    NormH,
    HallAngle,
    Spacegroup,
    MagneticSymmetry,
    CondXx,
    GammaConvergence,
    KConvergence,
    TotalMagnetization,
    AverageMagnetization,
    MaxZ,
    NMirrors,
    NSymmetries,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::Formula,
        Column::Id,
        Column::NormG,
        Column::NormH,
        Column::HallAngle,
        Column::Spacegroup,
        Column::MagneticSymmetry,
        Column::CondXx,
        Column::GammaConvergence,
        Column::KConvergence,
        Column::TotalMagnetization,
        Column::AverageMagnetization,
        Column::MaxZ,
        Column::NMirrors,
        Column::NSymmetries,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Column::Formula => "Formula",
            Column::Id => "MP id",
            Column::NormG => "AHE magnitude",
            Column::NormH => "Hall vector norm",
            Column::HallAngle => "AHE angle",
            Column::Spacegroup => "Non-mag spacegroup",
            Column::MagneticSymmetry => "Mag spacegroup",
            Column::CondXx => "Conductivity xx",
            Column::GammaConvergence => "Gamma conv",
            Column::KConvergence => "k conv",
            Column::TotalMagnetization => "Total Magnetization",
            Column::AverageMagnetization => "Average Magnetization",
            Column::MaxZ => "Maximum Z",
            Column::NMirrors => "Number of mirrors",
            Column::NSymmetries => "Number of symmetries",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        if label == "Magnetization" {
            return Some(Column::TotalMagnetization);
        }
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            Column::Formula | Column::Id | Column::MagneticSymmetry
        )
    }

    /// Fixed decimal places for display, `None` for integers and text.
    pub fn precision(&self) -> Option<usize> {
        match self {
            Column::HallAngle => Some(3),
            Column::NormG
            | Column::NormH
            | Column::CondXx
            | Column::GammaConvergence
            | Column::KConvergence
            | Column::TotalMagnetization
            | Column::AverageMagnetization => Some(2),
            _ => None,
        }
    }

    pub fn value(&self, r: &MaterialRecord) -> Option<f64> {
        let as_f64 = |v: Option<u32>| v.map(f64::from);
        match self {
            Column::NormG => r.norm_g,
            Column::NormH => r.norm_h,
            Column::HallAngle => r.hall_angle,
            Column::Spacegroup => as_f64(r.spacegroup),
            Column::CondXx => r.cond_xx,
            Column::GammaConvergence => r.gamma_convergence,
            Column::KConvergence => r.k_convergence,
            Column::TotalMagnetization => r.total_magnetization,
            Column::AverageMagnetization => r.average_magnetization,
            Column::MaxZ => as_f64(r.max_z),
            Column::NMirrors => as_f64(r.n_mirrors),
            Column::NSymmetries => as_f64(r.n_symmetries),
            Column::Formula | Column::Id | Column::MagneticSymmetry => None,
        }
    }

    pub fn text<'a>(&self, r: &'a MaterialRecord) -> Option<&'a str> {
        match self {
            Column::Formula => r.formula.as_deref(),
            Column::Id => r.id.as_deref(),
            Column::MagneticSymmetry => r.magnetic_symmetry.as_deref(),
            _ => None,
        }
    }

    /// Display string for a table cell; empty when the value is missing.
    pub fn format(&self, r: &MaterialRecord) -> String {
        if !self.is_numeric() {
            return self.text(r).unwrap_or_default().to_string();
        }
        match (self.value(r), self.precision()) {
            (Some(v), Some(p)) => format!("{:.*}", p, v),
            (Some(v), None) => format!("{}", v),
            (None, _) => String::new(),
        }
    }

    fn require_numeric(&self) -> Result<(), DataError> {
        if self.is_numeric() {
            Ok(())
        } else {
            Err(DataError::malformed(
                format!("column '{}'", self.label()),
                "not a numeric column",
            ))
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Binned counts of one column, optionally with the mean of another per bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// mean of the averaged column per bin, NaN for empty bins
    pub averages: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram2d {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    /// indexed `[x bin, y bin]`
    pub counts: Array2<usize>,
    pub averages: Option<Array2<f64>>,
}

struct Binning {
    lo: f64,
    width: f64,
    bins: usize,
}

impl Binning {
    fn over(values: impl Iterator<Item = f64>, bins: usize) -> Option<Self> {
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if bins == 0 || lo > hi {
            return None;
        }
        let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
        Some(Self { lo, width, bins })
    }

    fn index(&self, v: f64) -> usize {
        (((v - self.lo) / self.width) as usize).min(self.bins - 1)
    }

    fn edges(&self) -> Vec<f64> {
        (0..=self.bins)
            .map(|i| self.lo + self.width * i as f64)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    records: Vec<MaterialRecord>,
}

impl Catalog {
    pub fn new(records: Vec<MaterialRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[MaterialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose value lies strictly inside `(lo, hi)`.
    pub fn filter_range(&self, column: Column, lo: f64, hi: f64) -> Result<Catalog, DataError> {
        column.require_numeric()?;
        Ok(Catalog::new(
            self.records
                .iter()
                .filter(|r| column.value(r).is_some_and(|v| v > lo && v < hi))
                .cloned()
                .collect(),
        ))
    }

    /// Records carrying `column`, largest first.
    pub fn sorted_desc(&self, column: Column) -> Vec<&MaterialRecord> {
        if column.is_numeric() {
            let mut rows: Vec<_> = self
                .records
                .iter()
                .filter_map(|r| column.value(r).map(|v| (v, r)))
                .collect();
            rows.sort_by(|a, b| b.0.total_cmp(&a.0));
            rows.into_iter().map(|(_, r)| r).collect()
        } else {
            let mut rows: Vec<_> = self
                .records
                .iter()
                .filter_map(|r| column.text(r).map(|v| (v, r)))
                .collect();
            rows.sort_by(|a, b| b.0.cmp(a.0));
            rows.into_iter().map(|(_, r)| r).collect()
        }
    }

    /// Records whose formula contains every whitespace-separated token of `query`.
    pub fn search(&self, query: &str) -> Vec<&MaterialRecord> {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        self.records
            .iter()
            .filter(|r| {
                tokens.is_empty()
                    || r.formula
                        .as_deref()
                        .is_some_and(|f| tokens.iter().all(|t| f.contains(t)))
            })
            .collect()
    }

    pub fn histogram(
        &self,
        x: Column,
        avg: Option<Column>,
        bins: usize,
    ) -> Result<Histogram, DataError> {
        x.require_numeric()?;
        if let Some(a) = avg {
            a.require_numeric()?;
        }
        let rows: Vec<(f64, f64)> = self
            .records
            .iter()
            .filter_map(|r| {
                let xv = x.value(r)?;
                match avg {
                    Some(a) => a.value(r).map(|av| (xv, av)),
                    None => Some((xv, 0.0)),
                }
            })
            .collect();

        let binning = Binning::over(rows.iter().map(|r| r.0), bins).ok_or_else(|| {
            DataError::Missing {
                what: format!("values of '{}' to bin", x.label()),
            }
        })?;

        let mut counts = vec![0usize; bins];
        let mut sums = vec![0.0; bins];
        for &(xv, av) in &rows {
            let i = binning.index(xv);
            counts[i] += 1;
            sums[i] += av;
        }
        let averages = avg.map(|_| {
            sums.iter()
                .zip(&counts)
                .map(|(s, &c)| if c > 0 { s / c as f64 } else { f64::NAN })
                .collect()
        });

        Ok(Histogram {
            edges: binning.edges(),
            counts,
            averages,
        })
    }

    pub fn histogram2d(
        &self,
        x: Column,
        y: Column,
        avg: Option<Column>,
        bins: usize,
    ) -> Result<Histogram2d, DataError> {
        x.require_numeric()?;
        y.require_numeric()?;
        if let Some(a) = avg {
            a.require_numeric()?;
        }
        let rows: Vec<(f64, f64, f64)> = self
            .records
            .iter()
            .filter_map(|r| {
                let (xv, yv) = (x.value(r)?, y.value(r)?);
                match avg {
                    Some(a) => a.value(r).map(|av| (xv, yv, av)),
                    None => Some((xv, yv, 0.0)),
                }
            })
            .collect();

        let missing = || DataError::Missing {
            what: format!("values of '{}' and '{}' to bin", x.label(), y.label()),
        };
        let bx = Binning::over(rows.iter().map(|r| r.0), bins).ok_or_else(missing)?;
        let by = Binning::over(rows.iter().map(|r| r.1), bins).ok_or_else(missing)?;

        let mut counts = Array2::<usize>::zeros((bins, bins));
        let mut sums = Array2::<f64>::zeros((bins, bins));
        for &(xv, yv, av) in &rows {
            let idx = [bx.index(xv), by.index(yv)];
            counts[idx] += 1;
            sums[idx] += av;
        }
        let averages = avg.map(|_| {
            ndarray::Zip::from(&sums)
                .and(&counts)
                .map_collect(|&s, &c| if c > 0 { s / c as f64 } else { f64::NAN })
        });

        Ok(Histogram2d {
            x_edges: bx.edges(),
            y_edges: by.edges(),
            counts,
            averages,
        })
    }
}
