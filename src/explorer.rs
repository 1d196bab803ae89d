//! Slicing of one material's field onto every configured plane.
//!
//! [`Explorer`] owns the field, its interpolator and the optional crossing
//! set. Planes are independent and are sampled in parallel; each plane's
//! sampling is a single batch evaluation of the shared interpolator.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    catalog::Catalog,
    config::{HISTOGRAM_BINS, PROFILE_THRESHOLDS, SURFACE_POINTS},
    crossings::{project_crossings, CrossingSet, ProjectedBand},
    error::SliceError,
    field::{FieldComponent, ScalarField},
    interp::GridInterpolator,
    lattice::{reciprocal_lattice, LatticeTransform, Plane},
    linres::LinresTensor,
    output,
    report::{CatalogReport, LinresReport},
    sampler,
    settings::{PlaneSettings, Settings},
    snapshot,
    stats::{self, ContributionProfile, WeightedHistogram},
};


/// Field values along one in-plane line.
#[derive(Debug, Clone, Serialize)]
pub struct LineProfile {
    /// in-plane `b` coordinate of the line
    pub b: f64,
    /// abscissa, `a` scaled by `kscale`
    pub s: Array1<f64>,
    pub values: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct PlaneResult {
    pub name: String,
    pub plane: Plane,
    /// indexed `[i, j]` for the point `(i/nk)·k1 + (j/nk)·k2 + shift`
    pub values: Array2<f64>,
    /// colour scale limit
    pub vmax: f64,
    /// `None` when no crossings are configured
    pub crossings: Option<Result<Vec<ProjectedBand>, SliceError>>,
    pub lines: Vec<LineProfile>,
    pub elapsed: Duration,
}

#[derive(Debug, Serialize)]
struct PlaneSummary<'a> {
    name: &'a str,
    plane: &'a Plane,
    vmax: f64,
    crossing_bands: Option<usize>,
    crossing_error: Option<String>,
    lines: Vec<f64>,
    /// corner grid of the plane patch for 3D overlays
    surface: Vec<Vec<[f64; 3]>>,
    /// the same grid in Cartesian k-space, when a lattice is configured
    surface_cartesian: Option<Vec<Vec<[f64; 3]>>>,
    elapsed_ms: f64,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    material: &'a str,
    timestamp: String,
    field_points: usize,
    field_vmax: f64,
    hotspots: &'a ContributionProfile,
    field_histogram: Option<&'a WeightedHistogram>,
    /// reciprocal lattice vectors, one per row
    reciprocal_lattice: Option<[[f64; 3]; 3]>,
    planes: Vec<PlaneSummary<'a>>,
    volume_nk: Option<usize>,
    elapsed_ms: f64,
}

fn surface_rows(plane: &Plane, to_cartesian: Option<&Matrix3<f64>>) -> Vec<Vec<[f64; 3]>> {
    let mesh = sampler::surface_mesh(plane, SURFACE_POINTS);
    mesh.outer_iter()
        .map(|row| {
            row.outer_iter()
                .map(|p| {
                    let k = Vector3::new(p[0], p[1], p[2]);
                    let k = to_cartesian.map_or(k, |g| g * k);
                    [k.x, k.y, k.z]
                })
                .collect()
        })
        .collect()
}

/// Plane slicing of one material.
#[derive(Debug)]
pub struct Explorer {
    pub settings: Settings,
    pub field: ScalarField,
    interpolator: GridInterpolator,
    transform: Option<LatticeTransform>,
    pub crossings: Option<CrossingSet>,
    /// fine and optional coarse k-mesh linear-response results
    pub linres: Option<(LinresTensor, Option<LinresTensor>)>,
    pub catalog: Option<Catalog>,
    /// reciprocal lattice vectors as columns
    pub reciprocal: Option<Matrix3<f64>>,
    pub planes: Vec<PlaneResult>,
    pub volume: Option<Array3<f64>>,
    pub hotspots: Option<ContributionProfile>,
    pub field_histogram: Option<WeightedHistogram>,
    pub linres_report: Option<LinresReport>,
    pub catalog_report: Option<CatalogReport>,
    pub elapsed: Option<Duration>,
}

impl Explorer {
    /// Loads the field, and the crossings, linear-response results and catalog
    /// when configured, named in the settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let path = Path::new(&settings.field);
        let field = match settings.component {
            FieldComponent::Real => snapshot::load_field(path),
            component => {
                snapshot::load_complex_field(path).map(|f| f.map(|z| component.of(z)))
            }
        }
        .with_context(|| format!("loading field for {}", settings.material))?;
        info!("loaded {}^3 field from {}", field.n(), settings.field);

        let crossings = match &settings.crossings {
            Some(path) => {
                let set = snapshot::load_crossings(Path::new(path))
                    .with_context(|| format!("loading crossings for {}", settings.material))?;
                info!(
                    "loaded {} crossing bands ({} points) from {}",
                    set.bands.len(),
                    set.num_points(),
                    path
                );
                Some(set)
            }
            None => None,
        };

        let linres = match &settings.linres {
            Some(path) => {
                let fine = snapshot::load_linres(Path::new(path))
                    .with_context(|| format!("loading linear response of {}", settings.material))?;
                let coarse = settings
                    .linres_coarse
                    .as_ref()
                    .map(|path| snapshot::load_linres(Path::new(path)))
                    .transpose()
                    .context("loading coarse k-mesh linear response")?;
                info!(
                    "loaded linear response with {} smearings from {}",
                    fine.num_gammas(),
                    path
                );
                Some((fine, coarse))
            }
            None => None,
        };

        let catalog = settings
            .catalog
            .as_ref()
            .map(|path| snapshot::load_catalog(Path::new(path)))
            .transpose()
            .context("loading material catalog")?;
        if let Some(catalog) = &catalog {
            info!("loaded catalog of {} materials", catalog.len());
        }

        let mut explorer = Self::from_parts(settings, field, crossings)?;
        explorer.linres = linres;
        explorer.catalog = catalog;
        Ok(explorer)
    }

    pub fn from_parts(
        settings: Settings,
        field: ScalarField,
        crossings: Option<CrossingSet>,
    ) -> Result<Self> {
        settings.validate()?;
        let interpolator = GridInterpolator::new(&field);
        let transform = settings.transform();
        let reciprocal = settings
            .direct_lattice()
            .map(|b| reciprocal_lattice(&b))
            .transpose()?;
        Ok(Self {
            settings,
            field,
            interpolator,
            transform,
            crossings,
            linres: None,
            catalog: None,
            reciprocal,
            planes: Vec::new(),
            volume: None,
            hotspots: None,
            field_histogram: None,
            linres_report: None,
            catalog_report: None,
            elapsed: None,
        })
    }

    pub fn with_linres(mut self, fine: LinresTensor, coarse: Option<LinresTensor>) -> Self {
        self.linres = Some((fine, coarse));
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Samples every plane, its crossings and line profiles, and the volume if requested.
    pub fn solve(&mut self) -> Result<()> {
        let start = Instant::now();
        info!(
            "slicing {} planes of {} at nk = {}",
            self.settings.planes.len(),
            self.settings.material,
            self.settings.nk
        );

        let pb = ProgressBar::new(self.settings.planes.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg}",
            )
            .map(|style| style.progress_chars("█▇▆▅▄▃▂▁"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message("plane".to_string());

        let planes = self
            .settings
            .planes
            .par_iter()
            .map(|ps| {
                let result = self.solve_plane(ps);
                pb.inc(1);
                result
            })
            .collect::<Result<Vec<_>>>()?;
        pb.finish_and_clear();

        for p in &planes {
            if let Some(Err(e)) = &p.crossings {
                warn!("crossings not projected onto plane '{}': {}", p.name, e);
            }
        }
        self.planes = planes;

        if let Some(nk) = self.settings.volume_nk {
            debug!("resampling volume at nk = {}", nk);
            self.volume = Some(sampler::sample_volume(
                &self.interpolator,
                self.transform.as_ref(),
                nk,
            )?);
        }

        self.hotspots = Some(stats::contribution_profile(
            self.field.values(),
            None,
            PROFILE_THRESHOLDS,
        )?);
        self.field_histogram = Some(stats::weighted_histogram(
            self.field.values(),
            HISTOGRAM_BINS,
        )?);

        if let Some((fine, coarse)) = &self.linres {
            let report = LinresReport::new(fine, coarse.as_ref())
                .context("summarising linear-response results")?;
            if let Some(c) = &report.convergence {
                debug!("ahe convergence: {:?}", c.converged);
            }
            self.linres_report = Some(report);
        }
        if let Some(catalog) = &self.catalog {
            let report = CatalogReport::new(
                catalog,
                self.settings.norm_h_range,
                self.settings.catalog_bins,
            )
            .context("binning the material catalog")?;
            info!(
                "catalog: {} of {} materials selected",
                report.selected, report.materials
            );
            self.catalog_report = Some(report);
        }

        let duration = start.elapsed();
        info!("time taken: {:.2?}", duration);
        self.elapsed = Some(duration);
        Ok(())
    }

    fn solve_plane(&self, ps: &PlaneSettings) -> Result<PlaneResult> {
        let start = Instant::now();
        let plane = ps.plane();
        let transform = self.transform.as_ref();

        let values = sampler::sample_plane(&self.interpolator, &plane, transform, self.settings.nk)
            .with_context(|| format!("sampling plane '{}'", ps.name))?;
        let vmax = stats::colour_limit(&values, self.settings.vmax_sf)?;

        let crossings = self.crossings.as_ref().map(|set| {
            let selected;
            let set = match &ps.bands {
                Some(indices) => {
                    selected = set.select(indices);
                    &selected
                }
                None => set,
            };
            project_crossings(set, &plane, transform, self.settings.plane_tolerance)
        });

        let s = Array1::linspace(0.0, 1.0, self.settings.line_points) * self.settings.kscale;
        let lines = ps
            .lines
            .iter()
            .map(|&b| {
                let points = sampler::plane_line(&plane, b, self.settings.line_points)?;
                let values = sampler::sample_path(&self.interpolator, &points, transform)?;
                Ok(LineProfile {
                    b,
                    s: s.clone(),
                    values,
                })
            })
            .collect::<Result<Vec<_>, SliceError>>()
            .with_context(|| format!("sampling lines of plane '{}'", ps.name))?;

        debug!("plane '{}': vmax = {:.4e}", ps.name, vmax);
        Ok(PlaneResult {
            name: ps.name.clone(),
            plane,
            values,
            vmax,
            crossings,
            lines,
            elapsed: start.elapsed(),
        })
    }

    /// Writes every result of [`Explorer::solve`] into `<output_dir>/<material>/`.
    pub fn writeup(&self) -> Result<()> {
        let hotspots = self
            .hotspots
            .as_ref()
            .context("nothing to write, solve has not been run")?;
        let dir = self.settings.material_dir();
        output::ensure_dir(&dir)?;

        for p in &self.planes {
            output::write_plane(&dir.join(format!("{}.dat", p.name)), &p.values)?;
            match &p.crossings {
                Some(Ok(bands)) => output::write_crossings(
                    &dir.join(format!("{}_crossings.json", p.name)),
                    bands,
                )?,
                Some(Err(_)) | None => {}
            }
            for (i, line) in p.lines.iter().enumerate() {
                output::write_line(
                    &dir.join(format!("{}_line{}.dat", p.name, i)),
                    &line.s,
                    &line.values,
                )?;
            }
        }

        if let Some(volume) = &self.volume {
            output::write_volume(&dir.join("volume.dat"), volume)?;
        }
        if let Some(report) = &self.linres_report {
            output::write_json(&dir.join("linres.json"), report)?;
        }
        if let Some(report) = &self.catalog_report {
            output::write_json(&dir.join("catalog.json"), report)?;
        }

        let to_cartesian = self.reciprocal.map(|g| g * self.settings.kscale);

        let summary = Summary {
            material: &self.settings.material,
            timestamp: chrono::Local::now().to_rfc3339(),
            field_points: self.field.values().len(),
            field_vmax: stats::colour_limit(self.field.values(), self.settings.vmax_sf)?,
            hotspots,
            field_histogram: self.field_histogram.as_ref(),
            reciprocal_lattice: self.reciprocal.map(|g| {
                let g = g.transpose();
                [
                    [g[(0, 0)], g[(0, 1)], g[(0, 2)]],
                    [g[(1, 0)], g[(1, 1)], g[(1, 2)]],
                    [g[(2, 0)], g[(2, 1)], g[(2, 2)]],
                ]
            }),
            planes: self
                .planes
                .iter()
                .map(|p| PlaneSummary {
                    name: &p.name,
                    plane: &p.plane,
                    vmax: p.vmax,
                    crossing_bands: p.crossings.as_ref().and_then(|c| c.as_ref().ok()).map(Vec::len),
                    crossing_error: p
                        .crossings
                        .as_ref()
                        .and_then(|c| c.as_ref().err())
                        .map(ToString::to_string),
                    lines: p.lines.iter().map(|l| l.b).collect(),
                    surface: surface_rows(&p.plane, None),
                    surface_cartesian: to_cartesian
                        .as_ref()
                        .map(|g| surface_rows(&p.plane, Some(g))),
                    elapsed_ms: p.elapsed.as_secs_f64() * 1e3,
                })
                .collect(),
            volume_nk: self.volume.as_ref().map(|v| v.dim().0),
            elapsed_ms: self.elapsed.map_or(0.0, |d| d.as_secs_f64() * 1e3),
        };
        output::write_json(&dir.join("summary.json"), &summary)?;
        output::write_settings(&dir.join("settings.toml"), &self.settings)?;

        info!("results written to {}", dir.display());
        Ok(())
    }
}
