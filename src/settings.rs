use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use nalgebra::Matrix3;

use crate::config::{
    CATALOG_BINS, DEFAULT_LINE_POINTS, DEFAULT_NK, DEFAULT_VMAX_SF, PLANE_TOLERANCE,
};
use crate::field::FieldComponent;
use crate::lattice::{reciprocal_lattice, LatticeTransform, Plane};

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(name: &str, k1: [f64; 3], k2: [f64; 3]) -> PlaneSettings {
        PlaneSettings {
            name: name.to_string(),
            k1,
            k2,
            shift: [0.0; 3],
            lines: vec![],
            bands: None,
        }
    }

    fn minimal() -> Settings {
        Settings {
            material: "test".to_string(),
            field: "field.json".to_string(),
            component: FieldComponent::Real,
            crossings: None,
            transform: None,
            nk: 10,
            volume_nk: None,
            line_points: 10,
            plane_tolerance: PLANE_TOLERANCE,
            vmax_sf: DEFAULT_VMAX_SF,
            kscale: 1.0,
            output_dir: "output".to_string(),
            lattice: None,
            linres: None,
            linres_coarse: None,
            catalog: None,
            norm_h_range: None,
            catalog_bins: CATALOG_BINS,
            planes: vec![plane("xy", [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])],
        }
    }

    #[test]
    fn default_config_loads() {
        let settings = load_default_config().unwrap();
        assert!(!settings.planes.is_empty());
        assert!(settings.nk >= 1);
        assert!(settings.transform().is_some());
    }

    #[test]
    fn cli_overrides_file() {
        let args = CliArgs::try_parse_from([
            "kslice", "--nk", "24", "--tol", "1e-6", "--material", "Fe", "--volume-nk", "8",
            "--catalog", "data/catalog.json",
        ])
        .unwrap();
        let settings = load_config(&args).unwrap();
        assert_eq!(settings.nk, 24);
        assert_eq!(settings.plane_tolerance, 1e-6);
        assert_eq!(settings.material, "Fe");
        assert_eq!(settings.volume_nk, Some(8));
        assert_eq!(settings.catalog.as_deref(), Some("data/catalog.json"));
    }

    #[test]
    fn validation() {
        assert!(minimal().validate().is_ok());

        let mut s = minimal();
        s.nk = 0;
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.line_points = 1;
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.plane_tolerance = 0.0;
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.planes.push(plane("flat", [1.0, 1.0, 0.0], [2.0, 2.0, 0.0]));
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.planes.push(plane("xy", [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]));
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.transform = Some([[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.lattice = Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [2.0, 2.0, 0.0]]);
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.linres_coarse = Some("coarse.json".to_string());
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.norm_h_range = Some([10.0, 10.0]);
        assert!(s.validate().is_err());

        let mut s = minimal();
        s.catalog_bins = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn lattice_rows_become_columns() {
        let mut s = minimal();
        assert!(s.direct_lattice().is_none());
        s.lattice = Some([[0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]]);
        let b = s.direct_lattice().unwrap();
        assert_eq!(b[(0, 1)], 0.5);
        assert_eq!(b[(2, 0)], 0.5);
        assert_eq!(b.column(0).into_owned(), nalgebra::Vector3::new(0.0, 0.5, 0.5));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn settings_survive_toml() {
        let mut s = minimal();
        s.transform = Some([[0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]]);
        s.planes[0].lines = vec![0.25, 0.5];
        s.planes[0].bands = Some(vec![1, 2]);
        s.component = FieldComponent::Abs;
        s.lattice = Some([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 3.0]]);
        s.catalog = Some("catalog.json".to_string());
        s.norm_h_range = Some([0.0, 5000.0]);
        let text = toml::to_string(&s).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn explicit_config_file() {
        let dir = std::env::temp_dir().join(format!("kslice-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ni.toml");
        std::fs::write(
            &path,
            r#"
            material = "Ni"
            field = "data/Ni/field.json"
            nk = 50

            [[planes]]
            name = "m-101"
            k1 = [0.0, 1.0, 0.0]
            k2 = [1.0, 0.0, 1.0]
            lines = [0.635, 0.8, 0.5]
            "#,
        )
        .unwrap();
        let settings = load_config_from(&path).unwrap();
        assert_eq!(settings.material, "Ni");
        assert_eq!(settings.nk, 50);
        assert_eq!(settings.line_points, DEFAULT_LINE_POINTS);
        assert_eq!(settings.plane_tolerance, PLANE_TOLERANCE);
        assert_eq!(settings.planes[0].lines.len(), 3);
        assert!(settings.transform().is_none());
        assert_eq!(settings.material_dir(), Path::new("output").join("Ni"));
    }

    #[test]
    fn plane_defaults() {
        let p: PlaneSettings = toml::from_str(
            r#"
            name = "m001"
            k1 = [1.0, 0.0, 0.0]
            k2 = [0.0, 1.0, 0.0]
            "#,
        )
        .unwrap();
        assert_eq!(p.shift, [0.0; 3]);
        assert!(p.lines.is_empty());
        assert_eq!(p.plane().normal().z, 1.0);
    }
}

fn default_nk() -> usize {
    DEFAULT_NK
}

fn default_line_points() -> usize {
    DEFAULT_LINE_POINTS
}

fn default_tolerance() -> f64 {
    PLANE_TOLERANCE
}

fn default_vmax_sf() -> f64 {
    DEFAULT_VMAX_SF
}

fn default_kscale() -> f64 {
    1.0
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_catalog_bins() -> usize {
    CATALOG_BINS
}

/// A named plane to slice, in reciprocal-lattice fractional coordinates.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlaneSettings {
    pub name: String,
    pub k1: [f64; 3],
    pub k2: [f64; 3],
    #[serde(default)]
    pub shift: [f64; 3],
    /// In-plane `b` coordinates of the line profiles to sample.
    #[serde(default)]
    pub lines: Vec<f64>,
    /// Indices of the crossing bands that belong to this plane. All bands if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bands: Option<Vec<usize>>,
}

impl PlaneSettings {
    pub fn plane(&self) -> Plane {
        Plane::new(self.k1, self.k2, self.shift)
    }
}

/// Runtime configuration for one material.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    pub material: String,
    /// Path of the field snapshot.
    pub field: String,
    /// Component taken from a complex field snapshot.
    #[serde(default)]
    pub component: FieldComponent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossings: Option<String>,
    /// Lattice transform, one row per output axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<[[f64; 3]; 3]>,
    #[serde(default = "default_nk")]
    pub nk: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_nk: Option<usize>,
    #[serde(default = "default_line_points")]
    pub line_points: usize,
    #[serde(default = "default_tolerance")]
    pub plane_tolerance: f64,
    #[serde(default = "default_vmax_sf")]
    pub vmax_sf: f64,
    #[serde(default = "default_kscale")]
    pub kscale: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Direct lattice vectors, one per row, for Cartesian k-space output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lattice: Option<[[f64; 3]; 3]>,
    /// Path of the linear-response result on the fine k-mesh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linres: Option<String>,
    /// Path of the same result on the coarse k-mesh, for convergence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linres_coarse: Option<String>,
    /// Path of the material summary table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    /// Open range of the Hall vector norm kept in the catalog report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_h_range: Option<[f64; 2]>,
    #[serde(default = "default_catalog_bins")]
    pub catalog_bins: usize,
    #[serde(default)]
    pub planes: Vec<PlaneSettings>,
}

impl Settings {
    pub fn transform(&self) -> Option<LatticeTransform> {
        self.transform.map(LatticeTransform::new)
    }

    /// Direct lattice with the lattice vectors as columns.
    pub fn direct_lattice(&self) -> Option<Matrix3<f64>> {
        self.lattice
            .map(|rows| Matrix3::from_fn(|r, c| rows[c][r]))
    }

    /// Directory receiving this material's output files.
    pub fn material_dir(&self) -> PathBuf {
        Path::new(&self.output_dir).join(&self.material)
    }

    pub fn validate(&self) -> Result<()> {
        if self.nk == 0 {
            bail!("plane resolution nk must be at least 1");
        }
        if self.volume_nk == Some(0) {
            bail!("volume resolution volume_nk must be at least 1");
        }
        if self.line_points < 2 {
            bail!("line_points must be at least 2, got {}", self.line_points);
        }
        if !self.plane_tolerance.is_finite() || self.plane_tolerance <= 0.0 {
            bail!(
                "plane_tolerance must be a positive number, got {}",
                self.plane_tolerance
            );
        }
        if self.vmax_sf.is_nan() || self.vmax_sf <= 0.0 {
            bail!("vmax_sf must be greater than 0, got {}", self.vmax_sf);
        }
        if let Some(t) = self.transform() {
            t.inverse()
                .map_err(|e| anyhow!("invalid lattice transform {:?}: {}", self.transform, e))?;
        }
        if let Some(b) = self.direct_lattice() {
            reciprocal_lattice(&b)
                .map_err(|e| anyhow!("invalid direct lattice {:?}: {}", self.lattice, e))?;
        }
        if self.linres_coarse.is_some() && self.linres.is_none() {
            bail!("linres_coarse is set but linres is not");
        }
        if let Some([lo, hi]) = self.norm_h_range {
            if lo.is_nan() || hi.is_nan() || lo >= hi {
                bail!("norm_h_range must satisfy lo < hi, got [{}, {}]", lo, hi);
            }
        }
        if self.catalog_bins == 0 {
            bail!("catalog_bins must be at least 1");
        }

        let mut names = HashSet::new();
        for p in &self.planes {
            if !names.insert(p.name.as_str()) {
                bail!("plane name '{}' is used more than once", p.name);
            }
            p.plane()
                .validate()
                .with_context(|| format!("plane '{}'", p.name))?;
        }
        Ok(())
    }
}

fn build_settings(config_file: PathBuf, with_env: bool) -> Result<Settings> {
    let mut builder =
        Config::builder().add_source(File::from(config_file.clone()).required(true));
    if with_env {
        builder = builder.add_source(Environment::with_prefix("kslice"));
    }
    let config = builder
        .build()
        .with_context(|| format!("loading configuration {}", config_file.display()))?;
    config
        .try_deserialize()
        .with_context(|| format!("deserializing configuration {}", config_file.display()))
}

/// Loads `config/default.toml` only, without environment or CLI overrides.
pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let settings = build_settings(root.join("config/default.toml"), false)?;
    settings.validate()?;
    Ok(settings)
}

/// Loads a configuration file, without environment or CLI overrides.
pub fn load_config_from(path: &Path) -> Result<Settings> {
    let settings = build_settings(path.to_path_buf(), false)?;
    settings.validate()?;
    Ok(settings)
}

/// Layers the configuration file, `KSLICE_*` environment variables and command-line flags.
pub fn load_config(args: &CliArgs) -> Result<Settings> {
    let config_file = match &args.config {
        Some(path) => PathBuf::from(path),
        None => {
            let root = retrieve_project_root()?;
            let default_config_file = root.join("config/default.toml");
            let local_config = root.join("config/local.toml");
            if local_config.exists() {
                local_config
            } else {
                default_config_file
            }
        }
    };
    info!("using configuration: {}", config_file.display());

    let mut settings = build_settings(config_file, true)?;

    if let Some(material) = &args.material {
        settings.material = material.clone();
    }
    if let Some(field) = &args.field {
        settings.field = field.clone();
    }
    if let Some(crossings) = &args.crossings {
        settings.crossings = Some(crossings.clone());
    }
    if let Some(nk) = args.nk {
        settings.nk = nk;
    }
    if let Some(volume_nk) = args.volume_nk {
        settings.volume_nk = Some(volume_nk);
    }
    if let Some(tol) = args.tol {
        settings.plane_tolerance = tol;
    }
    if let Some(out) = &args.out {
        settings.output_dir = out.clone();
    }
    if let Some(linres) = &args.linres {
        settings.linres = Some(linres.clone());
    }
    if let Some(catalog) = &args.catalog {
        settings.catalog = Some(catalog.clone());
    }

    settings.validate()?;
    debug!("{:#?}", settings);

    Ok(settings)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the KSLICE_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
pub fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("KSLICE_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("could not find project root directory from {}", exe_path.display()))
}

#[derive(Parser, Debug, Default)]
#[command(version, about = "kslice - slice periodic Brillouin-zone fields onto planes")]
pub struct CliArgs {
    /// Configuration file to use instead of config/local.toml or config/default.toml.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Material name. Output is written to `<out>/<material>/`.
    #[arg(short, long)]
    pub material: Option<String>,

    /// Path of the field snapshot (JSON).
    #[arg(short, long)]
    pub field: Option<String>,

    /// Path of the band crossing snapshot (JSON).
    #[arg(long)]
    pub crossings: Option<String>,

    /// Number of mesh points along each plane direction.
    #[arg(long)]
    pub nk: Option<usize>,

    /// Also resample the full cell at this resolution.
    #[arg(long)]
    pub volume_nk: Option<usize>,

    /// Maximum distance of a crossing point from its plane.
    #[arg(long)]
    pub tol: Option<f64>,

    /// Output directory.
    #[arg(short, long)]
    pub out: Option<String>,

    /// Path of the linear-response result (JSON).
    #[arg(long)]
    pub linres: Option<String>,

    /// Path of the material summary table (JSON).
    #[arg(long)]
    pub catalog: Option<String>,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Material: {}
  - Field: {} ({:?})
  - Crossings: {}
  - Transform: {:?}
  - Plane Resolution: {}
  - Volume Resolution: {:?}
  - Line Points: {}
  - Plane Tolerance: {:e}
  - Colour Scale Divisor: {:.3}
  - Linear Response: {}
  - Catalog: {}
  - Planes: {}
  ",
            self.material,
            self.field,
            self.component,
            self.crossings.as_deref().unwrap_or("none"),
            self.transform,
            self.nk,
            self.volume_nk,
            self.line_points,
            self.plane_tolerance,
            self.vmax_sf,
            self.linres.as_deref().unwrap_or("none"),
            self.catalog.as_deref().unwrap_or("none"),
            self.planes
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}
