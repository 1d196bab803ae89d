/// Default absolute tolerance on the out-of-plane component of a projected k-point.
pub const PLANE_TOLERANCE: f64 = 1e-12;
/// Default in-plane mesh resolution.
pub const DEFAULT_NK: usize = 100;
/// Default number of points sampled along a line profile.
pub const DEFAULT_LINE_POINTS: usize = 100;
/// Default divisor for the colour scale limit, `vmax = max|X| / vmax_sf`.
pub const DEFAULT_VMAX_SF: f64 = 3.0;
/// Number of points per edge of a plane surface mesh for 3D overlays.
pub const SURFACE_POINTS: usize = 5;
/// Number of thresholds in a contribution profile.
pub const PROFILE_THRESHOLDS: usize = 200;
/// Default relative tolerance for k-mesh and smearing convergence.
pub const CONVERGENCE_TOLERANCE: f64 = 0.01;
/// Smearing values (eV) of the linear-response calculations.
pub const GAMMAS: [f64; 5] = [0.0001, 0.0005, 0.001, 0.005, 0.01];
/// Number of bins of the field magnitude histogram in the run summary.
pub const HISTOGRAM_BINS: usize = 50;
/// Default number of bins of the catalog histograms.
pub const CATALOG_BINS: usize = 20;
/// Number of materials listed in a catalog report.
pub const TOP_MATERIALS: usize = 10;
