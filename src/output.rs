use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Array3};
use serde::Serialize;

use crate::crossings::ProjectedBand;
use crate::settings::Settings;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kslice-output-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn plane_lines_follow_mesh() {
        let path = scratch("plane.dat");
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        write_plane(&path, &values).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "0 0 1");
        assert_eq!(lines[1], "0 0.5 2");
        assert_eq!(lines[2], "0.5 0 3");
    }

    #[test]
    fn line_profile_columns() {
        let path = scratch("line.dat");
        write_line(&path, &array![0.0, 0.5, 1.0], &array![2.0, -1.0, 2.0]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0 2\n0.5 -1\n1 2\n");
    }

    #[test]
    fn volume_lines() {
        let path = scratch("volume.dat");
        let values = Array3::from_shape_fn((2, 2, 2), |(i, j, k)| (i * 4 + j * 2 + k) as f64);
        write_volume(&path, &values).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[5], "0.5 0 0.5 5");
    }

    #[test]
    fn crossings_json() {
        let path = scratch("crossings.json");
        let bands = vec![ProjectedBand {
            label: "band 0".to_string(),
            coords: array![[0.25, 0.5]],
        }];
        write_crossings(&path, &bands).unwrap();
        let back: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back[0]["label"], "band 0");
        assert_eq!(back[0]["coords"][0][1], 0.5);
    }
}

/// Creates `dir` and its parents if they do not exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write a sampled plane as `a b value` lines, with `a = i/nk` and `b = j/nk`.
pub fn write_plane(path: &Path, values: &Array2<f64>) -> Result<()> {
    let mut writer = create(path)?;
    let (na, nb) = values.dim();
    for ((i, j), value) in values.indexed_iter() {
        writeln!(
            writer,
            "{} {} {}",
            i as f64 / na as f64,
            j as f64 / nb as f64,
            value
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a line profile as `s value` lines.
pub fn write_line(path: &Path, s: &Array1<f64>, values: &Array1<f64>) -> Result<()> {
    let mut writer = create(path)?;
    for (s, value) in s.iter().zip(values.iter()) {
        writeln!(writer, "{} {}", s, value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a resampled cell as `x y z value` lines in fractional coordinates.
pub fn write_volume(path: &Path, values: &Array3<f64>) -> Result<()> {
    let mut writer = create(path)?;
    let (nx, ny, nz) = values.dim();
    for ((i, j, k), value) in values.indexed_iter() {
        writeln!(
            writer,
            "{} {} {} {}",
            i as f64 / nx as f64,
            j as f64 / ny as f64,
            k as f64 / nz as f64,
            value
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("serializing {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

pub fn write_crossings(path: &Path, bands: &[ProjectedBand]) -> Result<()> {
    write_json(path, bands)
}

/// Write the resolved settings next to the results they produced.
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    let text = toml::to_string_pretty(settings).context("serializing settings")?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
