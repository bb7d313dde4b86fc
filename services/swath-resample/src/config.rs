//! Run file for the swath-resample command.
//!
//! A run file is YAML describing one band, its geolocation, the output
//! grid and the resampler tunables:
//!
//! ```yaml
//! input:
//!   lines: 2030
//!   samples: 1354
//!   scan_height: 10
//!   data: { path: band1.i16, storage_type: int16, fill_value: -28672 }
//! geolocation:
//!   lat: { path: lat.f32, storage_type: float32 }
//!   lon: { path: lon.f32, storage_type: float32 }
//! output:
//!   path: ${OUT_DIR:-.}/band1_geo.i16
//!   projection: { type: geographic }
//!   grid:
//!     fit: { pixel_size_x: 0.01, pixel_size_y: 0.01 }
//! resampler:
//!   kernel: bilinear
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are substituted from the environment
//! before parsing. Relative paths are resolved against the run file's
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use projection::ProjectionConfig;
use serde::{Deserialize, Serialize};
use swath_resampler::{
    GeoLayout, GeoUpsampler, GeolocationSource, OutputGrid, RawArray, RawFileSource,
    RawGeolocation, ResamplerConfig, SourceKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: InputConfig,
    pub geolocation: GeolocationConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub resampler: ResamplerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub lines: usize,
    pub samples: usize,
    pub scan_height: usize,
    #[serde(default)]
    pub kind: SourceKind,
    pub data: RawArray,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    pub lat: RawArray,
    pub lon: RawArray,
    /// Data pixels per geolocation point along each axis.
    #[serde(default = "default_ratio")]
    pub ratio: usize,
    /// Data-pixel position of the first geolocation point.
    #[serde(default)]
    pub offset: f64,
    /// Geolocation fill; falls back to the latitude array's fill value.
    #[serde(default)]
    pub fill: Option<f64>,
}

fn default_ratio() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub projection: ProjectionConfig,
    pub grid: GridSpec,
}

/// Either an explicit grid or one fitted to the swath extent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    Fit { fit: FitSpec },
    Explicit(OutputGrid),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitSpec {
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
}

impl RunConfig {
    /// Read, substitute, parse, resolve paths, apply `SWATH_*` overrides
    /// and validate a run file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file {:?}", path))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml(&content, base)
    }

    /// Parse run file contents; relative paths resolve against `base`.
    pub fn from_yaml(content: &str, base: &Path) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let mut config: RunConfig =
            serde_yaml::from_str(&expanded).context("Failed to parse run file YAML")?;

        config.resolve_paths(base);
        config.resampler = config.resampler.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.input.data.path,
            &mut self.geolocation.lat.path,
            &mut self.geolocation.lon.path,
            &mut self.output.path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let input = &self.input;
        anyhow::ensure!(
            input.lines > 0 && input.samples > 0,
            "input dimensions must be > 0, got {}x{}",
            input.lines,
            input.samples
        );
        anyhow::ensure!(input.scan_height > 0, "input.scan_height must be > 0");
        anyhow::ensure!(
            input.data.fill_value.is_some(),
            "input.data.fill_value is required"
        );

        let ratio = self.geolocation.ratio;
        anyhow::ensure!(ratio > 0, "geolocation.ratio must be > 0");
        for (name, value) in [
            ("lines", input.lines),
            ("samples", input.samples),
            ("scan_height", input.scan_height),
        ] {
            anyhow::ensure!(
                value % ratio == 0,
                "input.{} ({}) is not a multiple of geolocation.ratio ({})",
                name,
                value,
                ratio
            );
        }
        anyhow::ensure!(
            self.geolocation.offset.is_finite(),
            "geolocation.offset must be finite"
        );

        if let GridSpec::Fit { fit } = &self.output.grid {
            anyhow::ensure!(
                fit.pixel_size_x > 0.0 && fit.pixel_size_y > 0.0,
                "output.grid.fit pixel sizes must be positive"
            );
        }

        self.resampler
            .validate()
            .map_err(|e| anyhow::anyhow!("resampler: {}", e))?;
        Ok(())
    }

    /// Layout of the geolocation arrays, in geolocation points.
    pub fn geo_layout(&self) -> GeoLayout {
        let ratio = self.geolocation.ratio;
        GeoLayout {
            lines: self.input.lines / ratio,
            samples: self.input.samples / ratio,
            scan_height: self.input.scan_height / ratio,
            fill: self.geolocation.fill,
            upsampler: GeoUpsampler {
                ratio,
                offset: self.geolocation.offset,
            },
            kind: self.input.kind,
        }
    }

    pub fn scan_count(&self) -> usize {
        self.input.lines.div_ceil(self.input.scan_height)
    }

    pub fn open_source(&self) -> Result<RawFileSource> {
        let input = &self.input;
        RawFileSource::open(&input.data, input.lines, input.samples, input.scan_height)
            .with_context(|| format!("Failed to open input {:?}", input.data.path))
    }

    pub fn open_geolocation(&self) -> Result<RawGeolocation> {
        RawGeolocation::open(&self.geolocation.lat, &self.geolocation.lon, self.geo_layout())
            .context("Failed to open geolocation")
    }

    /// The output grid, fitting it to every geolocation point when the
    /// run file asks for `fit`.
    pub fn build_grid(&self) -> Result<OutputGrid> {
        match &self.output.grid {
            GridSpec::Explicit(grid) => Ok(OutputGrid::new(
                grid.lines,
                grid.samples,
                grid.upper_left_x,
                grid.upper_left_y,
                grid.pixel_size_x,
                grid.pixel_size_y,
            )?),
            GridSpec::Fit { fit } => {
                let projection = self.output.projection.build()?;
                let mut geolocation = self.open_geolocation()?;
                let mut points = Vec::new();
                for scan in 0..self.scan_count() {
                    let geo = geolocation.scan_geolocation(scan)?;
                    points.extend((0..geo.len()).filter_map(|i| geo.point(i)));
                }
                let grid = OutputGrid::fit(
                    projection.as_ref(),
                    &points,
                    fit.pixel_size_x,
                    fit.pixel_size_y,
                )?;
                Ok(grid)
            }
        }
    }
}

/// Substitute `${VAR}` and `${VAR:-default}` from the environment.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("Unclosed variable substitution: ${{{}", after))?;
        result.push_str(&resolve_var_expr(&after[..end])?);
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_default() {
        let out = expand_env_vars("path: ${SWATH_TEST_SURELY_UNSET:-/data}/x").unwrap();
        assert_eq!(out, "path: /data/x");
    }

    #[test]
    fn test_expand_env_vars_set() {
        std::env::set_var("SWATH_TEST_EXPAND_DIR", "/scratch");
        let out = expand_env_vars("a: ${SWATH_TEST_EXPAND_DIR}, b: $HOME").unwrap();
        assert_eq!(out, "a: /scratch, b: $HOME");
    }

    #[test]
    fn test_expand_env_vars_errors() {
        assert!(expand_env_vars("${SWATH_TEST_SURELY_UNSET}").is_err());
        assert!(expand_env_vars("${UNCLOSED").is_err());
    }
}
