//! Output grid geometry and metadata.

use chrono::{DateTime, Utc};
use projection::{ProjectionConfig, ProjectionTransform};
use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, Result};
use crate::kernel::KernelType;
use crate::types::StorageType;

/// A regular grid in projection space.
///
/// Pixel `(line, sample)` has its centre at continuous output coordinate
/// `(line, sample)`; the upper-left corner of pixel `(0, 0)` sits at
/// `(upper_left_x, upper_left_y)` in map units. Lines grow southwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputGrid {
    pub lines: usize,
    pub samples: usize,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
}

impl OutputGrid {
    /// Create a grid, validating its dimensions and pixel size.
    pub fn new(
        lines: usize,
        samples: usize,
        upper_left_x: f64,
        upper_left_y: f64,
        pixel_size_x: f64,
        pixel_size_y: f64,
    ) -> Result<Self> {
        if lines == 0 || samples == 0 {
            return Err(ResampleError::invalid_config(format!(
                "output grid must be non-empty, got {}x{}",
                lines, samples
            )));
        }
        if !(pixel_size_x > 0.0 && pixel_size_y > 0.0) {
            return Err(ResampleError::invalid_config(format!(
                "pixel size must be positive, got ({}, {})",
                pixel_size_x, pixel_size_y
            )));
        }
        if !upper_left_x.is_finite() || !upper_left_y.is_finite() {
            return Err(ResampleError::invalid_config("upper-left corner must be finite"));
        }
        Ok(Self {
            lines,
            samples,
            upper_left_x,
            upper_left_y,
            pixel_size_x,
            pixel_size_y,
        })
    }

    /// Smallest grid with the given pixel size that covers every point
    /// in `points` (geodetic `(lon, lat)` in degrees). Points the
    /// projection rejects are ignored.
    pub fn fit(
        projection: &dyn ProjectionTransform,
        points: &[(f64, f64)],
        pixel_size_x: f64,
        pixel_size_y: f64,
    ) -> Result<Self> {
        let mut min_x = f64::MAX;
        let mut max_x = f64::MIN;
        let mut min_y = f64::MAX;
        let mut max_y = f64::MIN;
        let mut any = false;

        for &(lon, lat) in points {
            if let Ok((x, y)) = projection.forward(lon, lat) {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
                any = true;
            }
        }

        if !any {
            return Err(ResampleError::invalid_config(
                "no input point maps into the output projection",
            ));
        }
        if !(pixel_size_x > 0.0 && pixel_size_y > 0.0) {
            return Err(ResampleError::invalid_config("pixel size must be positive"));
        }

        let samples = (((max_x - min_x) / pixel_size_x).ceil() as usize).max(1);
        let lines = (((max_y - min_y) / pixel_size_y).ceil() as usize).max(1);
        Self::new(lines, samples, min_x, max_y, pixel_size_x, pixel_size_y)
    }

    /// Map coordinates to continuous `(line, sample)`.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let sample = (x - self.upper_left_x) / self.pixel_size_x - 0.5;
        let line = (self.upper_left_y - y) / self.pixel_size_y - 0.5;
        (line, sample)
    }

    /// Map coordinates of the centre of pixel `(line, sample)`.
    pub fn pixel_center(&self, line: f64, sample: f64) -> (f64, f64) {
        let x = self.upper_left_x + (sample + 0.5) * self.pixel_size_x;
        let y = self.upper_left_y - (line + 0.5) * self.pixel_size_y;
        (x, y)
    }

    /// Map coordinates of the lower-right grid corner.
    pub fn lower_right(&self) -> (f64, f64) {
        (
            self.upper_left_x + self.samples as f64 * self.pixel_size_x,
            self.upper_left_y - self.lines as f64 * self.pixel_size_y,
        )
    }

    /// Number of tile rows for square tiles of `tile_size`.
    pub fn tile_rows(&self, tile_size: usize) -> usize {
        self.lines.div_ceil(tile_size)
    }

    /// Number of tile columns for square tiles of `tile_size`.
    pub fn tile_cols(&self, tile_size: usize) -> usize {
        self.samples.div_ceil(tile_size)
    }

    pub fn len(&self) -> usize {
        self.lines * self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Grid description handed to the output sink once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMetadata {
    pub lines: usize,
    pub samples: usize,
    /// Upper-left corner in map units.
    pub upper_left: (f64, f64),
    /// Lower-right corner in map units.
    pub lower_right: (f64, f64),
    pub pixel_size: (f64, f64),
    /// Geodetic `(lon, lat)` of the UL, UR, LL, LR corners where the
    /// inverse projection is defined.
    pub geodetic_corners: Vec<Option<(f64, f64)>>,
    pub projection: ProjectionConfig,
    pub storage_type: StorageType,
    pub fill_value: f64,
    pub kernel: KernelType,
    pub run_id: String,
    pub created: DateTime<Utc>,
}

impl GridMetadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid: &OutputGrid,
        projection_config: &ProjectionConfig,
        projection: &dyn ProjectionTransform,
        storage_type: StorageType,
        fill_value: f64,
        kernel: KernelType,
        run_id: &str,
    ) -> Self {
        let (ulx, uly) = (grid.upper_left_x, grid.upper_left_y);
        let (lrx, lry) = grid.lower_right();
        let geodetic_corners = [(ulx, uly), (lrx, uly), (ulx, lry), (lrx, lry)]
            .iter()
            .map(|&(x, y)| projection.inverse(x, y).ok())
            .collect();

        Self {
            lines: grid.lines,
            samples: grid.samples,
            upper_left: (ulx, uly),
            lower_right: (lrx, lry),
            pixel_size: (grid.pixel_size_x, grid.pixel_size_y),
            geodetic_corners,
            projection: projection_config.clone(),
            storage_type,
            fill_value,
            kernel,
            run_id: run_id.to_string(),
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::Geographic;

    #[test]
    fn test_pixel_roundtrip() {
        let grid = OutputGrid::new(10, 20, -100.0, 40.0, 0.5, 0.25).unwrap();
        let (x, y) = grid.pixel_center(3.0, 7.0);
        assert!((x - (-96.25)).abs() < 1e-12);
        assert!((y - 39.125).abs() < 1e-12);

        let (line, sample) = grid.to_pixel(x, y);
        assert!((line - 3.0).abs() < 1e-12);
        assert!((sample - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_tiles() {
        let grid = OutputGrid::new(65, 32, 0.0, 0.0, 1.0, 1.0).unwrap();
        assert_eq!(grid.tile_rows(32), 3);
        assert_eq!(grid.tile_cols(32), 1);
    }

    #[test]
    fn test_invalid_grid() {
        assert!(OutputGrid::new(0, 10, 0.0, 0.0, 1.0, 1.0).is_err());
        assert!(OutputGrid::new(10, 10, 0.0, 0.0, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_fit_covers_points() {
        let points = [(-10.0, 5.0), (10.0, -5.0), (0.0, 0.0)];
        let grid = OutputGrid::fit(&Geographic, &points, 1.0, 1.0).unwrap();
        assert_eq!(grid.samples, 20);
        assert_eq!(grid.lines, 10);
        assert_eq!(grid.upper_left_x, -10.0);
        assert_eq!(grid.upper_left_y, 5.0);
    }

    #[test]
    fn test_metadata_corners() {
        let grid = OutputGrid::new(10, 10, -5.0, 5.0, 1.0, 1.0).unwrap();
        let meta = GridMetadata::new(
            &grid,
            &ProjectionConfig::Geographic,
            &Geographic,
            StorageType::Int16,
            -9999.0,
            KernelType::Bilinear,
            "run",
        );
        assert_eq!(meta.lower_right, (5.0, -5.0));
        assert_eq!(meta.geodetic_corners[0], Some((-5.0, 5.0)));
        assert_eq!(meta.geodetic_corners.len(), 4);
    }
}
