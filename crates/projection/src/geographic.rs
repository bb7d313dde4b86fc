//! Geographic (plate carrée) projection: map units are degrees.

use crate::{check_geodetic, ProjectionError, ProjectionTransform, Result};

/// Identity projection over longitude/latitude in degrees.
#[derive(Debug, Clone, Default)]
pub struct Geographic;

impl ProjectionTransform for Geographic {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        check_geodetic(lon, lat)?;
        Ok((lon, lat))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() || y.abs() > 90.0 {
            return Err(ProjectionError::inverse_failed(x, y));
        }
        Ok((x, y))
    }

    fn name(&self) -> &'static str {
        "geographic"
    }
}
