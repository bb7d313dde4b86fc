//! Sinusoidal (Sanson–Flamsteed) projection on a sphere.
//!
//! This is the native projection of the MODIS land tile grid.
//!
//! forward: x = R·(λ − λ₀)·cos(φ) + FE, y = R·φ + FN
//! inverse: φ = (y − FN)/R, λ = λ₀ + (x − FE)/(R·cos(φ))

use crate::{check_geodetic, wrap_degrees, ProjectionError, ProjectionTransform, Result};

/// Radius of the MODIS reference sphere in metres.
pub const MODIS_SPHERE_RADIUS: f64 = 6_371_007.181;

/// Spherical sinusoidal projection.
#[derive(Debug, Clone)]
pub struct Sinusoidal {
    /// Sphere radius (metres)
    pub radius: f64,
    /// Central meridian (degrees)
    pub lon0: f64,
    /// False easting (metres)
    pub false_easting: f64,
    /// False northing (metres)
    pub false_northing: f64,
}

impl Sinusoidal {
    /// Create a sinusoidal projection, validating its parameters.
    pub fn new(radius: f64, lon0: f64, false_easting: f64, false_northing: f64) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ProjectionError::invalid_parameter(format!(
                "sphere radius must be positive, got {}",
                radius
            )));
        }
        if !lon0.is_finite() || lon0.abs() > 360.0 {
            return Err(ProjectionError::invalid_parameter(format!(
                "central meridian out of range: {}",
                lon0
            )));
        }
        Ok(Self {
            radius,
            lon0,
            false_easting,
            false_northing,
        })
    }

    /// The MODIS sinusoidal grid: sphere R=6371007.181, central meridian 0.
    pub fn modis() -> Self {
        Self {
            radius: MODIS_SPHERE_RADIUS,
            lon0: 0.0,
            false_easting: 0.0,
            false_northing: 0.0,
        }
    }
}

impl ProjectionTransform for Sinusoidal {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        check_geodetic(lon, lat)?;
        let dlon = wrap_degrees(lon - self.lon0).to_radians();
        let phi = lat.to_radians();
        let x = self.radius * dlon * phi.cos() + self.false_easting;
        let y = self.radius * phi + self.false_northing;
        Ok((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let phi = (y - self.false_northing) / self.radius;
        if !phi.is_finite() || phi.abs() > std::f64::consts::FRAC_PI_2 + 1e-12 {
            return Err(ProjectionError::inverse_failed(x, y));
        }
        let cos_phi = phi.cos();
        if cos_phi.abs() < 1e-15 {
            // Longitude is undefined at the poles
            return Ok((self.lon0, phi.to_degrees()));
        }
        let dlon = (x - self.false_easting) / (self.radius * cos_phi);
        if dlon.abs() > std::f64::consts::PI + 1e-12 {
            // Outside the projected outline
            return Err(ProjectionError::inverse_failed(x, y));
        }
        Ok((wrap_degrees(self.lon0 + dlon.to_degrees()), phi.to_degrees()))
    }

    fn name(&self) -> &'static str {
        "sinusoidal"
    }
}
