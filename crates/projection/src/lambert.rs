//! Spherical Lambert Conformal Conic, for regional output grids.
//!
//! Northing is zero at `lat0` and easting is zero on `lon0`. Equal
//! `latin1` and `latin2` give a tangent cone.

use std::f64::consts::PI;

use crate::{check_geodetic, wrap_degrees, ProjectionError, ProjectionTransform, Result};

/// Mean Earth radius used by the spherical form (metres).
pub const EARTH_RADIUS: f64 = 6_371_229.0;

/// Spherical Lambert Conformal Conic projection.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Radians.
    pub lon0: f64,
    pub lat0: f64,
    pub latin1: f64,
    pub latin2: f64,
    /// False easting (metres)
    pub false_easting: f64,
    /// False northing (metres)
    pub false_northing: f64,
    /// Earth radius (metres)
    pub earth_radius: f64,
    /// Cone constant (n)
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the origin latitude
    rho0: f64,
}

impl LambertConformal {
    /// Build from parameters in degrees; false easting/northing in metres.
    pub fn new(
        lat0_deg: f64,
        lon0_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Result<Self> {
        for (name, value) in [
            ("lat0", lat0_deg),
            ("latin1", latin1_deg),
            ("latin2", latin2_deg),
        ] {
            if !value.is_finite() || value.abs() >= 90.0 {
                return Err(ProjectionError::invalid_parameter(format!(
                    "{} must be strictly between -90 and 90, got {}",
                    name, value
                )));
            }
        }
        if (latin1_deg + latin2_deg).abs() < 1e-10 {
            return Err(ProjectionError::invalid_parameter(
                "standard parallels must not be symmetric about the equator",
            ));
        }

        let lat0 = lat0_deg.to_radians();
        let lon0 = lon0_deg.to_radians();
        let latin1 = latin1_deg.to_radians();
        let latin2 = latin2_deg.to_radians();
        let earth_radius = EARTH_RADIUS;

        let t = |lat: f64| (PI / 4.0 + lat / 2.0).tan();
        let n = if (latin1 - latin2).abs() < 1e-10 {
            latin1.sin()
        } else {
            (latin1.cos() / latin2.cos()).ln() / (t(latin2) / t(latin1)).ln()
        };

        let f = latin1.cos() * t(latin1).powf(n) / n;
        let rho0 = earth_radius * f / t(lat0).powf(n);

        if !n.is_finite() || !f.is_finite() || !rho0.is_finite() {
            return Err(ProjectionError::invalid_parameter(
                "degenerate cone for the given standard parallels",
            ));
        }

        Ok(Self {
            lon0,
            lat0,
            latin1,
            latin2,
            false_easting,
            false_northing,
            earth_radius,
            n,
            f,
            rho0,
        })
    }

    /// Cone constant.
    pub fn cone_constant(&self) -> f64 {
        self.n
    }

    fn rho(&self, lat: f64) -> f64 {
        self.earth_radius * self.f / (PI / 4.0 + lat / 2.0).tan().powf(self.n)
    }
}

impl ProjectionTransform for LambertConformal {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        check_geodetic(lon, lat)?;
        let dlon = wrap_degrees(lon - self.lon0.to_degrees()).to_radians();
        let rho = self.rho(lat.to_radians());
        if !rho.is_finite() {
            // The pole opposite the cone apex maps to infinity
            return Err(ProjectionError::forward_failed(lon, lat));
        }

        let theta = self.n * dlon;
        let x = rho * theta.sin() + self.false_easting;
        let y = self.rho0 - rho * theta.cos() + self.false_northing;
        Ok((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let dx = x - self.false_easting;
        let dy = self.rho0 - (y - self.false_northing);
        let sign = self.n.signum();

        let rho = sign * (dx * dx + dy * dy).sqrt();
        let theta = (sign * dx).atan2(sign * dy);

        let lat = if rho == 0.0 {
            sign * PI / 2.0
        } else {
            2.0 * ((self.earth_radius * self.f / rho).powf(1.0 / self.n)).atan() - PI / 2.0
        };
        let lon = self.lon0 + theta / self.n;

        if !lat.is_finite() || !lon.is_finite() {
            return Err(ProjectionError::inverse_failed(x, y));
        }
        Ok((wrap_degrees(lon.to_degrees()), lat.to_degrees()))
    }

    fn name(&self) -> &'static str {
        "lambert_conformal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tangent at 38.5°N on 97.5°W.
    fn conus() -> LambertConformal {
        LambertConformal::new(38.5, -97.5, 38.5, 38.5, 0.0, 0.0).unwrap()
    }

    #[test]
    fn test_origin_maps_to_false_origin() {
        let proj = LambertConformal::new(38.5, -97.5, 38.5, 38.5, 1000.0, 2000.0).unwrap();
        let (x, y) = proj.forward(-97.5, 38.5).unwrap();
        assert!((x - 1000.0).abs() < 1e-6, "x should be false easting, got {}", x);
        assert!((y - 2000.0).abs() < 1e-6, "y should be false northing, got {}", y);
    }

    #[test]
    fn test_conus_roundtrip() {
        let proj = conus();

        for (lon, lat) in [(-94.5, 39.0), (-122.7, 21.1), (-70.0, 47.5)] {
            let (x, y) = proj.forward(lon, lat).unwrap();
            let (lon2, lat2) = proj.inverse(x, y).unwrap();
            assert!((lon2 - lon).abs() < 1e-8, "lon roundtrip failed: {} vs {}", lon, lon2);
            assert!((lat2 - lat).abs() < 1e-8, "lat roundtrip failed: {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_secant_roundtrip() {
        let proj = LambertConformal::new(25.0, -95.0, 33.0, 45.0, 0.0, 0.0).unwrap();
        let (x, y) = proj.forward(-80.0, 30.0).unwrap();
        let (lon, lat) = proj.inverse(x, y).unwrap();
        assert!((lon + 80.0).abs() < 1e-8);
        assert!((lat - 30.0).abs() < 1e-8);
    }

    #[test]
    fn test_east_is_positive_x() {
        let proj = conus();
        let (x_west, _) = proj.forward(-110.0, 40.0).unwrap();
        let (x_east, _) = proj.forward(-85.0, 40.0).unwrap();
        assert!(x_west < 0.0 && x_east > 0.0, "x_west={}, x_east={}", x_west, x_east);
    }

    #[test]
    fn test_opposite_pole_fails() {
        let proj = conus();
        assert!(proj.forward(0.0, -90.0).is_err());
    }

    #[test]
    fn test_invalid_parallels() {
        assert!(LambertConformal::new(0.0, 0.0, 30.0, -30.0, 0.0, 0.0).is_err());
        assert!(LambertConformal::new(0.0, 0.0, 95.0, 30.0, 0.0, 0.0).is_err());
    }
}
