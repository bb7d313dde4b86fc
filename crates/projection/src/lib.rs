//! Coordinate reference system transformations.
//!
//! Implements the handful of map projections the swath resampler needs,
//! from scratch and without external dependencies. Every projection
//! works in degrees on the geodetic side and in projection units
//! (degrees for [`Geographic`], metres otherwise) on the map side.

pub mod config;
pub mod error;
pub mod geographic;
pub mod lambert;
pub mod sinusoidal;

pub use config::ProjectionConfig;
pub use error::{ProjectionError, Result};
pub use geographic::Geographic;
pub use lambert::LambertConformal;
pub use sinusoidal::Sinusoidal;

/// A forward/inverse map projection.
///
/// Both directions are total-failure-or-success: a point either maps
/// cleanly or the call returns an error, never a partial value.
pub trait ProjectionTransform: Send + Sync {
    /// Geodetic `(lon, lat)` in degrees to map `(x, y)`.
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)>;

    /// Map `(x, y)` to geodetic `(lon, lat)` in degrees.
    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)>;

    /// Short projection name used in logs and output metadata.
    fn name(&self) -> &'static str;
}

/// Wrap a longitude difference into `[-180, 180]` degrees.
pub(crate) fn wrap_degrees(mut dlon: f64) -> f64 {
    while dlon > 180.0 {
        dlon -= 360.0;
    }
    while dlon < -180.0 {
        dlon += 360.0;
    }
    dlon
}

pub(crate) fn check_geodetic(lon: f64, lat: f64) -> Result<()> {
    if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
        return Err(ProjectionError::out_of_domain(lon, lat));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
        assert_eq!(wrap_degrees(540.0), 180.0);
    }

    #[test]
    fn test_check_geodetic() {
        assert!(check_geodetic(10.0, 45.0).is_ok());
        assert!(check_geodetic(10.0, 91.0).is_err());
        assert!(check_geodetic(f64::NAN, 0.0).is_err());
    }
}
