//! Serializable projection descriptions.

use serde::{Deserialize, Serialize};

use crate::sinusoidal::MODIS_SPHERE_RADIUS;
use crate::{Geographic, LambertConformal, ProjectionTransform, Result, Sinusoidal};

/// Projection selection as it appears in run files and output metadata.
///
/// ```yaml
/// projection:
///   type: lambert_conformal
///   lat0: 38.5
///   lon0: -97.5
///   latin1: 38.5
///   latin2: 38.5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectionConfig {
    /// Longitude/latitude in degrees.
    #[default]
    Geographic,
    /// Spherical sinusoidal.
    Sinusoidal {
        #[serde(default = "default_sphere_radius")]
        radius: f64,
        #[serde(default)]
        central_meridian: f64,
        #[serde(default)]
        false_easting: f64,
        #[serde(default)]
        false_northing: f64,
    },
    /// Spherical Lambert Conformal Conic.
    LambertConformal {
        lat0: f64,
        lon0: f64,
        latin1: f64,
        latin2: f64,
        #[serde(default)]
        false_easting: f64,
        #[serde(default)]
        false_northing: f64,
    },
}

fn default_sphere_radius() -> f64 {
    MODIS_SPHERE_RADIUS
}

impl ProjectionConfig {
    /// Build the transform, validating parameters.
    pub fn build(&self) -> Result<Box<dyn ProjectionTransform>> {
        Ok(match *self {
            Self::Geographic => Box::new(Geographic),
            Self::Sinusoidal {
                radius,
                central_meridian,
                false_easting,
                false_northing,
            } => Box::new(Sinusoidal::new(
                radius,
                central_meridian,
                false_easting,
                false_northing,
            )?),
            Self::LambertConformal {
                lat0,
                lon0,
                latin1,
                latin2,
                false_easting,
                false_northing,
            } => Box::new(LambertConformal::new(
                lat0,
                lon0,
                latin1,
                latin2,
                false_easting,
                false_northing,
            )?),
        })
    }

    /// Whether map units are degrees rather than metres.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Geographic)
    }
}
