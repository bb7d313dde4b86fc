//! Error types for projection transforms.

use thiserror::Error;

/// Errors raised while building or evaluating a projection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// A projection parameter is out of range or inconsistent.
    #[error("invalid projection parameter: {0}")]
    InvalidParameter(String),

    /// The geodetic point lies outside the projection's domain.
    #[error("point (lon {lon}, lat {lat}) is outside the projection domain")]
    OutOfDomain { lon: f64, lat: f64 },

    /// The transform produced a non-finite result.
    #[error("{op} transform failed at ({a}, {b})")]
    TransformFailed { op: &'static str, a: f64, b: f64 },
}

impl ProjectionError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create an OutOfDomain error.
    pub fn out_of_domain(lon: f64, lat: f64) -> Self {
        Self::OutOfDomain { lon, lat }
    }

    /// Create a TransformFailed error for the forward direction.
    pub fn forward_failed(lon: f64, lat: f64) -> Self {
        Self::TransformFailed {
            op: "forward",
            a: lon,
            b: lat,
        }
    }

    /// Create a TransformFailed error for the inverse direction.
    pub fn inverse_failed(x: f64, y: f64) -> Self {
        Self::TransformFailed {
            op: "inverse",
            a: x,
            b: y,
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
