//! Swath resample command library.
//!
//! Exposes the run file loader so it can be tested outside the binary.

pub mod config;

pub use config::{FitSpec, GeolocationConfig, GridSpec, InputConfig, OutputConfig, RunConfig};
