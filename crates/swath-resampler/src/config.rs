//! Configuration for the swath resampler.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::KernelType;
use crate::types::StorageType;

/// Tunables for one resampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplerConfig {
    /// Interpolation kernel.
    pub kernel: KernelType,

    /// Tile edge length in output pixels (square tiles).
    pub tile_size: usize,

    /// Hard cap on tiles held in memory at once.
    pub max_tiles_in_memory: usize,

    /// Tiles allocated at a time when the free pool runs dry.
    pub tile_growth_batch: usize,

    /// Touch counter given to a tile whenever it receives a contribution.
    /// A tile is spilled once it has gone this many scans plus one
    /// without being touched.
    pub touch_retention: i32,

    /// Accumulated weight a pixel needs to be considered valid.
    pub min_weight: f64,

    /// Hole filling applied during reassembly.
    pub fill_policy: FillPolicy,

    /// Output storage type; defaults to the source type.
    pub output_type: Option<StorageType>,

    /// Output fill value; defaults to the source fill converted to the output type.
    pub output_fill: Option<f64>,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            kernel: KernelType::Bilinear,
            tile_size: 32,
            max_tiles_in_memory: 4096,
            tile_growth_batch: 64,
            touch_retention: 2,
            min_weight: 0.10,
            fill_policy: FillPolicy::None,
            output_type: None,
            output_fill: None,
        }
    }
}

impl ResamplerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `SWATH_*` environment overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("SWATH_KERNEL") {
            if let Ok(kernel) = val.parse() {
                self.kernel = kernel;
            }
        }

        if let Ok(val) = std::env::var("SWATH_TILE_SIZE") {
            if let Ok(size) = val.parse() {
                self.tile_size = size;
            }
        }

        if let Ok(val) = std::env::var("SWATH_MAX_TILES") {
            if let Ok(max) = val.parse() {
                self.max_tiles_in_memory = max;
            }
        }

        if let Ok(val) = std::env::var("SWATH_TOUCH_RETENTION") {
            if let Ok(retention) = val.parse() {
                self.touch_retention = retention;
            }
        }

        if let Ok(val) = std::env::var("SWATH_MIN_WEIGHT") {
            if let Ok(weight) = val.parse() {
                self.min_weight = weight;
            }
        }

        if let Ok(val) = std::env::var("SWATH_FILL_POLICY") {
            self.fill_policy = FillPolicy::from_str(&val);
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 {
            return Err("tile_size must be > 0".to_string());
        }

        if self.max_tiles_in_memory == 0 {
            return Err("max_tiles_in_memory must be > 0".to_string());
        }

        if self.tile_growth_batch == 0 {
            return Err("tile_growth_batch must be > 0".to_string());
        }

        if self.touch_retention < 0 {
            return Err("touch_retention must be >= 0".to_string());
        }

        if !(self.min_weight.is_finite() && self.min_weight >= 0.0) {
            return Err("min_weight must be a finite, non-negative number".to_string());
        }

        Ok(())
    }

    /// Bytes held by one in-memory tile (three `f64` planes).
    pub fn tile_memory_bytes(&self) -> usize {
        3 * self.tile_size * self.tile_size * std::mem::size_of::<f64>()
    }
}

/// Hole filling applied while reassembling output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Emit pixels as accumulated.
    None,
    /// Replace isolated fill pixels with the median of their neighbors.
    NearestHoleFill,
}

impl Default for FillPolicy {
    fn default() -> Self {
        Self::None
    }
}

impl FillPolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest_hole_fill" | "hole_fill" | "fill" => Self::NearestHoleFill,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NearestHoleFill => "nearest_hole_fill",
        }
    }
}

/// Per-run environment passed to the tile store and pipeline.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier attached to log spans and scratch file names.
    pub run_id: String,
    /// Directory that receives the scratch file.
    pub scratch_dir: PathBuf,
    /// File name prefix of the scratch file.
    pub scratch_prefix: String,
    /// Keep the scratch file on disk after the run.
    pub keep_scratch: bool,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl RunContext {
    /// Context with a fresh run id, scratch files in `scratch_dir`.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            scratch_dir: scratch_dir.into(),
            scratch_prefix: "swath-tiles-".to_string(),
            keep_scratch: false,
        }
    }
}
