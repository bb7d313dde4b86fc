//! Separable interpolation kernel weight tables.
//!
//! A kernel is evaluated at a quantized sub-pixel offset: the fractional
//! position `d ∈ [0, 1]` of an output pixel inside a source pixel
//! footprint is mapped to one of `NDELTA + 1` buckets, and each bucket
//! holds the weights of every tap in the kernel's support window. Line
//! and sample directions use separate tables so that the 2-D weight of a
//! tap is `line[bucket_l][tap_l] * sample[bucket_s][tap_s]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, Result};

/// Number of quantization steps across one source pixel.
pub const NDELTA: usize = 64;

/// Cubic convolution shape parameter (Keys 1981).
pub const CUBIC_ALPHA: f64 = -0.5;

/// Interpolation kernel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    /// Nearest neighbor: the highest-weight tap seen across all scans wins.
    Nearest,
    /// Legacy nearest neighbor with a hard step at half a pixel.
    NearestStep,
    /// Bilinear weighted average over a 2×2 window.
    Bilinear,
    /// Cubic convolution weighted average over a 4×4 window.
    Cubic,
}

impl KernelType {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::NearestStep => "nearest_step",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
        }
    }

    /// Whole pixels needed `(before, after)` the reference pixel.
    pub fn support(&self) -> (usize, usize) {
        match self {
            Self::Nearest | Self::NearestStep | Self::Bilinear => (0, 1),
            Self::Cubic => (1, 2),
        }
    }

    /// Taps per axis.
    pub fn taps(&self) -> usize {
        let (before, after) = self.support();
        before + after + 1
    }

    /// Fill taps (with nonzero weight) at which an output pixel becomes fill.
    pub fn fill_threshold(&self) -> usize {
        match self {
            Self::Nearest | Self::NearestStep => 1,
            Self::Bilinear => 2,
            Self::Cubic => 8,
        }
    }

    /// Whether accumulation is winner-take-all rather than a weighted average.
    pub fn is_nearest(&self) -> bool {
        matches!(self, Self::Nearest | Self::NearestStep)
    }
}

impl Default for KernelType {
    fn default() -> Self {
        Self::Bilinear
    }
}

impl FromStr for KernelType {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nearest" | "nn" | "nearest_neighbor" => Ok(Self::Nearest),
            "nearest_step" | "oldnn" => Ok(Self::NearestStep),
            "bilinear" | "bi" => Ok(Self::Bilinear),
            "cubic" | "cc" | "cubic_convolution" => Ok(Self::Cubic),
            other => Err(ResampleError::InvalidKernel(other.to_string())),
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Precomputed separable weights for one kernel. Immutable once built.
#[derive(Debug, Clone)]
pub struct KernelTable {
    kernel: KernelType,
    before: usize,
    after: usize,
    taps: usize,
    /// `[bucket][tap]`, flattened.
    line: Vec<f64>,
    /// Same values as `line` for every kernel built here. Kept as its own
    /// table so the scatter step indexes each axis independently.
    sample: Vec<f64>,
}

impl KernelTable {
    /// Build the weight tables for `kernel`.
    pub fn build(kernel: KernelType) -> Self {
        let (before, after) = kernel.support();
        let taps = kernel.taps();
        let mut weights = vec![0.0; (NDELTA + 1) * taps];

        match kernel {
            KernelType::Nearest | KernelType::Bilinear => {
                for bucket in 0..=NDELTA {
                    let x = bucket as f64 / NDELTA as f64;
                    weights[bucket * taps] = 1.0 - x;
                    weights[bucket * taps + 1] = x;
                }
            }
            KernelType::NearestStep => {
                for bucket in 0..=NDELTA {
                    let x = bucket as f64 / NDELTA as f64;
                    let tap = if x < 0.5 { 0 } else { 1 };
                    weights[bucket * taps + tap] = 1.0;
                }
            }
            KernelType::Cubic => {
                for bucket in 0..=NDELTA {
                    let x = bucket as f64 / NDELTA as f64;
                    let row = &mut weights[bucket * taps..(bucket + 1) * taps];
                    row[0] = cubic_outer(1.0 + x);
                    row[1] = cubic_inner(x);
                    row[2] = cubic_inner(1.0 - x);
                }
                // The far tap at offset x is the near-outer tap of the mirrored bucket
                for bucket in 0..=NDELTA {
                    let mirrored = weights[(NDELTA - bucket) * taps];
                    weights[bucket * taps + 3] = mirrored;
                }
            }
        }

        Self {
            kernel,
            before,
            after,
            taps,
            // Both axes use the same 1-D kernel.
            line: weights.clone(),
            sample: weights,
        }
    }

    /// Build from a kernel name; fails on an unrecognized name.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::build(name.parse()?))
    }

    /// Quantize a sub-pixel offset in `[0, 1]` to a bucket index.
    pub fn bucket(offset: f64) -> usize {
        let scaled = (offset * NDELTA as f64).round();
        if scaled <= 0.0 {
            0
        } else if scaled >= NDELTA as f64 {
            NDELTA
        } else {
            scaled as usize
        }
    }

    pub fn kernel(&self) -> KernelType {
        self.kernel
    }

    pub fn before(&self) -> usize {
        self.before
    }

    pub fn after(&self) -> usize {
        self.after
    }

    /// Taps per axis.
    pub fn taps(&self) -> usize {
        self.taps
    }

    /// Line-direction weights for `bucket`.
    pub fn line_weights(&self, bucket: usize) -> &[f64] {
        &self.line[bucket * self.taps..(bucket + 1) * self.taps]
    }

    /// Sample-direction weights for `bucket`.
    pub fn sample_weights(&self, bucket: usize) -> &[f64] {
        &self.sample[bucket * self.taps..(bucket + 1) * self.taps]
    }
}

/// Keys cubic for `0 <= t <= 1`.
fn cubic_inner(t: f64) -> f64 {
    let a = CUBIC_ALPHA;
    (a + 2.0) * t * t * t - (a + 3.0) * t * t + 1.0
}

/// Keys cubic for `1 <= t <= 2`.
fn cubic_outer(t: f64) -> f64 {
    let a = CUBIC_ALPHA;
    a * t * t * t - 5.0 * a * t * t + 8.0 * a * t - 4.0 * a
}
