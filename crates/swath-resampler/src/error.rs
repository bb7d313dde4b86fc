//! Error types for swath resampling.

use thiserror::Error;

/// Errors that can occur during a resampling run.
///
/// Geometry gaps (fill corners, degenerate quadrilaterals, footprints
/// outside the grid) are not errors; they are counted in
/// [`ScanStats`](crate::scatter::ScanStats) and skipped.
#[derive(Error, Debug)]
pub enum ResampleError {
    /// Unrecognized interpolation kernel name.
    #[error("invalid kernel type: {0}")]
    InvalidKernel(String),

    /// Unrecognized storage type name.
    #[error("invalid storage type: {0}")]
    InvalidStorageType(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Projection setup or transform error.
    #[error("projection error: {0}")]
    Projection(#[from] projection::ProjectionError),

    /// Buffer or grid dimensions do not agree.
    #[error("shape mismatch in {op}: {detail}")]
    Shape { op: &'static str, detail: String },

    /// More tiles are needed in memory than the configured cap allows.
    #[error("tile cache exhausted at tile ({tile_row}, {tile_col}): {limit} tiles already resident")]
    ResourceExhausted {
        limit: usize,
        tile_row: usize,
        tile_col: usize,
    },

    /// Tile was initialized twice between evictions.
    #[error("{op}: tile ({tile_row}, {tile_col}) is already resident")]
    AlreadyResident {
        op: &'static str,
        tile_row: usize,
        tile_col: usize,
    },

    /// Tile was targeted after it had been spilled to the scratch file.
    #[error("re-entrancy violation in {op}: tile ({tile_row}, {tile_col}) was already written to scratch")]
    Reentrancy {
        op: &'static str,
        tile_row: usize,
        tile_col: usize,
    },

    /// Tile coordinate outside the tile table.
    #[error("{op}: tile ({tile_row}, {tile_col}) is outside the {tile_rows}x{tile_cols} tile table")]
    TileOutOfRange {
        op: &'static str,
        tile_row: usize,
        tile_col: usize,
        tile_rows: usize,
        tile_cols: usize,
    },

    /// Scratch file read/write failure.
    #[error("scratch file {op} failed: {source}")]
    ScratchIo {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Input reader failure.
    #[error("source error: {0}")]
    Source(String),

    /// Output sink failure.
    #[error("sink error: {0}")]
    Sink(String),
}

impl ResampleError {
    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a Shape error.
    pub fn shape(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Shape {
            op,
            detail: detail.into(),
        }
    }

    /// Create a ScratchIo error.
    pub fn scratch_io(op: &'static str, source: std::io::Error) -> Self {
        Self::ScratchIo { op, source }
    }

    /// Create a Source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a Sink error.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Whether this error aborts before any scan is processed.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::InvalidKernel(_)
                | Self::InvalidStorageType(_)
                | Self::InvalidConfig(_)
                | Self::Projection(_)
        )
    }
}

/// Result type for resampling operations.
pub type Result<T> = std::result::Result<T, ResampleError>;
