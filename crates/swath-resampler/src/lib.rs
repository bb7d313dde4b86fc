//! Swath-to-Grid Resampling Engine
//!
//! This crate resamples satellite swath scans (or gridded inputs split
//! into scans) onto a projected output grid. It provides:
//!
//! - **Scatter resampling**: source footprints are forward-mapped onto the
//!   grid, so no inverse projection is needed per output pixel
//! - **Separable kernels**: nearest neighbor, bilinear and cubic
//!   convolution from quantized weight tables
//! - **Bounded memory**: output tiles are spilled to a scratch file once
//!   scans stop touching them and stitched back together at the end
//!
//! # Architecture
//!
//! ```text
//! SourceReader + GeolocationSource
//!      │
//!      ▼
//! Pipeline::run (one scan at a time)
//!      │
//!      ├─► project geolocation into output pixel space
//!      │
//!      ├─► ScanBuffer: interior coords + values, extend() the border
//!      │
//!      ├─► ScatterResampler: quad → triangles → kernel → TileStore
//!      │
//!      └─► TileStore::sweep_decrement + evict_stale ──► scratch file
//!               │
//!               ▼
//!          drain + reassemble ──► OutputSink (line by line)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use swath_resampler::{MemoryGeolocation, MemorySink, MemorySource, OutputGrid, Pipeline,
//!     ResamplerConfig, RunContext};
//! use projection::ProjectionConfig;
//!
//! let grid = OutputGrid::new(512, 512, -100.0, 45.0, 0.01, 0.01)?;
//! let pipeline = Pipeline::new(RunContext::default(), ResamplerConfig::default(), grid,
//!     ProjectionConfig::Geographic)?;
//!
//! let mut sink = MemorySink::new();
//! let summary = pipeline.run(&mut source, &mut geolocation, &mut sink)?;
//! println!("{} pixels hit", summary.scatter.pixel_hits);
//! ```

pub mod config;
pub mod error;
pub mod geolocation;
pub mod grid;
pub mod kernel;
pub mod pipeline;
pub mod scan_buffer;
pub mod scatter;
pub mod sink;
pub mod source;
pub mod tile_store;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{FillPolicy, ResamplerConfig, RunContext};
pub use error::{ResampleError, Result};
pub use geolocation::{interpolate_bracketed, GeoScan, GeoUpsampler};
pub use grid::{GridMetadata, OutputGrid};
pub use kernel::{KernelTable, KernelType, NDELTA};
pub use pipeline::{Pipeline, RunSummary};
pub use scan_buffer::{OutCoord, ScanBuffer};
pub use scatter::{ScanStats, ScatterResampler};
pub use sink::{MemorySink, OutputSink, RawFileSink};
pub use source::{
    GeoLayout, GeolocationSource, MemoryGeolocation, MemorySource, RawArray, RawFileSource,
    RawGeolocation, ScanBlock, SourceKind, SourceReader,
};
pub use tile_store::{ReassemblySummary, TileBuffer, TileHandle, TileStatus, TileStore, TileStoreStats};
pub use types::{RangeMap, Sample, StorageType, TypedBuffer};
