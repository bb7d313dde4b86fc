//! Scan-at-a-time driver tying the resampler together.

use std::time::Instant;

use projection::{ProjectionConfig, ProjectionTransform};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::config::{ResamplerConfig, RunContext};
use crate::error::{ResampleError, Result};
use crate::geolocation::GeoScan;
use crate::grid::{GridMetadata, OutputGrid};
use crate::kernel::{KernelTable, KernelType};
use crate::scan_buffer::{OutCoord, ScanBuffer};
use crate::scatter::{ScanStats, ScatterResampler};
use crate::sink::OutputSink;
use crate::source::{GeolocationSource, SourceReader};
use crate::tile_store::{ReassemblySummary, TileStore, TileStoreStats};
use crate::types::StorageType;

/// What one run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub kernel: KernelType,
    pub output_type: StorageType,
    pub scans: usize,
    /// Geolocation points the projection could not map.
    pub projection_failures: usize,
    pub scatter: ScanStats,
    pub tiles: TileStoreStats,
    pub reassembly: ReassemblySummary,
    pub elapsed_ms: u64,
}

/// Resamples one band onto one output grid.
pub struct Pipeline {
    ctx: RunContext,
    config: ResamplerConfig,
    grid: OutputGrid,
    projection_config: ProjectionConfig,
    projection: Box<dyn ProjectionTransform>,
    resampler: ScatterResampler,
}

impl Pipeline {
    /// Validate the configuration and build the projection and kernel.
    ///
    /// Everything that can fail before the first scan fails here.
    pub fn new(
        ctx: RunContext,
        config: ResamplerConfig,
        grid: OutputGrid,
        projection_config: ProjectionConfig,
    ) -> Result<Self> {
        config.validate().map_err(ResampleError::invalid_config)?;
        let projection = projection_config.build()?;
        let resampler = ScatterResampler::new(KernelTable::build(config.kernel));
        Ok(Self {
            ctx,
            config,
            grid,
            projection_config,
            projection,
            resampler,
        })
    }

    pub fn grid(&self) -> &OutputGrid {
        &self.grid
    }

    pub fn config(&self) -> &ResamplerConfig {
        &self.config
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Map geolocation to continuous output pixel coordinates.
    ///
    /// Returns the coordinates and the number of points the projection
    /// rejected. Missing points are fill but are not failures.
    fn map_to_grid(&self, geo: &GeoScan) -> (Vec<OutCoord>, usize) {
        let mut failures = 0;
        let coords = (0..geo.len())
            .map(|i| {
                let Some((lon, lat)) = geo.point(i) else {
                    return OutCoord::FILL;
                };
                match self.projection.forward(lon, lat) {
                    Ok((x, y)) => {
                        let (line, sample) = self.grid.to_pixel(x, y);
                        if line.is_finite() && sample.is_finite() {
                            OutCoord::new(line, sample)
                        } else {
                            failures += 1;
                            OutCoord::FILL
                        }
                    }
                    Err(_) => {
                        failures += 1;
                        OutCoord::FILL
                    }
                }
            })
            .collect();
        (coords, failures)
    }

    /// Resample every scan of `source` and write the result to `sink`.
    pub fn run(
        &self,
        source: &mut dyn SourceReader,
        geolocation: &mut dyn GeolocationSource,
        sink: &mut dyn OutputSink,
    ) -> Result<RunSummary> {
        let kernel = self.config.kernel;
        let span = info_span!("resample", run_id = %self.ctx.run_id, kernel = %kernel);
        let _enter = span.enter();
        let started = Instant::now();

        let storage = source.storage_type();
        let fill = source.fill_value();
        let output = self.config.output_type.unwrap_or(storage);
        let scan_count = source.scan_count();
        let (lines, samples) = source.dimensions();
        info!(
            lines,
            samples,
            scans = scan_count,
            source_type = %storage,
            output_type = %output,
            projection = self.projection.name(),
            grid_lines = self.grid.lines,
            grid_samples = self.grid.samples,
            "Starting resample"
        );

        let mut store = TileStore::new(&self.ctx, &self.grid, &self.config, storage, fill)?;
        let mut buffer: Option<ScanBuffer> = None;
        let mut scatter = ScanStats::default();
        let mut projection_failures = 0;

        for scan in 0..scan_count {
            let block = source.read_scan(scan)?;
            let geo = geolocation.scan_geolocation(scan)?;
            if geo.lines != block.lines || geo.samples != block.samples {
                return Err(ResampleError::shape(
                    "Pipeline::run",
                    format!(
                        "scan {scan}: geolocation is {}x{}, data is {}x{}",
                        geo.lines, geo.samples, block.lines, block.samples
                    ),
                ));
            }

            let mut buf = match buffer.take() {
                Some(mut b) if b.scan_lines() == block.lines && b.scan_samples() == block.samples => {
                    b.reset();
                    b
                }
                _ => ScanBuffer::new(block.lines, block.samples, self.resampler.kernel(), fill)?,
            };

            let (coords, mut failures) = self.map_to_grid(&geo);
            buf.set_interior_coords(&coords)?;
            if let Some(row) = geolocation.virtual_row(scan)? {
                let (row_coords, row_failures) = self.map_to_grid(&row);
                failures += row_failures;
                buf.set_virtual_row(&row_coords)?;
            }
            if failures > 0 {
                warn!(scan, failures, "Projection rejected geolocation points");
            }
            projection_failures += failures;
            buf.extend();
            buf.set_interior_values(&block.values())?;

            let stats = self.resampler.scatter(&buf, &mut store)?;
            if stats.quads > 0 && stats.fill_gaps + stats.degenerate == stats.quads {
                warn!(scan, quads = stats.quads, "Every quad in scan was a gap");
            }
            store.sweep_decrement();
            let evicted = store.evict_stale(output)?;
            debug!(
                scan,
                hits = stats.pixel_hits,
                fill_gaps = stats.fill_gaps,
                evicted,
                resident = store.n_used(),
                "Scan resampled"
            );

            scatter.merge(&stats);
            buffer = Some(buf);
        }

        store.drain(output)?;
        let output_fill = store.output_fill(output);
        let mut tiles = store.stats().clone();
        let reassembly = store.reassemble(output, self.config.fill_policy, sink)?;
        tiles.null_tiles_synthesized += reassembly.null_tiles;

        let metadata = GridMetadata::new(
            &self.grid,
            &self.projection_config,
            self.projection.as_ref(),
            output,
            output_fill,
            kernel,
            &self.ctx.run_id,
        );
        sink.finish(&metadata)?;

        let summary = RunSummary {
            run_id: self.ctx.run_id.clone(),
            kernel,
            output_type: output,
            scans: scan_count,
            projection_failures,
            scatter,
            tiles,
            reassembly,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            scans = summary.scans,
            pixel_hits = summary.scatter.pixel_hits,
            tiles_spilled = summary.tiles.tiles_spilled,
            projection_failures,
            elapsed_ms = summary.elapsed_ms,
            "Resample complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_config() {
        let config = ResamplerConfig {
            tile_size: 0,
            ..Default::default()
        };
        let grid = OutputGrid::new(4, 4, 0.0, 4.0, 1.0, 1.0).unwrap();
        let err = Pipeline::new(RunContext::default(), config, grid, ProjectionConfig::Geographic)
            .err()
            .unwrap();
        assert!(err.is_setup(), "got {err}");
    }

    #[test]
    fn test_map_to_grid_marks_missing_points() {
        let grid = OutputGrid::new(4, 4, 0.0, 4.0, 1.0, 1.0).unwrap();
        let pipeline = Pipeline::new(
            RunContext::default(),
            ResamplerConfig::default(),
            grid,
            ProjectionConfig::Geographic,
        )
        .unwrap();
        let geo = GeoScan::new(1, 2, vec![3.5, f64::NAN], vec![0.5, 1.0], None).unwrap();
        let (coords, failures) = pipeline.map_to_grid(&geo);
        assert_eq!(failures, 0);
        assert_eq!(coords[0], OutCoord::new(0.0, 0.0));
        assert!(coords[1].is_fill());
    }
}
