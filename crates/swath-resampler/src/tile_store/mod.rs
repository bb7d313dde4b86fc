//! Two-tier tile cache for output accumulation.
//!
//! Output pixels are accumulated in square tiles. A tile comes into
//! memory the first time anything targets it, stays there while scans
//! keep touching it, and is converted to the output type and appended to
//! a scratch file once it has gone stale. Spilled tiles are never read
//! back until [`TileStore::reassemble`] stitches the final image.

mod arena;
mod reassemble;
mod spill;

pub use arena::TileBuffer;
pub use reassemble::ReassemblySummary;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ResamplerConfig, RunContext};
use crate::error::{ResampleError, Result};
use crate::grid::OutputGrid;
use crate::types::{RangeMap, StorageType, TypedBuffer};

use arena::TileArena;
use spill::ScratchFile;

/// Where a tile currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// Nothing has targeted the tile yet.
    Null,
    /// Resident in arena slot `slot`.
    InMemory { slot: usize },
    /// Spilled to the scratch file at byte `offset`.
    OnDisk { offset: u64 },
}

/// Index of a resident tile's arena slot.
///
/// Only valid until the next [`TileStore::evict_stale`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHandle(usize);

/// Counters for one run of the tile cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TileStoreStats {
    pub tiles_created: usize,
    pub tiles_spilled: usize,
    pub bytes_spilled: u64,
    pub peak_in_memory: usize,
    pub null_tiles_synthesized: usize,
    pub evict_passes: usize,
}

/// Tile cache for one resampling run (one band).
#[derive(Debug)]
pub struct TileStore {
    tile_size: usize,
    tile_rows: usize,
    tile_cols: usize,
    grid_lines: usize,
    grid_samples: usize,
    table: Vec<TileStatus>,
    arena: TileArena,
    scratch: ScratchFile,
    touch_retention: i32,
    min_weight: f64,
    nearest: bool,
    source_type: StorageType,
    source_fill: f64,
    output_fill: Option<f64>,
    spill_type: Option<StorageType>,
    stats: TileStoreStats,
}

impl TileStore {
    /// Create an empty store covering `grid` and open its scratch file.
    ///
    /// Accumulation happens in `source_type` units; `source_fill` is the
    /// source fill sentinel.
    pub fn new(
        ctx: &RunContext,
        grid: &OutputGrid,
        config: &ResamplerConfig,
        source_type: StorageType,
        source_fill: f64,
    ) -> Result<Self> {
        config.validate().map_err(ResampleError::invalid_config)?;
        if grid.is_empty() {
            return Err(ResampleError::shape("TileStore::new", "output grid is empty"));
        }

        let tile_size = config.tile_size;
        let tile_rows = grid.tile_rows(tile_size);
        let tile_cols = grid.tile_cols(tile_size);
        let scratch = ScratchFile::create(ctx)?;

        debug!(
            tile_rows,
            tile_cols,
            tile_size,
            max_in_memory = config.max_tiles_in_memory,
            scratch = %scratch.path().display(),
            "Created tile store"
        );

        Ok(Self {
            tile_size,
            tile_rows,
            tile_cols,
            grid_lines: grid.lines,
            grid_samples: grid.samples,
            table: vec![TileStatus::Null; tile_rows * tile_cols],
            arena: TileArena::new(
                tile_size * tile_size,
                config.max_tiles_in_memory,
                config.tile_growth_batch,
            ),
            scratch,
            touch_retention: config.touch_retention,
            min_weight: config.min_weight,
            nearest: config.kernel.is_nearest(),
            source_type,
            source_fill,
            output_fill: config.output_fill,
            spill_type: None,
            stats: TileStoreStats::default(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn tile_rows(&self) -> usize {
        self.tile_rows
    }

    pub fn tile_cols(&self) -> usize {
        self.tile_cols
    }

    pub fn grid_lines(&self) -> usize {
        self.grid_lines
    }

    pub fn grid_samples(&self) -> usize {
        self.grid_samples
    }

    pub fn source_type(&self) -> StorageType {
        self.source_type
    }

    pub fn source_fill(&self) -> f64 {
        self.source_fill
    }

    pub fn stats(&self) -> &TileStoreStats {
        &self.stats
    }

    /// Slots allocated so far.
    pub fn n_in_memory(&self) -> usize {
        self.arena.n_in_memory()
    }

    /// Resident tiles.
    pub fn n_used(&self) -> usize {
        self.arena.n_used()
    }

    /// Allocated slots not holding a tile.
    pub fn n_free(&self) -> usize {
        self.arena.n_free()
    }

    /// Bytes appended to the scratch file so far.
    pub fn scratch_len(&self) -> u64 {
        self.scratch.len()
    }

    /// Fill value written for invalid pixels in `output` units.
    ///
    /// The configured override wins; otherwise the source fill is
    /// range-mapped. Either way the result is what a round trip through
    /// `output` yields, so decoded pixels compare equal to it.
    pub fn output_fill(&self, output: StorageType) -> f64 {
        let fill = self
            .output_fill
            .unwrap_or_else(|| RangeMap::new(self.source_type, output).convert(self.source_fill));
        TypedBuffer::from_f64(output, &[fill])
            .get(0)
            .unwrap_or(fill)
    }

    /// Status of the tile at `(tile_row, tile_col)`.
    pub fn status(&self, tile_row: usize, tile_col: usize) -> Result<TileStatus> {
        Ok(self.table[self.table_index("status", tile_row, tile_col)?])
    }

    /// Accumulation planes of a resident tile.
    pub fn tile(&self, handle: TileHandle) -> &TileBuffer {
        &self.arena.slot(handle.0).buffer
    }

    pub fn tile_mut(&mut self, handle: TileHandle) -> &mut TileBuffer {
        &mut self.arena.slot_mut(handle.0).buffer
    }

    /// Touch counter of a resident tile.
    pub fn touch_count(&self, handle: TileHandle) -> i32 {
        self.arena.slot(handle.0).touch
    }

    fn table_index(&self, op: &'static str, tile_row: usize, tile_col: usize) -> Result<usize> {
        if tile_row >= self.tile_rows || tile_col >= self.tile_cols {
            return Err(ResampleError::TileOutOfRange {
                op,
                tile_row,
                tile_col,
                tile_rows: self.tile_rows,
                tile_cols: self.tile_cols,
            });
        }
        Ok(tile_row * self.tile_cols + tile_col)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bring a NULL tile into memory and put it at the head of the used list.
    ///
    /// Fails without changing anything when the tile is already resident
    /// or already spilled, or when the in-memory cap is reached.
    pub fn touch(&mut self, tile_row: usize, tile_col: usize) -> Result<TileHandle> {
        let index = self.table_index("touch", tile_row, tile_col)?;
        match self.table[index] {
            TileStatus::Null => {}
            TileStatus::InMemory { .. } => {
                return Err(ResampleError::AlreadyResident {
                    op: "touch",
                    tile_row,
                    tile_col,
                })
            }
            TileStatus::OnDisk { .. } => {
                return Err(ResampleError::Reentrancy {
                    op: "touch",
                    tile_row,
                    tile_col,
                })
            }
        }

        let slot = self
            .arena
            .take_free()
            .ok_or(ResampleError::ResourceExhausted {
                limit: self.arena.max_slots(),
                tile_row,
                tile_col,
            })?;

        let retention = self.touch_retention;
        let entry = self.arena.slot_mut(slot);
        entry.tile_row = tile_row;
        entry.tile_col = tile_col;
        entry.touch = retention;
        entry.touched_this_scan = true;
        self.arena.push_used_front(slot);
        self.table[index] = TileStatus::InMemory { slot };

        self.stats.tiles_created += 1;
        self.stats.peak_in_memory = self.stats.peak_in_memory.max(self.arena.n_used());
        Ok(TileHandle(slot))
    }

    /// Handle to the tile at `(tile_row, tile_col)` for accumulation,
    /// creating it if needed and marking it recently touched.
    ///
    /// Targeting a spilled tile is a re-entrancy violation.
    pub fn acquire(&mut self, tile_row: usize, tile_col: usize) -> Result<TileHandle> {
        let index = self.table_index("acquire", tile_row, tile_col)?;
        match self.table[index] {
            TileStatus::Null => self.touch(tile_row, tile_col),
            TileStatus::InMemory { slot } => {
                let retention = self.touch_retention;
                let entry = self.arena.slot_mut(slot);
                entry.touch = retention;
                if !entry.touched_this_scan {
                    entry.touched_this_scan = true;
                    self.arena.move_to_front(slot);
                }
                Ok(TileHandle(slot))
            }
            TileStatus::OnDisk { .. } => Err(ResampleError::Reentrancy {
                op: "acquire",
                tile_row,
                tile_col,
            }),
        }
    }

    /// Age every tile not touched since the previous sweep and clear the
    /// per-scan touched flags.
    pub fn sweep_decrement(&mut self) {
        for slot in self.arena.used() {
            let entry = self.arena.slot_mut(slot);
            if entry.touched_this_scan {
                entry.touched_this_scan = false;
            } else {
                entry.touch -= 1;
            }
        }
    }

    /// Spill every resident tile whose touch counter is below zero,
    /// converting its pixels to `output`. Returns the number spilled.
    ///
    /// All spills of one store must use the same output type.
    pub fn evict_stale(&mut self, output: StorageType) -> Result<usize> {
        match self.spill_type {
            Some(existing) if existing != output => {
                return Err(ResampleError::shape(
                    "TileStore::evict_stale",
                    format!("tiles already spilled as {existing}, cannot spill as {output}"),
                ))
            }
            _ => self.spill_type = Some(output),
        }

        let stale: Vec<usize> = self
            .arena
            .used()
            .into_iter()
            .rev()
            .filter(|&slot| self.arena.slot(slot).touch < 0)
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let range = RangeMap::new(self.source_type, output);
        let fill = self.output_fill(output);
        for &slot in &stale {
            let payload = self.encode_tile(slot, &range, fill, output);
            let offset = self.scratch.append(payload.as_bytes())?;

            let (tile_row, tile_col) = {
                let entry = self.arena.slot(slot);
                (entry.tile_row, entry.tile_col)
            };
            let index = tile_row * self.tile_cols + tile_col;
            self.table[index] = TileStatus::OnDisk { offset };
            self.arena.unlink_used(slot);
            self.arena.push_free(slot);

            self.stats.tiles_spilled += 1;
            self.stats.bytes_spilled += payload.as_bytes().len() as u64;
        }
        self.stats.evict_passes += 1;

        debug!(
            spilled = stale.len(),
            resident = self.arena.n_used(),
            scratch_bytes = self.scratch.len(),
            "Evicted stale tiles"
        );
        Ok(stale.len())
    }

    /// Spill everything still resident.
    pub fn drain(&mut self, output: StorageType) -> Result<usize> {
        let mut spilled = 0;
        while self.arena.n_used() > 0 {
            self.sweep_decrement();
            spilled += self.evict_stale(output)?;
        }
        Ok(spilled)
    }

    /// Final pixel values of a resident tile in `output` units.
    fn encode_tile(&self, slot: usize, range: &RangeMap, fill: f64, output: StorageType) -> TypedBuffer {
        let buffer = &self.arena.slot(slot).buffer;
        let values: Vec<f64> = (0..buffer.len())
            .map(|i| {
                buffer
                    .resolve(i, self.nearest, self.min_weight)
                    .map(|v| range.convert(v))
                    .unwrap_or(fill)
            })
            .collect();
        TypedBuffer::from_f64(output, &values)
    }

    /// Bytes of a spilled tile exactly as they were written.
    ///
    /// Returns `None` for tiles that are not on disk.
    pub fn read_spilled(&mut self, tile_row: usize, tile_col: usize) -> Result<Option<Vec<u8>>> {
        let index = self.table_index("read_spilled", tile_row, tile_col)?;
        let TileStatus::OnDisk { offset } = self.table[index] else {
            return Ok(None);
        };
        let Some(output) = self.spill_type else {
            warn!(tile_row, tile_col, "Tile on disk but no spill type recorded");
            return Ok(None);
        };
        let len = self.tile_size * self.tile_size * output.size_bytes();
        self.scratch.read_at(offset, len).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelType;

    fn store(dir: &std::path::Path, config: &ResamplerConfig, lines: usize, samples: usize) -> TileStore {
        let ctx = RunContext::new(dir);
        let grid = OutputGrid::new(lines, samples, 0.0, 0.0, 1.0, 1.0).unwrap();
        TileStore::new(&ctx, &grid, config, StorageType::Int16, -999.0).unwrap()
    }

    #[test]
    fn test_touch_creates_resident_tile() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig {
            tile_size: 4,
            ..Default::default()
        };
        let mut store = store(dir.path(), &config, 10, 10);
        assert_eq!(store.tile_rows(), 3);
        assert_eq!(store.tile_cols(), 3);

        let handle = store.touch(1, 2).unwrap();
        assert_eq!(store.status(1, 2).unwrap(), TileStatus::InMemory { slot: handle.0 });
        assert_eq!(store.touch_count(handle), config.touch_retention);
        assert_eq!(store.n_used(), 1);
        assert_eq!(store.n_used() + store.n_free(), store.n_in_memory());

        let err = store.touch(1, 2).unwrap_err();
        assert!(matches!(err, ResampleError::AlreadyResident { .. }), "got {err}");
    }

    #[test]
    fn test_out_of_range_tile() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig {
            tile_size: 4,
            ..Default::default()
        };
        let mut store = store(dir.path(), &config, 4, 4);
        assert!(matches!(
            store.touch(1, 0),
            Err(ResampleError::TileOutOfRange { .. })
        ));
    }

    #[test]
    fn test_cap_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig {
            tile_size: 2,
            max_tiles_in_memory: 2,
            tile_growth_batch: 1,
            ..Default::default()
        };
        let mut store = store(dir.path(), &config, 4, 4);
        store.touch(0, 0).unwrap();
        store.touch(0, 1).unwrap();
        let err = store.touch(1, 0).unwrap_err();
        assert!(matches!(err, ResampleError::ResourceExhausted { limit: 2, .. }), "got {err}");
        assert_eq!(store.status(1, 0).unwrap(), TileStatus::Null);
    }

    #[test]
    fn test_stale_tiles_spill_after_retention() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig {
            tile_size: 2,
            touch_retention: 1,
            ..Default::default()
        };
        let mut store = store(dir.path(), &config, 4, 4);
        store.acquire(0, 0).unwrap();

        // The scan that created the tile only clears the flag.
        store.sweep_decrement();
        assert_eq!(store.evict_stale(StorageType::Int16).unwrap(), 0);
        // retention 1 -> 0 -> -1
        store.sweep_decrement();
        assert_eq!(store.evict_stale(StorageType::Int16).unwrap(), 0);
        store.sweep_decrement();
        assert_eq!(store.evict_stale(StorageType::Int16).unwrap(), 1);

        assert!(matches!(store.status(0, 0).unwrap(), TileStatus::OnDisk { offset: 0 }));
        assert_eq!(store.n_used(), 0);
        assert_eq!(store.n_free(), store.n_in_memory());
        assert_eq!(store.scratch_len(), 2 * 2 * 2);
    }

    #[test]
    fn test_acquire_refreshes_touch() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig {
            tile_size: 2,
            touch_retention: 0,
            ..Default::default()
        };
        let mut store = store(dir.path(), &config, 4, 4);
        store.acquire(0, 0).unwrap();
        for _ in 0..5 {
            store.sweep_decrement();
            store.acquire(0, 0).unwrap();
            assert_eq!(store.evict_stale(StorageType::Int16).unwrap(), 0);
        }
        assert!(matches!(store.status(0, 0).unwrap(), TileStatus::InMemory { .. }));
    }

    #[test]
    fn test_acquire_spilled_is_reentrancy() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig {
            tile_size: 2,
            ..Default::default()
        };
        let mut store = store(dir.path(), &config, 2, 2);
        store.acquire(0, 0).unwrap();
        store.drain(StorageType::Int16).unwrap();
        let err = store.acquire(0, 0).unwrap_err();
        assert!(matches!(err, ResampleError::Reentrancy { op: "acquire", .. }), "got {err}");
    }

    #[test]
    fn test_evicted_payload_resolves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig {
            tile_size: 2,
            kernel: KernelType::Bilinear,
            ..Default::default()
        };
        let mut store = store(dir.path(), &config, 2, 2);
        let handle = store.acquire(0, 0).unwrap();
        let tile = store.tile_mut(handle);
        tile.add_weighted(0, 20.0, 2.0);
        tile.add_weighted(1, 0.5, 0.05);
        tile.mark_fill(2, -999.0);
        tile.add_weighted(3, -7.0, 1.0);

        store.drain(StorageType::Int16).unwrap();
        let bytes = store.read_spilled(0, 0).unwrap().unwrap();
        let values = TypedBuffer::from_bytes(StorageType::Int16, &bytes).unwrap().to_f64_vec();
        assert_eq!(values, vec![10.0, -999.0, -999.0, -7.0]);
    }

    #[test]
    fn test_spill_type_must_not_change() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig::default();
        let mut store = store(dir.path(), &config, 2, 2);
        store.evict_stale(StorageType::Int16).unwrap();
        assert!(store.evict_stale(StorageType::Float32).is_err());
    }

    #[test]
    fn test_output_fill_override_and_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResamplerConfig::default();
        let store_a = store(dir.path(), &config, 2, 2);
        assert_eq!(store_a.output_fill(StorageType::Int16), -999.0);
        assert_eq!(store_a.output_fill(StorageType::Float32), -999.0);

        let config = ResamplerConfig {
            output_fill: Some(255.0),
            ..Default::default()
        };
        let store_b = store(dir.path(), &config, 2, 2);
        assert_eq!(store_b.output_fill(StorageType::UInt8), 255.0);
    }
}
