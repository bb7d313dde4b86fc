//! Stitching spilled tiles back into output lines.

use serde::Serialize;
use tracing::{debug, info};

use super::{TileStatus, TileStore};
use crate::config::FillPolicy;
use crate::error::{ResampleError, Result};
use crate::sink::OutputSink;
use crate::types::{StorageType, TypedBuffer};

/// Outcome of [`TileStore::reassemble`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReassemblySummary {
    pub lines_written: usize,
    pub holes_filled: usize,
    pub null_tiles: usize,
}

impl TileStore {
    /// Read every tile back in row-major order and emit the image to
    /// `sink` line by line. Tiles that never received a contribution
    /// come out as fill.
    ///
    /// Anything still resident is drained first. Consumes the store.
    pub fn reassemble(
        mut self,
        output: StorageType,
        policy: FillPolicy,
        sink: &mut dyn OutputSink,
    ) -> Result<ReassemblySummary> {
        self.drain(output)?;
        if let Some(spilled) = self.spill_type {
            if spilled != output {
                return Err(ResampleError::shape(
                    "TileStore::reassemble",
                    format!("tiles were spilled as {spilled}, cannot reassemble as {output}"),
                ));
            }
        }

        let fill = self.output_fill(output);
        let samples = self.grid_samples;
        let tile = self.tile_size;
        let mut emitter = LineEmitter::new(policy, output, fill, samples);
        let mut summary = ReassemblySummary::default();

        for tile_row in 0..self.tile_rows {
            let first_line = tile_row * tile;
            let band_lines = tile.min(self.grid_lines - first_line);
            let mut band = vec![fill; tile * samples];

            for tile_col in 0..self.tile_cols {
                let index = tile_row * self.tile_cols + tile_col;
                match self.table[index] {
                    TileStatus::Null => {
                        summary.null_tiles += 1;
                        continue;
                    }
                    TileStatus::InMemory { .. } => {
                        return Err(ResampleError::shape(
                            "TileStore::reassemble",
                            format!("tile ({tile_row}, {tile_col}) still resident after drain"),
                        ));
                    }
                    TileStatus::OnDisk { .. } => {}
                }

                let bytes = self.read_spilled(tile_row, tile_col)?.ok_or_else(|| {
                    ResampleError::shape("TileStore::reassemble", "spilled tile has no payload")
                })?;
                let values = TypedBuffer::from_bytes(output, &bytes)?.to_f64_vec();

                let first_sample = tile_col * tile;
                let width = tile.min(samples - first_sample);
                for (row, chunk) in values.chunks(tile).take(band_lines).enumerate() {
                    let start = row * samples + first_sample;
                    band[start..start + width].copy_from_slice(&chunk[..width]);
                }
            }

            for row in 0..band_lines {
                let line = band[row * samples..(row + 1) * samples].to_vec();
                emitter.push(line, sink)?;
            }
            debug!(tile_row, first_line, band_lines, "Reassembled tile row");
        }

        emitter.finish(sink)?;
        summary.lines_written = emitter.lines_written;
        summary.holes_filled = emitter.holes_filled;
        self.stats.null_tiles_synthesized += summary.null_tiles;

        info!(
            lines = summary.lines_written,
            holes_filled = summary.holes_filled,
            null_tiles = summary.null_tiles,
            tiles_spilled = self.stats.tiles_spilled,
            "Reassembly complete"
        );
        Ok(summary)
    }
}

/// Emits lines in order, holding one line of lookahead so that hole
/// filling can see the lines above and below.
struct LineEmitter {
    policy: FillPolicy,
    output: StorageType,
    fill: f64,
    samples: usize,
    previous: Option<Vec<f64>>,
    current: Option<Vec<f64>>,
    lines_written: usize,
    holes_filled: usize,
}

impl LineEmitter {
    fn new(policy: FillPolicy, output: StorageType, fill: f64, samples: usize) -> Self {
        Self {
            policy,
            output,
            fill,
            samples,
            previous: None,
            current: None,
            lines_written: 0,
            holes_filled: 0,
        }
    }

    fn push(&mut self, line: Vec<f64>, sink: &mut dyn OutputSink) -> Result<()> {
        if self.current.is_some() {
            self.emit(Some(&line), sink)?;
        }
        self.previous = self.current.take();
        self.current = Some(line);
        Ok(())
    }

    fn finish(&mut self, sink: &mut dyn OutputSink) -> Result<()> {
        if self.current.is_some() {
            self.emit(None, sink)?;
        }
        self.previous = None;
        self.current = None;
        Ok(())
    }

    fn emit(&mut self, next: Option<&Vec<f64>>, sink: &mut dyn OutputSink) -> Result<()> {
        let Some(current) = self.current.as_ref() else {
            return Ok(());
        };
        let filled = match (self.policy, self.previous.as_ref(), next) {
            (FillPolicy::NearestHoleFill, Some(above), Some(below)) => {
                let (line, count) = fill_holes(above, current, below, self.fill);
                self.holes_filled += count;
                Some(line)
            }
            _ => None,
        };
        let line = filled.as_ref().unwrap_or(current);
        debug_assert_eq!(line.len(), self.samples);

        let encoded = TypedBuffer::from_f64(self.output, line);
        sink.write_line(self.lines_written, encoded.as_bytes())?;
        self.lines_written += 1;
        Ok(())
    }
}

/// Replace each interior fill pixel of `current` whose three neighbors
/// above and three below are all valid with the median of its valid
/// 8-neighbors. Left and right neighbors may be fill. Neighbors are read
/// from the unfilled lines. For an even count the lower middle value is
/// used.
pub(crate) fn fill_holes(above: &[f64], current: &[f64], below: &[f64], fill: f64) -> (Vec<f64>, usize) {
    let is_fill = |v: f64| v.is_nan() || v == fill;
    let mut out = current.to_vec();
    let mut filled = 0;
    let mut neighbors = Vec::with_capacity(8);

    for s in 1..current.len().saturating_sub(1) {
        if !is_fill(current[s]) {
            continue;
        }
        let span = s - 1..=s + 1;
        if above[span.clone()].iter().chain(&below[span.clone()]).any(|&v| is_fill(v)) {
            continue;
        }

        neighbors.clear();
        neighbors.extend_from_slice(&above[span.clone()]);
        neighbors.extend_from_slice(&below[span]);
        neighbors.extend([current[s - 1], current[s + 1]].into_iter().filter(|&v| !is_fill(v)));
        neighbors.sort_by(f64::total_cmp);

        out[s] = neighbors[(neighbors.len() - 1) / 2];
        filled += 1;
    }
    (out, filled)
}
