//! Forward (scatter) resampling of one scan into the tile store.
//!
//! Each pair of adjacent source pixel centres spans a quadrilateral in
//! output space. Every output pixel centre inside that quadrilateral
//! learns its sub-pixel position within the source footprint from a
//! point-in-triangle solve, and the kernel is applied around the source
//! pixel at that position. No inverse projection is needed.
//!
//! ```text
//!   p0 (il, is) ─────── p1 (il, is+1)
//!      │ ╲    upper-left  │
//!      │   ╲              │
//!      │ lower-right ╲    │
//!   p3 (il+1, is) ───── p2 (il+1, is+1)
//! ```

use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::kernel::KernelTable;
use crate::scan_buffer::{OutCoord, ScanBuffer};
use crate::tile_store::TileStore;

/// Triangle area (as a 2×2 determinant) below which a triangle is degenerate.
const DEGENERATE_EPS: f64 = 1e-12;

/// Slack on the barycentric bounds so pixels on a shared edge are not lost
/// to rounding.
const EDGE_EPS: f64 = 1e-9;

/// Per-scan counters. Geometry gaps are counted here, never raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    /// Quadrilaterals visited.
    pub quads: usize,
    /// Quadrilaterals skipped because a corner was fill.
    pub fill_gaps: usize,
    /// Quadrilaterals skipped because two corners coincide.
    pub degenerate: usize,
    /// Quadrilaterals whose bounding box misses the output grid.
    pub outside_grid: usize,
    /// Output pixels that received a contribution.
    pub pixel_hits: usize,
    /// Output pixels marked fill by the majority rule.
    pub pixels_marked_fill: usize,
}

impl ScanStats {
    pub fn merge(&mut self, other: &ScanStats) {
        self.quads += other.quads;
        self.fill_gaps += other.fill_gaps;
        self.degenerate += other.degenerate;
        self.outside_grid += other.outside_grid;
        self.pixel_hits += other.pixel_hits;
        self.pixels_marked_fill += other.pixels_marked_fill;
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    line: f64,
    sample: f64,
}

impl Point {
    fn from_coord(c: OutCoord) -> Self {
        Self {
            line: c.line,
            sample: c.sample,
        }
    }

    fn sub(self, other: Point) -> Point {
        Point {
            line: self.line - other.line,
            sample: self.sample - other.sample,
        }
    }
}

/// Solve `e = dl·a + ds·b` and accept when `(dl, ds)` lies in the unit
/// triangle. Degenerate triangles reject every point.
fn triangle_offset(e: Point, a: Point, b: Point) -> Option<(f64, f64)> {
    let det = a.line * b.sample - b.line * a.sample;
    if det.abs() < DEGENERATE_EPS {
        return None;
    }
    let dl = (e.line * b.sample - b.line * e.sample) / det;
    let ds = (a.line * e.sample - e.line * a.sample) / det;
    (dl >= -EDGE_EPS && ds >= -EDGE_EPS && dl + ds <= 1.0 + EDGE_EPS).then_some((dl, ds))
}

/// Sub-pixel position `(d_line, d_sample)` of output point `e` within the
/// quadrilateral `p0 p1 p2 p3`, or `None` when `e` is outside it.
fn quad_offset(e: Point, p: &[Point; 4]) -> Option<(f64, f64)> {
    let [p0, p1, p2, p3] = *p;
    if let Some(d) = triangle_offset(e.sub(p0), p3.sub(p0), p1.sub(p0)) {
        return Some(d);
    }
    // Shares the diagonal with opposite orientation.
    triangle_offset(e.sub(p2), p1.sub(p2), p3.sub(p2)).map(|(dl, ds)| (1.0 - dl, 1.0 - ds))
}

fn has_coincident_corners(p: &[Point; 4]) -> bool {
    (0..4).any(|i| {
        (i + 1..4).any(|j| p[i].line == p[j].line && p[i].sample == p[j].sample)
    })
}

/// Scatters scans into a [`TileStore`] with a fixed kernel.
#[derive(Debug, Clone)]
pub struct ScatterResampler {
    table: KernelTable,
}

impl ScatterResampler {
    pub fn new(table: KernelTable) -> Self {
        Self { table }
    }

    pub fn kernel(&self) -> &KernelTable {
        &self.table
    }

    /// Scatter every source pixel of an extended scan buffer.
    ///
    /// `buffer` must already hold interior coordinates, values and the
    /// extrapolated border.
    pub fn scatter(&self, buffer: &ScanBuffer, store: &mut TileStore) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        let before = buffer.before();
        let last_line = (store.grid_lines() - 1) as f64;
        let last_sample = (store.grid_samples() - 1) as f64;

        for il in before..before + buffer.scan_lines() {
            for is in before..before + buffer.scan_samples() {
                stats.quads += 1;
                let corners = [
                    buffer.coord(il, is),
                    buffer.coord(il, is + 1),
                    buffer.coord(il + 1, is + 1),
                    buffer.coord(il + 1, is),
                ];
                if corners.iter().any(|c| c.is_fill()) {
                    stats.fill_gaps += 1;
                    continue;
                }
                let quad = corners.map(Point::from_coord);
                if has_coincident_corners(&quad) {
                    stats.degenerate += 1;
                    continue;
                }

                let min_line = quad.iter().map(|p| p.line).fold(f64::INFINITY, f64::min);
                let max_line = quad.iter().map(|p| p.line).fold(f64::NEG_INFINITY, f64::max);
                let min_sample = quad.iter().map(|p| p.sample).fold(f64::INFINITY, f64::min);
                let max_sample = quad.iter().map(|p| p.sample).fold(f64::NEG_INFINITY, f64::max);

                let line_lo = min_line.ceil().max(0.0);
                let line_hi = max_line.floor().min(last_line);
                let sample_lo = min_sample.ceil().max(0.0);
                let sample_hi = max_sample.floor().min(last_sample);
                if !(line_lo <= line_hi && sample_lo <= sample_hi) {
                    stats.outside_grid += 1;
                    continue;
                }

                for line_out in line_lo as usize..=line_hi as usize {
                    for sample_out in sample_lo as usize..=sample_hi as usize {
                        let e = Point {
                            line: line_out as f64,
                            sample: sample_out as f64,
                        };
                        let Some((dl, ds)) = quad_offset(e, &quad) else {
                            continue;
                        };
                        self.apply_kernel(buffer, store, il, is, dl, ds, line_out, sample_out, &mut stats)?;
                    }
                }
            }
        }

        trace!(?stats, "Scattered scan");
        Ok(stats)
    }

    /// Convolve the support window around source pixel `(il, is)` and
    /// accumulate the result into output pixel `(line_out, sample_out)`.
    #[allow(clippy::too_many_arguments)]
    fn apply_kernel(
        &self,
        buffer: &ScanBuffer,
        store: &mut TileStore,
        il: usize,
        is: usize,
        dl: f64,
        ds: f64,
        line_out: usize,
        sample_out: usize,
        stats: &mut ScanStats,
    ) -> Result<()> {
        let kernel = self.table.kernel();
        let line_w = self.table.line_weights(KernelTable::bucket(dl));
        let sample_w = self.table.sample_weights(KernelTable::bucket(ds));
        let threshold = kernel.fill_threshold();
        let first_row = il as isize - self.table.before() as isize;
        let first_col = is as isize - self.table.before() as isize;

        let mut fill_taps = 0;
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        let mut best_weight = 0.0;
        let mut best_value = 0.0;
        let mut any_valid = false;

        for (i, &wl) in line_w.iter().enumerate() {
            for (j, &ws) in sample_w.iter().enumerate() {
                let w = wl * ws;
                let value = buffer.tap_value(first_row + i as isize, first_col + j as isize);
                if buffer.is_fill_value(value) {
                    if w != 0.0 {
                        fill_taps += 1;
                        if fill_taps >= threshold {
                            let tile = store.tile_size();
                            let handle = store.acquire(line_out / tile, sample_out / tile)?;
                            let index = (line_out % tile) * tile + sample_out % tile;
                            let fill = store.source_fill();
                            store.tile_mut(handle).mark_fill(index, fill);
                            stats.pixels_marked_fill += 1;
                            return Ok(());
                        }
                    }
                    continue;
                }
                if w == 0.0 {
                    continue;
                }
                any_valid = true;
                weighted_sum += w * value;
                total_weight += w;
                if w > best_weight {
                    best_weight = w;
                    best_value = value;
                }
            }
        }

        if !any_valid {
            return Ok(());
        }

        let tile = store.tile_size();
        let handle = store.acquire(line_out / tile, sample_out / tile)?;
        let index = (line_out % tile) * tile + sample_out % tile;
        let pixel = store.tile_mut(handle);
        if kernel.is_nearest() {
            pixel.offer_nearest(index, best_value, best_weight, total_weight);
        } else {
            pixel.add_weighted(index, weighted_sum, total_weight);
        }
        stats.pixel_hits += 1;
        Ok(())
    }
}
