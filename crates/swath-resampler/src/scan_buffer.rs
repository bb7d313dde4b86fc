//! One scan of input pixels mapped into output space.
//!
//! The buffer is padded by the kernel support on every side so that the
//! scatter step can treat the coordinate array as a full rectangle:
//!
//! ```text
//!   before ┌───────────────────────┐
//!          │   extrapolated border │
//!          │  ┌─────────────────┐  │
//!          │  │ measured scan   │  │
//!          │  │ (coords+values) │  │
//!          │  └─────────────────┘  │
//!   after  │                       │
//!          └───────────────────────┘
//! ```
//!
//! Only coordinates are extrapolated into the border. Values are never
//! invented; kernel taps that land outside the measured interior read
//! the nearest interior value instead.

use crate::error::{ResampleError, Result};
use crate::kernel::KernelTable;

/// Continuous output-grid position of a source pixel centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutCoord {
    pub line: f64,
    pub sample: f64,
    pub fill: bool,
}

impl OutCoord {
    /// A coordinate that could not be mapped.
    pub const FILL: OutCoord = OutCoord {
        line: 0.0,
        sample: 0.0,
        fill: true,
    };

    pub fn new(line: f64, sample: f64) -> Self {
        Self {
            line,
            sample,
            fill: false,
        }
    }

    pub fn is_fill(&self) -> bool {
        self.fill
    }
}

/// A buffer cell: mapped coordinate plus raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanCell {
    pub coord: OutCoord,
    pub value: f64,
}

/// Padded coordinate/value buffer for one scan.
#[derive(Debug, Clone)]
pub struct ScanBuffer {
    scan_lines: usize,
    scan_samples: usize,
    before: usize,
    after: usize,
    rows: usize,
    cols: usize,
    cells: Vec<ScanCell>,
    has_virtual_row: bool,
    fill_value: f64,
}

impl ScanBuffer {
    /// Buffer for scans of `scan_lines × scan_samples` padded for `kernel`.
    pub fn new(scan_lines: usize, scan_samples: usize, kernel: &KernelTable, fill_value: f64) -> Result<Self> {
        Self::with_support(scan_lines, scan_samples, kernel.before(), kernel.after(), fill_value)
    }

    /// Buffer with explicit `before`/`after` padding.
    pub fn with_support(
        scan_lines: usize,
        scan_samples: usize,
        before: usize,
        after: usize,
        fill_value: f64,
    ) -> Result<Self> {
        if scan_lines == 0 || scan_samples == 0 {
            return Err(ResampleError::shape(
                "ScanBuffer::new",
                format!("scan must be non-empty, got {}x{}", scan_lines, scan_samples),
            ));
        }
        if after == 0 {
            return Err(ResampleError::shape(
                "ScanBuffer::new",
                "kernel support must extend at least one pixel after the reference pixel",
            ));
        }
        let rows = scan_lines + before + after;
        let cols = scan_samples + before + after;
        Ok(Self {
            scan_lines,
            scan_samples,
            before,
            after,
            rows,
            cols,
            cells: vec![
                ScanCell {
                    coord: OutCoord::FILL,
                    value: fill_value,
                };
                rows * cols
            ],
            has_virtual_row: false,
            fill_value,
        })
    }

    /// Clear every cell for the next scan.
    pub fn reset(&mut self) {
        let blank = ScanCell {
            coord: OutCoord::FILL,
            value: self.fill_value,
        };
        self.cells.iter_mut().for_each(|cell| *cell = blank);
        self.has_virtual_row = false;
    }

    pub fn scan_lines(&self) -> usize {
        self.scan_lines
    }

    pub fn scan_samples(&self) -> usize {
        self.scan_samples
    }

    pub fn before(&self) -> usize {
        self.before
    }

    pub fn after(&self) -> usize {
        self.after
    }

    /// Padded row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Padded column count.
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    /// Whether `value` is the source fill sentinel (or NaN).
    pub fn is_fill_value(&self, value: f64) -> bool {
        value.is_nan() || value == self.fill_value
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Coordinate at padded `(row, col)`.
    pub fn coord(&self, row: usize, col: usize) -> OutCoord {
        self.cells[self.index(row, col)].coord
    }

    /// Raw value at padded `(row, col)`.
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.cells[self.index(row, col)].value
    }

    /// Value read by a kernel tap at padded `(row, col)`, which may fall
    /// in the border or beyond; it is clamped to the measured interior.
    pub fn tap_value(&self, row: isize, col: isize) -> f64 {
        let first_row = self.before as isize;
        let last_row = (self.before + self.scan_lines - 1) as isize;
        let first_col = self.before as isize;
        let last_col = (self.before + self.scan_samples - 1) as isize;
        let r = row.clamp(first_row, last_row) as usize;
        let c = col.clamp(first_col, last_col) as usize;
        self.value(r, c)
    }

    /// Populate the interior coordinates, row-major `scan_lines × scan_samples`.
    pub fn set_interior_coords(&mut self, coords: &[OutCoord]) -> Result<()> {
        if coords.len() != self.scan_lines * self.scan_samples {
            return Err(ResampleError::shape(
                "ScanBuffer::set_interior_coords",
                format!(
                    "expected {} coordinates, got {}",
                    self.scan_lines * self.scan_samples,
                    coords.len()
                ),
            ));
        }
        for (l, row) in coords.chunks(self.scan_samples).enumerate() {
            let start = self.index(self.before + l, self.before);
            for (s, &coord) in row.iter().enumerate() {
                self.cells[start + s].coord = coord;
            }
        }
        Ok(())
    }

    /// Populate the interior values, row-major `scan_lines × scan_samples`.
    pub fn set_interior_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.scan_lines * self.scan_samples {
            return Err(ResampleError::shape(
                "ScanBuffer::set_interior_values",
                format!(
                    "expected {} values, got {}",
                    self.scan_lines * self.scan_samples,
                    values.len()
                ),
            ));
        }
        for (l, row) in values.chunks(self.scan_samples).enumerate() {
            let start = self.index(self.before + l, self.before);
            for (s, &value) in row.iter().enumerate() {
                self.cells[start + s].value = value;
            }
        }
        Ok(())
    }

    /// Supply the mapped coordinates of the (fictitious) row directly
    /// below the scan. Used for gridded sources, where the next row's
    /// position is known even though it belongs to the next scan.
    pub fn set_virtual_row(&mut self, coords: &[OutCoord]) -> Result<()> {
        if coords.len() != self.scan_samples {
            return Err(ResampleError::shape(
                "ScanBuffer::set_virtual_row",
                format!("expected {} coordinates, got {}", self.scan_samples, coords.len()),
            ));
        }
        let start = self.index(self.before + self.scan_lines, self.before);
        for (s, &coord) in coords.iter().enumerate() {
            self.cells[start + s].coord = coord;
        }
        self.has_virtual_row = true;
        Ok(())
    }

    pub fn has_virtual_row(&self) -> bool {
        self.has_virtual_row
    }

    /// Last padded row holding known (measured or virtual) coordinates.
    fn last_known_row(&self) -> usize {
        let last = self.before + self.scan_lines - 1;
        if self.has_virtual_row {
            last + 1
        } else {
            last
        }
    }

    /// Extrapolate coordinates into every border cell.
    ///
    /// Edge cells extrapolate linearly from the two nearest known cells
    /// in their row or column; corner cells extrapolate bilinearly from
    /// the nearest 2×2 known block. A result is fill when any input is
    /// fill, or when the scan is a single row/column so that no slope is
    /// available. Values are left untouched.
    pub fn extend(&mut self) {
        let first_row = self.before;
        let last_row = self.last_known_row();
        let first_col = self.before;
        let last_col = self.before + self.scan_samples - 1;

        for row in 0..self.rows {
            let row_anchor = anchor(row, first_row, last_row);
            for col in 0..self.cols {
                let col_anchor = anchor(col, first_col, last_col);
                if row_anchor.distance == 0 && col_anchor.distance == 0 {
                    continue;
                }
                let coord = self.extrapolate(row_anchor, col_anchor);
                let index = self.index(row, col);
                self.cells[index].coord = coord;
            }
        }
    }

    fn extrapolate(&self, row: Anchor, col: Anchor) -> OutCoord {
        let kr = row.distance as f64;
        let kc = col.distance as f64;

        let p00 = self.coord(row.nearest, col.nearest);
        if p00.fill {
            return OutCoord::FILL;
        }

        match (row.distance > 0, col.distance > 0) {
            (true, false) => {
                let Some(r1) = row.inner else {
                    return OutCoord::FILL;
                };
                let p10 = self.coord(r1, col.nearest);
                if p10.fill {
                    return OutCoord::FILL;
                }
                OutCoord::new(
                    p00.line + kr * (p00.line - p10.line),
                    p00.sample + kr * (p00.sample - p10.sample),
                )
            }
            (false, true) => {
                let Some(c1) = col.inner else {
                    return OutCoord::FILL;
                };
                let p01 = self.coord(row.nearest, c1);
                if p01.fill {
                    return OutCoord::FILL;
                }
                OutCoord::new(
                    p00.line + kc * (p00.line - p01.line),
                    p00.sample + kc * (p00.sample - p01.sample),
                )
            }
            _ => {
                let (Some(r1), Some(c1)) = (row.inner, col.inner) else {
                    return OutCoord::FILL;
                };
                let p10 = self.coord(r1, col.nearest);
                let p01 = self.coord(row.nearest, c1);
                let p11 = self.coord(r1, c1);
                if p10.fill || p01.fill || p11.fill {
                    return OutCoord::FILL;
                }
                let bilinear = |a: f64, b: f64, c: f64, d: f64| {
                    a + kr * (a - b) + kc * (a - c) + kr * kc * (a - b - c + d)
                };
                OutCoord::new(
                    bilinear(p00.line, p10.line, p01.line, p11.line),
                    bilinear(p00.sample, p10.sample, p01.sample, p11.sample),
                )
            }
        }
    }
}

/// Where a padded index sits relative to the known range along one axis.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    /// Nearest known index.
    nearest: usize,
    /// Next known index towards the interior, if the range has two.
    inner: Option<usize>,
    /// Steps from `nearest` to the queried index.
    distance: usize,
}

fn anchor(index: usize, first: usize, last: usize) -> Anchor {
    if index < first {
        Anchor {
            nearest: first,
            inner: (last > first).then_some(first + 1),
            distance: first - index,
        }
    } else if index > last {
        Anchor {
            nearest: last,
            inner: (last > first).then(|| last - 1),
            distance: index - last,
        }
    } else {
        Anchor {
            nearest: index,
            inner: None,
            distance: 0,
        }
    }
}
