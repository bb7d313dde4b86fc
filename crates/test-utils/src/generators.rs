//! Test data generators for synthetic swaths.
//!
//! These generators create predictable, verifiable geolocation and value
//! patterns. Geolocation comes back as `(lat, lon)` vectors in row-major
//! order, matching what the resampler's geolocation sources expect.

/// Geolocation of a north-up regular lattice.
///
/// Pixel `(row, col)` sits at `lat = north - row * step`,
/// `lon = west + col * step`.
///
/// # Example
///
/// ```
/// use test_utils::regular_geolocation;
///
/// let (lat, lon) = regular_geolocation(2, 3, 40.0, -100.0, 0.5);
/// assert_eq!(lat, vec![40.0, 40.0, 40.0, 39.5, 39.5, 39.5]);
/// assert_eq!(lon, vec![-100.0, -99.5, -99.0, -100.0, -99.5, -99.0]);
/// ```
pub fn regular_geolocation(
    lines: usize,
    samples: usize,
    north: f64,
    west: f64,
    step: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut lat = Vec::with_capacity(lines * samples);
    let mut lon = Vec::with_capacity(lines * samples);
    for row in 0..lines {
        for col in 0..samples {
            lat.push(north - row as f64 * step);
            lon.push(west + col as f64 * step);
        }
    }
    (lat, lon)
}

/// Geolocation of a lattice rotated by `angle_deg` around its centre.
///
/// Useful to make scan rows cut diagonally across output rows.
pub fn rotated_geolocation(
    lines: usize,
    samples: usize,
    center_lat: f64,
    center_lon: f64,
    step: f64,
    angle_deg: f64,
) -> (Vec<f64>, Vec<f64>) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let mid_row = (lines as f64 - 1.0) / 2.0;
    let mid_col = (samples as f64 - 1.0) / 2.0;

    let mut lat = Vec::with_capacity(lines * samples);
    let mut lon = Vec::with_capacity(lines * samples);
    for row in 0..lines {
        for col in 0..samples {
            let dx = (col as f64 - mid_col) * step;
            let dy = -(row as f64 - mid_row) * step;
            lon.push(center_lon + dx * cos - dy * sin);
            lat.push(center_lat + dx * sin + dy * cos);
        }
    }
    (lat, lon)
}

/// Geolocation of a whiskbroom-style swath with bow-tie overlap.
///
/// Each scan of `scan_height` rows is centred `scan_height` rows after
/// the previous one, and rows spread further apart towards the swath edges
/// (`spread` extra along-track stretch at the outermost column), so
/// adjacent scans overlap near the edges like a real instrument.
pub fn bowtie_geolocation(
    lines: usize,
    samples: usize,
    scan_height: usize,
    north: f64,
    west: f64,
    step: f64,
    spread: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mid_scan_row = (scan_height as f64 - 1.0) / 2.0;
    let mid_col = (samples as f64 - 1.0) / 2.0;

    let mut lat = Vec::with_capacity(lines * samples);
    let mut lon = Vec::with_capacity(lines * samples);
    for row in 0..lines {
        let scan = row / scan_height;
        let in_scan = (row % scan_height) as f64 - mid_scan_row;
        let scan_center = scan as f64 * scan_height as f64 + mid_scan_row;
        for col in 0..samples {
            let edge = ((col as f64 - mid_col) / mid_col.max(1.0)).abs();
            let stretch = 1.0 + spread * edge * edge;
            lat.push(north - (scan_center + in_scan * stretch) * step);
            lon.push(west + col as f64 * step);
        }
    }
    (lat, lon)
}

/// Values that encode their position: `offset + row * 10 + col`.
///
/// # Example
///
/// ```
/// use test_utils::gradient_values;
///
/// let values = gradient_values(2, 3, 100.0);
/// assert_eq!(values, vec![100.0, 101.0, 102.0, 110.0, 111.0, 112.0]);
/// ```
pub fn gradient_values(lines: usize, samples: usize, offset: f64) -> Vec<f64> {
    let mut data = Vec::with_capacity(lines * samples);
    for row in 0..lines {
        for col in 0..samples {
            data.push(offset + (row * 10 + col) as f64);
        }
    }
    data
}

/// Constant values.
pub fn constant_values(lines: usize, samples: usize, value: f64) -> Vec<f64> {
    vec![value; lines * samples]
}

/// Alternating `low`/`high` values.
pub fn checkerboard_values(lines: usize, samples: usize, low: f64, high: f64) -> Vec<f64> {
    let mut data = Vec::with_capacity(lines * samples);
    for row in 0..lines {
        for col in 0..samples {
            data.push(if (row + col) % 2 == 0 { low } else { high });
        }
    }
    data
}

/// Overwrite the rectangle `rows × cols` (half-open ranges) with `fill`.
pub fn with_fill_block(
    mut values: Vec<f64>,
    samples: usize,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
    fill: f64,
) -> Vec<f64> {
    for row in rows {
        for col in cols.clone() {
            values[row * samples + col] = fill;
        }
    }
    values
}

/// Every point a geolocation pair covers as `(lon, lat)`, for extent fitting.
pub fn lon_lat_points(lat: &[f64], lon: &[f64]) -> Vec<(f64, f64)> {
    lon.iter().copied().zip(lat.iter().copied()).collect()
}
