//! Geolocation scans and resolution upsampling.
//!
//! Instruments frequently geolocate at a coarser resolution than the band
//! being resampled: one latitude/longitude pair per `ratio × ratio` data
//! pixels, centred at a fixed offset inside that block. [`GeoUpsampler`]
//! expands such a scan to data resolution with piecewise-linear
//! interpolation (and linear extrapolation past either end).

use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, Result};

/// Latitude/longitude for every pixel of one scan, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoScan {
    pub lines: usize,
    pub samples: usize,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

impl GeoScan {
    /// Build a scan, treating NaN, out-of-range values, and values equal
    /// to `fill` as missing.
    pub fn new(lines: usize, samples: usize, mut lat: Vec<f64>, mut lon: Vec<f64>, fill: Option<f64>) -> Result<Self> {
        let expected = lines * samples;
        if lat.len() != expected || lon.len() != expected {
            return Err(ResampleError::shape(
                "GeoScan::new",
                format!(
                    "expected {} points, got {} lat / {} lon",
                    expected,
                    lat.len(),
                    lon.len()
                ),
            ));
        }
        for (la, lo) in lat.iter_mut().zip(lon.iter_mut()) {
            let missing = fill.is_some_and(|f| *la == f || *lo == f)
                || !la.is_finite()
                || !lo.is_finite()
                || la.abs() > 90.0
                || lo.abs() > 360.0;
            if missing {
                *la = f64::NAN;
                *lo = f64::NAN;
            }
        }
        Ok(Self {
            lines,
            samples,
            lat,
            lon,
        })
    }

    pub fn len(&self) -> usize {
        self.lat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    /// Whether point `index` is missing.
    pub fn is_fill(&self, index: usize) -> bool {
        self.lat[index].is_nan() || self.lon[index].is_nan()
    }

    /// `(lon, lat)` at `index`, or `None` when missing.
    pub fn point(&self, index: usize) -> Option<(f64, f64)> {
        if self.is_fill(index) {
            None
        } else {
            Some((self.lon[index], self.lat[index]))
        }
    }
}

/// Relationship between geolocation and data resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoUpsampler {
    /// Data pixels per geolocation point along each axis.
    pub ratio: usize,
    /// Data-pixel position of the first geolocation point.
    pub offset: f64,
}

impl Default for GeoUpsampler {
    fn default() -> Self {
        Self {
            ratio: 1,
            offset: 0.0,
        }
    }
}

impl GeoUpsampler {
    pub fn new(ratio: usize, offset: f64) -> Result<Self> {
        if ratio == 0 {
            return Err(ResampleError::invalid_config("geolocation ratio must be > 0"));
        }
        if !offset.is_finite() {
            return Err(ResampleError::invalid_config("geolocation offset must be finite"));
        }
        Ok(Self { ratio, offset })
    }

    /// The 250 m / 1 km relationship of MODIS: ratio 4, offset 1.5.
    pub fn modis_250m() -> Self {
        Self {
            ratio: 4,
            offset: 1.5,
        }
    }

    /// The 500 m / 1 km relationship of MODIS: ratio 2, offset 0.5.
    pub fn modis_500m() -> Self {
        Self {
            ratio: 2,
            offset: 0.5,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.ratio == 1 && self.offset == 0.0
    }

    /// Expand a coarse scan to data resolution.
    pub fn upsample(&self, coarse: &GeoScan) -> GeoScan {
        if self.is_identity() {
            return coarse.clone();
        }

        let fine_samples = coarse.samples * self.ratio;
        let fine_lines = coarse.lines * self.ratio;
        let coarse_sample_pos = self.known_positions(coarse.samples);
        let coarse_line_pos = self.known_positions(coarse.lines);
        let fine_sample_pos: Vec<f64> = (0..fine_samples).map(|s| s as f64).collect();
        let fine_line_pos: Vec<f64> = (0..fine_lines).map(|l| l as f64).collect();

        // Along samples, one coarse row at a time
        let mut row_lat = Vec::with_capacity(coarse.lines * fine_samples);
        let mut row_lon = Vec::with_capacity(coarse.lines * fine_samples);
        for l in 0..coarse.lines {
            let range = l * coarse.samples..(l + 1) * coarse.samples;
            row_lat.extend(interpolate_bracketed(
                &coarse_sample_pos,
                &coarse.lat[range.clone()],
                &fine_sample_pos,
            ));
            let lon = unwrap_longitudes(&coarse.lon[range]);
            row_lon.extend(interpolate_bracketed(&coarse_sample_pos, &lon, &fine_sample_pos));
        }

        // Then along lines, one fine column at a time
        let mut lat = vec![f64::NAN; fine_lines * fine_samples];
        let mut lon = vec![f64::NAN; fine_lines * fine_samples];
        let mut column_lat = vec![0.0; coarse.lines];
        let mut column_lon = vec![0.0; coarse.lines];
        for s in 0..fine_samples {
            for l in 0..coarse.lines {
                column_lat[l] = row_lat[l * fine_samples + s];
                column_lon[l] = row_lon[l * fine_samples + s];
            }
            let column_lon = unwrap_longitudes(&column_lon);
            let out_lat = interpolate_bracketed(&coarse_line_pos, &column_lat, &fine_line_pos);
            let out_lon = interpolate_bracketed(&coarse_line_pos, &column_lon, &fine_line_pos);
            for l in 0..fine_lines {
                lat[l * fine_samples + s] = out_lat[l];
                lon[l * fine_samples + s] = wrap_longitude(out_lon[l]);
            }
        }

        GeoScan {
            lines: fine_lines,
            samples: fine_samples,
            lat,
            lon,
        }
    }

    fn known_positions(&self, count: usize) -> Vec<f64> {
        (0..count)
            .map(|k| (k * self.ratio) as f64 + self.offset)
            .collect()
    }
}

/// Piecewise-linear interpolation of `(known_pos, known_val)` at every
/// query position.
///
/// `known_pos` must be strictly increasing. The bracket `(low, high)` of
/// known samples advances (or retreats) until the query falls inside it,
/// and the line through the bracket is recomputed only when the bracket
/// moves. Queries outside the known range extrapolate from the end
/// bracket. A NaN known value yields NaN for every query that uses it.
pub fn interpolate_bracketed(known_pos: &[f64], known_val: &[f64], query: &[f64]) -> Vec<f64> {
    let n = known_pos.len().min(known_val.len());
    match n {
        0 => return vec![f64::NAN; query.len()],
        1 => return vec![known_val[0]; query.len()],
        _ => {}
    }

    let mut low = 0;
    let mut high = 1;
    let mut line = Bracket::new(known_pos, known_val, low, high);
    let mut out = Vec::with_capacity(query.len());

    for &q in query {
        let start_low = low;
        while high < n - 1 && q > known_pos[high] {
            low += 1;
            high += 1;
        }
        while low > 0 && q < known_pos[low] {
            low -= 1;
            high -= 1;
        }
        if low != start_low {
            line = Bracket::new(known_pos, known_val, low, high);
        }
        out.push(line.intercept + line.slope * q);
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct Bracket {
    slope: f64,
    intercept: f64,
}

impl Bracket {
    fn new(pos: &[f64], val: &[f64], low: usize, high: usize) -> Self {
        let slope = (val[high] - val[low]) / (pos[high] - pos[low]);
        Self {
            slope,
            intercept: val[low] - slope * pos[low],
        }
    }
}

/// Remove 360° jumps so consecutive longitudes differ by less than 180°.
fn unwrap_longitudes(lon: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(lon.len());
    let mut previous: Option<f64> = None;
    for &value in lon {
        if value.is_nan() {
            out.push(value);
            continue;
        }
        let mut v = value;
        if let Some(p) = previous {
            while v - p > 180.0 {
                v -= 360.0;
            }
            while v - p < -180.0 {
                v += 360.0;
            }
        }
        previous = Some(v);
        out.push(v);
    }
    out
}

fn wrap_longitude(mut lon: f64) -> f64 {
    if lon.is_nan() {
        return lon;
    }
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}
