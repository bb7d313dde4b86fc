//! Input seams: swath values and their geolocation, one scan at a time.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, Result};
use crate::geolocation::{GeoScan, GeoUpsampler};
use crate::types::{StorageType, TypedBuffer};

/// Whether the input is a swath of scans or a regular grid split into
/// scans. Grid inputs know where the row after each scan lies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Swath,
    Grid,
}

/// Raw values of one scan, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBlock {
    pub lines: usize,
    pub samples: usize,
    pub data: TypedBuffer,
}

impl ScanBlock {
    pub fn values(&self) -> Vec<f64> {
        self.data.to_f64_vec()
    }
}

/// Lines of scan `scan` for an image of `lines` split into scans of `scan_height`.
pub fn scan_extent(lines: usize, scan_height: usize, scan: usize) -> (usize, usize) {
    let first = scan * scan_height;
    (first, scan_height.min(lines.saturating_sub(first)))
}

/// Source of band values.
pub trait SourceReader {
    fn storage_type(&self) -> StorageType;

    fn fill_value(&self) -> f64;

    /// `(lines, samples)` of the whole band.
    fn dimensions(&self) -> (usize, usize);

    /// Lines per scan. The last scan may be shorter.
    fn scan_height(&self) -> usize;

    fn scan_count(&self) -> usize {
        self.dimensions().0.div_ceil(self.scan_height())
    }

    fn read_scan(&mut self, scan: usize) -> Result<ScanBlock>;
}

/// Source of per-pixel geolocation at data resolution.
pub trait GeolocationSource {
    fn scan_geolocation(&mut self, scan: usize) -> Result<GeoScan>;

    /// Geolocation of the row just below scan `scan`, for grid inputs.
    fn virtual_row(&mut self, _scan: usize) -> Result<Option<GeoScan>> {
        Ok(None)
    }
}

fn check_scan(op: &'static str, scan: usize, count: usize) -> Result<()> {
    if scan >= count {
        return Err(ResampleError::source(format!(
            "{op}: scan {scan} out of range, source has {count} scans"
        )));
    }
    Ok(())
}

// =============================================================================
// In-memory sources
// =============================================================================

/// Band values held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    lines: usize,
    samples: usize,
    scan_height: usize,
    fill_value: f64,
    data: TypedBuffer,
}

impl MemorySource {
    pub fn new(lines: usize, samples: usize, scan_height: usize, data: TypedBuffer, fill_value: f64) -> Result<Self> {
        if data.len() != lines * samples {
            return Err(ResampleError::shape(
                "MemorySource::new",
                format!("expected {} values, got {}", lines * samples, data.len()),
            ));
        }
        if scan_height == 0 || lines == 0 || samples == 0 {
            return Err(ResampleError::invalid_config(
                "source dimensions and scan height must be > 0",
            ));
        }
        Ok(Self {
            lines,
            samples,
            scan_height,
            fill_value,
            data,
        })
    }
}

impl SourceReader for MemorySource {
    fn storage_type(&self) -> StorageType {
        self.data.storage_type()
    }

    fn fill_value(&self) -> f64 {
        self.fill_value
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.lines, self.samples)
    }

    fn scan_height(&self) -> usize {
        self.scan_height
    }

    fn read_scan(&mut self, scan: usize) -> Result<ScanBlock> {
        check_scan("MemorySource::read_scan", scan, self.scan_count())?;
        let (first, lines) = scan_extent(self.lines, self.scan_height, scan);
        let values: Vec<f64> = (first * self.samples..(first + lines) * self.samples)
            .map(|i| self.data.get(i).unwrap_or(self.fill_value))
            .collect();
        Ok(ScanBlock {
            lines,
            samples: self.samples,
            data: TypedBuffer::from_f64(self.data.storage_type(), &values),
        })
    }
}

/// Layout of a geolocation array, possibly coarser than the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoLayout {
    /// Geolocation rows.
    pub lines: usize,
    /// Geolocation columns.
    pub samples: usize,
    /// Geolocation rows per scan.
    pub scan_height: usize,
    pub fill: Option<f64>,
    pub upsampler: GeoUpsampler,
    pub kind: SourceKind,
}

impl GeoLayout {
    fn scan_count(&self) -> usize {
        self.lines.div_ceil(self.scan_height)
    }

    fn validate(&self) -> Result<()> {
        if self.lines == 0 || self.samples == 0 || self.scan_height == 0 {
            return Err(ResampleError::invalid_config(
                "geolocation dimensions and scan height must be > 0",
            ));
        }
        GeoUpsampler::new(self.upsampler.ratio, self.upsampler.offset)?;
        Ok(())
    }

    /// Data-resolution geolocation of `scan`, reading coarse rows through
    /// `read_rows(first, count)`. Grid inputs also read the coarse row
    /// after the scan so interpolation near the bottom edge does not have
    /// to extrapolate.
    fn assemble<F>(&self, scan: usize, mut read_rows: F) -> Result<(GeoScan, Option<GeoScan>)>
    where
        F: FnMut(usize, usize) -> Result<(Vec<f64>, Vec<f64>)>,
    {
        check_scan("scan_geolocation", scan, self.scan_count())?;
        let (first, lines) = scan_extent(self.lines, self.scan_height, scan);
        let extra = usize::from(self.kind == SourceKind::Grid && first + lines < self.lines);

        let (lat, lon) = read_rows(first, lines + extra)?;
        let coarse = GeoScan::new(lines + extra, self.samples, lat, lon, self.fill)?;
        let fine = self.upsampler.upsample(&coarse);

        let ratio = self.upsampler.ratio;
        let scan_rows = lines * ratio;
        let width = fine.samples;
        let take = |row_from: usize, rows: usize| GeoScan {
            lines: rows,
            samples: width,
            lat: fine.lat[row_from * width..(row_from + rows) * width].to_vec(),
            lon: fine.lon[row_from * width..(row_from + rows) * width].to_vec(),
        };

        let scan_geo = take(0, scan_rows);
        let virtual_row = (extra == 1).then(|| take(scan_rows, 1));
        Ok((scan_geo, virtual_row))
    }
}

/// Geolocation held in memory.
#[derive(Debug, Clone)]
pub struct MemoryGeolocation {
    layout: GeoLayout,
    lat: Vec<f64>,
    lon: Vec<f64>,
}

impl MemoryGeolocation {
    /// Geolocation at data resolution, one point per pixel.
    pub fn new(lines: usize, samples: usize, scan_height: usize, lat: Vec<f64>, lon: Vec<f64>) -> Result<Self> {
        Self::with_layout(
            GeoLayout {
                lines,
                samples,
                scan_height,
                fill: None,
                upsampler: GeoUpsampler::default(),
                kind: SourceKind::Swath,
            },
            lat,
            lon,
        )
    }

    pub fn with_layout(layout: GeoLayout, lat: Vec<f64>, lon: Vec<f64>) -> Result<Self> {
        layout.validate()?;
        let expected = layout.lines * layout.samples;
        if lat.len() != expected || lon.len() != expected {
            return Err(ResampleError::shape(
                "MemoryGeolocation::new",
                format!("expected {expected} points, got {} lat / {} lon", lat.len(), lon.len()),
            ));
        }
        Ok(Self { layout, lat, lon })
    }

    /// Treat the input as a regular grid.
    pub fn gridded(mut self) -> Self {
        self.layout.kind = SourceKind::Grid;
        self
    }

    pub fn layout(&self) -> &GeoLayout {
        &self.layout
    }

    fn read_rows(&self, first: usize, count: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        let range = first * self.layout.samples..(first + count) * self.layout.samples;
        Ok((self.lat[range.clone()].to_vec(), self.lon[range].to_vec()))
    }
}

impl GeolocationSource for MemoryGeolocation {
    fn scan_geolocation(&mut self, scan: usize) -> Result<GeoScan> {
        let (geo, _) = self.layout.assemble(scan, |first, count| self.read_rows(first, count))?;
        Ok(geo)
    }

    fn virtual_row(&mut self, scan: usize) -> Result<Option<GeoScan>> {
        let (_, row) = self.layout.assemble(scan, |first, count| self.read_rows(first, count))?;
        Ok(row)
    }
}

// =============================================================================
// Raw binary file sources
// =============================================================================

/// A headerless row-major array of one storage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArray {
    pub path: PathBuf,
    pub storage_type: StorageType,
    #[serde(default)]
    pub fill_value: Option<f64>,
}

#[derive(Debug)]
struct RawReader {
    path: PathBuf,
    file: File,
    storage_type: StorageType,
    row_bytes: usize,
}

impl RawReader {
    fn open(path: &Path, storage_type: StorageType, samples: usize, lines: usize) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ResampleError::source(format!("open {}: {e}", path.display())))?;
        let row_bytes = samples * storage_type.size_bytes();
        let len = file
            .metadata()
            .map_err(|e| ResampleError::source(format!("stat {}: {e}", path.display())))?
            .len();
        let expected = (row_bytes * lines) as u64;
        if len < expected {
            return Err(ResampleError::source(format!(
                "{} holds {len} bytes, expected at least {expected}",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            storage_type,
            row_bytes,
        })
    }

    fn read_rows(&mut self, first: usize, count: usize) -> Result<TypedBuffer> {
        let mut bytes = vec![0u8; count * self.row_bytes];
        self.file
            .seek(SeekFrom::Start((first * self.row_bytes) as u64))
            .and_then(|_| self.file.read_exact(&mut bytes))
            .map_err(|e| {
                ResampleError::source(format!(
                    "read rows {first}..{} of {}: {e}",
                    first + count,
                    self.path.display()
                ))
            })?;
        TypedBuffer::from_bytes(self.storage_type, &bytes)
    }
}

/// Band values read scan by scan from a raw file.
#[derive(Debug)]
pub struct RawFileSource {
    reader: RawReader,
    lines: usize,
    samples: usize,
    scan_height: usize,
    fill_value: f64,
}

impl RawFileSource {
    pub fn open(array: &RawArray, lines: usize, samples: usize, scan_height: usize) -> Result<Self> {
        if scan_height == 0 || lines == 0 || samples == 0 {
            return Err(ResampleError::invalid_config(
                "source dimensions and scan height must be > 0",
            ));
        }
        let fill_value = array.fill_value.ok_or_else(|| {
            ResampleError::invalid_config(format!("{} has no fill value", array.path.display()))
        })?;
        Ok(Self {
            reader: RawReader::open(&array.path, array.storage_type, samples, lines)?,
            lines,
            samples,
            scan_height,
            fill_value,
        })
    }
}

impl SourceReader for RawFileSource {
    fn storage_type(&self) -> StorageType {
        self.reader.storage_type
    }

    fn fill_value(&self) -> f64 {
        self.fill_value
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.lines, self.samples)
    }

    fn scan_height(&self) -> usize {
        self.scan_height
    }

    fn read_scan(&mut self, scan: usize) -> Result<ScanBlock> {
        check_scan("RawFileSource::read_scan", scan, self.scan_count())?;
        let (first, lines) = scan_extent(self.lines, self.scan_height, scan);
        Ok(ScanBlock {
            lines,
            samples: self.samples,
            data: self.reader.read_rows(first, lines)?,
        })
    }
}

/// Latitude and longitude read scan by scan from two raw files.
#[derive(Debug)]
pub struct RawGeolocation {
    layout: GeoLayout,
    lat: RawReader,
    lon: RawReader,
}

impl RawGeolocation {
    pub fn open(lat: &RawArray, lon: &RawArray, layout: GeoLayout) -> Result<Self> {
        layout.validate()?;
        let layout = GeoLayout {
            fill: layout.fill.or(lat.fill_value),
            ..layout
        };
        Ok(Self {
            lat: RawReader::open(&lat.path, lat.storage_type, layout.samples, layout.lines)?,
            lon: RawReader::open(&lon.path, lon.storage_type, layout.samples, layout.lines)?,
            layout,
        })
    }

    fn read_rows(lat: &mut RawReader, lon: &mut RawReader, first: usize, count: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        Ok((
            lat.read_rows(first, count)?.to_f64_vec(),
            lon.read_rows(first, count)?.to_f64_vec(),
        ))
    }
}

impl GeolocationSource for RawGeolocation {
    fn scan_geolocation(&mut self, scan: usize) -> Result<GeoScan> {
        let Self { layout, lat, lon } = self;
        let (geo, _) = layout.assemble(scan, |first, count| Self::read_rows(&mut *lat, &mut *lon, first, count))?;
        Ok(geo)
    }

    fn virtual_row(&mut self, scan: usize) -> Result<Option<GeoScan>> {
        let Self { layout, lat, lon } = self;
        let (_, row) = layout.assemble(scan, |first, count| Self::read_rows(&mut *lat, &mut *lon, first, count))?;
        Ok(row)
    }
}
