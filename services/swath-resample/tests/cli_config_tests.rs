//! Run file loading and end-to-end runs driven by a run file.

use std::path::Path;

use swath_resample::{GridSpec, RunConfig};
use swath_resampler::{KernelType, MemorySink, Pipeline, RunContext, SourceKind, StorageType};
use test_utils::{f32_bytes, gradient_values, i16_bytes, regular_geolocation, temp_test_dir, write_raw_file};

/// Write a 4x6 band with one-degree geolocation into `dir`.
fn write_inputs(dir: &Path) {
    let values = gradient_values(4, 6, 0.0);
    let (lat, lon) = regular_geolocation(4, 6, 40.0, -100.0, 1.0);
    write_raw_file(dir, "band.i16", &i16_bytes(&values));
    write_raw_file(dir, "lat.f32", &f32_bytes(&lat));
    write_raw_file(dir, "lon.f32", &f32_bytes(&lon));
}

const EXPLICIT: &str = r#"
input:
  lines: 4
  samples: 6
  scan_height: 2
  data: { path: band.i16, storage_type: int16, fill_value: -999 }
geolocation:
  lat: { path: lat.f32, storage_type: float32 }
  lon: { path: lon.f32, storage_type: float32 }
output:
  path: out/band_geo.i16
  projection: { type: geographic }
  grid:
    lines: 4
    samples: 6
    upper_left_x: -100.5
    upper_left_y: 40.5
    pixel_size_x: 1.0
    pixel_size_y: 1.0
resampler:
  kernel: nearest
  tile_size: 4
"#;

#[test]
fn test_load_explicit_run_file() {
    let dir = temp_test_dir();
    let path = write_raw_file(dir.path(), "run.yaml", EXPLICIT.as_bytes());

    let config = RunConfig::load(&path).unwrap();
    assert_eq!(config.input.kind, SourceKind::Swath);
    assert_eq!(config.input.data.storage_type, StorageType::Int16);
    assert_eq!(config.input.data.path, dir.path().join("band.i16"));
    assert_eq!(config.output.path, dir.path().join("out/band_geo.i16"));
    assert_eq!(config.resampler.tile_size, 4);
    assert_eq!(config.scan_count(), 2);
    assert!(matches!(config.output.grid, GridSpec::Explicit(_)));

    let grid = config.build_grid().unwrap();
    assert_eq!((grid.lines, grid.samples), (4, 6));
    assert_eq!(grid.to_pixel(-100.0, 40.0), (0.0, 0.0));
}

#[test]
fn test_fit_grid_covers_swath() {
    let dir = temp_test_dir();
    write_inputs(dir.path());
    let yaml = EXPLICIT.replace(
        "  grid:\n    lines: 4\n    samples: 6\n    upper_left_x: -100.5\n    upper_left_y: 40.5\n    pixel_size_x: 1.0\n    pixel_size_y: 1.0\n",
        "  grid:\n    fit: { pixel_size_x: 0.5, pixel_size_y: 0.5 }\n",
    );
    let config = RunConfig::from_yaml(&yaml, dir.path()).unwrap();
    assert!(matches!(config.output.grid, GridSpec::Fit { .. }));

    let grid = config.build_grid().unwrap();
    // Geolocation spans 5 degrees of longitude and 3 of latitude.
    assert_eq!(grid.samples, 10);
    assert_eq!(grid.lines, 6);
    assert_eq!(grid.upper_left_x, -100.0);
    assert_eq!(grid.upper_left_y, 40.0);
}

#[test]
fn test_run_file_drives_pipeline() {
    let dir = temp_test_dir();
    write_inputs(dir.path());
    let config = RunConfig::from_yaml(EXPLICIT, dir.path()).unwrap();
    assert_eq!(config.resampler.kernel, KernelType::Nearest);

    let pipeline = Pipeline::new(
        RunContext::new(dir.path()),
        config.resampler.clone(),
        config.build_grid().unwrap(),
        config.output.projection.clone(),
    )
    .unwrap();
    let mut source = config.open_source().unwrap();
    let mut geolocation = config.open_geolocation().unwrap();
    let mut sink = MemorySink::new();
    let summary = pipeline.run(&mut source, &mut geolocation, &mut sink).unwrap();

    assert_eq!(summary.scans, 2);
    let out = sink.values().unwrap();
    // Source pixels sit on output pixel centres, so the first scan's
    // lines are reproduced.
    assert_eq!(&out[..12], &gradient_values(2, 6, 0.0)[..]);
}

#[test]
fn test_relative_paths_resolve_against_run_file() {
    let config = RunConfig::from_yaml(EXPLICIT, Path::new("/data/modis")).unwrap();
    assert_eq!(config.geolocation.lat.path, Path::new("/data/modis/lat.f32"));

    let absolute = EXPLICIT.replace("path: band.i16", "path: /abs/band.i16");
    let config = RunConfig::from_yaml(&absolute, Path::new("/data/modis")).unwrap();
    assert_eq!(config.input.data.path, Path::new("/abs/band.i16"));
}

#[test]
fn test_geolocation_ratio_layout() {
    let yaml = EXPLICIT
        .replace("  lines: 4\n  samples: 6\n  scan_height: 2\n", "  lines: 8\n  samples: 12\n  scan_height: 4\n")
        .replace(
            "  lon: { path: lon.f32, storage_type: float32 }\n",
            "  lon: { path: lon.f32, storage_type: float32 }\n  ratio: 2\n  offset: 0.5\n",
        );
    let config = RunConfig::from_yaml(&yaml, Path::new("/tmp")).unwrap();
    let layout = config.geo_layout();
    assert_eq!((layout.lines, layout.samples, layout.scan_height), (4, 6, 2));
    assert_eq!(layout.upsampler.ratio, 2);
    assert_eq!(layout.upsampler.offset, 0.5);
}

#[test]
fn test_invalid_run_files() {
    let base = Path::new("/tmp");

    let missing_fill = EXPLICIT.replace(", fill_value: -999", "");
    let err = RunConfig::from_yaml(&missing_fill, base).unwrap_err();
    assert!(err.to_string().contains("fill_value"), "got {err}");

    let bad_ratio = EXPLICIT.replace(
        "  lon: { path: lon.f32, storage_type: float32 }\n",
        "  lon: { path: lon.f32, storage_type: float32 }\n  ratio: 4\n",
    );
    let err = RunConfig::from_yaml(&bad_ratio, base).unwrap_err();
    assert!(err.to_string().contains("ratio"), "got {err}");

    let bad_kernel = EXPLICIT.replace("kernel: nearest", "kernel: lanczos");
    assert!(RunConfig::from_yaml(&bad_kernel, base).is_err());

    let bad_tiles = EXPLICIT.replace("tile_size: 4", "tile_size: 0");
    let err = RunConfig::from_yaml(&bad_tiles, base).unwrap_err();
    assert!(err.to_string().contains("tile_size"), "got {err}");
}
