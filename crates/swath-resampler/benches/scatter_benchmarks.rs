//! Benchmarks for the swath resampler - kernel tables, scan scatter and full runs.
//!
//! Run with: cargo bench --package swath-resampler -- scatter
//! Or: cargo bench --package swath-resampler --bench scatter_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use projection::ProjectionConfig;
use rand::Rng;
use swath_resampler::{
    KernelTable, KernelType, MemoryGeolocation, MemorySink, MemorySource, OutCoord, OutputGrid,
    Pipeline, ResamplerConfig, RunContext, ScanBuffer, ScatterResampler, StorageType, TileStore,
    TypedBuffer,
};
use test_utils::{bowtie_geolocation, fixtures::swath, lon_lat_points};

const FILL: f64 = -28672.0;

const KERNELS: [KernelType; 4] = [
    KernelType::Nearest,
    KernelType::NearestStep,
    KernelType::Bilinear,
    KernelType::Cubic,
];

/// Brightness-temperature-like values with noise and a few fill pixels.
fn generate_band(lines: usize, samples: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..lines * samples)
        .map(|_| {
            if rng.gen_bool(0.01) {
                FILL
            } else {
                2900.0 + rng.gen_range(-150.0..150.0)
            }
        })
        .collect()
}

// =============================================================================
// KERNEL TABLE BENCHMARKS
// =============================================================================

fn bench_kernel_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_table");

    for kernel in KERNELS {
        group.bench_function(BenchmarkId::new("build", kernel.as_str()), |b| {
            b.iter(|| KernelTable::build(black_box(kernel)));
        });
    }

    group.finish();
}

// =============================================================================
// SCATTER BENCHMARKS
// =============================================================================

fn bench_scatter_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scatter_scan");
    let spec = swath::MODIS_LIKE;
    let (lat, lon) = bowtie_geolocation(
        spec.scan_height,
        spec.samples,
        spec.scan_height,
        spec.north,
        spec.west,
        spec.step,
        0.4,
    );
    let values = generate_band(spec.scan_height, spec.samples);

    let grid = OutputGrid::fit(
        &projection::Geographic,
        &lon_lat_points(&lat, &lon),
        spec.step * 0.5,
        spec.step * 0.5,
    )
    .expect("grid fits the scan");
    let coords: Vec<OutCoord> = lat
        .iter()
        .zip(&lon)
        .map(|(&y, &x)| {
            let (line, sample) = grid.to_pixel(x, y);
            OutCoord::new(line, sample)
        })
        .collect();

    let dir = tempfile::tempdir().expect("temp dir");
    let ctx = RunContext::new(dir.path());

    for kernel in KERNELS {
        let table = KernelTable::build(kernel);
        let mut buffer = ScanBuffer::new(spec.scan_height, spec.samples, &table, FILL).expect("scan buffer");
        buffer.set_interior_coords(&coords).expect("coords");
        buffer.extend();
        buffer.set_interior_values(&values).expect("values");

        let config = ResamplerConfig {
            kernel,
            ..Default::default()
        };
        let mut store = TileStore::new(&ctx, &grid, &config, StorageType::Int16, FILL).expect("tile store");
        let resampler = ScatterResampler::new(table);

        group.throughput(Throughput::Elements((spec.scan_height * spec.samples) as u64));
        group.bench_function(BenchmarkId::new("modis_like", kernel.as_str()), |b| {
            b.iter(|| resampler.scatter(black_box(&buffer), &mut store).expect("scatter"));
        });
    }

    group.finish();
}

// =============================================================================
// FULL RUN BENCHMARKS
// =============================================================================

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    group.sample_size(20);

    let spec = swath::MODIS_LIKE;
    let (lat, lon) = bowtie_geolocation(
        spec.lines,
        spec.samples,
        spec.scan_height,
        spec.north,
        spec.west,
        spec.step,
        0.4,
    );
    let values = generate_band(spec.lines, spec.samples);
    let grid = OutputGrid::fit(&projection::Geographic, &lon_lat_points(&lat, &lon), spec.step, spec.step)
        .expect("grid fits the swath");
    let dir = tempfile::tempdir().expect("temp dir");

    // (tile_size, touch_retention, name)
    let scenarios = [(32, 2, "roomy"), (8, 0, "spilling")];

    for (tile_size, touch_retention, name) in scenarios {
        let config = ResamplerConfig {
            tile_size,
            touch_retention,
            ..Default::default()
        };
        let pipeline = Pipeline::new(
            RunContext::new(dir.path()),
            config,
            grid,
            ProjectionConfig::Geographic,
        )
        .expect("pipeline");

        group.throughput(Throughput::Elements(spec.size() as u64));
        group.bench_function(BenchmarkId::new("modis_like", name), |b| {
            b.iter(|| {
                let data = TypedBuffer::from_f64(StorageType::Int16, &values);
                let mut source =
                    MemorySource::new(spec.lines, spec.samples, spec.scan_height, data, FILL).expect("source");
                let mut geolocation =
                    MemoryGeolocation::new(spec.lines, spec.samples, spec.scan_height, lat.clone(), lon.clone())
                        .expect("geolocation");
                let mut sink = MemorySink::new();
                pipeline
                    .run(&mut source, &mut geolocation, &mut sink)
                    .expect("run")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kernel_tables, bench_scatter_scan, bench_full_run);
criterion_main!(benches);
