//! Tile cache lifecycle tests: spill, re-entrancy, reassembly.

use rand::{Rng, SeedableRng};
use swath_resampler::{
    FillPolicy, MemorySink, OutputGrid, ResampleError, ResamplerConfig, RunContext,
    StorageType, TileStatus, TileStore, TypedBuffer,
};
use test_utils::temp_test_dir;

fn small_store(dir: &std::path::Path, config: &ResamplerConfig, lines: usize, samples: usize) -> TileStore {
    let ctx = RunContext::new(dir);
    let grid = OutputGrid::new(lines, samples, 0.0, 0.0, 1.0, 1.0).unwrap();
    TileStore::new(&ctx, &grid, config, StorageType::Int16, -999.0).unwrap()
}

fn config(tile_size: usize) -> ResamplerConfig {
    ResamplerConfig {
        tile_size,
        ..Default::default()
    }
}

#[test]
fn test_touch_on_disk_tile_is_reentrancy_without_mutation() {
    let dir = temp_test_dir();
    let mut store = small_store(dir.path(), &config(2), 4, 4);

    let handle = store.acquire(0, 1).unwrap();
    store.tile_mut(handle).add_weighted(0, 5.0, 1.0);
    store.acquire(1, 1).unwrap();
    store.drain(StorageType::Int16).unwrap();

    let status = store.status(0, 1).unwrap();
    let used = store.n_used();
    let free = store.n_free();
    let allocated = store.n_in_memory();
    let scratch = store.scratch_len();
    let stats = store.stats().clone();

    let err = store.touch(0, 1).unwrap_err();
    assert!(matches!(err, ResampleError::Reentrancy { tile_row: 0, tile_col: 1, .. }), "got {err}");
    assert!(err.to_string().contains("re-entrancy"), "message: {err}");

    assert_eq!(store.status(0, 1).unwrap(), status);
    assert_eq!(store.n_used(), used);
    assert_eq!(store.n_free(), free);
    assert_eq!(store.n_in_memory(), allocated);
    assert_eq!(store.scratch_len(), scratch);
    assert_eq!(store.stats(), &stats);
}

#[test]
fn test_spilled_bytes_roundtrip_through_reassembly() {
    let dir = temp_test_dir();
    let mut store = small_store(dir.path(), &config(2), 2, 4);

    // Tile (0, 0): four valid pixels; tile (0, 1): one valid pixel.
    let left = store.acquire(0, 0).unwrap();
    for (i, v) in [1.0, -2.0, 300.0, 32767.0].into_iter().enumerate() {
        store.tile_mut(left).add_weighted(i, v * 0.5, 0.5);
    }
    let right = store.acquire(0, 1).unwrap();
    store.tile_mut(right).add_weighted(3, 21.0, 3.0);

    store.drain(StorageType::Int16).unwrap();

    let left_bytes = store.read_spilled(0, 0).unwrap().unwrap();
    let right_bytes = store.read_spilled(0, 1).unwrap().unwrap();
    let expected_left = TypedBuffer::from_f64(StorageType::Int16, &[1.0, -2.0, 300.0, 32767.0]);
    let expected_right = TypedBuffer::from_f64(StorageType::Int16, &[-999.0, -999.0, -999.0, 7.0]);
    assert_eq!(left_bytes, expected_left.as_bytes());
    assert_eq!(right_bytes, expected_right.as_bytes());

    let mut sink = MemorySink::new();
    let summary = store
        .reassemble(StorageType::Int16, FillPolicy::None, &mut sink)
        .unwrap();
    assert_eq!(summary.lines_written, 2);
    assert_eq!(summary.null_tiles, 0);

    // Line 0 is row 0 of each tile, line 1 row 1.
    let row_bytes = 2 * 2;
    assert_eq!(&sink.lines()[0][..row_bytes], &left_bytes[..row_bytes]);
    assert_eq!(&sink.lines()[0][row_bytes..], &right_bytes[..row_bytes]);
    assert_eq!(&sink.lines()[1][..row_bytes], &left_bytes[row_bytes..]);
    assert_eq!(&sink.lines()[1][row_bytes..], &right_bytes[row_bytes..]);
}

#[test]
fn test_null_tiles_become_fill_and_partial_tiles_are_cropped() {
    let dir = temp_test_dir();
    let mut store = small_store(dir.path(), &config(4), 5, 6);
    assert_eq!(store.tile_rows(), 2);
    assert_eq!(store.tile_cols(), 2);

    // Only the bottom-right tile gets data, at grid pixel (4, 5).
    let handle = store.acquire(1, 1).unwrap();
    store.tile_mut(handle).add_weighted(1, 42.0, 1.0);

    let mut sink = MemorySink::new();
    let summary = store
        .reassemble(StorageType::Int16, FillPolicy::None, &mut sink)
        .unwrap();
    assert_eq!(summary.lines_written, 5);
    assert_eq!(summary.null_tiles, 3);
    assert!(sink.lines().iter().all(|line| line.len() == 6 * 2));

    let last = TypedBuffer::from_bytes(StorageType::Int16, &sink.lines()[4])
        .unwrap()
        .to_f64_vec();
    assert_eq!(last, vec![-999.0, -999.0, -999.0, -999.0, -999.0, 42.0]);
}

#[test]
fn test_reassembly_hole_fill() {
    let dir = temp_test_dir();
    let mut store = small_store(dir.path(), &config(4), 3, 3);
    let handle = store.acquire(0, 0).unwrap();
    let values = [[1.0, 2.0, 3.0], [4.0, 0.0, 6.0], [7.0, 8.0, 9.0]];
    for (l, row) in values.iter().enumerate() {
        for (s, &v) in row.iter().enumerate() {
            if (l, s) != (1, 1) {
                store.tile_mut(handle).add_weighted(l * 4 + s, v, 1.0);
            }
        }
    }

    let mut sink = MemorySink::new();
    let summary = store
        .reassemble(StorageType::Int16, FillPolicy::NearestHoleFill, &mut sink)
        .unwrap();
    assert_eq!(summary.holes_filled, 1);

    let middle = TypedBuffer::from_bytes(StorageType::Int16, &sink.lines()[1])
        .unwrap()
        .to_f64_vec();
    // 1 2 3 7 8 9 4 6 -> sorted 1 2 3 4 6 7 8 9, lower middle is 4
    assert_eq!(middle, vec![4.0, 4.0, 6.0]);
}

#[test]
fn test_hole_fill_skips_first_and_last_lines() {
    let dir = temp_test_dir();
    let mut store = small_store(dir.path(), &config(4), 2, 3);
    let handle = store.acquire(0, 0).unwrap();
    for i in [0, 2, 4, 5, 6] {
        store.tile_mut(handle).add_weighted(i, 1.0, 1.0);
    }

    let mut sink = MemorySink::new();
    let summary = store
        .reassemble(StorageType::Int16, FillPolicy::NearestHoleFill, &mut sink)
        .unwrap();
    assert_eq!(summary.holes_filled, 0);
}

#[test]
fn test_converted_values_stay_in_output_range() {
    let dir = temp_test_dir();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    let mut store = small_store(dir.path(), &config(8), 8, 8);
    let handle = store.acquire(0, 0).unwrap();
    for i in 0..64 {
        let value: f64 = rng.gen_range(-1.0e6..1.0e6);
        let weight: f64 = rng.gen_range(0.2..3.0);
        store.tile_mut(handle).add_weighted(i, value * weight, weight);
    }
    store.drain(StorageType::Int16).unwrap();
    let bytes = store.read_spilled(0, 0).unwrap().unwrap();
    let values = TypedBuffer::from_bytes(StorageType::Int16, &bytes).unwrap().to_f64_vec();
    assert!(values.iter().all(|v| (-32768.0..=32767.0).contains(v)));
    assert!(values.iter().any(|&v| v == 32767.0), "large values saturate high");
    assert!(values.iter().any(|&v| v == -32768.0), "large negatives saturate low");

    // Float sources are not remapped, only clamped.
    let ctx = RunContext::new(dir.path());
    let grid = OutputGrid::new(4, 4, 0.0, 0.0, 1.0, 1.0).unwrap();
    let mut store = TileStore::new(&ctx, &grid, &config(4), StorageType::Float64, f64::NAN).unwrap();
    let handle = store.acquire(0, 0).unwrap();
    for i in 0..16 {
        let value: f64 = rng.gen_range(-1.0e9..1.0e9);
        store.tile_mut(handle).add_weighted(i, value, 1.0);
    }
    let mut sink = MemorySink::new();
    store
        .reassemble(StorageType::UInt16, FillPolicy::None, &mut sink)
        .unwrap();
    for line in sink.lines() {
        let values = TypedBuffer::from_bytes(StorageType::UInt16, line).unwrap().to_f64_vec();
        assert!(values.iter().all(|v| (0.0..=65535.0).contains(v)), "got {values:?}");
    }
}

#[test]
fn test_range_mapping_applies_on_spill() {
    let dir = temp_test_dir();
    let mut store = small_store(dir.path(), &config(2), 2, 2);
    let handle = store.acquire(0, 0).unwrap();
    store.tile_mut(handle).add_weighted(0, -32768.0, 1.0);
    store.tile_mut(handle).add_weighted(1, 32767.0, 1.0);
    store.tile_mut(handle).add_weighted(2, 0.0, 1.0);
    store.tile_mut(handle).add_weighted(3, 1000.0, 1.0);

    store.drain(StorageType::UInt8).unwrap();
    let bytes = store.read_spilled(0, 0).unwrap().unwrap();
    // Zero stays zero and the slope is 255 / 65535.
    assert_eq!(bytes, vec![0, 127, 0, 4]);
}

#[test]
fn test_reassemble_rejects_different_output_type() {
    let dir = temp_test_dir();
    let mut store = small_store(dir.path(), &config(2), 2, 2);
    store.acquire(0, 0).unwrap();
    store.drain(StorageType::Int16).unwrap();

    let mut sink = MemorySink::new();
    assert!(store
        .reassemble(StorageType::Float32, FillPolicy::None, &mut sink)
        .is_err());
    assert!(sink.lines().is_empty());
}

#[test]
fn test_lru_eviction_under_sliding_access() {
    let dir = temp_test_dir();
    let config = ResamplerConfig {
        tile_size: 2,
        max_tiles_in_memory: 3,
        tile_growth_batch: 1,
        touch_retention: 0,
        ..Default::default()
    };
    let mut store = small_store(dir.path(), &config, 2, 20);

    // One tile per "scan", sliding right; retention 0 keeps the cache small.
    for col in 0..10 {
        store.acquire(0, col).unwrap();
        store.sweep_decrement();
        store.evict_stale(StorageType::Int16).unwrap();
        assert!(store.n_used() <= 2, "scan {col}: {} resident", store.n_used());
    }
    store.drain(StorageType::Int16).unwrap();
    assert_eq!(store.stats().tiles_created, 10);
    assert_eq!(store.stats().tiles_spilled, 10);
    assert!(store.stats().peak_in_memory <= 2);
    assert!(matches!(store.status(0, 9).unwrap(), TileStatus::OnDisk { .. }));

    let mut sink = MemorySink::new();
    store
        .reassemble(StorageType::Int16, FillPolicy::None, &mut sink)
        .unwrap();
    assert_eq!(sink.lines().len(), 2);
}
