//! End-to-end tiling runs against in-memory and fault-injecting stores.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use radar_common::{CropWindow, PolarScan, ProductDescriptor, TileError, TileRecord, TileResult};
use renderer::RenderError;
use storage::{MemoryTileStore, StoredTile, TileStore};
use test_utils::{count_files, decoded_scan, products, temp_test_dir, times, uniform_scan, Level3Builder};
use tiling::{
    decode_file, GridSpec, Level3Decoder, ProductCatalog, RetryPolicy, TilePipeline, TileRenderer,
    TilingSettings,
};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

fn settings(scratch: &Path) -> TilingSettings {
    TilingSettings {
        zoom_sizes: vec![5],
        dpi: 4,
        max_concurrency: 4,
        retry: RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 10,
        },
        scratch_dir: Some(scratch.to_path_buf()),
        ..Default::default()
    }
}

fn n0q_scan() -> radar_common::DecodedScan {
    let (code, angle) = products::N0Q;
    decoded_scan(code, angle, uniform_scan(35.0, 1.0, 230))
}

fn expected_tile_names() -> HashSet<String> {
    (1..=10)
        .flat_map(|row| (1..=8).map(move |col| format!("{}_{}", row, col)))
        .collect()
}

/// Fails the first insert of every tile, then delegates.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryTileStore,
    seen: Mutex<HashSet<String>>,
    attempts: AtomicUsize,
}

#[async_trait]
impl TileStore for FlakyStore {
    async fn insert_tile(&self, collection: &str, record: &TileRecord) -> TileResult<Uuid> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let first_attempt = self.seen.lock().unwrap().insert(record.tile_name.clone());
        if first_attempt {
            return Err(TileError::Persistence("connection reset".to_string()));
        }
        self.inner.insert_tile(collection, record).await
    }

    async fn list_tiles(&self, collection: &str, product: &str, zoom: u32) -> TileResult<Vec<StoredTile>> {
        self.inner.list_tiles(collection, product, zoom).await
    }
}

/// Every insert fails with the given error.
struct FailingStore {
    attempts: AtomicUsize,
    make_error: fn() -> TileError,
}

impl FailingStore {
    fn new(make_error: fn() -> TileError) -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            make_error,
        }
    }
}

#[async_trait]
impl TileStore for FailingStore {
    async fn insert_tile(&self, _collection: &str, _record: &TileRecord) -> TileResult<Uuid> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err((self.make_error)())
    }

    async fn list_tiles(&self, _collection: &str, _product: &str, _zoom: u32) -> TileResult<Vec<StoredTile>> {
        Ok(Vec::new())
    }
}

/// Inserts take longer than any job timeout used here.
struct SlowStore {
    delay: Duration,
}

#[async_trait]
impl TileStore for SlowStore {
    async fn insert_tile(&self, _collection: &str, _record: &TileRecord) -> TileResult<Uuid> {
        tokio::time::sleep(self.delay).await;
        Ok(Uuid::new_v4())
    }

    async fn list_tiles(&self, _collection: &str, _product: &str, _zoom: u32) -> TileResult<Vec<StoredTile>> {
        Ok(Vec::new())
    }
}

/// Deletes everything in the scratch dir before each insert.
struct ScratchWipingStore {
    inner: MemoryTileStore,
    scratch: PathBuf,
}

#[async_trait]
impl TileStore for ScratchWipingStore {
    async fn insert_tile(&self, collection: &str, record: &TileRecord) -> TileResult<Uuid> {
        for entry in std::fs::read_dir(&self.scratch)? {
            std::fs::remove_file(entry?.path())?;
        }
        self.inner.insert_tile(collection, record).await
    }

    async fn list_tiles(&self, collection: &str, product: &str, zoom: u32) -> TileResult<Vec<StoredTile>> {
        self.inner.list_tiles(collection, product, zoom).await
    }
}

struct PanickingStore;

#[async_trait]
impl TileStore for PanickingStore {
    async fn insert_tile(&self, _collection: &str, record: &TileRecord) -> TileResult<Uuid> {
        panic!("driver bug on {}", record.tile_name);
    }

    async fn list_tiles(&self, _collection: &str, _product: &str, _zoom: u32) -> TileResult<Vec<StoredTile>> {
        Ok(Vec::new())
    }
}

/// Blocks its thread for `delay` and tracks how many renders overlap.
struct SlowRenderer {
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowRenderer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl TileRenderer for SlowRenderer {
    fn render(
        &self,
        _scan: &PolarScan,
        _product: &ProductDescriptor,
        _window: &CropWindow,
        _size_px: usize,
    ) -> Result<Vec<u8>, RenderError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(PNG_SIGNATURE.to_vec())
    }
}

struct BrokenRenderer;

impl TileRenderer for BrokenRenderer {
    fn render(
        &self,
        _scan: &PolarScan,
        _product: &ProductDescriptor,
        _window: &CropWindow,
        _size_px: usize,
    ) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Encode("encoder exploded".to_string()))
    }
}

#[tokio::test]
async fn test_level3_file_to_stored_tiles() {
    let scratch = temp_test_dir();
    let data_dir = temp_test_dir();
    let path = data_dir.path().join("KFWS_N0Q.nids");
    std::fs::write(&path, Level3Builder::n0q().compressed(true).uniform_levels(150, 230).build()).unwrap();

    let scan = decode_file(&Level3Decoder, &path, None).await.unwrap();
    let store = Arc::new(MemoryTileStore::new());
    let pipeline = TilePipeline::with_store(settings(scratch.path()), store.clone()).unwrap();

    let report = pipeline.run(scan, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.collection, "KFWS");
    assert_eq!(report.product, "N0Q");
    assert!(!report.cancelled);
    assert_eq!(report.zooms.len(), 1);
    let zoom = &report.zooms[0];
    assert_eq!(zoom.cells, 99);
    assert_eq!(zoom.skipped, 19);
    assert_eq!(zoom.inserted, 80);
    assert_eq!(zoom.failed, 0);

    assert_eq!(store.collections().await, vec!["KFWS".to_string()]);
    let tiles = store.tiles("KFWS").await;
    assert_eq!(tiles.len(), 80);
    for stored in &tiles {
        let record = &stored.record;
        assert_eq!(record.product, "N0Q");
        assert_eq!(record.zoom, 5);
        assert_eq!(record.code, 94);
        assert_eq!(record.angle, 0.5);
        assert_eq!(record.timestamp, times::JAN_15_2024_1230_UNIX);
        assert_eq!(&record.tile[..8], &PNG_SIGNATURE);
    }
    let names: HashSet<String> = tiles.iter().map(|t| t.record.tile_name.clone()).collect();
    assert_eq!(names, expected_tile_names());

    let listed = store.list_tiles("KFWS", "N0Q", 5).await.unwrap();
    assert_eq!(listed.len(), 80);
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_zooms_run_in_order() {
    let scratch = temp_test_dir();
    let store = Arc::new(MemoryTileStore::new());
    let mut settings = settings(scratch.path());
    settings.zoom_sizes = vec![2, 5];
    let pipeline = TilePipeline::with_store(settings, store.clone()).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    let zooms: Vec<u32> = report.zooms.iter().map(|z| z.zoom).collect();
    assert_eq!(zooms, vec![2, 5]);
    assert_eq!(report.inserted(), 160);
    assert_eq!(store.list_tiles("KFWS", "N0Q", 2).await.unwrap().len(), 80);
    assert_eq!(store.list_tiles("KFWS", "N0Q", 5).await.unwrap().len(), 80);

    // Larger canvas, larger image
    let small = &store.list_tiles("KFWS", "N0Q", 2).await.unwrap()[0].record;
    assert_eq!(u32::from_be_bytes(small.tile[16..20].try_into().unwrap()), 8);
}

#[tokio::test]
async fn test_equal_steps_store_100_tiles() {
    let scratch = temp_test_dir();
    let store = Arc::new(MemoryTileStore::new());
    let mut settings = settings(scratch.path());
    settings.grid = GridSpec {
        range_km: 230.0,
        x_step_km: 44.5,
        y_step_km: 44.5,
    };
    let pipeline = TilePipeline::with_store(settings, store.clone()).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();
    assert_eq!(report.inserted(), 100);
    assert_eq!(store.count("KFWS").await, 100);
}

#[tokio::test]
async fn test_runs_are_idempotent() {
    let scratch = temp_test_dir();
    let mut outputs = Vec::new();

    for _ in 0..2 {
        let store = Arc::new(MemoryTileStore::new());
        let pipeline = TilePipeline::with_store(settings(scratch.path()), store.clone()).unwrap();
        pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

        let mut records: Vec<_> = store
            .tiles("KFWS")
            .await
            .into_iter()
            .map(|t| (t.record.key_fields(), t.record.tile))
            .collect();
        records.sort();
        outputs.push(records);
    }

    assert_eq!(outputs[0].len(), 80);
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_unsupported_product_stores_nothing() {
    let scratch = temp_test_dir();
    let store = Arc::new(MemoryTileStore::new());
    let pipeline = TilePipeline::with_store(settings(scratch.path()), store.clone()).unwrap();

    let (code, angle) = products::UNKNOWN;
    let scan = decoded_scan(code, angle, uniform_scan(10.0, 0.25, 920));
    let err = pipeline.run(scan, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, TileError::UnsupportedProduct { code: 99, .. }));
    assert!(err.is_fatal());
    assert!(store.collections().await.is_empty());
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_invalid_collection_prefix_is_fatal() {
    let scratch = temp_test_dir();
    let store = Arc::new(MemoryTileStore::new());
    let mut settings = settings(scratch.path());
    settings.collection_prefix = "K-".to_string();
    let pipeline = TilePipeline::with_store(settings, store.clone()).unwrap();

    let err = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TileError::Config(_)));
    assert!(store.collections().await.is_empty());
}

#[tokio::test]
async fn test_custom_catalog() {
    let scratch = temp_test_dir();
    let store = Arc::new(MemoryTileStore::new());
    let catalog = ProductCatalog::builtin();
    let only_n0q = catalog.resolve(94, 0.5).unwrap().clone();
    let pipeline = TilePipeline::new(
        settings(scratch.path()),
        Arc::new(ProductCatalog::from_entries(vec![only_n0q]).unwrap()),
        Arc::new(tiling::PolarTileRenderer),
        store.clone(),
    )
    .unwrap();

    assert!(pipeline.run(n0q_scan(), &CancellationToken::new()).await.is_ok());
    let (code, angle) = products::N0R;
    let legacy = decoded_scan(code, angle, uniform_scan(35.0, 1.0, 230));
    assert!(pipeline.run(legacy, &CancellationToken::new()).await.is_err());
}

#[tokio::test]
async fn test_transient_store_failures_are_retried() {
    let scratch = temp_test_dir();
    let store = Arc::new(FlakyStore::default());
    let pipeline = TilePipeline::with_store(settings(scratch.path()), store.clone()).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    assert_eq!(report.inserted(), 80);
    assert_eq!(report.failed(), 0);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 160);
    assert_eq!(store.inner.count("KFWS").await, 80);
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_exhausted_retries_fail_tiles_and_clean_scratch() {
    let scratch = temp_test_dir();
    let store = Arc::new(FailingStore::new(|| TileError::Persistence("connection refused".to_string())));
    let mut settings = settings(scratch.path());
    settings.retry.max_retries = 2;
    let pipeline = TilePipeline::with_store(settings, store.clone()).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    assert_eq!(report.inserted(), 0);
    assert_eq!(report.failed(), 80);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 80 * 3);
    let failure = &report.zooms[0].failures[0];
    assert!(failure.error.contains("gave up after 2 retries"), "{}", failure.error);
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_non_retryable_store_error_is_not_retried() {
    let scratch = temp_test_dir();
    let store = Arc::new(FailingStore::new(|| TileError::Config("collection rejected".to_string())));
    let pipeline = TilePipeline::with_store(settings(scratch.path()), store.clone()).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    assert_eq!(report.failed(), 80);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 80);
}

#[tokio::test]
async fn test_render_failure_is_per_tile() {
    let scratch = temp_test_dir();
    let store = Arc::new(MemoryTileStore::new());
    let pipeline = TilePipeline::new(
        settings(scratch.path()),
        Arc::new(ProductCatalog::builtin()),
        Arc::new(BrokenRenderer),
        store.clone(),
    )
    .unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    assert_eq!(report.failed(), 80);
    assert!(report.zooms[0]
        .failures
        .iter()
        .all(|f| f.error.starts_with("Rendering failed for tile 5/")));
    assert_eq!(store.count("KFWS").await, 0);
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_slow_tiles_time_out() {
    let scratch = temp_test_dir();
    let store = Arc::new(SlowStore {
        delay: Duration::from_secs(30),
    });
    let mut settings = settings(scratch.path());
    // 3x3 boundaries: four real tiles
    settings.grid.range_km = 50.0;
    settings.grid.y_step_km = 44.5;
    settings.job_timeout_secs = 1;
    let pipeline = TilePipeline::with_store(settings, store).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    let zoom = &report.zooms[0];
    assert_eq!(zoom.cells, 9);
    assert_eq!(zoom.failed, 4);
    assert!(zoom.failures.iter().all(|f| f.error.ends_with("timed out")));
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_timed_out_renders_keep_their_slot() {
    let scratch = temp_test_dir();
    let renderer = Arc::new(SlowRenderer::new(Duration::from_millis(1500)));
    let mut settings = settings(scratch.path());
    settings.grid.range_km = 50.0;
    settings.grid.y_step_km = 44.5;
    settings.max_concurrency = 1;
    settings.job_timeout_secs = 1;
    let pipeline = TilePipeline::new(
        settings,
        Arc::new(ProductCatalog::builtin()),
        renderer.clone(),
        Arc::new(MemoryTileStore::new()),
    )
    .unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    let zoom = &report.zooms[0];
    assert_eq!(zoom.failed, 4);
    assert!(zoom.failures.iter().all(|f| f.error.ends_with("timed out")));
    assert_eq!(renderer.peak.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.running.load(Ordering::SeqCst), 0);
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_scratch_file_removed_by_someone_else() {
    let scratch = temp_test_dir();
    let store = Arc::new(ScratchWipingStore {
        inner: MemoryTileStore::new(),
        scratch: scratch.path().to_path_buf(),
    });
    let mut settings = settings(scratch.path());
    // One artifact on disk at a time
    settings.max_concurrency = 1;
    let pipeline = TilePipeline::with_store(settings, store.clone()).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    assert_eq!(report.inserted(), 80);
    assert_eq!(report.failed(), 0);
    assert_eq!(store.inner.count("KFWS").await, 80);
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_panicking_job_is_reported_per_tile() {
    let scratch = temp_test_dir();
    let mut settings = settings(scratch.path());
    settings.grid.range_km = 50.0;
    settings.grid.y_step_km = 44.5;
    let pipeline = TilePipeline::with_store(settings, Arc::new(PanickingStore)).unwrap();

    let report = pipeline.run(n0q_scan(), &CancellationToken::new()).await.unwrap();

    let zoom = &report.zooms[0];
    assert_eq!(zoom.failed, 4);
    assert_eq!(zoom.failures.len(), zoom.failed);
    let tiles: HashSet<_> = zoom.failures.iter().map(|f| f.tile).collect();
    assert_eq!(tiles.len(), 4);
    assert!(zoom.failures.iter().all(|f| f.error.contains("panicked")));
    assert_eq!(count_files(scratch.path()), 0);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let scratch = temp_test_dir();
    let store = Arc::new(MemoryTileStore::new());
    let pipeline = TilePipeline::with_store(settings(scratch.path()), store.clone()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = pipeline.run(n0q_scan(), &cancel).await.unwrap();

    assert!(report.cancelled);
    assert!(report.zooms.is_empty());
    assert!(store.collections().await.is_empty());
}

#[tokio::test]
async fn test_cancel_during_run() {
    let scratch = temp_test_dir();
    let store = Arc::new(SlowStore {
        delay: Duration::from_secs(30),
    });
    let mut settings = settings(scratch.path());
    settings.zoom_sizes = vec![5, 10];
    settings.max_concurrency = 2;
    let pipeline = TilePipeline::with_store(settings, store).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), pipeline.run(n0q_scan(), &cancel))
        .await
        .expect("cancellation should end the run")
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.zooms.len(), 1);
    let zoom = &report.zooms[0];
    assert_eq!(zoom.inserted, 0);
    assert_eq!(zoom.failed, 0);
    assert_eq!(zoom.cancelled, 80);
    assert_eq!(count_files(scratch.path()), 0);
}
