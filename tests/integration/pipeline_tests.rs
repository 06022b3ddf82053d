//! End-to-end tests for the upload pipeline against a mock store.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use image_uplink::{
    BatchItem, OptimizationOptions, OutputFormat, PipelineError, SourceImage, Stage, StoreError,
    UploadPipeline,
};

use super::test_utils::{
    create_jpeg, create_png, decoded_size, is_valid_jpeg, is_valid_png, is_valid_webp,
    MockBlobStore,
};

fn png_source(name: &str, width: u32, height: u32) -> SourceImage {
    SourceImage::new(name, create_png(width, height)).with_content_type("image/png")
}

// =============================================================================
// Single Upload
// =============================================================================

#[tokio::test]
async fn test_large_png_is_fitted_and_uploaded_as_webp() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());

    let stored = pipeline
        .upload(
            png_source("photo.png", 4000, 2000),
            "about/photo.webp",
            &OptimizationOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(stored.path, "about/photo.webp");
    assert_eq!(
        stored.public_url,
        "https://cdn.test/storage/v1/object/public/media/about/photo.webp"
    );
    assert_eq!(store.put_count(), 1);

    let object = store.get("about/photo.webp").await.unwrap();
    assert_eq!(object.content_type, "image/webp");
    assert!(is_valid_webp(&object.data));
    assert_eq!(decoded_size(&object.data), (1920, 960));
}

#[tokio::test]
async fn test_portrait_jpeg_bounded_by_height() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());
    let source = SourceImage::new("portrait.jpg", create_jpeg(300, 400));
    let options = OptimizationOptions::with_bounds(192, 108).format(OutputFormat::Jpeg);

    pipeline.upload(source, "portrait.jpeg", &options).await.unwrap();

    let object = store.get("portrait.jpeg").await.unwrap();
    assert_eq!(object.content_type, "image/jpeg");
    assert!(is_valid_jpeg(&object.data));
    assert_eq!(decoded_size(&object.data), (81, 108));
}

#[tokio::test]
async fn test_empty_file_fails_at_probe_without_upload() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());
    let source = SourceImage::new("bad.jpg", Vec::new()).with_content_type("image/jpeg");

    let err = pipeline
        .upload(source, "bad.webp", &OptimizationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decode { .. }));
    assert_eq!(err.stage(), Stage::Probe);
    assert_eq!(store.put_count(), 0);
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn test_garbage_bytes_fail_decode() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());
    let source = SourceImage::new("notes.txt", b"definitely not pixels".to_vec());

    let err = pipeline
        .upload(source, "notes.webp", &OptimizationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decode { .. }));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_image_at_bounds_keeps_dimensions() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());
    let options = OptimizationOptions::with_bounds(64, 48);

    pipeline
        .upload(png_source("exact.png", 64, 48), "exact.webp", &options)
        .await
        .unwrap();

    let object = store.get("exact.webp").await.unwrap();
    assert_eq!(decoded_size(&object.data), (64, 48));
}

#[tokio::test]
async fn test_single_pixel_is_not_upscaled() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());

    pipeline
        .upload(
            png_source("dot.png", 1, 1),
            "dot.webp",
            &OptimizationOptions::default(),
        )
        .await
        .unwrap();

    let object = store.get("dot.webp").await.unwrap();
    assert_eq!(decoded_size(&object.data), (1, 1));
}

#[tokio::test]
async fn test_upscale_when_allowed() {
    let pipeline = UploadPipeline::new(MockBlobStore::new());
    let options = OptimizationOptions::with_bounds(40, 40)
        .format(OutputFormat::Png)
        .allow_upscale(true);

    let optimized = pipeline
        .optimize(&png_source("small.png", 10, 5), &options)
        .await
        .unwrap();

    assert_eq!(
        (optimized.dimensions.width, optimized.dimensions.height),
        (40, 20)
    );
    assert_eq!(decoded_size(&optimized.data), (40, 20));
}

#[tokio::test]
async fn test_same_input_twice_gives_same_result() {
    let pipeline = UploadPipeline::new(MockBlobStore::new());
    let source = png_source("photo.png", 300, 150);
    let options = OptimizationOptions::with_bounds(100, 100);

    let first = pipeline.optimize(&source, &options).await.unwrap();
    let second = pipeline.optimize(&source, &options).await.unwrap();

    assert_eq!(first.dimensions, second.dimensions);
    assert_eq!(first.content_type, second.content_type);
    assert_eq!(first.filename, second.filename);
    assert_eq!(decoded_size(&first.data), decoded_size(&second.data));
}

#[tokio::test]
async fn test_reoptimizing_output_keeps_dimensions() {
    let pipeline = UploadPipeline::new(MockBlobStore::new());
    let options = OptimizationOptions::with_bounds(100, 100);

    let first = pipeline
        .optimize(&png_source("photo.png", 300, 150), &options)
        .await
        .unwrap();
    let second_source = SourceImage::new(first.filename.clone(), first.data.clone());
    let second = pipeline.optimize(&second_source, &options).await.unwrap();

    assert_eq!(first.dimensions, second.dimensions);
    assert_eq!(first.content_type, second.content_type);
    assert_eq!(second.filename, "photo.webp");
}

#[tokio::test]
async fn test_png_output_is_pixel_exact() {
    let pipeline = UploadPipeline::new(MockBlobStore::new());
    let original = create_png(24, 16);
    let options = OptimizationOptions::default().format(OutputFormat::Png);

    let optimized = pipeline
        .optimize(&SourceImage::new("sprite.png", original.clone()), &options)
        .await
        .unwrap();

    assert!(is_valid_png(&optimized.data));
    let before = image::load_from_memory(&original).unwrap().to_rgba8();
    let after = image::load_from_memory(&optimized.data).unwrap().to_rgba8();
    assert_eq!(before.as_raw(), after.as_raw());
}

#[tokio::test]
async fn test_prefixed_store_reports_resolved_path() {
    let store = MockBlobStore::new().with_prefix("tenant-a");
    let pipeline = UploadPipeline::new(store.clone());

    let stored = pipeline
        .upload(
            png_source("logo.png", 8, 8),
            "logo.webp",
            &OptimizationOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(stored.path, "tenant-a/logo.webp");
    assert!(stored.public_url.ends_with("/tenant-a/logo.webp"));
    assert!(store.get("tenant-a/logo.webp").await.is_some());
}

#[tokio::test]
async fn test_existing_object_is_not_overwritten() {
    let store = MockBlobStore::new();
    store.insert("taken.webp", b"original").await;
    let pipeline = UploadPipeline::new(store.clone());

    let err = pipeline
        .upload(
            png_source("taken.png", 8, 8),
            "taken.webp",
            &OptimizationOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(StoreError::Conflict(_))));
    assert_eq!(err.stage(), Stage::Upload);
    assert_eq!(&store.get("taken.webp").await.unwrap().data[..], b"original");
}

#[tokio::test]
async fn test_store_failure_surfaces_as_upload_error() {
    let store = MockBlobStore::new().failing_on("flaky.webp");
    let pipeline = UploadPipeline::new(store.clone());

    let err = pipeline
        .upload(
            png_source("flaky.png", 8, 8),
            "flaky.webp",
            &OptimizationOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(StoreError::Connection(_))));
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn test_path_traversal_rejected_before_processing() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());

    let err = pipeline
        .upload(
            png_source("a.png", 8, 8),
            "../outside.webp",
            &OptimizationOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(StoreError::InvalidPath(_))));
    assert_eq!(err.stage(), Stage::Received);
    assert_eq!(store.put_count(), 0);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_during_upload_leaves_store_empty() {
    let store = MockBlobStore::new().with_delay(Duration::from_secs(5));
    let pipeline = UploadPipeline::new(store.clone());
    let cancel = CancellationToken::new();

    // Cancel as soon as the write has been issued
    let watcher = {
        let store = store.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while store.put_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            cancel.cancel();
        })
    };

    let err = pipeline
        .upload_with_cancel(
            png_source("slow.png", 16, 16),
            "slow.webp",
            &OptimizationOptions::default(),
            &cancel,
        )
        .await
        .unwrap_err();
    watcher.await.unwrap();

    match err {
        PipelineError::Cancelled { stage } => assert_eq!(stage, Stage::Upload),
        other => panic!("Expected Cancelled, got {:?}", other),
    }
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn test_cancelled_token_skips_all_work() {
    let store = MockBlobStore::new();
    let pipeline = UploadPipeline::new(store.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let items = vec![
        BatchItem::new(png_source("a.png", 8, 8), "a.webp"),
        BatchItem::new(png_source("b.png", 8, 8), "b.webp"),
    ];
    let results = pipeline
        .upload_batch_with_cancel(items, &OptimizationOptions::default(), 2, &cancel)
        .await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(PipelineError::Cancelled { .. }))));
    assert_eq!(store.put_count(), 0);
}

// =============================================================================
// Batch Uploads
// =============================================================================

#[tokio::test]
async fn test_batch_preserves_order_and_isolates_failures() {
    let store = MockBlobStore::new().failing_on("c.webp");
    let pipeline = UploadPipeline::new(store.clone());

    let items = vec![
        BatchItem::new(png_source("a.png", 50, 20), "a.webp"),
        BatchItem::new(SourceImage::new("b.jpg", Vec::new()), "b.webp"),
        BatchItem::new(png_source("c.png", 8, 8), "c.webp"),
        BatchItem::new(SourceImage::new("d.jpg", create_jpeg(30, 30)), "d.webp"),
    ];

    let results = pipeline
        .upload_batch(items, &OptimizationOptions::with_bounds(25, 25), 4)
        .await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().path, "a.webp");
    assert!(matches!(results[1], Err(PipelineError::Decode { .. })));
    assert!(matches!(
        results[2],
        Err(PipelineError::Upload(StoreError::Connection(_)))
    ));
    assert_eq!(results[3].as_ref().unwrap().path, "d.webp");

    assert_eq!(
        decoded_size(&store.get("a.webp").await.unwrap().data),
        (25, 10)
    );
    assert_eq!(
        decoded_size(&store.get("d.webp").await.unwrap().data),
        (25, 25)
    );
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_batch_respects_concurrency_limit() {
    let store = MockBlobStore::new().with_delay(Duration::from_millis(50));
    let pipeline = UploadPipeline::new(store.clone());

    let items: Vec<_> = (0..6)
        .map(|i| BatchItem::new(png_source("tile.png", 8, 8), format!("tile-{}.webp", i)))
        .collect();

    let results = pipeline
        .upload_batch(items, &OptimizationOptions::default(), 2)
        .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(store.put_count(), 6);
    assert_eq!(store.max_in_flight(), 2);
}

#[tokio::test]
async fn test_pipelines_share_a_store() {
    let store = Arc::new(MockBlobStore::new());
    let first = UploadPipeline::with_shared_store(Arc::clone(&store));
    let second = UploadPipeline::with_shared_store(Arc::clone(&store));
    let options = OptimizationOptions::default();

    let (a, b) = tokio::join!(
        first.upload(png_source("a.png", 8, 8), "a.webp", &options),
        second.upload(png_source("b.png", 8, 8), "b.webp", &options),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(store.put_count(), 2);
}
