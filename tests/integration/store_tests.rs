//! Tests for the filesystem store driven through the pipeline.

use url::Url;

use image_uplink::store::keys::{join_key, timestamped_key};
use image_uplink::{
    optimized_filename, BatchItem, BlobStore, FsBlobStore, OptimizationOptions, OutputFormat,
    PipelineError, SourceImage, StoreError, UploadPipeline,
};

use super::test_utils::{create_png, decoded_size, is_valid_webp};

#[tokio::test]
async fn test_fs_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path().join("media"))
        .await
        .unwrap()
        .with_public_base(Url::parse("https://static.example.com/media/").unwrap());
    let pipeline = UploadPipeline::new(store);

    let source = SourceImage::new("team photo.png", create_png(800, 400));
    let name = optimized_filename(&source.filename, OutputFormat::Webp);
    let path = join_key(Some("about"), &name);

    let stored = pipeline
        .upload(source, &path, &OptimizationOptions::with_bounds(400, 400))
        .await
        .unwrap();

    assert_eq!(stored.path, "about/team photo.webp");
    assert_eq!(
        stored.public_url,
        "https://static.example.com/media/about/team%20photo.webp"
    );

    let written = std::fs::read(pipeline.store().root().join("about/team photo.webp")).unwrap();
    assert!(is_valid_webp(&written));
    assert_eq!(decoded_size(&written), (400, 200));
}

#[tokio::test]
async fn test_fs_store_default_urls_are_file_urls() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path()).await.unwrap();

    let url = store.public_url("a/b.webp");
    assert!(url.starts_with("file://"));
    assert!(url.ends_with("/a/b.webp"));
    assert!(store.identifier().starts_with("file://"));
}

#[tokio::test]
async fn test_fs_store_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path()).await.unwrap();
    let pipeline = UploadPipeline::new(store);
    let options = OptimizationOptions::default();

    pipeline
        .upload(SourceImage::new("a.png", create_png(8, 8)), "a.webp", &options)
        .await
        .unwrap();
    let first = std::fs::read(dir.path().join("a.webp")).unwrap();

    let err = pipeline
        .upload(SourceImage::new("a.png", create_png(16, 16)), "a.webp", &options)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(StoreError::Conflict(ref p)) if p == "a.webp"));
    assert_eq!(std::fs::read(dir.path().join("a.webp")).unwrap(), first);
}

#[tokio::test]
async fn test_failed_decode_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path()).await.unwrap();
    let pipeline = UploadPipeline::new(store);

    let result = pipeline
        .upload(
            SourceImage::new("bad.jpg", Vec::new()),
            "bad.webp",
            &OptimizationOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(PipelineError::Decode { .. })));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_timestamped_batch_into_folder() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path()).await.unwrap();
    let pipeline = UploadPipeline::new(store);

    let items: Vec<_> = ["one.png", "two.png", "three.png"]
        .iter()
        .map(|name| {
            let path = timestamped_key(Some("gallery"), &optimized_filename(name, OutputFormat::Webp));
            BatchItem::new(SourceImage::new(*name, create_png(12, 12)), path)
        })
        .collect();

    let results = pipeline
        .upload_batch(items, &OptimizationOptions::default(), 3)
        .await;

    for (result, name) in results.iter().zip(["one.webp", "two.webp", "three.webp"]) {
        let stored = result.as_ref().unwrap();
        assert!(stored.path.starts_with("gallery/"));
        assert!(stored.path.ends_with(&format!("-{}", name)));
        assert!(dir.path().join(&stored.path).is_file());
    }
}

#[test]
fn test_options_json_uses_camel_case() {
    let options: OptimizationOptions = serde_json::from_str(
        r#"{"maxWidth": 1280, "maxHeight": 720, "quality": 0.6, "format": "jpeg", "allowUpscale": true}"#,
    )
    .unwrap();

    assert_eq!(options.max_width, 1280);
    assert_eq!(options.max_height, 720);
    assert_eq!(options.format, OutputFormat::Jpeg);
    assert!(options.allow_upscale);

    let json = serde_json::to_value(OptimizationOptions::default()).unwrap();
    assert_eq!(json["maxWidth"], 1920);
    assert_eq!(json["maxHeight"], 1080);
    assert_eq!(json["format"], "webp");
    assert_eq!(json["allowUpscale"], false);
}
