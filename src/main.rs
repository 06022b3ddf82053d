//! Image Uplink - optimize images and upload them to blob storage.
//!
//! This binary parses the CLI, builds the configured store and drives the
//! pipeline over the given files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_uplink::{
    config::{Cli, Command, OptimizeConfig, ProbeConfig, StoreBackend, UploadConfig},
    create_s3_client, optimize_image, optimized_filename,
    store::{default_public_base, keys},
    BatchItem, BlobStore, FsBlobStore, PipelineError, S3BlobStore, SourceImage, Stage,
    StoredObjectRef, UploadPipeline,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Upload(config) => run_upload(config).await,
        Command::Optimize(config) => run_optimize(config).await,
        Command::Probe(config) => run_probe(config).await,
    }
}

// =============================================================================
// Upload Command
// =============================================================================

async fn run_upload(config: UploadConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = config.image.options();
    info!(
        "Optimizing to {} at most {}x{} (quality {})",
        options.format, options.max_width, options.max_height, options.quality
    );

    match config.store.backend {
        StoreBackend::S3 => {
            let endpoint = config.store.s3_endpoint.as_deref();
            let client = create_s3_client(endpoint, &config.store.s3_region).await;

            let public_base = match config.store.public_base() {
                Ok(Some(url)) => url,
                Ok(None) => match default_public_base(
                    endpoint,
                    &config.store.bucket,
                    &config.store.s3_region,
                ) {
                    Ok(url) => url,
                    Err(e) => {
                        error!("Cannot derive public URL base: {}", e);
                        return ExitCode::FAILURE;
                    }
                },
                Err(e) => {
                    error!("Configuration error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            let mut store = S3BlobStore::new(client, config.store.bucket.clone(), public_base)
                .with_cache_control(config.store.cache_control.clone());
            if let Some(ref prefix) = config.store.s3_prefix {
                store = store.with_prefix(prefix.clone());
            }

            upload_files(store, &config).await
        }
        StoreBackend::Local => {
            // validate() guarantees the root is set
            let root = config.store.local_root.clone().unwrap_or_default();
            let mut store = match FsBlobStore::new(root).await {
                Ok(store) => store,
                Err(e) => {
                    error!("Failed to open local store: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if let Ok(Some(url)) = config.store.public_base() {
                store = store.with_public_base(url);
            }

            upload_files(store, &config).await
        }
    }
}

/// Per-file outcome printed by `upload --json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadReport {
    file: String,
    #[serde(flatten)]
    stored: Option<StoredObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl UploadReport {
    fn from_result(file: &Path, result: &Result<StoredObjectRef, PipelineError>) -> Self {
        let file = file.display().to_string();
        match result {
            Ok(stored) => Self {
                file,
                stored: Some(stored.clone()),
                stage: None,
                error: None,
            },
            Err(e) => Self {
                file,
                stored: None,
                stage: Some(e.stage().to_string()),
                error: Some(e.to_string()),
            },
        }
    }
}

async fn upload_files<S: BlobStore>(store: S, config: &UploadConfig) -> ExitCode {
    info!("Uploading {} file(s) to {}", config.files.len(), store.identifier());

    let options = config.image.options();
    let folder = config.folder.as_deref();

    let mut reports = Vec::with_capacity(config.files.len());
    let mut items = Vec::new();
    let mut item_files = Vec::new();
    let mut claimed = HashMap::new();

    for file in &config.files {
        match read_source(file).await {
            Ok(source) => {
                let name = optimized_filename(&source.filename, options.format);
                let path = if config.timestamp {
                    keys::timestamped_key(folder, &name)
                } else {
                    keys::join_key(folder, &name)
                };
                if let Err(e) = claim_path(&mut claimed, &path, file) {
                    warn!("Skipping {}: {}", file.display(), e);
                    reports.push(UploadReport {
                        file: file.display().to_string(),
                        stored: None,
                        stage: Some(Stage::Received.to_string()),
                        error: Some(e),
                    });
                    continue;
                }
                items.push(BatchItem::new(source, path));
                item_files.push(file.clone());
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                reports.push(UploadReport {
                    file: file.display().to_string(),
                    stored: None,
                    stage: Some("read".to_string()),
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let pipeline = UploadPipeline::new(store);
    let results = pipeline
        .upload_batch_with_cancel(items, &options, config.concurrency, &cancel)
        .await;

    for (file, result) in item_files.iter().zip(&results) {
        reports.push(UploadReport::from_result(file, result));
    }

    let failures = reports.iter().filter(|r| r.error.is_some()).count();

    if config.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize results: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        for report in &reports {
            match (&report.stored, &report.error) {
                (Some(stored), _) => println!("{} -> {}", report.file, stored.public_url),
                (None, Some(err)) => println!("{} FAILED: {}", report.file, err),
                (None, None) => {}
            }
        }
    }

    if failures > 0 {
        error!("{} of {} file(s) failed", failures, reports.len());
        ExitCode::FAILURE
    } else {
        info!("All {} file(s) uploaded", reports.len());
        ExitCode::SUCCESS
    }
}

// =============================================================================
// Optimize Command
// =============================================================================

async fn run_optimize(config: OptimizeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(ref dir) = config.out_dir {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            error!("Failed to create {}: {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let options = config.image.options();
    let mut failures = 0;

    for file in &config.files {
        let source = match read_source(file).await {
            Ok(source) => source,
            Err(e) => {
                println!("{} FAILED: {}", file.display(), e);
                failures += 1;
                continue;
            }
        };
        let original_len = source.data.len();

        let optimized = match optimize_image(&source, &options).await {
            Ok(optimized) => optimized,
            Err(e) => {
                println!("{} FAILED: {}", file.display(), e);
                failures += 1;
                continue;
            }
        };

        println!(
            "{} -> {} {}x{} ({} -> {} bytes)",
            file.display(),
            optimized.filename,
            optimized.dimensions.width,
            optimized.dimensions.height,
            original_len,
            optimized.data.len()
        );

        if let Some(ref dir) = config.out_dir {
            let out_path = dir.join(&optimized.filename);
            if let Err(e) = tokio::fs::write(&out_path, &optimized.data).await {
                error!("Failed to write {}: {}", out_path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// =============================================================================
// Probe Command
// =============================================================================

async fn run_probe(config: ProbeConfig) -> ExitCode {
    init_logging(config.verbose);

    let mut failures = 0;
    for file in &config.files {
        let result = match read_source(file).await {
            Ok(source) => source.probe().map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(dims) => println!("{}: {}x{}", file.display(), dims.width, dims.height),
            Err(e) => {
                println!("{}: FAILED: {}", file.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Read a file into a [`SourceImage`] named after its final path component.
async fn read_source(path: &Path) -> std::io::Result<SourceImage> {
    let data = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceImage::new(filename, data))
}

/// Reserve `path` for `file`, failing if another file of the batch maps to it.
///
/// `a.png` and `a.jpg`, or equal names from different directories, end up
/// at the same object path and would race for it.
fn claim_path(
    claimed: &mut HashMap<String, PathBuf>,
    path: &str,
    file: &Path,
) -> Result<(), String> {
    if let Some(owner) = claimed.get(path) {
        return Err(format!(
            "object path {} is already used by {}",
            path,
            owner.display()
        ));
    }
    claimed.insert(path.to_string(), file.to_path_buf());
    Ok(())
}

/// Cancel `token` on the first Ctrl-C.
fn spawn_ctrl_c_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining uploads");
            token.cancel();
        }
    });
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_uplink=debug"
    } else {
        "image_uplink=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
