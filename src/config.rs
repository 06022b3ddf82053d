//! Configuration management for Image Uplink.
//!
//! This module provides the command-line interface:
//! - Subcommands via clap (`upload`, `optimize`, `probe`)
//! - Environment variables with `UPLINK_` prefix
//! - Defaults matching the admin upload forms
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use image_uplink::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Upload(config) => println!("Uploading {} file(s)", config.files.len()),
//!     _ => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `UPLINK_MAX_WIDTH` / `UPLINK_MAX_HEIGHT` - Bounding box (default: 1920x1080)
//! - `UPLINK_QUALITY` - Encoder quality in (0, 1] (default: 0.8)
//! - `UPLINK_FORMAT` - `webp`, `jpeg` or `png` (default: webp)
//! - `UPLINK_ALLOW_UPSCALE` - Enlarge images smaller than the bounds
//! - `UPLINK_BACKEND` - `s3` or `local` (default: s3)
//! - `UPLINK_BUCKET` - Bucket name (default: media)
//! - `UPLINK_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `UPLINK_S3_REGION` - AWS region (default: us-east-1)
//! - `UPLINK_S3_PREFIX` - Key prefix inside the bucket
//! - `UPLINK_LOCAL_ROOT` - Directory for the local backend
//! - `UPLINK_PUBLIC_BASE_URL` - Base URL objects are served from
//! - `UPLINK_CACHE_CONTROL` - Cache-Control for uploads (default: max-age=3600)
//! - `UPLINK_FOLDER` - Folder prepended to object paths
//! - `UPLINK_CONCURRENCY` - Files processed at once (default: 4)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::imaging::{
    OptimizationOptions, OutputFormat, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY,
};
use crate::pipeline::DEFAULT_BATCH_CONCURRENCY;
use crate::store::DEFAULT_CACHE_CONTROL;

// =============================================================================
// Default Values
// =============================================================================

/// Default bucket name.
pub const DEFAULT_BUCKET: &str = "media";

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Maximum number of files processed at once.
pub const MAX_CONCURRENCY: usize = 64;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Uplink - optimize images and upload them to blob storage.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-uplink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Optimize images and upload them to blob storage.
    Upload(UploadConfig),

    /// Optimize images without uploading, optionally writing them to a directory.
    Optimize(OptimizeConfig),

    /// Print the pixel dimensions of images.
    Probe(ProbeConfig),
}

// =============================================================================
// Shared Arguments
// =============================================================================

/// Optimization settings shared by `upload` and `optimize`.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Maximum output width in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH, env = "UPLINK_MAX_WIDTH")]
    pub max_width: u32,

    /// Maximum output height in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT, env = "UPLINK_MAX_HEIGHT")]
    pub max_height: u32,

    /// Encoder quality in (0, 1]. Ignored for PNG.
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "UPLINK_QUALITY")]
    pub quality: f32,

    /// Output format: webp, jpeg or png.
    #[arg(long, default_value = "webp", env = "UPLINK_FORMAT")]
    pub format: OutputFormat,

    /// Enlarge images that are smaller than the bounds.
    #[arg(long, default_value_t = false, env = "UPLINK_ALLOW_UPSCALE")]
    pub allow_upscale: bool,
}

impl ImageArgs {
    pub fn options(&self) -> OptimizationOptions {
        OptimizationOptions {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.quality,
            format: self.format,
            allow_upscale: self.allow_upscale,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.options().validate().map_err(|e| e.to_string())
    }
}

/// Blob store backend.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// S3 or an S3-compatible service
    S3,
    /// A directory on the local filesystem
    Local,
}

/// Destination store settings.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Storage backend.
    #[arg(long, value_enum, default_value_t = StoreBackend::S3, env = "UPLINK_BACKEND")]
    pub backend: StoreBackend,

    /// Bucket to upload into.
    #[arg(long, default_value = DEFAULT_BUCKET, env = "UPLINK_BUCKET")]
    pub bucket: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "UPLINK_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "UPLINK_S3_REGION")]
    pub s3_region: String,

    /// Key prefix inside the bucket.
    #[arg(long, env = "UPLINK_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Root directory for the local backend.
    #[arg(long, env = "UPLINK_LOCAL_ROOT")]
    pub local_root: Option<PathBuf>,

    /// Base URL objects are publicly served from.
    ///
    /// Defaults to the bucket URL for S3 and a file:// URL for local storage.
    #[arg(long, env = "UPLINK_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Cache-Control header stored with each S3 object.
    #[arg(long, default_value = DEFAULT_CACHE_CONTROL, env = "UPLINK_CACHE_CONTROL")]
    pub cache_control: String,
}

impl StoreArgs {
    pub fn validate(&self) -> Result<(), String> {
        match self.backend {
            StoreBackend::S3 => {
                if self.bucket.is_empty() {
                    return Err(
                        "S3 bucket name is required. Set --bucket or UPLINK_BUCKET".to_string()
                    );
                }
                if let Some(ref endpoint) = self.s3_endpoint {
                    Url::parse(endpoint)
                        .map_err(|e| format!("Invalid S3 endpoint '{}': {}", endpoint, e))?;
                }
            }
            StoreBackend::Local => {
                if self.local_root.is_none() {
                    return Err(
                        "Local backend needs a root directory. Set --local-root or UPLINK_LOCAL_ROOT"
                            .to_string(),
                    );
                }
            }
        }

        self.public_base()?;
        Ok(())
    }

    /// Parsed `--public-base-url`, if set.
    pub fn public_base(&self) -> Result<Option<Url>, String> {
        self.public_base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| format!("Invalid public base URL '{}': {}", raw, e))
            })
            .transpose()
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Arguments for `upload`.
#[derive(Args, Debug, Clone)]
pub struct UploadConfig {
    /// Image files to upload.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub image: ImageArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Folder to upload into (object paths become `<folder>/<name>`).
    #[arg(long, env = "UPLINK_FOLDER")]
    pub folder: Option<String>,

    /// Prefix each object name with the upload time in milliseconds.
    #[arg(long, default_value_t = false)]
    pub timestamp: bool,

    /// Number of files processed at once.
    #[arg(long, default_value_t = DEFAULT_BATCH_CONCURRENCY, env = "UPLINK_CONCURRENCY")]
    pub concurrency: usize,

    /// Print results as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("At least one file is required".to_string());
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            ));
        }
        self.image.validate()?;
        self.store.validate()
    }
}

/// Arguments for `optimize`.
#[derive(Args, Debug, Clone)]
pub struct OptimizeConfig {
    /// Image files to optimize.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub image: ImageArgs,

    /// Directory to write optimized files to. Without it, only a report is printed.
    #[arg(long, short)]
    pub out_dir: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl OptimizeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("At least one file is required".to_string());
        }
        self.image.validate()
    }
}

/// Arguments for `probe`.
#[derive(Args, Debug, Clone)]
pub struct ProbeConfig {
    /// Image files to inspect.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
