use std::fmt;

use thiserror::Error;

/// Pipeline stage at which a file failed or was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Path and option checks before any image work
    Received,
    /// Reading the image header for its dimensions
    Probe,
    /// Computing the bounded target size
    Resize,
    /// Full decode, resample and re-encode
    Encode,
    /// Handing the encoded bytes to the blob store
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Probe => "probe",
            Stage::Resize => "resize",
            Stage::Encode => "encode",
            Stage::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Errors reported by a blob store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// An object already exists at this path (stores never overwrite)
    #[error("Object already exists: {0}")]
    Conflict(String),

    /// The store refused the write
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Destination path is empty, absolute, or escapes the store root
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::AlreadyExists => StoreError::Conflict(err.to_string()),
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(err.to_string()),
            _ => StoreError::Io(err.to_string()),
        }
    }
}

/// Errors that terminate the optimization and upload of a single file.
///
/// None of these are retried. In a batch, each file carries its own result.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Source bytes could not be read as an image
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Resampling or encoding into the target format failed
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// The blob store rejected the object or was unreachable
    #[error("Upload error: {0}")]
    Upload(#[from] StoreError),

    /// Optimization options are out of range
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The caller cancelled the pipeline
    #[error("Cancelled during {stage}")]
    Cancelled { stage: Stage },
}

impl PipelineError {
    pub(crate) fn decode(message: impl fmt::Display) -> Self {
        PipelineError::Decode {
            message: message.to_string(),
        }
    }

    pub(crate) fn encode(message: impl fmt::Display) -> Self {
        PipelineError::Encode {
            message: message.to_string(),
        }
    }

    /// Stage at which the pipeline stopped.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Decode { .. } => Stage::Probe,
            PipelineError::Encode { .. } => Stage::Encode,
            PipelineError::Upload(StoreError::InvalidPath(_)) => Stage::Received,
            PipelineError::Upload(_) => Stage::Upload,
            PipelineError::InvalidOptions(_) => Stage::Received,
            PipelineError::Cancelled { stage } => *stage,
        }
    }
}
