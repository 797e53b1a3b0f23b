// Error types for the upload pipeline.
//
// Resolution errors are fatal to the whole run and surface before any
// network activity. Item errors are captured per item by the orchestrator
// and never abort sibling items.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning the `--file-path` argument into items.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("'{input}' is neither a valid http/https/ftp URL nor a local file")]
    InvalidInput { input: String },

    #[error("file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("a file name is required for '{input}'; pass a non-empty --filename")]
    MissingName { input: String },

    #[error("cannot read manifest {}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors talking to the Bee gateway node.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to gateway failed")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected the request: {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway response is missing a content reference")]
    MissingReference,

    #[error("cannot read upload body")]
    Io(#[from] std::io::Error),
}

/// A single item's failure. Carries the 1-based item number so the offending
/// line can be located in the input.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("file {index} ({source_ref}): download failed: {reason}")]
    Download {
        index: usize,
        source_ref: String,
        reason: String,
    },

    #[error("file {index} ({}): cannot read local file", .path.display())]
    LocalRead {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "file {index} ({name}): upload failed, temporary file kept at {}",
        .temp_path.display()
    )]
    Upload {
        index: usize,
        name: String,
        temp_path: PathBuf,
        #[source]
        source: GatewayError,
    },
}

impl ItemError {
    /// 1-based position of the failing item in the resolved input.
    pub fn index(&self) -> usize {
        match self {
            ItemError::Download { index, .. }
            | ItemError::LocalRead { index, .. }
            | ItemError::Upload { index, .. } => *index,
        }
    }
}

/// Writing an audit log entry failed. Reported and swallowed by callers.
#[derive(Debug, Error)]
#[error("cannot write upload log {}", .path.display())]
pub struct LogWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
