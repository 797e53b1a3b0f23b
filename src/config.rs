// Typed configuration handed from the CLI layer to the pipeline.
//
// `UploadRequest` is what the user asked for; `RunConfig` is how the run is
// carried out (workers, timeouts, directories). Both are plain structs so
// library callers and tests can build them without going through clap.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Default prefix used to build a browsable link from a content reference.
pub const DEFAULT_ACCESS_URL: &str = "https://gateway.ethswarm.org/access/";

/// Default directory (relative to the working directory) for upload logs.
pub const DEFAULT_LOG_DIR: &str = "swarm_upload_logs";

/// One invocation's worth of input. Immutable once built.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// A URL or a path to a local file (manifest or payload).
    pub source: String,
    /// User-supplied name; only used for single-item sources.
    pub explicit_file_name: Option<String>,
    pub bee_node_url: Url,
    pub postage_batch_id: String,
    pub upload_options: UploadOptions,
}

/// Optional upload flags. `None` means "not forwarded to the gateway".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Pin the content on the gateway node.
    pub pin: Option<bool>,
    /// Encrypt the content; the reference then includes the decryption key.
    pub encrypt: Option<bool>,
    /// Let the node push chunks to the network in the background.
    pub deferred: Option<bool>,
    /// Forward the detected MIME type when one was discovered.
    pub content_type: Option<bool>,
    /// Forward the detected content length when one was discovered.
    pub size: Option<bool>,
    /// Erasure-coding level, 0 to 4.
    pub redundancy_level: Option<u8>,
    /// Create a gateway tag per item so propagation can be queried later.
    pub track: Option<bool>,
}

/// How the run is executed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub concurrency: usize,
    pub download_timeout: Duration,
    pub upload_timeout: Duration,
    pub log_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub access_url_prefix: String,
    pub show_progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            concurrency: 4,
            download_timeout: Duration::from_secs(300),
            upload_timeout: Duration::from_secs(600),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            temp_dir: std::env::temp_dir(),
            access_url_prefix: DEFAULT_ACCESS_URL.to_string(),
            show_progress: true,
        }
    }
}

impl RunConfig {
    /// Browsable gateway link for a content reference.
    pub fn access_url(&self, reference: &str) -> String {
        access_url(&self.access_url_prefix, reference)
    }
}

/// Browsable gateway link: `prefix` joined with `reference`.
pub fn access_url(prefix: &str, reference: &str) -> String {
    if prefix.ends_with('/') {
        format!("{prefix}{reference}")
    } else {
        format!("{prefix}/{reference}")
    }
}
