// Input resolution: turns the `--file-path` argument into upload items.
//
// A URL yields one item. A local `.txt` file is a manifest with one item per
// non-empty line. Any other local file is uploaded as-is. Names are resolved
// lazily: manifest lines without a name get theirs inferred when fetched.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use url::Url;

use crate::error::ResolveError;

const URL_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// One source to fetch and upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    /// 1-based position in resolution order.
    pub index: usize,
    /// A URL or a local file path.
    pub source_ref: String,
    /// Name given explicitly or on the manifest line.
    pub display_name: Option<String>,
}

impl UploadItem {
    /// The name to upload under: the given one, or one inferred from the source.
    pub fn resolved_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| infer_name(&self.source_ref))
    }
}

/// Resolve `source` relative to the process working directory.
pub fn resolve(
    source: &str,
    explicit_file_name: Option<&str>,
) -> Result<Vec<UploadItem>, ResolveError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(source, explicit_file_name, &cwd)
}

/// Resolve `source`, treating relative paths as relative to `cwd`.
pub fn resolve_from(
    source: &str,
    explicit_file_name: Option<&str>,
    cwd: &Path,
) -> Result<Vec<UploadItem>, ResolveError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(ResolveError::InvalidInput {
            input: source.to_string(),
        });
    }

    let explicit = match explicit_file_name {
        Some(name) if name.trim().is_empty() => {
            return Err(ResolveError::MissingName {
                input: source.to_string(),
            })
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    if is_valid_url(source) {
        return Ok(vec![UploadItem {
            index: 1,
            source_ref: source.to_string(),
            display_name: explicit,
        }]);
    }

    // Something URL-shaped with an unsupported scheme or a malformed host
    // is rejected here rather than looked up on disk.
    if source.contains("://") {
        return Err(ResolveError::InvalidInput {
            input: source.to_string(),
        });
    }

    let path = normalize_path(source, cwd);
    if !path.exists() {
        return Err(ResolveError::FileNotFound { path });
    }
    if !path.is_file() {
        return Err(ResolveError::InvalidInput {
            input: source.to_string(),
        });
    }

    if !is_manifest(&path) {
        return Ok(vec![UploadItem {
            index: 1,
            source_ref: path.to_string_lossy().into_owned(),
            display_name: explicit,
        }]);
    }

    if explicit.is_some() {
        warn!(manifest = %path.display(), "--filename is ignored for manifest files");
    }

    let text = fs::read_to_string(&path).map_err(|source| ResolveError::ManifestRead {
        path: path.clone(),
        source,
    })?;
    let items: Vec<UploadItem> = parse_manifest(&text)
        .into_iter()
        .enumerate()
        .map(|(i, (entry, display_name))| UploadItem {
            index: i + 1,
            source_ref: manifest_source(entry, cwd),
            display_name,
        })
        .collect();
    debug!(manifest = %path.display(), items = items.len(), "manifest resolved");
    Ok(items)
}

/// Split manifest text into `(source, optional name)` pairs, in file order.
///
/// Each non-blank line is either `<source>` or `<source> <name>`.
pub fn parse_manifest(text: &str) -> Vec<(String, Option<String>)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(' ') {
            Some((source, name)) => {
                let name = name.trim();
                let name = (!name.is_empty()).then(|| name.to_string());
                (source.trim().to_string(), name)
            }
            None => (line.to_string(), None),
        })
        .collect()
}

/// True for an `http`, `https` or `ftp` URL with a host and no whitespace.
pub fn is_valid_url(input: &str) -> bool {
    if input.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(input) {
        Ok(url) => {
            URL_SCHEMES.contains(&url.scheme())
                && url.host_str().map_or(false, |h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// A local `.txt` file lists one source per line.
pub fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("txt"))
}

/// Manifest entries follow the same path rules as the top-level source.
/// Anything URL-shaped is kept verbatim and fails, if at all, when fetched.
fn manifest_source(entry: String, cwd: &Path) -> String {
    if entry.contains("://") {
        entry
    } else {
        normalize_path(&entry, cwd).to_string_lossy().into_owned()
    }
}

fn normalize_path(source: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(source);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// The last path segment of a URL or file path, percent-decoded, without
/// its extension. `None` when nothing usable remains.
pub fn name_from_source(source_ref: &str) -> Option<String> {
    let segment = if is_valid_url(source_ref) {
        let url = Url::parse(source_ref).ok()?;
        url.path_segments()?.last()?.to_string()
    } else {
        Path::new(source_ref)
            .file_name()?
            .to_string_lossy()
            .into_owned()
    };

    let decoded = percent_decode_str(&segment).decode_utf8_lossy();
    let stem = Path::new(decoded.as_ref())
        .file_stem()?
        .to_string_lossy()
        .into_owned();
    (!stem.is_empty()).then_some(stem)
}

/// Name inferred from the source, or a timestamp when none can be derived.
pub fn infer_name(source_ref: &str) -> String {
    name_from_source(source_ref).unwrap_or_else(timestamp_name)
}

/// Replace path separators so a name is safe inside a single file name.
pub(crate) fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

fn timestamp_name() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}
