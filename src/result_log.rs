// Upload audit log: one plain-text file per successful upload, written under
// the configured log directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::error::LogWriteError;
use crate::orchestrator::UploadResult;
use crate::resolver::{sanitize_file_name, UploadItem};

/// Human-readable record of one upload.
pub fn render_entry(result: &UploadResult, access_url: &str) -> String {
    let mut entry = format!(
        "Filename: {}\nReferenceHash: {}\nAccess file: {}\n",
        result.filename, result.reference, access_url
    );
    if let Some(uid) = result.tag_uid {
        entry.push_str(&format!("TagUID: {uid}\n"));
    }
    entry
}

pub struct ResultLogger {
    dir: PathBuf,
    access_url_prefix: String,
}

impl ResultLogger {
    pub fn new(dir: impl Into<PathBuf>, access_url_prefix: impl Into<String>) -> Self {
        ResultLogger {
            dir: dir.into(),
            access_url_prefix: access_url_prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a new log file for `item`. Never touches existing files; the
    /// directory is created on first use.
    pub fn record(
        &self,
        item: &UploadItem,
        result: &UploadResult,
    ) -> Result<PathBuf, LogWriteError> {
        let wrap = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| LogWriteError { path, source }
        };

        fs::create_dir_all(&self.dir).map_err(wrap(&self.dir))?;

        let access_url = crate::config::access_url(&self.access_url_prefix, &result.reference);
        let entry = render_entry(result, &access_url);
        let stem = format!(
            "{}-{}",
            sanitize_file_name(&log_name(item, result)),
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        );

        let mut attempt = 0;
        loop {
            let path = if attempt == 0 {
                self.dir.join(format!("{stem}.txt"))
            } else {
                self.dir.join(format!("{stem}-{attempt}.txt"))
            };
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(entry.as_bytes()).map_err(wrap(&path))?;
                    debug!(index = item.index, path = %path.display(), "log written");
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(wrap(&path)(e)),
            }
        }
    }
}

fn log_name(item: &UploadItem, result: &UploadResult) -> String {
    item.display_name
        .clone()
        .unwrap_or_else(|| result.filename.clone())
}
