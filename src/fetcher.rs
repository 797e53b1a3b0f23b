// Source fetching: copy one item's bytes into a fresh temporary file.
//
// URLs are streamed with a blocking HTTP GET, local paths are read straight
// off disk. Either way the payload lands in its own temp file that is fully
// written and closed before `fetch` returns.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};
use url::Url;

use crate::error::ItemError;
use crate::resolver::{is_valid_url, sanitize_file_name, UploadItem};
use crate::ui::Progress;

/// A downloaded payload sitting in a temporary file. The orchestrator owns it
/// until the upload finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPayload {
    pub temp_path: PathBuf,
    /// Name to store under, extension included.
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    /// Leading dot included, e.g. `.png`.
    pub extension: Option<String>,
}

pub struct SourceFetcher {
    client: Client,
    temp_dir: PathBuf,
}

impl SourceFetcher {
    /// `timeout` bounds each whole download.
    pub fn new(temp_dir: PathBuf, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(SourceFetcher { client, temp_dir })
    }

    pub fn fetch(
        &self,
        item: &UploadItem,
        progress: &Progress,
    ) -> Result<FetchedPayload, ItemError> {
        if is_valid_url(&item.source_ref) {
            self.fetch_url(item, progress)
        } else {
            self.fetch_local(item, progress)
        }
    }

    fn fetch_url(
        &self,
        item: &UploadItem,
        progress: &Progress,
    ) -> Result<FetchedPayload, ItemError> {
        let download_err = |reason: String| ItemError::Download {
            index: item.index,
            source_ref: item.source_ref.clone(),
            reason,
        };

        let url = Url::parse(&item.source_ref).map_err(|e| download_err(e.to_string()))?;
        if url.scheme() == "ftp" {
            return Err(download_err("ftp sources are not supported".into()));
        }

        info!(index = item.index, url = %url, "fetching file");
        let res = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| download_err(e.to_string()))?;
        if !res.status().is_success() {
            return Err(download_err(format!("server responded {}", res.status())));
        }

        let size = res.content_length();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let last_segment = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type.or_else(|| guess_mime(Path::new(&last_segment)));
        let extension = extension_of(Path::new(&last_segment))
            .or_else(|| content_type.as_deref().and_then(extension_for_mime));

        let name = item.resolved_name();
        let bar = progress.download_bar(item.index, size);
        let temp_path = self
            .write_temp(&name, extension.as_deref(), bar.wrap_read(res))
            .map_err(|e| download_err(e.to_string()))?;
        bar.finish_and_clear();
        debug!(index = item.index, path = %temp_path.display(), "temporary file written");

        Ok(FetchedPayload {
            temp_path,
            file_name: upload_file_name(item, &name, extension.as_deref()),
            content_type,
            size,
            extension,
        })
    }

    fn fetch_local(
        &self,
        item: &UploadItem,
        progress: &Progress,
    ) -> Result<FetchedPayload, ItemError> {
        let path = PathBuf::from(&item.source_ref);
        let read_err = |source: io::Error| ItemError::LocalRead {
            index: item.index,
            path: path.clone(),
            source,
        };

        info!(index = item.index, path = %path.display(), "reading local file");
        let meta = fs::metadata(&path).map_err(read_err)?;
        if !meta.is_file() {
            return Err(read_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        let file = File::open(&path).map_err(read_err)?;

        let size = Some(meta.len());
        let extension = extension_of(&path);
        let name = item.resolved_name();
        let bar = progress.download_bar(item.index, size);
        let temp_path = self
            .write_temp(&name, extension.as_deref(), bar.wrap_read(file))
            .map_err(read_err)?;
        bar.finish_and_clear();
        debug!(index = item.index, path = %temp_path.display(), "temporary file written");

        Ok(FetchedPayload {
            temp_path,
            file_name: upload_file_name(item, &name, extension.as_deref()),
            content_type: guess_mime(&path),
            size,
            extension,
        })
    }

    /// Copy `reader` into a uniquely named file under the temp directory and
    /// keep it on disk. A partially written file is removed on error.
    fn write_temp<R: Read>(
        &self,
        name: &str,
        extension: Option<&str>,
        mut reader: R,
    ) -> io::Result<PathBuf> {
        let mut temp = tempfile::Builder::new()
            .prefix(&format!("temp-{}-", sanitize_file_name(name)))
            .suffix(extension.unwrap_or(""))
            .tempfile_in(&self.temp_dir)?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
        }

        let (file, path) = temp.keep().map_err(|e| e.error)?;
        drop(file);
        Ok(path)
    }
}

/// File name used on upload. An explicit name that already carries an
/// extension is used verbatim.
fn upload_file_name(item: &UploadItem, name: &str, extension: Option<&str>) -> String {
    let explicit_has_ext = item
        .display_name
        .as_deref()
        .map_or(false, |n| Path::new(n).extension().is_some());
    match extension {
        Some(ext) if !explicit_has_ext => format!("{name}{ext}"),
        _ => name.to_string(),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Content type implied by a file extension, if it has a well-known one.
fn guess_mime(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first_raw().map(str::to_string)
}

/// `image/png` -> `.png`, `text/plain` -> `.txt`, `image/svg+xml` -> `.svg`.
/// Generic binary types give no extension. Types the MIME table does not
/// know fall back to their subtype.
pub fn extension_for_mime(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_lowercase();
    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.split('+').next()?.trim();
    if subtype.is_empty() || subtype == "octet-stream" {
        return None;
    }

    // Prefer the subtype itself, then any extension that maps back to
    // exactly this type.
    let known = mime_guess::get_mime_extensions_str(&essence).unwrap_or(&[]);
    let ext = if known.iter().any(|ext| *ext == subtype) {
        subtype
    } else {
        known
            .iter()
            .copied()
            .find(|ext| mime_guess::from_ext(ext).first_raw() == Some(essence.as_str()))
            .unwrap_or(subtype)
    };
    Some(format!(".{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(source_ref: &str, name: Option<&str>) -> UploadItem {
        UploadItem {
            index: 1,
            source_ref: source_ref.to_string(),
            display_name: name.map(str::to_string),
        }
    }

    #[test]
    fn mime_type_becomes_extension() {
        assert_eq!(extension_for_mime("image/png").as_deref(), Some(".png"));
        assert_eq!(extension_for_mime("application/pdf").as_deref(), Some(".pdf"));
        assert_eq!(extension_for_mime("image/svg+xml").as_deref(), Some(".svg"));
        assert_eq!(extension_for_mime("application/octet-stream"), None);
        assert_eq!(extension_for_mime("garbage"), None);
        // unknown to the MIME table
        assert_eq!(
            extension_for_mime("application/x-swarm-thing").as_deref(),
            Some(".x-swarm-thing")
        );
    }

    #[test]
    fn text_plain_gets_a_real_extension() {
        let ext = extension_for_mime("text/plain; charset=utf-8").unwrap();
        assert_ne!(ext, ".plain");
        assert_eq!(
            mime_guess::from_ext(ext.trim_start_matches('.')).first_raw(),
            Some("text/plain")
        );
    }

    #[test]
    fn local_content_type_is_guessed_from_extension() {
        let src = tempdir().unwrap();
        let tmp = tempdir().unwrap();
        let photo = src.path().join("photo.png");
        let blob = src.path().join("blob.zzqx");
        fs::write(&photo, b"\x89PNG").unwrap();
        fs::write(&blob, b"?").unwrap();

        let fetcher =
            SourceFetcher::new(tmp.path().to_path_buf(), Duration::from_secs(5)).unwrap();
        let progress = Progress::new(false);
        let png = fetcher.fetch(&item(photo.to_str().unwrap(), None), &progress).unwrap();
        let unknown = fetcher.fetch(&item(blob.to_str().unwrap(), None), &progress).unwrap();

        assert_eq!(png.content_type.as_deref(), Some("image/png"));
        assert_eq!(unknown.content_type, None);
    }

    #[test]
    fn upload_name_appends_extension_once() {
        assert_eq!(
            upload_file_name(&item("x", None), "report", Some(".pdf")),
            "report.pdf"
        );
        assert_eq!(
            upload_file_name(&item("x", Some("mine")), "mine", Some(".pdf")),
            "mine.pdf"
        );
        assert_eq!(
            upload_file_name(&item("x", Some("mine.bin")), "mine.bin", Some(".pdf")),
            "mine.bin"
        );
        assert_eq!(upload_file_name(&item("x", None), "blob", None), "blob");
    }

    #[test]
    fn local_file_is_copied_to_temp() {
        let src = tempdir().unwrap();
        let tmp = tempdir().unwrap();
        let path = src.path().join("notes.md");
        fs::write(&path, b"# hello").unwrap();

        let fetcher =
            SourceFetcher::new(tmp.path().to_path_buf(), Duration::from_secs(5)).unwrap();
        let payload = fetcher
            .fetch(&item(path.to_str().unwrap(), None), &Progress::new(false))
            .unwrap();

        assert_eq!(payload.file_name, "notes.md");
        assert_eq!(payload.size, Some(7));
        assert_eq!(payload.extension.as_deref(), Some(".md"));
        assert!(payload.temp_path.starts_with(tmp.path()));
        assert_eq!(fs::read(&payload.temp_path).unwrap(), b"# hello");
        // the source is left alone
        assert!(path.exists());
    }

    #[test]
    fn concurrent_names_do_not_collide() {
        let src = tempdir().unwrap();
        let tmp = tempdir().unwrap();
        let path = src.path().join("same.bin");
        fs::write(&path, b"x").unwrap();

        let fetcher =
            SourceFetcher::new(tmp.path().to_path_buf(), Duration::from_secs(5)).unwrap();
        let it = item(path.to_str().unwrap(), None);
        let a = fetcher.fetch(&it, &Progress::new(false)).unwrap();
        let b = fetcher.fetch(&it, &Progress::new(false)).unwrap();
        assert_ne!(a.temp_path, b.temp_path);
    }

    #[test]
    fn missing_local_file_is_local_read_error() {
        let tmp = tempdir().unwrap();
        let fetcher =
            SourceFetcher::new(tmp.path().to_path_buf(), Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&item("/definitely/not/here.bin", None), &Progress::new(false))
            .unwrap_err();
        assert!(matches!(err, ItemError::LocalRead { index: 1, .. }));
    }

    #[test]
    fn ftp_is_download_error() {
        let tmp = tempdir().unwrap();
        let fetcher =
            SourceFetcher::new(tmp.path().to_path_buf(), Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&item("ftp://example.com/file.iso", None), &Progress::new(false))
            .unwrap_err();
        assert!(matches!(err, ItemError::Download { .. }));
        assert!(fs::read_dir(tmp.path()).unwrap().next().is_none());
    }
}
