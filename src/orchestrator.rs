// Upload orchestration: resolve the input, then fetch -> upload -> clean up
// each item on a bounded worker pool.
//
// Failures are isolated per item. Every item gets an outcome, in input
// order, whatever happened to its siblings. A temp file is deleted only
// after the gateway returned a reference; failed uploads leave it on disk.

use std::fs::{self, File};

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::api::{FileUploadOptions, Gateway};
use crate::config::{RunConfig, UploadOptions, UploadRequest};
use crate::error::{GatewayError, ItemError, ResolveError};
use crate::fetcher::{FetchedPayload, SourceFetcher};
use crate::resolver::{self, UploadItem};
use crate::result_log::ResultLogger;
use crate::ui::{error_chain, Progress};

/// A stored file, as reported back to the user and the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub reference: String,
    pub tag_uid: Option<u32>,
    pub filename: String,
}

pub type ItemOutcome = Result<UploadResult, ItemError>;

/// Everything one run produced. `outcomes[i]` belongs to `items[i]`.
#[derive(Debug)]
pub struct RunReport {
    pub items: Vec<UploadItem>,
    pub outcomes: Vec<ItemOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct UploadOrchestrator<G> {
    gateway: G,
    fetcher: SourceFetcher,
    logger: ResultLogger,
    progress: Progress,
    config: RunConfig,
}

impl<G: Gateway> UploadOrchestrator<G> {
    pub fn new(gateway: G, config: RunConfig) -> Result<Self, reqwest::Error> {
        let fetcher = SourceFetcher::new(config.temp_dir.clone(), config.download_timeout)?;
        let logger = ResultLogger::new(config.log_dir.clone(), config.access_url_prefix.clone());
        let progress = Progress::new(config.show_progress);
        Ok(UploadOrchestrator {
            gateway,
            fetcher,
            logger,
            progress,
            config,
        })
    }

    /// Draw into `progress` instead of a private progress area. Lets the
    /// log writer and the bars share one terminal region.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve `request.source` and process every item. Only resolution
    /// errors are returned as `Err`; item failures live in the report.
    pub fn run(&self, request: &UploadRequest) -> Result<RunReport, ResolveError> {
        let items = resolver::resolve(&request.source, request.explicit_file_name.as_deref())?;
        info!(items = items.len(), source = %request.source, "input resolved");
        let outcomes = self.process_all(&items, request);
        Ok(RunReport { items, outcomes })
    }

    /// Process `items` concurrently, at most `config.concurrency` at a time.
    /// The returned outcomes are in the same order as `items`.
    pub fn process_all(&self, items: &[UploadItem], request: &UploadRequest) -> Vec<ItemOutcome> {
        let workers = self.config.concurrency.max(1);
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| {
                items
                    .par_iter()
                    .map(|item| self.process_item(item, request))
                    .collect::<Vec<_>>()
            }),
            Err(e) => {
                warn!(error = %e, "worker pool unavailable, processing sequentially");
                items
                    .iter()
                    .map(|item| self.process_item(item, request))
                    .collect()
            }
        }
    }

    /// Fetch, upload and clean up a single item. Never panics on item errors.
    pub fn process_item(&self, item: &UploadItem, request: &UploadRequest) -> ItemOutcome {
        let outcome = self.try_process_item(item, request);
        if let Err(err) = &outcome {
            error!(index = item.index, source = %item.source_ref, "{}", error_chain(err));
        }
        outcome
    }

    fn try_process_item(&self, item: &UploadItem, request: &UploadRequest) -> ItemOutcome {
        let tag = self.tracking_tag(item, &request.upload_options);
        let payload = self.fetcher.fetch(item, &self.progress)?;
        let options = build_upload_options(&request.upload_options, &payload, tag);

        let upload_err = |source: GatewayError| ItemError::Upload {
            index: item.index,
            name: payload.file_name.clone(),
            temp_path: payload.temp_path.clone(),
            source,
        };

        let body = File::open(&payload.temp_path).map_err(|e| upload_err(e.into()))?;
        info!(index = item.index, filename = %payload.file_name, "uploading");
        let spinner = self.progress.upload_spinner(item.index);
        let receipt = self.gateway.upload_file(
            &request.postage_batch_id,
            body,
            &payload.file_name,
            &options,
        );
        spinner.finish_and_clear();

        let receipt = receipt.map_err(upload_err)?;
        if receipt.reference.is_empty() {
            return Err(upload_err(GatewayError::MissingReference));
        }

        if let Err(e) = fs::remove_file(&payload.temp_path) {
            warn!(
                index = item.index,
                path = %payload.temp_path.display(),
                error = %e,
                "cannot remove temporary file"
            );
        }

        let result = UploadResult {
            reference: receipt.reference,
            tag_uid: receipt.tag_uid,
            filename: payload.file_name,
        };
        info!(index = item.index, reference = %result.reference, "uploaded");

        // A log failure does not undo the upload.
        if let Err(e) = self.logger.record(item, &result) {
            error!(index = item.index, "{}", error_chain(&e));
        }
        Ok(result)
    }

    /// Tag for progress tracking, if requested. A failure only loses tracking.
    fn tracking_tag(&self, item: &UploadItem, options: &UploadOptions) -> Option<u32> {
        if options.track != Some(true) {
            return None;
        }
        match self.gateway.create_tag() {
            Ok(uid) => Some(uid),
            Err(e) => {
                warn!(
                    index = item.index,
                    "tag creation failed, uploading untracked: {}",
                    error_chain(&e)
                );
                None
            }
        }
    }
}

/// Options for one upload. `size` and `content_type` forward what the fetch
/// discovered and are left out when nothing was discovered.
pub fn build_upload_options(
    flags: &UploadOptions,
    payload: &FetchedPayload,
    tag: Option<u32>,
) -> FileUploadOptions {
    let wanted = |flag: Option<bool>| flag == Some(true);
    FileUploadOptions {
        pin: flags.pin,
        encrypt: flags.encrypt,
        deferred: flags.deferred,
        content_type: payload
            .content_type
            .clone()
            .filter(|_| wanted(flags.content_type)),
        size: payload.size.filter(|_| wanted(flags.size)),
        redundancy_level: flags.redundancy_level,
        tag,
    }
}
