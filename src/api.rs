// Gateway client module: a small blocking HTTP client for a Bee node's
// upload API. The pipeline only sees the `Gateway` trait, so tests can swap
// in an in-memory gateway without a node running.

use std::fs::File;
use std::time::Duration;

use reqwest::blocking::{Body, Client};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::GatewayError;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Options forwarded with one upload. Every `None` is left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUploadOptions {
    pub pin: Option<bool>,
    pub encrypt: Option<bool>,
    pub deferred: Option<bool>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub redundancy_level: Option<u8>,
    pub tag: Option<u32>,
}

/// What the gateway hands back for a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub reference: String,
    pub tag_uid: Option<u32>,
}

/// The two gateway operations the pipeline needs. Shared across workers.
pub trait Gateway: Send + Sync {
    /// Create a tag used to follow an upload's propagation.
    fn create_tag(&self) -> Result<u32, GatewayError>;

    /// Store `body` under `filename`, paid for by `batch_id`.
    fn upload_file(
        &self,
        batch_id: &str,
        body: File,
        filename: &str,
        options: &FileUploadOptions,
    ) -> Result<UploadReceipt, GatewayError>;
}

impl<G: Gateway + ?Sized> Gateway for std::sync::Arc<G> {
    fn create_tag(&self) -> Result<u32, GatewayError> {
        (**self).create_tag()
    }

    fn upload_file(
        &self,
        batch_id: &str,
        body: File,
        filename: &str,
        options: &FileUploadOptions,
    ) -> Result<UploadReceipt, GatewayError> {
        (**self).upload_file(batch_id, body, filename, options)
    }
}

#[derive(Deserialize, Debug)]
struct TagResponse {
    uid: u32,
}

#[derive(Deserialize, Debug)]
struct ReferenceResponse {
    reference: String,
}

/// Blocking client for the Bee node HTTP API.
#[derive(Clone)]
pub struct BeeClient {
    client: Client,
    base_url: String,
}

impl BeeClient {
    /// Build a client for the node at `base_url`. `timeout` bounds each request.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(BeeClient {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Turn a non-2xx response into `GatewayError::Rejected` with its body.
fn check_status(
    res: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, GatewayError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().unwrap_or_default();
    Err(GatewayError::Rejected { status, body })
}

fn tag_from_headers(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("swarm-tag")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl Gateway for BeeClient {
    fn create_tag(&self) -> Result<u32, GatewayError> {
        let res = self.client.post(self.endpoint("tags")).send()?;
        let tag: TagResponse = check_status(res)?.json()?;
        debug!(uid = tag.uid, "created tag");
        Ok(tag.uid)
    }

    fn upload_file(
        &self,
        batch_id: &str,
        body: File,
        filename: &str,
        options: &FileUploadOptions,
    ) -> Result<UploadReceipt, GatewayError> {
        // A known size goes out as Content-Length, otherwise the body is chunked.
        let body = match options.size {
            Some(len) => Body::sized(body, len),
            None => Body::new(body),
        };
        let content_type = options
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let mut req = self
            .client
            .post(self.endpoint("bzz"))
            .query(&[("name", filename)])
            .header("swarm-postage-batch-id", batch_id)
            .header(CONTENT_TYPE, content_type)
            .body(body);

        if let Some(pin) = options.pin {
            req = req.header("swarm-pin", pin.to_string());
        }
        if let Some(encrypt) = options.encrypt {
            req = req.header("swarm-encrypt", encrypt.to_string());
        }
        if let Some(deferred) = options.deferred {
            req = req.header("swarm-deferred-upload", deferred.to_string());
        }
        if let Some(level) = options.redundancy_level {
            req = req.header("swarm-redundancy-level", level.to_string());
        }
        if let Some(tag) = options.tag {
            req = req.header("swarm-tag", tag.to_string());
        }

        let res = check_status(req.send()?)?;
        let tag_uid = options.tag.or_else(|| tag_from_headers(res.headers()));
        let parsed: ReferenceResponse = res.json()?;
        if parsed.reference.is_empty() {
            return Err(GatewayError::MissingReference);
        }

        Ok(UploadReceipt {
            reference: parsed.reference,
            tag_uid,
        })
    }
}
