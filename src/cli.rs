// Command-line surface. clap does the flag scanning and validation, so a
// missing required flag or an out-of-range value stops the process before
// anything touches the network.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::{BoolishValueParser, RangedU64ValueParser};
use clap::{ArgAction, Parser};
use url::Url;

use crate::config::{RunConfig, UploadOptions, UploadRequest, DEFAULT_ACCESS_URL, DEFAULT_LOG_DIR};

#[derive(Parser, Debug)]
#[command(
    name = "swarm-upload",
    version,
    about = "Upload files to the Swarm network through a Bee node",
    long_about = "Upload a file to the Swarm network via the file's URL, a local file, \
                  or a local .txt file listing one URL or path per line \
                  (optionally followed by a space and a file name).",
    arg_required_else_help = true
)]
pub struct Cli {
    /// A single URL, a local file, or a .txt file containing a list of URLs/paths
    #[arg(long = "file-path", value_name = "SOURCE")]
    pub file_path: String,

    /// A name given to the file (inferred from the source when omitted)
    #[arg(long, value_name = "NAME")]
    pub filename: Option<String>,

    /// The URL of the Bee node to upload through
    #[arg(long = "bee-node-url", env = "BEE_NODE_URL", value_name = "URL")]
    pub bee_node_url: Url,

    /// The ID of the postage stamp batch paying for the upload
    #[arg(long = "stamp-batch-id", env = "STAMP_BATCH_ID", value_name = "ID")]
    pub stamp_batch_id: String,

    /// Encrypt the uploaded data; the returned reference includes the key
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub encrypt: Option<bool>,

    /// Return before the data has been pushed to the network
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub deferred: Option<bool>,

    /// Forward the detected Content-Type so browsers render the file correctly
    #[arg(
        long = "content-type",
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub content_type: Option<bool>,

    /// Pin the data locally on the Bee node as well
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub pin: Option<bool>,

    /// Forward the detected Content-Length
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub size: Option<bool>,

    /// Erasure coding level used to preserve the data (0-4)
    #[arg(
        long = "redundancy-level",
        value_name = "LEVEL",
        value_parser = clap::value_parser!(u8).range(0..=4),
    )]
    pub redundancy_level: Option<u8>,

    /// Create a tag per file so upload propagation can be followed
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub track: Option<bool>,

    /// Number of files processed at the same time
    #[arg(
        long,
        value_name = "N",
        default_value_t = 4,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=64),
    )]
    pub concurrency: usize,

    /// Seconds allowed for each download
    #[arg(long = "download-timeout", value_name = "SECS", default_value_t = 300)]
    pub download_timeout: u64,

    /// Seconds allowed for each gateway request
    #[arg(long = "upload-timeout", value_name = "SECS", default_value_t = 600)]
    pub upload_timeout: u64,

    /// Directory receiving one log file per uploaded file
    #[arg(long = "log-dir", value_name = "DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Directory for temporary downloads (defaults to the system temp dir)
    #[arg(long = "temp-dir", value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Prefix of the access link printed for each reference
    #[arg(long = "gateway-url", value_name = "URL", default_value = DEFAULT_ACCESS_URL)]
    pub gateway_url: String,

    /// Do not draw progress bars
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl Cli {
    /// Split the parsed flags into what to upload and how to run.
    pub fn into_parts(self) -> (UploadRequest, RunConfig) {
        let request = UploadRequest {
            source: self.file_path,
            explicit_file_name: self.filename,
            bee_node_url: self.bee_node_url,
            postage_batch_id: self.stamp_batch_id,
            upload_options: UploadOptions {
                pin: self.pin,
                encrypt: self.encrypt,
                deferred: self.deferred,
                content_type: self.content_type,
                size: self.size,
                redundancy_level: self.redundancy_level,
                track: self.track,
            },
        };

        let config = RunConfig {
            concurrency: self.concurrency,
            download_timeout: Duration::from_secs(self.download_timeout),
            upload_timeout: Duration::from_secs(self.upload_timeout),
            log_dir: self.log_dir,
            temp_dir: self.temp_dir.unwrap_or_else(std::env::temp_dir),
            access_url_prefix: self.gateway_url,
            show_progress: !self.no_progress,
        };

        (request, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    const BASE: [&str; 7] = [
        "swarm-upload",
        "--file-path",
        "https://example.com/a.png",
        "--bee-node-url",
        "http://localhost:1633",
        "--stamp-batch-id",
        "batch",
    ];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(BASE.iter().chain(extra.iter()).copied())
    }

    #[test]
    fn minimal_flags_parse() {
        let (request, config) = parse(&[]).unwrap().into_parts();
        assert_eq!(request.source, "https://example.com/a.png");
        assert_eq!(request.postage_batch_id, "batch");
        assert_eq!(request.upload_options, UploadOptions::default());
        assert_eq!(config.concurrency, 4);
        assert!(config.show_progress);
    }

    #[test]
    fn optional_flags_take_values() {
        let cli = parse(&[
            "--pin", "true", "--encrypt", "false", "--size", "yes", "--redundancy-level", "3",
            "--filename", "pic",
        ])
        .unwrap();
        let (request, _) = cli.into_parts();
        assert_eq!(request.explicit_file_name.as_deref(), Some("pic"));
        assert_eq!(request.upload_options.pin, Some(true));
        assert_eq!(request.upload_options.encrypt, Some(false));
        assert_eq!(request.upload_options.size, Some(true));
        assert_eq!(request.upload_options.deferred, None);
        assert_eq!(request.upload_options.redundancy_level, Some(3));
    }

    #[test]
    fn redundancy_level_out_of_range_is_rejected() {
        let err = parse(&["--redundancy-level", "5"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(parse(&["--concurrency", "0"]).is_err());
    }

    #[test]
    fn invalid_node_url_is_rejected() {
        let err = Cli::try_parse_from([
            "swarm-upload",
            "--file-path",
            "x",
            "--bee-node-url",
            "not a url",
            "--stamp-batch-id",
            "b",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
