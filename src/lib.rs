// Library root
// -----------
// This crate exposes the upload pipeline behind the `swarm-upload` binary.
// `main.rs` only parses flags, sets up logging and hands off to these
// modules.
//
// Module responsibilities:
// - `cli`: clap flag surface, converted into `config` types.
// - `config`: the upload request and run settings.
// - `resolver`: turns a URL / file / manifest argument into upload items.
// - `fetcher`: downloads or copies one item into a temporary file.
// - `api`: the `Gateway` trait and the blocking Bee node client.
// - `orchestrator`: fetch -> upload -> cleanup per item on a worker pool.
// - `result_log`: one audit file per successful upload.
// - `ui`: progress bars and the final report.
// - `error`: typed errors shared by the above.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod resolver;
pub mod result_log;
pub mod ui;
