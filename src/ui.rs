// UI layer: progress bars while files move, and the plain-text report
// printed once every item has finished.

use std::error::Error;
use std::io::{self, Write};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::config::RunConfig;
use crate::orchestrator::RunReport;
use crate::result_log::render_entry;

const RULE: &str = "==============================";

/// Shared handle to the terminal progress area. Cheap to clone.
#[derive(Clone)]
pub struct Progress {
    multi: MultiProgress,
}

impl Progress {
    /// `visible = false` draws nothing, which is what tests and `--no-progress` want.
    pub fn new(visible: bool) -> Self {
        let multi = if visible {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Progress { multi }
    }

    /// Bar for one download. Shows a percentage when the size is known,
    /// otherwise a byte counter.
    pub fn download_bar(&self, index: usize, total: Option<u64>) -> ProgressBar {
        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(style(
                    "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({percent}%)",
                ));
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(style("{spinner} {msg} {bytes}"));
                bar
            }
        };
        bar.set_message(format!("File {index}"));
        self.multi.add(bar)
    }

    /// Spinner shown while the gateway receives a file.
    pub fn upload_spinner(&self, index: usize) -> ProgressBar {
        let spinner = self.multi.add(ProgressBar::new_spinner());
        spinner.set_style(style("{spinner} {msg}"));
        spinner.set_message(format!("Uploading file {index}..."));
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }
}

/// Log sink for `tracing` that hides the bars while a line goes to stderr,
/// so events and redraws do not interleave.
pub struct LogWriter {
    multi: MultiProgress,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for Progress {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            multi: self.multi.clone(),
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Render an error with its whole source chain on one line.
pub fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        cause = inner.source();
    }
    out
}

/// Print every outcome in input order, then a one-line summary.
pub fn print_report(report: &RunReport, config: &RunConfig) {
    if report.outcomes.is_empty() {
        println!("\nNothing to upload.\n");
        return;
    }

    for (i, outcome) in report.outcomes.iter().enumerate() {
        println!("\n{RULE} File {} {RULE}", i + 1);
        match outcome {
            Ok(result) => {
                let link = config.access_url(&result.reference);
                print!("{}", render_entry(result, &link));
            }
            Err(err) => eprintln!("Error: {}", error_chain(err)),
        }
    }

    println!(
        "\n{} uploaded, {} failed. Logs are written to {}\n",
        report.succeeded(),
        report.failed(),
        config.log_dir.display()
    );
}
