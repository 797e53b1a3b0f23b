// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, build the gateway client and hand the
//   request to the orchestrator.
// - Returns `anyhow::Result` so fatal errors print to stderr with a
//   non-zero exit code.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use swarm_upload::ui::{self, Progress};
use swarm_upload::{api::BeeClient, cli::Cli, orchestrator::UploadOrchestrator};

fn main() -> anyhow::Result<()> {
    // clap exits on its own for --help, missing flags and invalid values.
    let cli = Cli::parse();
    let (request, config) = cli.into_parts();
    let progress = Progress::new(config.show_progress);
    init_tracing(progress.clone());

    let gateway = BeeClient::new(request.bee_node_url.clone(), config.upload_timeout)
        .context("Failed to build the Bee node client")?;
    let orchestrator = UploadOrchestrator::new(gateway, config.clone())
        .context("Failed to build the download client")?
        .with_progress(progress);

    let report = orchestrator
        .run(&request)
        .with_context(|| format!("Cannot use --file-path '{}'", request.source))?;

    ui::print_report(&report, &config);

    // Every item has been attempted by now; any failure still fails the run.
    if report.failed() > 0 {
        anyhow::bail!(
            "{} of {} files failed to upload",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

// Log lines go to stderr through the progress area so bars are redrawn
// below them instead of being torn apart.
fn init_tracing(progress: Progress) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,swarm_upload=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(progress)
        .init();
}
