//! CLI entry point.
//!
//! Dispatch only: `--save` posts the URL to the archive's save endpoint,
//! every other mode runs the full download supervisor. Exit code 0 on clean
//! completion (including completion after SIGINT), nonzero on fatal errors.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use waybackup_cli::{Cli, IndicatifSink, build_config, init_tracing};
use waybackup_core::{JobPaths, ProgressSink};
use waybackup_download::Supervisor;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // tracing may not be initialized yet when configuration fails
            eprintln!("waybackup: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.save {
        init_tracing(cli.verbose, None)?;
        waybackup_cdx::save_page(&cli.url).await?;
        return Ok(());
    }

    let config = build_config(&cli)?;
    let paths = JobPaths::derive(&config);

    let log_file = cli.log.then(|| paths.log_file.clone());
    if let Some(path) = &log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    init_tracing(cli.verbose, log_file.as_deref())?;

    let sink: Arc<dyn ProgressSink> = Arc::new(IndicatifSink::new(cli.progress));
    let supervisor = Supervisor::new(config, sink);
    supervisor.run().await?;

    Ok(())
}
