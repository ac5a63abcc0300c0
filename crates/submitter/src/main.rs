use std::path::PathBuf;

use clap::Parser;
use dispatch_core::config::DispatchConfig;
use dispatch_core::error::Result;
use dispatch_core::model::SlurmPars;
use submitter::Submitter;
use tracing::info;

#[derive(Parser)]
#[command(name = "submitter", about = "Publish a job onto the dispatch bus NEW topic", version)]
struct Cli {
    #[arg(short, long, value_name = "FILE", help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,

    /// Caller-supplied job key, unique per logical job.
    job_key: String,

    /// Path of the user program to execute.
    script: String,

    #[arg(long, help = "Skip the monitor pre-check and always publish")]
    no_check: bool,

    #[arg(long, help = "Resubmit even if the monitor reports a prior ERROR status")]
    ignore_error_status: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => DispatchConfig::load(&path)?,
        None => DispatchConfig::from_env()?,
    };
    init_tracing(cli.verbose || config.debug);

    let submitter = Submitter::new(&config)?;
    let outcome = submitter
        .send(
            cli.job_key,
            cli.script,
            SlurmPars::default(),
            !cli.no_check,
            true,
            cli.ignore_error_status,
        )
        .await?;

    if outcome.submitted {
        info!(job_key = %outcome.job_key, "published to NEW topic");
    } else {
        info!(job_key = %outcome.job_key, status = ?outcome.existing_status, "skipped, already known to the monitor");
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let log_directive = if debug {
        "submitter=debug,dispatch_core=debug"
    } else {
        "submitter=info,dispatch_core=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_directive)
        .with_target(false)
        .init();
}
