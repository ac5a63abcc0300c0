mod dispatch;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dispatch_core::config::DispatchConfig;
use dispatch_core::consumer::NewTopicConsumer;
use dispatch_core::error::Result;
use dispatch_core::events::StatusSender;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "cluster-agent", about = "Dispatch bus agent for a batch-scheduler-managed HPC cluster", version)]
struct Cli {
    #[arg(short, long, value_name = "FILE", help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => DispatchConfig::load(&path)?,
        None => DispatchConfig::from_env()?,
    };
    init_tracing(cli.verbose || config.debug);

    info!(cluster = %config.cluster_name, "starting cluster agent");

    let status = StatusSender::new(&config)?;
    let consumer = NewTopicConsumer::new(&config)?;

    if config.heartbeat_enabled() {
        let heartbeat = dispatch_core::events::HeartbeatSender::new(&config)?;
        let interval = Duration::from_secs_f64(config.heartbeat_interval);
        tokio::spawn(async move {
            heartbeat.run(interval).await;
        });
    }

    let poll_interval = Duration::from_secs_f64(config.poll_interval);
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        if let Err(err) = dispatch::check_queue_submit(&consumer, &status, &config).await {
            error!(error = %err, "dispatch tick failed");
        }
    }
}

fn init_tracing(debug: bool) {
    let log_directive = if debug {
        "cluster_agent=debug,dispatch_core=debug,slurm_probe=debug"
    } else {
        "cluster_agent=info,dispatch_core=info,slurm_probe=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_directive)
        .with_target(false)
        .init();
}
