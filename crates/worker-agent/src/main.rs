mod dispatch;
mod pool;
mod queue;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dispatch_core::config::DispatchConfig;
use dispatch_core::consumer::NewTopicConsumer;
use dispatch_core::error::Result;
use dispatch_core::events::StatusSender;
use tracing::{error, info};

use queue::WorkQueue;

#[derive(Parser)]
#[command(name = "worker-agent", about = "Dispatch bus worker agent for a multi-worker machine", version)]
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

    info!(cluster = %config.cluster_name, workers = config.worker_agent_max_workers, "starting worker agent");

    let queue = WorkQueue::new(config.worker_agent_max_workers);
    let status = StatusSender::new(&config)?;
    let consumer = NewTopicConsumer::new(&config)?;
    let job_timeout = Duration::from_secs(config.worker_job_timeout);

    for worker_id in 0..config.worker_agent_max_workers {
        let worker_queue = queue.clone();
        let worker_status = StatusSender::new(&config)?;
        tokio::spawn(async move {
            info!(worker_id, "worker task started");
            pool::run_worker(worker_queue, worker_status, job_timeout).await;
        });
    }

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
        if let Err(err) = dispatch::check_queue_submit(&consumer, &queue, &status, &config).await {
            error!(error = %err, "dispatch tick failed");
        }
    }
}

fn init_tracing(debug: bool) {
    let log_directive = if debug {
        "worker_agent=debug,dispatch_core=debug"
    } else {
        "worker_agent=info,dispatch_core=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_directive)
        .with_target(false)
        .init();
}
