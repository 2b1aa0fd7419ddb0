use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use aws_config::BehaviorVersion;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod dispatch;
mod error;
mod queue;

use config::EvokeConfig;
use evoke_fly::MachinesClient;
use queue::EventSource;

#[derive(Parser)]
#[command(
    name = "evoke",
    about = "evoke runs workloads based on events",
    long_about = "evoke turns queued events into ephemeral Fly Machines.

Configuration should be set via environment variables. Possible values:
  required:
    EVOKE_SQS_QUEUE_URL:          string, full SQS queue url
    AWS_*:                        any needed AWS credential environment variables (region, key, secret, profile)
    EVOKE_FLY_TOKEN:              string, a valid Fly API token
    EVOKE_FLY_REGION, FLY_REGION: one of these must be set. FLY_REGION is already set when running in Fly
    EVOKE_FLY_APP, FLY_APP_NAME:  one of these must be set. FLY_APP_NAME is already set when running in Fly

  optional:
    EVOKE_ENV:                    string, default: local
    EVOKE_SQS_LONG_POLL_SECONDS:  int,    default: 10
    EVOKE_EVENTS_PER_MACHINE:     int,    default: 5

A TOML file with the same keys (lowercase, no prefix) can be passed with
--config; environment variables win over the file."
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EvokeConfig::load(cli.config.as_deref())?;

    init_tracing(&config);

    tracing::info!("starting evoke");

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let source = Arc::new(EventSource::new(aws_sdk_sqs::Client::new(&aws), &config));
    let launcher = Arc::new(MachinesClient::new(config.fly_token.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::debug!("signal received");
        let _ = shutdown_tx.send(true);
    });

    let (tx, mut rx) = mpsc::channel::<Vec<aws_sdk_sqs::types::Message>>(1);

    let dispatcher = tokio::spawn({
        let config = config.clone();
        let source = Arc::clone(&source);
        let launcher = Arc::clone(&launcher);
        async move {
            while let Some(messages) = rx.recv().await {
                dispatch::dispatch(&config, launcher.as_ref(), source.as_ref(), messages).await;
            }
            tracing::info!("shutdown: no longer creating machines");
        }
    });

    // Listen for messages until shutdown; dropping `tx` ends the dispatcher.
    source.listen(shutdown_rx, tx).await?;

    tracing::info!("shutdown: waiting on broker to finish current job");
    let _ = dispatcher.await;

    tracing::info!("exiting evoke");
    Ok(())
}

fn init_tracing(config: &EvokeConfig) {
    let filter = EnvFilter::try_from_env("EVOKE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
