use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use evoke_core::{EventBatch, replay};
use evoke_runtime::HandlerComponent;

/// Environment variable naming the event batch file.
const EVENTS_PATH_VAR: &str = "EVENTS_PATH";

/// Fixed location of the user handler inside the machine image.
const HANDLER_PATH: &str = "/app/handler.wasm";

#[derive(Parser)]
#[command(
    name = "evoke-replay",
    about = "Replay a batch of events through the handler baked into this machine",
    long_about = "Replay a batch of events through the handler baked into this machine.

Configuration comes from the environment:
  required:
    EVENTS_PATH:  path to a JSON file whose top level is an array; each
                  element is passed to the handler as one event

The handler is always loaded from /app/handler.wasm and must be a WebAssembly
component exporting `handler: func(event: string) -> result<string, string>`.

Per-event handler failures are logged and do not affect the exit code; the
process exits non-zero only when the batch or the handler cannot be loaded."
)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the handler.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_env("EVOKE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let _cli = Cli::parse();

    let events_path = std::env::var(EVENTS_PATH_VAR)
        .with_context(|| format!("{EVENTS_PATH_VAR} must be set to the event batch file"))?;

    let batch = EventBatch::from_path(Path::new(&events_path))
        .context("could not load the event batch")?;

    tracing::info!(count = batch.len(), path = %events_path, "event batch loaded");

    let handler = HandlerComponent::load(Path::new(HANDLER_PATH))
        .await
        .context("could not load the handler")?;

    let report = replay(&handler, &batch).await;

    tracing::info!(
        attempted = report.attempted(),
        succeeded = report.succeeded,
        failed = report.failed,
        "replay finished"
    );

    Ok(())
}
