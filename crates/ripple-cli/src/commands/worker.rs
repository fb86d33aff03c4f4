//! Execute one trigger payload read from stdin
//!
//! Downstream invocations are not executed. They are printed so they can be
//! fed back to `ripple worker` one at a time.

use super::{load_config, open_store};
use crate::output::print_json;
use crate::{OutputFormat, WorkerArgs};
use anyhow::Context;
use ripple_pipeline::{Worker, WorkerReport};
use ripple_store::{BlobStore, Invoker, QueueInvoker};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

#[derive(Serialize)]
struct QueuedInvocation {
    function: String,
    payload: serde_json::Value,
}

#[derive(Serialize)]
struct WorkerOutput {
    report: WorkerReport,
    invocations: Vec<QueuedInvocation>,
}

pub async fn handle(args: WorkerArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(&args.config).await?;
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("reading payload from stdin")?;
    let payload: serde_json::Value =
        serde_json::from_str(&input).context("payload is not valid JSON")?;

    let store = open_store(&args.store.store).await?;
    let queue = Arc::new(QueueInvoker::new());
    let worker = Worker::new(
        store as Arc<dyn BlobStore>,
        Arc::clone(&queue) as Arc<dyn Invoker>,
        Arc::new(config),
    );
    let report = worker.handle_json(payload).await?;

    let output = WorkerOutput {
        report,
        invocations: queue
            .drain()
            .into_iter()
            .map(|invocation| QueuedInvocation {
                function: invocation.function,
                payload: invocation.payload,
            })
            .collect(),
    };
    if !print_json(&output, format)? {
        println!(
            "Step {} ({}) on {}: {:?}",
            output.report.step, output.report.phase, output.report.source_key, output.report.outcome
        );
        for key in &output.report.written {
            println!("wrote {key}");
        }
        for invocation in &output.invocations {
            println!("{} {}", invocation.function, invocation.payload);
        }
    }
    Ok(())
}
