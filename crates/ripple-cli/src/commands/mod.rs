pub mod key;
pub mod run;
pub mod sort;
pub mod worker;

use crate::OutputFormat;
use crate::output::{format_cost, print_json};
use anyhow::Context;
use ripple_pipeline::{DriverReport, LocalDriver, PipelineConfig};
use ripple_store::{BlobStore, DiskStore, RetryPolicy, RetryingStore, StatsSnapshot};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The disk store under `root`, wrapped in the environment's retry policy.
pub async fn open_store(root: &Path) -> anyhow::Result<Arc<RetryingStore<DiskStore>>> {
    let disk = DiskStore::open(root)
        .await
        .with_context(|| format!("opening store at {}", root.display()))?;
    Ok(Arc::new(RetryingStore::new(disk, RetryPolicy::from_env())))
}

#[derive(Serialize)]
struct RunSummary<'a> {
    input: String,
    outputs: Vec<&'a str>,
    report: &'a DriverReport,
    stats: StatsSnapshot,
    cost: f64,
}

/// Upload `input` under a fresh run token and run `config` on it locally.
pub(crate) async fn run_pipeline(
    config: PipelineConfig,
    input: &Path,
    root: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    config.validate()?;
    let record_format = config.step(0)?.format();
    let content = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .context("input file name is not valid UTF-8")?;

    let store = open_store(root).await?;
    let driver = LocalDriver::new(Arc::clone(&store) as Arc<dyn BlobStore>, config);
    let key = driver
        .upload(name, record_format, content.into())
        .await?;
    info!("Running {} on {}", driver.config().name, key);
    let report = driver.run(&key).await?;

    let stats = store.inner().stats().snapshot();
    let summary = RunSummary {
        input: key.to_string(),
        outputs: report.output_keys(),
        report: &report,
        stats,
        cost: stats.cost(),
    };
    if !print_json(&summary, format)? {
        println!("Input: {}", summary.input);
        for key in &summary.outputs {
            println!("{key}");
        }
        println!(
            "{} invocations, {} retries, {} objects written",
            report.invocations, report.retries, report.written
        );
        println!("Cost: {}", format_cost(summary.cost));
    }
    Ok(())
}

pub(crate) async fn load_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    PipelineConfig::from_json(&json).with_context(|| format!("loading {}", path.display()))
}
