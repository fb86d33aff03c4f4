use super::run_pipeline;
use crate::{OutputFormat, SortArgs};
use ripple_pipeline::PipelineConfig;

pub async fn handle(args: SortArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = PipelineConfig::sort(
        "sort",
        &args.table,
        args.format,
        args.identifier,
        args.split_size,
        args.bins,
    );
    run_pipeline(config, &args.input, &args.store.store, format).await
}
