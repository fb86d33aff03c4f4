use super::{load_config, run_pipeline};
use crate::{OutputFormat, RunArgs};

pub async fn handle(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(&args.config).await?;
    run_pipeline(config, &args.input, &args.store.store, format).await
}
