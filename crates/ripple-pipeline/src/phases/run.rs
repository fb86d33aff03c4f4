use super::PhaseContext;
use crate::app::ApplicationInput;
use crate::error::PipelineResult;
use ripple_formats::{Encoded, FormatTag};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Hand the shard's records to a registered application and write each of
/// its outputs.
pub(crate) async fn run(
    ctx: &mut PhaseContext<'_>,
    format: FormatTag,
    application: &str,
    params: &BTreeMap<String, String>,
) -> PipelineResult<()> {
    let source = ctx.payload.source()?;
    let payload = ctx.payload;
    let app = Arc::clone(ctx.applications.get(application)?);
    let it = ctx.source_iterator(format).await?;
    let records = it.owned_records().await?;
    info!("Running {} on {} records of {}", application, records.len(), source);

    let outputs = app
        .run(ApplicationInput {
            source: &source,
            format,
            records,
            context: it.context().clone(),
            params,
            target: payload.extra_params.target.as_deref(),
        })
        .await?;

    let shard = ctx.shard(&source);
    let bin = ctx.params().bin.unwrap_or(source.bin);
    for (i, output) in outputs.into_iter().enumerate() {
        let out = source
            .derive(ctx.output_stage(), shard, bin, &output.ext)
            .with_file_id(i as u32 + 1);
        ctx.write(
            &out,
            Encoded {
                content: output.content,
                metadata: output.metadata,
            },
        )
        .await?;
    }
    Ok(())
}
