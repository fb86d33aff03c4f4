use super::PhaseContext;
use crate::error::PipelineResult;
use crate::keys::Coord;
use ripple_formats::{Encoded, FormatResult, FormatTag, Identifier, PivotFile, sample_pivots};
use tracing::debug;

/// Sample candidate pivots from the shard's records.
pub(crate) async fn run(
    ctx: &mut PhaseContext<'_>,
    format: FormatTag,
    identifier: Identifier,
    num_bins: usize,
) -> PipelineResult<()> {
    let source = ctx.payload.source()?;
    let it = ctx.source_iterator(format).await?;
    let records = it.owned_records().await?;
    let codec = it.codec();
    let keys = records
        .iter()
        .map(|record| codec.identifier_value(record, identifier))
        .collect::<FormatResult<Vec<f64>>>()?;

    let pivots = sample_pivots(keys, num_bins);
    debug!(
        "Sampled {} pivots from {} records of {}",
        pivots.len(),
        records.len(),
        source
    );

    let file = PivotFile {
        table: ctx.config.table.clone(),
        key: ctx.payload.source_key.clone(),
        pivots,
    };
    let out = source.derive(
        ctx.output_stage(),
        ctx.shard(&source),
        Coord::single(),
        FormatTag::Pivot.extension(),
    );
    ctx.write(&out, Encoded::new(file.to_bytes())).await
}
