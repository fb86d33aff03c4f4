use super::{Outcome, PhaseContext};
use crate::error::PipelineResult;
use crate::keys::{Coord, ObjectKey};
use bytes::Bytes;
use ripple_formats::{FormatResult, FormatTag, Identifier, PivotSet};
use tracing::{debug, info};

/// Assign the shard's records to pivot bins and write one sorted partial per
/// bin, empty bins included.
pub(crate) async fn run(
    ctx: &mut PhaseContext<'_>,
    format: FormatTag,
    identifier: Identifier,
) -> PipelineResult<()> {
    let source = ctx.payload.source()?;
    let pivots = ctx.payload.require("pivots", ctx.params().pivots.as_ref())?;
    let set = PivotSet::from_boundaries(&pivots)?;
    let shard = ctx.shard(&source);

    let outputs = (0..set.num_bins())
        .map(|b| {
            Ok(source.derive(
                ctx.output_stage(),
                shard,
                Coord::from_index(b, set.num_bins())?,
                format.extension(),
            ))
        })
        .collect::<PipelineResult<Vec<ObjectKey>>>()?;
    if all_exist(ctx, &outputs).await? {
        info!("Partitions of shard {} already written", shard);
        ctx.outcome = Outcome::Skipped;
        return Ok(());
    }

    let it = ctx.source_iterator(format).await?;
    let records = it.owned_records().await?;
    let codec = it.codec();
    let mut keyed = records
        .into_iter()
        .map(|record| Ok((codec.identifier_value(&record, identifier)?, record)))
        .collect::<FormatResult<Vec<(f64, Bytes)>>>()?;
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut bins: Vec<Vec<Bytes>> = vec![Vec::new(); set.num_bins()];
    for (key, record) in keyed {
        bins[set.bin_index(key)].push(record);
    }
    debug!(
        "Shard {} bin sizes: {:?}",
        shard,
        bins.iter().map(Vec::len).collect::<Vec<_>>()
    );

    for (records, out) in bins.iter().zip(&outputs) {
        let encoded = codec.from_array(records, it.context())?;
        ctx.write(out, encoded).await?;
    }
    Ok(())
}

async fn all_exist(ctx: &PhaseContext<'_>, keys: &[ObjectKey]) -> PipelineResult<bool> {
    for key in keys {
        if !ctx.store.contains(&key.to_string()).await? {
            return Ok(false);
        }
    }
    Ok(true)
}
